use prometheus::IntCounter;

use crate::{dao::commune::ConfiguredResolver, service::report::ReportService};

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * The report service computing the accident reports.
     */
    pub report_service: ReportService<ConfiguredResolver>,
    /**
     * Number of reports computed.
     */
    pub reports_generated: IntCounter,
    /**
     * Number of report requests that failed.
     */
    pub report_failures: IntCounter,
}

/**
 * Creates a new instance of `AppState`.
 *
 * # Arguments
 * `report_service`: The report service computing the accident reports.
 * `reports_generated`: Counter of computed reports.
 * `report_failures`: Counter of failed report requests.
 */
impl AppState {
    pub fn new(report_service: ReportService<ConfiguredResolver>, reports_generated: IntCounter, report_failures: IntCounter) -> Self {
        AppState { report_service, reports_generated, report_failures }
    }
}
