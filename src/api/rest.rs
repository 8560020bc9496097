use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{AccidentReport, CohortStatistics, DetailTable, DetailTableRow, MunicipalityGroup, ReportInputType, TransportModeTally},
    },
    service::composer::render_detail_table,
};

/***************** Report models *********************/

/**
 * Query parameters of the report endpoints.
 */
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    /**
     * Comma separated sub-codes summed into the report, e.g. arrondissements.
     */
    pub children: Option<String>,
}

/**
 * Builds the report input from the path and query of a request. The result still needs validation.
 *
 * # Arguments
 * `year`: Year path segment.
 * `code`: Primary municipality code path segment.
 * `query`: Query parameters.
 *
 * # Returns
 * A Result containing the `ReportInputType` or an `InvalidInput` error when the year is not a number.
 */
pub fn to_report_input(year: &str, code: String, query: &ReportQuery) -> Result<ReportInputType, ApplicationError> {
    let year: i32 = year.trim().parse().map_err(|_err| ApplicationError::new(ErrorType::InvalidInput, format!("Year must be a number: {year}")))?;
    let children: Vec<String> = query
        .children
        .as_deref()
        .map(|children| children.split(',').map(str::trim).filter(|child| !child.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    Ok(ReportInputType::new(year, MunicipalityGroup::new(code.trim().to_string(), children)))
}

/**
 * Response structure of the report endpoint.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /**
     * Display name of the primary municipality.
     */
    commune_name: String,
    year: i32,
    /**
     * Every municipality code the statistics were summed over.
     */
    codes: Vec<String>,
    pedestrians: CohortStatistics,
    cyclists: CohortStatistics,
    pedestrian_vehicles: Vec<TransportModeElement>,
    cyclist_vehicles: Vec<TransportModeElement>,
    /**
     * Markdown narrative.
     */
    narrative: String,
    /**
     * Markdown detail table without coordinates, or the no victims line.
     */
    detail_table: String,
    victims: Vec<VictimElement>,
    /**
     * Whether the CSV export is offered.
     */
    export_available: bool,
}

impl From<AccidentReport> for ReportResponse {
    fn from(report: AccidentReport) -> Self {
        let detail_table = render_detail_table(&report.detail_table);
        let victims = match report.detail_table {
            DetailTable::Rows(rows) => rows.into_iter().map(VictimElement::from).collect(),
            DetailTable::NoVictims => vec![],
        };
        ReportResponse {
            commune_name: report.commune_name,
            year: report.year,
            codes: report.statistics.codes,
            pedestrians: report.statistics.pedestrians,
            cyclists: report.statistics.cyclists,
            pedestrian_vehicles: report.statistics.pedestrian_vehicles.into_iter().map(TransportModeElement::from).collect(),
            cyclist_vehicles: report.statistics.cyclist_vehicles.into_iter().map(TransportModeElement::from).collect(),
            narrative: report.narrative,
            detail_table,
            victims,
            export_available: report.export.is_some(),
        }
    }
}

/**
 * Vehicle involvements of one transport mode.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportModeElement {
    mode: &'static str,
    count: i64,
}

impl From<TransportModeTally> for TransportModeElement {
    fn from(tally: TransportModeTally) -> Self {
        TransportModeElement { mode: tally.mode.label(), count: tally.count }
    }
}

/**
 * One victim of the detail table.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VictimElement {
    accident_id: String,
    date: String,
    victim_type: String,
    severity: String,
    vehicles: String,
    address: String,
    latitude: String,
    longitude: String,
}

impl From<DetailTableRow> for VictimElement {
    fn from(row: DetailTableRow) -> Self {
        VictimElement {
            accident_id: row.accident_id,
            date: row.date,
            victim_type: row.victim_type,
            severity: row.severity,
            vehicles: row.vehicles,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse { code: get_error_code(&self.error_type), message: self.message.clone() };
        HttpResponse::build(get_statuscode(&self.error_type)).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorType::StoreUnreachable => StatusCode::NOT_FOUND,
        ErrorType::ResolverUnavailable => StatusCode::BAD_GATEWAY,
        ErrorType::DatabaseError | ErrorType::Export | ErrorType::Initialization => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::Initialization => 1001,
        ErrorType::InvalidInput => 1002,
        ErrorType::DatabaseError => 1003,
        ErrorType::StoreUnreachable => 1004,
        ErrorType::ResolverUnavailable => 1005,
        ErrorType::Export => 1006,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_report_input() {
        let query = ReportQuery { children: Some("75101, 75102,,".to_string()) };
        let input = to_report_input("2023", "75056".to_string(), &query).unwrap();
        assert_eq!(input.year, 2023);
        assert_eq!(input.group.primary, "75056");
        assert_eq!(input.group.children, vec!["75101".to_string(), "75102".to_string()]);
    }

    #[test]
    fn test_to_report_input_invalid_year() {
        let result = to_report_input("twenty", "93051".to_string(), &ReportQuery::default());
        assert_eq!(result.unwrap_err().error_type, ErrorType::InvalidInput);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(get_statuscode(&ErrorType::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(get_statuscode(&ErrorType::StoreUnreachable), StatusCode::NOT_FOUND);
        assert_eq!(get_statuscode(&ErrorType::DatabaseError), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
