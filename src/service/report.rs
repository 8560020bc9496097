use sqlx::Connection;
use tracing::instrument;

use crate::{
    dao::{commune::CommuneResolver, store::AccidentStore},
    model::{
        apperror::ApplicationError,
        models::{AccidentReport, ReportInputType},
    },
    service::{composer::compose, consolidator::Consolidator},
};

/**
 * Name used when the commune lookup fails.
 */
pub const UNKNOWN_COMMUNE: &str = "Unknown commune";

/**
 * Represents the service producing pedestrian and cyclist accident reports.
 */
pub struct ReportService<R: CommuneResolver> {
    /**
     * The yearly accident stores.
     */
    store: AccidentStore,
    /**
     * Runs and merges the per-municipality queries.
     */
    consolidator: Consolidator,
    /**
     * Resolves the display name of the primary municipality.
     */
    resolver: R,
}

impl<R: CommuneResolver> ReportService<R> {
    /**
     * Creates a new instance of `ReportService`.
     *
     * # Arguments
     * `store`: The yearly accident stores.
     * `consolidator`: Runs and merges the per-municipality queries.
     * `resolver`: Resolves commune names.
     */
    pub fn new(store: AccidentStore, consolidator: Consolidator, resolver: R) -> Self {
        ReportService { store, consolidator, resolver }
    }

    /**
     * Computes the report of a municipality group for a year. The store connection is closed
     * before returning, also when a query fails.
     *
     * # Arguments
     * `report_input`: Validated year and municipality group.
     *
     * # Returns
     * A Result containing the `AccidentReport` or an `ApplicationError` when the store is unreachable or a query fails.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_report(&self, report_input: ReportInputType) -> Result<AccidentReport, ApplicationError> {
        let codes = report_input.group.codes();
        let mut connection = self.store.open(report_input.year).await?;
        let consolidated = self.consolidator.consolidate(&mut connection, &codes, report_input.year).await;
        if let Err(err) = connection.close().await {
            tracing::warn!("Failed to close accident store for {}: {}", report_input.year, err);
        }
        let statistics = consolidated?;
        let commune_name = self.get_commune_name(&report_input.group.primary).await;
        let report = compose(statistics, &commune_name, report_input.year);
        tracing::info!("Report for {} ({} codes, {}) has {} victims", report_input.group.primary, codes.len(), report_input.year, report.statistics.victims.len());
        Ok(report)
    }

    /**
     * Resolves the commune name, falling back to the unknown placeholder.
     */
    async fn get_commune_name(&self, municipality_code: &str) -> String {
        match self.resolver.resolve(municipality_code).await {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!("Commune name for {} unavailable: {}", municipality_code, err);
                UNKNOWN_COMMUNE.to_string()
            }
        }
    }
}
