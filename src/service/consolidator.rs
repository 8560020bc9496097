use sqlx::SqliteConnection;
use tracing::instrument;

use crate::{
    dao::accidents::AccidentsDao,
    model::{
        apperror::ApplicationError,
        models::{CohortStatistics, ConsolidatedStatistics, MunicipalityStatistics, VehicleCategoryCount},
    },
    service::classifier::group_by_mode,
};

/**
 * Age under which a victim counts as a child.
 */
const CHILD_MAX_AGE: i32 = 18;

/**
 * Runs the per-municipality queries of a group and merges their results.
 */
pub struct Consolidator {
    /**
     * The DAO for accident queries.
     */
    accidents_dao: AccidentsDao,
}

impl Consolidator {
    /**
     * Creates a new instance of `Consolidator`.
     *
     * # Arguments
     * `accidents_dao`: The DAO for accident queries.
     */
    pub fn new(accidents_dao: AccidentsDao) -> Self {
        Consolidator { accidents_dao }
    }

    /**
     * Queries every code on the same store connection and merges the results. The first failing
     * query aborts the whole consolidation.
     *
     * # Arguments
     * `connection`: Connection to the store of `year`.
     * `codes`: Distinct municipality codes.
     * `year`: The report year.
     *
     * # Returns
     * A Result containing the `ConsolidatedStatistics` or an `ApplicationError`.
     */
    #[instrument(skip(self, connection))]
    pub async fn consolidate(&self, connection: &mut SqliteConnection, codes: &[String], year: i32) -> Result<ConsolidatedStatistics, ApplicationError> {
        let mut per_code: Vec<MunicipalityStatistics> = Vec::with_capacity(codes.len());
        for code in codes {
            per_code.push(self.collect(connection, code, year).await?);
        }
        Ok(merge(codes.to_vec(), per_code))
    }

    /**
     * Runs the fixed query sequence for one municipality code.
     */
    async fn collect(&self, connection: &mut SqliteConnection, code: &str, year: i32) -> Result<MunicipalityStatistics, ApplicationError> {
        // Approximates the age at the accident, may be off by one year.
        let min_birth_year = year - CHILD_MAX_AGE;
        let pedestrians = CohortStatistics::new(
            self.accidents_dao.get_pedestrian_summary(connection, code).await?,
            self.accidents_dao.get_pedestrian_child_count(connection, code, min_birth_year).await?,
        );
        let cyclists = CohortStatistics::new(
            self.accidents_dao.get_cyclist_summary(connection, code).await?,
            self.accidents_dao.get_cyclist_child_count(connection, code, min_birth_year).await?,
        );
        Ok(MunicipalityStatistics {
            pedestrians,
            cyclists,
            pedestrian_vehicles: self.accidents_dao.get_pedestrian_vehicle_tally(connection, code).await?,
            cyclist_vehicles: self.accidents_dao.get_cyclist_vehicle_tally(connection, code).await?,
            victims: self.accidents_dao.get_victim_details(connection, code).await?,
        })
    }
}

/**
 * Merges per-code statistics. Scalar counts are summed, raw vehicle tallies are concatenated and
 * classified once, and victims are re-sorted by date then time of day.
 *
 * # Arguments
 * `codes`: The codes the statistics belong to.
 * `per_code`: One entry per code.
 */
pub fn merge(codes: Vec<String>, per_code: Vec<MunicipalityStatistics>) -> ConsolidatedStatistics {
    let mut pedestrians = CohortStatistics::default();
    let mut cyclists = CohortStatistics::default();
    let mut pedestrian_vehicles: Vec<VehicleCategoryCount> = Vec::new();
    let mut cyclist_vehicles: Vec<VehicleCategoryCount> = Vec::new();
    let mut victims = Vec::new();
    for statistics in per_code {
        pedestrians += statistics.pedestrians;
        cyclists += statistics.cyclists;
        pedestrian_vehicles.extend(statistics.pedestrian_vehicles);
        cyclist_vehicles.extend(statistics.cyclist_vehicles);
        victims.extend(statistics.victims);
    }
    victims.sort_by(|a, b| a.date.cmp(&b.date).then(a.time.cmp(&b.time)));
    ConsolidatedStatistics {
        codes,
        pedestrians,
        cyclists,
        pedestrian_vehicles: group_by_mode(&pedestrian_vehicles),
        cyclist_vehicles: group_by_mode(&cyclist_vehicles),
        victims,
    }
}
