use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use sqlx::SqliteConnection;
use tracing::{Instrument, instrument};

use crate::{
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{Severity, VehicleCategoryCount, VictimDetail, VictimSummary, VictimType},
    },
    service::classifier::distinct_modes,
};

/**
 * Database response type for victim summaries: total, killed, hospitalized, slightly injured.
 */
pub type QueryVictimSummaryDbResp = (i64, i64, i64, i64);

/**
 * Database response type for vehicle tallies: raw category code and count.
 */
pub type QueryVehicleTallyDbResp = (Option<String>, i64);

/**
 * Database response type for victim details: accident id, year, month, day, time, address, latitude, longitude, user category, severity.
 */
pub type QueryVictimDetailDbResp = (String, i64, i64, i64, Option<String>, Option<String>, Option<String>, Option<String>, i64, i64);

/**
 * Database response type for accident vehicles: accident id and raw category code.
 */
pub type QueryAccidentVehicleDbResp = (String, Option<String>);

/**
 * User category (`catu`) of pedestrians.
 */
const PEDESTRIAN_CATEGORY: i64 = 3;

/**
 * SQL query summarizing the injured or killed pedestrians of a municipality.
 */
const QUERY_PEDESTRIAN_SUMMARY: &str = "SELECT COUNT(*),
                                               COALESCE(SUM(CASE WHEN CAST(u.grav AS INTEGER) = 2 THEN 1 ELSE 0 END), 0),
                                               COALESCE(SUM(CASE WHEN CAST(u.grav AS INTEGER) = 3 THEN 1 ELSE 0 END), 0),
                                               COALESCE(SUM(CASE WHEN CAST(u.grav AS INTEGER) = 4 THEN 1 ELSE 0 END), 0)
                                        FROM usagers u
                                        JOIN caract c ON u.Num_Acc = c.Num_Acc
                                        WHERE CAST(u.grav AS INTEGER) != 1 AND CAST(u.catu AS INTEGER) = 3 AND CAST(c.com AS TEXT) = $1";

/**
 * SQL query counting the injured or killed pedestrians born after the given year.
 */
const QUERY_PEDESTRIAN_CHILDREN: &str = "SELECT COUNT(*)
                                         FROM usagers u
                                         JOIN caract c ON u.Num_Acc = c.Num_Acc
                                         WHERE CAST(u.grav AS INTEGER) != 1 AND CAST(u.catu AS INTEGER) = 3 AND CAST(c.com AS TEXT) = $1
                                           AND CAST(u.an_nais AS INTEGER) > $2";

/**
 * SQL query counting every vehicle of the accidents with an injured or killed pedestrian, once per pedestrian.
 */
const QUERY_PEDESTRIAN_VEHICLES: &str = "SELECT CAST(v.catv AS TEXT), COUNT(*)
                                         FROM usagers u
                                         JOIN caract c ON u.Num_Acc = c.Num_Acc
                                         JOIN vehicules v ON u.Num_Acc = v.Num_Acc
                                         WHERE CAST(u.grav AS INTEGER) != 1 AND CAST(u.catu AS INTEGER) = 3 AND CAST(c.com AS TEXT) = $1
                                         GROUP BY CAST(v.catv AS TEXT)";

/**
 * SQL query summarizing the injured or killed cyclists. The person must ride a bicycle (01) or an e-bike (80).
 */
const QUERY_CYCLIST_SUMMARY: &str = "SELECT COUNT(*),
                                            COALESCE(SUM(CASE WHEN CAST(u.grav AS INTEGER) = 2 THEN 1 ELSE 0 END), 0),
                                            COALESCE(SUM(CASE WHEN CAST(u.grav AS INTEGER) = 3 THEN 1 ELSE 0 END), 0),
                                            COALESCE(SUM(CASE WHEN CAST(u.grav AS INTEGER) = 4 THEN 1 ELSE 0 END), 0)
                                     FROM usagers u
                                     JOIN caract c ON u.Num_Acc = c.Num_Acc
                                     JOIN vehicules v ON u.Num_Acc = v.Num_Acc AND u.num_veh = v.num_veh
                                     WHERE CAST(u.grav AS INTEGER) != 1 AND CAST(u.catu AS INTEGER) = 1 AND CAST(v.catv AS INTEGER) IN (1, 80)
                                       AND CAST(c.com AS TEXT) = $1";

/**
 * SQL query counting the injured or killed cyclists born after the given year.
 */
const QUERY_CYCLIST_CHILDREN: &str = "SELECT COUNT(*)
                                      FROM usagers u
                                      JOIN caract c ON u.Num_Acc = c.Num_Acc
                                      JOIN vehicules v ON u.Num_Acc = v.Num_Acc AND u.num_veh = v.num_veh
                                      WHERE CAST(u.grav AS INTEGER) != 1 AND CAST(u.catu AS INTEGER) = 1 AND CAST(v.catv AS INTEGER) IN (1, 80)
                                        AND CAST(c.com AS TEXT) = $1 AND CAST(u.an_nais AS INTEGER) > $2";

/**
 * SQL query counting the vehicles met by injured or killed cyclists. The cyclist's own vehicle is left out.
 */
const QUERY_CYCLIST_VEHICLES: &str = "SELECT CAST(v.catv AS TEXT), COUNT(*)
                                      FROM usagers u
                                      JOIN caract c ON u.Num_Acc = c.Num_Acc
                                      JOIN vehicules v_cyclist ON u.Num_Acc = v_cyclist.Num_Acc AND u.num_veh = v_cyclist.num_veh
                                      JOIN vehicules v ON u.Num_Acc = v.Num_Acc AND v.num_veh != v_cyclist.num_veh
                                      WHERE CAST(u.grav AS INTEGER) != 1 AND CAST(u.catu AS INTEGER) = 1 AND CAST(v_cyclist.catv AS INTEGER) IN (1, 80)
                                        AND CAST(c.com AS TEXT) = $1
                                      GROUP BY CAST(v.catv AS TEXT)";

/**
 * SQL query listing the injured or killed pedestrians and cyclists in chronological order.
 */
const QUERY_VICTIM_DETAILS: &str = "SELECT CAST(c.Num_Acc AS TEXT), CAST(c.an AS INTEGER), CAST(c.mois AS INTEGER), CAST(c.jour AS INTEGER),
                                           CAST(c.hrmn AS TEXT), CAST(c.adr AS TEXT), CAST(c.lat AS TEXT), CAST(c.long AS TEXT),
                                           CAST(u.catu AS INTEGER), CAST(u.grav AS INTEGER)
                                    FROM usagers u
                                    JOIN caract c ON u.Num_Acc = c.Num_Acc
                                    WHERE CAST(u.grav AS INTEGER) != 1 AND CAST(c.com AS TEXT) = $1
                                      AND (CAST(u.catu AS INTEGER) = 3
                                           OR (CAST(u.catu AS INTEGER) = 1 AND EXISTS (
                                               SELECT 1 FROM vehicules v
                                               WHERE v.Num_Acc = u.Num_Acc AND v.num_veh = u.num_veh AND CAST(v.catv AS INTEGER) IN (1, 80))))
                                    ORDER BY CAST(c.an AS INTEGER), CAST(c.mois AS INTEGER), CAST(c.jour AS INTEGER), c.hrmn";

/**
 * SQL query listing every vehicle of every accident of a municipality.
 */
const QUERY_ACCIDENT_VEHICLES: &str = "SELECT CAST(v.Num_Acc AS TEXT), CAST(v.catv AS TEXT)
                                       FROM vehicules v
                                       JOIN caract c ON v.Num_Acc = c.Num_Acc
                                       WHERE CAST(c.com AS TEXT) = $1";

/**
 * DAO for the read-only queries against a yearly accident store.
 */
pub struct AccidentsDao {}

impl AccidentsDao {
    /**
     * Creates a new instance of `AccidentsDao`.
     *
     * # Returns
     * A new instance of `AccidentsDao`.
     */
    pub fn new() -> Self {
        AccidentsDao {}
    }

    /**
     * Summarizes the injured or killed pedestrians of a municipality.
     *
     * # Arguments
     * `connection`: Connection to the yearly store.
     * `municipality_code`: The municipality code.
     *
     * # Returns
     * A Result containing the `VictimSummary` (all zero when nobody qualifies) or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_pedestrian_summary(&self, connection: &mut SqliteConnection, municipality_code: &str) -> Result<VictimSummary, ApplicationError> {
        self.get_victim_summary(connection, QUERY_PEDESTRIAN_SUMMARY, municipality_code).await
    }

    /**
     * Counts the injured or killed pedestrians born after `min_birth_year`.
     *
     * # Arguments
     * `connection`: Connection to the yearly store.
     * `municipality_code`: The municipality code.
     * `min_birth_year`: Report year minus 18. Birth years must be strictly greater.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_pedestrian_child_count(&self, connection: &mut SqliteConnection, municipality_code: &str, min_birth_year: i32) -> Result<i64, ApplicationError> {
        self.get_child_count(connection, QUERY_PEDESTRIAN_CHILDREN, municipality_code, min_birth_year).await
    }

    /**
     * Tallies the vehicle categories of the accidents with an injured or killed pedestrian.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_pedestrian_vehicle_tally(&self, connection: &mut SqliteConnection, municipality_code: &str) -> Result<Vec<VehicleCategoryCount>, ApplicationError> {
        self.get_vehicle_tally(connection, QUERY_PEDESTRIAN_VEHICLES, municipality_code).await
    }

    /**
     * Summarizes the injured or killed cyclists of a municipality.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_cyclist_summary(&self, connection: &mut SqliteConnection, municipality_code: &str) -> Result<VictimSummary, ApplicationError> {
        self.get_victim_summary(connection, QUERY_CYCLIST_SUMMARY, municipality_code).await
    }

    /**
     * Counts the injured or killed cyclists born after `min_birth_year`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_cyclist_child_count(&self, connection: &mut SqliteConnection, municipality_code: &str, min_birth_year: i32) -> Result<i64, ApplicationError> {
        self.get_child_count(connection, QUERY_CYCLIST_CHILDREN, municipality_code, min_birth_year).await
    }

    /**
     * Tallies the vehicle categories the injured or killed cyclists collided with, excluding their own bicycles.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_cyclist_vehicle_tally(&self, connection: &mut SqliteConnection, municipality_code: &str) -> Result<Vec<VehicleCategoryCount>, ApplicationError> {
        self.get_vehicle_tally(connection, QUERY_CYCLIST_VEHICLES, municipality_code).await
    }

    /**
     * Lists the injured or killed pedestrians and cyclists of a municipality with the transport modes of their accidents.
     *
     * # Arguments
     * `connection`: Connection to the yearly store.
     * `municipality_code`: The municipality code.
     *
     * # Returns
     * A Result containing the victims ordered by date and time of day, or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_victim_details(&self, connection: &mut SqliteConnection, municipality_code: &str) -> Result<Vec<VictimDetail>, ApplicationError> {
        let span = tracing::Span::current();
        let vehicles: Vec<QueryAccidentVehicleDbResp> = sqlx::query_as(QUERY_ACCIDENT_VEHICLES)
            .bind(municipality_code)
            .fetch_all(&mut *connection)
            .instrument(span.clone())
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get accident vehicles: {err}")))?;
        let mut vehicles_per_accident: HashMap<String, Vec<String>> = HashMap::new();
        for (accident_id, category_code) in vehicles {
            vehicles_per_accident.entry(accident_id).or_default().push(category_code.unwrap_or_default());
        }

        let results: Vec<QueryVictimDetailDbResp> = sqlx::query_as(QUERY_VICTIM_DETAILS)
            .bind(municipality_code)
            .fetch_all(&mut *connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get victim details: {err}")))?;
        let mut victims = results.into_iter().map(|row| Self::to_victim_detail(row, &vehicles_per_accident)).collect::<Result<Vec<VictimDetail>, ApplicationError>>()?;
        victims.sort_by(|a, b| a.date.cmp(&b.date).then(a.time.cmp(&b.time)));
        tracing::debug!("Found {} victims for municipality {}", victims.len(), municipality_code);
        Ok(victims)
    }

    async fn get_victim_summary(&self, connection: &mut SqliteConnection, query: &str, municipality_code: &str) -> Result<VictimSummary, ApplicationError> {
        let span = tracing::Span::current();
        let result: QueryVictimSummaryDbResp = sqlx::query_as(query)
            .bind(municipality_code)
            .fetch_one(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get victim summary: {err}")))?;
        Ok(VictimSummary::from(result))
    }

    async fn get_child_count(&self, connection: &mut SqliteConnection, query: &str, municipality_code: &str, min_birth_year: i32) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let result: (i64,) = sqlx::query_as(query)
            .bind(municipality_code)
            .bind(min_birth_year)
            .fetch_one(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get child count: {err}")))?;
        Ok(result.0)
    }

    async fn get_vehicle_tally(&self, connection: &mut SqliteConnection, query: &str, municipality_code: &str) -> Result<Vec<VehicleCategoryCount>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryVehicleTallyDbResp> = sqlx::query_as(query)
            .bind(municipality_code)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get vehicle tally: {err}")))?;
        Ok(results.into_iter().map(|(category_code, count)| VehicleCategoryCount::new(category_code.unwrap_or_default(), count)).collect())
    }

    /**
     * Converts a victim row, looking up the vehicles of its accident.
     */
    fn to_victim_detail(row: QueryVictimDetailDbResp, vehicles_per_accident: &HashMap<String, Vec<String>>) -> Result<VictimDetail, ApplicationError> {
        let (accident_id, year, month, day, time, address, latitude, longitude, user_category, severity) = row;
        let date = u32::try_from(month)
            .ok()
            .zip(u32::try_from(day).ok())
            .and_then(|(month, day)| NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day))
            .ok_or_else(|| ApplicationError::new(ErrorType::DatabaseError, format!("Invalid accident date {year}-{month}-{day} for accident {accident_id}")))?;
        let victim_type = if user_category == PEDESTRIAN_CATEGORY { VictimType::Pedestrian } else { VictimType::Cyclist };
        let transport_modes = vehicles_per_accident.get(&accident_id).map(|codes| distinct_modes(codes.iter().map(String::as_str))).unwrap_or_default();
        Ok(VictimDetail {
            accident_id,
            date,
            time: time.as_deref().and_then(parse_time_of_day),
            address,
            latitude,
            longitude,
            victim_type,
            severity: Severity::from_code(severity),
            transport_modes,
        })
    }
}

impl From<QueryVictimSummaryDbResp> for VictimSummary {
    fn from((total, killed, hospitalized, slightly_injured): QueryVictimSummaryDbResp) -> Self {
        VictimSummary::new(total, killed, hospitalized, slightly_injured)
    }
}

/**
 * Reads the recorded time of day (`hrmn`). Accepts `HH:MM` and the separator-less `HHMM`/`HMM`.
 */
fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M") {
        return Some(time);
    }
    if raw.is_empty() || raw.len() > 4 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(&format!("{raw:0>4}"), "%H%M").ok()
}

#[cfg(test)]
mod test {
    use sqlx::Connection;

    use super::*;
    use crate::dao::fixture::{FIXTURE_YEAR, seed};
    use crate::model::models::TransportMode;

    async fn fixture_connection() -> SqliteConnection {
        let mut connection = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        seed(&mut connection).await;
        connection
    }

    fn sorted(mut tally: Vec<VehicleCategoryCount>) -> Vec<VehicleCategoryCount> {
        tally.sort_by(|a, b| a.category_code.cmp(&b.category_code));
        tally
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("08:00"), NaiveTime::from_hms_opt(8, 0, 0));
        assert_eq!(parse_time_of_day("1715"), NaiveTime::from_hms_opt(17, 15, 0));
        assert_eq!(parse_time_of_day("830"), NaiveTime::from_hms_opt(8, 30, 0));
        assert_eq!(parse_time_of_day(""), None);
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("noon"), None);
    }

    #[tokio::test]
    async fn test_pedestrian_summary() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let summary = dao.get_pedestrian_summary(&mut connection, "93051").await.unwrap();
        assert_eq!(summary, VictimSummary::new(2, 1, 1, 0));
    }

    #[tokio::test]
    async fn test_pedestrian_child_count() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let children = dao.get_pedestrian_child_count(&mut connection, "93051", FIXTURE_YEAR - 18).await.unwrap();
        assert_eq!(children, 1);
    }

    #[tokio::test]
    async fn test_child_threshold_is_strict() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        // The child pedestrian of 93051 is born in 2010.
        assert_eq!(dao.get_pedestrian_child_count(&mut connection, "93051", 2009).await.unwrap(), 1);
        assert_eq!(dao.get_pedestrian_child_count(&mut connection, "93051", 2010).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pedestrian_vehicle_tally() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let tally = sorted(dao.get_pedestrian_vehicle_tally(&mut connection, "93051").await.unwrap());
        assert_eq!(tally, vec![VehicleCategoryCount::new("33".to_string(), 1), VehicleCategoryCount::new("7".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_pedestrian_vehicle_tally_counts_each_victim() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let tally = dao.get_pedestrian_vehicle_tally(&mut connection, "93056").await.unwrap();
        assert_eq!(tally, vec![VehicleCategoryCount::new("37".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_cyclist_summary_requires_own_bicycle() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        // The injured car driver of accident 2 is a driver, not a cyclist.
        let summary = dao.get_cyclist_summary(&mut connection, "93051").await.unwrap();
        assert_eq!(summary, VictimSummary::new(2, 1, 0, 1));
        let children = dao.get_cyclist_child_count(&mut connection, "93051", FIXTURE_YEAR - 18).await.unwrap();
        assert_eq!(children, 1);
    }

    #[tokio::test]
    async fn test_cyclist_vehicle_tally_excludes_own_bicycle() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let tally = sorted(dao.get_cyclist_vehicle_tally(&mut connection, "93051").await.unwrap());
        assert_eq!(tally, vec![VehicleCategoryCount::new("13".to_string(), 1), VehicleCategoryCount::new("7".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_cyclist_alone_has_empty_tally() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        assert_eq!(dao.get_cyclist_summary(&mut connection, "93054").await.unwrap().total, 1);
        assert!(dao.get_cyclist_vehicle_tally(&mut connection, "93054").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_municipality_is_zero() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        assert_eq!(dao.get_pedestrian_summary(&mut connection, "99999").await.unwrap(), VictimSummary::default());
        assert_eq!(dao.get_cyclist_summary(&mut connection, "99999").await.unwrap(), VictimSummary::default());
        assert_eq!(dao.get_pedestrian_child_count(&mut connection, "99999", 2005).await.unwrap(), 0);
        assert_eq!(dao.get_cyclist_child_count(&mut connection, "99999", 2005).await.unwrap(), 0);
        assert!(dao.get_pedestrian_vehicle_tally(&mut connection, "99999").await.unwrap().is_empty());
        assert!(dao.get_cyclist_vehicle_tally(&mut connection, "99999").await.unwrap().is_empty());
        assert!(dao.get_victim_details(&mut connection, "99999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_victim_details_chronological() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let victims = dao.get_victim_details(&mut connection, "93051").await.unwrap();
        let order: Vec<&str> = victims.iter().map(|victim| victim.accident_id.as_str()).collect();
        assert_eq!(order, vec!["202300000003", "202300000002", "202300000001", "202300000004"]);
        let first = victims.first().unwrap();
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
        assert_eq!(first.time, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(first.victim_type, VictimType::Cyclist);
        assert_eq!(first.severity, Severity::SlightlyInjured);
        assert_eq!(first.transport_modes, vec![TransportMode::Bicycle]);
    }

    #[tokio::test]
    async fn test_victim_details_transport_modes() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let victims = dao.get_victim_details(&mut connection, "93051").await.unwrap();
        let cyclist = victims.iter().find(|victim| victim.accident_id == "202300000002").unwrap();
        assert_eq!(cyclist.transport_modes, vec![TransportMode::Automobile, TransportMode::Bicycle, TransportMode::HeavyGoodsVehicle]);
        assert_eq!(cyclist.severity, Severity::Killed);
        let pedestrian = victims.iter().find(|victim| victim.accident_id == "202300000004").unwrap();
        assert_eq!(pedestrian.victim_type, VictimType::Pedestrian);
        assert_eq!(pedestrian.address, None);
        assert_eq!(pedestrian.latitude.as_deref(), Some("48,8450"));
    }

    #[tokio::test]
    async fn test_victim_details_without_vehicle() {
        let mut connection = fixture_connection().await;
        let dao = AccidentsDao::new();
        let victims = dao.get_victim_details(&mut connection, "93053").await.unwrap();
        assert_eq!(victims.len(), 1);
        assert!(victims.first().unwrap().transport_modes.is_empty());
    }

    #[tokio::test]
    async fn test_missing_relation_is_database_error() {
        let mut connection = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let dao = AccidentsDao::new();
        let result = dao.get_pedestrian_summary(&mut connection, "93051").await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::DatabaseError);
    }
}
