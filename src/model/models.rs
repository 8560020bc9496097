use std::ops::AddAssign;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Width of a municipality (INSEE) code.
 */
const MUNICIPALITY_CODE_LENGTH: usize = 5;

/**
 * Cities whose accidents are recorded under arrondissement codes instead of the city code.
 */
const ARRONDISSEMENT_CITIES: [(&str, u32, u32); 3] = [
    ("75056", 75101, 75120), // Paris
    ("69123", 69381, 69389), // Lyon
    ("13055", 13201, 13216), // Marseille
];

/**
 * Coarse transport mode a raw vehicle category code is classified into.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportMode {
    Automobile,
    HeavyGoodsVehicle,
    Bicycle,
    MotorizedTwoWheeler,
    BusOrCoach,
    Other,
}

impl TransportMode {
    pub fn label(self) -> &'static str {
        match self {
            TransportMode::Automobile => "Automobile",
            TransportMode::HeavyGoodsVehicle => "Heavy goods vehicle",
            TransportMode::Bicycle => "Bicycle (incl. e-bike)",
            TransportMode::MotorizedTwoWheeler => "Motorized two-wheeler",
            TransportMode::BusOrCoach => "Bus/Coach",
            TransportMode::Other => "Other",
        }
    }
}

/**
 * Victim cohort the report distinguishes.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VictimType {
    Pedestrian,
    Cyclist,
}

impl VictimType {
    pub fn label(self) -> &'static str {
        match self {
            VictimType::Pedestrian => "Pedestrian",
            VictimType::Cyclist => "Cyclist",
        }
    }
}

/**
 * Outcome of an accident for one person (`grav` column).
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Uninjured,
    Killed,
    Hospitalized,
    SlightlyInjured,
    Unknown,
}

impl Severity {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Severity::Uninjured,
            2 => Severity::Killed,
            3 => Severity::Hospitalized,
            4 => Severity::SlightlyInjured,
            _ => Severity::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Uninjured => "Uninjured",
            Severity::Killed => "Killed",
            Severity::Hospitalized => "Hospitalized",
            Severity::SlightlyInjured => "Slightly injured",
            Severity::Unknown => "Unknown",
        }
    }
}

/**
 * Victim counts of one cohort broken down by severity. Uninjured people are never counted.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VictimSummary {
    pub total: i64,
    pub killed: i64,
    pub hospitalized: i64,
    pub slightly_injured: i64,
}

impl VictimSummary {
    pub fn new(total: i64, killed: i64, hospitalized: i64, slightly_injured: i64) -> Self {
        VictimSummary { total, killed, hospitalized, slightly_injured }
    }
}

impl AddAssign for VictimSummary {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.killed += other.killed;
        self.hospitalized += other.hospitalized;
        self.slightly_injured += other.slightly_injured;
    }
}

/**
 * Statistics of one cohort (pedestrians or cyclists).
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortStatistics {
    #[serde(flatten)]
    pub summary: VictimSummary,
    /**
     * Victims born after the report year minus 18.
     */
    pub children: i64,
}

impl CohortStatistics {
    pub fn new(summary: VictimSummary, children: i64) -> Self {
        CohortStatistics { summary, children }
    }
}

impl AddAssign for CohortStatistics {
    fn add_assign(&mut self, other: Self) {
        self.summary += other.summary;
        self.children += other.children;
    }
}

/**
 * Raw vehicle category code with the number of vehicle involvements carrying it.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleCategoryCount {
    pub category_code: String,
    pub count: i64,
}

impl VehicleCategoryCount {
    pub fn new(category_code: String, count: i64) -> Self {
        VehicleCategoryCount { category_code, count }
    }
}

/**
 * Vehicle involvements summed per transport mode.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportModeTally {
    pub mode: TransportMode,
    pub count: i64,
}

/**
 * One pedestrian or cyclist victim with the accident it was part of.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct VictimDetail {
    pub accident_id: String,
    pub date: NaiveDate,
    /**
     * Recorded time of day, absent when the stored value cannot be read.
     */
    pub time: Option<NaiveTime>,
    pub address: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub victim_type: VictimType,
    pub severity: Severity,
    /**
     * Distinct modes of every vehicle in the accident, sorted by label. Empty when the accident has no vehicle record.
     */
    pub transport_modes: Vec<TransportMode>,
}

/**
 * Query results for a single municipality code.
 */
#[derive(Debug, Clone, Default)]
pub struct MunicipalityStatistics {
    pub pedestrians: CohortStatistics,
    pub cyclists: CohortStatistics,
    pub pedestrian_vehicles: Vec<VehicleCategoryCount>,
    pub cyclist_vehicles: Vec<VehicleCategoryCount>,
    pub victims: Vec<VictimDetail>,
}

/**
 * Statistics of a whole municipality group.
 */
#[derive(Debug, Clone, Default)]
pub struct ConsolidatedStatistics {
    pub codes: Vec<String>,
    pub pedestrians: CohortStatistics,
    pub cyclists: CohortStatistics,
    pub pedestrian_vehicles: Vec<TransportModeTally>,
    pub cyclist_vehicles: Vec<TransportModeTally>,
    /**
     * Victims of every code ordered by accident date, then time of day.
     */
    pub victims: Vec<VictimDetail>,
}

/**
 * A primary municipality code and the sub-codes whose statistics are summed into its report.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunicipalityGroup {
    pub primary: String,
    pub children: Vec<String>,
}

impl MunicipalityGroup {
    /**
     * Creates a group. When no children are given and the primary code is a city recorded per
     * arrondissement, the arrondissement codes become the children.
     *
     * # Arguments
     * `primary`: The municipality code the report is named after.
     * `children`: Explicit sub-codes.
     */
    pub fn new(primary: String, children: Vec<String>) -> Self {
        let children = if children.is_empty() { Self::arrondissements(&primary) } else { children };
        MunicipalityGroup { primary, children }
    }

    /**
     * Returns the distinct codes of the group, primary first.
     */
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = Vec::with_capacity(self.children.len() + 1);
        for code in std::iter::once(&self.primary).chain(self.children.iter()) {
            if !codes.contains(code) {
                codes.push(code.clone());
            }
        }
        codes
    }

    /**
     * Validates every code of the group.
     *
     * # Returns
     * The group or an `InvalidInput` error naming the first malformed code.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        for code in std::iter::once(&self.primary).chain(self.children.iter()) {
            if code.len() != MUNICIPALITY_CODE_LENGTH || !code.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err(ApplicationError::new(ErrorType::InvalidInput, format!("Municipality code must be a {MUNICIPALITY_CODE_LENGTH} digit number: {code}")));
            }
        }
        Ok(self)
    }

    fn arrondissements(primary: &str) -> Vec<String> {
        ARRONDISSEMENT_CITIES
            .iter()
            .find(|(city, _, _)| *city == primary)
            .map(|(_, first, last)| (*first..=*last).map(|code| code.to_string()).collect())
            .unwrap_or_default()
    }
}

/**
 * Validated input of a report request.
 */
#[derive(Debug, Clone)]
pub struct ReportInputType {
    pub year: i32,
    pub group: MunicipalityGroup,
}

impl ReportInputType {
    pub fn new(year: i32, group: MunicipalityGroup) -> Self {
        ReportInputType { year, group }
    }

    pub fn validate(self) -> Result<Self, ApplicationError> {
        if !(1000..=9999).contains(&self.year) {
            return Err(ApplicationError::new(ErrorType::InvalidInput, format!("Year must have four digits: {}", self.year)));
        }
        let group = self.group.validate()?;
        Ok(ReportInputType { year: self.year, group })
    }
}

/**
 * One row of the detail table, all values rendered for display.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailTableRow {
    #[serde(rename = "Accident ID")]
    pub accident_id: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Victim type")]
    pub victim_type: String,
    #[serde(rename = "Severity")]
    pub severity: String,
    #[serde(rename = "Vehicles involved")]
    pub vehicles: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    pub longitude: String,
}

/**
 * Chronological victim table, or the explicit placeholder when nobody was recorded.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailTable {
    Rows(Vec<DetailTableRow>),
    NoVictims,
}

/**
 * Detail rows destined for download. Latitude and longitude are always kept.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub rows: Vec<DetailTableRow>,
}

/**
 * Everything produced for one report request.
 */
#[derive(Debug, Clone)]
pub struct AccidentReport {
    pub commune_name: String,
    pub year: i32,
    pub statistics: ConsolidatedStatistics,
    pub narrative: String,
    pub detail_table: DetailTable,
    /**
     * Absent when there is no detail row, so no download is offered.
     */
    pub export: Option<ExportTable>,
}
