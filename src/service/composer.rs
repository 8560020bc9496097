use std::fmt::Write;

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{AccidentReport, CohortStatistics, ConsolidatedStatistics, DetailTable, DetailTableRow, ExportTable, TransportModeTally, VictimDetail},
};

/**
 * Singular and plural form of a word or phrase, chosen by a count.
 */
#[derive(Debug, Clone, Copy)]
pub struct Agreement {
    singular: &'static str,
    plural: &'static str,
}

impl Agreement {
    pub const fn new(singular: &'static str, plural: &'static str) -> Self {
        Agreement { singular, plural }
    }

    /**
     * Returns the form agreeing with `count`: singular for exactly one, plural otherwise.
     */
    pub fn for_count(&self, count: i64) -> &'static str {
        if count == 1 { self.singular } else { self.plural }
    }
}

const PERSON: Agreement = Agreement::new("person", "people");
const CHILD: Agreement = Agreement::new("child", "children");
const PEDESTRIAN: Agreement = Agreement::new("pedestrian", "pedestrians");
const CYCLIST: Agreement = Agreement::new("cyclist", "cyclists");
const ACCIDENT: Agreement = Agreement::new("accident", "accidents");
const WAS: Agreement = Agreement::new("was", "were");

const NO_PEDESTRIAN_COLLISION: &str = "- No collision with an external vehicle recorded.";
const NO_CYCLIST_COLLISION: &str = "- No collision with an external vehicle recorded (victims only in single-vehicle accidents).";
const NO_VICTIMS: &str = "- No victims recorded.";
const NO_VEHICLE: &str = "No vehicle";
const UNKNOWN_VALUE: &str = "";

/**
 * Composes the report of a municipality group.
 *
 * # Arguments
 * `statistics`: The consolidated statistics.
 * `commune_name`: Display name of the primary municipality.
 * `year`: The report year.
 *
 * # Returns
 * The `AccidentReport` with narrative, detail table and, when there are victims, the export table.
 */
pub fn compose(statistics: ConsolidatedStatistics, commune_name: &str, year: i32) -> AccidentReport {
    let narrative = narrative(&statistics, commune_name, year);
    let rows = detail_rows(&statistics.victims);
    let (detail_table, export) = if rows.is_empty() { (DetailTable::NoVictims, None) } else { (DetailTable::Rows(rows.clone()), Some(ExportTable { rows })) };
    AccidentReport { commune_name: commune_name.to_string(), year, statistics, narrative, detail_table, export }
}

fn narrative(statistics: &ConsolidatedStatistics, commune_name: &str, year: i32) -> String {
    let mut text = headline(&statistics.pedestrians, &statistics.cyclists, commune_name, year);
    text.push_str("## 🚶 Pedestrians\n\n");
    text.push_str(&cohort_paragraph(&statistics.pedestrians, PEDESTRIAN));
    text.push_str(&vehicle_list(&statistics.pedestrian_vehicles, NO_PEDESTRIAN_COLLISION));
    text.push_str("## 🚴 Cyclists\n\n");
    text.push_str(&cohort_paragraph(&statistics.cyclists, CYCLIST));
    text.push_str(&vehicle_list(&statistics.cyclist_vehicles, NO_CYCLIST_COLLISION));
    text
}

fn headline(pedestrians: &CohortStatistics, cyclists: &CohortStatistics, commune_name: &str, year: i32) -> String {
    let total = pedestrians.summary.total + cyclists.summary.total;
    let children = pedestrians.children + cyclists.children;
    let mut text = format!("# Road accident analysis {year} for the municipality of {commune_name}\n\n");
    let _ = writeln!(
        text,
        "In {year}, **{total}** {} on foot or by bicycle, including **{children} {}**, {} injured or killed in the municipality:\n",
        PERSON.for_count(total),
        CHILD.for_count(children),
        WAS.for_count(total)
    );
    let _ = writeln!(text, "- **{} {}** (including **{} {}**)", pedestrians.summary.total, PEDESTRIAN.for_count(pedestrians.summary.total), pedestrians.children, CHILD.for_count(pedestrians.children));
    let _ = writeln!(text, "- **{} {}** (including **{} {}**)\n", cyclists.summary.total, CYCLIST.for_count(cyclists.summary.total), cyclists.children, CHILD.for_count(cyclists.children));
    text
}

/**
 * Totals of one cohort. The fatality clause only appears when someone was killed.
 */
fn cohort_paragraph(cohort: &CohortStatistics, noun: Agreement) -> String {
    let summary = &cohort.summary;
    let mut text = format!(
        "Of the **{}** {} injured or killed in accidents, **{}** {} hospitalized",
        summary.total,
        noun.for_count(summary.total),
        summary.hospitalized,
        WAS.for_count(summary.hospitalized)
    );
    if summary.killed > 0 {
        let _ = write!(text, ", and **{}** {} killed", summary.killed, WAS.for_count(summary.killed));
    }
    text.push_str(".\n\n");
    text
}

fn vehicle_list(tally: &[TransportModeTally], none_line: &str) -> String {
    let mut text = String::from("### Vehicles involved\n\n");
    if tally.is_empty() {
        let _ = writeln!(text, "{none_line}\n");
        return text;
    }
    for entry in tally {
        let _ = writeln!(text, "- {} {} involving a **{}**", entry.count, ACCIDENT.for_count(entry.count), entry.mode.label());
    }
    text.push('\n');
    text
}

/**
 * Renders victims as detail table rows, keeping their order.
 */
pub fn detail_rows(victims: &[VictimDetail]) -> Vec<DetailTableRow> {
    victims
        .iter()
        .map(|victim| DetailTableRow {
            accident_id: victim.accident_id.clone(),
            date: victim.date.format("%Y-%m-%d").to_string(),
            victim_type: victim.victim_type.label().to_string(),
            severity: victim.severity.label().to_string(),
            vehicles: if victim.transport_modes.is_empty() {
                NO_VEHICLE.to_string()
            } else {
                victim.transport_modes.iter().map(|mode| mode.label()).collect::<Vec<&str>>().join(", ")
            },
            address: victim.address.clone().unwrap_or_else(|| UNKNOWN_VALUE.to_string()),
            latitude: victim.latitude.clone().unwrap_or_else(|| UNKNOWN_VALUE.to_string()),
            longitude: victim.longitude.clone().unwrap_or_else(|| UNKNOWN_VALUE.to_string()),
        })
        .collect()
}

/**
 * Renders the detail table as markdown for display. Latitude and longitude are left out.
 */
pub fn render_detail_table(detail_table: &DetailTable) -> String {
    let DetailTable::Rows(rows) = detail_table else {
        return format!("{NO_VICTIMS}\n");
    };
    let mut text = String::from("| Accident ID | Date | Victim type | Severity | Vehicles involved | Address |\n");
    text.push_str("| --- | --- | --- | --- | --- | --- |\n");
    for row in rows {
        let cells = [&row.accident_id, &row.date, &row.victim_type, &row.severity, &row.vehicles, &row.address];
        let cells: Vec<String> = cells.iter().map(|cell| cell.replace('|', "\\|")).collect();
        let _ = writeln!(text, "| {} |", cells.join(" | "));
    }
    text
}

/**
 * Serializes the export table as UTF-8 CSV with a header row.
 *
 * # Returns
 * A Result containing the CSV bytes or an `Export` error.
 */
pub fn export_csv(export: &ExportTable) -> Result<Vec<u8>, ApplicationError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &export.rows {
        writer.serialize(row).map_err(|err| ApplicationError::new(ErrorType::Export, format!("Failed to write export row: {err}")))?;
    }
    writer.into_inner().map_err(|err| ApplicationError::new(ErrorType::Export, format!("Failed to finish export: {err}")))
}
