use std::{collections::HashMap, fmt::Display};

use crate::model::models::{TransportMode, TransportModeTally, VehicleCategoryCount};

/**
 * Classifies a raw vehicle category code (`catv`). The code is zero padded to two characters
 * before the lookup, so `1`, `01` and `1.0` are the same category. Unknown codes are `Other`.
 *
 * # Arguments
 * `category_code`: The raw code as stored, text or number.
 *
 * # Returns
 * The transport mode of the code.
 */
pub fn classify(category_code: impl Display) -> TransportMode {
    let raw = category_code.to_string();
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    match format!("{trimmed:0>2}").as_str() {
        "03" | "07" | "10" => TransportMode::Automobile,
        "13" | "14" | "15" | "16" | "17" => TransportMode::HeavyGoodsVehicle,
        "01" | "80" => TransportMode::Bicycle,
        "02" | "30" | "31" | "32" | "33" | "34" => TransportMode::MotorizedTwoWheeler,
        "37" | "38" => TransportMode::BusOrCoach,
        _ => TransportMode::Other,
    }
}

/**
 * Groups a raw category tally by transport mode.
 *
 * # Arguments
 * `tally`: Raw category codes with counts. The same code may appear several times.
 *
 * # Returns
 * One entry per mode, by descending count, ties by label.
 */
pub fn group_by_mode(tally: &[VehicleCategoryCount]) -> Vec<TransportModeTally> {
    let mut counts: HashMap<TransportMode, i64> = HashMap::new();
    for entry in tally {
        *counts.entry(classify(&entry.category_code)).or_insert(0) += entry.count;
    }
    let mut grouped: Vec<TransportModeTally> = counts.into_iter().map(|(mode, count)| TransportModeTally { mode, count }).collect();
    grouped.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.mode.label().cmp(b.mode.label())));
    grouped
}

/**
 * Distinct modes of a list of raw codes, sorted by label.
 */
pub fn distinct_modes<'a>(category_codes: impl IntoIterator<Item = &'a str>) -> Vec<TransportMode> {
    let mut modes: Vec<TransportMode> = category_codes.into_iter().map(classify).collect();
    modes.sort_by(|a, b| a.label().cmp(b.label()));
    modes.dedup();
    modes
}
