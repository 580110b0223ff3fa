use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::model::ColumnKind;

/// Parses a row timestamp with the configured chrono format. Date-only formats
/// resolve to midnight.
pub fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(trimmed, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn parse_optional_f64(value: Option<&str>) -> Result<Option<f64>, String> {
    match value.map(str::trim) {
        None => Ok(None),
        Some(trimmed) => trimmed
            .parse::<f64>()
            .map(Some)
            .map_err(|err| format!("'{trimmed}': {err}")),
    }
}

/// Builds a column from raw cells, converting to `Float64` when every present
/// value parses as a number. Columns that do not convert stay text and the
/// first offending value is logged.
pub(crate) fn coerce_column(
    file: &str,
    name: &str,
    cells: Vec<Option<String>>,
) -> (Series, ColumnKind) {
    let mut numeric = Vec::with_capacity(cells.len());
    let mut failure = None;
    for cell in &cells {
        match parse_optional_f64(cell.as_deref()) {
            Ok(value) => numeric.push(value),
            Err(reason) => {
                failure = Some(reason);
                break;
            }
        }
    }

    match failure {
        None => (Series::new(name.into(), numeric), ColumnKind::Numeric),
        Some(reason) => {
            tracing::warn!(
                file,
                column = name,
                reason = %reason,
                "column could not be converted to numeric, kept as text"
            );
            (Series::new(name.into(), cells), ColumnKind::Text)
        }
    }
}

/// Makes header names unique by suffixing repeats with `.1`, `.2`, ...
pub(crate) fn dedupe_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for name in names {
        let mut candidate = name.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{name}.{n}");
            n += 1;
        }
        seen.push(candidate.clone());
        out.push(candidate);
    }
    out
}
