use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{FileTypeSettings, FormatSettings, Frequency};
use crate::error::{PipelineError, Result};
use crate::run::{RunContext, Section};
use crate::table::NormalizedTable;

pub const ICOS_TIMESTAMP: &str = "TIMESTAMP";
pub const ICOS_TIMESTAMP_UNIT: &str = "TS";
pub const ORIGINAL_TIMESTAMP: &str = "_TIMESTAMP_OLD";
const ORIGINAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What the reformatting stages changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    pub renamed_columns: usize,
    pub duplicates_removed: usize,
    pub dropped_columns: Vec<String>,
    pub timestamps_added: usize,
    pub off_grid_dropped: usize,
    pub today_rows_removed: usize,
    pub partial_days_removed: Vec<NaiveDate>,
}

/// Runs every reformatting stage in order.
pub fn format_table(
    table: NormalizedTable,
    settings: &FileTypeSettings,
    ctx: &RunContext,
) -> Result<(NormalizedTable, FormatReport)> {
    let _section = Section::start("format data");
    let format: &FormatSettings = &settings.format;
    let frequency = settings.data.frequency;
    let mut report = FormatReport::default();

    let (table, renamed) = rename_columns(table, &format.rename_columns)?;
    report.renamed_columns = renamed;

    let (table, duplicates) = remove_duplicates(table)?;
    report.duplicates_removed = duplicates;

    let (table, dropped) =
        keep_only_renamed_columns(table, &format.rename_columns, format.keep_only_renamed)?;
    report.dropped_columns = dropped;

    let table = remove_suffixes(table, &format.remove_suffixes)?;

    let (table, stats) = reindex_to_frequency(table, frequency)?;
    report.timestamps_added = stats.added;
    report.off_grid_dropped = stats.off_grid;

    let table = insert_icos_timestamp(
        table,
        &format.icos_timestamp_format,
        format.keep_original_timestamp,
    )?;

    let (table, today_rows) = remove_today(table, ctx.start_of_today())?;
    report.today_rows_removed = today_rows;

    let table = shift_to_midpoint(table, frequency);

    let (table, partial) = remove_partial_days(table, frequency)?;
    report.partial_days_removed = partial;

    tracing::info!(
        rows = table.len(),
        columns = table.frame().width(),
        "data formatted"
    );
    Ok((table, report))
}

/// Applies `old -> new` renames all at once. Returns how many columns were
/// renamed.
pub fn rename_columns(
    mut table: NormalizedTable,
    renames: &BTreeMap<String, String>,
) -> Result<(NormalizedTable, usize)> {
    if renames.is_empty() {
        tracing::info!("no column renames configured");
        return Ok((table, 0));
    }

    let mut renamed = 0;
    let names: Vec<String> = table
        .column_names()
        .into_iter()
        .map(|name| match renames.get(&name) {
            Some(new) => {
                tracing::info!(from = %name, to = %new, "renaming column");
                renamed += 1;
                new.clone()
            }
            None => name,
        })
        .collect();

    for old in renames.keys() {
        if table.frame().get_column_index(old).is_none() {
            tracing::warn!(column = %old, "column to rename not found in data");
        }
    }

    table.set_column_names(names)?;
    Ok((table, renamed))
}

/// Keeps the last row for each repeated timestamp and sorts the index.
pub fn remove_duplicates(table: NormalizedTable) -> Result<(NormalizedTable, usize)> {
    let mut last_row: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
    for (row, ts) in table.index().iter().enumerate() {
        last_row.insert(*ts, row);
    }
    let removed = table.len() - last_row.len();
    let sorted = table.index().windows(2).all(|pair| pair[0] < pair[1]);
    if removed == 0 && sorted {
        tracing::info!("no duplicate timestamps found");
        return Ok((table, 0));
    }

    if removed > 0 {
        tracing::warn!(removed, "removed rows with duplicate timestamps, kept last");
    }
    let (index, rows): (Vec<NaiveDateTime>, Vec<Option<usize>>) = last_row
        .into_iter()
        .map(|(ts, row)| (ts, Some(row)))
        .unzip();
    Ok((table.gather(index, &rows)?, removed))
}

/// Drops every column that is not a rename target. Does nothing unless
/// `keep_only` is set and renames are configured.
pub fn keep_only_renamed_columns(
    mut table: NormalizedTable,
    renames: &BTreeMap<String, String>,
    keep_only: bool,
) -> Result<(NormalizedTable, Vec<String>)> {
    if !keep_only || renames.is_empty() {
        return Ok((table, Vec::new()));
    }

    let targets: Vec<&str> = renames.values().map(String::as_str).collect();
    let dropped: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|name| !targets.contains(&name.as_str()))
        .collect();
    table.retain_columns(|name| targets.contains(&name))?;
    tracing::info!(dropped = ?dropped, "kept only renamed columns");
    Ok((table, dropped))
}

/// Removes every occurrence of each configured suffix from every column
/// name, one suffix after another.
pub fn remove_suffixes(mut table: NormalizedTable, suffixes: &[String]) -> Result<NormalizedTable> {
    if suffixes.is_empty() {
        return Ok(table);
    }

    let names: Vec<String> = table
        .column_names()
        .into_iter()
        .map(|name| {
            let stripped = suffixes
                .iter()
                .filter(|s| !s.is_empty())
                .fold(name.clone(), |acc, suffix| acc.replace(suffix.as_str(), ""));
            if stripped != name {
                tracing::info!(from = %name, to = %stripped, "removed suffix");
            }
            stripped
        })
        .collect();
    table.set_column_names(names)?;
    Ok(table)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexStats {
    pub added: usize,
    pub off_grid: usize,
}

/// Puts the table on a continuous grid from the first to the last timestamp.
/// Missing timestamps become empty rows; rows between grid points are
/// dropped. Expects a sorted, unique index.
pub fn reindex_to_frequency(
    table: NormalizedTable,
    frequency: Frequency,
) -> Result<(NormalizedTable, ReindexStats)> {
    let (Some(first), Some(last)) = (table.index().first(), table.index().last()) else {
        return Ok((table, ReindexStats::default()));
    };
    let (first, last) = (*first, *last);

    let step = frequency.as_duration();
    let mut grid = Vec::new();
    let mut ts = first;
    while ts <= last {
        grid.push(ts);
        ts += step;
    }

    if grid.as_slice() == table.index() {
        tracing::info!(rows = grid.len(), %frequency, "timestamps already continuous");
        return Ok((table, ReindexStats::default()));
    }

    let positions: HashMap<NaiveDateTime, usize> = table
        .index()
        .iter()
        .enumerate()
        .map(|(row, ts)| (*ts, row))
        .collect();
    let rows: Vec<Option<usize>> = grid.iter().map(|ts| positions.get(ts).copied()).collect();
    let matched = rows.iter().flatten().count();
    let stats = ReindexStats {
        added: grid.len() - matched,
        off_grid: table.len() - matched,
    };

    if stats.off_grid > 0 {
        tracing::warn!(dropped = stats.off_grid, %frequency, "dropped rows off the frequency grid");
    }
    tracing::info!(added = stats.added, rows = grid.len(), %frequency, "reindexed to continuous timestamps");

    Ok((table.gather(grid, &rows)?, stats))
}

/// Inserts the formatted `TIMESTAMP` column in front, and `_TIMESTAMP_OLD`
/// at the end when requested.
pub fn insert_icos_timestamp(
    mut table: NormalizedTable,
    icos_format: &str,
    keep_original: bool,
) -> Result<NormalizedTable> {
    if table.frame().get_column_index(ICOS_TIMESTAMP).is_some() {
        return Err(PipelineError::Processing(format!(
            "data already has a '{ICOS_TIMESTAMP}' column"
        )));
    }

    let icos: Vec<String> = table
        .index()
        .iter()
        .map(|ts| ts.format(icos_format).to_string())
        .collect();
    table.insert_first(ICOS_TIMESTAMP, icos, ICOS_TIMESTAMP_UNIT)?;
    tracing::info!(format = icos_format, "inserted ICOS timestamp column");

    if keep_original {
        let original: Vec<String> = table
            .index()
            .iter()
            .map(|ts| ts.format(ORIGINAL_TIMESTAMP_FORMAT).to_string())
            .collect();
        table.push_column(ORIGINAL_TIMESTAMP, original, "")?;
        tracing::info!("kept original timestamp column");
    }
    Ok(table)
}

/// Drops rows after today's midnight; the running day is incomplete.
pub fn remove_today(
    table: NormalizedTable,
    start_of_today: NaiveDateTime,
) -> Result<(NormalizedTable, usize)> {
    let keep: Vec<bool> = table.index().iter().map(|ts| *ts <= start_of_today).collect();
    let removed = keep.iter().filter(|keep| !**keep).count();
    if removed == 0 {
        return Ok((table, 0));
    }
    tracing::info!(removed, after = %start_of_today, "removed rows from today");
    Ok((table.filter_rows(&keep)?, removed))
}

/// Moves the index from interval end to interval middle.
pub fn shift_to_midpoint(mut table: NormalizedTable, frequency: Frequency) -> NormalizedTable {
    let half = frequency.half();
    table.map_index(|ts| ts - half);
    tracing::info!(shift_s = half.num_seconds(), "shifted index to interval midpoint");
    table
}

/// Drops calendar days that do not hold exactly one record per interval.
pub fn remove_partial_days(
    table: NormalizedTable,
    frequency: Frequency,
) -> Result<(NormalizedTable, Vec<NaiveDate>)> {
    let expected = frequency.records_per_day().ok_or_else(|| {
        PipelineError::Processing(format!("frequency {frequency} does not divide a day"))
    })?;

    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for ts in table.index() {
        *counts.entry(ts.date()).or_default() += 1;
    }
    let partial: Vec<NaiveDate> = counts
        .iter()
        .filter(|(_, count)| **count != expected)
        .map(|(date, _)| *date)
        .collect();
    if partial.is_empty() {
        return Ok((table, partial));
    }

    for date in &partial {
        tracing::info!(%date, records = counts[date], expected, "removed partial day");
    }
    let keep: Vec<bool> = table
        .index()
        .iter()
        .map(|ts| !partial.contains(&ts.date()))
        .collect();
    Ok((table.filter_rows(&keep)?, partial))
}
