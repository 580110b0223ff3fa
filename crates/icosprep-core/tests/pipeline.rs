use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use icosprep_core::config::{Config, Frequency};
use icosprep_core::pipeline::{self, ICOS_TIMESTAMP, ORIGINAL_TIMESTAMP};
use icosprep_core::{NormalizedTable, RunContext};
use polars::prelude::*;

const SETTINGS: &str = r#"
    [[file_types]]
    name = "10_meteo"
    source_dir = "/data/raw"
    output_dir = "/data/out"
    filename_pattern = "*.dat"

    [file_types.filename_date]
    year = [0, 4]
    month = [4, 6]
    day = [6, 8]

    [file_types.data]
    timestamp_format = "%Y-%m-%d %H:%M:%S"
    frequency = "10min"

    [file_types.output]
    filename_template = "CH-Dav_BM_{year}{month:02}{day:02}_L{logger:02}_F{file:02}.dat"
"#;

fn ts(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .expect("date")
        .and_hms_opt(h, m, 0)
        .expect("time")
}

fn ten_min() -> Frequency {
    "10min".parse().expect("frequency")
}

fn table(index: Vec<NaiveDateTime>, ta: Vec<f64>) -> NormalizedTable {
    NormalizedTable::new(index, df!["TA" => ta].expect("df"), None).expect("table")
}

fn ta_values(table: &NormalizedTable) -> Vec<Option<f64>> {
    table
        .frame()
        .column("TA")
        .expect("TA column")
        .f64()
        .expect("f64")
        .into_iter()
        .collect()
}

#[test]
fn duplicate_timestamps_keep_later_row() {
    let input = table(
        vec![ts(15, 0, 20), ts(15, 0, 10), ts(15, 0, 20)],
        vec![1.0, 2.0, 3.0],
    );

    let (deduped, removed) = pipeline::remove_duplicates(input).expect("dedupe");

    assert_eq!(removed, 1);
    assert_eq!(deduped.index(), &[ts(15, 0, 10), ts(15, 0, 20)]);
    assert_eq!(ta_values(&deduped), vec![Some(2.0), Some(3.0)]);
}

#[test]
fn reindex_fills_gaps_and_is_idempotent() {
    let input = table(vec![ts(15, 0, 10), ts(15, 0, 40)], vec![1.0, 4.0]);

    let (once, stats) = pipeline::reindex_to_frequency(input, ten_min()).expect("reindex");
    assert_eq!(stats.added, 2);
    assert_eq!(stats.off_grid, 0);
    assert_eq!(once.len(), 4);
    assert_eq!(ta_values(&once), vec![Some(1.0), None, None, Some(4.0)]);

    let (twice, stats) = pipeline::reindex_to_frequency(once.clone(), ten_min()).expect("reindex");
    assert_eq!(stats.added, 0);
    assert_eq!(twice.index(), once.index());
    assert_eq!(ta_values(&twice), ta_values(&once));
}

#[test]
fn reindex_drops_rows_between_grid_points() {
    let input = table(
        vec![ts(15, 0, 10), ts(15, 0, 15), ts(15, 0, 30)],
        vec![1.0, 1.5, 3.0],
    );

    let (reindexed, stats) = pipeline::reindex_to_frequency(input, ten_min()).expect("reindex");

    assert_eq!(stats.off_grid, 1);
    assert_eq!(stats.added, 1);
    assert_eq!(reindexed.index(), &[ts(15, 0, 10), ts(15, 0, 20), ts(15, 0, 30)]);
}

#[test]
fn renames_then_keeps_targets_then_strips_suffixes() {
    let input = NormalizedTable::new(
        vec![ts(15, 0, 10)],
        df!["TA_Avg" => [1.0f64], "RH_Avg" => [80.0f64], "BATT" => [12.8f64]].expect("df"),
        Some(vec!["degC".into(), "%".into(), "V".into()]),
    )
    .expect("table");
    let renames: BTreeMap<String, String> = [
        ("TA_Avg".to_string(), "TA_1_1_1_Avg".to_string()),
        ("RH_Avg".to_string(), "RH_1_1_1_Avg".to_string()),
    ]
    .into_iter()
    .collect();

    let (renamed, count) = pipeline::rename_columns(input, &renames).expect("rename");
    assert_eq!(count, 2);
    let (kept, dropped) =
        pipeline::keep_only_renamed_columns(renamed, &renames, true).expect("keep");
    assert_eq!(dropped, vec!["BATT".to_string()]);
    let stripped = pipeline::remove_suffixes(kept, &["_Avg".to_string()]).expect("suffixes");

    assert_eq!(stripped.column_names(), vec!["TA_1_1_1", "RH_1_1_1"]);
    assert_eq!(stripped.unit_of("RH_1_1_1"), Some("%"));
}

#[test]
fn icos_timestamp_is_first_column_with_unit() {
    let input = NormalizedTable::new(
        vec![ts(15, 0, 10)],
        df!["TA" => [1.0f64]].expect("df"),
        Some(vec!["degC".into()]),
    )
    .expect("table");

    let out = pipeline::insert_icos_timestamp(input, "%Y%m%d%H%M", true).expect("insert");

    assert_eq!(out.column_names(), vec![ICOS_TIMESTAMP, "TA", ORIGINAL_TIMESTAMP]);
    assert_eq!(out.units().expect("units")[0], "TS");
    let icos = out.frame().column(ICOS_TIMESTAMP).expect("col").str().expect("str").get(0);
    assert_eq!(icos, Some("202401150010"));
    let old = out.frame().column(ORIGINAL_TIMESTAMP).expect("col").str().expect("str").get(0);
    assert_eq!(old, Some("2024-01-15 00:10:00"));
}

#[test]
fn format_table_exports_only_complete_days() {
    let config = Config::from_toml_str(SETTINGS).expect("config");
    let settings = config.file_type("10_meteo").expect("settings");
    let ctx = RunContext::at(ts(16, 6, 0));

    // One stray record late on the 14th, a full 15th (00:10 through 24:00)
    // and a record from today.
    let mut index = vec![ts(14, 23, 50)];
    let mut t = ts(15, 0, 10);
    while t <= ts(16, 0, 0) {
        index.push(t);
        t += Duration::minutes(10);
    }
    index.push(ts(16, 0, 10));
    let values: Vec<f64> = (0..index.len()).map(|i| i as f64).collect();
    let input = table(index, values);

    let (out, report) = pipeline::format_table(input, settings, &ctx).expect("format");

    assert_eq!(out.len(), 144);
    assert_eq!(report.today_rows_removed, 1);
    assert_eq!(
        report.partial_days_removed,
        vec![NaiveDate::from_ymd_opt(2024, 1, 14).expect("date")]
    );
    assert_eq!(out.index()[0], ts(15, 0, 5));
    assert_eq!(out.index()[143], ts(15, 23, 55));

    let icos = out.frame().column(ICOS_TIMESTAMP).expect("col").str().expect("str");
    assert_eq!(icos.get(0), Some("202401150010"));
    assert_eq!(icos.get(143), Some("202401160000"));
}

#[test]
fn suffixes_are_removed_anywhere_in_the_name() {
    let input = NormalizedTable::new(
        vec![ts(15, 0, 10)],
        df!["TA_Avg_1" => [1.0f64], "SW_IN_Avg_Tot" => [2.0f64]].expect("df"),
        None,
    )
    .expect("table");

    let out = pipeline::remove_suffixes(input, &["_Avg".to_string(), "_Tot".to_string()])
        .expect("suffixes");

    assert_eq!(out.column_names(), vec!["TA_1", "SW_IN"]);
}
