use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::errors::ReaderError;
use crate::model::{ColumnKind, ReadOptions};
use crate::{parse_table, read_table};

fn fixture_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

fn fixture(path: &str) -> String {
    let full_path = fixture_path(path);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn toa5_options() -> ReadOptions {
    ReadOptions {
        skip_rows: vec![0, 3],
        header_rows: 2,
        ..ReadOptions::default()
    }
}

#[test]
fn reads_toa5_file_with_unit_row() {
    let parsed = read_table(&fixture_path("CR1000_meteo_20240115.dat"), &toa5_options())
        .expect("TOA5 read failed");

    assert_eq!(parsed.file_name, "CR1000_meteo_20240115.dat");
    assert_eq!(
        parsed.frame.get_column_names(),
        &["RECORD", "TA_Avg", "RH_Avg", "SW_IN_Avg", "STATUS"]
    );
    assert_eq!(
        parsed.units.as_deref(),
        Some(&["RN", "degC", "%", "W/m2", ""].map(String::from)[..])
    );
    assert_eq!(parsed.row_count(), 4);
    assert_eq!(parsed.frame.height(), 4);

    let first = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(0, 10, 0)
        .unwrap();
    assert_eq!(parsed.index[0], first);
    assert_eq!(
        parsed.index[3],
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 50, 0)
            .unwrap()
    );
}

#[test]
fn coerces_numeric_columns_and_keeps_text() {
    let parsed = read_table(&fixture_path("CR1000_meteo_20240115.dat"), &toa5_options())
        .expect("TOA5 read failed");

    assert_eq!(parsed.column_kind("TA_Avg"), Some(ColumnKind::Numeric));
    assert_eq!(parsed.column_kind("STATUS"), Some(ColumnKind::Text));

    let ta = parsed.frame.column("TA_Avg").unwrap().f64().unwrap();
    assert_eq!(ta.get(0), Some(-3.2));
    // "inf" is a missing-value marker
    assert_eq!(ta.get(3), None);

    let rh = parsed.frame.column("RH_Avg").unwrap().f64().unwrap();
    assert_eq!(rh.get(1), None);

    let status = parsed.frame.column("STATUS").unwrap().str().unwrap();
    assert_eq!(status.get(2), Some("fan"));
}

#[test]
fn skips_short_rows_and_bad_timestamps() {
    let parsed = read_table(&fixture_path("CR1000_meteo_20240115.dat"), &toa5_options())
        .expect("TOA5 read failed");

    let lines: Vec<usize> = parsed.skipped_rows.iter().map(|issue| issue.line_index).collect();
    assert_eq!(lines, vec![7, 8]);
    assert!(parsed.skipped_rows[1].message.contains("bad-timestamp"));
}

#[test]
fn reads_semicolon_file_with_custom_timestamp_format() {
    let options = ReadOptions {
        separator: ';',
        timestamp_format: "%d.%m.%Y %H:%M".to_string(),
        ..ReadOptions::default()
    };
    let parsed = parse_table(
        "profile_semicolon.csv",
        &fixture("profile_semicolon.csv"),
        &options,
    )
    .expect("semicolon read failed");

    assert!(parsed.units.is_none());
    assert_eq!(parsed.frame.get_column_names(), &["CO2_1", "H2O_1"]);
    let co2 = parsed.frame.column("CO2_1").unwrap().f64().unwrap();
    assert_eq!(co2.get(0), Some(412.5));
    assert_eq!(co2.get(1), None);
    let h2o = parsed.frame.column("H2O_1").unwrap().f64().unwrap();
    assert_eq!(h2o.get(2), None);
}

#[test]
fn timestamp_column_need_not_be_first() {
    let content = "a,when,b\n1,2024-03-01 00:30:00,x\n2,2024-03-01 01:00:00,y\n";
    let options = ReadOptions {
        timestamp_column: 1,
        ..ReadOptions::default()
    };
    let parsed = parse_table("mid.csv", content, &options).expect("read failed");
    assert_eq!(parsed.frame.get_column_names(), &["a", "b"]);
    assert_eq!(parsed.row_count(), 2);
}

#[test]
fn duplicate_header_names_are_made_unique() {
    let content = "ts,T,T\n2024-03-01 00:30:00,1,2\n";
    let parsed = parse_table("dup.csv", content, &ReadOptions::default()).expect("read failed");
    assert_eq!(parsed.frame.get_column_names(), &["T", "T.1"]);
}

#[test]
fn header_only_file_is_empty_data() {
    let err = parse_table("empty.csv", "ts,a\n", &ReadOptions::default())
        .expect_err("expected empty data error");
    assert!(matches!(err, ReaderError::EmptyData { .. }));
}

#[test]
fn out_of_range_timestamp_column_is_rejected() {
    let options = ReadOptions {
        timestamp_column: 5,
        ..ReadOptions::default()
    };
    let err = parse_table("narrow.csv", "ts,a\n2024-03-01 00:30:00,1\n", &options)
        .expect_err("expected missing timestamp column");
    assert!(matches!(
        err,
        ReaderError::MissingTimestampColumn { column: 5, width: 2, .. }
    ));
}

#[test]
fn date_only_formats_resolve_to_midnight() {
    let ts = crate::parse_timestamp("2024-03-01", "%Y-%m-%d").expect("date parse");
    assert_eq!(
        ts,
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    );
}
