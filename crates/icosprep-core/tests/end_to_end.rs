mod common;

use std::fs;

use chrono::NaiveDate;
use icosprep_core::ledger::Ledger;
use icosprep_core::{run_file_type, PipelineError, RunContext};
use tempfile::tempdir;

use common::{settings, ts, write_full_day, write_noon_to_noon};

#[test]
fn full_day_becomes_one_daily_file_and_rerun_writes_nothing() {
    let root = tempdir().expect("tempdir");
    let settings = settings(root.path(), "");
    let day = NaiveDate::from_ymd_opt(2024, 1, 15).expect("date");
    write_full_day(&settings.source_dir, day);
    let ctx = RunContext::at(ts(2024, 1, 16, 6, 0));

    let summary = run_file_type(&settings, 5, &ctx).expect("first run");

    assert_eq!(summary.files.len(), 1);
    assert_eq!(summary.files[0].file_name, "202401150000.dat");
    assert_eq!(summary.export.written.len(), 1);
    assert_eq!(summary.export.written[0].rows, 144);
    assert!(summary.format.partial_days_removed.is_empty());

    let out_file = settings
        .output_dir
        .join("2024/01/CH-Dav_BM_20240115_L01_F01.dat");
    let content = fs::read_to_string(&out_file).expect("daily file");
    let lines: Vec<&str> = content.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 145);
    assert_eq!(lines[0], r#""TIMESTAMP","TA_1_1_1","RH""#);
    assert_eq!(lines[1], r#""202401150010","0.0","80.0""#);
    assert_eq!(lines[144], r#""202401160000","71.5","80.0""#);

    let ledger = Ledger::open_or_create(&settings.ledger_path()).expect("ledger");
    assert!(ledger.contains("CH-Dav_BM_20240115_L01_F01.dat"));

    // The file may still feed the 16th, so it is read again, but its day
    // is not rewritten.
    let rerun = run_file_type(&settings, 5, &ctx).expect("second run");
    assert!(rerun.export.written.is_empty());
    assert_eq!(rerun.export.already_processed, vec![day]);
    let written: Vec<_> = fs::read_dir(settings.output_dir.join("2024/01"))
        .expect("output dir")
        .collect();
    assert_eq!(written.len(), 1);
}

#[test]
fn later_file_wins_for_duplicate_timestamps() {
    let root = tempdir().expect("tempdir");
    let settings = settings(root.path(), "");
    let day = NaiveDate::from_ymd_opt(2024, 1, 15).expect("date");
    let first = write_full_day(&settings.source_dir, day);
    let correction = first.with_file_name("202401151200.dat");
    fs::write(&correction, "TIMESTAMP,TA,RH\n2024-01-15 12:00:00,99,81\n").expect("write");
    let ctx = RunContext::at(ts(2024, 1, 16, 6, 0));

    let summary = run_file_type(&settings, 5, &ctx).expect("run");

    assert_eq!(summary.files.len(), 2);
    assert_eq!(summary.format.duplicates_removed, 1);
    let content = fs::read_to_string(
        settings
            .output_dir
            .join("2024/01/CH-Dav_BM_20240115_L01_F01.dat"),
    )
    .expect("daily file");
    assert!(content.contains(r#""202401151200","99.0","81.0""#));
}

#[test]
fn missing_source_tree_fails_with_no_files_found() {
    let root = tempdir().expect("tempdir");
    let settings = settings(root.path(), "");
    let ctx = RunContext::at(ts(2024, 1, 16, 6, 0));

    let err = run_file_type(&settings, 5, &ctx).expect_err("no files");

    assert!(matches!(err, PipelineError::NoFilesFound { .. }));
}

#[test]
fn partial_source_day_exports_nothing() {
    let root = tempdir().expect("tempdir");
    let settings = settings(root.path(), "");
    let dir = settings.source_dir.join("2024/01");
    fs::create_dir_all(&dir).expect("dir");
    fs::write(
        dir.join("202401150000.dat"),
        "TIMESTAMP,TA,RH\n2024-01-15 00:10:00,1,80\n2024-01-15 00:20:00,2,80\n",
    )
    .expect("write");
    let ctx = RunContext::at(ts(2024, 1, 16, 6, 0));

    let summary = run_file_type(&settings, 5, &ctx).expect("run");

    assert!(summary.export.written.is_empty());
    assert_eq!(summary.format.partial_days_removed.len(), 1);
    assert!(summary.ledger_entries.is_empty());
}

#[test]
fn file_crossing_midnight_still_feeds_the_next_day() {
    let root = tempdir().expect("tempdir");
    let settings = settings(root.path(), "");
    let date = |d| NaiveDate::from_ymd_opt(2024, 1, d).expect("date");
    write_noon_to_noon(&settings.source_dir, date(14));
    write_noon_to_noon(&settings.source_dir, date(15));

    let first = run_file_type(&settings, 5, &RunContext::at(ts(2024, 1, 16, 6, 0)))
        .expect("first run");
    let first_days: Vec<NaiveDate> = first.export.written.iter().map(|d| d.date).collect();
    assert_eq!(first_days, vec![date(15)]);

    write_noon_to_noon(&settings.source_dir, date(16));
    let second = run_file_type(&settings, 5, &RunContext::at(ts(2024, 1, 17, 6, 0)))
        .expect("second run");

    let names: Vec<&str> = second.files.iter().map(|f| f.file_name.as_str()).collect();
    assert!(names.contains(&"202401151200.dat"));
    let second_days: Vec<NaiveDate> = second.export.written.iter().map(|d| d.date).collect();
    assert_eq!(second_days, vec![date(16)]);
    assert_eq!(second.export.written[0].rows, 144);

    let content = fs::read_to_string(
        settings
            .output_dir
            .join("2024/01/CH-Dav_BM_20240116_L01_F01.dat"),
    )
    .expect("daily file");
    assert!(!content.contains("NaN"));
}
