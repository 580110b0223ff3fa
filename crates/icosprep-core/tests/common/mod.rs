#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use icosprep_core::config::{Config, FileTypeSettings};

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .expect("date")
        .and_hms_opt(h, min, 0)
        .expect("time")
}

/// Settings for a 10-minute meteo file type rooted in `root`. `extra_output` is
/// appended to the `[file_types.output]` table.
pub fn settings(root: &Path, extra_output: &str) -> FileTypeSettings {
    let content = format!(
        r#"
        [[file_types]]
        name = "10_meteo"
        source_dir = "{source}"
        output_dir = "{output}"
        filename_pattern = "*.dat"

        [file_types.filename_date]
        year = [0, 4]
        month = [4, 6]
        day = [6, 8]
        hour = [8, 10]
        minute = [10, 12]

        [file_types.data]
        timestamp_format = "%Y-%m-%d %H:%M:%S"
        frequency = "10min"

        [file_types.format]
        rename_columns = {{ TA = "TA_1_1_1" }}

        [file_types.output]
        filename_template = "CH-Dav_BM_{{year}}{{month:02}}{{day:02}}_L{{logger:02}}_F{{file:02}}.dat"
        {extra_output}
        "#,
        source = root.join("raw").display(),
        output = root.join("out").display(),
    );
    Config::from_toml_str(&content)
        .expect("config")
        .file_types
        .remove(0)
}

/// Writes a source file holding every 10-minute record that closes an
/// interval on `date` (00:10 through 24:00).
pub fn write_full_day(source_dir: &Path, date: NaiveDate) -> PathBuf {
    let start = date.and_hms_opt(0, 10, 0).expect("time");
    write_day_of_records(source_dir, start, "0000")
}

/// Writes a logger file running from noon on `date` to noon the next day.
pub fn write_noon_to_noon(source_dir: &Path, date: NaiveDate) -> PathBuf {
    let start = date.and_hms_opt(12, 10, 0).expect("time");
    write_day_of_records(source_dir, start, "1200")
}

fn write_day_of_records(source_dir: &Path, start: NaiveDateTime, hhmm: &str) -> PathBuf {
    let date = start.date();
    let dir = source_dir
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string());
    fs::create_dir_all(&dir).expect("create source dir");

    let mut content = String::from("TIMESTAMP,TA,RH\n");
    let mut t = start;
    let end = start + Duration::days(1);
    let mut i = 0;
    while t < end {
        content.push_str(&format!(
            "{},{},80\n",
            t.format("%Y-%m-%d %H:%M:%S"),
            i as f64 / 2.0
        ));
        t += Duration::minutes(10);
        i += 1;
    }

    let path = dir.join(format!("{}{hhmm}.dat", date.format("%Y%m%d")));
    fs::write(&path, content).expect("write source file");
    path
}
