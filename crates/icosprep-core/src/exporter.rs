use std::fs::{self, File};
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use ::zip::{write::FileOptions, CompressionMethod, ZipWriter};
use chrono::{Local, NaiveDate};
use polars::prelude::*;

use crate::config::{FileTypeSettings, OutputSettings};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::naming::{dated_subdir, OutputNames};
use crate::run::Section;
use crate::table::NormalizedTable;

const MISSING: &str = "NaN";

/// One daily file that was written and recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDay {
    pub date: NaiveDate,
    pub rows: usize,
    /// Final artifact on disk: the zip when compressing.
    pub path: PathBuf,
    pub ledger_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub written: Vec<ExportedDay>,
    /// Days whose output name was already in the ledger.
    pub already_processed: Vec<NaiveDate>,
}

/// Writes one file per calendar day of the (midpoint) index.
pub fn export_daily(
    table: &NormalizedTable,
    settings: &FileTypeSettings,
    ledger: &mut Ledger,
) -> Result<ExportReport> {
    let _section = Section::start("save data");
    let mut report = ExportReport::default();

    for (date, rows) in day_ranges(table) {
        let names = OutputNames::for_date(&settings.output, date);
        if ledger.contains(&names.ledger_name) {
            tracing::info!(%date, file = %names.ledger_name, "already in ledger, not exporting");
            report.already_processed.push(date);
            continue;
        }

        let dir = dated_subdir(&settings.output_dir, date);
        fs::create_dir_all(&dir)?;
        let csv_path = dir.join(&names.file_name);
        let row_count = rows.len();
        write_day_csv(table, rows, &csv_path, &settings.output)?;
        tracing::info!(%date, path = %csv_path.display(), rows = row_count, "saved daily file");

        let path = if settings.output.compression {
            let zip_path = dir.join(&names.zip_name);
            compress(&csv_path, &zip_path, &names.file_name)?;
            tracing::info!(path = %zip_path.display(), "compressed daily file");
            if settings.output.delete_uncompressed {
                fs::remove_file(&csv_path)?;
                tracing::info!(path = %csv_path.display(), "deleted uncompressed file");
            }
            zip_path
        } else {
            csv_path
        };

        ledger.record(&names.ledger_name, Local::now().naive_local())?;
        report.written.push(ExportedDay {
            date,
            rows: row_count,
            path,
            ledger_name: names.ledger_name,
        });
    }

    tracing::info!(
        written = report.written.len(),
        skipped = report.already_processed.len(),
        "export finished"
    );
    Ok(report)
}

/// Contiguous row ranges sharing one calendar date. The index is sorted.
fn day_ranges(table: &NormalizedTable) -> Vec<(NaiveDate, Range<usize>)> {
    let mut ranges: Vec<(NaiveDate, Range<usize>)> = Vec::new();
    for (row, ts) in table.index().iter().enumerate() {
        let date = ts.date();
        match ranges.last_mut() {
            Some((current, range)) if *current == date => range.end = row + 1,
            _ => ranges.push((date, row..row + 1)),
        }
    }
    ranges
}

enum Cells<'a> {
    Numeric(&'a Float64Chunked),
    Text(&'a StringChunked),
}

impl Cells<'_> {
    fn render(&self, row: usize) -> String {
        match self {
            Cells::Numeric(values) => match values.get(row) {
                Some(value) => format_float(value),
                None => MISSING.to_string(),
            },
            Cells::Text(values) => match values.get(row) {
                Some(value) => value.to_string(),
                None => MISSING.to_string(),
            },
        }
    }
}

fn write_day_csv(
    table: &NormalizedTable,
    rows: Range<usize>,
    path: &Path,
    output: &OutputSettings,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(output.line_terminator.to_csv())
        .from_path(path)?;

    if output.header_output {
        writer.write_record(table.column_names())?;
        if let Some(units) = table.units() {
            writer.write_record(units)?;
        }
    }

    let columns = table
        .frame()
        .get_columns()
        .iter()
        .map(|column| match column.dtype() {
            DataType::Float64 => column.f64().map(Cells::Numeric),
            _ => column.str().map(Cells::Text),
        })
        .collect::<PolarsResult<Vec<_>>>()?;

    for row in rows {
        writer.write_record(columns.iter().map(|cells| cells.render(row)))?;
    }
    writer.flush()?;
    Ok(())
}

fn compress(source: &Path, zip_path: &Path, entry_name: &str) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options)?;
    io::copy(&mut File::open(source)?, &mut zip)?;
    zip.finish()?;
    Ok(())
}

/// Whole numbers keep one decimal (`2.0`), everything else prints at full
/// precision.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        MISSING.to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_render_like_source_values() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(12.345), "12.345");
        assert_eq!(format_float(f64::NAN), "NaN");
    }
}
