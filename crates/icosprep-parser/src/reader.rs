use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use polars::prelude::*;

use crate::errors::{ReaderError, RowIssue};
use crate::model::{ColumnKind, ParsedTable, ReadOptions};
use crate::values::{coerce_column, dedupe_names, parse_timestamp};

/// Reads one delimited logger file from disk.
pub fn read_table(path: &Path, options: &ReadOptions) -> Result<ParsedTable, ReaderError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let bytes = fs::read(path).map_err(|source| ReaderError::Io {
        file: file_name.clone(),
        source,
    })?;
    let content = String::from_utf8_lossy(&bytes);
    let table = parse_table(&file_name, &content, options)?;

    tracing::info!(
        file = %file_name,
        path = %path.display(),
        rows = table.row_count(),
        columns = table.column_count(),
        skipped = table.skipped_rows.len(),
        "read source file"
    );
    Ok(table)
}

pub fn parse_table(
    file_name: &str,
    content: &str,
    options: &ReadOptions,
) -> Result<ParsedTable, ReaderError> {
    let delimiter = u8::try_from(options.separator)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ReaderError::InvalidHeader {
            file: file_name.to_string(),
            row_index: 0,
            message: format!("separator '{}' is not a single ASCII character", options.separator),
        })?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records: Vec<(usize, StringRecord)> = Vec::new();
    for (line_index, record) in reader.records().enumerate() {
        let record = record.map_err(|source| ReaderError::Csv {
            file: file_name.to_string(),
            source,
        })?;
        if options.skip_rows.contains(&line_index) {
            continue;
        }
        records.push((line_index, record));
    }

    let header_rows = options.header_rows.max(1);
    if records.len() < header_rows {
        return Err(ReaderError::InvalidHeader {
            file: file_name.to_string(),
            row_index: records.len(),
            message: format!("expected {header_rows} header rows before the data"),
        });
    }

    let (_, name_record) = &records[0];
    let names = dedupe_names(name_record.iter().map(|name| name.trim().to_string()));
    let width = names.len();

    let units = if header_rows > 1 {
        let (unit_line, unit_record) = &records[1];
        if unit_record.len() != width {
            return Err(ReaderError::InvalidHeader {
                file: file_name.to_string(),
                row_index: *unit_line,
                message: format!("unit row has {} fields, expected {width}", unit_record.len()),
            });
        }
        Some(
            unit_record
                .iter()
                .map(|unit| unit.trim().to_string())
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    let ts_col = options.timestamp_column;
    if ts_col >= width {
        return Err(ReaderError::MissingTimestampColumn {
            file: file_name.to_string(),
            column: ts_col,
            width,
        });
    }

    let mut index = Vec::new();
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width - 1];
    let mut skipped_rows = Vec::new();

    for (line_index, record) in records.iter().skip(header_rows) {
        if record.len() != width {
            skipped_rows.push(RowIssue::new(
                *line_index,
                format!("expected {width} fields, found {}", record.len()),
            ));
            continue;
        }

        let raw_ts = record.get(ts_col).unwrap_or_default();
        let Some(timestamp) = parse_timestamp(raw_ts, &options.timestamp_format) else {
            skipped_rows.push(RowIssue::new(
                *line_index,
                format!(
                    "invalid timestamp '{}' for format '{}'",
                    raw_ts.trim(),
                    options.timestamp_format
                ),
            ));
            continue;
        };
        index.push(timestamp);

        let data_fields = record
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != ts_col)
            .map(|(_, field)| field);
        for (slot, field) in cells.iter_mut().zip(data_fields) {
            if options.is_na(field) {
                slot.push(None);
            } else {
                slot.push(Some(field.trim().to_string()));
            }
        }
    }

    if let Some(first) = skipped_rows.first() {
        tracing::warn!(
            file = file_name,
            count = skipped_rows.len(),
            first = %first,
            "skipped rows that could not be read"
        );
    }

    if index.is_empty() {
        return Err(ReaderError::EmptyData {
            file: file_name.to_string(),
        });
    }

    let data_names = names
        .iter()
        .enumerate()
        .filter(|(pos, _)| *pos != ts_col)
        .map(|(_, name)| name.as_str());

    let mut columns: Vec<Column> = Vec::with_capacity(width - 1);
    let mut text_columns = 0usize;
    for (name, column_cells) in data_names.zip(cells) {
        let (series, kind) = coerce_column(file_name, name, column_cells);
        if kind == ColumnKind::Text {
            text_columns += 1;
        }
        columns.push(series.into());
    }

    let frame = DataFrame::new(columns).map_err(|source| ReaderError::Polars {
        file: file_name.to_string(),
        source,
    })?;

    tracing::debug!(
        file = file_name,
        numeric = frame.width() - text_columns,
        text = text_columns,
        "coerced column types"
    );

    let units = units.map(|units| {
        units
            .into_iter()
            .enumerate()
            .filter(|(pos, _)| *pos != ts_col)
            .map(|(_, unit)| unit)
            .collect()
    });

    Ok(ParsedTable {
        file_name: file_name.to_string(),
        index,
        frame,
        units,
        skipped_rows,
    })
}
