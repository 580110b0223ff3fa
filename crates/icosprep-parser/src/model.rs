use std::fmt;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::RowIssue;

/// Values treated as missing when no explicit list is configured.
pub const DEFAULT_NA_VALUES: &[&str] = &["", "NAN", "NaN", "nan", "NA", "inf", "-inf"];

/// How a delimited source file is laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    pub separator: char,
    /// Raw record indices dropped before the header is located.
    pub skip_rows: Vec<usize>,
    /// 1 = variable names only, 2 = names followed by a unit row.
    pub header_rows: usize,
    pub timestamp_column: usize,
    pub timestamp_format: String,
    pub na_values: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            skip_rows: Vec::new(),
            header_rows: 1,
            timestamp_column: 0,
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            na_values: DEFAULT_NA_VALUES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl ReadOptions {
    pub(crate) fn is_na(&self, value: &str) -> bool {
        let trimmed = value.trim();
        self.na_values.iter().any(|na| na == trimmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            ColumnKind::Numeric => DataType::Float64,
            ColumnKind::Text => DataType::String,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source file read into memory.
///
/// `frame` holds the data columns only; the timestamp index lives in `index`
/// and has one entry per frame row. `units` is aligned with the frame columns
/// when the file carries a unit row.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub file_name: String,
    pub index: Vec<NaiveDateTime>,
    pub frame: DataFrame,
    pub units: Option<Vec<String>>,
    pub skipped_rows: Vec<RowIssue>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.frame.width()
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        let column = self.frame.column(name).ok()?;
        match column.dtype() {
            DataType::Float64 => Some(ColumnKind::Numeric),
            _ => Some(ColumnKind::Text),
        }
    }
}
