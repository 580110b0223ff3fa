use std::fmt;

use polars::prelude::PolarsError;
use thiserror::Error;

/// A row that was dropped while reading, kept so callers can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub line_index: usize,
    pub message: String,
}

impl RowIssue {
    pub fn new(line_index: usize, message: impl Into<String>) -> Self {
        Self {
            line_index,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_index, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{file}: failed to read file: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: CSV error: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file}: header row {row_index} invalid: {message}")]
    InvalidHeader {
        file: String,
        row_index: usize,
        message: String,
    },

    #[error("{file}: timestamp column {column} is outside the {width} header columns")]
    MissingTimestampColumn {
        file: String,
        column: usize,
        width: usize,
    },

    #[error("{file}: file did not contain any usable data rows")]
    EmptyData { file: String },

    #[error("{file}: failed to build table: {source}")]
    Polars {
        file: String,
        #[source]
        source: PolarsError,
    },
}
