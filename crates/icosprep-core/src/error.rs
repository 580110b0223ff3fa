// crates/icosprep-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV writing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ZIP operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid filename pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Config file could not be parsed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Reader(#[from] icosprep_parser::ReaderError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No files found for file type '{file_type}' in {searched} search folder(s)")]
    NoFilesFound { file_type: String, searched: usize },

    #[error("Ledger {path} could not be used: {source}")]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
