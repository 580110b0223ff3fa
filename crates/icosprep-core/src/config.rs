use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Duration;
use icosprep_parser::{ReadOptions, DEFAULT_NA_VALUES};
use serde::Deserialize;
use thiserror::Error;

use crate::error::{PipelineError, Result};
use crate::naming::FilenameTemplate;

const SECONDS_PER_DAY: i64 = 86_400;

fn default_max_age_days() -> u32 {
    5
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_ledger_prefix() -> String {
    "icosprep".to_string()
}

fn default_separator() -> char {
    ','
}

fn default_header_rows() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_icos_timestamp_format() -> String {
    "%Y%m%d%H%M".to_string()
}

fn default_number() -> u32 {
    1
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    #[serde(default)]
    pub file_types: Vec<FileTypeSettings>,
}

impl Config {
    /// Loads and validates a TOML config. Relative directories are resolved
    /// against the folder containing the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            for settings in &mut config.file_types {
                settings.resolve_relative_to(base);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for settings in &self.file_types {
            if !names.insert(settings.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "file type '{}' is defined more than once",
                    settings.name
                )));
            }
            settings.validate()?;
        }
        Ok(())
    }

    pub fn file_type(&self, name: &str) -> Option<&FileTypeSettings> {
        self.file_types.iter().find(|settings| settings.name == name)
    }
}

/// Everything the pipeline needs to know about one file type.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileTypeSettings {
    pub name: String,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    pub filename_pattern: String,
    #[serde(default = "default_ledger_prefix")]
    pub ledger_prefix: String,
    pub filename_date: FilenameDatePositions,
    pub data: DataSettings,
    #[serde(default)]
    pub format: FormatSettings,
    pub output: OutputSettings,
}

impl FileTypeSettings {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::Config("file type name is empty".into()));
        }
        glob::Pattern::new(&self.filename_pattern)?;
        self.filename_date.validate(&self.name)?;
        self.data.validate(&self.name)?;
        self.output.validate(&self.name)?;
        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_files-already-processed.log",
            self.ledger_prefix, self.name
        ))
    }

    pub fn log_root(&self) -> PathBuf {
        self.output_dir.join(&self.log_dir)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if self.source_dir.is_relative() {
            self.source_dir = base.join(&self.source_dir);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
    }
}

/// Half-open `[start, end)` character range inside a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[usize; 2]")]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

impl CharRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<[usize; 2]> for CharRange {
    fn from(value: [usize; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilenameDatePositions {
    pub year: CharRange,
    pub month: CharRange,
    pub day: CharRange,
    #[serde(default)]
    pub hour: Option<CharRange>,
    #[serde(default)]
    pub minute: Option<CharRange>,
}

impl FilenameDatePositions {
    fn validate(&self, name: &str) -> Result<()> {
        let ranges = [
            ("year", Some(self.year)),
            ("month", Some(self.month)),
            ("day", Some(self.day)),
            ("hour", self.hour),
            ("minute", self.minute),
        ];
        for (field, range) in ranges {
            if range.is_some_and(|r| r.is_empty()) {
                return Err(PipelineError::Config(format!(
                    "{name}: filename_date.{field} range is empty"
                )));
            }
        }
        if self.hour.is_some() != self.minute.is_some() {
            return Err(PipelineError::Config(format!(
                "{name}: filename_date.hour and filename_date.minute must be set together"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSettings {
    #[serde(default = "default_separator")]
    pub separator: char,
    #[serde(default)]
    pub skip_rows: Vec<usize>,
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    #[serde(default)]
    pub timestamp_column: usize,
    pub timestamp_format: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub na_values: Option<Vec<String>>,
    #[serde(default)]
    pub complement_with_previous_date: bool,
}

impl DataSettings {
    fn validate(&self, name: &str) -> Result<()> {
        if !(1..=2).contains(&self.header_rows) {
            return Err(PipelineError::Config(format!(
                "{name}: data.header_rows must be 1 or 2, got {}",
                self.header_rows
            )));
        }
        if !self.separator.is_ascii() {
            return Err(PipelineError::Config(format!(
                "{name}: data.separator must be an ASCII character"
            )));
        }
        if self.frequency.records_per_day().is_none() {
            return Err(PipelineError::Config(format!(
                "{name}: data.frequency {} does not divide a day evenly",
                self.frequency
            )));
        }
        Ok(())
    }

    pub fn read_options(&self) -> ReadOptions {
        let na_values = self.na_values.clone().unwrap_or_else(|| {
            DEFAULT_NA_VALUES
                .iter()
                .map(|value| value.to_string())
                .collect()
        });
        ReadOptions {
            separator: self.separator,
            skip_rows: self.skip_rows.clone(),
            header_rows: self.header_rows,
            timestamp_column: self.timestamp_column,
            timestamp_format: self.timestamp_format.clone(),
            na_values,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatSettings {
    #[serde(default)]
    pub rename_columns: BTreeMap<String, String>,
    #[serde(default)]
    pub remove_suffixes: Vec<String>,
    #[serde(default)]
    pub keep_only_renamed: bool,
    #[serde(default)]
    pub keep_original_timestamp: bool,
    #[serde(default = "default_icos_timestamp_format")]
    pub icos_timestamp_format: String,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            rename_columns: BTreeMap::new(),
            remove_suffixes: Vec::new(),
            keep_only_renamed: false,
            keep_original_timestamp: false,
            icos_timestamp_format: default_icos_timestamp_format(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    #[default]
    Crlf,
    Lf,
}

impl LineTerminator {
    pub fn to_csv(self) -> csv::Terminator {
        match self {
            LineTerminator::Crlf => csv::Terminator::CRLF,
            LineTerminator::Lf => csv::Terminator::Any(b'\n'),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    pub filename_template: FilenameTemplate,
    #[serde(default = "default_number")]
    pub logger_number: u32,
    #[serde(default = "default_number")]
    pub file_number: u32,
    #[serde(default = "default_true")]
    pub header_output: bool,
    #[serde(default)]
    pub compression: bool,
    #[serde(default)]
    pub delete_uncompressed: bool,
    #[serde(default)]
    pub line_terminator: LineTerminator,
}

impl OutputSettings {
    fn validate(&self, name: &str) -> Result<()> {
        if self.delete_uncompressed && !self.compression {
            return Err(PipelineError::Config(format!(
                "{name}: output.delete_uncompressed requires output.compression"
            )));
        }
        Ok(())
    }
}

/// Sampling interval of a file type, written like `10min`, `30T`, `1H`,
/// `60s` or `1D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Frequency(Duration);

impl Frequency {
    pub fn from_duration(duration: Duration) -> Option<Self> {
        (duration > Duration::zero()).then_some(Self(duration))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn seconds(&self) -> i64 {
        self.0.num_seconds()
    }

    /// Number of records in one full day, if the interval divides a day.
    pub fn records_per_day(&self) -> Option<usize> {
        let seconds = self.seconds();
        if seconds <= 0 || self.0.subsec_nanos() != 0 || SECONDS_PER_DAY % seconds != 0 {
            return None;
        }
        usize::try_from(SECONDS_PER_DAY / seconds).ok()
    }

    pub fn half(&self) -> Duration {
        self.0 / 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrequencyError {
    #[error("invalid frequency '{0}'")]
    InvalidAmount(String),
    #[error("unknown frequency unit '{unit}' in '{value}'")]
    UnknownUnit { unit: String, value: String },
    #[error("frequency '{0}' is out of range")]
    OutOfRange(String),
    #[error("frequency '{0}' must be positive")]
    NotPositive(String),
}

impl FromStr for Frequency {
    type Err = FrequencyError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = value.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        let amount: i64 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| FrequencyError::InvalidAmount(trimmed.to_string()))?
        };
        let duration = match unit {
            "s" | "S" | "sec" => Duration::try_seconds(amount),
            "min" | "T" | "m" => Duration::try_minutes(amount),
            "h" | "H" => Duration::try_hours(amount),
            "d" | "D" => Duration::try_days(amount),
            other => {
                return Err(FrequencyError::UnknownUnit {
                    unit: other.to_string(),
                    value: trimmed.to_string(),
                })
            }
        }
        .ok_or_else(|| FrequencyError::OutOfRange(trimmed.to_string()))?;
        Frequency::from_duration(duration)
            .ok_or_else(|| FrequencyError::NotPositive(trimmed.to_string()))
    }
}

impl TryFrom<String> for Frequency {
    type Error = FrequencyError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.seconds();
        if seconds % SECONDS_PER_DAY == 0 {
            write!(f, "{}D", seconds / SECONDS_PER_DAY)
        } else if seconds % 3600 == 0 {
            write!(f, "{}H", seconds / 3600)
        } else if seconds % 60 == 0 {
            write!(f, "{}min", seconds / 60)
        } else {
            write!(f, "{seconds}s")
        }
    }
}
