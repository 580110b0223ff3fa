use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

use crate::config::OutputSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed placeholder in '{0}'")]
    Unclosed(String),
    #[error("unmatched '}}' in '{0}'")]
    UnmatchedBrace(String),
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),
    #[error("unsupported format '{format}' in '{{{placeholder}}}'")]
    UnsupportedFormat { format: String, placeholder: String },
    #[error("filename template '{0}' must contain {{year}}, {{month}} and {{day}}")]
    MissingDateField(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    Logger,
    File,
}

impl Field {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "year" => Some(Field::Year),
            "month" => Some(Field::Month),
            "day" => Some(Field::Day),
            "logger" => Some(Field::Logger),
            "file" => Some(Field::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field { field: Field, width: usize },
}

/// Output filename pattern such as
/// `CH-Dav_BM_{year}{month:02}{day:02}_L{logger:02}_F{file:02}.dat`.
///
/// Placeholders are `{name}` or `{name:0N}` (zero padded to N digits);
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct FilenameTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl FilenameTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => inner.push(c),
                            None => return Err(TemplateError::Unclosed(raw.to_string())),
                        }
                    }
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(parse_placeholder(&inner)?);
                }
                '}' => return Err(TemplateError::UnmatchedBrace(raw.to_string())),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        for required in [Field::Year, Field::Month, Field::Day] {
            let present = parts
                .iter()
                .any(|part| matches!(part, Part::Field { field, .. } if *field == required));
            if !present {
                return Err(TemplateError::MissingDateField(raw.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn render(&self, date: NaiveDate, logger: u32, file: u32) -> String {
        let mut out = String::with_capacity(self.raw.len() + 8);
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Field { field, width } => {
                    let value = match field {
                        Field::Year => i64::from(date.year()),
                        Field::Month => i64::from(date.month()),
                        Field::Day => i64::from(date.day()),
                        Field::Logger => i64::from(logger),
                        Field::File => i64::from(file),
                    };
                    out.push_str(&format!("{value:0width$}", width = *width));
                }
            }
        }
        out
    }
}

fn parse_placeholder(inner: &str) -> Result<Part, TemplateError> {
    let (key, format) = match inner.split_once(':') {
        Some((key, format)) => (key, Some(format)),
        None => (inner, None),
    };
    let field = Field::parse(key.trim())
        .ok_or_else(|| TemplateError::UnknownPlaceholder(inner.to_string()))?;
    let width = match format {
        None => 0,
        Some(format) => format
            .strip_prefix('0')
            .unwrap_or(format)
            .parse::<usize>()
            .map_err(|_| TemplateError::UnsupportedFormat {
                format: format.to_string(),
                placeholder: inner.to_string(),
            })?,
    };
    Ok(Part::Field { field, width })
}

impl TryFrom<String> for FilenameTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FilenameTemplate::parse(&value)
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Filenames produced for one exported day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub file_name: String,
    pub zip_name: String,
    /// The name recorded in the ledger: the zip when compressing.
    pub ledger_name: String,
}

impl OutputNames {
    pub fn for_date(output: &OutputSettings, date: NaiveDate) -> Self {
        let file_name =
            output
                .filename_template
                .render(date, output.logger_number, output.file_number);
        let zip_name = zip_name(&file_name);
        let ledger_name = if output.compression {
            zip_name.clone()
        } else {
            file_name.clone()
        };
        Self {
            file_name,
            zip_name,
            ledger_name,
        }
    }
}

/// `<root>/<YYYY>/<MM>` folder for a date.
pub fn dated_subdir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(format!("{:04}", date.year()))
        .join(format!("{:02}", date.month()))
}

/// Name of the zip archive that wraps an uncompressed output file.
pub fn zip_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    format!("{stem}.zip")
}
