use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::config::{CharRange, FilenameDatePositions};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameDateError {
    #[error("'{file_name}' is too short for {field} at [{start}, {end})")]
    TooShort {
        file_name: String,
        field: &'static str,
        start: usize,
        end: usize,
    },
    #[error("'{file_name}' has '{text}' where the {field} should be")]
    NotNumeric {
        file_name: String,
        field: &'static str,
        text: String,
    },
    #[error("'{file_name}' holds no valid date ({year}-{month}-{day})")]
    InvalidDate {
        file_name: String,
        year: u32,
        month: u32,
        day: u32,
    },
    #[error("'{file_name}' holds no valid time ({hour}:{minute})")]
    InvalidTime {
        file_name: String,
        hour: u32,
        minute: u32,
    },
}

/// Pulls the date (and optionally time) encoded at fixed character offsets in
/// a filename. Two-digit years are read as 20xx.
pub fn datetime_from_filename(
    file_name: &str,
    positions: &FilenameDatePositions,
) -> Result<NaiveDateTime, FilenameDateError> {
    let mut year = number_at(file_name, positions.year, "year")?;
    if positions.year.len() == 2 {
        year += 2000;
    }
    let month = number_at(file_name, positions.month, "month")?;
    let day = number_at(file_name, positions.day, "day")?;

    let date = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or_else(|| FilenameDateError::InvalidDate {
            file_name: file_name.to_string(),
            year,
            month,
            day,
        })?;

    let (hour, minute) = match (positions.hour, positions.minute) {
        (Some(hour), Some(minute)) => (
            number_at(file_name, hour, "hour")?,
            number_at(file_name, minute, "minute")?,
        ),
        _ => (0, 0),
    };

    date.and_hms_opt(hour, minute, 0)
        .ok_or_else(|| FilenameDateError::InvalidTime {
            file_name: file_name.to_string(),
            hour,
            minute,
        })
}

fn number_at(
    file_name: &str,
    range: CharRange,
    field: &'static str,
) -> Result<u32, FilenameDateError> {
    let text: String = file_name
        .chars()
        .skip(range.start)
        .take(range.len())
        .collect();
    if text.chars().count() != range.len() {
        return Err(FilenameDateError::TooShort {
            file_name: file_name.to_string(),
            field,
            start: range.start,
            end: range.end,
        });
    }
    text.parse::<u32>()
        .map_err(|_| FilenameDateError::NotNumeric {
            file_name: file_name.to_string(),
            field,
            text,
        })
}
