use std::collections::HashSet;

use chrono::NaiveDateTime;
use icosprep_parser::ParsedTable;
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Time-indexed table flowing through the reformatting pipeline.
///
/// The data columns live in a polars `DataFrame` and are either `Float64` or
/// `String`; the timestamp index is kept beside it with one entry per row.
/// `units` is aligned with the frame columns when the source had a unit row.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    index: Vec<NaiveDateTime>,
    frame: DataFrame,
    units: Option<Vec<String>>,
}

impl NormalizedTable {
    pub fn new(
        index: Vec<NaiveDateTime>,
        frame: DataFrame,
        units: Option<Vec<String>>,
    ) -> Result<Self> {
        if frame.width() > 0 && frame.height() != index.len() {
            return Err(PipelineError::Processing(format!(
                "table has {} rows but index has {} timestamps",
                frame.height(),
                index.len()
            )));
        }
        if let Some(units) = &units {
            if units.len() != frame.width() {
                return Err(PipelineError::Processing(format!(
                    "table has {} columns but {} units",
                    frame.width(),
                    units.len()
                )));
            }
        }
        for column in frame.get_columns() {
            if !matches!(column.dtype(), DataType::Float64 | DataType::String) {
                return Err(PipelineError::Processing(format!(
                    "column '{}' has unsupported type {}",
                    column.name(),
                    column.dtype()
                )));
            }
        }
        Ok(Self {
            index,
            frame,
            units,
        })
    }

    pub fn from_parsed(parsed: ParsedTable) -> Result<Self> {
        Self::new(parsed.index, parsed.frame, parsed.units)
    }

    /// Stacks tables from several files. Columns are the union of all
    /// columns in first-seen order; a column that is text in any file
    /// becomes text everywhere, and missing columns are filled with nulls.
    pub fn concat(tables: Vec<ParsedTable>) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        let mut text_columns: HashSet<String> = HashSet::new();
        let mut units: Vec<Option<String>> = Vec::new();
        let with_units = tables.iter().any(|table| table.units.is_some());

        for table in &tables {
            for (pos, column) in table.frame.get_columns().iter().enumerate() {
                let name = column.name().to_string();
                if column.dtype() != &DataType::Float64 {
                    text_columns.insert(name.clone());
                }
                match names.iter().position(|known| *known == name) {
                    Some(known) => {
                        if units[known].is_none() {
                            units[known] = table.units.as_ref().map(|u| u[pos].clone());
                        }
                    }
                    None => {
                        names.push(name);
                        units.push(table.units.as_ref().map(|u| u[pos].clone()));
                    }
                }
            }
        }

        let dtype_of = |name: &str| {
            if text_columns.contains(name) {
                DataType::String
            } else {
                DataType::Float64
            }
        };

        let mut index = Vec::new();
        let mut merged: Option<DataFrame> = None;
        for table in tables {
            let height = table.index.len();
            let mut columns: Vec<Column> = Vec::with_capacity(names.len());
            for name in &names {
                let dtype = dtype_of(name);
                let column = match table.frame.column(name) {
                    Ok(column) if column.dtype() == &dtype => column.clone(),
                    Ok(column) => column.cast(&dtype)?,
                    Err(_) => Column::full_null(name.as_str().into(), height, &dtype),
                };
                columns.push(column);
            }
            let frame = DataFrame::new(columns)?;
            index.extend(table.index);
            merged = Some(match merged {
                None => frame,
                Some(mut acc) => {
                    acc.vstack_mut(&frame)?;
                    acc
                }
            });
        }

        let frame = merged.unwrap_or_default();
        let units = with_units.then(|| {
            units
                .into_iter()
                .map(|unit| unit.unwrap_or_default())
                .collect()
        });
        Self::new(index, frame, units)
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn units(&self) -> Option<&[String]> {
        self.units.as_deref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn unit_of(&self, name: &str) -> Option<&str> {
        let pos = self.frame.get_column_index(name)?;
        self.units.as_ref().map(|units| units[pos].as_str())
    }

    /// Builds a new table whose row `i` is old row `rows[i]`, or an empty row
    /// where `rows[i]` is `None`.
    pub fn gather(&self, index: Vec<NaiveDateTime>, rows: &[Option<usize>]) -> Result<Self> {
        if index.len() != rows.len() {
            return Err(PipelineError::Processing(format!(
                "gather got {} timestamps for {} rows",
                index.len(),
                rows.len()
            )));
        }
        if self.frame.width() == 0 {
            return Self::new(index, self.frame.clone(), self.units.clone());
        }

        let positions = rows
            .iter()
            .map(|row| {
                row.map(|i| {
                    IdxSize::try_from(i).map_err(|_| {
                        PipelineError::Processing(format!("row {i} is beyond the index range"))
                    })
                })
                .transpose()
            })
            .collect::<Result<Vec<Option<IdxSize>>>>()?;
        let positions = IdxCa::from_iter_options("rows".into(), positions.into_iter());

        Self::new(index, self.frame.take(&positions)?, self.units.clone())
    }

    /// Keeps the rows whose mask entry is `true`.
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.len() {
            return Err(PipelineError::Processing(format!(
                "row mask has {} entries for {} rows",
                keep.len(),
                self.len()
            )));
        }
        let index = self
            .index
            .iter()
            .zip(keep)
            .filter(|(_, keep)| **keep)
            .map(|(ts, _)| *ts)
            .collect();
        let frame = if self.frame.width() == 0 {
            self.frame.clone()
        } else {
            self.frame
                .filter(&BooleanChunked::from_slice("keep".into(), keep))?
        };
        Self::new(index, frame, self.units.clone())
    }

    /// Replaces every timestamp in the index.
    pub fn map_index<F>(&mut self, f: F)
    where
        F: Fn(NaiveDateTime) -> NaiveDateTime,
    {
        for ts in &mut self.index {
            *ts = f(*ts);
        }
    }

    pub fn set_column_names(&mut self, names: Vec<String>) -> Result<()> {
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::Processing(format!(
                    "column name '{name}' would appear twice"
                )));
            }
        }
        self.frame.set_column_names(names.iter().map(String::as_str))?;
        Ok(())
    }

    /// Keeps only the named columns, preserving their current order.
    pub fn retain_columns<F>(&mut self, keep: F) -> Result<()>
    where
        F: Fn(&str) -> bool,
    {
        let kept: Vec<usize> = self
            .frame
            .get_column_names()
            .iter()
            .enumerate()
            .filter(|(_, name)| keep(name.as_str()))
            .map(|(pos, _)| pos)
            .collect();
        let names: Vec<String> = kept
            .iter()
            .map(|pos| self.frame.get_columns()[*pos].name().to_string())
            .collect();
        self.frame = self.frame.select(names)?;
        if let Some(units) = &self.units {
            self.units = Some(kept.iter().map(|pos| units[*pos].clone()).collect());
        }
        Ok(())
    }

    /// Inserts a text column in front of all others.
    pub fn insert_first(&mut self, name: &str, values: Vec<String>, unit: &str) -> Result<()> {
        let series = Series::new(name.into(), values);
        if self.frame.width() == 0 {
            self.frame = DataFrame::new(vec![series.into()])?;
        } else {
            self.frame.insert_column(0, series)?;
        }
        if let Some(units) = &mut self.units {
            units.insert(0, unit.to_string());
        }
        Ok(())
    }

    /// Appends a text column after all others.
    pub fn push_column(&mut self, name: &str, values: Vec<String>, unit: &str) -> Result<()> {
        let series = Series::new(name.into(), values);
        if self.frame.width() == 0 {
            self.frame = DataFrame::new(vec![series.into()])?;
        } else {
            self.frame.with_column(series)?;
        }
        if let Some(units) = &mut self.units {
            units.push(unit.to_string());
        }
        Ok(())
    }
}
