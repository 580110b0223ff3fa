use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{PipelineError, Result};

const ENTRY_MARKER: &str = "    created ";

const BANNER: &str = "\
================================================
FILES ALREADY PROCESSED AND CREATED WITH icosprep
================================================
* Files listed here are not re-processed
* Delete files from list to enable re-processing
------------------------------------------------
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub file_name: String,
    pub created: String,
}

/// Append-only list of output files already written for one file type.
///
/// A filename listed here is never produced again. The first field of each
/// line is the filename; the rest, if any, is its creation time. Banner and
/// blank lines are ignored.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
    names: HashSet<String>,
}

impl Ledger {
    /// Opens the ledger at `path`, creating it with a banner if it does not
    /// exist yet.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let ledger_err = |source: std::io::Error| PipelineError::Ledger {
            path: path.to_path_buf(),
            source,
        };

        let entries = if path.is_file() {
            let content = fs::read_to_string(path).map_err(ledger_err)?;
            parse_entries(&content)
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(ledger_err)?;
            }
            fs::write(path, BANNER).map_err(ledger_err)?;
            tracing::info!(path = %path.display(), "created new ledger");
            Vec::new()
        };

        let names = entries.iter().map(|entry| entry.file_name.clone()).collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.names.contains(file_name)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends `file_name` to the file on disk, then to the in-memory view.
    pub fn record(&mut self, file_name: &str, created: NaiveDateTime) -> Result<()> {
        let created = created.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| PipelineError::Ledger {
                path: self.path.clone(),
                source,
            })?;
        writeln!(file, "{file_name}{ENTRY_MARKER}{created}").map_err(|source| {
            PipelineError::Ledger {
                path: self.path.clone(),
                source,
            }
        })?;

        self.names.insert(file_name.to_string());
        self.entries.push(LedgerEntry {
            file_name: file_name.to_string(),
            created,
        });
        Ok(())
    }
}

fn parse_entries(content: &str) -> Vec<LedgerEntry> {
    let banner: Vec<&str> = BANNER.lines().collect();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !banner.contains(line))
        .map(|line| {
            let (name, rest) = match line.split_once(char::is_whitespace) {
                Some((name, rest)) => (name, rest.trim()),
                None => (line, ""),
            };
            let created = rest.strip_prefix("created").unwrap_or(rest).trim();
            LedgerEntry {
                file_name: name.to_string(),
                created: created.to_string(),
            }
        })
        .collect()
}
