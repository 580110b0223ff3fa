use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::config::FileTypeSettings;
use crate::error::{PipelineError, Result};
use crate::filename_date::{datetime_from_filename, FilenameDateError};
use crate::ledger::Ledger;
use crate::naming::OutputNames;
use crate::run::{RunContext, Section};

/// A source file that passed every discovery check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
    pub file_datetime: NaiveDateTime,
    pub run_id: String,
    pub run_started: NaiveDateTime,
}

impl SourceFile {
    pub fn file_date(&self) -> NaiveDate {
        self.file_datetime.date()
    }
}

/// Inclusive range of filename dates that are searched. It always ends
/// yesterday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl SearchWindow {
    pub fn ending_yesterday(today: NaiveDate, max_age_days: u32, extra_day: bool) -> Self {
        let days = i64::from(max_age_days) + i64::from(extra_day);
        Self {
            first: today - Duration::days(days),
            last: today - Duration::days(1),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    /// `<root>/<YYYY>/<MM>` for every month touched by the window.
    pub fn month_folders(&self, root: &Path) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        if self.first > self.last {
            return folders;
        }
        let (mut year, mut month) = (self.first.year(), self.first.month());
        let end = (self.last.year(), self.last.month());
        while (year, month) <= end {
            folders.push(root.join(format!("{year:04}")).join(format!("{month:02}")));
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        folders
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    PatternMismatch,
    Unreadable(String),
    NoDate(FilenameDateError),
    Today(NaiveDate),
    OutsideWindow(NaiveDate),
    AlreadyProcessed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PatternMismatch => f.write_str("filename does not match pattern"),
            SkipReason::Unreadable(err) => write!(f, "no read permission ({err})"),
            SkipReason::NoDate(err) => write!(f, "no date in filename ({err})"),
            SkipReason::Today(date) => write!(f, "file date {date} is today"),
            SkipReason::OutsideWindow(date) => {
                write!(f, "file date {date} is outside the search window")
            }
            SkipReason::AlreadyProcessed(name) => {
                write!(f, "output {name} already listed in ledger")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub window: SearchWindow,
    pub search_dirs: Vec<PathBuf>,
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Finds the source files of one file type that still need processing.
///
/// Fails with [`PipelineError::NoFilesFound`] when nothing qualifies.
pub fn scan(
    settings: &FileTypeSettings,
    max_age_days: u32,
    ctx: &RunContext,
    ledger: &Ledger,
) -> Result<ScanReport> {
    let _section = Section::start("generate file list");

    let window = SearchWindow::ending_yesterday(
        ctx.today,
        max_age_days,
        settings.data.complement_with_previous_date,
    );
    let search_dirs = window.month_folders(&settings.source_dir);
    tracing::info!(
        first = %window.first,
        last = %window.last,
        dirs = ?search_dirs,
        "searching for new files"
    );

    let pattern = glob::Pattern::new(&settings.filename_pattern)?;
    let mut files = Vec::new();
    let mut skipped = Vec::new();

    for candidate in list_files(&search_dirs)? {
        match check_candidate(&candidate, &pattern, &window, settings, ctx, ledger) {
            Ok(file) => files.push(file),
            Err(reason) => {
                if reason == SkipReason::PatternMismatch {
                    tracing::debug!(path = %candidate.display(), %reason, "skipping file");
                } else {
                    tracing::info!(path = %candidate.display(), %reason, "skipping file");
                }
                skipped.push(SkippedFile {
                    path: candidate,
                    reason,
                });
            }
        }
    }

    if files.is_empty() {
        tracing::error!(file_type = %settings.name, "no files found, stopping");
        return Err(PipelineError::NoFilesFound {
            file_type: settings.name.clone(),
            searched: search_dirs.len(),
        });
    }

    files.sort_by(|a, b| {
        (a.file_datetime, &a.file_name).cmp(&(b.file_datetime, &b.file_name))
    });
    for file in &files {
        tracing::info!(path = %file.path.display(), "adding file for further processing");
    }
    tracing::info!(count = files.len(), "files available for further processing");

    Ok(ScanReport {
        window,
        search_dirs,
        files,
        skipped,
    })
}

fn list_files(search_dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for dir in search_dirs {
        if !dir.is_dir() {
            tracing::info!(dir = %dir.display(), "search folder does not exist, skipping");
            continue;
        }
        if let Err(err) = fs::read_dir(dir) {
            tracing::warn!(dir = %dir.display(), error = %err, "search folder not readable, skipping");
            continue;
        }

        let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) if path.is_file() => found.push(path),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %err.path().display(), error = %err.error(), "path not readable, skipping");
                }
            }
        }
    }
    Ok(found)
}

fn check_candidate(
    path: &Path,
    pattern: &glob::Pattern,
    window: &SearchWindow,
    settings: &FileTypeSettings,
    ctx: &RunContext,
    ledger: &Ledger,
) -> std::result::Result<SourceFile, SkipReason> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !pattern.matches(&file_name) {
        return Err(SkipReason::PatternMismatch);
    }

    check_readable(path).map_err(|err| SkipReason::Unreadable(err.to_string()))?;

    let file_datetime =
        datetime_from_filename(&file_name, &settings.filename_date).map_err(SkipReason::NoDate)?;
    let file_date = file_datetime.date();
    if file_date == ctx.today {
        return Err(SkipReason::Today(file_date));
    }
    if !window.contains(file_date) {
        return Err(SkipReason::OutsideWindow(file_date));
    }

    if let Some(name) = processed_output(settings, file_date, ledger) {
        return Err(SkipReason::AlreadyProcessed(name));
    }

    Ok(SourceFile {
        path: path.to_path_buf(),
        file_name,
        file_datetime,
        run_id: ctx.run_id.clone(),
        run_started: ctx.started_at,
    })
}

fn check_readable(path: &Path) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(5);
    File::open(path)?.take(5).read_to_end(&mut buf)?;
    Ok(())
}

/// Returns the ledger name that marks a source file as done. A file can hold
/// records up to the next midnight and beyond, so it is done only when the
/// outputs for its own date and the following date are both listed.
fn processed_output(
    settings: &FileTypeSettings,
    file_date: NaiveDate,
    ledger: &Ledger,
) -> Option<String> {
    let own = OutputNames::for_date(&settings.output, file_date).ledger_name;
    let next = OutputNames::for_date(&settings.output, file_date + Duration::days(1)).ledger_name;
    (ledger.contains(&own) && ledger.contains(&next)).then_some(own)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_ends_yesterday() {
        let window = SearchWindow::ending_yesterday(date(2024, 1, 16), 5, false);
        assert_eq!(window.first, date(2024, 1, 11));
        assert_eq!(window.last, date(2024, 1, 15));
        assert!(window.contains(date(2024, 1, 11)));
        assert!(!window.contains(date(2024, 1, 16)));
        assert!(!window.contains(date(2024, 1, 10)));
    }

    #[test]
    fn complement_widens_window_by_one_day() {
        let window = SearchWindow::ending_yesterday(date(2024, 1, 16), 5, true);
        assert_eq!(window.first, date(2024, 1, 10));
    }

    #[test]
    fn month_folders_cross_year_boundary() {
        let window = SearchWindow::ending_yesterday(date(2024, 1, 3), 10, false);
        let folders = window.month_folders(Path::new("/src"));
        assert_eq!(
            folders,
            vec![PathBuf::from("/src/2023/12"), PathBuf::from("/src/2024/01")]
        );
    }

    #[test]
    fn empty_window_has_no_folders() {
        let window = SearchWindow::ending_yesterday(date(2024, 1, 3), 0, false);
        assert!(window.month_folders(Path::new("/src")).is_empty());
    }
}
