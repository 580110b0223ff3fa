use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDateTime;
use icosprep_parser::read_table;

use crate::config::{DataSettings, FileTypeSettings};
use crate::discovery::{self, SkippedFile, SourceFile};
use crate::error::{PipelineError, Result};
use crate::exporter::{self, ExportReport};
use crate::ledger::{Ledger, LedgerEntry};
use crate::naming::dated_subdir;
use crate::pipeline::{self, FormatReport};
use crate::run::{RunContext, Section};
use crate::table::NormalizedTable;

/// Outcome of processing one file type.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub file_type: String,
    pub output_dir: PathBuf,
    pub settings: FileTypeSettings,
    pub run_id: String,
    pub run_date: NaiveDateTime,
    pub files: Vec<SourceFile>,
    pub unreadable: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
    pub format: FormatReport,
    pub export: ExportReport,
    pub ledger_entries: Vec<LedgerEntry>,
    pub runtime_s: f64,
}

/// Runs discovery, reading, reformatting and export for one file type.
pub fn run_file_type(
    settings: &FileTypeSettings,
    max_age_days: u32,
    ctx: &RunContext,
) -> Result<RunSummary> {
    let started = Instant::now();
    tracing::info!(
        file_type = %settings.name,
        run_id = %ctx.run_id,
        source_dir = %settings.source_dir.display(),
        output_dir = %settings.output_dir.display(),
        pattern = %settings.filename_pattern,
        frequency = %settings.data.frequency,
        max_age_days,
        "processing file type"
    );
    tracing::debug!(settings = ?settings, "file type settings");

    let mut ledger = Ledger::open_or_create(&settings.ledger_path())?;
    tracing::info!(path = %ledger.path().display(), entries = ledger.len(), "ledger loaded");

    let scan = discovery::scan(settings, max_age_days, ctx, &ledger)?;
    let (table, unreadable) = read_files(&scan.files, &settings.data)?;
    let (table, format) = pipeline::format_table(table, settings, ctx)?;
    let export = exporter::export_daily(&table, settings, &mut ledger)?;

    let runtime_s = started.elapsed().as_secs_f64();
    tracing::info!(file_type = %settings.name, runtime_s, "file type finished");

    Ok(RunSummary {
        file_type: settings.name.clone(),
        output_dir: settings.output_dir.clone(),
        settings: settings.clone(),
        run_id: ctx.run_id.clone(),
        run_date: ctx.started_at,
        files: scan.files,
        unreadable,
        skipped: scan.skipped,
        format,
        export,
        ledger_entries: ledger.entries().to_vec(),
        runtime_s,
    })
}

/// Reads every file and stacks the results. A file that cannot be read is
/// logged and left out; it is an error only when nothing could be read.
pub fn read_files(
    files: &[SourceFile],
    data: &DataSettings,
) -> Result<(NormalizedTable, Vec<PathBuf>)> {
    let _section = Section::start("read files");
    let options = data.read_options();
    let mut tables = Vec::with_capacity(files.len());
    let mut unreadable = Vec::new();

    for file in files {
        match read_table(&file.path, &options) {
            Ok(table) => {
                if !table.skipped_rows.is_empty() {
                    tracing::warn!(
                        file = %file.file_name,
                        skipped = table.skipped_rows.len(),
                        "rows skipped while reading"
                    );
                }
                tables.push(table);
            }
            Err(err) => {
                tracing::error!(path = %file.path.display(), error = %err, "could not read file, skipping");
                unreadable.push(file.path.clone());
            }
        }
    }

    if tables.is_empty() {
        return Err(PipelineError::Processing(format!(
            "none of the {} file(s) could be read",
            files.len()
        )));
    }

    let table = NormalizedTable::concat(tables)?;
    tracing::info!(
        rows = table.len(),
        columns = table.frame().width(),
        "file data merged"
    );
    Ok((table, unreadable))
}

/// `<output_dir>/<log_dir>/<YYYY>/<MM>/<run_id>_<name>.log`
pub fn log_file_path(settings: &FileTypeSettings, ctx: &RunContext) -> PathBuf {
    dated_subdir(&settings.log_root(), ctx.today)
        .join(format!("{}_{}.log", ctx.run_id, settings.name))
}
