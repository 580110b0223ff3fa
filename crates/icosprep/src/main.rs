use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use icosprep_core::ledger::Ledger;
use icosprep_core::processing::{self, RunSummary};
use icosprep_core::{Config, FileTypeSettings, PipelineError, RunContext};

mod logging;

const CONFIG_ENV: &str = "ICOSPREP_CONFIG";

/// Reformats raw logger files into daily ICOS files
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (falls back to ICOSPREP_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process new source files of every (or the selected) file type
    Run(RunArgs),
    /// Load and validate the configuration, then print it
    CheckConfig,
    /// List the files already recorded for a file type
    Ledger {
        #[arg(long)]
        file_type: String,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Only process the named file type; repeatable
    #[arg(long = "only", value_name = "NAME")]
    only: Vec<String>,

    /// Override max_age_days from the configuration
    #[arg(long)]
    max_age_days: Option<u32>,

    /// Emit console logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_console();

    let config_path = cli
        .config
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .with_context(|| format!("pass --config or set {CONFIG_ENV}"))?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    match cli.command {
        Command::Run(args) => run(&config, &args),
        Command::CheckConfig => {
            print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
        Command::Ledger { file_type } => {
            print_ledger(&config, &file_type)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn selected_file_types<'a>(
    config: &'a Config,
    only: &[String],
) -> Result<Vec<&'a FileTypeSettings>> {
    if only.is_empty() {
        return Ok(config.file_types.iter().collect());
    }
    only.iter()
        .map(|name| {
            config
                .file_type(name)
                .with_context(|| format!("unknown file type '{name}'"))
        })
        .collect()
}

fn run(config: &Config, args: &RunArgs) -> Result<ExitCode> {
    let selected = selected_file_types(config, &args.only)?;
    if selected.is_empty() {
        bail!("configuration defines no file types");
    }

    let ctx = RunContext::now();
    let max_age_days = args.max_age_days.unwrap_or(config.max_age_days);
    tracing::info!(run_id = %ctx.run_id, file_types = selected.len(), max_age_days, "run started");

    let mut outcomes = Vec::with_capacity(selected.len());
    for settings in selected {
        let log_file = processing::log_file_path(settings, &ctx);
        let subscriber = logging::file_type_subscriber(&log_file, args.json_logs)?;
        let result = tracing::subscriber::with_default(subscriber, || {
            processing::run_file_type(settings, max_age_days, &ctx)
        });
        if let Err(err) = &result {
            tracing::error!(file_type = %settings.name, error = %err, "file type failed");
        }
        outcomes.push((settings.name.clone(), result));
    }

    print_summary(&ctx, &outcomes);
    let failed = outcomes.iter().filter(|(_, result)| result.is_err()).count();
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_summary(ctx: &RunContext, outcomes: &[(String, Result<RunSummary, PipelineError>)]) {
    let mut table = new_table(vec![
        "File type",
        "Status",
        "Files read",
        "Days written",
        "Days skipped",
        "Runtime (s)",
    ]);
    for (name, result) in outcomes {
        match result {
            Ok(summary) => {
                let skipped =
                    summary.export.already_processed.len() + summary.format.partial_days_removed.len();
                table.add_row(vec![
                    name.clone(),
                    "ok".to_string(),
                    (summary.files.len() - summary.unreadable.len()).to_string(),
                    summary.export.written.len().to_string(),
                    skipped.to_string(),
                    format!("{:.2}", summary.runtime_s),
                ]);
            }
            Err(err) => {
                table.add_row(vec![
                    name.clone(),
                    format!("failed: {err}"),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ]);
            }
        }
    }
    println!("Run {} ({})", ctx.run_id, ctx.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!("{table}");
}

fn print_config(config: &Config) {
    println!("max_age_days = {}", config.max_age_days);
    let mut table = new_table(vec![
        "File type",
        "Source",
        "Output",
        "Pattern",
        "Frequency",
        "Output name",
        "Zip",
        "Ledger",
    ]);
    for settings in &config.file_types {
        table.add_row(vec![
            settings.name.clone(),
            settings.source_dir.display().to_string(),
            settings.output_dir.display().to_string(),
            settings.filename_pattern.clone(),
            settings.data.frequency.to_string(),
            settings.output.filename_template.to_string(),
            settings.output.compression.to_string(),
            settings.ledger_path().display().to_string(),
        ]);
    }
    println!("{table}");
}

fn print_ledger(config: &Config, file_type: &str) -> Result<()> {
    let settings = config
        .file_type(file_type)
        .with_context(|| format!("unknown file type '{file_type}'"))?;
    let path = settings.ledger_path();
    if !path.is_file() {
        println!("No ledger yet at {}", path.display());
        return Ok(());
    }

    let ledger = Ledger::open_or_create(&path)
        .with_context(|| format!("failed to read ledger {}", path.display()))?;
    let mut table = new_table(vec!["File", "Created"]);
    for entry in ledger.entries() {
        table.add_row(vec![entry.file_name.clone(), entry.created.clone()]);
    }
    println!("{} ({} entries)", path.display(), ledger.len());
    println!("{table}");
    Ok(())
}
