pub mod config;
pub mod discovery;
pub mod error;
pub mod exporter;
pub mod filename_date;
pub mod ledger;
pub mod naming;
pub mod pipeline;
pub mod processing;
pub mod run;
pub mod table;

pub use config::{Config, FileTypeSettings, Frequency};
pub use error::{PipelineError, Result};
pub use processing::{run_file_type, RunSummary};
pub use run::RunContext;
pub use table::NormalizedTable;
