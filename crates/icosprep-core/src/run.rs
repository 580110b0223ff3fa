use std::time::Instant;

use chrono::{Local, NaiveDate, NaiveDateTime};

/// Identity and clock of one invocation. Everything that depends on "today"
/// reads it from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: NaiveDateTime,
    pub today: NaiveDate,
}

impl RunContext {
    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn at(started_at: NaiveDateTime) -> Self {
        Self {
            run_id: format!("ICOSPREP-{}", started_at.format("%Y%m%d%H%M%S")),
            started_at,
            today: started_at.date(),
        }
    }

    /// Midnight at the start of today; later rows belong to the running day.
    pub fn start_of_today(&self) -> NaiveDateTime {
        self.today.and_time(chrono::NaiveTime::MIN)
    }
}

/// Logs the start of a processing section and its runtime when dropped.
pub struct Section {
    name: &'static str,
    started: Instant,
}

impl Section {
    pub fn start(name: &'static str) -> Self {
        tracing::info!(section = name, "section start");
        Self {
            name,
            started: Instant::now(),
        }
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        tracing::info!(
            section = self.name,
            runtime_s = self.started.elapsed().as_secs_f64(),
            "section end"
        );
    }
}
