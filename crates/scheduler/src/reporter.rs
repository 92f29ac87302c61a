//! Terminal failure reporting.
//!
//! When a job exhausts its retry budget the retry engine hands it to a
//! pluggable sink. The sink is the last stop: after `save` succeeds the
//! subsystem schedules nothing further for that job.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use deferq_core::PlainJob;

/// Everything known about a permanently failed job.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// The innermost job, with every retry envelope peeled off.
    pub job: PlainJob,
    pub queue: String,
    pub worker: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone)]
pub enum ReporterError {
    #[error("failure sink error: {0}")]
    Sink(String),
}

/// Pluggable sink for permanently failed jobs.
pub trait FailureReporter: Send + Sync {
    fn save(&self, report: FailureReport) -> Result<(), ReporterError>;
}

/// Default sink: emit the report as a structured error log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn save(&self, report: FailureReport) -> Result<(), ReporterError> {
        error!(
            class = %report.job.class,
            queue = %report.queue,
            worker = %report.worker,
            attempts = report.attempts,
            error = %report.error,
            "job permanently failed"
        );
        Ok(())
    }
}

/// Collects reports in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    reports: Mutex<Vec<FailureReport>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl FailureReporter for MemoryReporter {
    fn save(&self, report: FailureReport) -> Result<(), ReporterError> {
        self.reports.lock().unwrap().push(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn report() -> FailureReport {
        FailureReport {
            job: PlainJob {
                class: "mail.send".to_string(),
                args: vec![json!("u-1")],
            },
            queue: "mail".to_string(),
            worker: "worker-test".to_string(),
            error: "smtp timeout".to_string(),
            attempts: 10,
            failed_at: Utc::now(),
        }
    }

    #[test]
    fn memory_reporter_collects() {
        let reporter = MemoryReporter::new();
        reporter.save(report()).unwrap();
        reporter.save(report()).unwrap();

        let saved = reporter.reports();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].attempts, 10);
    }

    #[test]
    fn log_reporter_accepts_reports() {
        LogReporter.save(report()).unwrap();
    }
}
