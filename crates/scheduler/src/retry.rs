//! Retry escalation engine.
//!
//! Sits between a failed execution and the scheduler: each failure either
//! re-registers the job with a super-linear backoff delay or, once the
//! attempt ceiling is reached, hands the job to the terminal failure
//! reporter. Attempt tracking lives inside the re-enqueued payload
//! itself (the retry envelope), so no extra store records are needed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::info;

use deferq_core::{JobDescriptor, TaskId};
use deferq_store::TaskStore;

use crate::config::RetryConfig;
use crate::error::SchedulerResult;
use crate::reporter::{FailureReport, FailureReporter};
use crate::scheduler::DelayedScheduler;

/// What the engine decided to do with one failure.
#[derive(Debug)]
pub enum Disposition {
    /// A retry was registered with the scheduler.
    Rescheduled {
        attempts: u32,
        delay: Duration,
        task: TaskId,
    },
    /// The retry budget is exhausted; the job went to the reporter.
    GivenUp { attempts: u32 },
}

/// Escalates failed executions through bounded, backed-off retries.
pub struct RetryEngine<S: TaskStore> {
    scheduler: DelayedScheduler<S>,
    config: RetryConfig,
    reporter: Arc<dyn FailureReporter>,
}

impl<S: TaskStore> RetryEngine<S> {
    pub fn new(
        scheduler: DelayedScheduler<S>,
        config: RetryConfig,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            scheduler,
            config,
            reporter,
        }
    }

    /// Handle one failed execution.
    ///
    /// `job` is the descriptor exactly as the worker popped it: a retry
    /// envelope carries the attempt count of the failure chain, a plain
    /// job means this was the first failure.
    pub fn on_failure(
        &self,
        job: JobDescriptor,
        error: &str,
        worker: &str,
        queue: &str,
    ) -> SchedulerResult<Disposition> {
        let (attempts, working) = match job {
            JobDescriptor::Retry(envelope) => (envelope.attempts + 1, *envelope.job),
            plain => (1, plain),
        };

        if attempts < self.config.max_attempts {
            self.try_again(attempts, working, queue)
        } else {
            self.give_up(attempts, working, error, worker, queue)
        }
    }

    fn try_again(
        &self,
        attempts: u32,
        job: JobDescriptor,
        queue: &str,
    ) -> SchedulerResult<Disposition> {
        let delay = backoff_delay(attempts);
        let run_at = Utc::now() + TimeDelta::seconds(delay.as_secs() as i64);

        // The bumped counter changes the derived id, so this never
        // collides with the previous attempt's records.
        let task = self
            .scheduler
            .enqueue_at(run_at, queue, JobDescriptor::retry(attempts, job))?;

        info!(
            task = %task,
            queue,
            attempts,
            delay_secs = delay.as_secs(),
            "scheduled retry"
        );

        Ok(Disposition::Rescheduled {
            attempts,
            delay,
            task,
        })
    }

    fn give_up(
        &self,
        attempts: u32,
        job: JobDescriptor,
        error: &str,
        worker: &str,
        queue: &str,
    ) -> SchedulerResult<Disposition> {
        let report = FailureReport {
            job: job.innermost().clone(),
            queue: queue.to_string(),
            worker: worker.to_string(),
            error: error.to_string(),
            attempts,
            failed_at: Utc::now(),
        };

        info!(class = %report.job.class, queue, attempts, "giving up on job");
        self.reporter.save(report)?;

        Ok(Disposition::GivenUp { attempts })
    }
}

/// Super-linear backoff: `attempts⁴ + 5` seconds (6s, 21s, 86s, 261s, …).
fn backoff_delay(attempts: u32) -> Duration {
    Duration::from_secs(u64::from(attempts).pow(4) + 5)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use deferq_store::MemoryStore;

    use crate::config::SchedulerConfig;
    use crate::reporter::MemoryReporter;

    use super::*;

    fn engine(
        store: MemoryStore,
        max_attempts: u32,
    ) -> (RetryEngine<MemoryStore>, Arc<MemoryReporter>) {
        let scheduler = DelayedScheduler::new(store, SchedulerConfig::default());
        let reporter = Arc::new(MemoryReporter::new());
        let engine = RetryEngine::new(
            scheduler,
            RetryConfig::default().with_max_attempts(max_attempts),
            reporter.clone(),
        );
        (engine, reporter)
    }

    fn job() -> JobDescriptor {
        JobDescriptor::plain("flaky.work", vec![json!("x")])
    }

    #[test]
    fn backoff_delays_match_the_curve() {
        let expected = [6, 21, 86, 261, 630, 1301, 2410, 4101, 6566];
        for (i, want) in expected.iter().enumerate() {
            let attempts = (i + 1) as u32;
            assert_eq!(backoff_delay(attempts), Duration::from_secs(*want));
        }
    }

    #[test]
    fn first_failure_schedules_attempt_one() {
        let store = MemoryStore::new();
        let (engine, reporter) = engine(store.clone(), 10);

        let disposition = engine.on_failure(job(), "boom", "worker-1", "mail").unwrap();

        match disposition {
            Disposition::Rescheduled {
                attempts, delay, ..
            } => {
                assert_eq!(attempts, 1);
                assert_eq!(delay, Duration::from_secs(6));
            }
            other => panic!("expected reschedule, got {other:?}"),
        }
        assert_eq!(store.smembers("deferq:pending").unwrap().len(), 1);
        assert!(reporter.reports().is_empty());
    }

    #[test]
    fn envelope_failure_increments_attempts_by_one() {
        let store = MemoryStore::new();
        let (engine, _) = engine(store, 10);

        let wrapped = JobDescriptor::retry(4, job());
        let disposition = engine
            .on_failure(wrapped, "boom", "worker-1", "mail")
            .unwrap();

        match disposition {
            Disposition::Rescheduled {
                attempts, delay, ..
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(delay, Duration::from_secs(630));
            }
            other => panic!("expected reschedule, got {other:?}"),
        }
    }

    #[test]
    fn full_escalation_chain_ends_at_the_reporter() {
        let store = MemoryStore::new();
        let (engine, reporter) = engine(store.clone(), 10);
        let expected_delays = [6, 21, 86, 261, 630, 1301, 2410, 4101, 6566];

        // First failure arrives as a plain job, later ones wrapped.
        let mut descriptor = job();
        for (i, want) in expected_delays.iter().enumerate() {
            let disposition = engine
                .on_failure(descriptor, "boom", "worker-1", "mail")
                .unwrap();
            let attempts = match disposition {
                Disposition::Rescheduled {
                    attempts, delay, ..
                } => {
                    assert_eq!(delay, Duration::from_secs(*want), "attempt {}", i + 1);
                    attempts
                }
                other => panic!("expected reschedule, got {other:?}"),
            };
            assert_eq!(attempts, (i + 1) as u32);
            descriptor = JobDescriptor::retry(attempts, job());
        }

        // Tenth failure: budget exhausted, handed to the reporter.
        let disposition = engine
            .on_failure(descriptor, "boom", "worker-1", "mail")
            .unwrap();
        assert!(matches!(disposition, Disposition::GivenUp { attempts: 10 }));

        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].attempts, 10);
        assert_eq!(reports[0].job.class, "flaky.work");
        assert_eq!(reports[0].error, "boom");

        // Nothing further was scheduled for the given-up job.
        let pending = store.smembers("deferq:pending").unwrap();
        assert_eq!(pending.len(), 9);
    }

    #[test]
    fn give_up_reports_the_innermost_job() {
        let store = MemoryStore::new();
        let (engine, reporter) = engine(store, 2);

        // Double-wrapped descriptor; the report must carry the plain job.
        let wrapped = JobDescriptor::retry(1, JobDescriptor::retry(1, job()));
        let disposition = engine
            .on_failure(wrapped, "boom", "worker-1", "mail")
            .unwrap();

        assert!(matches!(disposition, Disposition::GivenUp { attempts: 2 }));
        assert_eq!(reporter.reports()[0].job.class, "flaky.work");
    }

    #[test]
    fn max_attempts_one_never_retries() {
        let store = MemoryStore::new();
        let (engine, reporter) = engine(store.clone(), 1);

        let disposition = engine.on_failure(job(), "boom", "worker-1", "mail").unwrap();
        assert!(matches!(disposition, Disposition::GivenUp { attempts: 1 }));
        assert!(store.smembers("deferq:pending").unwrap().is_empty());
        assert_eq!(reporter.reports().len(), 1);
    }
}
