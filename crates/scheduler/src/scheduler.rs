//! Delayed task scheduler: registration, due-detection polling, crash
//! reconciliation.
//!
//! A registered task is three store records: membership in the pending
//! index, a payload record, and a time record. Registration and dispatch
//! are not atomic as a unit — a crash mid-sequence leaves fragments — so
//! `reconcile` heals partial state, and the single-key atomicity of
//! `srem` guarantees at-most-one dispatch per task id even with several
//! scheduler instances running against the same store.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use deferq_core::{DelayedTask, JobDescriptor, TaskId};
use deferq_store::TaskStore;

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::keys::KeySpace;

/// Handle to control a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request graceful shutdown and wait for the loop to stop. The
    /// inter-poll sleep wakes immediately on this signal.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Converts "run this at time T" into "appears in the live queue at ~T".
#[derive(Debug, Clone)]
pub struct DelayedScheduler<S: TaskStore> {
    store: S,
    config: SchedulerConfig,
    keys: KeySpace,
}

impl<S: TaskStore> DelayedScheduler<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        let keys = KeySpace::new(config.namespace.clone());
        Self {
            store,
            config,
            keys,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a task to run no earlier than `run_at`.
    ///
    /// Validates the destination queue before any write, then persists
    /// index entry, payload record, and time record, in that order.
    /// Idempotent for identical `(run_at, queue, job)` tuples: the
    /// derived id is the same and the records are simply overwritten.
    pub fn enqueue_at(
        &self,
        run_at: DateTime<Utc>,
        queue: &str,
        job: JobDescriptor,
    ) -> SchedulerResult<TaskId> {
        validate_queue_name(queue)?;

        let task = DelayedTask::new(queue, run_at, job);
        let id = task.id()?;
        let payload = task.encode()?;

        self.store.sadd(&self.keys.pending(), id.as_str())?;
        self.store.set(&self.keys.task(id.as_str()), &payload)?;
        self.store
            .set(&self.keys.delay(id.as_str()), &task.run_at.to_string())?;

        debug!(task = %id, queue, run_at = task.run_at, "registered delayed task");
        Ok(id)
    }

    /// Release every fetched task due before `now + fuzziness` into its
    /// live queue.
    ///
    /// Fetches at most `batch_size` pending ids ascending by time record
    /// and walks them in `(time, id)` order — id is the explicit
    /// secondary key, so equal times dispatch deterministically. Stops at
    /// the first task beyond the horizon.
    ///
    /// Returns `true` when the caller should pause before the next poll
    /// (a fetched task was not yet due, or nothing was pending); `false`
    /// means a full batch of due work was drained and more may remain.
    pub fn poll(&self, now: DateTime<Utc>, fuzziness: Duration) -> SchedulerResult<bool> {
        let horizon = now.timestamp() + fuzziness.as_secs() as i64;

        let batch = self.store.sort_by(
            &self.keys.pending(),
            &self.keys.delay_pattern(),
            0,
            self.config.batch_size,
        )?;
        if batch.is_empty() {
            return Ok(true);
        }

        // Read time records up front; ids whose time record is missing or
        // unreadable have an ambiguous delay and must never dispatch.
        let mut ordered: Vec<(i64, String)> = Vec::with_capacity(batch.len());
        for id in batch {
            match self.store.get(&self.keys.delay(&id))? {
                Some(raw) => match raw.parse::<i64>() {
                    Ok(run_at) => ordered.push((run_at, id)),
                    Err(_) => {
                        debug!(task = %id, "purging task with unreadable time record");
                        self.purge(&id)?;
                    }
                },
                None => {
                    debug!(task = %id, "purging task with missing time record");
                    self.purge(&id)?;
                }
            }
        }
        ordered.sort();

        for (run_at, id) in ordered {
            if run_at > horizon {
                return Ok(true);
            }
            self.dispatch(&id)?;
        }
        Ok(false)
    }

    /// Scan the pending index and purge every id missing its payload or
    /// time record (partial registration, or a dispatch whose deletions
    /// only half-completed before a crash). Idempotent; returns how many
    /// ids were healed.
    pub fn reconcile(&self) -> SchedulerResult<usize> {
        let mut purged = 0;
        for id in self.store.smembers(&self.keys.pending())? {
            let has_payload = self.store.get(&self.keys.task(&id))?.is_some();
            let time_readable = matches!(
                self.store.get(&self.keys.delay(&id))?,
                Some(raw) if raw.parse::<i64>().is_ok()
            );

            if !has_payload || !time_readable {
                debug!(task = %id, has_payload, time_readable, "purging orphaned task");
                self.purge(&id)?;
                purged += 1;
            }
        }

        if purged > 0 {
            info!(purged, "reconciled orphaned delayed tasks");
        }
        Ok(purged)
    }

    /// Push a job onto a live queue, optionally suppressing duplicates.
    ///
    /// With dedup enabled the job's fingerprint is added to the queue's
    /// fingerprint set first; if it was already present the push is
    /// skipped and `false` is returned. Workers drop the fingerprint when
    /// they pop the job.
    pub fn push_live(&self, queue: &str, job: &JobDescriptor) -> SchedulerResult<bool> {
        let encoded = job.encode()?;

        if self.config.dedup_dispatch {
            let fingerprint = job.fingerprint()?;
            if !self
                .store
                .sadd(&self.keys.queue_fingerprints(queue), &fingerprint)?
            {
                debug!(queue, "suppressed duplicate live-queue push");
                return Ok(false);
            }
        }

        self.store.rpush(&self.keys.queue(queue), &encoded)?;
        Ok(true)
    }

    /// Run the poll loop until `shutdown` fires.
    ///
    /// One reconcile pass first, then batches drain back-to-back while
    /// due work remains; once a poll reports quiet the loop sleeps
    /// `2 × fuzziness`, which bounds worst-case dispatch lateness to
    /// about `3 × fuzziness`.
    pub fn run(&self, shutdown: &mpsc::Receiver<()>) {
        info!(namespace = %self.config.namespace, "delayed task scheduler started");

        if let Err(e) = self.reconcile() {
            error!(error = %e, "startup reconcile failed; continuing");
        }

        let pause = 2 * self.config.fuzziness;
        loop {
            match self.poll(Utc::now(), self.config.fuzziness) {
                Ok(false) => {
                    if shutdown.try_recv().is_ok() {
                        break;
                    }
                }
                Ok(true) => {
                    if wait_for_shutdown(shutdown, pause) {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "poll failed; tasks remain durable, retrying next cycle");
                    if wait_for_shutdown(shutdown, pause) {
                        break;
                    }
                }
            }
        }

        info!("delayed task scheduler stopped");
    }

    /// Spawn the run loop in a background thread.
    pub fn spawn(self) -> SchedulerHandle
    where
        S: 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("deferq-scheduler".to_string())
            .spawn(move || self.run(&shutdown_rx))
            .expect("failed to spawn scheduler thread");

        SchedulerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    /// Move one due task from pending storage into its live queue.
    fn dispatch(&self, id: &str) -> SchedulerResult<()> {
        // The claim: whichever instance's srem succeeds owns the dispatch.
        if !self.store.srem(&self.keys.pending(), id)? {
            debug!(task = %id, "task already claimed by another scheduler");
            return Ok(());
        }

        let Some(raw) = self.store.get(&self.keys.task(id))? else {
            debug!(task = %id, "claimed task has no payload record; discarding");
            self.store.del(&self.keys.delay(id))?;
            return Ok(());
        };

        let task = match DelayedTask::decode(&raw) {
            Ok(task) => task,
            Err(e) => {
                warn!(task = %id, error = %e, "purging undecodable task payload");
                self.store.del(&self.keys.task(id))?;
                self.store.del(&self.keys.delay(id))?;
                return Ok(());
            }
        };

        self.store.del(&self.keys.task(id))?;
        self.store.del(&self.keys.delay(id))?;
        self.push_live(&task.queue, &task.job)?;

        info!(task = %id, queue = %task.queue, "dispatched delayed task");
        Ok(())
    }

    /// Remove every fragment of a task, in any state of completeness.
    fn purge(&self, id: &str) -> SchedulerResult<()> {
        self.store.del(&self.keys.task(id))?;
        self.store.del(&self.keys.delay(id))?;
        self.store.srem(&self.keys.pending(), id)?;
        Ok(())
    }
}

/// Sleep up to `pause`, returning `true` if shutdown was requested. A
/// disconnected channel counts as shutdown so an abandoned scheduler
/// never spins.
fn wait_for_shutdown(shutdown: &mpsc::Receiver<()>, pause: Duration) -> bool {
    match shutdown.recv_timeout(pause) {
        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => true,
        Err(mpsc::RecvTimeoutError::Timeout) => false,
    }
}

pub(crate) fn validate_queue_name(queue: &str) -> SchedulerResult<()> {
    if queue.is_empty() {
        return Err(SchedulerError::Configuration(
            "destination queue name is empty".to_string(),
        ));
    }
    if !queue
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(SchedulerError::Configuration(format!(
            "invalid destination queue name: {queue:?}"
        )));
    }
    Ok(())
}
