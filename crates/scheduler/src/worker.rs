//! Live-queue worker and the job-class handler registry.
//!
//! Workers pop encoded jobs from a live queue, resolve the job class
//! through an explicit registry, and run it. A failed execution is routed
//! to the retry engine — never dropped.

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deferq_core::JobDescriptor;
use deferq_store::TaskStore;

use crate::config::SchedulerConfig;
use crate::error::SchedulerResult;
use crate::keys::KeySpace;
use crate::retry::RetryEngine;

/// Handler capability for one job class.
pub type Handler = Box<dyn Fn(&[Value]) -> Result<(), String> + Send + Sync>;

/// Explicit mapping from job-class identifiers to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, class: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.handlers.insert(class.into(), Box::new(handler));
    }

    fn get(&self, class: &str) -> Option<&Handler> {
        self.handlers.get(class)
    }
}

/// Handle to control a running worker loop.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Executes jobs popped from a live queue.
pub struct Worker<S: TaskStore> {
    store: S,
    keys: KeySpace,
    registry: HandlerRegistry,
    retry: RetryEngine<S>,
    dedup_dispatch: bool,
    name: String,
}

impl<S: TaskStore> Worker<S> {
    pub fn new(
        store: S,
        config: &SchedulerConfig,
        registry: HandlerRegistry,
        retry: RetryEngine<S>,
    ) -> Self {
        Self {
            store,
            keys: KeySpace::new(config.namespace.clone()),
            registry,
            retry,
            dedup_dispatch: config.dedup_dispatch,
            name: format!("worker-{}", Uuid::now_v7()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pop and execute at most one job from `queue`.
    ///
    /// Returns whether a job was consumed. Execution failure is not an
    /// error here — it is the retry engine's input — so `Err` only means
    /// the store or the escalation write failed.
    pub fn run_one(&self, queue: &str) -> SchedulerResult<bool> {
        let Some(raw) = self.store.lpop(&self.keys.queue(queue))? else {
            return Ok(false);
        };

        let job = match JobDescriptor::decode(&raw) {
            Ok(job) => job,
            Err(e) => {
                warn!(worker = %self.name, queue, error = %e, "dropping undecodable job payload");
                return Ok(true);
            }
        };

        // Release the dedup fingerprint now that the job left the queue.
        // Without dedup there is no fingerprint set to maintain.
        if self.dedup_dispatch {
            self.store
                .srem(&self.keys.queue_fingerprints(queue), &job.fingerprint()?)?;
        }

        if let Err(failure) = self.execute(&job) {
            warn!(
                worker = %self.name,
                queue,
                class = %job.innermost().class,
                error = %failure,
                "job execution failed"
            );
            let disposition = self.retry.on_failure(job, &failure, &self.name, queue)?;
            debug!(worker = %self.name, queue, ?disposition, "failure routed");
        }

        Ok(true)
    }

    fn execute(&self, job: &JobDescriptor) -> Result<(), String> {
        let plain = job.innermost();
        match self.registry.get(&plain.class) {
            Some(handler) => handler(&plain.args),
            None => Err(format!("no handler registered for job class {:?}", plain.class)),
        }
    }

    /// Run until `shutdown` fires, pausing `idle_pause` when the queue is
    /// empty.
    pub fn run(&self, queue: &str, idle_pause: Duration, shutdown: &mpsc::Receiver<()>) {
        info!(worker = %self.name, queue, "worker started");

        loop {
            if shutdown.try_recv().is_ok() {
                break;
            }

            match self.run_one(queue) {
                Ok(true) => continue,
                Ok(false) => {
                    if wait_for_shutdown(shutdown, idle_pause) {
                        break;
                    }
                }
                Err(e) => {
                    error!(worker = %self.name, queue, error = %e, "worker cycle failed");
                    if wait_for_shutdown(shutdown, idle_pause) {
                        break;
                    }
                }
            }
        }

        info!(worker = %self.name, queue, "worker stopped");
    }

    /// Spawn the worker loop in a background thread.
    pub fn spawn(self, queue: impl Into<String>, idle_pause: Duration) -> WorkerHandle
    where
        S: 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let queue = queue.into();

        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || self.run(&queue, idle_pause, &shutdown_rx))
            .expect("failed to spawn worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn wait_for_shutdown(shutdown: &mpsc::Receiver<()>, pause: Duration) -> bool {
    match shutdown.recv_timeout(pause) {
        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => true,
        Err(mpsc::RecvTimeoutError::Timeout) => false,
    }
}
