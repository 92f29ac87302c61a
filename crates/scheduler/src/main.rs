//! Scheduler daemon: runs the poll loop against the configured store.

use std::process::ExitCode;
use std::sync::mpsc;

use tracing::{error, info, warn};

use deferq_scheduler::{DelayedScheduler, RetryConfig, SchedulerConfig};

fn main() -> ExitCode {
    deferq_observability::init();

    let config = SchedulerConfig::from_env();
    let retry = RetryConfig::from_env();

    let store = match build_store() {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "store unreachable at startup");
            return ExitCode::from(1);
        }
    };

    let scheduler = DelayedScheduler::new(store, config);
    info!(
        namespace = %scheduler.config().namespace,
        fuzziness_secs = scheduler.config().fuzziness.as_secs(),
        batch_size = scheduler.config().batch_size,
        max_attempts = retry.max_attempts,
        "deferq scheduler starting"
    );

    // No in-process shutdown path is wired here: the daemon stops when
    // the process is terminated, which is safe because pending tasks are
    // durable in the store. The channel exists because `run` sleeps on
    // it; embedders wanting graceful shutdown use `spawn` and its handle.
    let (_shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    scheduler.run(&shutdown_rx);

    ExitCode::SUCCESS
}

#[cfg(feature = "redis")]
fn build_store() -> Result<deferq_store::RedisStore, deferq_store::StoreError> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| {
        warn!("REDIS_URL not set; using redis://127.0.0.1:6379");
        "redis://127.0.0.1:6379".to_string()
    });

    let store = deferq_store::RedisStore::new(&url)?;
    store.ping()?;
    Ok(store)
}

#[cfg(not(feature = "redis"))]
fn build_store() -> Result<deferq_store::MemoryStore, deferq_store::StoreError> {
    warn!("built without the redis feature; using a process-local store (tasks are not durable)");
    Ok(deferq_store::MemoryStore::new())
}
