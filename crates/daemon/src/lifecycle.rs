// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, shutdown. Grounded in the teacher's
//! `startup`/`startup_inner`/`shutdown` sequence — acquire an exclusive lock
//! before touching anything else, load durable state, bind the control socket
//! last (only once every earlier step has succeeded), and tear down in the
//! reverse order on the way out.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::crypto::Cipher;
use crate::listener::{ListenCtx, Listener};
use crate::scheduler::CronScheduler;
use crate::worker_pool::{WorkerPool, WorkerPoolConfig};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock at {0}: another daemon instance is already running")]
    LockFailed(PathBuf),

    #[error("failed to bind control socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error(transparent)]
    Store(#[from] strmsync_storage::StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything kept alive for the lifetime of one daemon process.
pub struct Daemon {
    config: Config,
    #[allow(dead_code)]
    lock_file: File,
    store: Arc<strmsync_storage::Store>,
    scheduler: Arc<CronScheduler>,
    worker_pool: Arc<WorkerPool>,
    start_time: Instant,
}

/// Returned by [`startup`]: the running [`Daemon`] plus the bound [`Listener`]
/// ready to be spawned as its own task, and the [`Notify`](tokio::sync::Notify)
/// a `Request::Shutdown` over the control socket fires to wake the caller's
/// shutdown wait loop.
pub struct StartupResult {
    pub daemon: Daemon,
    pub listener: Listener,
    pub shutdown: Arc<tokio::sync::Notify>,
}

impl Daemon {
    pub fn store(&self) -> &Arc<strmsync_storage::Store> {
        &self.store
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Stops the scheduler, then the worker pool (draining in-flight runs up
    /// to `worker_drain_timeout`), checkpoints the store, and removes the
    /// socket and lock files. The order matters: no new runs may be enqueued
    /// by a live cron tick once the worker pool starts draining.
    pub async fn shutdown(self, worker_drain_timeout: Duration) {
        info!("shutting down");
        self.scheduler.stop();
        self.worker_pool.stop(worker_drain_timeout).await;

        match self.store.checkpoint() {
            Ok(seq) => info!(seq, "saved final checkpoint"),
            Err(e) => warn!(error = %e, "failed to save final checkpoint"),
        }

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove lock file");
            }
        }
        info!("shutdown complete");
    }
}

/// Starts the daemon: acquires the instance lock, opens the store, starts the
/// scheduler and worker pool, and binds the control socket last so a partial
/// startup never leaves a socket an operator could connect to.
pub async fn startup(config: Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(&config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.data_dir)?;

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(config.lock_path.clone()))?;
    lock_file.set_len(0)?;
    (&lock_file).write_all(format!("{}\n", std::process::id()).as_bytes())?;

    let store = Arc::new(strmsync_storage::Store::open(&config.data_dir)?);
    info!(
        wal_path = %store.wal_path().display(),
        "recovered durable state"
    );

    let clock: Arc<dyn strmsync_core::Clock> = Arc::new(strmsync_core::SystemClock);
    let cipher = Arc::new(Cipher::new(&config.encryption_key));

    let scheduler = Arc::new(CronScheduler::new(store.clone(), clock.clone()));
    scheduler.reload();

    let worker_pool = Arc::new(WorkerPool::new(WorkerPoolConfig {
        store: store.clone(),
        clock: clock.clone(),
        cipher,
        size: config.worker_count,
        claim_interval_ms: config.claim_interval_ms,
        lease_duration_ms: config.lease_duration_ms,
    }));

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let socket = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    scheduler.start();
    worker_pool.start();

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let listen_ctx = Arc::new(ListenCtx {
        store: store.clone(),
        scheduler: scheduler.clone(),
        worker_pool: worker_pool.clone(),
        clock,
        worker_count: config.worker_count,
        start_time: Instant::now(),
        socket_path: config.socket_path.clone(),
        shutdown: shutdown.clone(),
    });
    let listener = Listener::new(socket, listen_ctx);

    let daemon = Daemon {
        config: config.clone(),
        lock_file,
        store,
        scheduler,
        worker_pool,
        start_time: Instant::now(),
    };

    Ok(StartupResult {
        daemon,
        listener,
        shutdown,
    })
}

/// Remove files a failed startup may have created. Never called on
/// `LockFailed` — those files belong to the daemon instance already running.
fn cleanup_on_failure(config: &Config) {
    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.lock_path);
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
