// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Worker Pool (C6): a fixed number of worker loops, each claiming a task,
//! building a Driver + Writer from the claimed job's configuration, invoking
//! the Sync Engine, and persisting progress and the terminal outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use strmsync_core::{
    Clock, DataServerRepository, JobOptions, JobRepository, MediaServerRepository, Progress,
    TaskError, TaskRun, TaskRunId,
};
use strmsync_drivers::{
    notify::{HttpMediaServerNotifier, MediaServerNotifier, NoOpMediaServerNotifier},
    DriverFactory, FsStrmWriter,
};
use strmsync_engine::{run_once, SyncContext};
use strmsync_storage::{ClaimRequest, Store};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::crypto::Cipher;

const PROGRESS_THROTTLE_MS: i64 = 500;
const PROGRESS_THROTTLE_PERCENT: u64 = 1;

pub struct WorkerPoolConfig {
    pub store: Arc<Store>,
    pub clock: Arc<dyn Clock>,
    pub cipher: Arc<Cipher>,
    pub size: usize,
    pub claim_interval_ms: i64,
    pub lease_duration_ms: i64,
}

struct ActiveRun {
    worker_id: String,
    cancel: CancellationToken,
}

/// Fixed-N worker tasks plus one supervisor task, all driven off a shared
/// [`Store`]. `start`/`stop` are idempotent; `cancel_running` lets the control
/// socket forward a `Queue::cancel(SignalRunning)` onto the live token.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    cancel: CancellationToken,
    active: Mutex<HashMap<TaskRunId, ActiveRun>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            active: Mutex::new(HashMap::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Starts `size` worker tasks and one supervisor task. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }
        for i in 0..self.config.size {
            let this = Arc::clone(self);
            let worker_id = format!("worker-{i}");
            handles.push(tokio::spawn(async move { this.worker_loop(worker_id).await }));
        }
        let this = Arc::clone(self);
        handles.push(tokio::spawn(async move { this.supervisor_loop().await }));
    }

    /// Signals cooperative shutdown: running runs receive cancellation,
    /// workers drain. After `timeout` elapses, remaining workers are
    /// abandoned — their runs are reclaimed by the next process instance via
    /// lease expiry.
    pub async fn stop(&self, timeout: Duration) {
        self.cancel.cancel();
        for run in self.active.lock().values() {
            run.cancel.cancel();
        }
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        let joined = tokio::time::timeout(timeout, futures_join_all(handles)).await;
        if joined.is_err() {
            warn!("worker pool stop timed out; abandoning remaining workers");
        }
        let now_ms = self.config.clock.now_ms();
        if let Err(e) = self.config.store.reclaim_expired(now_ms) {
            warn!(error = %e, "final reclaim_expired during shutdown failed");
        }
    }

    /// Forward an externally observed cancel onto the run's live token, if
    /// this process is the one running it.
    pub fn cancel_running(&self, run_id: &TaskRunId) -> bool {
        if let Some(run) = self.active.lock().get(run_id) {
            run.cancel.cancel();
            true
        } else {
            false
        }
    }

    async fn worker_loop(&self, worker_id: String) {
        let claim_interval = Duration::from_millis(self.config.claim_interval_ms.max(0) as u64);
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let now_ms = self.config.clock.now_ms();
            let claimed = self.config.store.claim_next(
                ClaimRequest {
                    worker_id: worker_id.clone(),
                    lease_duration_ms: self.config.lease_duration_ms,
                },
                now_ms,
            );
            match claimed {
                Ok(Some(run)) => self.execute_run(&worker_id, run).await,
                Ok(None) => tokio::time::sleep(claim_interval).await,
                Err(e) => {
                    error!(error = %e, "claim_next failed");
                    tokio::time::sleep(claim_interval).await;
                }
            }
        }
    }

    async fn execute_run(&self, worker_id: &str, run: TaskRun) {
        let run_id = run.id.clone();
        let cancel = CancellationToken::new();
        self.active.lock().insert(
            run_id.clone(),
            ActiveRun {
                worker_id: worker_id.to_string(),
                cancel: cancel.clone(),
            },
        );

        let outcome = self.run_one(&run, cancel).await;
        self.active.lock().remove(&run_id);

        let now_ms = self.config.clock.now_ms();
        match outcome {
            Ok((summary_cancelled, progress)) => {
                if summary_cancelled {
                    if let Err(e) = self.config.store.finish_cancel(&run_id, now_ms) {
                        error!(%run_id, error = %e, "finish_cancel failed");
                    }
                } else {
                    if let Err(e) = self.config.store.complete(&run_id, progress, now_ms) {
                        error!(%run_id, error = %e, "complete failed");
                    }
                    self.notify_best_effort(&run).await;
                }
            }
            Err(task_error) => {
                if let Err(e) = self.config.store.fail(&run_id, task_error, now_ms) {
                    error!(%run_id, error = %e, "fail failed");
                }
            }
        }
    }

    /// Runs one sync to completion, returning `(cancelled, final progress)` on
    /// success or the classified error on failure. Job/DataServer lookup and
    /// options parsing failures are reported as `input_invalid` and permanent,
    /// matching the Worker's validation contract (SPEC_FULL.md §4.6 step 3).
    async fn run_one(
        &self,
        run: &TaskRun,
        cancel: CancellationToken,
    ) -> Result<(bool, Progress), TaskError> {
        let job = JobRepository::get(self.config.store.as_ref(), &run.job_id)
            .ok_or_else(|| TaskError::input_invalid(format!("unknown job {}", run.job_id)))?;

        let data_server = DataServerRepository::get(self.config.store.as_ref(), &job.data_server_id)
            .ok_or_else(|| {
                TaskError::input_invalid(format!("unknown data server {}", job.data_server_id))
            })?;

        let decrypted = self
            .config
            .cipher
            .decrypt(&data_server.credentials)
            .map_err(|e| TaskError::input_invalid(format!("credential decrypt failed: {e}")))?;

        let driver: Arc<dyn strmsync_drivers::Driver> =
            Arc::from(DriverFactory::build(&data_server, &decrypted));
        let writer: Arc<dyn strmsync_drivers::StrmWriter> =
            Arc::new(FsStrmWriter::new(job.target_path.clone()));

        let options = JobOptions::from_value(&job.options)?;
        let mut ctx = SyncContext::new(
            job.id.clone(),
            run.id.clone(),
            job.source_path.clone(),
            job.target_path.clone(),
            &options,
        );

        let coalescer = ProgressCoalescer::new(
            self.config.store.clone(),
            run.id.clone(),
            self.config.clock.clone(),
        );
        ctx.progress_callback = Some(Arc::new(move |p| coalescer.observe(p)));

        let summary = run_once(
            cancel,
            ctx,
            driver,
            writer,
            job.data_server_id.clone(),
            self.config.clock.clone(),
        )
        .await?;

        Ok((summary.cancelled, summary.progress))
    }

    async fn notify_best_effort(&self, run: &TaskRun) {
        let Some(job) = JobRepository::get(self.config.store.as_ref(), &run.job_id) else {
            return;
        };
        let Some(media_server_id) = job.media_server_id.clone() else {
            return;
        };
        let Some(media_server) = MediaServerRepository::get(self.config.store.as_ref(), &media_server_id)
        else {
            return;
        };
        let decrypted = match self.config.cipher.decrypt(&media_server.credentials) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "media server credential decrypt failed");
                return;
            }
        };
        let notifier: Box<dyn MediaServerNotifier> = if media_server.enabled {
            Box::new(HttpMediaServerNotifier::new(&media_server, &decrypted))
        } else {
            Box::new(NoOpMediaServerNotifier)
        };
        if let Err(e) = notifier.notify_path_changed(&job.target_path).await {
            warn!(job_id = %job.id, error = %e, "media server notify failed (best-effort)");
        }
    }

    async fn supervisor_loop(&self) {
        let interval = Duration::from_millis((self.config.lease_duration_ms / 3).max(1) as u64);
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            tokio::time::sleep(interval).await;
            let now_ms = self.config.clock.now_ms();
            match self.config.store.reclaim_expired(now_ms) {
                Ok(n) if n > 0 => info!(reclaimed = n, "reclaimed expired leases"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "reclaim_expired failed"),
            }
            let active: Vec<(TaskRunId, String)> = self
                .active
                .lock()
                .iter()
                .map(|(run_id, run)| (run_id.clone(), run.worker_id.clone()))
                .collect();
            for (run_id, worker_id) in active {
                if let Err(e) =
                    self.config
                        .store
                        .heartbeat(&run_id, &worker_id, self.config.lease_duration_ms, now_ms)
                {
                    warn!(%run_id, error = %e, "heartbeat failed");
                }
            }
        }
    }
}

/// Throttles the engine's per-item progress callback down to the Worker's
/// persistence cadence: at most every 500 ms, or immediately on a >=1% change
/// in completion, whichever condition is met first.
struct ProgressCoalescer {
    store: Arc<Store>,
    run_id: TaskRunId,
    clock: Arc<dyn Clock>,
    last_update_ms: Mutex<i64>,
    last_percent: Mutex<u64>,
}

impl ProgressCoalescer {
    fn new(store: Arc<Store>, run_id: TaskRunId, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            run_id,
            clock,
            last_update_ms: Mutex::new(0),
            last_percent: Mutex::new(0),
        }
    }

    fn observe(&self, mut progress: Progress) {
        progress.clamp_processed();
        let now_ms = self.clock.now_ms();
        let total = (progress.total + progress.meta_total).max(1);
        let done = progress.processed + progress.meta_processed;
        let percent = (done * 100) / total;

        let mut last_update_ms = self.last_update_ms.lock();
        let mut last_percent = self.last_percent.lock();
        let elapsed = now_ms - *last_update_ms;
        let percent_delta = percent.abs_diff(*last_percent);
        if elapsed < PROGRESS_THROTTLE_MS && percent_delta < PROGRESS_THROTTLE_PERCENT {
            return;
        }
        *last_update_ms = now_ms;
        *last_percent = percent;
        drop(last_update_ms);
        drop(last_percent);

        if let Err(e) = self.store.update_progress(&self.run_id, progress) {
            warn!(run_id = %self.run_id, error = %e, "update_progress failed");
        }
    }
}

/// Minimal join-all so this module doesn't need the `futures` crate for one call site.
async fn futures_join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
