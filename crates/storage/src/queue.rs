// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable task queue (C4): enqueue with dedup, claim-under-lock, retry
//! classification, and idempotent cancellation, all expressed as events folded
//! into [`crate::MaterializedState`] by [`crate::Store`].

use crate::store::{Store, StoreError};
use strmsync_core::{
    Event, JobId, Progress, TaskError, TaskRun, TaskRunId, TaskStatus, DEFAULT_PRIORITY,
    MAX_RETRIES,
};

/// Base delay for the first retry of a `network`/`timeout` failure.
const RETRY_BACKOFF_BASE_MS: i64 = 1_000;
/// Ceiling on the exponential backoff delay.
const RETRY_BACKOFF_CAP_MS: i64 = 60_000;

#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub job_id: JobId,
    pub priority: i32,
    pub options_snapshot: Option<serde_json::Value>,
}

impl EnqueueRequest {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            priority: DEFAULT_PRIORITY,
            options_snapshot: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    Created(TaskRun),
    Duplicate(TaskRun),
}

impl EnqueueOutcome {
    pub fn task_run(&self) -> &TaskRun {
        match self {
            EnqueueOutcome::Created(t) | EnqueueOutcome::Duplicate(t) => t,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub worker_id: String,
    pub lease_duration_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TaskRunFilter {
    pub job_id: Option<JobId>,
    pub status: Option<TaskStatus>,
}

impl TaskRunFilter {
    fn matches(&self, run: &TaskRun) -> bool {
        self.job_id.as_ref().is_none_or(|j| j == &run.job_id)
            && self.status.is_none_or(|s| s == run.status)
    }
}

/// Outcome of [`Store::cancel`] on a task run that is not already terminal.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The row had already reached a terminal status; nothing changed.
    AlreadyTerminal,
    /// A pending row was cancelled immediately.
    CancelledPending,
    /// A running row's cancel flag was recorded; the caller (the Worker Pool,
    /// which owns the in-process `CancellationToken` for the active run) is
    /// responsible for actually cancelling the engine's token.
    SignalRunning(TaskRunId),
}

impl Store {
    /// Enqueue a run for `job_id`, deduping against any existing non-terminal
    /// run for the same job. The duplicate check, id/sequence assignment, and
    /// WAL append all run under one [`Store::transact`] lock hold so two
    /// concurrent callers for the same job can never both observe "no
    /// existing run" and both create one.
    pub fn enqueue(&self, req: EnqueueRequest, now_ms: i64) -> Result<EnqueueOutcome, StoreError> {
        self.transact(
            |s| {
                if s.non_terminal_task_run_for_job(&req.job_id).is_some() {
                    return None;
                }
                Some(Event::TaskEnqueued {
                    task_run_id: TaskRunId::generate(),
                    job_id: req.job_id.clone(),
                    priority: req.priority,
                    sequence: s.next_sequence,
                    options_snapshot: req.options_snapshot.clone(),
                    enqueued_at_ms: now_ms,
                })
            },
            |s, event| match event {
                Some(Event::TaskEnqueued { task_run_id, .. }) => EnqueueOutcome::Created(
                    s.get_task_run(task_run_id)
                        .cloned()
                        .expect("just-enqueued run must be present"),
                ),
                _ => EnqueueOutcome::Duplicate(
                    s.non_terminal_task_run_for_job(&req.job_id)
                        .cloned()
                        .expect("no-event decision means a non-terminal run already exists"),
                ),
            },
        )
    }

    /// Claim the oldest eligible pending run, transitioning it to `Running`.
    /// The candidate selection and the claim's WAL append run under one
    /// [`Store::transact`] lock hold, so two concurrent callers can never
    /// both select and claim the same row.
    pub fn claim_next(
        &self,
        req: ClaimRequest,
        now_ms: i64,
    ) -> Result<Option<TaskRun>, StoreError> {
        self.transact(
            |s| {
                let task_run_id = s.claimable_task_runs(now_ms).first()?.id.clone();
                Some(Event::TaskClaimed {
                    task_run_id,
                    worker_id: req.worker_id.clone(),
                    lease_expires_at_ms: now_ms + req.lease_duration_ms,
                    claimed_at_ms: now_ms,
                })
            },
            |s, event| match event {
                Some(Event::TaskClaimed { task_run_id, .. }) => s.get_task_run(task_run_id).cloned(),
                _ => None,
            },
        )
    }

    /// Extend the lease on a run this worker owns. Silently ignored if the
    /// worker no longer owns the row (it may have been reclaimed).
    pub fn heartbeat(
        &self,
        run_id: &TaskRunId,
        worker_id: &str,
        lease_duration_ms: i64,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let owns = self.with_state(|s| {
            s.get_task_run(run_id)
                .is_some_and(|t| t.worker_id.as_deref() == Some(worker_id) && !t.status.is_terminal())
        });
        if !owns {
            return Ok(());
        }
        self.append_event(Event::TaskHeartbeat {
            task_run_id: run_id.clone(),
            worker_id: worker_id.to_string(),
            lease_expires_at_ms: now_ms + lease_duration_ms,
        })?;
        Ok(())
    }

    /// Record intermediate progress, clamped to `[0, total]` by the caller
    /// (the Worker's coalescer) before this is invoked.
    pub fn update_progress(
        &self,
        run_id: &TaskRunId,
        progress: Progress,
    ) -> Result<(), StoreError> {
        self.append_event(Event::TaskProgress {
            task_run_id: run_id.clone(),
            progress,
        })?;
        Ok(())
    }

    /// Terminal transition `Running -> Succeeded`.
    pub fn complete(
        &self,
        run_id: &TaskRunId,
        progress: Progress,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        self.append_event(Event::TaskCompleted {
            task_run_id: run_id.clone(),
            progress,
            ended_at_ms: now_ms,
        })?;
        Ok(())
    }

    /// Classify `error` and either requeue with backoff or move to `Failed`,
    /// per the retry policy: permanent kinds (`input_invalid`, `unsupported`)
    /// fail immediately; `io` retries once; everything else retries with
    /// exponential backoff up to [`MAX_RETRIES`].
    pub fn fail(
        &self,
        run_id: &TaskRunId,
        error: TaskError,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let current_retry_count = self
            .with_state(|s| s.get_task_run(run_id).map(|t| t.retry_count))
            .unwrap_or(0);

        let is_permanent = error.permanent
            || (error.kind == strmsync_core::ErrorKind::Io && current_retry_count >= 1)
            || current_retry_count >= MAX_RETRIES;

        let (retry_count, retry_not_before_ms) = if is_permanent {
            (current_retry_count, None)
        } else {
            let next_count = current_retry_count + 1;
            let backoff =
                (RETRY_BACKOFF_BASE_MS.saturating_mul(1i64 << next_count.min(16))).min(RETRY_BACKOFF_CAP_MS);
            (next_count, Some(now_ms + backoff))
        };

        self.append_event(Event::TaskFailed {
            task_run_id: run_id.clone(),
            error,
            retry_count,
            retry_not_before_ms,
            ended_at_ms: now_ms,
        })?;
        Ok(())
    }

    /// Idempotent cancel. A pending row cancels immediately; a running row's
    /// cancel is signalled back to the caller to act on the live
    /// `CancellationToken`. Calling this again on an already-terminal row is
    /// a no-op.
    pub fn cancel(&self, run_id: &TaskRunId, now_ms: i64) -> Result<CancelOutcome, StoreError> {
        let status = self.with_state(|s| s.get_task_run(run_id).map(|t| t.status));
        match status {
            None | Some(TaskStatus::Succeeded) | Some(TaskStatus::Failed) | Some(TaskStatus::Cancelled) => {
                Ok(CancelOutcome::AlreadyTerminal)
            }
            Some(TaskStatus::Pending) => {
                self.append_event(Event::TaskCancelled {
                    task_run_id: run_id.clone(),
                    ended_at_ms: now_ms,
                })?;
                Ok(CancelOutcome::CancelledPending)
            }
            Some(TaskStatus::Running) => Ok(CancelOutcome::SignalRunning(run_id.clone())),
        }
    }

    /// Finalize a cancel the Worker observed on a running run.
    pub fn finish_cancel(&self, run_id: &TaskRunId, now_ms: i64) -> Result<(), StoreError> {
        self.append_event(Event::TaskCancelled {
            task_run_id: run_id.clone(),
            ended_at_ms: now_ms,
        })?;
        Ok(())
    }

    /// Return expired leases to `Pending`. Invoked periodically by the Worker
    /// Pool supervisor.
    pub fn reclaim_expired(&self, now_ms: i64) -> Result<usize, StoreError> {
        let expired: Vec<(TaskRunId, String)> = self.with_state(|s| {
            s.expired_task_runs(now_ms)
                .into_iter()
                .filter_map(|t| t.worker_id.clone().map(|w| (t.id.clone(), w)))
                .collect()
        });

        for (task_run_id, previous_worker_id) in &expired {
            self.append_event(Event::TaskReclaimed {
                task_run_id: task_run_id.clone(),
                previous_worker_id: previous_worker_id.clone(),
                reclaimed_at_ms: now_ms,
            })?;
        }
        Ok(expired.len())
    }

    pub fn get_task_run(&self, run_id: &TaskRunId) -> Option<TaskRun> {
        self.with_state(|s| s.get_task_run(run_id).cloned())
    }

    pub fn list_task_runs(&self, filter: &TaskRunFilter) -> Vec<TaskRun> {
        self.with_state(|s| {
            s.list_task_runs()
                .into_iter()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
