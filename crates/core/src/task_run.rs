// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One execution record of one Job.

use crate::error::TaskError;
use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a task run.
    #[derive(Default)]
    pub struct TaskRunId;
}

/// Lifecycle status of a [`TaskRun`]. Once a run reaches one of the terminal
/// variants (`Succeeded`, `Failed`, `Cancelled`) it may never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Progress counters accumulated during `Engine::run_once`, mirrored into the
/// TaskRun row at coalesced intervals (see the Worker's progress callback).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: u64,
    pub filtered: u64,
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub deleted: u64,
    pub meta_total: u64,
    pub meta_created: u64,
    pub meta_updated: u64,
    pub meta_processed: u64,
    pub meta_failed: u64,
}

impl Progress {
    /// Clamp `processed` into `[0, total]`, per the Worker's coalescing contract.
    pub fn clamp_processed(&mut self) {
        if self.processed > self.total {
            self.processed = self.total;
        }
    }
}

/// One concrete execution of a Job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: TaskRunId,
    pub job_id: JobId,
    pub status: TaskStatus,
    /// Lower runs first.
    pub priority: i32,
    /// Monotonic creation order, used as the tie-breaker after priority in
    /// `ClaimNext`'s `ORDER BY (priority, id)` equivalent.
    pub sequence: u64,
    pub started_at_ms: Option<i64>,
    pub ended_at_ms: Option<i64>,
    pub worker_id: Option<String>,
    pub lease_expires_at_ms: Option<i64>,
    /// Earliest epoch-ms at which this row becomes claimable again; used to apply
    /// retry backoff without a separate delay queue.
    pub not_before_ms: i64,
    pub error: Option<TaskError>,
    pub retry_count: u32,
    pub progress: Progress,
    pub options_snapshot: Option<serde_json::Value>,
}

impl TaskRun {
    pub fn is_non_terminal(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Default priority used by cron-triggered enqueues.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Maximum number of retries for retryable failures before a row is marked `Failed`.
pub const MAX_RETRIES: u32 = 3;

#[cfg(test)]
#[path = "task_run_tests.rs"]
mod tests;
