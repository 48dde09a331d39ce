// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the strmsync system.
//!
//! `MaterializedState` derives every durable entity by folding these events in sequence;
//! this is the WAL's unit of durability (see `strmsync_storage::wal`).

use crate::data_server::{DataServer, DataServerId};
use crate::error::TaskError;
use crate::job::{Job, JobId, NewJob};
use crate::media_server::{MediaServer, MediaServerId};
use crate::task_run::{Progress, TaskRunId};
use serde::{Deserialize, Serialize};

/// Events that trigger state transitions in the system.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- job --
    #[serde(rename = "job:created")]
    JobCreated {
        job_id: JobId,
        job: NewJob,
        created_at_ms: i64,
    },

    #[serde(rename = "job:updated")]
    JobUpdated { job: Job },

    #[serde(rename = "job:deleted")]
    JobDeleted { job_id: JobId },

    // -- data server / media server --
    #[serde(rename = "data_server:upsert")]
    DataServerUpsert { data_server: DataServer },

    #[serde(rename = "data_server:deleted")]
    DataServerDeleted { data_server_id: DataServerId },

    #[serde(rename = "media_server:upsert")]
    MediaServerUpsert { media_server: MediaServer },

    #[serde(rename = "media_server:deleted")]
    MediaServerDeleted { media_server_id: MediaServerId },

    // -- settings --
    #[serde(rename = "setting:changed")]
    SettingChanged {
        key: String,
        value: String,
        updated_at_ms: i64,
    },

    // -- task queue --
    #[serde(rename = "task:enqueued")]
    TaskEnqueued {
        task_run_id: TaskRunId,
        job_id: JobId,
        priority: i32,
        sequence: u64,
        options_snapshot: Option<serde_json::Value>,
        enqueued_at_ms: i64,
    },

    #[serde(rename = "task:claimed")]
    TaskClaimed {
        task_run_id: TaskRunId,
        worker_id: String,
        lease_expires_at_ms: i64,
        claimed_at_ms: i64,
    },

    #[serde(rename = "task:heartbeat")]
    TaskHeartbeat {
        task_run_id: TaskRunId,
        worker_id: String,
        lease_expires_at_ms: i64,
    },

    #[serde(rename = "task:progress")]
    TaskProgress {
        task_run_id: TaskRunId,
        progress: Progress,
    },

    #[serde(rename = "task:completed")]
    TaskCompleted {
        task_run_id: TaskRunId,
        progress: Progress,
        ended_at_ms: i64,
    },

    #[serde(rename = "task:failed")]
    TaskFailed {
        task_run_id: TaskRunId,
        error: TaskError,
        retry_count: u32,
        /// `None` when the failure is permanent and the run has moved to `Failed`.
        retry_not_before_ms: Option<i64>,
        ended_at_ms: i64,
    },

    #[serde(rename = "task:cancelled")]
    TaskCancelled {
        task_run_id: TaskRunId,
        ended_at_ms: i64,
    },

    #[serde(rename = "task:reclaimed")]
    TaskReclaimed {
        task_run_id: TaskRunId,
        previous_worker_id: String,
        reclaimed_at_ms: i64,
    },

    // -- cron --
    #[serde(rename = "cron:upserted")]
    CronUpserted {
        job_id: JobId,
        cron: String,
        next_fire_at_ms: i64,
    },

    #[serde(rename = "cron:removed")]
    CronRemoved { job_id: JobId },

    // -- lifecycle --
    #[serde(rename = "shutdown")]
    Shutdown { at_ms: i64 },
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
