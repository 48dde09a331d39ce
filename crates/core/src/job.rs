// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, configuration, and transient status.

use crate::data_server::DataServerId;
use crate::media_server::MediaServerId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a sync job.
    #[derive(Default)]
    pub struct JobId;
}

/// How the job discovers change: a cron-driven full rescan, or an API/webhook-pushed
/// incremental event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchMode {
    Local,
    Api,
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMode::Local => write!(f, "local"),
            WatchMode::Api => write!(f, "api"),
        }
    }
}

/// Transient status of a job, derived from its most recent TaskRun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Queued,
    Running,
    Failed,
    Succeeded,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Idle => "idle",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Failed => "failed",
            JobStatus::Succeeded => "succeeded",
        };
        write!(f, "{s}")
    }
}

/// A user-defined sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub enabled: bool,
    /// Empty string means "no schedule" — the job is only triggered manually or by
    /// webhook/API events.
    pub cron: String,
    pub watch_mode: WatchMode,
    pub source_path: String,
    pub target_path: String,
    pub strm_path: String,
    pub data_server_id: DataServerId,
    pub media_server_id: Option<MediaServerId>,
    /// Opaque JSON blob; parsed into [`crate::options::JobOptions`] by the worker.
    pub options: serde_json::Value,
    pub status: JobStatus,
    pub last_run_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Job {
    /// Whether the job carries a schedule meaningful to the cron scheduler.
    pub fn has_schedule(&self) -> bool {
        self.enabled && !self.cron.trim().is_empty()
    }
}

/// Fields a caller supplies to create a new job; the rest are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub enabled: bool,
    pub cron: String,
    pub watch_mode: WatchMode,
    pub source_path: String,
    pub target_path: String,
    pub strm_path: String,
    pub data_server_id: DataServerId,
    pub media_server_id: Option<MediaServerId>,
    pub options: serde_json::Value,
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;

    /// Builder for [`NewJob`] with sane defaults, for use in other crates' tests.
    pub fn sample_new_job(name: &str, data_server_id: DataServerId) -> NewJob {
        NewJob {
            name: name.to_string(),
            enabled: true,
            cron: String::new(),
            watch_mode: WatchMode::Local,
            source_path: "/remote".to_string(),
            target_path: "/local/target".to_string(),
            strm_path: "/local/target".to_string(),
            data_server_id,
            media_server_id: None,
            options: serde_json::json!({}),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
