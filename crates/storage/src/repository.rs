// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow typed interfaces (C7) over [`crate::Store`], one per entity.
//!
//! These exist so the daemon's control-socket handlers and the Worker Pool
//! depend on a small trait rather than `Store`'s full surface — a fake
//! implementation for each is a handful of methods, not the whole event log.

use crate::store::{Store, StoreError};
use strmsync_core::{DataServer, DataServerId, Event, Job, JobId, MediaServer, MediaServerId, NewJob, Setting};

pub trait JobRepository {
    fn create(&self, job: NewJob, now_ms: i64) -> Result<Job, StoreError>;
    fn update(&self, job: Job) -> Result<(), StoreError>;
    fn delete(&self, id: &JobId) -> Result<(), StoreError>;
    fn get(&self, id: &JobId) -> Option<Job>;
    fn list(&self) -> Vec<Job>;
    fn name_taken(&self, name: &str, excluding: Option<&JobId>) -> bool;
}

impl JobRepository for Store {
    fn create(&self, job: NewJob, now_ms: i64) -> Result<Job, StoreError> {
        let job_id = JobId::generate();
        self.append_event(Event::JobCreated {
            job_id: job_id.clone(),
            job,
            created_at_ms: now_ms,
        })?;
        Ok(self
            .with_state(|s| s.get_job(&job_id).cloned())
            .expect("just-created job must be present"))
    }

    fn update(&self, job: Job) -> Result<(), StoreError> {
        self.append_event(Event::JobUpdated { job })?;
        Ok(())
    }

    fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        self.append_event(Event::JobDeleted { job_id: id.clone() })?;
        Ok(())
    }

    fn get(&self, id: &JobId) -> Option<Job> {
        self.with_state(|s| s.get_job(id).cloned())
    }

    fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.with_state(|s| s.jobs.values().cloned().collect());
        jobs.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms));
        jobs
    }

    fn name_taken(&self, name: &str, excluding: Option<&JobId>) -> bool {
        self.with_state(|s| s.job_name_taken(name, excluding))
    }
}

pub trait DataServerRepository {
    fn upsert(&self, data_server: DataServer) -> Result<(), StoreError>;
    fn delete(&self, id: &DataServerId) -> Result<(), StoreError>;
    fn get(&self, id: &DataServerId) -> Option<DataServer>;
    fn list(&self) -> Vec<DataServer>;
}

impl DataServerRepository for Store {
    fn upsert(&self, data_server: DataServer) -> Result<(), StoreError> {
        self.append_event(Event::DataServerUpsert { data_server })?;
        Ok(())
    }

    fn delete(&self, id: &DataServerId) -> Result<(), StoreError> {
        self.append_event(Event::DataServerDeleted {
            data_server_id: id.clone(),
        })?;
        Ok(())
    }

    fn get(&self, id: &DataServerId) -> Option<DataServer> {
        self.with_state(|s| s.data_servers.get(id).cloned())
    }

    fn list(&self) -> Vec<DataServer> {
        self.with_state(|s| s.data_servers.values().cloned().collect())
    }
}

pub trait MediaServerRepository {
    fn upsert(&self, media_server: MediaServer) -> Result<(), StoreError>;
    fn delete(&self, id: &MediaServerId) -> Result<(), StoreError>;
    fn get(&self, id: &MediaServerId) -> Option<MediaServer>;
    fn list(&self) -> Vec<MediaServer>;
}

impl MediaServerRepository for Store {
    fn upsert(&self, media_server: MediaServer) -> Result<(), StoreError> {
        self.append_event(Event::MediaServerUpsert { media_server })?;
        Ok(())
    }

    fn delete(&self, id: &MediaServerId) -> Result<(), StoreError> {
        self.append_event(Event::MediaServerDeleted {
            media_server_id: id.clone(),
        })?;
        Ok(())
    }

    fn get(&self, id: &MediaServerId) -> Option<MediaServer> {
        self.with_state(|s| s.media_servers.get(id).cloned())
    }

    fn list(&self) -> Vec<MediaServer> {
        self.with_state(|s| s.media_servers.values().cloned().collect())
    }
}

/// The queue-shaped half of task-run access lives on [`Store`] directly (see
/// `queue.rs`); this trait covers plain lookups used by the control socket.
pub trait TaskRunRepository {
    fn get(&self, id: &strmsync_core::TaskRunId) -> Option<strmsync_core::TaskRun>;
    fn list_for_job(&self, job_id: &JobId) -> Vec<strmsync_core::TaskRun>;
}

impl TaskRunRepository for Store {
    fn get(&self, id: &strmsync_core::TaskRunId) -> Option<strmsync_core::TaskRun> {
        Store::get_task_run(self, id)
    }

    fn list_for_job(&self, job_id: &JobId) -> Vec<strmsync_core::TaskRun> {
        self.with_state(|s| {
            let mut runs: Vec<_> = s
                .task_runs
                .values()
                .filter(|t| &t.job_id == job_id)
                .cloned()
                .collect();
            runs.sort_by(|a, b| a.sequence.cmp(&b.sequence));
            runs
        })
    }
}

pub trait SettingRepository {
    fn set(&self, key: &str, value: &str, now_ms: i64) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Option<Setting>;
    fn list(&self) -> Vec<Setting>;
}

impl SettingRepository for Store {
    fn set(&self, key: &str, value: &str, now_ms: i64) -> Result<(), StoreError> {
        self.append_event(Event::SettingChanged {
            key: key.to_string(),
            value: value.to_string(),
            updated_at_ms: now_ms,
        })?;
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Setting> {
        self.with_state(|s| s.settings.get(key).cloned())
    }

    fn list(&self) -> Vec<Setting> {
        self.with_state(|s| s.settings.values().cloned().collect())
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
