// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state derived by folding [`strmsync_core::Event`]s over a snapshot.
//!
//! This is the in-memory stand-in for the spec's SQL tables and indexes:
//! `task_runs(status, priority, id)` and `task_runs(job_id, status)` become the
//! sort-and-filter in [`MaterializedState::claimable_task_runs`] and
//! [`MaterializedState::non_terminal_task_run_for_job`]; `jobs(enabled, cron)`
//! becomes [`MaterializedState::schedulable_jobs`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strmsync_core::{
    DataServer, DataServerId, Event, Job, JobId, JobStatus, MediaServer, MediaServerId, Setting,
    TaskRun, TaskRunId, TaskStatus,
};

/// Scheduler bookkeeping for one job, recorded purely for status/introspection —
/// the Scheduler itself always rebuilds its live map from `JobRepository` on reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronState {
    pub cron: String,
    pub next_fire_at_ms: i64,
}

/// The complete durable state of one daemon, derived by replaying the WAL over
/// the last snapshot.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<JobId, Job>,
    pub data_servers: HashMap<DataServerId, DataServer>,
    pub media_servers: HashMap<MediaServerId, MediaServer>,
    pub task_runs: HashMap<TaskRunId, TaskRun>,
    pub settings: HashMap<String, Setting>,
    #[serde(default)]
    pub crons: HashMap<JobId, CronState>,
    /// Monotonic counter for `TaskRun::sequence`, the tie-breaker after
    /// priority in claim ordering.
    #[serde(default)]
    pub next_sequence: u64,
    #[serde(default)]
    pub last_shutdown_at_ms: Option<i64>,
}

impl MaterializedState {
    pub fn get_job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn job_name_taken(&self, name: &str, excluding: Option<&JobId>) -> bool {
        self.jobs
            .values()
            .any(|j| j.name == name && Some(&j.id) != excluding)
    }

    /// Jobs the Cron Scheduler should hold a live entry for: enabled, with a
    /// non-empty cron expression.
    pub fn schedulable_jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().filter(|j| j.has_schedule()).collect();
        jobs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        jobs
    }

    pub fn get_task_run(&self, id: &TaskRunId) -> Option<&TaskRun> {
        self.task_runs.get(id)
    }

    /// The queue's dedup invariant: at most one non-terminal run per job.
    pub fn non_terminal_task_run_for_job(&self, job_id: &JobId) -> Option<&TaskRun> {
        self.task_runs
            .values()
            .find(|t| &t.job_id == job_id && t.is_non_terminal())
    }

    /// Pending runs eligible for claim at `now_ms`, in `(priority asc, sequence asc)` order —
    /// the in-memory equivalent of `ORDER BY priority, id` over `task_runs(status, priority, id)`.
    pub fn claimable_task_runs(&self, now_ms: i64) -> Vec<&TaskRun> {
        let mut runs: Vec<&TaskRun> = self
            .task_runs
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.not_before_ms <= now_ms)
            .collect();
        runs.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.sequence.cmp(&b.sequence)));
        runs
    }

    /// Running rows whose lease has expired as of `now_ms`.
    pub fn expired_task_runs(&self, now_ms: i64) -> Vec<&TaskRun> {
        self.task_runs
            .values()
            .filter(|t| {
                t.status == TaskStatus::Running
                    && t.lease_expires_at_ms.is_some_and(|exp| exp < now_ms)
            })
            .collect()
    }

    pub fn list_task_runs(&self) -> Vec<&TaskRun> {
        let mut runs: Vec<&TaskRun> = self.task_runs.values().collect();
        runs.sort_by(|a, b| a.sequence.cmp(&b.sequence));
        runs
    }

    /// Fold one durable event into the state. Handlers are idempotent by
    /// construction (assignment, not accumulation) wherever the same event
    /// might be applied more than once — once for immediate visibility at the
    /// call site, once more during WAL replay on restart.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobCreated {
                job_id,
                job,
                created_at_ms,
            } => {
                self.jobs.entry(job_id.clone()).or_insert_with(|| Job {
                    id: job_id.clone(),
                    name: job.name.clone(),
                    enabled: job.enabled,
                    cron: job.cron.clone(),
                    watch_mode: job.watch_mode,
                    source_path: job.source_path.clone(),
                    target_path: job.target_path.clone(),
                    strm_path: job.strm_path.clone(),
                    data_server_id: job.data_server_id.clone(),
                    media_server_id: job.media_server_id.clone(),
                    options: job.options.clone(),
                    status: JobStatus::Idle,
                    last_run_at_ms: None,
                    created_at_ms: *created_at_ms,
                    updated_at_ms: *created_at_ms,
                });
            }
            Event::JobUpdated { job } => {
                self.jobs.insert(job.id.clone(), job.clone());
            }
            Event::JobDeleted { job_id } => {
                self.jobs.remove(job_id);
                self.crons.remove(job_id);
            }

            Event::DataServerUpsert { data_server } => {
                self.data_servers
                    .insert(data_server.id.clone(), data_server.clone());
            }
            Event::DataServerDeleted { data_server_id } => {
                self.data_servers.remove(data_server_id);
            }
            Event::MediaServerUpsert { media_server } => {
                self.media_servers
                    .insert(media_server.id.clone(), media_server.clone());
            }
            Event::MediaServerDeleted { media_server_id } => {
                self.media_servers.remove(media_server_id);
            }

            Event::SettingChanged {
                key,
                value,
                updated_at_ms,
            } => {
                self.settings
                    .insert(key.clone(), Setting::new(key.clone(), value.clone(), *updated_at_ms));
            }

            Event::TaskEnqueued {
                task_run_id,
                job_id,
                priority,
                sequence,
                options_snapshot,
                enqueued_at_ms: _,
            } => {
                self.task_runs
                    .entry(task_run_id.clone())
                    .or_insert_with(|| TaskRun {
                        id: task_run_id.clone(),
                        job_id: job_id.clone(),
                        status: TaskStatus::Pending,
                        priority: *priority,
                        sequence: *sequence,
                        started_at_ms: None,
                        ended_at_ms: None,
                        worker_id: None,
                        lease_expires_at_ms: None,
                        not_before_ms: 0,
                        error: None,
                        retry_count: 0,
                        progress: Default::default(),
                        options_snapshot: options_snapshot.clone(),
                    });
                if let Some(job) = self.jobs.get_mut(job_id) {
                    job.status = JobStatus::Queued;
                }
                self.next_sequence = self.next_sequence.max(*sequence + 1);
            }

            Event::TaskClaimed {
                task_run_id,
                worker_id,
                lease_expires_at_ms,
                claimed_at_ms,
            } => {
                if let Some(run) = self.task_runs.get_mut(task_run_id) {
                    run.status = TaskStatus::Running;
                    run.worker_id = Some(worker_id.clone());
                    run.lease_expires_at_ms = Some(*lease_expires_at_ms);
                    run.started_at_ms = Some(*claimed_at_ms);
                    let job_id = run.job_id.clone();
                    if let Some(job) = self.jobs.get_mut(&job_id) {
                        job.status = JobStatus::Running;
                    }
                }
            }

            Event::TaskHeartbeat {
                task_run_id,
                worker_id,
                lease_expires_at_ms,
            } => {
                if let Some(run) = self.task_runs.get_mut(task_run_id) {
                    if run.worker_id.as_deref() == Some(worker_id.as_str()) {
                        run.lease_expires_at_ms = Some(*lease_expires_at_ms);
                    }
                }
            }

            Event::TaskProgress {
                task_run_id,
                progress,
            } => {
                if let Some(run) = self.task_runs.get_mut(task_run_id) {
                    run.progress = *progress;
                }
            }

            Event::TaskCompleted {
                task_run_id,
                progress,
                ended_at_ms,
            } => {
                if let Some(run) = self.task_runs.get_mut(task_run_id) {
                    run.status = TaskStatus::Succeeded;
                    run.progress = *progress;
                    run.ended_at_ms = Some(*ended_at_ms);
                    run.worker_id = None;
                    run.lease_expires_at_ms = None;
                    let job_id = run.job_id.clone();
                    if let Some(job) = self.jobs.get_mut(&job_id) {
                        job.status = JobStatus::Succeeded;
                        job.last_run_at_ms = Some(*ended_at_ms);
                    }
                }
            }

            Event::TaskFailed {
                task_run_id,
                error,
                retry_count,
                retry_not_before_ms,
                ended_at_ms,
            } => {
                if let Some(run) = self.task_runs.get_mut(task_run_id) {
                    run.error = Some(error.clone());
                    run.retry_count = *retry_count;
                    run.worker_id = None;
                    run.lease_expires_at_ms = None;
                    match retry_not_before_ms {
                        Some(not_before) => {
                            run.status = TaskStatus::Pending;
                            run.not_before_ms = *not_before;
                        }
                        None => {
                            run.status = TaskStatus::Failed;
                            run.ended_at_ms = Some(*ended_at_ms);
                        }
                    }
                    let job_id = run.job_id.clone();
                    let is_terminal = run.status.is_terminal();
                    if let Some(job) = self.jobs.get_mut(&job_id) {
                        if is_terminal {
                            job.status = JobStatus::Failed;
                            job.last_run_at_ms = Some(*ended_at_ms);
                        } else {
                            job.status = JobStatus::Queued;
                        }
                    }
                }
            }

            Event::TaskCancelled {
                task_run_id,
                ended_at_ms,
            } => {
                if let Some(run) = self.task_runs.get_mut(task_run_id) {
                    if !run.status.is_terminal() {
                        run.status = TaskStatus::Cancelled;
                        run.ended_at_ms = Some(*ended_at_ms);
                        run.worker_id = None;
                        run.lease_expires_at_ms = None;
                        let job_id = run.job_id.clone();
                        if let Some(job) = self.jobs.get_mut(&job_id) {
                            job.status = JobStatus::Idle;
                            job.last_run_at_ms = Some(*ended_at_ms);
                        }
                    }
                }
            }

            Event::TaskReclaimed {
                task_run_id,
                previous_worker_id,
                reclaimed_at_ms: _,
            } => {
                if let Some(run) = self.task_runs.get_mut(task_run_id) {
                    if run.worker_id.as_deref() == Some(previous_worker_id.as_str()) {
                        run.status = TaskStatus::Pending;
                        run.worker_id = None;
                        run.lease_expires_at_ms = None;
                        run.not_before_ms = 0;
                        run.retry_count += 1;
                        let job_id = run.job_id.clone();
                        if let Some(job) = self.jobs.get_mut(&job_id) {
                            job.status = JobStatus::Queued;
                        }
                    }
                }
            }

            Event::CronUpserted {
                job_id,
                cron,
                next_fire_at_ms,
            } => {
                self.crons.insert(
                    job_id.clone(),
                    CronState {
                        cron: cron.clone(),
                        next_fire_at_ms: *next_fire_at_ms,
                    },
                );
            }
            Event::CronRemoved { job_id } => {
                self.crons.remove(job_id);
            }

            Event::Shutdown { at_ms } => {
                self.last_shutdown_at_ms = Some(*at_ms);
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
