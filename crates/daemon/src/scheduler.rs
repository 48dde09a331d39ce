// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Cron Scheduler (C5): a live map `job_id -> next fire time`, polled on
//! an interval, that enqueues a run for each job whose schedule comes due.
//! Grounded in the teacher's `Scheduler` (fire-detect-and-remove over a
//! `HashMap`), generalized from interval durations to real cron expressions
//! via the `cron` crate, which this workspace's Cargo.toml already pins.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::TimeZone;
use cron::Schedule;
use parking_lot::Mutex;
use strmsync_core::{Clock, Event, JobId};
use strmsync_storage::{EnqueueRequest, JobRepository, Store};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct ScheduledEntry {
    expr: String,
    schedule: Schedule,
    next_fire_ms: i64,
}

/// Resolve the next fire time strictly after `after_ms`, or `None` if the
/// expression can never fire again (e.g. a purely historical one-off).
fn compute_next_fire(schedule: &Schedule, after_ms: i64) -> Option<i64> {
    let after = chrono::Utc.timestamp_millis_opt(after_ms).single()?;
    schedule.after(&after).next().map(|dt| dt.timestamp_millis())
}

pub struct CronScheduler {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<JobId, ScheduledEntry>>,
    cancel: CancellationToken,
    tick: std::time::Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CronScheduler {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            entries: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            tick: std::time::Duration::from_secs(1),
            handle: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_tick(store: Arc<Store>, clock: Arc<dyn Clock>, tick: std::time::Duration) -> Self {
        let mut s = Self::new(store, clock);
        s.tick = tick;
        s
    }

    /// Reconcile the live map to the current store state: drop vanished
    /// jobs, insert new ones, reschedule changed expressions. `next_fire` is
    /// always computed fresh from "now" — missed ticks are never backfilled.
    pub fn reload(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let jobs = JobRepository::list(self.store.as_ref());
        let live: HashSet<JobId> = jobs
            .iter()
            .filter(|j| j.has_schedule())
            .map(|j| j.id.clone())
            .collect();

        let removed: Vec<JobId> = {
            let mut entries = self.entries.lock();
            let removed: Vec<JobId> = entries
                .keys()
                .filter(|id| !live.contains(*id))
                .cloned()
                .collect();
            entries.retain(|id, _| live.contains(id));
            removed
        };
        for job_id in removed {
            let _ = self.store.append_event(Event::CronRemoved { job_id });
        }

        for job in jobs.iter().filter(|j| j.has_schedule()) {
            let needs_reset = self
                .entries
                .lock()
                .get(&job.id)
                .map(|e| e.expr != job.cron)
                .unwrap_or(true);
            if needs_reset {
                self.upsert_job(job.id.clone(), job.cron.clone());
            }
        }
    }

    /// Upsert one job's schedule. A no-op once [`CronScheduler::stop`] has
    /// been called — a stopped scheduler's background task is gone, so any
    /// row inserted after that point would sit in `entries` forever unticked.
    pub fn upsert_job(&self, job_id: JobId, expr: String) {
        if self.cancel.is_cancelled() {
            return;
        }
        let now_ms = self.clock.now_ms();
        let schedule = match Schedule::from_str(&expr) {
            Ok(s) => s,
            Err(e) => {
                warn!(%job_id, cron = %expr, error = %e, "invalid cron expression, job stays inactive");
                return;
            }
        };
        let Some(next_fire_ms) = compute_next_fire(&schedule, now_ms) else {
            warn!(%job_id, cron = %expr, "cron expression has no future fire time");
            return;
        };
        self.entries.lock().insert(
            job_id.clone(),
            ScheduledEntry {
                expr: expr.clone(),
                schedule,
                next_fire_ms,
            },
        );
        let _ = self.store.append_event(Event::CronUpserted {
            job_id,
            cron: expr,
            next_fire_at_ms: next_fire_ms,
        });
    }

    /// Remove one job's schedule. Also a no-op once stopped, for the same
    /// reason as [`CronScheduler::upsert_job`].
    pub fn remove_job(&self, job_id: &JobId) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.entries.lock().remove(job_id).is_some() {
            let _ = self.store.append_event(Event::CronRemoved {
                job_id: job_id.clone(),
            });
        }
    }

    /// Starts the cron background task; idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut handle_guard = self.handle.lock();
        if handle_guard.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *handle_guard = Some(tokio::spawn(async move { this.run().await }));
    }

    async fn run(&self) {
        let mut interval = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => self.tick_once(),
            }
        }
    }

    fn tick_once(&self) {
        let now_ms = self.clock.now_ms();
        let due: Vec<JobId> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .filter(|(_, e)| e.next_fire_ms <= now_ms)
                .map(|(id, _)| id.clone())
                .collect()
        };

        for job_id in due {
            match self
                .store
                .enqueue(EnqueueRequest::new(job_id.clone()), now_ms)
            {
                Ok(_) => debug!(%job_id, "cron enqueued run"),
                Err(e) => warn!(%job_id, error = %e, "cron enqueue failed"),
            }

            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(&job_id) {
                match compute_next_fire(&entry.schedule, now_ms) {
                    Some(next) => entry.next_fire_ms = next,
                    None => {
                        entries.remove(&job_id);
                    }
                }
            }
        }
    }

    /// Cooperatively stops: the background task exits so no further ticks
    /// fire, and `reload`/`upsert_job`/`remove_job` become no-ops so a racy
    /// late call can't reinsert a schedule after shutdown.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
