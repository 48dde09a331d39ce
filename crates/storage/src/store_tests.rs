// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use strmsync_core::test_support::sample_new_job;
use strmsync_core::{DataServerId, JobId};
use tempfile::tempdir;

fn job_created_event(n: u32) -> Event {
    Event::JobCreated {
        job_id: JobId::from(format!("job-{n}")),
        job: sample_new_job(&format!("job-{n}"), DataServerId::from("ds-1")),
        created_at_ms: 1_000,
    }
}

#[test]
fn open_on_empty_dir_starts_with_empty_state() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.with_state(|s| s.jobs.len()), 0);
}

#[test]
fn append_event_is_immediately_visible() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.append_event(job_created_event(1)).unwrap();

    assert_eq!(store.with_state(|s| s.jobs.len()), 1);
}

#[test]
fn reopen_without_checkpoint_replays_wal() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        store.append_event(job_created_event(1)).unwrap();
        store.append_event(job_created_event(2)).unwrap();
    }

    let reopened = Store::open(dir.path()).unwrap();
    assert_eq!(reopened.with_state(|s| s.jobs.len()), 2);
}

#[test]
fn checkpoint_then_reopen_still_has_full_state() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        store.append_event(job_created_event(1)).unwrap();
        store.checkpoint().unwrap();
        store.append_event(job_created_event(2)).unwrap();
    }

    let reopened = Store::open(dir.path()).unwrap();
    assert_eq!(reopened.with_state(|s| s.jobs.len()), 2);
    assert!(reopened.snapshot_path().exists());
}

#[test]
fn checkpoint_truncates_wal_to_entries_after_the_checkpointed_sequence() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    store.append_event(job_created_event(1)).unwrap();
    store.append_event(job_created_event(2)).unwrap();
    store.checkpoint().unwrap();
    store.append_event(job_created_event(3)).unwrap();

    let wal_contents = std::fs::read_to_string(store.wal_path()).unwrap();
    assert_eq!(wal_contents.lines().count(), 1);
}
