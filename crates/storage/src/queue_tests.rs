// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use strmsync_core::test_support::sample_new_job;
use strmsync_core::{DataServerId, ErrorKind, TaskError};
use tempfile::tempdir;

fn store_with_job() -> (tempfile::TempDir, Store, JobId) {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let job_id = JobId::from("job-1");
    store
        .append_event(Event::JobCreated {
            job_id: job_id.clone(),
            job: sample_new_job("job-1", DataServerId::from("ds-1")),
            created_at_ms: 0,
        })
        .unwrap();
    (dir, store, job_id)
}

#[test]
fn enqueue_creates_a_pending_run() {
    let (_dir, store, job_id) = store_with_job();

    let outcome = store.enqueue(EnqueueRequest::new(job_id), 1_000).unwrap();
    let EnqueueOutcome::Created(run) = outcome else {
        panic!("expected Created");
    };
    assert_eq!(run.status, TaskStatus::Pending);
    assert_eq!(run.priority, strmsync_core::DEFAULT_PRIORITY);
}

#[test]
fn enqueue_dedups_against_a_non_terminal_run() {
    let (_dir, store, job_id) = store_with_job();

    let first = store
        .enqueue(EnqueueRequest::new(job_id.clone()), 1_000)
        .unwrap();
    let second = store.enqueue(EnqueueRequest::new(job_id), 2_000).unwrap();

    assert!(matches!(second, EnqueueOutcome::Duplicate(_)));
    assert_eq!(first.task_run().id, second.task_run().id);
}

#[test]
fn enqueue_after_completion_creates_a_new_run() {
    let (_dir, store, job_id) = store_with_job();

    let first = store
        .enqueue(EnqueueRequest::new(job_id.clone()), 1_000)
        .unwrap();
    store
        .complete(&first.task_run().id, Progress::default(), 2_000)
        .unwrap();

    let second = store.enqueue(EnqueueRequest::new(job_id), 3_000).unwrap();
    assert!(matches!(second, EnqueueOutcome::Created(_)));
}

#[test]
fn claim_next_picks_oldest_eligible_and_transitions_to_running() {
    let (_dir, store, job_id) = store_with_job();
    let created = store.enqueue(EnqueueRequest::new(job_id), 1_000).unwrap();

    let claimed = store
        .claim_next(
            ClaimRequest {
                worker_id: "worker-1".to_string(),
                lease_duration_ms: 30_000,
            },
            2_000,
        )
        .unwrap()
        .unwrap();

    assert_eq!(claimed.id, created.task_run().id);
    assert_eq!(claimed.status, TaskStatus::Running);
    assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));
    assert_eq!(claimed.lease_expires_at_ms, Some(32_000));
}

#[test]
fn claim_next_returns_none_when_queue_is_empty() {
    let (_dir, store, _job_id) = store_with_job();
    assert!(store
        .claim_next(
            ClaimRequest {
                worker_id: "worker-1".to_string(),
                lease_duration_ms: 1_000,
            },
            1_000,
        )
        .unwrap()
        .is_none());
}

#[test]
fn heartbeat_extends_lease_only_for_the_owning_worker() {
    let (_dir, store, job_id) = store_with_job();
    let created = store.enqueue(EnqueueRequest::new(job_id), 1_000).unwrap();
    let run_id = created.task_run().id.clone();
    store
        .claim_next(
            ClaimRequest {
                worker_id: "worker-1".to_string(),
                lease_duration_ms: 10_000,
            },
            1_000,
        )
        .unwrap();

    store.heartbeat(&run_id, "worker-2", 10_000, 5_000).unwrap();
    let unchanged = store.get_task_run(&run_id).unwrap();
    assert_eq!(unchanged.lease_expires_at_ms, Some(11_000));

    store.heartbeat(&run_id, "worker-1", 10_000, 5_000).unwrap();
    let extended = store.get_task_run(&run_id).unwrap();
    assert_eq!(extended.lease_expires_at_ms, Some(15_000));
}

#[yare::parameterized(
    network_retries = { ErrorKind::Network, 0, true },
    timeout_retries = { ErrorKind::Timeout, 0, true },
    io_retries_once = { ErrorKind::Io, 0, true },
    io_fails_on_second_attempt = { ErrorKind::Io, 1, false },
    input_invalid_fails_immediately = { ErrorKind::InputInvalid, 0, false },
    unsupported_fails_immediately = { ErrorKind::Unsupported, 0, false },
)]
fn fail_classifies_retryable_vs_permanent(kind: ErrorKind, prior_retry_count: u32, should_retry: bool) {
    let (_dir, store, job_id) = store_with_job();
    let created = store.enqueue(EnqueueRequest::new(job_id), 0).unwrap();
    let run_id = created.task_run().id.clone();
    store
        .claim_next(
            ClaimRequest {
                worker_id: "worker-1".to_string(),
                lease_duration_ms: 10_000,
            },
            0,
        )
        .unwrap();

    // Drive retry_count up to `prior_retry_count` with preceding network failures
    // so the classification under test sees the right history.
    for _ in 0..prior_retry_count {
        store
            .fail(&run_id, TaskError::network("retry-setup"), 0)
            .unwrap();
        store
            .claim_next(
                ClaimRequest {
                    worker_id: "worker-1".to_string(),
                    lease_duration_ms: 10_000,
                },
                10_000_000,
            )
            .unwrap();
    }

    store.fail(&run_id, TaskError::new(kind, "boom"), 1_000).unwrap();

    let run = store.get_task_run(&run_id).unwrap();
    if should_retry {
        assert_eq!(run.status, TaskStatus::Pending);
        assert!(run.not_before_ms > 1_000);
    } else {
        assert_eq!(run.status, TaskStatus::Failed);
    }
}

#[test]
fn cancel_pending_run_is_immediate() {
    let (_dir, store, job_id) = store_with_job();
    let created = store.enqueue(EnqueueRequest::new(job_id), 0).unwrap();

    let outcome = store.cancel(&created.task_run().id, 1_000).unwrap();
    assert!(matches!(outcome, CancelOutcome::CancelledPending));
    assert_eq!(
        store.get_task_run(&created.task_run().id).unwrap().status,
        TaskStatus::Cancelled
    );
}

#[test]
fn cancel_running_run_signals_caller_without_mutating() {
    let (_dir, store, job_id) = store_with_job();
    let created = store.enqueue(EnqueueRequest::new(job_id), 0).unwrap();
    let run_id = created.task_run().id.clone();
    store
        .claim_next(
            ClaimRequest {
                worker_id: "worker-1".to_string(),
                lease_duration_ms: 10_000,
            },
            0,
        )
        .unwrap();

    let outcome = store.cancel(&run_id, 1_000).unwrap();
    assert!(matches!(outcome, CancelOutcome::SignalRunning(id) if id == run_id));
    assert_eq!(store.get_task_run(&run_id).unwrap().status, TaskStatus::Running);

    store.finish_cancel(&run_id, 2_000).unwrap();
    assert_eq!(store.get_task_run(&run_id).unwrap().status, TaskStatus::Cancelled);
}

#[test]
fn cancel_on_terminal_run_is_idempotent() {
    let (_dir, store, job_id) = store_with_job();
    let created = store.enqueue(EnqueueRequest::new(job_id), 0).unwrap();
    store
        .complete(&created.task_run().id, Progress::default(), 1_000)
        .unwrap();

    let outcome = store.cancel(&created.task_run().id, 2_000).unwrap();
    assert!(matches!(outcome, CancelOutcome::AlreadyTerminal));
}

#[test]
fn reclaim_expired_returns_leases_to_pending() {
    let (_dir, store, job_id) = store_with_job();
    let created = store.enqueue(EnqueueRequest::new(job_id), 0).unwrap();
    let run_id = created.task_run().id.clone();
    store
        .claim_next(
            ClaimRequest {
                worker_id: "worker-1".to_string(),
                lease_duration_ms: 1_000,
            },
            0,
        )
        .unwrap();

    let reclaimed = store.reclaim_expired(5_000).unwrap();
    assert_eq!(reclaimed, 1);
    let run = store.get_task_run(&run_id).unwrap();
    assert_eq!(run.status, TaskStatus::Pending);
    assert_eq!(run.worker_id, None);
}

#[test]
fn list_task_runs_filters_by_job_and_status() {
    let (_dir, store, job_id) = store_with_job();
    let created = store
        .enqueue(EnqueueRequest::new(job_id.clone()), 0)
        .unwrap();

    let by_job = store.list_task_runs(&TaskRunFilter {
        job_id: Some(job_id),
        status: None,
    });
    assert_eq!(by_job.len(), 1);

    let by_status = store.list_task_runs(&TaskRunFilter {
        job_id: None,
        status: Some(TaskStatus::Running),
    });
    assert!(by_status.is_empty());
    assert_eq!(created.task_run().status, TaskStatus::Pending);
}

#[test]
fn concurrent_enqueue_for_one_job_creates_exactly_one_run() {
    let (_dir, store, job_id) = store_with_job();
    let store = Arc::new(store);

    let created = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let job_id = job_id.clone();
                scope.spawn(move || store.enqueue(EnqueueRequest::new(job_id), 1_000).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });

    let created_count = created
        .iter()
        .filter(|o| matches!(o, EnqueueOutcome::Created(_)))
        .count();
    assert_eq!(created_count, 1);

    let ids: std::collections::HashSet<_> = created.iter().map(|o| o.task_run().id.clone()).collect();
    assert_eq!(ids.len(), 1, "every caller should observe the same single run");
}

#[test]
fn concurrent_claim_next_never_returns_the_same_run_twice() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    // One job per pending run: the queue's enqueue-dedup otherwise allows
    // only one non-terminal run per job, so 8 independently claimable rows
    // need 8 distinct jobs.
    let mut pending = Vec::new();
    for i in 0..8 {
        let job_id = JobId::from(format!("job-claim-{i}"));
        store
            .append_event(Event::JobCreated {
                job_id: job_id.clone(),
                job: sample_new_job(&format!("job-claim-{i}"), DataServerId::from("ds-1")),
                created_at_ms: 0,
            })
            .unwrap();
        let created = store.enqueue(EnqueueRequest::new(job_id), 0).unwrap();
        pending.push(created.task_run().id.clone());
    }
    let store = Arc::new(store);

    let claimed = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    store
                        .claim_next(
                            ClaimRequest {
                                worker_id: format!("worker-{i}"),
                                lease_duration_ms: 60_000,
                            },
                            0,
                        )
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });

    let claimed_ids: Vec<TaskRunId> = claimed.into_iter().flatten().map(|r| r.id).collect();
    assert_eq!(claimed_ids.len(), 8, "every pending row should be claimed exactly once");
    let unique: std::collections::HashSet<_> = claimed_ids.iter().cloned().collect();
    assert_eq!(unique.len(), 8, "no row should be claimed by more than one worker");
    for id in &pending {
        assert!(unique.contains(id));
    }
}
