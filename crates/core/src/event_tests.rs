// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::{test_support::sample_new_job, JobId};
use crate::task_run::TaskRunId;

#[test]
fn job_created_roundtrips_and_tags_with_type() {
    let event = Event::JobCreated {
        job_id: JobId::new("job-1"),
        job: sample_new_job("movies", crate::data_server::DataServerId::new("ds-1")),
        created_at_ms: 1_000,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "job:created");
    let parsed: Event = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn task_claimed_roundtrips() {
    let event = Event::TaskClaimed {
        task_run_id: TaskRunId::new("run-1"),
        worker_id: "worker-1".to_string(),
        lease_expires_at_ms: 5_000,
        claimed_at_ms: 1_000,
    };
    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn task_failed_carries_classified_error() {
    let event = Event::TaskFailed {
        task_run_id: TaskRunId::new("run-1"),
        error: crate::error::TaskError::network("dns failure"),
        retry_count: 1,
        retry_not_before_ms: Some(2_000),
        ended_at_ms: 1_000,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task:failed");
    assert_eq!(json["error"]["kind"], "network");
    let parsed: Event = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn cron_removed_roundtrips() {
    let event = Event::CronRemoved {
        job_id: JobId::new("job-1"),
    };
    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn unknown_type_tag_fails_to_deserialize() {
    let json = serde_json::json!({"type": "bogus:event"});
    let result: Result<Event, _> = serde_json::from_value(json);
    assert!(result.is_err());
}
