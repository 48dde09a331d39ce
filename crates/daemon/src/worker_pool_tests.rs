use super::*;

use std::fs;
use std::time::Duration as StdDuration;

use strmsync_core::clock::FakeClock;
use strmsync_core::{DataServer, DataServerKind, JobOptions};
use strmsync_storage::EnqueueRequest;
use tempfile::TempDir;

fn test_pool(store: Arc<Store>, size: usize) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(WorkerPoolConfig {
        store,
        clock: Arc::new(FakeClock::new(1_000)),
        cipher: Arc::new(Cipher::new("worker-pool-tests")),
        size,
        claim_interval_ms: 10,
        lease_duration_ms: 60_000,
    }))
}

async fn wait_for_terminal(store: &Store, run_id: &strmsync_core::TaskRunId) -> strmsync_core::TaskRun {
    for _ in 0..200 {
        if let Some(run) = store.get_task_run(run_id) {
            if run.status.is_terminal() {
                return run;
            }
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    panic!("task run {run_id} never reached a terminal status");
}

#[tokio::test]
async fn claims_and_completes_a_local_sync() {
    let data_dir = TempDir::new().unwrap();
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    fs::write(source_dir.path().join("movie.mp4"), b"not really a movie").unwrap();

    let store = Arc::new(Store::open(data_dir.path()).unwrap());

    let data_server = DataServer {
        id: strmsync_core::DataServerId::generate(),
        name: "local".to_string(),
        kind: DataServerKind::Local,
        host: source_dir.path().to_string_lossy().into_owned(),
        port: 0,
        credentials: Vec::new(),
        options: serde_json::json!({}),
        enabled: true,
        created_at_ms: 0,
        updated_at_ms: 0,
    };
    DataServerRepository::upsert(store.as_ref(), data_server.clone()).unwrap();

    let mut new_job = strmsync_core::job::test_support::sample_new_job(
        "movies",
        data_server.id.clone(),
    );
    new_job.source_path = String::new();
    new_job.target_path = target_dir.path().to_string_lossy().into_owned();
    new_job.options = serde_json::to_value(JobOptions {
        extensions: ["mp4".to_string()].into_iter().collect(),
        ..JobOptions::default()
    })
    .unwrap();
    let job = JobRepository::create(store.as_ref(), new_job, 1_000).unwrap();

    let enqueued = store
        .enqueue(EnqueueRequest::new(job.id.clone()), 1_000)
        .unwrap();
    let run_id = enqueued.task_run().id.clone();

    let pool = test_pool(store.clone(), 1);
    pool.start();

    let run = wait_for_terminal(&store, &run_id).await;
    assert_eq!(run.status, strmsync_core::TaskStatus::Succeeded);
    assert!(target_dir.path().join("movie.strm").exists());

    pool.stop(StdDuration::from_secs(1)).await;
}

#[tokio::test]
async fn fails_permanently_on_unknown_job() {
    let data_dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(data_dir.path()).unwrap());

    // Enqueue against a job id that was never created; claim_next will still
    // hand it to a worker since enqueue doesn't validate the job exists.
    let fake_job_id = strmsync_core::JobId::generate();
    let enqueued = store
        .enqueue(EnqueueRequest::new(fake_job_id), 1_000)
        .unwrap();
    let run_id = enqueued.task_run().id.clone();

    let pool = test_pool(store.clone(), 1);
    pool.start();

    let run = wait_for_terminal(&store, &run_id).await;
    assert_eq!(run.status, strmsync_core::TaskStatus::Failed);
    assert!(run.error.unwrap().permanent);

    pool.stop(StdDuration::from_secs(1)).await;
}

#[tokio::test]
async fn cancel_running_signals_the_live_token() {
    let data_dir = TempDir::new().unwrap();
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    for i in 0..50 {
        fs::write(source_dir.path().join(format!("f{i}.mp4")), b"x").unwrap();
    }

    let store = Arc::new(Store::open(data_dir.path()).unwrap());
    let data_server = DataServer {
        id: strmsync_core::DataServerId::generate(),
        name: "local".to_string(),
        kind: DataServerKind::Local,
        host: source_dir.path().to_string_lossy().into_owned(),
        port: 0,
        credentials: Vec::new(),
        options: serde_json::json!({}),
        enabled: true,
        created_at_ms: 0,
        updated_at_ms: 0,
    };
    DataServerRepository::upsert(store.as_ref(), data_server.clone()).unwrap();

    let mut new_job =
        strmsync_core::job::test_support::sample_new_job("movies", data_server.id.clone());
    new_job.source_path = String::new();
    new_job.target_path = target_dir.path().to_string_lossy().into_owned();
    new_job.options = serde_json::to_value(JobOptions {
        extensions: ["mp4".to_string()].into_iter().collect(),
        ..JobOptions::default()
    })
    .unwrap();
    let job = JobRepository::create(store.as_ref(), new_job, 1_000).unwrap();

    let enqueued = store
        .enqueue(EnqueueRequest::new(job.id.clone()), 1_000)
        .unwrap();
    let run_id = enqueued.task_run().id.clone();

    let pool = test_pool(store.clone(), 1);
    pool.start();

    // Give the worker a moment to claim the run, then cancel it.
    for _ in 0..50 {
        if store
            .get_task_run(&run_id)
            .is_some_and(|r| r.status == strmsync_core::TaskStatus::Running)
        {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    let cancelled = pool.cancel_running(&run_id);
    assert!(cancelled);

    let run = wait_for_terminal(&store, &run_id).await;
    assert_eq!(run.status, strmsync_core::TaskStatus::Cancelled);

    pool.stop(StdDuration::from_secs(1)).await;
}
