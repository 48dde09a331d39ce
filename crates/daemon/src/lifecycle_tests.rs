use super::*;

use fs2::FileExt;
use strmsync_storage::JobRepository;
use tempfile::tempdir;

fn test_config(dir: &std::path::Path) -> Config {
    Config {
        data_dir: dir.to_path_buf(),
        wal_path: dir.join("wal.jsonl"),
        snapshot_path: dir.join("snapshot.bin"),
        socket_path: dir.join("daemon.sock"),
        lock_path: dir.join("daemon.pid"),
        log_path: dir.join("daemon.log"),
        encryption_key: "test-key".to_string(),
        port: None,
        tz: None,
        worker_count: 1,
        lease_duration_ms: 60_000,
        claim_interval_ms: 50,
    }
}

#[tokio::test]
async fn startup_then_shutdown_removes_socket_and_lock_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let result = startup(config.clone()).await.unwrap();
    assert!(config.socket_path.exists());
    assert!(config.lock_path.exists());

    drop(result.listener);
    result
        .daemon
        .shutdown(std::time::Duration::from_secs(1))
        .await;

    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_existing_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::write(&config.socket_path, b"").unwrap();

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    match startup(config.clone()).await {
        Err(LifecycleError::LockFailed(_)) => {}
        Err(e) => panic!("expected LockFailed, got: {e}"),
        Ok(_) => panic!("expected LockFailed, but startup succeeded"),
    }

    assert!(config.socket_path.exists(), "must not delete another instance's socket");
    assert!(config.lock_path.exists(), "must not delete another instance's lock");
}

#[test]
fn lock_file_is_not_truncated_before_the_lock_is_acquired() {
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join("daemon.pid");
    std::fs::write(&lock_path, b"99999\n").unwrap();

    // Mirrors startup_inner's open-without-truncate step.
    let _file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .unwrap();

    let contents = std::fs::read_to_string(&lock_path).unwrap();
    assert_eq!(contents, "99999\n");
}

#[tokio::test]
async fn startup_recovers_jobs_from_a_prior_checkpoint() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let result = startup(config.clone()).await.unwrap();
    let data_server_id = strmsync_core::DataServerId::generate();
    JobRepository::create(
        result.daemon.store().as_ref(),
        strmsync_core::job::test_support::sample_new_job("persisted", data_server_id),
        1_000,
    )
    .unwrap();
    drop(result.listener);
    result
        .daemon
        .shutdown(std::time::Duration::from_secs(1))
        .await;

    let restarted = startup(config.clone()).await.unwrap();
    let jobs = JobRepository::list(restarted.daemon.store().as_ref());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "persisted");

    drop(restarted.listener);
    restarted
        .daemon
        .shutdown(std::time::Duration::from_secs(1))
        .await;
}
