// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use strmsync_core::DataServerId;

fn entry(path: &str, is_dir: bool) -> RemoteEntry {
    RemoteEntry {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        size: 100,
        mod_time: 1_000,
        is_dir,
    }
}

#[tokio::test]
async fn list_non_recursive_returns_only_direct_children() {
    let fake = FakeDriver::new();
    fake.put(entry("/a/b.mkv", false));
    fake.put(entry("/a/sub/c.mkv", false));
    let cancel = CancellationToken::new();
    let out = fake
        .list("/a", ListOptions::default(), &cancel)
        .await
        .expect("ok");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].path, "/a/b.mkv");
}

#[tokio::test]
async fn list_recursive_returns_descendants() {
    let fake = FakeDriver::new();
    fake.put(entry("/a/b.mkv", false));
    fake.put(entry("/a/sub/c.mkv", false));
    let cancel = CancellationToken::new();
    let out = fake
        .list(
            "/a",
            ListOptions {
                recursive: true,
                max_depth: 25,
            },
            &cancel,
        )
        .await
        .expect("ok");
    assert_eq!(out.len(), 2);
}

#[tokio::test]
async fn stat_missing_path_is_input_invalid() {
    let fake = FakeDriver::new();
    let cancel = CancellationToken::new();
    let err = fake.stat("/missing", &cancel).await.unwrap_err();
    assert_eq!(err.kind, strmsync_core::ErrorKind::InputInvalid);
}

#[tokio::test]
async fn injected_list_error_is_returned_verbatim() {
    let fake = FakeDriver::new();
    fake.set_list_error(TaskError::network("boom"));
    let cancel = CancellationToken::new();
    let err = fake
        .list("/", ListOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, strmsync_core::ErrorKind::Network);
}

#[tokio::test]
async fn build_then_compare_strm_is_equal() {
    let fake = FakeDriver::new();
    let info = fake.build_strm_info(BuildStrmRequest {
        data_server_id: DataServerId::new("ds"),
        remote_path: "a/b.mkv".to_string(),
        remote_meta: entry("/a/b.mkv", false),
    });
    let outcome = fake.compare_strm(&info, &info.raw, 0);
    assert!(outcome.equal);
    assert!(!outcome.need_update);
}

#[tokio::test]
async fn download_records_the_call_and_writes_a_placeholder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("out.nfo");
    let fake = FakeDriver::new();
    let cancel = CancellationToken::new();
    fake.download("/a.nfo", target.to_str().expect("utf8"), &cancel)
        .await
        .expect("ok");
    assert_eq!(fake.downloaded().len(), 1);
    assert!(target.exists());
}

#[tokio::test]
async fn watch_emits_queued_events_then_closes() {
    let fake = FakeDriver::new();
    fake.push_event(DriverEvent {
        kind: DriverEventKind::Create,
        path: "a.mkv".to_string(),
        abs: "/a.mkv".to_string(),
        size: 1,
        mod_time: 0,
        is_dir: false,
    });
    let cancel = CancellationToken::new();
    let mut rx = fake
        .watch("/", WatchOptions::default(), cancel)
        .await
        .expect("ok");
    let event = rx.recv().await.expect("one event");
    assert_eq!(event.path, "a.mkv");
    assert!(rx.recv().await.is_none());
}
