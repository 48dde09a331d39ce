// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use strmsync_core::DataServerId;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

struct PagedResponder {
    calls: AtomicU32,
}

impl Respond for PagedResponder {
    fn respond(&self, _req: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let body = if call == 0 {
            serde_json::json!({
                "content": [{"name": "a.mkv", "size": 10, "modified": 1, "is_dir": false}],
                "total": 250,
            })
        } else {
            serde_json::json!({
                "content": [{"name": "b.mkv", "size": 20, "modified": 2, "is_dir": false}],
                "total": 250,
            })
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

fn driver_for(server: &MockServer) -> OpenListDriver {
    let url = server.uri();
    let without_scheme = url.trim_start_matches("http://");
    let (host, port) = without_scheme.split_once(':').expect("host:port");
    OpenListDriver::new(host.to_string(), port.parse().expect("port"), "tok".to_string())
}

#[tokio::test]
async fn list_paginates_until_total_is_reached() {
    // PAGE_SIZE is fixed at 200; a total above that forces a second fetch
    // even though each mocked page only carries one entry.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fs/list"))
        .respond_with(PagedResponder {
            calls: AtomicU32::new(0),
        })
        .mount(&server)
        .await;

    let driver = driver_for(&server);
    let cancel = CancellationToken::new();
    let entries = driver
        .list(
            "/movies",
            ListOptions {
                recursive: false,
                max_depth: 0,
            },
            &cancel,
        )
        .await
        .expect("ok");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].path, "/movies/a.mkv");
}

#[tokio::test]
async fn fs_get_not_found_is_input_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fs/get"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let driver = driver_for(&server);
    let cancel = CancellationToken::new();
    let err = driver.stat("/missing.mkv", &cancel).await.unwrap_err();
    assert_eq!(err.kind, strmsync_core::ErrorKind::InputInvalid);
}

#[tokio::test]
async fn stat_caches_the_sign_for_build_strm_info() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fs/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "a.mkv", "size": 10, "modified": 1, "is_dir": false, "sign": "abc123",
        })))
        .mount(&server)
        .await;
    let driver = driver_for(&server);
    let cancel = CancellationToken::new();
    driver.stat("/a.mkv", &cancel).await.expect("ok");

    let info = driver.build_strm_info(BuildStrmRequest {
        data_server_id: DataServerId::new("ds"),
        remote_path: "/a.mkv".to_string(),
        remote_meta: RemoteEntry {
            path: "/a.mkv".to_string(),
            name: "a.mkv".to_string(),
            size: 10,
            mod_time: 1,
            is_dir: false,
        },
    });
    assert!(info.raw.ends_with("/d/a.mkv?sign=abc123"));
    assert_eq!(info.sign.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn build_strm_info_without_a_prior_stat_omits_sign() {
    let server = MockServer::start().await;
    let driver = driver_for(&server);
    let info = driver.build_strm_info(BuildStrmRequest {
        data_server_id: DataServerId::new("ds"),
        remote_path: "/a.mkv".to_string(),
        remote_meta: RemoteEntry {
            path: "/a.mkv".to_string(),
            name: "a.mkv".to_string(),
            size: 10,
            mod_time: 1,
            is_dir: false,
        },
    });
    assert!(info.sign.is_none());
    assert!(!info.raw.contains('?'));
}

#[test]
fn capabilities_declare_signed_urls_but_no_pick_code_or_mount() {
    let driver = OpenListDriver::new("h".to_string(), 1, "t".to_string());
    let caps = driver.capabilities();
    assert!(caps.sign_url);
    assert!(caps.strm_http);
    assert!(!caps.pick_code);
    assert!(!caps.strm_mount);
    assert!(!caps.watch);
}
