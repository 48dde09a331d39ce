// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use strmsync_core::MediaServerId;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn noop_notifier_always_succeeds() {
    let notifier = NoOpMediaServerNotifier;
    notifier.notify_path_changed("/anything").await.expect("ok");
}

fn sample_media_server(host: String, port: u16) -> MediaServer {
    MediaServer {
        id: MediaServerId::new("ms-1"),
        name: "plex".to_string(),
        host,
        port,
        credentials: Vec::new(),
        options: serde_json::json!({}),
        enabled: true,
        created_at_ms: 0,
        updated_at_ms: 0,
    }
}

#[tokio::test]
async fn http_notifier_posts_the_path_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/library/refresh"))
        .and(body_json(serde_json::json!({ "path": "/movies/alpha" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = server.uri();
    let without_scheme = url.trim_start_matches("http://");
    let (host, port) = without_scheme.split_once(':').expect("host:port");
    let media_server = sample_media_server(host.to_string(), port.parse().expect("port"));
    let notifier = HttpMediaServerNotifier::new(&media_server, b"secret-token");

    notifier
        .notify_path_changed("/movies/alpha")
        .await
        .expect("ok");
}

#[tokio::test]
async fn http_notifier_surfaces_non_success_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/library/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = server.uri();
    let without_scheme = url.trim_start_matches("http://");
    let (host, port) = without_scheme.split_once(':').expect("host:port");
    let media_server = sample_media_server(host.to_string(), port.parse().expect("port"));
    let notifier = HttpMediaServerNotifier::new(&media_server, b"secret-token");

    let err = notifier.notify_path_changed("/movies/alpha").await.unwrap_err();
    assert_eq!(err.kind, strmsync_core::ErrorKind::Network);
}
