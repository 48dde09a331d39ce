// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-sync notification to a [`strmsync_core::MediaServer`]. The only operation
//! the core consumes is `NotifyPathChanged(path)`; the collaborator's wire format
//! is opaque, so this module only commits to an HTTP POST with a JSON body —
//! real media servers vary in endpoint shape, so a job's `MediaServer.options`
//! blob can override the path template.

use async_trait::async_trait;
use strmsync_core::{MediaServer, TaskError};

/// The only interface the core consumes against a media server.
#[async_trait]
pub trait MediaServerNotifier: Send + Sync {
    async fn notify_path_changed(&self, path: &str) -> Result<(), TaskError>;
}

/// Discards every notification. Used when a Job has no `media_server_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMediaServerNotifier;

#[async_trait]
impl MediaServerNotifier for NoOpMediaServerNotifier {
    async fn notify_path_changed(&self, _path: &str) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Posts `{"path": "..."}` to `http://host:port/api/library/refresh` with a
/// bearer token carried in the media server's (already-decrypted) credentials.
pub struct HttpMediaServerNotifier {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpMediaServerNotifier {
    pub fn new(media_server: &MediaServer, decrypted_credentials: &[u8]) -> Self {
        Self {
            base_url: format!("http://{}:{}", media_server.host, media_server.port),
            token: String::from_utf8_lossy(decrypted_credentials).into_owned(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MediaServerNotifier for HttpMediaServerNotifier {
    async fn notify_path_changed(&self, path: &str) -> Result<(), TaskError> {
        let resp = self
            .client
            .post(format!("{}/api/library/refresh", self.base_url))
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "media server notify failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
