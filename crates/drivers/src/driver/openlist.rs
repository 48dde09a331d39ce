// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP file-index backend. REST endpoints `POST /api/fs/list` and
//! `POST /api/fs/get` return paged JSON; auth is a bearer token carried in
//! the `Authorization` header with no `Bearer ` prefix (unlike every other
//! backend this crate talks to).

use super::{
    BuildStrmRequest, Driver, DriverEvent, DriverEventKind, DriverKind, ListOptions, WatchOptions,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use strmsync_core::{CompareOutcome, DriverCapabilities, RemoteEntry, StrmInfo, TaskError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PAGE_SIZE: u32 = 200;

pub struct OpenListDriver {
    base_url: String,
    token: String,
    client: reqwest::Client,
    /// `sign` is only returned by `fs/get`; `build_strm_info` is synchronous,
    /// so a prior `stat` call's sign is cached here for the build to read.
    signs: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    content: Vec<Entry>,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct Entry {
    name: String,
    size: u64,
    #[serde(default)]
    modified: i64,
    is_dir: bool,
    #[serde(default)]
    sign: Option<String>,
}

impl OpenListDriver {
    pub fn new(host: String, port: u16, token: String) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            token,
            client: reqwest::Client::new(),
            signs: Mutex::new(HashMap::new()),
        }
    }

    async fn fs_list(&self, path: &str, page: u32) -> Result<ListResponse, TaskError> {
        let resp = self
            .client
            .post(format!("{}/api/fs/list", self.base_url))
            .header("Authorization", &self.token)
            .json(&serde_json::json!({
                "path": path,
                "page": page,
                "per_page": PAGE_SIZE,
                "refresh": false,
            }))
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "fs/list failed with status {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| TaskError::network(e.to_string()))
    }

    async fn fs_get(&self, path: &str) -> Result<Entry, TaskError> {
        let resp = self
            .client
            .post(format!("{}/api/fs/get", self.base_url))
            .header("Authorization", &self.token)
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TaskError::input_invalid(format!("no such path: {path}")));
        }
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "fs/get failed with status {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| TaskError::network(e.to_string()))
    }
}

#[async_trait]
impl Driver for OpenListDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::OpenList
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            watch: false,
            strm_http: true,
            strm_mount: false,
            pick_code: false,
            sign_url: true,
        }
    }

    async fn list(
        &self,
        path: &str,
        _opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteEntry>, TaskError> {
        let mut out = Vec::new();
        let mut page = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(TaskError::cancelled());
            }
            let response = self.fs_list(path, page).await?;
            let fetched = response.content.len() as u64;
            for entry in response.content {
                let child_path = if path.is_empty() || path == "/" {
                    format!("/{}", entry.name)
                } else {
                    format!("{}/{}", path.trim_end_matches('/'), entry.name)
                };
                out.push(RemoteEntry {
                    path: child_path,
                    name: entry.name,
                    size: entry.size,
                    mod_time: entry.modified,
                    is_dir: entry.is_dir,
                });
            }
            if (page * PAGE_SIZE) as u64 >= response.total || fetched == 0 {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    async fn stat(&self, path: &str, cancel: &CancellationToken) -> Result<RemoteEntry, TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        let entry = self.fs_get(path).await?;
        if let Some(sign) = &entry.sign {
            self.signs.lock().insert(path.to_string(), sign.clone());
        }
        Ok(RemoteEntry {
            path: path.to_string(),
            name: entry.name,
            size: entry.size,
            mod_time: entry.modified,
            is_dir: entry.is_dir,
        })
    }

    fn build_strm_info(&self, req: BuildStrmRequest) -> StrmInfo {
        let path = format!("/{}", req.remote_path.trim_start_matches('/'));
        let sign = self.signs.lock().get(&req.remote_path).cloned();
        let raw = match &sign {
            Some(token) => format!("{}/d{}?sign={}", self.base_url, path, token),
            None => format!("{}/d{}", self.base_url, path),
        };
        StrmInfo {
            raw,
            base_url: self.base_url.clone(),
            path,
            pick_code: None,
            sign,
            expires_at: 0,
        }
    }

    fn compare_strm(&self, expected: &StrmInfo, actual_raw: &str, now_ms: i64) -> CompareOutcome {
        strmsync_core::compare_strm(expected, actual_raw, now_ms, self.capabilities())
    }

    async fn watch(
        &self,
        _path: &str,
        _opts: WatchOptions,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<DriverEvent>, TaskError> {
        Err(TaskError::unsupported(
            "openlist does not expose a watch capability",
        ))
    }

    async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        self.fs_list("/", 1).await.map(|_| ())
    }

    async fn copy(
        &self,
        _local_source_path: &str,
        _target_path: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        Err(TaskError::unsupported(
            "openlist exposes no local mount to copy from",
        ))
    }

    async fn download(
        &self,
        remote_path: &str,
        target_path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        let entry = self.fs_get(remote_path).await?;
        let sign = entry
            .sign
            .ok_or_else(|| TaskError::network("fs/get did not return a download sign"))?;
        let download_url = format!("{}/d{}?sign={}", self.base_url, remote_path, sign);
        let resp = self
            .client
            .get(&download_url)
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "download failed with status {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if let Some(parent) = std::path::Path::new(target_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(e.to_string()))?;
        }
        tokio::fs::write(target_path, &bytes)
            .await
            .map_err(|e| TaskError::io(e.to_string()))
    }
}

#[cfg(test)]
#[path = "openlist_tests.rs"]
mod tests;
