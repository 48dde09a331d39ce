// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud-drive aggregator backend. The wire protocol is gRPC-shaped (`list`,
//! `get_file_info`, `create_folder`, `delete`) but this client speaks it over
//! plain HTTP/JSON with a bearer token in request metadata, rather than raw
//! protobuf — the aggregator is known to answer standard ALPN-negotiated
//! gRPC/HTTP2 clients with a bare 405, so we negotiate cleartext HTTP/2 with
//! prior knowledge and treat that failure mode as `network` until auth is
//! confirmed by a successful call.

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
const POLL_INTERVAL_MS: u64 = 5_000;

/// `pick_code` and `sign` are reported by `list`/`stat`/`sign`, but
/// `build_strm_info` is a synchronous trait method — this cache bridges the
/// two so those fields survive into the `.strm` body without a blocking call
/// mid-build. Callers are expected to `stat` a path before building its strm
/// info in the same apply pass.
#[derive(Default, Clone)]
struct CachedMeta {
    pick_code: Option<String>,
    sign: Option<String>,
    expires_at: i64,
}

pub struct CloudDrive2Driver {
    base_url: String,
    host: String,
    port: u16,
    token: String,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, CachedMeta>>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    files: Vec<RemoteFile>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    path: String,
    name: String,
    size: u64,
    #[serde(default)]
    mod_time: i64,
    is_dir: bool,
    #[serde(default)]
    pick_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    sign: String,
    expires_at: i64,
}

impl CloudDrive2Driver {
    pub fn new(host: String, port: u16, token: String) -> Self {
        let base_url = format!("http://{host}:{port}");
        Self {
            base_url,
            host,
            port,
            token,
            client: reqwest::Client::builder()
                .http2_prior_knowledge()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn remember_pick_code(&self, file: &RemoteFile) {
        if let Some(pick_code) = &file.pick_code {
            let mut cache = self.cache.lock();
            cache.entry(file.path.clone()).or_default().pick_code = Some(pick_code.clone());
        }
    }

    fn remember_sign(&self, path: &str, signed: &SignResponse) {
        let mut cache = self.cache.lock();
        let entry = cache.entry(path.to_string()).or_default();
        entry.sign = Some(signed.sign.clone());
        entry.expires_at = signed.expires_at;
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn list_page(&self, path: &str, page: u32) -> Result<ListResponse, TaskError> {
        let resp = self
            .client
            .post(format!("{}/v1/fs/list", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({
                "path": path,
                "page": page,
                "per_page": PAGE_SIZE,
            }))
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            return Err(TaskError::network(
                "aggregator rejected request (405 over negotiated HTTP/2, auth unconfirmed)",
            ));
        }
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "list failed with status {}",
                resp.status()
            )));
        }
        resp.json::<ListResponse>()
            .await
            .map_err(|e| TaskError::network(e.to_string()))
    }

    async fn sign(&self, path: &str) -> Result<SignResponse, TaskError> {
        let resp = self
            .client
            .post(format!("{}/v1/fs/sign", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "sign failed with status {}",
                resp.status()
            )));
        }
        resp.json::<SignResponse>()
            .await
            .map_err(|e| TaskError::network(e.to_string()))
    }
}

#[async_trait]
impl Driver for CloudDrive2Driver {
    fn kind(&self) -> DriverKind {
        DriverKind::CloudDrive2
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            watch: true,
            strm_http: true,
            strm_mount: true,
            pick_code: true,
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
            let response = self.list_page(path, page).await?;
            for file in &response.files {
                self.remember_pick_code(file);
            }
            out.extend(response.files.into_iter().map(|f| RemoteEntry {
                path: f.path,
                name: f.name,
                size: f.size,
                mod_time: f.mod_time,
                is_dir: f.is_dir,
            }));
            if !response.has_more {
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
        let resp = self
            .client
            .post(format!("{}/v1/fs/get_file_info", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TaskError::input_invalid(format!("no such path: {path}")));
        }
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "get_file_info failed with status {}",
                resp.status()
            )));
        }
        let file: RemoteFile = resp
            .json()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        self.remember_pick_code(&file);
        if !file.is_dir {
            if let Ok(signed) = self.sign(&file.path).await {
                self.remember_sign(&file.path, &signed);
            }
        }
        Ok(RemoteEntry {
            path: file.path,
            name: file.name,
            size: file.size,
            mod_time: file.mod_time,
            is_dir: file.is_dir,
        })
    }

    fn build_strm_info(&self, req: BuildStrmRequest) -> StrmInfo {
        let path = format!("/{}", req.remote_path.trim_start_matches('/'));
        let cached = self.cache.lock().get(&req.remote_meta.path).cloned();
        let pick_code = cached.as_ref().and_then(|c| c.pick_code.clone());
        let sign = cached.as_ref().and_then(|c| c.sign.clone());
        let expires_at = cached.as_ref().map(|c| c.expires_at).unwrap_or(0);

        let mut query = Vec::new();
        if let Some(code) = &pick_code {
            query.push(format!("pickcode={code}"));
        }
        if let Some(token) = &sign {
            query.push(format!("sign={token}"));
        }
        let raw = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query.join("&"))
        };

        StrmInfo {
            raw,
            base_url: self.base_url.clone(),
            path,
            pick_code,
            sign,
            expires_at,
        }
    }

    fn compare_strm(&self, expected: &StrmInfo, actual_raw: &str, now_ms: i64) -> CompareOutcome {
        strmsync_core::compare_strm(expected, actual_raw, now_ms, self.capabilities())
    }

    async fn watch(
        &self,
        path: &str,
        opts: WatchOptions,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<DriverEvent>, TaskError> {
        // The aggregator exposes no push channel the core can consume; incremental
        // change detection is done by polling `list` and diffing mtimes.
        let (tx, rx) = mpsc::channel(64);
        let driver = CloudDrive2Driver::new(self.host.clone(), self.port, self.token.clone());
        let path = path.to_string();
        let recursive = opts.recursive;

        tokio::spawn(async move {
            let mut known: HashMap<String, i64> = HashMap::new();
            let list_opts = ListOptions {
                recursive,
                max_depth: 25,
            };
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let Ok(entries) = driver.list(&path, list_opts, &cancel).await else {
                    tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
                    continue;
                };
                let mut seen = std::collections::HashSet::new();
                for entry in entries {
                    seen.insert(entry.path.clone());
                    let prior = known.insert(entry.path.clone(), entry.mod_time);
                    let kind = match prior {
                        None => DriverEventKind::Create,
                        Some(prev) if prev != entry.mod_time => DriverEventKind::Update,
                        _ => continue,
                    };
                    let event = DriverEvent {
                        kind,
                        path: entry.path.clone(),
                        abs: entry.path,
                        size: entry.size,
                        mod_time: entry.mod_time,
                        is_dir: entry.is_dir,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                known.retain(|k, _| seen.contains(k));
                tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        });

        Ok(rx)
    }

    async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        self.list_page("/", 1).await.map(|_| ())
    }

    async fn copy(
        &self,
        _local_source_path: &str,
        _target_path: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        Err(TaskError::unsupported(
            "clouddrive2 exposes no local mount to copy from",
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
        let signed = self.sign(remote_path).await?;
        let resp = self
            .client
            .get(&signed.sign)
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
#[path = "clouddrive2_tests.rs"]
mod tests;
