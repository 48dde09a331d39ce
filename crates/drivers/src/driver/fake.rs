// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fake driver for deterministic engine/worker tests: a flat map of
//! paths to entries plus programmable capabilities and failure injection.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    BuildStrmRequest, Driver, DriverEvent, DriverEventKind, DriverKind, ListOptions, WatchOptions,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use strmsync_core::{CompareOutcome, DriverCapabilities, RemoteEntry, StrmInfo, TaskError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeState {
    entries: HashMap<String, RemoteEntry>,
    list_error: Option<TaskError>,
    stat_errors: HashMap<String, TaskError>,
    events: Vec<DriverEvent>,
    downloaded: Vec<(String, String)>,
    copied: Vec<(String, String)>,
}

/// A fully in-memory [`Driver`] double. By default it composes `http://fake/<path>`
/// as the `.strm` body (url mode) so `BuildStrmInfo` → `CompareStrm` round-trips
/// exercise the same comparison rules a real backend would.
#[derive(Clone)]
pub struct FakeDriver {
    inner: Arc<Mutex<FakeState>>,
    caps: DriverCapabilities,
    base_url: String,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState::default())),
            caps: DriverCapabilities {
                watch: true,
                strm_http: true,
                strm_mount: false,
                pick_code: false,
                sign_url: false,
            },
            base_url: "http://fake".to_string(),
        }
    }

    pub fn with_capabilities(mut self, caps: DriverCapabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Insert a file or directory at `path`, keyed exactly as callers will query it.
    pub fn put(&self, entry: RemoteEntry) {
        self.inner.lock().entries.insert(entry.path.clone(), entry);
    }

    pub fn remove(&self, path: &str) {
        self.inner.lock().entries.remove(path);
    }

    pub fn set_list_error(&self, error: TaskError) {
        self.inner.lock().list_error = Some(error);
    }

    pub fn set_stat_error(&self, path: &str, error: TaskError) {
        self.inner.lock().stat_errors.insert(path.to_string(), error);
    }

    pub fn push_event(&self, event: DriverEvent) {
        self.inner.lock().events.push(event);
    }

    pub fn downloaded(&self) -> Vec<(String, String)> {
        self.inner.lock().downloaded.clone()
    }

    pub fn copied(&self) -> Vec<(String, String)> {
        self.inner.lock().copied.clone()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Local
    }

    fn capabilities(&self) -> DriverCapabilities {
        self.caps
    }

    async fn list(
        &self,
        path: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteEntry>, TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        let inner = self.inner.lock();
        if let Some(err) = &inner.list_error {
            return Err(err.clone());
        }
        let prefix = if path.is_empty() || path == "/" {
            String::new()
        } else {
            format!("{}/", path.trim_matches('/'))
        };
        let mut out: Vec<RemoteEntry> = inner
            .entries
            .values()
            .filter(|e| {
                let trimmed = e.path.trim_start_matches('/');
                if !trimmed.starts_with(&prefix) {
                    return false;
                }
                let rest = &trimmed[prefix.len()..];
                if rest.is_empty() {
                    return false;
                }
                opts.recursive || !rest.contains('/')
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    async fn stat(&self, path: &str, cancel: &CancellationToken) -> Result<RemoteEntry, TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        let inner = self.inner.lock();
        if let Some(err) = inner.stat_errors.get(path) {
            return Err(err.clone());
        }
        inner
            .entries
            .get(path)
            .cloned()
            .ok_or_else(|| TaskError::input_invalid(format!("no such path: {path}")))
    }

    fn build_strm_info(&self, req: BuildStrmRequest) -> StrmInfo {
        let path = format!("/{}", req.remote_path.trim_start_matches('/'));
        StrmInfo {
            raw: format!("{}{}", self.base_url, path),
            base_url: self.base_url.clone(),
            path,
            pick_code: None,
            sign: None,
            expires_at: 0,
        }
    }

    fn compare_strm(&self, expected: &StrmInfo, actual_raw: &str, now_ms: i64) -> CompareOutcome {
        strmsync_core::compare_strm(expected, actual_raw, now_ms, self.caps)
    }

    async fn watch(
        &self,
        _path: &str,
        _opts: WatchOptions,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<DriverEvent>, TaskError> {
        if !self.caps.watch {
            return Err(TaskError::unsupported("fake driver watch disabled"));
        }
        let (tx, rx) = mpsc::channel(64);
        let events = self.inner.lock().events.clone();
        tokio::spawn(async move {
            for event in events {
                if cancel.is_cancelled() || tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        Ok(())
    }

    async fn copy(
        &self,
        local_source_path: &str,
        target_path: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        self.inner
            .lock()
            .copied
            .push((local_source_path.to_string(), target_path.to_string()));
        if let Some(parent) = std::path::Path::new(target_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(e.to_string()))?;
        }
        tokio::fs::write(target_path, b"fake-metadata")
            .await
            .map_err(|e| TaskError::io(e.to_string()))
    }

    async fn download(
        &self,
        remote_path: &str,
        target_path: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        self.inner
            .lock()
            .downloaded
            .push((remote_path.to_string(), target_path.to_string()));
        if let Some(parent) = std::path::Path::new(target_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(e.to_string()))?;
        }
        tokio::fs::write(target_path, b"fake-metadata")
            .await
            .map_err(|e| TaskError::io(e.to_string()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
