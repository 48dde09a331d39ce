// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Direct filesystem backend. No network round-trip: every operation maps
//! straight onto `tokio::fs`, so the only classified errors it ever returns
//! are `io`, `input_invalid`, and `cancelled`.

use super::{
    BuildStrmRequest, Driver, DriverEvent, DriverEventKind, DriverKind, ListOptions, WatchOptions,
};
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use strmsync_core::{CompareOutcome, DriverCapabilities, RemoteEntry, StrmInfo, TaskError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Filesystem driver backed by a mount root on the same host as the daemon.
pub struct LocalDriver {
    root: PathBuf,
}

impl LocalDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, rel: &str) -> Result<PathBuf, TaskError> {
        let cleaned = clean_relative(rel)
            .ok_or_else(|| TaskError::input_invalid(format!("path escapes root: {rel}")))?;
        Ok(self.root.join(cleaned))
    }

    async fn list_one(&self, abs: &Path, rel: &str) -> Result<Vec<RemoteEntry>, TaskError> {
        let mut read_dir = tokio::fs::read_dir(abs)
            .await
            .map_err(|e| TaskError::io(e.to_string()))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| TaskError::io(e.to_string()))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| TaskError::io(e.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_rel = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            entries.push(RemoteEntry {
                path: child_rel,
                name,
                size: metadata.len(),
                mod_time: metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0),
                is_dir: metadata.is_dir(),
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl Driver for LocalDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Local
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            watch: true,
            strm_http: false,
            strm_mount: true,
            pick_code: false,
            sign_url: false,
        }
    }

    async fn list(
        &self,
        path: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteEntry>, TaskError> {
        let abs = self.full_path(path)?;
        if !opts.recursive {
            return self.list_one(&abs, path).await;
        }

        let mut out = Vec::new();
        let mut queue = vec![(abs, path.to_string(), 0u32)];
        while let Some((dir_abs, dir_rel, depth)) = queue.pop() {
            if cancel.is_cancelled() {
                return Err(TaskError::cancelled());
            }
            let children = self.list_one(&dir_abs, &dir_rel).await?;
            for child in children {
                if child.is_dir && depth + 1 <= opts.max_depth {
                    queue.push((self.root.join(&child.path), child.path.clone(), depth + 1));
                }
                out.push(child);
            }
        }
        Ok(out)
    }

    async fn stat(&self, path: &str, _cancel: &CancellationToken) -> Result<RemoteEntry, TaskError> {
        let abs = self.full_path(path)?;
        let metadata = tokio::fs::metadata(&abs)
            .await
            .map_err(|_| TaskError::input_invalid(format!("no such path: {path}")))?;
        let name = abs
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(RemoteEntry {
            path: path.to_string(),
            name,
            size: metadata.len(),
            mod_time: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0),
            is_dir: metadata.is_dir(),
        })
    }

    fn build_strm_info(&self, req: BuildStrmRequest) -> StrmInfo {
        let cleaned = clean_relative(&req.remote_path).unwrap_or_default();
        let path = format!("/{cleaned}");
        let raw = format!("{}{}", self.root.to_string_lossy().trim_end_matches('/'), path);
        StrmInfo {
            raw,
            base_url: String::new(),
            path,
            pick_code: None,
            sign: None,
            expires_at: 0,
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
        let abs = self.full_path(path)?;
        let mode = if opts.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let (raw_tx, mut raw_rx) = std::sync::mpsc::channel();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(raw_tx)
            .map_err(|e| TaskError::io(e.to_string()))?;
        watcher
            .watch(&abs, mode)
            .map_err(|e| TaskError::io(e.to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let _watcher = watcher;
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let event = match raw_rx.recv_timeout(std::time::Duration::from_millis(200)) {
                    Ok(Ok(event)) => event,
                    Ok(Err(_)) | Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                };

                let kind = match event.kind {
                    notify::EventKind::Create(_) => DriverEventKind::Create,
                    notify::EventKind::Remove(_) => DriverEventKind::Delete,
                    notify::EventKind::Modify(_) => DriverEventKind::Update,
                    _ => continue,
                };

                for abs_path in event.paths {
                    let rel = abs_path
                        .strip_prefix(&root)
                        .unwrap_or(&abs_path)
                        .to_string_lossy()
                        .into_owned();
                    let metadata = std::fs::metadata(&abs_path).ok();
                    let driver_event = DriverEvent {
                        kind,
                        path: rel,
                        abs: abs_path.to_string_lossy().into_owned(),
                        size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                        mod_time: 0,
                        is_dir: metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false),
                    };
                    if tx.blocking_send(driver_event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn test_connection(&self, _cancel: &CancellationToken) -> Result<(), TaskError> {
        tokio::fs::metadata(&self.root)
            .await
            .map(|_| ())
            .map_err(|e| TaskError::io(e.to_string()))
    }

    async fn copy(
        &self,
        local_source_path: &str,
        target_path: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        let source = self.full_path(local_source_path)?;
        if let Some(parent) = Path::new(target_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(e.to_string()))?;
        }
        tokio::fs::copy(&source, target_path)
            .await
            .map(|_| ())
            .map_err(|e| TaskError::io(e.to_string()))
    }

    async fn download(
        &self,
        remote_path: &str,
        target_path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        // A local backend never needs a network fetch; downloading is the same
        // as copying from the mount.
        self.copy(remote_path, target_path, cancel).await
    }
}

/// Clean a relative path, rejecting any component that would escape the root.
fn clean_relative(path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
