// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The STRM Writer (C2): scoped filesystem I/O for `.strm` bodies and copied
//! metadata sidecars. Every path is resolved relative to a fixed `target_root`
//! and rejected if cleaning it would escape that root.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use strmsync_core::TaskError;

/// Scoped file I/O for one job's output tree.
#[async_trait]
pub trait StrmWriter: Send + Sync {
    /// Returns the file's contents, or `Ok("")` if it doesn't exist — absence
    /// is an ordinary planning input (the entry needs `create`), not an error.
    async fn read(&self, path: &str) -> Result<String, TaskError>;

    /// Write `content` atomically (temp file + rename on the same filesystem)
    /// and, if `mod_time_ms` is non-zero, align the file's mtime to it.
    async fn write(&self, path: &str, content: &str, mod_time_ms: i64) -> Result<(), TaskError>;

    /// Idempotent: deleting an already-missing file is not an error.
    async fn delete(&self, path: &str) -> Result<(), TaskError>;

    async fn mkdir_all(&self, dir: &str) -> Result<(), TaskError>;

    /// Every `.strm` file under the root, as paths relative to it. Finite,
    /// restartable (a fresh call re-walks from scratch), unordered.
    async fn walk_strm_files(&self) -> Result<Vec<String>, TaskError>;

    /// Every file under the root whose extension (case-insensitive, no dot)
    /// is in `extensions`, as paths relative to it. Used by the orphan sweep's
    /// metadata-lane extension (§4.3 stage 4): the sweep only ever touches
    /// non-`.strm` files when a job's `metadata_mode` is not `none`.
    async fn walk_files_with_extensions(
        &self,
        extensions: &HashSet<String>,
    ) -> Result<Vec<String>, TaskError>;
}

/// Filesystem-backed [`StrmWriter`] rooted at `target_root`.
pub struct FsStrmWriter {
    root: PathBuf,
}

impl FsStrmWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, rel: &str) -> Result<PathBuf, TaskError> {
        let cleaned = clean_relative(rel)
            .ok_or_else(|| TaskError::input_invalid(format!("path escapes root: {rel}")))?;
        Ok(self.root.join(cleaned))
    }
}

#[async_trait]
impl StrmWriter for FsStrmWriter {
    async fn read(&self, path: &str) -> Result<String, TaskError> {
        let full = self.full_path(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(TaskError::io(e.to_string())),
        }
    }

    async fn write(&self, path: &str, content: &str, mod_time_ms: i64) -> Result<(), TaskError> {
        let full = self.full_path(path)?;
        let parent = full
            .parent()
            .ok_or_else(|| TaskError::input_invalid(format!("path has no parent: {path}")))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TaskError::io(e.to_string()))?;

        let tmp = parent.join(format!(
            ".{}.tmp-{}",
            full.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "strm".to_string()),
            std::process::id()
        ));
        tokio::fs::write(&tmp, content.as_bytes())
            .await
            .map_err(|e| TaskError::io(e.to_string()))?;
        tokio::fs::rename(&tmp, &full)
            .await
            .map_err(|e| TaskError::io(e.to_string()))?;

        if mod_time_ms != 0 {
            let full = full.clone();
            tokio::task::spawn_blocking(move || {
                let ft = filetime::FileTime::from_unix_time(
                    mod_time_ms / 1_000,
                    ((mod_time_ms % 1_000).unsigned_abs() as u32) * 1_000_000,
                );
                filetime::set_file_mtime(&full, ft)
            })
            .await
            .map_err(|e| TaskError::io(e.to_string()))?
            .map_err(|e| TaskError::io(e.to_string()))?;
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), TaskError> {
        let full = self.full_path(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TaskError::io(e.to_string())),
        }
    }

    async fn mkdir_all(&self, dir: &str) -> Result<(), TaskError> {
        let full = self.full_path(dir)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| TaskError::io(e.to_string()))
    }

    async fn walk_strm_files(&self) -> Result<Vec<String>, TaskError> {
        let mut wanted = HashSet::with_capacity(1);
        wanted.insert("strm".to_string());
        walk_with_extensions(self.root.clone(), wanted).await
    }

    async fn walk_files_with_extensions(
        &self,
        extensions: &HashSet<String>,
    ) -> Result<Vec<String>, TaskError> {
        walk_with_extensions(self.root.clone(), extensions.clone()).await
    }
}

async fn walk_with_extensions(
    root: PathBuf,
    extensions: HashSet<String>,
) -> Result<Vec<String>, TaskError> {
    tokio::task::spawn_blocking(move || {
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.contains(&ext.to_ascii_lowercase()))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(out)
    })
    .await
    .map_err(|e| TaskError::io(e.to_string()))?
}

/// Clean a relative path, rejecting any component that would escape the root.
fn clean_relative(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
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
#[path = "writer_tests.rs"]
mod tests;
