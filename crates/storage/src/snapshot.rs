// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! A snapshot stores the complete [`MaterializedState`] at a point in time,
//! identified by the WAL sequence number it was taken at. Recovery loads the
//! snapshot and replays WAL entries after that sequence. Snapshots are
//! zstd-compressed JSON, written to a `.tmp` file and fsynced before an
//! atomic rename makes them visible — crash during a checkpoint never
//! corrupts the previous snapshot.

use crate::migration::MigrationRegistry;
use crate::{MaterializedState, CURRENT_SNAPSHOT_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compress(String),
    #[error(transparent)]
    Migration(#[from] crate::migration::MigrationError),
}

/// A zstd-compressed, versioned capture of [`MaterializedState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// WAL sequence number this snapshot was taken at.
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState) -> Self {
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            seq,
            state,
            created_at: Utc::now(),
        }
    }

    /// Serialize, compress, write to a sibling `.tmp` file, fsync it, then
    /// atomically rename into place and fsync the containing directory — the
    /// rename is not durable, and therefore not safe to assume for WAL
    /// truncation, until that last fsync returns.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json_bytes = serde_json::to_vec(self)?;
        let compressed =
            zstd::encode_all(json_bytes.as_slice(), 3).map_err(|e| SnapshotError::Compress(e.to_string()))?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;

        if let Some(parent) = path.parent() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }

        Ok(())
    }

    /// Load and migrate a snapshot if present. Returns `Ok(None)` if the file
    /// doesn't exist. A corrupt snapshot is rotated to `.bak` and `Ok(None)`
    /// is returned so the daemon falls back to replaying the WAL from empty.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(path)?;
        let parsed = zstd::decode_all(compressed.as_slice())
            .map_err(|e| SnapshotError::Compress(e.to_string()))
            .and_then(|json_bytes| Ok(serde_json::from_slice::<Value>(&json_bytes)?))
            .and_then(|value| {
                let migrated =
                    MigrationRegistry::new().migrate_to(value, CURRENT_SNAPSHOT_VERSION)?;
                Ok(serde_json::from_value::<Snapshot>(migrated)?)
            });

        match parsed {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let bak_path = rotate_bak_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak_path.display(),
                    "corrupt snapshot, moving to .bak and starting fresh",
                );
                fs::rename(path, &bak_path)?;
                Ok(None)
            }
        }
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out. Keeps up
/// to [`MAX_BAK_FILES`] generations; the oldest is dropped at capacity.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
