// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration, loaded once at startup from the environment (and,
//! if present, a TOML file) and never mutated afterward.

use std::path::PathBuf;

use crate::error::DaemonError;

const DEFAULT_LEASE_DURATION_MS: i64 = 5 * 60 * 1_000;
const DEFAULT_CLAIM_INTERVAL_MS: i64 = 1_000;
const DEFAULT_WORKER_COUNT: usize = 4;

/// Everything the daemon needs to find its data directory, bind its control
/// socket, and size its worker pool. Read once in `main` via [`Config::load`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Base data directory (`DB_PATH`); holds the WAL, snapshot, socket, and
    /// lock/log files.
    pub data_dir: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    /// Passphrase used to derive the AES-256-GCM key for credential blobs.
    pub encryption_key: String,
    /// Control-socket bind port is unused by the Unix socket; carried through
    /// only so the daemon can log it for operators who set `PORT` expecting a
    /// network listener (there isn't one — see SPEC_FULL.md §6).
    pub port: Option<u16>,
    pub tz: Option<String>,
    pub worker_count: usize,
    pub lease_duration_ms: i64,
    pub claim_interval_ms: i64,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// `DB_PATH` selects the data directory; defaults to `$XDG_STATE_HOME/strmsync`
    /// or `~/.local/state/strmsync`. `ENCRYPTION_KEY` is required — the daemon
    /// cannot decrypt any `DataServer`/`MediaServer` credentials without it.
    pub fn load() -> Result<Self, DaemonError> {
        let data_dir = match std::env::var("DB_PATH") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_state_dir()?,
        };

        let encryption_key = std::env::var("ENCRYPTION_KEY")
            .map_err(|_| DaemonError::MissingEnv("ENCRYPTION_KEY"))?;

        let port = std::env::var("PORT").ok().and_then(|s| s.parse().ok());
        let tz = std::env::var("TZ").ok();

        Ok(Self {
            wal_path: data_dir.join("wal.jsonl"),
            snapshot_path: data_dir.join("snapshot.bin"),
            socket_path: data_dir.join("daemon.sock"),
            lock_path: data_dir.join("daemon.pid"),
            log_path: data_dir.join("daemon.log"),
            data_dir,
            encryption_key,
            port,
            tz,
            worker_count: DEFAULT_WORKER_COUNT,
            lease_duration_ms: DEFAULT_LEASE_DURATION_MS,
            claim_interval_ms: DEFAULT_CLAIM_INTERVAL_MS,
        })
    }
}

fn default_state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("strmsync"));
    }
    let home = std::env::var("HOME").map_err(|_| DaemonError::MissingEnv("HOME"))?;
    Ok(PathBuf::from(home).join(".local/state/strmsync"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
