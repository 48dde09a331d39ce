// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver: the capability-declaring abstraction over data-source backends (C1).
//!
//! A `Driver` lists and stats a remote file tree, composes the bytes of a `.strm`
//! file, and (optionally) watches for incremental changes or serves signed URLs.
//! Callers branch on [`Driver::capabilities`] rather than on a type tag — the
//! Sync Engine never matches on [`DriverKind`] itself.

mod clouddrive2;
mod local;
mod openlist;
mod webdav;

pub use clouddrive2::CloudDrive2Driver;
pub use local::LocalDriver;
pub use openlist::OpenListDriver;
pub use webdav::WebDavDriver;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDriver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strmsync_core::{
    CompareOutcome, DataServer, DataServerId, DataServerKind, DriverCapabilities, RemoteEntry,
    StrmInfo, TaskError,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Alias so driver code reads naturally; a Driver's kind is exactly the
/// [`DataServer`] binding it was built from.
pub type DriverKind = DataServerKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    pub recursive: bool,
    /// 0 means non-recursive; the engine always caps this at 25.
    pub max_depth: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub recursive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverEventKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEvent {
    pub kind: DriverEventKind,
    /// Path relative to the watched root.
    pub path: String,
    /// Absolute path or URL as reported by the backend.
    pub abs: String,
    pub size: u64,
    pub mod_time: i64,
    pub is_dir: bool,
}

/// Inputs to [`Driver::build_strm_info`].
#[derive(Debug, Clone)]
pub struct BuildStrmRequest {
    pub data_server_id: DataServerId,
    pub remote_path: String,
    pub remote_meta: RemoteEntry,
}

/// A data-source backend, polymorphic over the concrete wire protocol.
///
/// Every I/O operation is cancellation-aware: implementations must check
/// `cancel` between backend round-trips and return `TaskError::cancelled` (not
/// hang or silently ignore it) once it fires.
#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> DriverKind;

    fn capabilities(&self) -> DriverCapabilities;

    /// List a directory. `recursive` walks to `max_depth` (0 = non-recursive).
    /// Ordering is unspecified; never returns duplicates.
    async fn list(
        &self,
        path: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteEntry>, TaskError>;

    /// Single-entry lookup. `input_invalid` for an unknown path.
    async fn stat(&self, path: &str, cancel: &CancellationToken) -> Result<RemoteEntry, TaskError>;

    /// Compose the exact `.strm` payload and its structured comparison fields.
    fn build_strm_info(&self, req: BuildStrmRequest) -> StrmInfo;

    /// Decide whether `actual_raw` still represents `expected`. Default impl
    /// defers to the shared rule table keyed by this driver's capabilities.
    fn compare_strm(&self, expected: &StrmInfo, actual_raw: &str, now_ms: i64) -> CompareOutcome {
        strmsync_core::compare_strm(expected, actual_raw, now_ms, self.capabilities())
    }

    /// Watch `path` for changes. `unsupported` if [`DriverCapabilities::watch`]
    /// is false. The channel closes on cancellation or fatal error.
    async fn watch(
        &self,
        path: &str,
        opts: WatchOptions,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<DriverEvent>, TaskError>;

    /// Dry-run reachability/auth probe.
    async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), TaskError>;

    /// Copy from a locally-accessible path exposed by this backend (e.g.
    /// `local`, or a FUSE-mounted WebDAV). `unsupported` otherwise.
    async fn copy(
        &self,
        local_source_path: &str,
        target_path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TaskError>;

    /// Fetch remote bytes directly, for backends without a local mount.
    async fn download(
        &self,
        remote_path: &str,
        target_path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TaskError>;
}

/// Builds a boxed [`Driver`] from a [`DataServer`] binding. Credential bytes are
/// taken as already decrypted; decrypting them is outside this crate's concern.
pub struct DriverFactory;

impl DriverFactory {
    pub fn build(data_server: &DataServer, decrypted_credentials: &[u8]) -> Box<dyn Driver> {
        match data_server.kind {
            DriverKind::Local => Box::new(LocalDriver::new(data_server.host.clone())),
            DriverKind::CloudDrive2 => Box::new(CloudDrive2Driver::new(
                data_server.host.clone(),
                data_server.port,
                String::from_utf8_lossy(decrypted_credentials).into_owned(),
            )),
            DriverKind::OpenList => Box::new(OpenListDriver::new(
                data_server.host.clone(),
                data_server.port,
                String::from_utf8_lossy(decrypted_credentials).into_owned(),
            )),
            DriverKind::WebDav => Box::new(WebDavDriver::new(
                data_server.host.clone(),
                data_server.port,
                String::from_utf8_lossy(decrypted_credentials).into_owned(),
            )),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
