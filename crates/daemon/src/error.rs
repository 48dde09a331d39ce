// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level error type: startup, lock acquisition, and the control socket's
//! own transport failures. Errors crossing the Driver/Writer/Engine/Queue
//! boundary stay typed as `strmsync_core::TaskError` (§7); this type only
//! covers the daemon process's own plumbing.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error(transparent)]
    Store(#[from] strmsync_storage::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another daemon instance is already running (lock held at {0})")]
    AlreadyRunning(PathBuf),

    #[error(transparent)]
    Protocol(#[from] crate::protocol::ProtocolError),

    #[error("credential decrypt failed: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),
}
