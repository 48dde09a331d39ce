// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed error-kind taxonomy shared by drivers, the writer, the engine, and the queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The single closed set of error kinds that can cross a driver/writer/engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed job options, path traversal, reference to unknown job/server.
    InputInvalid,
    /// Requested a capability the driver does not declare.
    Unsupported,
    /// Connection, DNS, TLS, transient RPC failure.
    Network,
    /// Deadline exceeded.
    Timeout,
    /// Filesystem error (permission, disk full, corrupted rename).
    Io,
    /// Propagated from cancellation.
    Cancelled,
    /// Unmapped; treated as retryable once.
    Unknown,
}

impl ErrorKind {
    /// Whether this kind is never worth retrying, per the classification table in
    /// the queue's retry policy.
    pub fn is_permanent(self) -> bool {
        matches!(self, ErrorKind::InputInvalid | ErrorKind::Unsupported)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InputInvalid => "input_invalid",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Io => "io",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A classified error carrying a kind, a permanence flag, and a human-readable cause.
///
/// `permanent` is tracked separately from `kind` because the same kind can arise from
/// both permanent and transient causes in principle; in practice the Worker always
/// derives it from [`ErrorKind::is_permanent`] unless a driver overrides it explicitly
/// (e.g. a `network` error after the retry budget for a particular host is exhausted).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: ErrorKind,
    pub permanent: bool,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let permanent = kind.is_permanent();
        Self {
            kind,
            permanent,
            message: message.into(),
        }
    }

    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputInvalid, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        let mut e = Self::new(ErrorKind::Unknown, message);
        e.permanent = false;
        e
    }

    /// Wrap this error with additional operation/path context, preserving the kind.
    pub fn context(self, context: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            permanent: self.permanent,
            message: format!("{context}: {}", self.message),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
