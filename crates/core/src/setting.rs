// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide key/value tunables, loaded at startup and mutated by the operator.
//! Changes apply to newly-created task runs only — never retroactively to in-flight ones.

use serde::{Deserialize, Serialize};

/// Well-known setting keys the daemon reads. Arbitrary keys are also accepted and passed
/// through unvalidated; these constants exist only to avoid typos at call sites.
pub mod keys {
    pub const SCAN_CONCURRENCY_DEFAULT: &str = "scan_concurrency_default";
    pub const MAX_CONCURRENT_JOBS: &str = "max_concurrent_jobs";
    pub const LOG_LEVEL: &str = "log_level";
}

/// A single key/value setting row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at_ms: i64,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<String>, updated_at_ms: i64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            updated_at_ms,
        }
    }

    /// Parse the value as the given integer type, returning `None` on absence or malformed input.
    pub fn as_i64(&self) -> Option<i64> {
        self.value.parse().ok()
    }
}

#[cfg(test)]
#[path = "setting_tests.rs"]
mod tests;
