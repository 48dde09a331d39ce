// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `.strm` file payload: the bytes a Driver composes plus the structured fields used
//! to decide, without rewriting unchanged files, whether a stored copy is still current.

use serde::{Deserialize, Serialize};

/// Which policy a Job uses to compose `.strm` file bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrmMode {
    /// `raw` is an absolute filesystem path derived from the remote path and a mount prefix.
    LocalPath,
    /// `raw` is a URL: `scheme://host:port/prefix/<path>[?sign=...&pickcode=...]`.
    Url,
}

/// Composed `.strm` content plus the structured fields used for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrmInfo {
    /// Exact bytes that will be written to the `.strm` file.
    pub raw: String,
    /// `scheme://host[:port]`, meaningful only in [`StrmMode::Url`].
    pub base_url: String,
    /// Cleaned URL or filesystem path component after the base.
    pub path: String,
    /// Backend-specific file identity, present only if the driver declares the `pick_code`
    /// capability.
    pub pick_code: Option<String>,
    /// Signed-URL token, present only if the driver declares the `sign_url` capability.
    pub sign: Option<String>,
    /// Epoch milliseconds the signature expires; 0 means "does not expire".
    pub expires_at: i64,
}

/// Result of comparing a freshly-built [`StrmInfo`] against the bytes already on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOutcome {
    pub equal: bool,
    pub need_update: bool,
    /// Short diagnostic string naming which rule decided the outcome.
    pub reason: String,
}

impl CompareOutcome {
    fn equal() -> Self {
        Self {
            equal: true,
            need_update: false,
            reason: "equal".to_string(),
        }
    }

    fn stale(reason: impl Into<String>) -> Self {
        Self {
            equal: false,
            need_update: true,
            reason: reason.into(),
        }
    }
}

/// Capabilities a Driver declares; callers branch on these instead of the type tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCapabilities {
    pub watch: bool,
    pub strm_http: bool,
    pub strm_mount: bool,
    pub pick_code: bool,
    pub sign_url: bool,
}

/// Decide whether a stored `.strm` body still represents `expected`, evaluating the rules
/// from the engine's compare contract in order and stopping at the first mismatch.
pub fn compare_strm(
    expected: &StrmInfo,
    actual_raw: &str,
    now_ms: i64,
    caps: DriverCapabilities,
) -> CompareOutcome {
    let trimmed = actual_raw.trim();
    if trimmed.is_empty() {
        return CompareOutcome::stale("empty");
    }

    let (actual_base, actual_path) = match split_base_and_path(trimmed) {
        Some(parts) => parts,
        None => return CompareOutcome::stale("unparseable"),
    };

    if !same_base(&expected.base_url, actual_base) {
        return CompareOutcome::stale("base_mismatch");
    }

    let expected_path = clean_path(&expected.path);
    let actual_path = clean_path(actual_path);
    if expected_path != actual_path {
        return CompareOutcome::stale("path_mismatch");
    }

    if caps.pick_code {
        let actual_pick_code = extract_query_param(trimmed, "pickcode");
        if expected.pick_code.is_none() || expected.pick_code.as_deref() != actual_pick_code.as_deref()
        {
            return CompareOutcome::stale("pick_code_mismatch");
        }
    }

    if caps.sign_url {
        let actual_sign = extract_query_param(trimmed, "sign");
        if expected.sign.is_none() {
            return CompareOutcome::stale("sign_missing");
        }
        if expected.expires_at != 0 && expected.expires_at < now_ms {
            return CompareOutcome::stale("sign_expired");
        }
        if expected.sign.as_deref() != actual_sign.as_deref() {
            return CompareOutcome::stale("sign_mismatch");
        }
    }

    CompareOutcome::equal()
}

fn split_base_and_path(raw: &str) -> Option<(&str, &str)> {
    if let Some(rest) = raw.strip_prefix("http://").or_else(|| raw.strip_prefix("https://")) {
        let scheme_len = raw.len() - rest.len();
        let base_end = rest.find('/').map(|i| i + scheme_len).unwrap_or(raw.len());
        Some((&raw[..base_end], &raw[base_end..]))
    } else if raw.starts_with('/') {
        Some(("", raw))
    } else {
        None
    }
}

fn same_base(expected: &str, actual: &str) -> bool {
    expected.trim_end_matches('/') == actual.trim_end_matches('/')
}

fn clean_path(path: &str) -> String {
    let no_query = path.split('?').next().unwrap_or(path);
    let mut cleaned = String::from("/");
    for segment in no_query.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            continue;
        }
        if cleaned != "/" {
            cleaned.push('/');
        }
        cleaned.push_str(segment);
    }
    cleaned
}

fn extract_query_param<'a>(raw: &'a str, key: &str) -> Option<String> {
    let query = raw.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key {
            Some(v.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
#[path = "strm_tests.rs"]
mod tests;
