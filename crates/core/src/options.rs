// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses a Job's opaque `options` JSON blob into the typed knobs the Sync Engine reads.
//! Unknown keys are ignored; recognized keys are listed in full below.

use crate::error::TaskError;
use crate::strm::StrmMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Hard ceiling on recursive scan depth, regardless of what a job requests.
pub const MAX_SCAN_DEPTH: u32 = 25;

/// Hard ceiling on the Sync Engine's plan-apply concurrency, regardless of
/// what a job requests (§4.6 step 3: "concurrency clamped to 1..=MaxScanConcurrency").
pub const MAX_SCAN_CONCURRENCY: usize = 64;

/// Whether, and how, to carry non-video metadata (`.nfo`, subtitles, images) alongside
/// the `.strm` tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataMode {
    /// Metadata lane is disabled entirely.
    None,
    /// Metadata files are copied via `Driver::copy` (source must be locally reachable).
    Copy,
    /// Metadata files are downloaded via `Driver::download`.
    Download,
}

impl Default for MetadataMode {
    fn default() -> Self {
        MetadataMode::None
    }
}

/// Controls for the orphan-sweep stage (§4.3, stage 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupOptions {
    pub enabled: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_max_depth() -> u32 {
    MAX_SCAN_DEPTH
}

fn default_true() -> bool {
    true
}

/// Typed view over a Job's `options` JSON blob. Every field has a default so a job created
/// before a key existed still parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    pub strm_mode: StrmMode,
    pub metadata_mode: MetadataMode,
    pub extensions: HashSet<String>,
    pub meta_extensions: HashSet<String>,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    pub exclude_dirs: Vec<String>,
    pub min_file_size: u64,
    /// Ordered list of literal `{from -> to}` substitutions applied to `StrmInfo::raw`
    /// after it is built and before it is compared or written.
    pub strm_replace_rules: Vec<(String, String)>,
    pub cleanup_opts: CleanupOptions,
    pub force_update: bool,
    pub skip_existing: bool,
    /// Tolerance, in milliseconds, for mtime drift when deciding whether metadata needs
    /// re-copying; a difference within this window is not treated as a content change.
    pub mod_time_epsilon: i64,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            strm_mode: StrmMode::Url,
            metadata_mode: MetadataMode::None,
            extensions: HashSet::new(),
            meta_extensions: HashSet::new(),
            recursive: true,
            max_depth: default_max_depth(),
            exclude_dirs: Vec::new(),
            min_file_size: 0,
            strm_replace_rules: Vec::new(),
            cleanup_opts: CleanupOptions::default(),
            force_update: false,
            skip_existing: false,
            mod_time_epsilon: 2_000,
        }
    }
}

impl JobOptions {
    /// Parse a Job's options blob, clamping `max_depth` to [`MAX_SCAN_DEPTH`] and
    /// `concurrency` to `1..=`[`MAX_SCAN_CONCURRENCY`] regardless of what the blob requests.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, TaskError> {
        let mut opts: JobOptions = serde_json::from_value(value.clone())
            .map_err(|e| TaskError::input_invalid(format!("invalid job options: {e}")))?;
        if opts.max_depth > MAX_SCAN_DEPTH {
            opts.max_depth = MAX_SCAN_DEPTH;
        }
        opts.concurrency = opts.concurrency.clamp(1, MAX_SCAN_CONCURRENCY);
        Ok(opts)
    }

    pub fn apply_replace_rules(&self, raw: &str) -> String {
        let mut out = raw.to_string();
        for (from, to) in &self.strm_replace_rules {
            out = out.replace(from, to);
        }
        out
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
