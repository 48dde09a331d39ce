// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inputs to one [`crate::run_once`] call.

use glob::Pattern;
use std::collections::HashSet;
use std::sync::Arc;
use strmsync_core::{JobId, MetadataMode, Progress, StrmMode, TaskRunId};
use strmsync_drivers::DriverEvent;

/// Callback invoked as progress counters change during a run. The engine does
/// not coalesce invocations itself — the Worker Pool owns that policy (at most
/// every 500 ms and on every 1% change) by wrapping this closure.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Everything the engine needs to run one sync, built by the Worker from a
/// `Job`'s options and the Driver/Writer it constructed for that job's
/// `DataServer`.
#[derive(Clone)]
pub struct SyncContext {
    pub job_id: JobId,
    pub task_run_id: TaskRunId,
    pub source_root: String,
    pub target_root: String,
    pub extensions: HashSet<String>,
    pub meta_extensions: HashSet<String>,
    pub recursive: bool,
    /// Clamped to [`strmsync_core::MAX_SCAN_DEPTH`] by [`strmsync_core::JobOptions::from_value`]
    /// before this context is built.
    pub max_depth: u32,
    pub concurrency: usize,
    pub dry_run: bool,
    pub force_update: bool,
    pub skip_existing: bool,
    pub mod_time_epsilon: i64,
    pub progress_callback: Option<ProgressCallback>,
    pub strm_mode: StrmMode,
    pub metadata_mode: MetadataMode,
    pub exclude_dirs: Vec<Pattern>,
    pub min_file_size: u64,
    pub strm_replace_rules: Vec<(String, String)>,
    /// Gates the orphan-sweep stage (stage 4); sourced from a Job's
    /// `cleanup_opts.enabled`. Irrelevant in event-driven mode, which always
    /// skips the sweep regardless of this flag.
    pub cleanup_enabled: bool,
    /// When `Some`, bypasses the scan stage entirely and runs the event-driven
    /// incremental path (§4.3.1) over this ordered list instead.
    pub events: Option<Vec<DriverEvent>>,
}

impl SyncContext {
    /// Build a context from a parsed [`strmsync_core::JobOptions`] plus the
    /// run-specific identifiers and paths the Worker already knows.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        task_run_id: TaskRunId,
        source_root: impl Into<String>,
        target_root: impl Into<String>,
        options: &strmsync_core::JobOptions,
    ) -> Self {
        let exclude_dirs = options
            .exclude_dirs
            .iter()
            .filter_map(|pattern| Pattern::new(pattern).ok())
            .collect();
        Self {
            job_id,
            task_run_id,
            source_root: source_root.into(),
            target_root: target_root.into(),
            extensions: options.extensions.clone(),
            meta_extensions: options.meta_extensions.clone(),
            recursive: options.recursive,
            max_depth: options.max_depth,
            concurrency: options.concurrency,
            dry_run: false,
            force_update: options.force_update,
            skip_existing: options.skip_existing,
            mod_time_epsilon: options.mod_time_epsilon,
            progress_callback: None,
            strm_mode: options.strm_mode,
            metadata_mode: options.metadata_mode,
            exclude_dirs,
            min_file_size: options.min_file_size,
            strm_replace_rules: options.strm_replace_rules.clone(),
            cleanup_enabled: options.cleanup_opts.enabled,
            events: None,
        }
    }

    pub fn is_event_driven(&self) -> bool {
        self.events.is_some()
    }

    /// Strip the `target_root` prefix a plan item's `target_path` carries, back
    /// down to the root-relative path the Writer addresses files by.
    pub fn relative_target_path(&self, full_target_path: &str) -> String {
        full_target_path
            .strip_prefix(self.target_root.trim_end_matches('/'))
            .unwrap_or(full_target_path)
            .trim_start_matches('/')
            .to_string()
    }

    /// Apply the ordered `strm_replace_rules` literal substitutions to a freshly
    /// built `StrmInfo::raw`, before it is compared or written (§9 Open questions).
    pub fn apply_replace_rules(&self, raw: &str) -> String {
        let mut out = raw.to_string();
        for (from, to) in &self.strm_replace_rules {
            out = out.replace(from, to);
        }
        out
    }

    /// Whether `name` (a single path segment) matches any configured
    /// exclude-dir glob, making every entry under it filtered.
    pub fn is_excluded_segment(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|p| p.matches(name))
    }
}

#[cfg(test)]
#[path = "sync_context_tests.rs"]
mod tests;
