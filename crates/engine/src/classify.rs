// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 2: per-entry classification and planning (§4.3 stage 2, §4.3.2).

use strmsync_core::{DataServerId, MetadataMode, RemoteEntry, StrmInfo, SyncOp, SyncPlanItem};
use strmsync_drivers::{BuildStrmRequest, Driver, StrmWriter};

use crate::sync_context::SyncContext;

/// Which half of the classification split (§3 Glossary: "sync lane") a plan
/// item belongs to. Tracked only inside this crate — never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Strm,
    Metadata,
}

/// A [`SyncPlanItem`] tagged with the lane that produced it, so the apply
/// stage can attribute counters to the right half of [`strmsync_core::Progress`].
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub lane: Lane,
    pub item: SyncPlanItem,
}

/// Why an entry never became a plan item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    ExcludedDir,
    UnroutedExtension,
    TooSmall,
}

pub enum ClassifyOutcome {
    Filtered(FilterReason),
    Planned(PlannedItem),
}

/// Classify and plan one non-directory [`RemoteEntry`] against `ctx`.
#[allow(clippy::too_many_arguments)]
pub async fn classify_entry(
    ctx: &SyncContext,
    entry: &RemoteEntry,
    driver: &dyn Driver,
    writer: &dyn StrmWriter,
    data_server_id: &DataServerId,
    now_ms: i64,
) -> ClassifyOutcome {
    if path_excludes(ctx, &entry.path) {
        return ClassifyOutcome::Filtered(FilterReason::ExcludedDir);
    }

    let extension = entry.extension().unwrap_or_default().to_ascii_lowercase();
    let lane = if ctx.extensions.contains(&extension) {
        Lane::Strm
    } else if ctx.meta_extensions.contains(&extension) {
        Lane::Metadata
    } else {
        return ClassifyOutcome::Filtered(FilterReason::UnroutedExtension);
    };

    if entry.size < ctx.min_file_size {
        return ClassifyOutcome::Filtered(FilterReason::TooSmall);
    }

    let relative = relative_path(&ctx.source_root, &entry.path);

    match lane {
        Lane::Strm => {
            plan_strm_entry(ctx, entry, &relative, driver, writer, data_server_id, now_ms).await
        }
        Lane::Metadata => plan_metadata_entry(ctx, entry, &relative).await,
    }
}

async fn plan_strm_entry(
    ctx: &SyncContext,
    entry: &RemoteEntry,
    relative: &str,
    driver: &dyn Driver,
    writer: &dyn StrmWriter,
    data_server_id: &DataServerId,
    now_ms: i64,
) -> ClassifyOutcome {
    let target_path = strm_target_path(&ctx.target_root, relative);

    let mut strm_info = driver.build_strm_info(BuildStrmRequest {
        data_server_id: data_server_id.clone(),
        remote_path: entry.path.clone(),
        remote_meta: entry.clone(),
    });
    strm_info.raw = ctx.apply_replace_rules(&strm_info.raw);

    let existing = writer.read(&ctx.relative_target_path(&target_path)).await;
    let op = match existing {
        Ok(existing_content) => {
            decide_strm_op(ctx, driver, &strm_info, &existing_content, now_ms)
        }
        Err(_) => SyncOp::Create,
    };

    ClassifyOutcome::Planned(PlannedItem {
        lane: Lane::Strm,
        item: SyncPlanItem {
            op,
            source_path: entry.path.clone(),
            target_path,
            strm: Some(strm_info),
            size: entry.size,
            mod_time: entry.mod_time,
        },
    })
}

fn decide_strm_op(
    ctx: &SyncContext,
    driver: &dyn Driver,
    expected: &StrmInfo,
    existing_content: &str,
    now_ms: i64,
) -> SyncOp {
    let exists = !existing_content.is_empty();
    if ctx.skip_existing && exists {
        return SyncOp::Skip;
    }
    if !exists {
        return SyncOp::Create;
    }
    if ctx.force_update {
        return SyncOp::Update;
    }
    let outcome = driver.compare_strm(expected, existing_content, now_ms);
    if outcome.need_update {
        SyncOp::Update
    } else {
        SyncOp::Skip
    }
}

/// The metadata decision rule (§4.3.2). Metadata sidecars are plain files, not
/// `.strm` bodies, so their existing state is read straight off disk rather
/// than through the (strm-scoped) Writer.
async fn plan_metadata_entry(ctx: &SyncContext, entry: &RemoteEntry, relative: &str) -> ClassifyOutcome {
    if ctx.metadata_mode == MetadataMode::None {
        return ClassifyOutcome::Filtered(FilterReason::UnroutedExtension);
    }
    let target_path = format!(
        "{}/{}",
        ctx.target_root.trim_end_matches('/'),
        relative.trim_start_matches('/')
    );

    let op = match tokio::fs::metadata(&target_path).await {
        Err(_) => SyncOp::Create,
        Ok(_) if ctx.force_update => SyncOp::Update,
        Ok(existing) => {
            let size_matches = existing.len() == entry.size;
            let mtime_matches = existing
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| (d.as_millis() as i64 - entry.mod_time).abs() <= ctx.mod_time_epsilon)
                .unwrap_or(false);
            if size_matches && mtime_matches {
                SyncOp::Skip
            } else {
                SyncOp::Update
            }
        }
    };

    ClassifyOutcome::Planned(PlannedItem {
        lane: Lane::Metadata,
        item: SyncPlanItem {
            op,
            source_path: entry.path.clone(),
            target_path,
            strm: None,
            size: entry.size,
            mod_time: entry.mod_time,
        },
    })
}

/// `true` if any path segment (directory component) of `path` matches a
/// configured exclude-dir glob.
fn path_excludes(ctx: &SyncContext, path: &str) -> bool {
    path.split('/')
        .filter(|s| !s.is_empty())
        .any(|segment| ctx.is_excluded_segment(segment))
}

fn relative_path(source_root: &str, path: &str) -> String {
    let root = source_root.trim_end_matches('/');
    path.strip_prefix(root)
        .unwrap_or(path)
        .trim_start_matches('/')
        .to_string()
}

fn strm_target_path(target_root: &str, relative: &str) -> String {
    let without_ext = match relative.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => relative,
    };
    format!(
        "{}/{}.strm",
        target_root.trim_end_matches('/'),
        without_ext.trim_start_matches('/')
    )
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
