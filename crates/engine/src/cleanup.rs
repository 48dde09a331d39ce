// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 4: orphan sweep (§4.3 stage 4). Only run when the scan completed
//! without cancellation and the context is not event-driven.

use std::collections::HashSet;
use strmsync_core::{MetadataMode, SyncOp, SyncPlanItem};
use strmsync_drivers::StrmWriter;

use crate::classify::{Lane, PlannedItem};
use crate::sync_context::SyncContext;

/// Every `.strm` file under `target_root` whose relative path is absent from
/// `strm_index` becomes a delete plan item; the same applies to metadata
/// sidecars against `meta_index` when `metadata_mode != none`. The sweep never
/// touches non-`.strm` files otherwise (§4.3 stage 4).
pub async fn sweep_orphans(
    ctx: &SyncContext,
    writer: &dyn StrmWriter,
    strm_index: &HashSet<String>,
) -> Result<Vec<PlannedItem>, strmsync_core::TaskError> {
    let mut out = Vec::new();

    for relative in writer.walk_strm_files().await? {
        if !strm_index.contains(&relative) {
            out.push(delete_item(ctx, Lane::Strm, &relative));
        }
    }

    if ctx.metadata_mode != MetadataMode::None && !ctx.meta_extensions.is_empty() {
        let found = writer
            .walk_files_with_extensions(&ctx.meta_extensions)
            .await?;
        // Metadata orphans are determined against the same STRM-lane remote
        // index keyed by the sibling stem, since a metadata sidecar's source
        // counterpart lives at the same relative directory as its media file.
        for relative in found {
            if !meta_has_counterpart(&relative, strm_index) {
                out.push(delete_item(ctx, Lane::Metadata, &relative));
            }
        }
    }

    Ok(out)
}

/// A metadata sidecar `a/movie.nfo` has a counterpart iff the scan produced a
/// `.strm` at the same stem, `a/movie.strm`.
fn meta_has_counterpart(meta_relative: &str, strm_index: &HashSet<String>) -> bool {
    let stem = match meta_relative.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => meta_relative,
    };
    strm_index.contains(&format!("{stem}.strm"))
}

fn delete_item(ctx: &SyncContext, lane: Lane, relative: &str) -> PlannedItem {
    PlannedItem {
        lane,
        item: SyncPlanItem {
            op: SyncOp::Delete,
            source_path: String::new(),
            target_path: format!("{}/{}", ctx.target_root.trim_end_matches('/'), relative),
            strm: None,
            size: 0,
            mod_time: 0,
        },
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
