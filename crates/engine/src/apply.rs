// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 3: apply planned actions under bounded concurrency (§4.3 stage 3).

use std::sync::Arc;
use strmsync_core::{ErrorKind, MetadataMode, Progress, SyncOp, TaskError};
use strmsync_drivers::{Driver, StrmWriter};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::classify::{Lane, PlannedItem};
use crate::sync_context::SyncContext;

/// Apply every planned item. Each item runs in its own cooperating task bound
/// by a semaphore sized to `ctx.concurrency`; one item's failure never aborts
/// the others (§4.3 stage 3, §5 coroutine-like control flow).
pub async fn apply_plans(
    ctx: &SyncContext,
    driver: Arc<dyn Driver>,
    writer: Arc<dyn StrmWriter>,
    items: Vec<PlannedItem>,
    progress: Arc<parking_lot::Mutex<Progress>>,
    cancel: &CancellationToken,
) {
    let limiter = Arc::new(Semaphore::new(ctx.concurrency.max(1)));
    let mut set: JoinSet<()> = JoinSet::new();
    let progress_callback = ctx.progress_callback.clone();

    for planned in items {
        let driver = driver.clone();
        let writer = writer.clone();
        let limiter = limiter.clone();
        let cancel = cancel.clone();
        let dry_run = ctx.dry_run;
        let metadata_mode = ctx.metadata_mode;
        let relative_target = ctx.relative_target_path(&planned.item.target_path);
        let progress = progress.clone();
        let progress_callback = progress_callback.clone();

        set.spawn(async move {
            let permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let _permit = permit;
            if cancel.is_cancelled() {
                return;
            }
            let outcome = apply_one(
                &planned,
                driver.as_ref(),
                writer.as_ref(),
                &relative_target,
                metadata_mode,
                dry_run,
                &cancel,
            )
            .await;
            let snapshot = record(&progress, planned.lane, planned.item.op, outcome);
            if let Some(cb) = progress_callback {
                cb(snapshot);
            }
        });
    }

    while set.join_next().await.is_some() {}
}

/// Outcome of applying one plan item, recorded into the shared [`Progress`].
enum ApplyOutcome {
    Applied,
    Failed(TaskError),
}

async fn apply_one(
    planned: &PlannedItem,
    driver: &dyn Driver,
    writer: &dyn StrmWriter,
    relative_target: &str,
    metadata_mode: MetadataMode,
    dry_run: bool,
    cancel: &CancellationToken,
) -> ApplyOutcome {
    let item = &planned.item;
    let result = match (planned.lane, item.op) {
        (_, SyncOp::Skip) => Ok(()),
        (Lane::Strm, SyncOp::Create) | (Lane::Strm, SyncOp::Update) => {
            apply_strm_write(writer, relative_target, item, dry_run).await
        }
        (Lane::Strm, SyncOp::Delete) => {
            if dry_run {
                Ok(())
            } else {
                writer.delete(relative_target).await
            }
        }
        (Lane::Metadata, SyncOp::Create) | (Lane::Metadata, SyncOp::Update) => {
            if dry_run {
                Ok(())
            } else {
                apply_metadata_copy(driver, item, metadata_mode, cancel).await
            }
        }
        (Lane::Metadata, SyncOp::Delete) => {
            if dry_run {
                Ok(())
            } else {
                writer.delete(relative_target).await
            }
        }
    };

    match result {
        Ok(()) => ApplyOutcome::Applied,
        Err(e) => {
            warn!(path = %item.target_path, error = %e, "apply failed");
            ApplyOutcome::Failed(e)
        }
    }
}

async fn apply_strm_write(
    writer: &dyn StrmWriter,
    relative_target: &str,
    item: &strmsync_core::SyncPlanItem,
    dry_run: bool,
) -> Result<(), TaskError> {
    if dry_run {
        return Ok(());
    }
    let strm = item
        .strm
        .as_ref()
        .ok_or_else(|| TaskError::input_invalid("strm lane item missing StrmInfo"))?;
    writer.write(relative_target, &strm.raw, item.mod_time).await
}

async fn apply_metadata_copy(
    driver: &dyn Driver,
    item: &strmsync_core::SyncPlanItem,
    metadata_mode: MetadataMode,
    cancel: &CancellationToken,
) -> Result<(), TaskError> {
    let result = match metadata_mode {
        MetadataMode::None => {
            return Err(TaskError::input_invalid("metadata lane item with mode=none"))
        }
        MetadataMode::Copy => {
            match driver
                .copy(&item.source_path, &item.target_path, cancel)
                .await
            {
                Ok(()) => Ok(()),
                Err(e) if e.kind == ErrorKind::Io => {
                    driver
                        .download(&item.source_path, &item.target_path, cancel)
                        .await
                }
                Err(e) => Err(e),
            }
        }
        MetadataMode::Download => {
            driver
                .download(&item.source_path, &item.target_path, cancel)
                .await
        }
    };
    result?;
    align_mtime(&item.target_path, item.mod_time).await
}

/// Set the copied/downloaded metadata file's mtime to the source's reported
/// `mod_time`, matching the alignment the Writer performs for `.strm` writes.
async fn align_mtime(target_path: &str, mod_time_ms: i64) -> Result<(), TaskError> {
    if mod_time_ms == 0 {
        return Ok(());
    }
    let path = target_path.to_string();
    tokio::task::spawn_blocking(move || {
        let ft = filetime::FileTime::from_unix_time(
            mod_time_ms / 1_000,
            ((mod_time_ms % 1_000).unsigned_abs() as u32) * 1_000_000,
        );
        filetime::set_file_mtime(&path, ft)
    })
    .await
    .map_err(|e| TaskError::io(e.to_string()))?
    .map_err(|e| TaskError::io(e.to_string()))
}

fn record(
    progress: &parking_lot::Mutex<Progress>,
    lane: Lane,
    op: SyncOp,
    outcome: ApplyOutcome,
) -> Progress {
    let mut p = progress.lock();
    p.processed += 1;
    match lane {
        Lane::Strm => match (op, &outcome) {
            (SyncOp::Create, ApplyOutcome::Applied) => p.created += 1,
            (SyncOp::Update, ApplyOutcome::Applied) => p.updated += 1,
            (SyncOp::Skip, ApplyOutcome::Applied) => p.skipped += 1,
            (SyncOp::Delete, ApplyOutcome::Applied) => p.deleted += 1,
            (_, ApplyOutcome::Failed(_)) => p.failed += 1,
        },
        Lane::Metadata => {
            p.meta_processed += 1;
            match (op, &outcome) {
                (SyncOp::Create, ApplyOutcome::Applied) => p.meta_created += 1,
                (SyncOp::Update, ApplyOutcome::Applied) => p.meta_updated += 1,
                (SyncOp::Skip, ApplyOutcome::Applied) => {}
                (SyncOp::Delete, ApplyOutcome::Applied) => p.deleted += 1,
                (_, ApplyOutcome::Failed(_)) => p.meta_failed += 1,
            }
        }
    }
    p.clamp_processed();
    *p
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod tests;
