// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrates one sync run end to end: scan, classify & plan, apply, sweep.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use strmsync_core::{Clock, DataServerId, Progress, RemoteEntry, TaskError};
use strmsync_drivers::{Driver, DriverEvent, DriverEventKind, StrmWriter};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use crate::apply::apply_plans;
use crate::classify::{classify_entry, ClassifyOutcome, Lane, PlannedItem};
use crate::cleanup::sweep_orphans;
use crate::scan::scan;
use crate::summary::Summary;
use crate::sync_context::SyncContext;

/// Run one sync to completion. Returns the accumulated [`Summary`] on success
/// or on graceful cancellation (`Summary::cancelled = true`); returns `Err`
/// only for a fatal setup failure (scan root missing, driver build failed)
/// that aborts the run before any plan could be applied (§7).
pub async fn run_once(
    cancel: CancellationToken,
    ctx: SyncContext,
    driver: Arc<dyn Driver>,
    writer: Arc<dyn StrmWriter>,
    data_server_id: DataServerId,
    clock: Arc<dyn Clock>,
) -> Result<Summary, TaskError> {
    let span = info_span!("sync_run", job_id = %ctx.job_id, task_run_id = %ctx.task_run_id);
    run_once_inner(cancel, ctx, driver, writer, data_server_id, clock)
        .instrument(span)
        .await
}

async fn run_once_inner(
    cancel: CancellationToken,
    ctx: SyncContext,
    driver: Arc<dyn Driver>,
    writer: Arc<dyn StrmWriter>,
    data_server_id: DataServerId,
    clock: Arc<dyn Clock>,
) -> Result<Summary, TaskError> {
    let started_at_ms = clock.now_ms();
    let progress = Arc::new(Mutex::new(Progress::default()));
    let now_ms = started_at_ms;

    let plan = if ctx.is_event_driven() {
        plan_event_driven(&ctx, driver.as_ref(), writer.as_ref(), &data_server_id, now_ms, &cancel, &progress).await?
    } else {
        plan_full_scan(&ctx, driver.clone(), writer.as_ref(), &data_server_id, now_ms, &cancel, &progress).await?
    };

    let cancelled_before_apply = cancel.is_cancelled();
    if !cancelled_before_apply {
        apply_plans(
            &ctx,
            driver.clone(),
            writer.clone(),
            plan.items,
            progress.clone(),
            &cancel,
        )
        .await;
    }

    let cancelled = cancelled_before_apply || cancel.is_cancelled();

    if !ctx.is_event_driven() && !cancelled && ctx.cleanup_enabled {
        let orphans = sweep_orphans(&ctx, writer.as_ref(), &plan.strm_index).await?;
        if !orphans.is_empty() {
            apply_plans(&ctx, driver, writer, orphans, progress.clone(), &cancel).await;
        }
    }

    let ended_at_ms = clock.now_ms();
    info!(
        elapsed_ms = ended_at_ms - started_at_ms,
        cancelled, "sync run finished"
    );

    Ok(Summary {
        progress: *progress.lock(),
        started_at_ms,
        ended_at_ms,
        cancelled,
    })
}

/// Per-run planning output: the items ready for `apply_plans`, plus the index
/// of STRM-lane target-relative paths the orphan sweep compares against.
struct PlanOutput {
    items: Vec<PlannedItem>,
    strm_index: HashSet<String>,
}

async fn plan_full_scan(
    ctx: &SyncContext,
    driver: Arc<dyn Driver>,
    writer: &dyn StrmWriter,
    data_server_id: &DataServerId,
    now_ms: i64,
    cancel: &CancellationToken,
    progress: &Mutex<Progress>,
) -> Result<PlanOutput, TaskError> {
    let scan_result = scan(
        driver.clone(),
        &ctx.source_root,
        ctx.recursive,
        ctx.max_depth,
        ctx.concurrency,
        cancel,
    )
    .await?;

    let files: Vec<RemoteEntry> = scan_result
        .entries
        .into_iter()
        .filter(|e| !e.is_dir)
        .collect();

    let mut output = PlanOutput {
        items: Vec::with_capacity(files.len()),
        strm_index: HashSet::new(),
    };

    for entry in &files {
        if cancel.is_cancelled() {
            break;
        }
        classify_one(
            ctx,
            entry,
            driver.as_ref(),
            writer,
            data_server_id,
            now_ms,
            progress,
            &mut output,
        )
        .await;
    }

    Ok(output)
}

/// Classify one scanned entry and fold it into `output` (and the shared
/// `progress` counters), mirroring what [`crate::apply`] does for the apply
/// stage but for the classify/plan stage's `total`/`meta_total`/`filtered`.
#[allow(clippy::too_many_arguments)]
async fn classify_one(
    ctx: &SyncContext,
    entry: &RemoteEntry,
    driver: &dyn Driver,
    writer: &dyn StrmWriter,
    data_server_id: &DataServerId,
    now_ms: i64,
    progress: &Mutex<Progress>,
    output: &mut PlanOutput,
) {
    let outcome = classify_entry(ctx, entry, driver, writer, data_server_id, now_ms).await;
    match outcome {
        ClassifyOutcome::Filtered(_) => {
            progress.lock().filtered += 1;
        }
        ClassifyOutcome::Planned(planned) => {
            match planned.lane {
                Lane::Strm => {
                    progress.lock().total += 1;
                    output
                        .strm_index
                        .insert(ctx.relative_target_path(&planned.item.target_path));
                }
                Lane::Metadata => {
                    progress.lock().meta_total += 1;
                }
            }
            output.items.push(planned);
        }
    }
}

/// The event-driven incremental path (§4.3.1): no scan, no orphan sweep.
/// `delete` events resolve a target path directly; `create`/`update` events
/// fetch one `RemoteEntry` via `Driver::stat` and run the same classify/plan
/// logic as the full scan for that single entry.
#[allow(clippy::too_many_arguments)]
async fn plan_event_driven(
    ctx: &SyncContext,
    driver: &dyn Driver,
    writer: &dyn StrmWriter,
    data_server_id: &DataServerId,
    now_ms: i64,
    cancel: &CancellationToken,
    progress: &Mutex<Progress>,
) -> Result<PlanOutput, TaskError> {
    let events: Vec<DriverEvent> = ctx.events.clone().unwrap_or_default();

    let mut output = PlanOutput {
        items: Vec::with_capacity(events.len()),
        strm_index: HashSet::new(),
    };

    for event in events {
        if cancel.is_cancelled() {
            break;
        }
        match event.kind {
            DriverEventKind::Delete => {
                let relative = event.path.trim_start_matches('/');
                let target_path = strm_delete_target(ctx, relative);
                output.items.push(PlannedItem {
                    lane: Lane::Strm,
                    item: strmsync_core::SyncPlanItem {
                        op: strmsync_core::SyncOp::Delete,
                        source_path: event.path.clone(),
                        target_path,
                        strm: None,
                        size: 0,
                        mod_time: 0,
                    },
                });
            }
            DriverEventKind::Create | DriverEventKind::Update => {
                let entry = match driver.stat(&event.path, cancel).await {
                    Ok(entry) => entry,
                    Err(e) if e.kind == strmsync_core::ErrorKind::InputInvalid => continue,
                    Err(e) => return Err(e),
                };
                classify_one(
                    ctx,
                    &entry,
                    driver,
                    writer,
                    data_server_id,
                    now_ms,
                    progress,
                    &mut output,
                )
                .await;
            }
        }
    }

    Ok(output)
}

fn strm_delete_target(ctx: &SyncContext, relative: &str) -> String {
    let without_ext = match relative.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => relative,
    };
    format!(
        "{}/{}.strm",
        ctx.target_root.trim_end_matches('/'),
        without_ext.trim_start_matches('/')
    )
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
