// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 1: breadth-first enumeration of the source tree (§4.3 stage 1).

use std::collections::VecDeque;
use std::sync::Arc;
use strmsync_core::{RemoteEntry, TaskError};
use strmsync_drivers::{Driver, ListOptions};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Result of walking the source tree: every non-directory entry discovered,
/// in unspecified order, with no duplicates.
pub struct ScanResult {
    pub entries: Vec<RemoteEntry>,
}

/// Breadth-first scan from `source_root`, capped at `max_depth`. Each BFS
/// level is fanned out onto `concurrency` cooperating tasks bound by a shared
/// semaphore (the "rate limiter" the contract describes) before the next
/// level's directories are enqueued.
pub async fn scan(
    driver: Arc<dyn Driver>,
    source_root: &str,
    recursive: bool,
    max_depth: u32,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<ScanResult, TaskError> {
    let limiter = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    queue.push_back((source_root.to_string(), 0));

    let mut entries = Vec::new();

    while !queue.is_empty() {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }

        let level: Vec<(String, u32)> = queue.drain(..).collect();
        let mut set: JoinSet<(String, u32, Result<Vec<RemoteEntry>, TaskError>)> = JoinSet::new();

        for (path, depth) in level {
            let driver = driver.clone();
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            set.spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            path,
                            depth,
                            Err(TaskError::unknown("scan rate limiter closed")),
                        )
                    }
                };
                let opts = ListOptions {
                    recursive: false,
                    max_depth: 0,
                };
                let result = driver.list(&path, opts, &cancel).await;
                (path, depth, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (path, depth, result) = joined.map_err(|e| TaskError::unknown(e.to_string()))?;
            let children = result.map_err(|e| e.context(format!("list {path}")))?;
            for child in children {
                if child.is_dir {
                    if !recursive {
                        continue;
                    }
                    let next_depth = depth + 1;
                    if next_depth > max_depth {
                        warn!(
                            path = %child.path,
                            depth = next_depth,
                            "scan depth cap exceeded, dropping subtree"
                        );
                        continue;
                    }
                    queue.push_back((child.path.clone(), next_depth));
                }
                entries.push(child);
            }
        }
    }

    Ok(ScanResult { entries })
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
