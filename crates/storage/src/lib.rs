// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! strmsync-storage: the durability substrate.
//!
//! In place of a SQL database, durability is provided by an append-only JSONL
//! write-ahead log of [`strmsync_core::Event`]s plus periodic zstd-compressed
//! snapshots of [`MaterializedState`]. [`Store`] ties the two together behind a
//! single lock, which is also the in-process stand-in for row-level locking:
//! the critical section around a queue claim is the lock hold.

mod migration;
mod queue;
mod repository;
mod snapshot;
mod state;
mod store;
mod wal;

pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use queue::{CancelOutcome, ClaimRequest, EnqueueOutcome, EnqueueRequest, TaskRunFilter};
pub use repository::{
    DataServerRepository, JobRepository, MediaServerRepository, SettingRepository,
    TaskRunRepository,
};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{CronState, MaterializedState};
pub use store::{Store, StoreError};
pub use wal::{Wal, WalEntry, WalError};

/// Current on-disk snapshot schema version. Bump and add a [`Migration`] when
/// [`MaterializedState`]'s shape changes incompatibly.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;
