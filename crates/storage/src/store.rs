// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties the WAL and [`MaterializedState`] together behind one lock.
//!
//! The lock is the in-process stand-in for the spec's row-level locking.
//! [`Store::append_event`] holds it across one WAL append and state fold, so a
//! concurrent reader never observes a state change whose event failed to
//! reach the log. [`Store::transact`] holds it across a *read*, a *decision*,
//! and that same append-and-fold, which is what a queue claim or enqueue-dedup
//! needs: the candidate selection (or duplicate check) and the WAL append
//! that acts on it must not be two separate lock acquisitions, or two
//! concurrent callers could both pass the check before either writes.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use strmsync_core::Event;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

struct Inner {
    wal: Wal,
    state: MaterializedState,
    seq: u64,
}

/// The durable store for one daemon instance: one WAL file plus one snapshot
/// file under `data_dir`.
pub struct Store {
    inner: Mutex<Inner>,
    wal_path: PathBuf,
    snapshot_path: PathBuf,
}

impl Store {
    /// Load the last snapshot (if any), replay the WAL after it, and return a
    /// store ready to serve reads and accept new events.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let wal_path = data_dir.join("wal.jsonl");
        let snapshot_path = data_dir.join("snapshot.bin");

        let (mut state, snapshot_seq) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (MaterializedState::default(), 0),
        };

        let mut wal = Wal::open(&wal_path, snapshot_seq)?;
        let mut seq = snapshot_seq;
        while let Some(entry) = wal.next_unprocessed()? {
            state.apply_event(&entry.event);
            seq = entry.seq;
        }

        Ok(Self {
            inner: Mutex::new(Inner { wal, state, seq }),
            wal_path,
            snapshot_path,
        })
    }

    /// Append `event` to the WAL, fold it into the state, and return the
    /// assigned sequence number. The whole operation runs under one lock hold.
    pub fn append_event(&self, event: Event) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let seq = inner.wal.append(&event)?;
        inner.wal.flush()?;
        inner.state.apply_event(&event);
        inner.seq = seq;
        Ok(seq)
    }

    /// Run `f` against a consistent read-only view of the state.
    pub fn with_state<R>(&self, f: impl FnOnce(&MaterializedState) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    /// Read-decide-write under one lock hold: `decide` inspects the current
    /// state and returns the event (if any) the caller wants appended;
    /// `finish` then runs against the state *after* that event (if present)
    /// has been folded in, and produces the method's return value. Both
    /// closures run inside the same critical section as the WAL append, so a
    /// concurrent `transact`/`append_event`/`with_state` call never observes
    /// the gap between the read and the write — this is what makes
    /// [`crate::queue`]'s enqueue-dedup and claim-under-lock invariants hold.
    pub fn transact<R>(
        &self,
        decide: impl FnOnce(&MaterializedState) -> Option<Event>,
        finish: impl FnOnce(&MaterializedState, Option<&Event>) -> R,
    ) -> Result<R, StoreError> {
        let mut inner = self.inner.lock();
        let event = decide(&inner.state);
        if let Some(ref event) = event {
            let seq = inner.wal.append(event)?;
            inner.wal.flush()?;
            inner.state.apply_event(event);
            inner.seq = seq;
        }
        Ok(finish(&inner.state, event.as_ref()))
    }

    /// Take a snapshot of the current state and truncate the WAL up to (and
    /// including) the checkpointed sequence. Safe to call concurrently with
    /// [`Store::append_event`] — new events appended mid-checkpoint simply
    /// remain in the WAL after truncation.
    pub fn checkpoint(&self) -> Result<u64, StoreError> {
        let (seq, state) = {
            let inner = self.inner.lock();
            (inner.seq, inner.state.clone())
        };

        Snapshot::new(seq, state).save(&self.snapshot_path)?;

        let mut inner = self.inner.lock();
        inner.wal.truncate_before(seq + 1)?;
        Ok(seq)
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
