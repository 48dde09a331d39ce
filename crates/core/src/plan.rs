// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine's classify/plan stage output. In-process only — never persisted.

use crate::strm::StrmInfo;
use serde::{Deserialize, Serialize};

/// The action decided for one source entry during the classify/plan stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    Create,
    Update,
    Skip,
    Delete,
}

/// One planned filesystem action, ready for the apply stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlanItem {
    pub op: SyncOp,
    pub source_path: String,
    pub target_path: String,
    /// Composed `.strm` payload; absent for plain metadata-lane copies and pure deletes.
    pub strm: Option<StrmInfo>,
    pub size: u64,
    pub mod_time: i64,
}

impl SyncPlanItem {
    pub fn is_mutation(&self) -> bool {
        !matches!(self.op, SyncOp::Skip)
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
