// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend binding a Job reads to build a Driver.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a data-server binding.
    #[derive(Default)]
    pub struct DataServerId;
}

/// Which driver backend a [`DataServer`] binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataServerKind {
    Local,
    CloudDrive2,
    OpenList,
    WebDav,
}

impl fmt::Display for DataServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataServerKind::Local => "local",
            DataServerKind::CloudDrive2 => "clouddrive2",
            DataServerKind::OpenList => "openlist",
            DataServerKind::WebDav => "webdav",
        };
        write!(f, "{s}")
    }
}

/// A configured data-source backend. Credentials are carried as an opaque,
/// already-encrypted blob — decrypting them is outside the core's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataServer {
    pub id: DataServerId,
    pub name: String,
    pub kind: DataServerKind,
    pub host: String,
    pub port: u16,
    /// Opaque encrypted credential material (e.g. bearer token, username/password pair).
    pub credentials: Vec<u8>,
    pub options: serde_json::Value,
    pub enabled: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[cfg(test)]
#[path = "data_server_tests.rs"]
mod tests;
