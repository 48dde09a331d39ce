// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional post-sync notification target.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a media-server binding.
    #[derive(Default)]
    pub struct MediaServerId;
}

/// A configured media server. The only operation the core consumes against it is
/// path-change notification (see `strmsync_drivers::notify::MediaServerNotifier`);
/// the wire format of that notification is the collaborator's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaServer {
    pub id: MediaServerId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub credentials: Vec<u8>,
    pub options: serde_json::Value,
    pub enabled: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[cfg(test)]
#[path = "media_server_tests.rs"]
mod tests;
