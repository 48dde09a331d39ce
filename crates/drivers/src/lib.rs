// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Driver and Writer adapters for external I/O: data-source backends that list and
//! serve remote file trees, the `.strm`/metadata writer, and the media-server
//! notification sink invoked after a successful sync.

pub mod driver;
pub mod notify;
mod writer;

pub use driver::{
    BuildStrmRequest, CloudDrive2Driver, Driver, DriverEvent, DriverEventKind, DriverFactory,
    LocalDriver, ListOptions, OpenListDriver, WatchOptions, WebDavDriver,
};
pub use notify::{HttpMediaServerNotifier, MediaServerNotifier, NoOpMediaServerNotifier};
pub use writer::{FsStrmWriter, StrmWriter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use driver::FakeDriver;
