// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! strmsyncd — the background daemon.
//!
//! Owns the durable [`strmsync_storage::Store`], the cron scheduler, and the
//! worker pool; accepts commands from `strmsync` over a Unix control socket.
//! The daemon is normally started by the `strmsync` CLI and should not be
//! invoked directly.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::time::Duration;

use strmsync_daemon::lifecycle::{self, LifecycleError, StartupResult};
use strmsync_daemon::{Config, Daemon};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

/// How long `shutdown` waits for in-flight runs to finish before giving up.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("strmsyncd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("strmsyncd {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Background daemon that owns the sync scheduler and worker pool.");
                println!();
                println!("USAGE:");
                println!("    strmsyncd");
                println!();
                println!("strmsyncd is normally started by the `strmsync` CLI and should not");
                println!("be invoked directly. It listens on a Unix socket for commands.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("usage: strmsyncd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);

    let log_guard = setup_logging(&config)?;
    info!(data_dir = %config.data_dir.display(), "starting strmsyncd");

    let StartupResult {
        daemon,
        listener,
        shutdown,
    } = match lifecycle::startup(config.clone()).await {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(lock_path)) => {
            let pid = std::fs::read_to_string(&lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("strmsyncd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            drop(log_guard);
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(e.into());
        }
    };

    tokio::spawn(listener.run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(socket = %config.socket_path.display(), "daemon ready");
    println!("READY");

    tokio::select! {
        _ = shutdown.notified() => {
            info!("shutdown requested via control socket");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }

    shutdown_daemon(daemon).await;
    info!("daemon stopped");
    drop(log_guard);
    Ok(())
}

async fn shutdown_daemon(daemon: Daemon) {
    daemon.shutdown(WORKER_DRAIN_TIMEOUT).await;
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` -> `daemon.log.1` -> `daemon.log.2` -> `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &strmsync_daemon::Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let parent = config.log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = config
        .log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("daemon.log"));
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
