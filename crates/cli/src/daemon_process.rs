// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management: starting, stopping, and probing `strmsyncd`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::client::ClientError;

/// Start the daemon in the background, returning the child process handle.
pub fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    let path = find_daemon_binary()?;
    Command::new(&path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

/// Stop the daemon synchronously using SIGTERM + polling, falling back to
/// SIGKILL. Used from sync contexts (no tokio runtime available).
pub fn stop_daemon_sync() {
    if let Ok(Some(pid)) = read_daemon_pid() {
        kill_signal("-15", pid);

        let start = Instant::now();
        let timeout = crate::client::timeout_exit();
        while start.elapsed() < timeout {
            if !process_exists(pid) {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        if process_exists(pid) {
            force_kill_daemon(pid);
            let start = Instant::now();
            while start.elapsed() < timeout {
                if !process_exists(pid) {
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }

    if let Ok(dir) = daemon_dir() {
        cleanup_stale_pid(&dir);
    }
}

/// Wait for a process to exit.
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(crate::client::poll_interval()).await;
    }
    false
}

fn find_daemon_binary() -> Result<PathBuf, ClientError> {
    if let Some(path) = crate::env::daemon_binary() {
        return Ok(PathBuf::from(path));
    }

    let current_exe = std::env::current_exe().ok();
    let is_debug_build = current_exe
        .as_ref()
        .and_then(|p| p.to_str())
        .map(|s| s.contains("target/debug"))
        .unwrap_or(false);

    if is_debug_build {
        if let Some(manifest_dir) = crate::env::cargo_manifest_dir() {
            let dev_path = PathBuf::from(manifest_dir)
                .parent()
                .and_then(|p| p.parent())
                .map(|p| p.join("target/debug/strmsyncd"));
            if let Some(path) = dev_path {
                if path.exists() {
                    return Ok(path);
                }
            }
        }
    }

    if let Some(ref exe) = current_exe {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("strmsyncd");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }

    Ok(PathBuf::from("strmsyncd"))
}

/// Socket path for the user-level daemon.
pub fn daemon_socket() -> Result<PathBuf, ClientError> {
    Ok(daemon_dir()?.join("daemon.sock"))
}

pub fn daemon_dir() -> Result<PathBuf, ClientError> {
    crate::env::state_dir()
}

/// Remove an orphaned PID file during shutdown.
pub fn cleanup_stale_pid(dir: &Path) {
    let pid_path = dir.join("daemon.pid");
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }
}

pub fn read_daemon_pid() -> Result<Option<u32>, ClientError> {
    let pid_path = daemon_dir()?.join("daemon.pid");
    if !pid_path.exists() {
        return Ok(None);
    }
    match std::fs::read_to_string(&pid_path) {
        Ok(content) => Ok(content.trim().parse::<u32>().ok()),
        Err(_) => Ok(None),
    }
}

fn kill_signal(signal: &str, pid: u32) -> bool {
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn process_exists(pid: u32) -> bool {
    kill_signal("-0", pid)
}

pub fn force_kill_daemon(pid: u32) -> bool {
    kill_signal("-9", pid)
}

/// Startup marker prefix the daemon writes to its log before anything else.
const STARTUP_MARKER_PREFIX: &str = "starting strmsyncd";

/// Read the daemon log from the most recent startup, looking for errors.
pub fn read_startup_error() -> Option<String> {
    let log_path = daemon_dir().ok()?.join("daemon.log");
    let content = std::fs::read_to_string(&log_path).ok()?;
    parse_startup_error(&content)
}

fn parse_startup_error(content: &str) -> Option<String> {
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains("ERROR") || line.contains("failed to start"))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("\n"))
    }
}

/// Wrap an error with startup log info if available.
pub fn wrap_with_startup_error(err: ClientError) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }
    match read_startup_error() {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

/// Probe whether a Unix socket is accepting connections.
pub fn probe_socket(socket_path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(socket_path).is_ok()
}

/// Remove a stale socket/PID file pair left by a daemon that crashed without
/// cleaning up. Only removes files whose referenced PID is no longer alive.
pub fn cleanup_stale_socket() -> Result<(), ClientError> {
    let dir = daemon_dir()?;
    let socket_path = dir.join("daemon.sock");
    let pid_path = dir.join("daemon.pid");

    if pid_path.exists() {
        match read_daemon_pid() {
            Ok(Some(pid)) if !process_exists(pid) => {
                let _ = std::fs::remove_file(&socket_path);
                let _ = std::fs::remove_file(&pid_path);
            }
            Ok(Some(_)) => {}
            _ => {
                let _ = std::fs::remove_file(&socket_path);
                let _ = std::fs::remove_file(&pid_path);
            }
        }
    } else {
        let _ = std::fs::remove_file(&socket_path);
    }

    Ok(())
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
