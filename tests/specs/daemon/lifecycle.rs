//! Daemon lifecycle specs.
//!
//! Verify daemon start/stop/status behavior through the CLI.

use crate::prelude::*;

#[test]
fn status_fails_when_not_running() {
    let temp = Project::empty();

    temp.strmsync()
        .args(&["daemon", "status"])
        .fails()
        .stderr_has("daemon not running");
}

#[test]
fn start_reports_success() {
    let temp = Project::empty();

    temp.strmsync()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("daemon started");
}

#[test]
fn status_shows_running_after_start() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    temp.strmsync()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("version:");
}

#[test]
fn status_shows_zero_jobs_for_fresh_daemon() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    temp.strmsync()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("jobs:           0");
}

#[test]
fn stop_reports_success() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    temp.strmsync()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("daemon stopped");
}

#[test]
fn status_fails_after_stop() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();
    temp.strmsync().args(&["daemon", "stop"]).passes();

    temp.strmsync()
        .args(&["daemon", "status"])
        .fails()
        .stderr_has("daemon not running");
}

#[test]
fn creates_socket_and_pid_files() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    let has_files = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.state_path().join("daemon.sock").exists()
            && temp.state_path().join("daemon.pid").exists()
    });
    assert!(
        has_files,
        "daemon socket and pid files should exist\ndaemon log:\n{}",
        temp.daemon_log()
    );
}

/// A job query command must never auto-start the daemon: an idle user
/// running `strmsync job list` with no daemon up should see an empty
/// list's worth of nothing happen, not a freshly spawned process.
#[test]
fn query_commands_do_not_start_daemon() {
    let temp = Project::empty();

    temp.strmsync().args(&["job", "list"]).fails();

    assert!(
        !temp.state_path().join("daemon.sock").exists(),
        "job list must not auto-start the daemon"
    );
}

/// An action command (job create) auto-starts the daemon on first use.
#[test]
fn action_commands_auto_start_daemon() {
    let temp = Project::empty();

    temp.strmsync()
        .args(&[
            "data-server",
            "upsert",
            "src",
            "--kind",
            "local",
            "--host",
            "/tmp",
        ])
        .passes();

    assert!(
        temp.state_path().join("daemon.sock").exists(),
        "an action command should have auto-started the daemon"
    );
}

#[test]
fn restart_after_clean_stop_succeeds() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();
    temp.strmsync().args(&["daemon", "stop"]).passes();

    temp.strmsync()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("daemon started");
    temp.strmsync()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("version:");
}
