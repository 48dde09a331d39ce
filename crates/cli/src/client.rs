// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use strmsync_daemon::protocol::{self, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

use crate::daemon_process::{
    cleanup_stale_socket, daemon_socket, probe_socket, read_startup_error,
    start_daemon_background, wrap_with_startup_error,
};

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

pub fn timeout_ipc() -> Duration {
    crate::env::timeout_ipc_ms().unwrap_or(Duration::from_secs(5))
}

pub fn timeout_connect() -> Duration {
    crate::env::timeout_connect_ms().unwrap_or(Duration::from_secs(5))
}

pub fn timeout_exit() -> Duration {
    crate::env::timeout_exit_ms().unwrap_or(Duration::from_secs(2))
}

pub fn poll_interval() -> Duration {
    crate::env::connect_poll_ms().unwrap_or(Duration::from_millis(50))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running")]
    DaemonNotRunning,

    #[error("failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("timed out waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected response from daemon")]
    UnexpectedResponse,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine state directory")]
    NoStateDir,
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// For action commands (job run, data-server upsert, task cancel, ...):
    /// auto-start the daemon if it isn't running, with at most one restart
    /// per process to avoid looping against a daemon that keeps failing.
    pub fn for_action() -> Result<Self, ClientError> {
        static RESTARTED: AtomicBool = AtomicBool::new(false);

        if RESTARTED.load(Ordering::SeqCst) {
            return Self::connect();
        }

        match Self::connect() {
            Ok(client) => {
                if probe_socket(&client.socket_path) {
                    Ok(client)
                } else {
                    RESTARTED.store(true, Ordering::SeqCst);
                    cleanup_stale_socket()?;
                    let child = start_daemon_background()?;
                    Self::connect_with_retry(timeout_connect(), child)
                }
            }
            Err(ClientError::DaemonNotRunning) => {
                RESTARTED.store(true, Ordering::SeqCst);
                let child = start_daemon_background()?;
                Self::connect_with_retry(timeout_connect(), child)
            }
            Err(e) => Err(wrap_with_startup_error(e)),
        }
    }

    /// For query commands (list, get, status): connect only, never starts
    /// the daemon — a query against a daemon that isn't running has nothing
    /// to report.
    pub fn for_query() -> Result<Self, ClientError> {
        Self::connect()
    }

    /// Connect to an existing daemon without starting one.
    pub fn connect() -> Result<Self, ClientError> {
        let socket_path = daemon_socket()?;
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self { socket_path })
    }

    fn connect_with_retry(
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let poll_start = Instant::now();
                    while poll_start.elapsed() < timeout_exit() {
                        if let Some(err) = read_startup_error() {
                            return Err(ClientError::DaemonStartFailed(err));
                        }
                        std::thread::sleep(poll_interval());
                    }
                    return Err(ClientError::DaemonStartFailed(format!(
                        "exited with {status}"
                    )));
                }
                Ok(None) => {}
                Err(_) => {}
            }

            match Self::connect() {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => std::thread::sleep(poll_interval()),
                Err(e) => return Err(wrap_with_startup_error(e)),
            }
        }

        Err(wrap_with_startup_error(ClientError::DaemonStartTimeout))
    }

    async fn send_with_timeout(
        &self,
        request: &Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::decode(&response_bytes)?)
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    async fn send_simple(&self, request: &Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            other => Self::reject(other),
        }
    }

    fn reject<T>(resp: Response) -> Result<T, ClientError> {
        match resp {
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(&Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Self::reject(other),
        }
    }

    pub async fn status(&self) -> Result<strmsync_daemon::protocol::DaemonStatus, ClientError> {
        match self.send(&Request::Status).await? {
            Response::Status { status } => Ok(status),
            other => Self::reject(other),
        }
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(&Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Self::reject(other),
        }
    }

    pub async fn job_create(
        &self,
        job: strmsync_core::NewJob,
    ) -> Result<strmsync_core::Job, ClientError> {
        match self.send(&Request::JobCreate { job }).await? {
            Response::Job { job } => Ok(job),
            other => Self::reject(other),
        }
    }

    pub async fn job_update(&self, job: strmsync_core::Job) -> Result<(), ClientError> {
        self.send_simple(&Request::JobUpdate { job }).await
    }

    pub async fn job_delete(&self, id: strmsync_core::JobId) -> Result<(), ClientError> {
        self.send_simple(&Request::JobDelete { id }).await
    }

    pub async fn job_get(
        &self,
        id: strmsync_core::JobId,
    ) -> Result<Option<strmsync_core::Job>, ClientError> {
        match self.send(&Request::JobGet { id }).await? {
            Response::JobOpt { job } => Ok(job),
            other => Self::reject(other),
        }
    }

    pub async fn job_list(&self) -> Result<Vec<strmsync_core::Job>, ClientError> {
        match self.send(&Request::JobList).await? {
            Response::Jobs { jobs } => Ok(jobs),
            other => Self::reject(other),
        }
    }

    pub async fn job_run(
        &self,
        id: strmsync_core::JobId,
    ) -> Result<Option<strmsync_core::TaskRun>, ClientError> {
        match self.send(&Request::JobRun { id }).await? {
            Response::Task { task } => Ok(task),
            other => Self::reject(other),
        }
    }

    pub async fn data_server_upsert(
        &self,
        data_server: strmsync_core::DataServer,
    ) -> Result<strmsync_core::DataServer, ClientError> {
        match self.send(&Request::DataServerUpsert { data_server }).await? {
            Response::DataServer { data_server } => Ok(data_server),
            other => Self::reject(other),
        }
    }

    pub async fn data_server_delete(
        &self,
        id: strmsync_core::DataServerId,
    ) -> Result<(), ClientError> {
        self.send_simple(&Request::DataServerDelete { id }).await
    }

    pub async fn data_server_get(
        &self,
        id: strmsync_core::DataServerId,
    ) -> Result<Option<strmsync_core::DataServer>, ClientError> {
        match self.send(&Request::DataServerGet { id }).await? {
            Response::DataServerOpt { data_server } => Ok(data_server),
            other => Self::reject(other),
        }
    }

    pub async fn data_server_list(&self) -> Result<Vec<strmsync_core::DataServer>, ClientError> {
        match self.send(&Request::DataServerList).await? {
            Response::DataServers { data_servers } => Ok(data_servers),
            other => Self::reject(other),
        }
    }

    pub async fn media_server_upsert(
        &self,
        media_server: strmsync_core::MediaServer,
    ) -> Result<strmsync_core::MediaServer, ClientError> {
        match self
            .send(&Request::MediaServerUpsert { media_server })
            .await?
        {
            Response::MediaServer { media_server } => Ok(media_server),
            other => Self::reject(other),
        }
    }

    pub async fn media_server_delete(
        &self,
        id: strmsync_core::MediaServerId,
    ) -> Result<(), ClientError> {
        self.send_simple(&Request::MediaServerDelete { id }).await
    }

    pub async fn media_server_get(
        &self,
        id: strmsync_core::MediaServerId,
    ) -> Result<Option<strmsync_core::MediaServer>, ClientError> {
        match self.send(&Request::MediaServerGet { id }).await? {
            Response::MediaServerOpt { media_server } => Ok(media_server),
            other => Self::reject(other),
        }
    }

    pub async fn media_server_list(&self) -> Result<Vec<strmsync_core::MediaServer>, ClientError> {
        match self.send(&Request::MediaServerList).await? {
            Response::MediaServers { media_servers } => Ok(media_servers),
            other => Self::reject(other),
        }
    }

    pub async fn task_get(
        &self,
        id: strmsync_core::TaskRunId,
    ) -> Result<Option<strmsync_core::TaskRun>, ClientError> {
        match self.send(&Request::TaskGet { id }).await? {
            Response::Task { task } => Ok(task),
            other => Self::reject(other),
        }
    }

    pub async fn task_list(
        &self,
        job_id: Option<strmsync_core::JobId>,
        status: Option<strmsync_core::TaskStatus>,
    ) -> Result<Vec<strmsync_core::TaskRun>, ClientError> {
        match self.send(&Request::TaskList { job_id, status }).await? {
            Response::Tasks { tasks } => Ok(tasks),
            other => Self::reject(other),
        }
    }

    pub async fn task_cancel(&self, id: strmsync_core::TaskRunId) -> Result<(), ClientError> {
        self.send_simple(&Request::TaskCancel { id }).await
    }

    pub async fn setting_set(&self, key: String, value: String) -> Result<(), ClientError> {
        self.send_simple(&Request::SettingSet { key, value }).await
    }

    pub async fn setting_get(
        &self,
        key: String,
    ) -> Result<Option<strmsync_core::Setting>, ClientError> {
        match self.send(&Request::SettingGet { key }).await? {
            Response::Setting { setting } => Ok(setting),
            other => Self::reject(other),
        }
    }

    pub async fn setting_list(&self) -> Result<Vec<strmsync_core::Setting>, ClientError> {
        match self.send(&Request::SettingList).await? {
            Response::Settings { settings } => Ok(settings),
            other => Self::reject(other),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
