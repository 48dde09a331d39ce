// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for the daemon's control socket (SPEC_FULL.md §6).
//!
//! Wire format: 4-byte big-endian length prefix + JSON payload, mirroring the
//! teacher's `oj-daemon` protocol. This socket is the concrete local-operator
//! shape of the management surface the distilled spec places out of scope —
//! it only calls repository/queue/scheduler methods, never reimplements them.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strmsync_core::{
    DataServer, DataServerId, Job, JobId, MediaServer, MediaServerId, NewJob, Setting, TaskRun,
    TaskRunId, TaskStatus,
};
use thiserror::Error;

/// Request from the CLI to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    Ping,
    Hello { version: String },
    Status,

    JobCreate { job: NewJob },
    JobUpdate { job: Job },
    JobDelete { id: JobId },
    JobGet { id: JobId },
    JobList,
    /// Manually trigger a job outside its cron schedule.
    JobRun { id: JobId },

    DataServerUpsert { data_server: DataServer },
    DataServerDelete { id: DataServerId },
    DataServerGet { id: DataServerId },
    DataServerList,

    MediaServerUpsert { media_server: MediaServer },
    MediaServerDelete { id: MediaServerId },
    MediaServerGet { id: MediaServerId },
    MediaServerList,

    TaskGet { id: TaskRunId },
    TaskList {
        job_id: Option<JobId>,
        status: Option<TaskStatus>,
    },
    TaskCancel { id: TaskRunId },

    SettingSet { key: String, value: String },
    SettingGet { key: String },
    SettingList,

    Shutdown,
}

/// Response from the daemon to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Pong,
    Hello { version: String },
    Ok,
    Error { message: String },
    Status { status: DaemonStatus },

    Job { job: Job },
    JobOpt { job: Option<Job> },
    Jobs { jobs: Vec<Job> },

    DataServer { data_server: DataServer },
    DataServerOpt { data_server: Option<DataServer> },
    DataServers { data_servers: Vec<DataServer> },

    MediaServer { media_server: MediaServer },
    MediaServerOpt { media_server: Option<MediaServer> },
    MediaServers { media_servers: Vec<MediaServer> },

    Task { task: Option<TaskRun> },
    Tasks { tasks: Vec<TaskRun> },

    Setting { setting: Option<Setting> },
    Settings { settings: Vec<Setting> },

    ShuttingDown,
}

/// Snapshot of daemon health returned by `Request::Status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_ms: i64,
    pub jobs_total: usize,
    pub tasks_pending: usize,
    pub tasks_running: usize,
    pub worker_count: usize,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,
}

/// Maximum message size (64 MB); control-socket payloads are small job/task
/// records, never media content.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encode a message to JSON bytes, without the length prefix. Pair with
/// [`write_message`], which handles the wire framing.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(json)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
