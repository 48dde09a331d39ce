// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket listener: accepts connections, decodes one [`Request`] per
//! connection, dispatches it against the [`Store`]'s repository traits (plus
//! the [`CronScheduler`] and [`WorkerPool`]), and writes back one [`Response`].
//! Grounded in the teacher's `Listener`/`handle_connection`/`handle_request`
//! shape, scoped down to strmsync's much smaller request surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use strmsync_core::{
    DataServerRepository, JobRepository, MediaServerRepository, SettingRepository, TaskStatus,
};
use strmsync_storage::{CancelOutcome, EnqueueRequest, Store, TaskRunFilter};
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::protocol::{
    self, DaemonStatus, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};
use crate::scheduler::CronScheduler;
use crate::worker_pool::WorkerPool;

/// Shared daemon context every connection's request handler reads from.
pub struct ListenCtx {
    pub store: Arc<Store>,
    pub scheduler: Arc<CronScheduler>,
    pub worker_pool: Arc<WorkerPool>,
    pub clock: Arc<dyn strmsync_core::Clock>,
    pub worker_count: usize,
    pub start_time: Instant,
    pub socket_path: PathBuf,
    pub shutdown: Arc<Notify>,
}

pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Accepts connections until the process exits; each connection is
    /// handled on its own task so one slow client never blocks another.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(protocol::ProtocolError::ConnectionClosed) => {
                                    debug!("client disconnected");
                                }
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("connection timed out waiting for a request");
                                }
                                other => error!(error = %other, "connection error"),
                            }
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();
    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    if matches!(request, Request::Status | Request::Ping) {
        debug!(?request, "received request");
    } else {
        info!(?request, "received request");
    }

    let response = handle_request(request, ctx).await;
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    let now_ms = ctx.clock.now_ms();
    match request {
        Request::Ping => Response::Pong,
        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },
        Request::Status => Response::Status {
            status: daemon_status(ctx),
        },

        Request::JobCreate { job } => {
            match JobRepository::create(ctx.store.as_ref(), job, now_ms) {
                Ok(job) => {
                    ctx.scheduler.upsert_job(job.id.clone(), job.cron.clone());
                    Response::Job { job }
                }
                Err(e) => error_response(e),
            }
        }
        Request::JobUpdate { job } => {
            match JobRepository::update(ctx.store.as_ref(), job.clone()) {
                Ok(()) => {
                    if job.has_schedule() {
                        ctx.scheduler.upsert_job(job.id.clone(), job.cron.clone());
                    } else {
                        ctx.scheduler.remove_job(&job.id);
                    }
                    Response::Ok
                }
                Err(e) => error_response(e),
            }
        }
        Request::JobDelete { id } => {
            match JobRepository::delete(ctx.store.as_ref(), &id) {
                Ok(()) => {
                    ctx.scheduler.remove_job(&id);
                    Response::Ok
                }
                Err(e) => error_response(e),
            }
        }
        Request::JobGet { id } => Response::JobOpt {
            job: JobRepository::get(ctx.store.as_ref(), &id),
        },
        Request::JobList => Response::Jobs {
            jobs: JobRepository::list(ctx.store.as_ref()),
        },
        Request::JobRun { id } => match ctx.store.enqueue(EnqueueRequest::new(id), now_ms) {
            Ok(outcome) => Response::Task {
                task: Some(outcome.task_run().clone()),
            },
            Err(e) => error_response(e),
        },

        Request::DataServerUpsert { data_server } => {
            match DataServerRepository::upsert(ctx.store.as_ref(), data_server.clone()) {
                Ok(()) => Response::DataServer { data_server },
                Err(e) => error_response(e),
            }
        }
        Request::DataServerDelete { id } => {
            match DataServerRepository::delete(ctx.store.as_ref(), &id) {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }
        Request::DataServerGet { id } => Response::DataServerOpt {
            data_server: DataServerRepository::get(ctx.store.as_ref(), &id),
        },
        Request::DataServerList => Response::DataServers {
            data_servers: DataServerRepository::list(ctx.store.as_ref()),
        },

        Request::MediaServerUpsert { media_server } => {
            match MediaServerRepository::upsert(ctx.store.as_ref(), media_server.clone()) {
                Ok(()) => Response::MediaServer { media_server },
                Err(e) => error_response(e),
            }
        }
        Request::MediaServerDelete { id } => {
            match MediaServerRepository::delete(ctx.store.as_ref(), &id) {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }
        Request::MediaServerGet { id } => Response::MediaServerOpt {
            media_server: MediaServerRepository::get(ctx.store.as_ref(), &id),
        },
        Request::MediaServerList => Response::MediaServers {
            media_servers: MediaServerRepository::list(ctx.store.as_ref()),
        },

        Request::TaskGet { id } => Response::Task {
            task: ctx.store.get_task_run(&id),
        },
        Request::TaskList { job_id, status } => Response::Tasks {
            tasks: ctx.store.list_task_runs(&TaskRunFilter { job_id, status }),
        },
        Request::TaskCancel { id } => match ctx.store.cancel(&id, now_ms) {
            Ok(CancelOutcome::SignalRunning(run_id)) => {
                ctx.worker_pool.cancel_running(&run_id);
                Response::Ok
            }
            Ok(_) => Response::Ok,
            Err(e) => error_response(e),
        },

        Request::SettingSet { key, value } => {
            match SettingRepository::set(ctx.store.as_ref(), &key, &value, now_ms) {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }
        Request::SettingGet { key } => Response::Setting {
            setting: SettingRepository::get(ctx.store.as_ref(), &key),
        },
        Request::SettingList => Response::Settings {
            settings: SettingRepository::list(ctx.store.as_ref()),
        },

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

fn error_response(e: strmsync_storage::StoreError) -> Response {
    Response::Error {
        message: e.to_string(),
    }
}

fn daemon_status(ctx: &ListenCtx) -> DaemonStatus {
    let jobs_total = JobRepository::list(ctx.store.as_ref()).len();
    let pending = ctx
        .store
        .list_task_runs(&TaskRunFilter {
            job_id: None,
            status: Some(TaskStatus::Pending),
        })
        .len();
    let running = ctx
        .store
        .list_task_runs(&TaskRunFilter {
            job_id: None,
            status: Some(TaskStatus::Running),
        })
        .len();
    DaemonStatus {
        version: PROTOCOL_VERSION.to_string(),
        uptime_ms: ctx.start_time.elapsed().as_millis() as i64,
        jobs_total,
        tasks_pending: pending,
        tasks_running: running,
        worker_count: ctx.worker_count,
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
