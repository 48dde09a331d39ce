// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! strmsync — control-socket client for the `strmsyncd` daemon.

mod client;
mod color;
mod daemon_process;
mod env;
mod output;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::OutputFormat;
use strmsync_core::{
    Clock, DataServer, DataServerId, DataServerKind, Job, JobId, MediaServer, MediaServerId,
    NewJob, SystemClock, TaskRunId, TaskStatus, WatchMode,
};
use table::{Column, Table};

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "strmsync",
    version,
    about = "Sync remote media trees into local STRM descriptor files"
)]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon process management
    Daemon(DaemonArgs),
    /// Job configuration
    Job(JobArgs),
    /// Data-source server bindings
    DataServer(DataServerArgs),
    /// Media-server notification targets
    MediaServer(MediaServerArgs),
    /// Task run history and control
    Task(TaskArgs),
    /// Process-wide tunables
    Setting(SettingArgs),
}

#[derive(Parser)]
struct DaemonArgs {
    #[command(subcommand)]
    command: DaemonCommand,
}

#[derive(Subcommand)]
enum DaemonCommand {
    /// Start the daemon if it isn't already running
    Start,
    /// Stop a running daemon
    Stop,
    /// Report daemon health and pool sizing
    Status,
}

#[derive(Parser)]
struct JobArgs {
    #[command(subcommand)]
    command: JobCommand,
}

#[derive(Subcommand)]
enum JobCommand {
    /// Create a job
    Create {
        name: String,
        #[arg(long)]
        data_server: String,
        #[arg(long)]
        media_server: Option<String>,
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        strm_path: Option<String>,
        #[arg(long)]
        cron: Option<String>,
        #[arg(long, value_enum, default_value = "local")]
        watch_mode: WatchModeArg,
        #[arg(long)]
        disabled: bool,
        /// Raw JSON options blob merged into `JobOptions` (extensions,
        /// strm_mode, concurrency, ...); see SPEC_FULL.md §6.
        #[arg(long)]
        options: Option<String>,
    },
    /// List jobs
    List,
    /// Show one job
    Show { id: String },
    /// Delete a job
    Delete { id: String },
    /// Trigger a job run outside its cron schedule
    Run { id: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum WatchModeArg {
    Local,
    Api,
}

impl From<WatchModeArg> for WatchMode {
    fn from(v: WatchModeArg) -> Self {
        match v {
            WatchModeArg::Local => WatchMode::Local,
            WatchModeArg::Api => WatchMode::Api,
        }
    }
}

#[derive(Parser)]
struct DataServerArgs {
    #[command(subcommand)]
    command: DataServerCommand,
}

#[derive(Subcommand)]
enum DataServerCommand {
    /// Create or replace a data-server binding
    Upsert {
        #[arg(long)]
        id: Option<String>,
        name: String,
        #[arg(long, value_enum)]
        kind: DataServerKindArg,
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 0)]
        port: u16,
        #[arg(long)]
        disabled: bool,
    },
    /// List data-server bindings
    List,
    /// Show one data-server binding
    Show { id: String },
    /// Delete a data-server binding
    Delete { id: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DataServerKindArg {
    Local,
    Clouddrive2,
    Openlist,
    Webdav,
}

impl From<DataServerKindArg> for DataServerKind {
    fn from(v: DataServerKindArg) -> Self {
        match v {
            DataServerKindArg::Local => DataServerKind::Local,
            DataServerKindArg::Clouddrive2 => DataServerKind::CloudDrive2,
            DataServerKindArg::Openlist => DataServerKind::OpenList,
            DataServerKindArg::Webdav => DataServerKind::WebDav,
        }
    }
}

#[derive(Parser)]
struct MediaServerArgs {
    #[command(subcommand)]
    command: MediaServerCommand,
}

#[derive(Subcommand)]
enum MediaServerCommand {
    /// Create or replace a media-server binding
    Upsert {
        #[arg(long)]
        id: Option<String>,
        name: String,
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 0)]
        port: u16,
        #[arg(long)]
        disabled: bool,
    },
    /// List media-server bindings
    List,
    /// Show one media-server binding
    Show { id: String },
    /// Delete a media-server binding
    Delete { id: String },
}

#[derive(Parser)]
struct TaskArgs {
    #[command(subcommand)]
    command: TaskCommand,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List task runs, optionally filtered
    List {
        #[arg(long)]
        job: Option<String>,
        #[arg(long, value_enum)]
        status: Option<TaskStatusArg>,
    },
    /// Show one task run
    Show { id: String },
    /// Cancel a task run
    Cancel { id: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TaskStatusArg {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl From<TaskStatusArg> for TaskStatus {
    fn from(v: TaskStatusArg) -> Self {
        match v {
            TaskStatusArg::Pending => TaskStatus::Pending,
            TaskStatusArg::Running => TaskStatus::Running,
            TaskStatusArg::Succeeded => TaskStatus::Succeeded,
            TaskStatusArg::Failed => TaskStatus::Failed,
            TaskStatusArg::Cancelled => TaskStatus::Cancelled,
        }
    }
}

#[derive(Parser)]
struct SettingArgs {
    #[command(subcommand)]
    command: SettingCommand,
}

#[derive(Subcommand)]
enum SettingCommand {
    /// Set a tunable
    Set { key: String, value: String },
    /// Read a tunable
    Get { key: String },
    /// List all tunables
    List,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    match cli.command {
        Commands::Daemon(args) => handle_daemon(args.command).await,
        Commands::Job(args) => {
            let client = match &args.command {
                JobCommand::List | JobCommand::Show { .. } => DaemonClient::for_query()?,
                _ => DaemonClient::for_action()?,
            };
            handle_job(args.command, &client, format).await
        }
        Commands::DataServer(args) => {
            let client = match &args.command {
                DataServerCommand::List | DataServerCommand::Show { .. } => {
                    DaemonClient::for_query()?
                }
                _ => DaemonClient::for_action()?,
            };
            handle_data_server(args.command, &client, format).await
        }
        Commands::MediaServer(args) => {
            let client = match &args.command {
                MediaServerCommand::List | MediaServerCommand::Show { .. } => {
                    DaemonClient::for_query()?
                }
                _ => DaemonClient::for_action()?,
            };
            handle_media_server(args.command, &client, format).await
        }
        Commands::Task(args) => {
            let client = match &args.command {
                TaskCommand::Cancel { .. } => DaemonClient::for_action()?,
                _ => DaemonClient::for_query()?,
            };
            handle_task(args.command, &client, format).await
        }
        Commands::Setting(args) => {
            let client = match &args.command {
                SettingCommand::Set { .. } => DaemonClient::for_action()?,
                _ => DaemonClient::for_query()?,
            };
            handle_setting(args.command, &client, format).await
        }
    }
}

async fn handle_daemon(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start => {
            let client = DaemonClient::for_action()?;
            client.hello().await?;
            println!("daemon started");
            Ok(())
        }
        DaemonCommand::Stop => {
            match DaemonClient::for_query() {
                Ok(client) => {
                    let _ = client.shutdown().await;
                }
                Err(client::ClientError::DaemonNotRunning) => {}
                Err(e) => return Err(e.into()),
            }
            daemon_process::wait_for_exit(
                daemon_process::read_daemon_pid()?.unwrap_or(0),
                client::timeout_exit(),
            )
            .await;
            println!("daemon stopped");
            Ok(())
        }
        DaemonCommand::Status => {
            let client = DaemonClient::for_query()?;
            let status = client.status().await?;
            println!("version:        {}", status.version);
            println!("uptime:         {}ms", status.uptime_ms);
            println!("jobs:           {}", status.jobs_total);
            println!("tasks pending:  {}", status.tasks_pending);
            println!("tasks running:  {}", status.tasks_running);
            println!("workers:        {}", status.worker_count);
            Ok(())
        }
    }
}

async fn handle_job(command: JobCommand, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match command {
        JobCommand::Create {
            name,
            data_server,
            media_server,
            source,
            target,
            strm_path,
            cron,
            watch_mode,
            disabled,
            options,
        } => {
            let options = match options {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid --options JSON: {e}"))?,
                None => serde_json::json!({}),
            };
            let job = client
                .job_create(NewJob {
                    name,
                    enabled: !disabled,
                    cron: cron.unwrap_or_default(),
                    watch_mode: watch_mode.into(),
                    source_path: source,
                    target_path: target.clone(),
                    strm_path: strm_path.unwrap_or(target),
                    data_server_id: DataServerId::new(data_server),
                    media_server_id: media_server.map(MediaServerId::new),
                    options,
                })
                .await?;
            print_job(&job, format)
        }
        JobCommand::List => {
            let jobs = client.job_list().await?;
            match format {
                OutputFormat::Json => output::print_json(&jobs),
                OutputFormat::Text => {
                    print_job_table(&jobs);
                    Ok(())
                }
            }
        }
        JobCommand::Show { id } => {
            let job = client.job_get(JobId::new(id)).await?;
            match job {
                Some(job) => print_job(&job, format),
                None => anyhow::bail!("job not found"),
            }
        }
        JobCommand::Delete { id } => {
            client.job_delete(JobId::new(id)).await?;
            println!("deleted");
            Ok(())
        }
        JobCommand::Run { id } => {
            let task = client.job_run(JobId::new(id)).await?;
            match task {
                Some(task) => {
                    println!("enqueued task run {}", task.id);
                    Ok(())
                }
                None => anyhow::bail!("job not found"),
            }
        }
    }
}

fn print_job(job: &Job, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => output::print_json(job),
        OutputFormat::Text => {
            println!("id:            {}", job.id);
            println!("name:          {}", job.name);
            println!("enabled:       {}", job.enabled);
            println!("cron:          {}", job.cron);
            println!("watch mode:    {}", job.watch_mode);
            println!("source:        {}", job.source_path);
            println!("target:        {}", job.target_path);
            println!("status:        {}", job.status);
            println!(
                "last run:      {}",
                output::format_time_ago(job.last_run_at_ms.unwrap_or(0))
            );
            Ok(())
        }
    }
}

fn print_job_table(jobs: &[Job]) {
    let mut table = Table::new(vec![
        Column::left("ID"),
        Column::left("NAME"),
        Column::status("STATUS"),
        Column::left("CRON"),
        Column::muted("LAST RUN"),
    ]);
    for job in jobs {
        table.row(vec![
            job.id.short(8).to_string(),
            job.name.clone(),
            job.status.to_string(),
            job.cron.clone(),
            output::format_time_ago(job.last_run_at_ms.unwrap_or(0)),
        ]);
    }
    table.render(&mut std::io::stdout());
}

async fn handle_data_server(
    command: DataServerCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        DataServerCommand::Upsert {
            id,
            name,
            kind,
            host,
            port,
            disabled,
        } => {
            let now = strmsync_core::SystemClock.now_ms();
            let data_server = DataServer {
                id: id.map(DataServerId::new).unwrap_or_else(DataServerId::generate),
                name,
                kind: kind.into(),
                host,
                port,
                credentials: Vec::new(),
                options: serde_json::json!({}),
                enabled: !disabled,
                created_at_ms: now,
                updated_at_ms: now,
            };
            let saved = client.data_server_upsert(data_server).await?;
            match format {
                OutputFormat::Json => output::print_json(&saved),
                OutputFormat::Text => {
                    println!("saved data server {} ({})", saved.name, saved.id);
                    Ok(())
                }
            }
        }
        DataServerCommand::List => {
            let items = client.data_server_list().await?;
            match format {
                OutputFormat::Json => output::print_json(&items),
                OutputFormat::Text => {
                    let mut table = Table::new(vec![
                        Column::left("ID"),
                        Column::left("NAME"),
                        Column::left("KIND"),
                        Column::left("HOST"),
                        Column::status("ENABLED"),
                    ]);
                    for ds in &items {
                        table.row(vec![
                            ds.id.short(8).to_string(),
                            ds.name.clone(),
                            ds.kind.to_string(),
                            format!("{}:{}", ds.host, ds.port),
                            if ds.enabled { "enabled".into() } else { "disabled".into() },
                        ]);
                    }
                    table.render(&mut std::io::stdout());
                    Ok(())
                }
            }
        }
        DataServerCommand::Show { id } => {
            let ds = client.data_server_get(DataServerId::new(id)).await?;
            match ds {
                Some(ds) => {
                    output::print_json(&ds)?;
                    Ok(())
                }
                None => anyhow::bail!("data server not found"),
            }
        }
        DataServerCommand::Delete { id } => {
            client.data_server_delete(DataServerId::new(id)).await?;
            println!("deleted");
            Ok(())
        }
    }
}

async fn handle_media_server(
    command: MediaServerCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        MediaServerCommand::Upsert {
            id,
            name,
            host,
            port,
            disabled,
        } => {
            let now = strmsync_core::SystemClock.now_ms();
            let media_server = MediaServer {
                id: id
                    .map(MediaServerId::new)
                    .unwrap_or_else(MediaServerId::generate),
                name,
                host,
                port,
                credentials: Vec::new(),
                options: serde_json::json!({}),
                enabled: !disabled,
                created_at_ms: now,
                updated_at_ms: now,
            };
            let saved = client.media_server_upsert(media_server).await?;
            match format {
                OutputFormat::Json => output::print_json(&saved),
                OutputFormat::Text => {
                    println!("saved media server {} ({})", saved.name, saved.id);
                    Ok(())
                }
            }
        }
        MediaServerCommand::List => {
            let items = client.media_server_list().await?;
            output::print_json(&items)
        }
        MediaServerCommand::Show { id } => {
            let ms = client.media_server_get(MediaServerId::new(id)).await?;
            match ms {
                Some(ms) => output::print_json(&ms),
                None => anyhow::bail!("media server not found"),
            }
        }
        MediaServerCommand::Delete { id } => {
            client.media_server_delete(MediaServerId::new(id)).await?;
            println!("deleted");
            Ok(())
        }
    }
}

async fn handle_task(command: TaskCommand, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match command {
        TaskCommand::List { job, status } => {
            let tasks = client
                .task_list(job.map(JobId::new), status.map(Into::into))
                .await?;
            match format {
                OutputFormat::Json => output::print_json(&tasks),
                OutputFormat::Text => {
                    let mut table = Table::new(vec![
                        Column::left("ID"),
                        Column::left("JOB"),
                        Column::status("STATUS"),
                        Column::right("CREATED"),
                        Column::right("UPDATED"),
                        Column::right("FAILED"),
                    ]);
                    for t in &tasks {
                        table.row(vec![
                            t.id.short(8).to_string(),
                            t.job_id.short(8).to_string(),
                            t.status.to_string(),
                            t.progress.created.to_string(),
                            t.progress.updated.to_string(),
                            t.progress.failed.to_string(),
                        ]);
                    }
                    table.render(&mut std::io::stdout());
                    Ok(())
                }
            }
        }
        TaskCommand::Show { id } => {
            let task = client.task_get(TaskRunId::new(id)).await?;
            match task {
                Some(task) => output::print_json(&task),
                None => anyhow::bail!("task run not found"),
            }
        }
        TaskCommand::Cancel { id } => {
            client.task_cancel(TaskRunId::new(id)).await?;
            println!("cancel requested");
            Ok(())
        }
    }
}

async fn handle_setting(
    command: SettingCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        SettingCommand::Set { key, value } => {
            client.setting_set(key, value).await?;
            println!("saved");
            Ok(())
        }
        SettingCommand::Get { key } => {
            let setting = client.setting_get(key).await?;
            match setting {
                Some(s) => {
                    println!("{}", s.value);
                    Ok(())
                }
                None => anyhow::bail!("setting not found"),
            }
        }
        SettingCommand::List => {
            let settings = client.setting_list().await?;
            match format {
                OutputFormat::Json => output::print_json(&settings),
                OutputFormat::Text => {
                    let mut table = Table::new(vec![Column::left("KEY"), Column::left("VALUE")]);
                    for s in &settings {
                        table.row(vec![s.key.clone(), s.value.clone()]);
                    }
                    table.render(&mut std::io::stdout());
                    Ok(())
                }
            }
        }
    }
}
