//! RaceTimer Store Daemon
//!
//! Hosts the shared stopwatch record, the roster and the reference clock.

use anyhow::Result;
use clap::Parser;
use racetimer_core::{
    clock::SystemClock,
    models::Config,
    storage::{get_config_dir, init_data_dir, ConfigStorage, SnapshotStorage},
};
use racetimer_daemon::{ApiHandler, EventManager, IpcServer, RealtimeStore};
use std::fs;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "racetimerd")]
#[command(about = "RaceTimer daemon - shared stopwatch store", long_about = None)]
struct Args {
    /// Socket path for IPC (defaults to the configured path)
    #[arg(short, long)]
    socket: Option<String>,

    /// Log level (defaults to the configured level)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Keep state in memory only
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigStorage::new(get_config_dir()).load()?;
    let socket_path = args
        .socket
        .clone()
        .unwrap_or_else(|| config.store.socket_path.clone());
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.store.log_level.clone());

    // Initialize data directory and log file
    let data_dir = init_data_dir()?;
    let log_file_path = data_dir.join("daemon.log");

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    // Write to both file and stdout
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    let stdout_writer = std::io::stdout.with_max_level(tracing::Level::INFO);
    let file_writer = log_file.with_max_level(tracing::Level::DEBUG);

    tracing_subscriber::fmt()
        .with_writer(stdout_writer.and(file_writer))
        .with_env_filter(log_level.as_str())
        .with_ansi(false)
        .init();

    tracing::info!("RaceTimer daemon starting...");
    tracing::info!("Socket path: {}", socket_path);
    tracing::info!("Log file: {}", log_file_path.display());

    let event_manager = Arc::new(EventManager::new());
    let store = Arc::new(create_store(
        &args,
        &config,
        event_manager.clone(),
        data_dir,
    )?);
    tracing::info!("Realtime store initialized");

    let api_handler = Arc::new(ApiHandler::new(event_manager, store));
    let ipc_server = Arc::new(IpcServer::new(socket_path, api_handler));

    let server_handle = {
        let server = ipc_server.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                tracing::error!("IPC server error: {}", e);
            }
        })
    };

    tracing::info!("Daemon ready and listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    server_handle.abort();

    Ok(())
}

fn create_store(
    args: &Args,
    config: &Config,
    event_manager: Arc<EventManager>,
    data_dir: std::path::PathBuf,
) -> Result<RealtimeStore> {
    let clock = Arc::new(SystemClock);

    if args.ephemeral || !config.store.persist {
        tracing::info!("Persistence disabled, state is kept in memory");
        return Ok(RealtimeStore::in_memory(event_manager, clock));
    }

    let storage = SnapshotStorage::new(data_dir);
    Ok(RealtimeStore::new(event_manager, storage, clock)?)
}
