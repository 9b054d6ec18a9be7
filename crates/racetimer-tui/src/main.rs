mod app;
mod ui;

use anyhow::Result;
use app::{Action, App, Role};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use racetimer_client::store::{RosterStore, StoreUpdate};
use racetimer_client::sync::CommandEvent;
use racetimer_client::{ClockOffsetService, StoreClient, TimerCommandHandler, TimerSyncEngine};
use racetimer_core::{
    clock::SystemClock,
    models::Config,
    storage::{ConfigStorage, get_config_dir},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tracing::info;

fn setup_logging() -> Result<()> {
    let mut log_path = std::env::temp_dir();
    log_path.push("racetimer-tui.log");

    let log_file = std::fs::File::create(log_path)?;
    let subscriber = tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter("racetimer_tui=trace,racetimer_client=debug")
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn setup_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
        let _ = crossterm::execute!(std::io::stdout(), crossterm::cursor::Show);

        tracing::error!(?panic_info, "Application panicked");

        eprintln!("A fatal error occurred: {}", panic_info);

        original_hook(panic_info);
    }));
}

#[derive(Parser, Debug)]
#[command(name = "racetimer")]
#[command(about = "RaceTimer TUI - shared race stopwatch", long_about = None)]
struct Args {
    /// Socket path of the daemon (defaults to the configured path)
    #[arg(short, long)]
    socket: Option<String>,

    #[arg(short, long, value_enum, default_value = "viewer")]
    role: Role,
}

fn load_config() -> Config {
    match ConfigStorage::new(get_config_dir()).load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default configuration: {}", e);
            Config::default()
        }
    }
}

/// Make sure a daemon answers on the socket, starting one if needed
async fn ensure_daemon(client: &StoreClient) -> Result<()> {
    if client.server_time().await.is_ok() {
        return Ok(());
    }

    eprintln!("RaceTimer daemon not running. Starting it...");

    let mut child = tokio::process::Command::new("racetimerd")
        .arg("--socket")
        .arg(client.socket_path())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to start daemon: {}. Ensure 'racetimerd' is in your PATH or start it manually",
                e
            )
        })?;

    eprintln!("✓ Daemon started (PID: {})", child.id().unwrap_or(0));
    tokio::time::sleep(Duration::from_millis(500)).await;

    if let Err(e) = client.server_time().await {
        let _ = child.kill().await;
        anyhow::bail!("Failed to connect to daemon after starting: {}", e);
    }

    Ok(())
}

async fn next_command_event(
    events: &mut Option<broadcast::Receiver<CommandEvent>>,
) -> Option<CommandEvent> {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };

    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Missed {} command events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Run an action without blocking the draw loop
fn execute_action(
    action: Action,
    commands: Option<&Arc<TimerCommandHandler>>,
    client: &Arc<StoreClient>,
    status_tx: &mpsc::UnboundedSender<String>,
) {
    info!(?action, "Executing action");

    match action {
        Action::Start | Action::Stop | Action::Reset(_) => {
            let Some(commands) = commands.cloned() else {
                return;
            };
            // Outcomes are reported through command events
            tokio::spawn(async move {
                let _ = match action {
                    Action::Start => commands.start().await,
                    Action::Stop => commands.stop().await,
                    Action::Reset(confirmation) => commands.reset(confirmation).await,
                    _ => return,
                };
            });
        }
        Action::AddDriver(entry) => {
            let client = client.clone();
            let status_tx = status_tx.clone();
            tokio::spawn(async move {
                let name = entry.name.clone();
                let message = match client.push_entry(entry).await {
                    Ok(_) => format!("Added {}", name),
                    Err(e) => format!("Could not add driver: {}", e),
                };
                let _ = status_tx.send(message);
            });
        }
        Action::DeleteDriver(key) => {
            let client = client.clone();
            let status_tx = status_tx.clone();
            tokio::spawn(async move {
                let message = match client.remove_entry(&key).await {
                    Ok(true) => "Driver removed".to_string(),
                    Ok(false) => "Driver was already removed".to_string(),
                    Err(e) => format!("Could not remove driver: {}", e),
                };
                let _ = status_tx.send(message);
            });
        }
        Action::ClearRoster => {
            let client = client.clone();
            let status_tx = status_tx.clone();
            tokio::spawn(async move {
                let message = match client.remove_all().await {
                    Ok(count) => format!("Removed {} drivers", count),
                    Err(e) => format!("Could not clear roster: {}", e),
                };
                let _ = status_tx.send(message);
            });
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    setup_panic_hook();
    info!("RaceTimer TUI starting up");

    let args = Args::parse();
    let config = load_config();
    let socket_path = args
        .socket
        .unwrap_or_else(|| config.store.socket_path.clone());

    let client = Arc::new(StoreClient::new(socket_path));
    if let Err(e) = ensure_daemon(&client).await {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }

    let offsets = Arc::new(ClockOffsetService::new(
        client.clone(),
        Arc::new(SystemClock),
        Duration::from_millis(config.timer.offset_refresh_ms),
    ));
    let engine = Arc::new(TimerSyncEngine::new(
        offsets.clone(),
        Duration::from_millis(config.timer.tick_interval_ms),
    ));
    let mut display_rx = engine.subscribe();
    let engine_task = engine.attach(client.as_ref()).await?;
    let mut roster_rx = client.subscribe_roster().await?;

    let commands = match args.role {
        Role::Admin => Some(Arc::new(TimerCommandHandler::from_config(
            client.clone(),
            offsets.clone(),
            &config.timer,
        ))),
        Role::Viewer => None,
    };
    let mut command_events = commands.as_ref().map(|c| c.subscribe_events());
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<String>();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(args.role);
    app.set_display(*display_rx.borrow_and_update());

    let mut display_open = true;
    let mut roster_open = true;

    loop {
        terminal.draw(|f| ui::draw(f, &app))?;

        if app.should_quit {
            break;
        }

        tokio::select! {
            changed = display_rx.changed(), if display_open => {
                match changed {
                    Ok(()) => app.set_display(*display_rx.borrow_and_update()),
                    Err(_) => display_open = false,
                }
            }
            update = roster_rx.recv(), if roster_open => {
                match update {
                    Some(StoreUpdate::Value(roster)) => app.apply_roster(roster),
                    Some(StoreUpdate::Error(e)) => app.roster_unavailable(&e),
                    None => roster_open = false,
                }
            }
            Some(event) = next_command_event(&mut command_events) => {
                app.apply_command_event(event);
            }
            Some(message) = status_rx.recv() => {
                app.status_message = message;
            }
            _ = tokio::time::sleep(Duration::from_millis(16)) => {
                if event::poll(Duration::from_millis(0))? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if let Some(action) = app.handle_key(key.code) {
                                execute_action(action, commands.as_ref(), &client, &status_tx);
                            }
                        }
                        Event::Resize(width, height) => {
                            info!(width, height, "Terminal resized");
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    engine_task.abort();
    engine.stop_ticking().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}
