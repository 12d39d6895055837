//! stackdeck - durable event log, offline action queue and session replay
//!
//! ## Usage
//!
//! ```bash
//! # Run the status API and background sync
//! stackdeck serve
//!
//! # Queue an action while the console is offline
//! stackdeck --offline queue enqueue '{"op":"restart","service":"api"}'
//!
//! # Deliver everything that is queued
//! stackdeck queue drain
//!
//! # Replay a recorded terminal session at double speed
//! stackdeck replay <session-id> --speed 2
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use stackdeck::session::{EntryType, ReplayState};
use stackdeck::web::{run_server, ServerConfig};
use stackdeck::{util, Config, EventLogStore, SessionTape, StackdeckCore};

/// Durable event log, offline action queue and terminal session replay
#[derive(Parser)]
#[command(name = "stackdeck")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to ~/.stackdeck)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Treat the network as unreachable for this invocation
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the status API with background queue sync
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect and deliver the offline action queue
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Inspect raw event logs
    Log {
        #[command(subcommand)]
        command: LogCommand,
    },
    /// Move recorded sessions in and out of JSONL tapes
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Replay a recorded session, paced by its timestamps
    Replay {
        /// Session ID
        id: String,
        /// Playback speed multiplier
        #[arg(short, long, default_value_t = 1.0)]
        speed: f64,
    },
}

#[derive(Subcommand)]
enum QueueCommand {
    /// List actions awaiting delivery
    List,
    /// Queue an action (JSON payload)
    Enqueue { payload: String },
    /// Attempt delivery of every queued action
    Drain,
    /// Drop a queued action without delivering it
    Remove { id: String },
}

#[derive(Subcommand)]
enum LogCommand {
    /// List log keys
    Keys,
    /// Print every event of a log as JSON lines
    Show { key: String },
    /// Delete a log
    Clear { key: String },
    /// Apply the retention policy to a log now
    Compact { key: String },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Write a session log to a JSONL tape (defaults to ~/.stackdeck/tapes/<id>.jsonl)
    Export { id: String, path: Option<PathBuf> },
    /// Append a JSONL tape into a session log
    Import { id: String, path: PathBuf },
}

fn init_logging() -> Result<()> {
    // Initialize logging to file (~/.stackdeck/logs/stackdeck.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());
    init_logging()?;

    let config = Config::load();
    let core = StackdeckCore::new(config);
    if cli.offline {
        core.connectivity().set_online(false);
    }

    match cli.command {
        Commands::Serve { port } => cmd_serve(&core, port).await,
        Commands::Queue { command } => cmd_queue(&core, command).await,
        Commands::Log { command } => cmd_log(&core, command),
        Commands::Session { command } => cmd_session(&core, command),
        Commands::Replay { id, speed } => cmd_replay(&core, &id, speed).await,
    }
}

async fn cmd_serve(core: &StackdeckCore, port: Option<u16>) -> Result<()> {
    let mut server_config = ServerConfig::from(&core.config().server);
    if let Some(port) = port {
        server_config.port = port;
    }

    let services = core.start_services();
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    println!(
        "Serving status API on http://{}:{}",
        server_config.host, server_config.port
    );
    let result = run_server(core.web_state(), server_config, shutdown).await;
    services.shutdown().await;
    result
}

async fn cmd_queue(core: &StackdeckCore, command: QueueCommand) -> Result<()> {
    let queue = core.queue();
    match command {
        QueueCommand::List => {
            let actions = queue.pending();
            if actions.is_empty() {
                println!("Queue is empty");
            }
            for action in actions {
                println!("{}", serde_json::to_string(&action)?);
            }
        }
        QueueCommand::Enqueue { payload } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("payload must be valid JSON")?;
            let action = queue.enqueue(payload).await;
            println!("{}", serde_json::to_string(&action)?);
        }
        QueueCommand::Drain => {
            let report = queue.drain().await;
            println!(
                "sent {}, failed {}, remaining {}",
                report.sent(),
                report.failed(),
                queue.size()
            );
            for outcome in report.outcomes.iter().filter(|o| !o.is_sent()) {
                if let Some(error) = &outcome.error {
                    println!("  {}: {}", outcome.id, error);
                }
            }
        }
        QueueCommand::Remove { id } => {
            if !queue.remove(&id) {
                bail!("no queued action with id {id}");
            }
            println!("Removed {id}");
        }
    }
    Ok(())
}

fn cmd_log(core: &StackdeckCore, command: LogCommand) -> Result<()> {
    let store = core.store();
    match command {
        LogCommand::Keys => {
            for key in store.keys() {
                println!("{key}\t{}", store.read(&key).len());
            }
        }
        LogCommand::Show { key } => {
            for event in store.read(&key) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        LogCommand::Clear { key } => {
            store.clear(&key);
            println!("Cleared {key}");
        }
        LogCommand::Compact { key } => {
            let evicted = store.compact(&key);
            println!("Evicted {evicted} events from {key}");
        }
    }
    Ok(())
}

fn cmd_session(core: &StackdeckCore, command: SessionCommand) -> Result<()> {
    let store = core.store();
    match command {
        SessionCommand::Export { id, path } => {
            let tape = SessionTape::export(store.as_ref(), &id);
            if tape.events.is_empty() {
                bail!("session {id} has no recorded events");
            }
            let path = match path {
                Some(path) => path,
                None => {
                    fs::create_dir_all(util::tapes_dir())?;
                    util::tapes_dir().join(format!("{id}.jsonl"))
                }
            };
            tape.write_jsonl_to_path(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported {} events to {}", tape.events.len(), path.display());
        }
        SessionCommand::Import { id, path } => {
            let tape = SessionTape::read_jsonl_from_path(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let added = tape.import_into(store.as_ref(), &id);
            println!("Imported {added} new events into session {id}");
        }
    }
    Ok(())
}

async fn cmd_replay(core: &StackdeckCore, id: &str, speed: f64) -> Result<()> {
    let replayer = core.replayer();
    match replayer.load(id, None).await {
        ReplayState::Ready { .. } => {}
        ReplayState::Empty => bail!("session {id} has no recorded events"),
        ReplayState::Error { message } => bail!("failed to load session {id}: {message}"),
        other => bail!("session {id} did not load: {other:?}"),
    }

    let events = replayer.events();
    let mut cursor_rx = replayer.subscribe();
    let _playback = replayer.play(speed)?;

    let mut printed = 0;
    loop {
        let cursor = *cursor_rx.borrow_and_update();
        let end = cursor.position.min(events.len());
        if end > printed {
            for entry in &events[printed..end] {
                match entry.entry_type {
                    EntryType::Command => println!("$ {}", entry.data),
                    _ => print!("{}", entry.data),
                }
            }
            printed = end;
        }
        if !cursor.playing {
            break;
        }
        if cursor_rx.changed().await.is_err() {
            break;
        }
    }
    println!();
    Ok(())
}
