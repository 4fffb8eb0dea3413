// ABOUTME: Main entry point for the manifold CLI
// Runs one bridged tool session with journal capture, or inspects and exports the journal

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use manifold::app::{App, AppHandle};
use manifold::config::AppConfig;
use manifold::session::{HostEvent, SessionSpec};
use manifold::tools::ToolKind;
use std::io::{Read, Write};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Ctrl+Q detaches from the session
const DETACH_BYTE: u8 = 0x11;

#[derive(Parser)]
#[command(name = "manifold", version, about = "Run AI coding CLI sessions with a passive activity journal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a tool session in a directory and attach this terminal to it
    Run(RunArgs),
    /// Inspect or export the activity journal
    Journal {
        #[command(subcommand)]
        action: JournalAction,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// claude, codex, or gemini (defaults to the configured tool)
    #[arg(long)]
    tool: Option<ToolKind>,
    /// Conversation id to resume
    #[arg(long)]
    resume: Option<String>,
    /// Typed into the tool once it is ready for input
    #[arg(long)]
    prompt: Option<String>,
    /// Project label used in the journal (defaults to the directory name)
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    name: Option<String>,
}

#[derive(Subcommand)]
enum JournalAction {
    /// List dates that have journal entries, newest first
    Dates,
    /// Print one day's journal
    Read { date: String },
    /// Recap of the last seven days
    Weekly {
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the report as JSON ({markdown, start_date, end_date})
        #[arg(long)]
        json: bool,
    },
    /// Summarize captured activity now
    Flush,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging()?;
    setup_panic_handler();

    let config = AppConfig::load()?;
    info!("Journal root: {}", config.journal_dir.display());

    let (app, handle) = App::new(config);
    let coordinator = app.spawn();

    let result = match cli.command {
        Commands::Run(args) => run_session(&handle, args).await,
        Commands::Journal { action } => run_journal(&handle, action).await,
    };

    if let Err(e) = handle.shutdown().await {
        warn!("Shutdown request failed: {}", e);
    }
    let _ = coordinator.await;
    result
}

async fn run_journal(handle: &AppHandle, action: JournalAction) -> Result<()> {
    match action {
        JournalAction::Dates => {
            for date in handle.list_journal_dates() {
                println!("{}", date);
            }
        }
        JournalAction::Read { date } => match handle.read_journal(&date) {
            Some(text) => print!("{}", text),
            None => anyhow::bail!("No journal for {}", date),
        },
        JournalAction::Weekly { out, json } => {
            let report = handle.weekly_export().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            match out {
                Some(path) => {
                    std::fs::write(&path, &report.markdown)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "Wrote weekly report {} to {} into {}",
                        report.start_date,
                        report.end_date,
                        path.display()
                    );
                }
                None => print!("{}", report.markdown),
            }
        }
        JournalAction::Flush => handle.flush_journal_now().await?,
    }
    Ok(())
}

async fn run_session(handle: &AppHandle, args: RunArgs) -> Result<()> {
    let dir = args
        .dir
        .canonicalize()
        .with_context(|| format!("No such directory: {}", args.dir.display()))?;
    let group = args.group.or_else(|| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
    });

    let mut events = handle.subscribe();
    let spec = SessionSpec {
        working_dir: dir,
        tool: args.tool,
        conversation_id: args.resume,
        initial_prompt: args.prompt,
        group,
        name: args.name,
    };
    let id = handle.create_session(spec).await?;
    if let Ok((cols, rows)) = crossterm::terminal::size() {
        handle.resize(id, cols, rows).await?;
    }

    enable_raw_mode().context("Terminal does not support raw mode")?;
    let bridged = bridge_terminal(handle, id, &mut events).await;
    let _ = disable_raw_mode();
    bridged?;

    handle.flush_journal_now().await?;
    match handle.conversation_id(id).await? {
        Some(conversation_id) => println!("\r\nConversation: {}", conversation_id),
        None => println!("\r\nNo conversation id was recorded"),
    }
    handle.destroy_session(id).await?;
    Ok(())
}

async fn bridge_terminal(
    handle: &AppHandle,
    id: uuid::Uuid,
    events: &mut broadcast::Receiver<HostEvent>,
) -> Result<()> {
    let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];
        while let Ok(n) = stdin.read(&mut buf) {
            if n == 0 || stdin_tx.send(buf[..n].to_vec()).is_err() {
                break;
            }
        }
    });

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            input = stdin_rx.recv() => {
                let Some(input) = input else { break };
                if let Some(pos) = input.iter().position(|b| *b == DETACH_BYTE) {
                    if pos > 0 {
                        handle.send_input(id, input[..pos].to_vec()).await?;
                    }
                    info!("Detached from session {}", id);
                    break;
                }
                handle.send_input(id, input).await?;
            }
            event = events.recv() => match event {
                Ok(HostEvent::Output { id: from, data }) if from == id => {
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
                Ok(HostEvent::Exited { id: from, .. }) if from == id => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Terminal fell behind by {} events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn setup_logging() -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = AppConfig::state_dir().join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("manifold.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manifold=info".into()),
        )
        .init();
    Ok(())
}

fn setup_panic_handler() {
    use tracing::error;

    std::panic::set_hook(Box::new(|panic_info| {
        // Restore the terminal before reporting
        let _ = disable_raw_mode();
        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
