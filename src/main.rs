mod api;
mod app;
mod auth;
mod commands;
mod config;
mod error;
mod events;
mod poller;
mod relay;
mod scanner;
mod session;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use api::{ApiClient, ReqwestTransport};
use app::App;
use commands::{handle_command, Command};
use config::Settings;
use session::FileSessionStore;

const DEFAULT_LOG_FILTER: &str = "smartchain=info";

#[derive(Parser, Debug)]
#[command(name = "smartchain")]
#[command(about = "Terminal dashboard for SmartChain warehouse stock and QR scan intake", long_about = None)]
struct Args {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let settings = args.settings;

    let tui_mode = matches!(args.command, None | Some(Command::Dashboard));
    init_tracing(&settings, tui_mode)?;

    let session = Arc::new(FileSessionStore::open(settings.session_path()?));
    let transport = Arc::new(ReqwestTransport::new(settings.timeout)?);
    let client = ApiClient::new(settings.api_url.clone(), transport, session);

    match args.command {
        // Dashboard/TUI mode (default)
        Some(Command::Dashboard) | None => run_tui(client, settings).await?,

        // One-shot and streaming commands (non-TUI)
        Some(cmd) => handle_command(cmd, &client, &settings).await?,
    }

    Ok(())
}

/// The dashboard owns the terminal, so its logs go to a file. Commands log to stderr.
fn init_tracing(settings: &Settings, tui_mode: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if tui_mode {
        let path = settings.log_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    Ok(())
}

async fn run_tui(client: ApiClient, settings: Settings) -> Result<()> {
    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create and run app
    let mut app = App::new(client, settings);
    let res = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
