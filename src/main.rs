use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use defi_chat::{CompletionClient, Config};

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "defichat")]
#[command(about = "Chat with a DeFi assistant from your terminal")]
struct Cli {
    /// Model identifier sent with every request
    #[arg(short, long, global = true)]
    model: Option<String>,
    /// Chat completions endpoint URL
    #[arg(short, long, global = true)]
    endpoint: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Show the active configuration
    Config,
    /// Save the default model to the config file
    SetModel {
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = Config::load()?;
    if args.model.is_some() {
        config.model = args.model;
    }
    if args.endpoint.is_some() {
        config.endpoint = args.endpoint;
    }

    match args.command {
        None => {
            init_file_tracing(&config)?;
            run_tui(config.completion_client()).await
        }
        Some(Commands::Ask { question }) => {
            init_stderr_tracing(&config);
            cli::ask(config.completion_client(), &question).await
        }
        Some(Commands::Config) => cli::show_config(&config),
        Some(Commands::SetModel { model }) => {
            let path = Config::save_model(&model)?;
            println!("Default model set to {} in {}", model.bold().green(), path.display());
            Ok(())
        }
    }
}

fn env_filter(config: &Config) -> EnvFilter {
    let level = config.log_level.as_deref().unwrap_or("info");
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("defi_chat={level},defichat={level},warn")))
}

/// The TUI owns the terminal, so logs go to a file next to the config.
fn init_file_tracing(config: &Config) -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("defi-chat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .init();
}

async fn run_tui(client: CompletionClient) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(client);
    let mut events = EventHandler::new();

    tracing::info!(model = app.client.model(), "chat session started");
    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    let tx = events.sender();

    while !app.should_quit {
        app.follow_transcript();
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event, &tx)?,
            None => break,
        }
    }
    Ok(())
}
