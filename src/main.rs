mod commands;
mod config;
mod error;
mod events;
mod llm;
mod logger;
mod memory;
mod prompts;
mod session;
mod settings;
mod storage;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::llm::{EchoGenerator, HubClient, TextGenerator};
use crate::logger::LogTarget;
use crate::session::ChatSession;
use crate::storage::StorageManager;

#[derive(Parser)]
#[command(name = "falcon-chat")]
#[command(version)]
#[command(about = "Chat with Falcon-7B-Instruct from the terminal", long_about = None)]
struct Cli {
    /// Use a local echo generator instead of the hosted model
    #[arg(long, global = true)]
    offline: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Config file (defaults to ~/.falcon-chat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask { text: String },
    /// Manage stored chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Show the resolved configuration
    Config {
        /// Write a config file with the current values if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// Print every stored session
    List,
    /// Delete every stored session
    Clear,
    /// Write stored sessions to a text file
    Export { path: Option<PathBuf> },
}

fn build_generator(config: &Config, offline: bool) -> Result<Arc<dyn TextGenerator>> {
    if offline {
        return Ok(Arc::new(EchoGenerator));
    }
    let token = config.require_api_token()?;
    let client = HubClient::new(config, token)?;
    info!(endpoint = client.endpoint(), "using hosted inference");
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let storage = StorageManager::new(
        config.stored_sessions_path(),
        std::env::current_dir().context("Failed to read current directory")?,
    );

    match cli.command {
        None => {
            logger::init(&cli.log_level, LogTarget::File(&config.log_path()))?;
            info!(repo = %config.repo_id, offline = cli.offline, "starting chat");

            let generator = build_generator(&config, cli.offline)?;
            let session = ChatSession::new(config.prompt_template()?, config.settings)
                .with_stored(storage.load_stored()?);
            let app = ui::App::new(session, generator, storage, ui::Avatars::random());
            ui::run(app).await
        }
        Some(command) => {
            logger::init(&cli.log_level, LogTarget::Stderr)?;
            match command {
                Commands::Ask { text } => {
                    let generator = build_generator(&config, cli.offline)?;
                    commands::ask(&config, generator.as_ref(), &text).await
                }
                Commands::Sessions { action } => match action {
                    SessionsAction::List => commands::list_sessions(&storage),
                    SessionsAction::Clear => commands::clear_sessions(&storage),
                    SessionsAction::Export { path } => {
                        commands::export_sessions(&storage, path.as_deref())
                    }
                },
                Commands::Config { init } => {
                    if init && !config.config_path.exists() {
                        config.save()?;
                        println!("Wrote {}", config.config_path.display());
                    }
                    commands::show_config(&config);
                    Ok(())
                }
            }
        }
    }
}
