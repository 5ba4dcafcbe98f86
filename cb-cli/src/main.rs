//! Chatbase CLI - Command-line client for the Chatbase backend.
//!
//! Signs in, opens private chats, sends and lists messages, watches a chat
//! live, and checks how the navigation guards treat a path. Sessions are
//! kept on disk between invocations.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use cb_core::config::{AppConfig, ConfigHandle};
use cb_core::error::CbResult;
use cb_core::logging;

/// Chatbase - private chats over a hosted Postgres backend.
#[derive(Parser)]
#[command(
    name = "chatbase",
    version,
    about = "Chatbase chat client CLI",
    long_about = "A command-line client for Chatbase.\n\
                  Sign in, open private chats, and send or watch messages from the terminal."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign up, sign in, and manage the current session.
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Find, open, and inspect private chats.
    Chats {
        #[command(subcommand)]
        action: commands::chats::ChatsAction,
    },
    /// List, send, and watch messages.
    Messages {
        #[command(subcommand)]
        action: commands::messages::MessagesAction,
    },
    /// Show where navigating to a path would end up.
    Route {
        /// Path such as `/chat/42` or `/sign-in`.
        path: String,
    },
    /// View and edit the configuration file.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn load_config(path: Option<&PathBuf>) -> CbResult<(AppConfig, PathBuf)> {
    let path = match path {
        Some(p) => p.clone(),
        None => AppConfig::default_config_path()?,
    };
    let mut config = if path.exists() {
        AppConfig::load_from_file(&path)?
    } else {
        AppConfig::default()
    };
    config.apply_env_overrides();
    Ok((config, path))
}

#[tokio::main]
async fn main() -> CbResult<()> {
    let cli = Cli::parse();

    // A missing .env is fine
    let dotenv = dotenvy::dotenv().ok();

    let (mut config, config_path) = load_config(cli.config.as_ref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    let log_dir = config.effective_log_dir()?;
    let _guard = logging::init_logging(&config.logging, &log_dir)?;

    info!("Chatbase CLI v{}", cb_core::constants::APP_VERSION);
    if let Some(env_path) = dotenv {
        debug!("loaded environment from {}", env_path.display());
    }

    let config_handle = ConfigHandle::new(config);

    match cli.command {
        Commands::Auth { action } => commands::auth::run(config_handle, action, cli.format).await,
        Commands::Chats { action } => commands::chats::run(config_handle, action, cli.format).await,
        Commands::Messages { action } => {
            commands::messages::run(config_handle, action, cli.format).await
        }
        Commands::Route { path } => commands::route::run(config_handle, &path, cli.format).await,
        Commands::Config { action } => {
            commands::config::run(config_handle, config_path, action, cli.format).await
        }
    }
}
