//! IIoT assistant CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP gateway
//! - `ask`     — Single question or interactive chat
//! - `tools`   — List the tools offered to the model
//! - `doctor`  — Check configuration and connectivity
//! - `init`    — Write a default config file

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "iiot-assistant",
    about = "Conversational assistant for factory IIoT data",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (default: ~/.iiot-assistant/config.toml)
    #[arg(short, long, global = true, env = "IIOT_ASSISTANT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the assistant a question
    Ask {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session to use
        #[arg(short, long, default_value = iiot_assistant_core::DEFAULT_SESSION)]
        session: String,
    },

    /// List the tools offered to the model
    Tools,

    /// Check configuration and connectivity
    Doctor,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Secrets may live in a .env next to the binary's working directory
    dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask { message, session } => {
            commands::ask::run(config_path, message, session, cli.verbose).await?
        }
        Commands::Tools => commands::tools::run(config_path).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Init { force } => commands::init::run(config_path, force)?,
    }

    Ok(())
}
