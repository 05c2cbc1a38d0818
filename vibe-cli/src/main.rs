mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;

#[derive(Parser)]
#[command(name = "vibe")]
#[command(version)]
#[command(about = "Launch a collaborative vibe session against the local or remote service")]
#[command(
    help_template = "{name} - {version}\n{about}\n\n{usage-heading}\n  {usage}\n\n{all-args}{options}\n"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which client mode the current environment selects
    ///
    /// FLUID_CLIENT takes precedence over --client. The remote client needs
    /// AZURE_CLIENT_ID, AZURE_REDIRECT_URI, AZURE_TENANT_ID,
    /// AZURE_FUNCTION_TOKEN_PROVIDER_URL and AZURE_ORDERER.
    Mode {
        /// Requested client ("local" forces the development service)
        #[arg(long)]
        client: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Open a session and keep it until Ctrl-C
    ///
    /// Examples:
    ///   vibe start
    ///   vibe start --container 4f1c0e2a --user-name "Ada"
    ///   FLUID_CLIENT=local vibe start --timeout 30
    Start {
        /// Requested client ("local" forces the development service)
        #[arg(long)]
        client: Option<String>,

        /// Attach to an existing container instead of creating one
        #[arg(long)]
        container: Option<String>,

        /// Display name of the signed-in user
        #[arg(long)]
        user_name: Option<String>,

        /// Stable id of the signed-in user
        #[arg(long)]
        user_id: Option<String>,

        /// Give up connecting after this many seconds (0 = wait forever)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Path to configuration file
        #[arg(long, default_value = "~/.config/vibe/config.toml")]
        config_file: String,
    },

    /// Write a configuration file with default values
    Config {
        /// Create or refresh the configuration file
        #[arg(long)]
        init: bool,

        /// Path to configuration file
        #[arg(long, default_value = "~/.config/vibe/config.toml")]
        config_file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env never override variables already set
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mode { client, json } => {
            handlers::handle_mode(client, json)?;
        }
        Commands::Start {
            client,
            container,
            user_name,
            user_id,
            timeout,
            config_file,
        } => {
            handlers::handle_start(handlers::StartOptions {
                client,
                container,
                user_name,
                user_id,
                timeout,
                config_file,
            })
            .await?;
        }
        Commands::Config { init, config_file } => {
            if init {
                handlers::handle_config_init(config_file)?;
            } else {
                println!("Config command requires --init flag");
                println!("Usage: vibe config --init [--config-file PATH]");
            }
        }
    }

    Ok(())
}
