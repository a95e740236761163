//! SignalHouse CLI (signalctl)
//!
//! Operator tool for the metadata-driven schema and feature-stream engine.
//!
//! ## Quick Start
//!
//! ```bash
//! # Define a category and its signals
//! signalctl category create motor --name "Induction motor" --database plant
//! signalctl signal add motor current --type numeric --unit A
//! signalctl signal add motor status --type string
//!
//! # Materialize the super-table, then provision an asset
//! signalctl category sync motor
//! signalctl asset create motor MOTOR001 --attr line=3
//!
//! # Register a feature and run it as a continuous query
//! signalctl feature register motor avg_current_1h.json
//! signalctl stream create motor avg_current_1h
//! signalctl stream deploy <task-id>
//! ```
//!
//! ## Configuration
//!
//! Settings come from `~/.signalhouse/config.toml` (or `--config` /
//! `SIGNALHOUSE_CONFIG`), overridden by `METADATA_STORE`, `TSDB_URL`,
//! `TSDB_USER` and `TSDB_PASSWORD`. With `[tsdb] url = "memory://"` the
//! engine lives inside the process and is gone when the command exits,
//! which is useful for dry runs.
//!
//! Results print as JSON on stdout; logs go to stderr (`RUST_LOG`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod format;

use commands::App;
use config::Config;

#[derive(Parser)]
#[command(name = "signalctl")]
#[command(about = "SignalHouse schema and feature-stream operator tool", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "SIGNALHOUSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Asset category commands
    Category {
        #[command(subcommand)]
        command: commands::CategoryCommands,
    },
    /// Signal definition commands
    Signal {
        #[command(subcommand)]
        command: commands::SignalCommands,
    },
    /// Asset provisioning commands
    Asset {
        #[command(subcommand)]
        command: commands::AssetCommands,
    },
    /// Feature definition commands
    Feature {
        #[command(subcommand)]
        command: commands::FeatureCommands,
    },
    /// Stream task commands
    Stream {
        #[command(subcommand)]
        command: commands::StreamCommands,
    },
    /// Show or write the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration (file plus environment)
    Show,
    /// Write a default config file, refusing to overwrite an existing one
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(
        metadata_store = %config.metadata_store,
        tsdb = %config.tsdb.url,
        "Configuration loaded"
    );

    if let Commands::Config { command } = cli.command {
        let path = cli.config.unwrap_or_else(Config::default_path);
        return match command {
            ConfigCommands::Show => format::print_json(&config),
            ConfigCommands::Init => {
                if path.exists() {
                    anyhow::bail!("Config file {} already exists", path.display());
                }
                Config::default().save(&path)?;
                format::print_success(&format!("Wrote {}", path.display()));
                Ok(())
            }
        };
    }

    let app = App::connect(&config).await?;

    match cli.command {
        Commands::Category { command } => {
            commands::category::handle_category_command(&app, command).await
        }
        Commands::Signal { command } => commands::signal::handle_signal_command(&app, command).await,
        Commands::Asset { command } => commands::asset::handle_asset_command(&app, command).await,
        Commands::Feature { command } => {
            commands::feature::handle_feature_command(&app, command).await
        }
        Commands::Stream { command } => commands::stream::handle_stream_command(&app, command).await,
        Commands::Config { .. } => Ok(()),
    }
}
