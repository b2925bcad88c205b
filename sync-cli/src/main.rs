//! # rowsync
//!
//! Command-line client for rowsync table stores.
//!
//! ## Commands
//!
//! - `init`: Create a session for a store
//! - `pull`: Fetch the latest snapshot or deltas
//! - `show`: Print the local rows
//! - `await`: Long-poll for remote changes
//! - `put`: Insert or update a row
//! - `delete`: Delete a row
//!
//! ## Example
//!
//! ```bash
//! # Create a session for a store the authority knows as S3PZkSHSN5hdl48RWCXMPHOeBVv92A
//! rowsync init --handle S3PZkSHSN5hdl48RWCXMPHOeBVv92A
//!
//! # Fetch the current rows
//! rowsync pull
//!
//! # Add a row and push it
//! rowsync put --table tasks --json '{"title": "write report", "tags": ["work"]}'
//!
//! # Print what we have
//! rowsync show --table tasks
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{await_deltas, delete, init, pull, put, show};
use config::Config;

/// Command-line client for rowsync table stores.
#[derive(Parser, Debug)]
#[command(name = "rowsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the session file and default config
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: rowsync.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a session for a store
    Init {
        /// Local name of the store
        #[arg(long, default_value = "default")]
        id: String,

        /// Handle the authority assigned to the store
        #[arg(long)]
        handle: String,
    },

    /// Fetch the latest snapshot or deltas
    Pull,

    /// Print the local rows
    Show {
        /// Only show this table
        #[arg(long, short)]
        table: Option<String>,
    },

    /// Wait for remote changes and apply them
    Await,

    /// Insert or update a row and push it
    Put {
        /// Table to write to
        #[arg(long, short)]
        table: String,

        /// Row as a JSON object; an existing "id" updates that row
        #[arg(long)]
        json: String,
    },

    /// Delete a row and push the deletion
    Delete {
        /// Table the row is in
        #[arg(long, short)]
        table: String,

        /// Row id
        #[arg(long)]
        row: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config = Config::resolve(cli.config.as_deref(), &data_dir)?;

    match cli.command {
        Commands::Init { id, handle } => {
            init::run(&data_dir, &id, &handle).await?;
        }
        Commands::Pull => {
            pull::run(&data_dir, config.transport()?, &config).await?;
        }
        Commands::Show { table } => {
            show::run(&data_dir, table.as_deref()).await?;
        }
        Commands::Await => {
            await_deltas::run(&data_dir, config.transport()?, &config).await?;
        }
        Commands::Put { table, json } => {
            put::run(&data_dir, config.transport()?, &config, &table, &json).await?;
        }
        Commands::Delete { table, row } => {
            delete::run(&data_dir, config.transport()?, &config, &table, &row).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for rowsync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "rowsync", "rowsync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
