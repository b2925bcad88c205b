//! Bring the local replica up to date.

use anyhow::{Context, Result};
use rowsync_client::Transport;
use std::path::Path;
use tracing::info;

use super::{open, persist};
use crate::config::Config;

/// Run the pull command.
pub async fn run<T: Transport>(data_dir: &Path, transport: T, config: &Config) -> Result<()> {
    let mut session = open(data_dir, transport, config).await?;
    let before = session.revision();

    println!("Pulling store {} from revision {}...", session.id(), before);
    session.pull().await.context("Pull failed")?;
    persist(&session, data_dir).await?;
    info!(store = %session.id(), from = %before, rev = %session.revision(), "pull finished");

    if session.revision() == before {
        println!("Already up to date.");
    } else {
        println!("Now at revision {}.", session.revision());
    }
    Ok(())
}
