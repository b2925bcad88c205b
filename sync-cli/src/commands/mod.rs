//! CLI command implementations.

pub mod await_deltas;
pub mod delete;
pub mod init;
pub mod pull;
pub mod put;
pub mod show;

use anyhow::{Context, Result};
use rowsync_client::{SyncSession, Transport};
use std::path::Path;

use crate::config::{self, Config};

/// Restore the saved session, talking to the authority through `transport`.
pub async fn open<T: Transport>(
    data_dir: &Path,
    transport: T,
    config: &Config,
) -> Result<SyncSession<T>> {
    let saved = config::load_session(data_dir).await?;
    SyncSession::hydrate(saved, transport, config.sync_config()).context("Invalid session file")
}

/// Write the session back to the data directory.
pub async fn persist<T: Transport>(session: &SyncSession<T>, data_dir: &Path) -> Result<()> {
    let saved = session.save().context("Failed to serialize session")?;
    config::save_session(data_dir, &saved).await
}
