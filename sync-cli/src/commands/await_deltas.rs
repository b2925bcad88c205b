//! Long-poll the authority for remote changes.

use anyhow::{Context, Result};
use rowsync_client::{AwaitOutcome, Transport};
use std::path::Path;
use tracing::{debug, info};

use super::{open, persist};
use crate::config::Config;

/// Run the await command.
///
/// Blocks until the authority reports new deltas or the long-poll times out.
pub async fn run<T: Transport>(data_dir: &Path, transport: T, config: &Config) -> Result<()> {
    let mut session = open(data_dir, transport, config).await?;

    println!(
        "Waiting for changes to store {} after revision {}...",
        session.id(),
        session.revision()
    );
    match session.await_deltas().await.context("Await failed")? {
        AwaitOutcome::Changed => {
            persist(&session, data_dir).await?;
            info!(store = %session.id(), rev = %session.revision(), "remote changes applied");
            println!("Now at revision {}.", session.revision());
        }
        AwaitOutcome::Unchanged => {
            debug!(store = %session.id(), "await ended without changes");
            println!("No changes.");
        }
    }
    Ok(())
}
