//! Create a session for a store.

use anyhow::{Context, Result};
use rowsync_core::Replica;
use rowsync_types::Handle;
use std::path::Path;

use crate::config::{self, SESSION_FILE};

/// Run the init command.
pub async fn run(data_dir: &Path, id: &str, handle: &str) -> Result<()> {
    if config::session_exists(data_dir) {
        anyhow::bail!(
            "Session already initialized at {}. Delete it to start over.",
            data_dir.join(SESSION_FILE).display()
        );
    }

    let replica = Replica::new(id, Handle::new(handle));
    let saved = serde_json::to_value(replica.save()).context("Failed to serialize session")?;
    config::save_session(data_dir, &saved).await?;

    println!("Session initialized!");
    println!("  Store:  {}", id);
    println!("  Handle: {}", handle);
    println!();
    println!("Next step: run 'rowsync pull' to fetch the current snapshot.");

    Ok(())
}
