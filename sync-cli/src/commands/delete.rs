//! Delete a row and push the deletion.

use anyhow::{Context, Result};
use rowsync_client::Transport;
use std::path::Path;
use tracing::{info, warn};

use super::{open, persist};
use crate::config::Config;

/// Run the delete command.
pub async fn run<T: Transport>(
    data_dir: &Path,
    transport: T,
    config: &Config,
    table_id: &str,
    row_id: &str,
) -> Result<()> {
    let mut session = open(data_dir, transport, config).await?;
    session.pull().await.context("Pull failed")?;

    let applied = session
        .transaction()
        .run(|s| {
            if !s.table(table_id).remove(row_id) {
                anyhow::bail!("Row {} not found in table {}", row_id, table_id);
            }
            Ok::<(), anyhow::Error>(())
        })
        .await?;
    persist(&session, data_dir).await?;

    if !applied {
        warn!(
            store = %session.id(),
            table = table_id,
            attempts = config.sync.max_retries,
            "giving up on conflicted push"
        );
        anyhow::bail!(
            "Push conflicted {} time(s); the row was not deleted. Try again.",
            config.sync.max_retries
        );
    }
    info!(
        store = %session.id(),
        table = table_id,
        row = row_id,
        rev = %session.revision(),
        "row deleted"
    );
    println!(
        "Deleted row {} from {} at revision {}.",
        row_id,
        table_id,
        session.revision()
    );
    Ok(())
}
