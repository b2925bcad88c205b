//! Insert or update a row and push it.

use anyhow::{Context, Result};
use rowsync_client::Transport;
use rowsync_core::{Document, IdPolicy, Record, RowTable};
use std::path::Path;
use tracing::{info, warn};

use super::{open, persist};
use crate::config::Config;

/// Run the put command.
///
/// `json` is a plain JSON object. If its `"id"` names an existing row the
/// listed fields are updated (a `null` deletes a field); otherwise a new row
/// is inserted, with a generated id when none is given.
pub async fn run<T: Transport>(
    data_dir: &Path,
    transport: T,
    config: &Config,
    table_id: &str,
    json: &str,
) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(json).context("Row is not valid JSON")?;
    let mut doc = Document::from_json(&value).context("Row must be a JSON object")?;

    let mut session = open(data_dir, transport, config).await?;
    session.pull().await.context("Pull failed")?;

    let applied = session
        .transaction()
        .run(|s| stage(s.table(table_id), &mut doc))
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
            "Push conflicted {} time(s); the row was not saved. Try again.",
            config.sync.max_retries
        );
    }
    info!(store = %session.id(), table = table_id, rev = %session.revision(), "row saved");
    println!(
        "Saved row {} in {} at revision {}.",
        doc.id().unwrap_or_default(),
        table_id,
        session.revision()
    );
    Ok(())
}

/// Queue the insert or update of `doc`.
fn stage(table: &mut RowTable, doc: &mut Document) -> Result<()> {
    let exists = doc.id().is_some_and(|id| table.baseline(id).is_some());
    let queued = if exists {
        table.update(doc)?
    } else {
        table.insert(doc, IdPolicy::Generate)?
    };
    if !queued {
        anyhow::bail!(
            "Row {} in {} already has a change queued",
            doc.id().unwrap_or_default(),
            table.id()
        );
    }
    Ok(())
}
