//! Print the rows of the local replica.

use anyhow::{Context, Result};
use rowsync_core::{Document, Replica, SavedReplica};
use serde_json::{Map, Value as Json};
use std::path::Path;

use crate::config;

/// Run the show command. Works offline.
pub async fn run(data_dir: &Path, table: Option<&str>) -> Result<()> {
    let saved: SavedReplica = serde_json::from_value(config::load_session(data_dir).await?)
        .context("Invalid session file")?;
    let replica = Replica::hydrate(saved);

    println!("Store {} at revision {}", replica.id(), replica.revision());
    println!("{}", serde_json::to_string_pretty(&collect(&replica, table)?)?);
    Ok(())
}

/// Rows of every table (or just `table`) as plain JSON objects.
fn collect(replica: &Replica, table: Option<&str>) -> Result<Json> {
    let mut out = Map::new();
    for table_id in replica.table_ids() {
        if table.is_some_and(|wanted| wanted != table_id) {
            continue;
        }
        let Some(rows) = replica.get_table(table_id) else {
            continue;
        };
        let docs = rows
            .get_all::<Document>()
            .with_context(|| format!("Failed to read table {}", table_id))?;
        out.insert(
            table_id.to_string(),
            Json::Array(docs.iter().map(Document::to_json).collect()),
        );
    }

    if let Some(wanted) = table {
        if !out.contains_key(wanted) {
            anyhow::bail!("No table named {} in the local replica", wanted);
        }
    }
    Ok(Json::Object(out))
}
