//! Local replica of one remote store.
//!
//! A [`Replica`] holds everything a sync session knows about its store: the
//! logical id, the authority's handle, the revision cursor and the row
//! tables. It performs no I/O; `rowsync-client` fetches snapshots and
//! deltas and hands them to the replica to apply.
//!
//! Applying remote state is staged: the work happens on a copy that
//! replaces the live state only if every change applied cleanly, so a bad
//! delta never leaves the replica half-updated.

use std::collections::BTreeMap;
use std::sync::Arc;

use rowsync_types::{Change, Delta, Fields, Handle, Revision, SnapshotRow};
use serde::{Deserialize, Serialize};

use crate::cursor::{DeltaCheck, RevisionCursor};
use crate::error::LocalStateError;
use crate::ids::{IdGenerator, RandomIds};
use crate::table::RowTable;

/// Persisted form of a replica.
///
/// Only baselines are saved. Queued changes are not part of the saved
/// state, so save after pushing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedReplica {
    /// Logical store id.
    pub id: String,
    /// Authority-assigned handle.
    pub handle: Handle,
    /// Next revision expected.
    pub rev: Revision,
    /// Table id to row id to baseline.
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeMap<String, Fields>>,
}

/// Outcome of applying a batch of deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaReport {
    /// Deltas applied.
    pub applied: usize,
    /// Deltas skipped because they were already applied.
    pub skipped: usize,
    /// `(expected, received)` for every delta that arrived ahead of the cursor.
    pub gaps: Vec<(Revision, Revision)>,
}

/// Tables, revision and identity of one synchronized store.
#[derive(Debug, Clone)]
pub struct Replica {
    id: String,
    handle: Handle,
    cursor: RevisionCursor,
    tables: BTreeMap<String, RowTable>,
    ids: Arc<dyn IdGenerator>,
}

impl Replica {
    /// A never-synchronized replica at revision 0.
    pub fn new(id: &str, handle: Handle) -> Self {
        Self {
            id: id.to_string(),
            handle,
            cursor: RevisionCursor::new(),
            tables: BTreeMap::new(),
            ids: Arc::new(RandomIds),
        }
    }

    /// Rebuild a replica from its saved form.
    pub fn hydrate(saved: SavedReplica) -> Self {
        let mut replica = Self::new(&saved.id, saved.handle);
        replica.cursor = RevisionCursor::with_revision(saved.rev);
        for (table_id, rows) in saved.tables {
            let table = RowTable::load(&table_id, rows, replica.ids.clone());
            replica.tables.insert(table_id, table);
        }
        replica
    }

    /// Snapshot id, handle, revision and all baselines.
    pub fn save(&self) -> SavedReplica {
        SavedReplica {
            id: self.id.clone(),
            handle: self.handle.clone(),
            rev: self.cursor.current(),
            tables: self
                .tables
                .iter()
                .map(|(id, table)| (id.clone(), table.save()))
                .collect(),
        }
    }

    /// Replace the row id generator used by every table.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        for table in self.tables.values_mut() {
            table.set_id_generator(ids.clone());
        }
        self.ids = ids;
        self
    }

    /// Logical store id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Authority-assigned handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Next revision expected from the authority.
    pub fn revision(&self) -> Revision {
        self.cursor.current()
    }

    /// The table with this id, created empty on first use.
    pub fn table(&mut self, table_id: &str) -> &mut RowTable {
        let ids = &self.ids;
        self.tables
            .entry(table_id.to_string())
            .or_insert_with(|| RowTable::new(table_id, ids.clone()))
    }

    /// The table with this id, if it has been used.
    pub fn get_table(&self, table_id: &str) -> Option<&RowTable> {
        self.tables.get(table_id)
    }

    /// Ids of every table, in order.
    pub fn table_ids(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// True if any table has queued changes.
    pub fn has_pending_changes(&self) -> bool {
        self.tables.values().any(RowTable::has_pending_changes)
    }

    /// Every queued change, table by table in table id order.
    pub fn pending_changes(&self) -> Vec<Change> {
        self.tables
            .values()
            .flat_map(|table| table.pending_changes().iter().cloned())
            .collect()
    }

    /// Fail with [`LocalStateError::LocalChangesPending`] if changes are queued.
    pub fn ensure_no_pending(&self) -> Result<(), LocalStateError> {
        if self.has_pending_changes() {
            return Err(LocalStateError::LocalChangesPending {
                store: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Drop every queued change in every table.
    pub fn revert(&mut self) {
        for table in self.tables.values_mut() {
            table.revert_pending_changes();
        }
    }

    /// Install a full snapshot taken at `rev`.
    ///
    /// Existing baselines are replaced. Fails if changes are queued.
    pub fn install_snapshot(
        &mut self,
        rows: Vec<SnapshotRow>,
        rev: Revision,
    ) -> Result<(), LocalStateError> {
        self.ensure_no_pending()?;
        let mut tables: BTreeMap<String, BTreeMap<String, Fields>> = self
            .tables
            .keys()
            .map(|id| (id.clone(), BTreeMap::new()))
            .collect();
        for row in rows {
            tables.entry(row.tid).or_default().insert(row.rowid, row.data);
        }
        self.tables = tables
            .into_iter()
            .map(|(id, rows)| {
                let table = RowTable::load(&id, rows, self.ids.clone());
                (id, table)
            })
            .collect();
        self.cursor.advance_to(rev);
        Ok(())
    }

    /// Apply authority deltas in order, skipping those already applied.
    ///
    /// Either every applicable delta is applied or, on error, none is.
    /// Fails if changes are queued.
    pub fn apply_deltas(&mut self, deltas: &[Delta]) -> Result<DeltaReport, LocalStateError> {
        self.ensure_no_pending()?;
        let mut staged = self.tables.clone();
        let mut cursor = self.cursor;
        let mut report = DeltaReport::default();

        for delta in deltas {
            match cursor.check(delta.rev) {
                DeltaCheck::Stale => {
                    report.skipped += 1;
                    continue;
                }
                DeltaCheck::Gap { expected } => report.gaps.push((expected, delta.rev)),
                DeltaCheck::Next => {}
            }
            for change in &delta.changes {
                staged
                    .entry(change.table_id.clone())
                    .or_insert_with(|| RowTable::new(&change.table_id, self.ids.clone()))
                    .apply_change(change)?;
            }
            cursor.applied(delta.rev);
            report.applied += 1;
        }

        self.tables = staged;
        self.cursor = cursor;
        Ok(report)
    }

    /// Fold every queued change into the baselines after the authority
    /// accepted them at `rev`.
    ///
    /// Staged like [`Replica::apply_deltas`].
    pub fn acknowledge_push(&mut self, rev: Revision) -> Result<(), LocalStateError> {
        let mut staged = self.tables.clone();
        for table in staged.values_mut() {
            table.flush_acknowledged_changes()?;
        }
        self.tables = staged;
        self.cursor.advance_to(rev);
        Ok(())
    }
}
