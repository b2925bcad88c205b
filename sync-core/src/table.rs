//! Row tables.
//!
//! A [`RowTable`] owns the rows of one table and the queue of changes made
//! locally but not yet acknowledged by the authority. Each row keeps a
//! baseline (the last state known to agree with the authority) and a
//! [`RowState`]:
//!
//! ```text
//! Unchanged --insert--> Inserting --ack--> Unchanged
//! Unchanged --update--> Updating  --ack--> Unchanged
//! Unchanged|Inserting|Updating --remove--> Deleting --ack--> (gone)
//! ```
//!
//! Local mutations only touch the state and the queue. Baselines change
//! through [`RowTable::apply_change`], either when the authority sends a
//! delta or when an acknowledged push is folded in.

use std::collections::BTreeMap;
use std::sync::Arc;

use rowsync_types::{deserialize, serialize, Change, FieldOp, FieldOps, Fields, RowOp, Value};

use crate::diff;
use crate::error::LocalStateError;
use crate::ids::IdGenerator;
use crate::record::{FieldMap, Record};

/// Pending state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Baseline matches the authority; nothing queued.
    Unchanged,
    /// Insert queued.
    Inserting,
    /// Update queued.
    Updating,
    /// Delete queued.
    Deleting,
}

/// Whether an insert may generate a missing row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Generate and assign an id when the record has none.
    #[default]
    Generate,
    /// Fail with [`LocalStateError::MissingId`] when the record has none.
    Require,
}

#[derive(Debug, Clone)]
struct Row {
    /// `None` only while an insert is in flight.
    baseline: Option<Fields>,
    state: RowState,
}

/// The rows of one table plus their queued changes.
#[derive(Debug, Clone)]
pub struct RowTable {
    id: String,
    rows: BTreeMap<String, Row>,
    pending: Vec<Change>,
    ids: Arc<dyn IdGenerator>,
}

impl RowTable {
    /// Create an empty table.
    pub fn new(id: &str, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            id: id.to_string(),
            rows: BTreeMap::new(),
            pending: Vec::new(),
            ids,
        }
    }

    /// Rebuild a table from saved baselines.
    pub fn load(id: &str, rows: BTreeMap<String, Fields>, ids: Arc<dyn IdGenerator>) -> Self {
        let mut table = Self::new(id, ids);
        for (row_id, fields) in rows {
            table.install(&row_id, fields);
        }
        table
    }

    /// Baselines of every row that has one.
    pub fn save(&self) -> BTreeMap<String, Fields> {
        self.rows
            .iter()
            .filter_map(|(id, row)| row.baseline.clone().map(|fields| (id.clone(), fields)))
            .collect()
    }

    pub(crate) fn set_id_generator(&mut self, ids: Arc<dyn IdGenerator>) {
        self.ids = ids;
    }

    /// Table id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of rows with a baseline.
    pub fn len(&self) -> usize {
        self.rows.values().filter(|r| r.baseline.is_some()).count()
    }

    /// True if no row has a baseline.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending state of a row, if the table knows it.
    pub fn row_state(&self, row_id: &str) -> Option<RowState> {
        self.rows.get(row_id).map(|r| r.state)
    }

    /// Baseline of a row in wire form.
    pub fn baseline(&self, row_id: &str) -> Option<&Fields> {
        self.rows.get(row_id).and_then(|r| r.baseline.as_ref())
    }

    /// Queued changes, oldest first.
    pub fn pending_changes(&self) -> &[Change] {
        &self.pending
    }

    /// True if any change is queued.
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Install a baseline directly, bypassing the change queue.
    pub(crate) fn install(&mut self, row_id: &str, fields: Fields) {
        self.rows.insert(
            row_id.to_string(),
            Row {
                baseline: Some(fields),
                state: RowState::Unchanged,
            },
        );
    }

    /// Queue the insertion of a record.
    ///
    /// Returns `Ok(false)` if a live or inserting row already has this id.
    /// Inserting over a row that is being deleted is allowed. Null fields are
    /// left out of the inserted row.
    pub fn insert<R: Record>(
        &mut self,
        record: &mut R,
        policy: IdPolicy,
    ) -> Result<bool, LocalStateError> {
        let row_id = match (record.id().map(str::to_string), policy) {
            (Some(id), _) if !id.is_empty() => id,
            (_, IdPolicy::Generate) => {
                let id = self.ids.generate()?;
                record.set_id(&id);
                id
            }
            (_, IdPolicy::Require) => return Err(LocalStateError::MissingId),
        };

        if let Some(row) = self.rows.get(&row_id) {
            if row.state != RowState::Deleting {
                return Ok(false);
            }
        }

        let fields = record
            .fields()
            .iter()
            .filter(|(_, datum)| !datum.is_null())
            .map(|(name, datum)| Ok((name.clone(), serialize(datum)?)))
            .collect::<Result<Fields, LocalStateError>>()?;

        self.rows
            .entry(row_id.clone())
            .and_modify(|row| row.state = RowState::Inserting)
            .or_insert(Row {
                baseline: None,
                state: RowState::Inserting,
            });
        self.pending.push(Change::insert(&self.id, row_id, fields));
        Ok(true)
    }

    /// Queue the changes that turn a row's baseline into `record`.
    ///
    /// Only fields present in the record are compared; a [`Datum::Null`]
    /// field deletes the stored one. Returns `Ok(false)` if the row does not
    /// exist or already has a change queued. A record identical to the
    /// baseline queues nothing and leaves the row unchanged.
    ///
    /// [`Datum::Null`]: rowsync_types::Datum::Null
    pub fn update<R: Record>(&mut self, record: &R) -> Result<bool, LocalStateError> {
        let row_id = match record.id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(LocalStateError::MissingId),
        };
        let row = match self.rows.get(&row_id) {
            Some(row) if row.state == RowState::Unchanged => row,
            _ => return Ok(false),
        };
        let baseline = row.baseline.as_ref().ok_or_else(|| LocalStateError::MissingRow {
            table: self.id.clone(),
            row: row_id.clone(),
        })?;

        // A second op for a field in the same entry starts a new entry.
        let mut entries: Vec<FieldOps> = Vec::new();
        let mut current = FieldOps::new();
        for (name, datum) in record.fields() {
            let updated = if datum.is_null() {
                None
            } else {
                Some(serialize(&datum)?)
            };
            for op in field_ops(baseline.get(&name), updated) {
                if current.contains_key(&name) {
                    entries.push(std::mem::take(&mut current));
                }
                current.insert(name.clone(), op);
            }
        }
        if !current.is_empty() {
            entries.push(current);
        }
        if entries.is_empty() {
            return Ok(true);
        }

        for ops in entries {
            self.pending.push(Change::update(&self.id, &row_id, ops));
        }
        if let Some(row) = self.rows.get_mut(&row_id) {
            row.state = RowState::Updating;
        }
        Ok(true)
    }

    /// Queue the deletion of a row.
    ///
    /// Returns `false` if the row is unknown or already being deleted.
    pub fn remove(&mut self, row_id: &str) -> bool {
        match self.rows.get_mut(row_id) {
            Some(row) if row.state != RowState::Deleting => {
                row.state = RowState::Deleting;
                self.pending.push(Change::delete(&self.id, row_id));
                true
            }
            _ => false,
        }
    }

    /// Read a row's baseline back as a record.
    ///
    /// Rows still being inserted have no baseline and read as `None`.
    pub fn get<R: Record>(&self, row_id: &str) -> Result<Option<R>, LocalStateError> {
        match self.baseline(row_id) {
            Some(fields) => Ok(Some(to_record(row_id, fields)?)),
            None => Ok(None),
        }
    }

    /// Every row with a baseline, in row id order.
    pub fn get_all<R: Record>(&self) -> Result<Vec<R>, LocalStateError> {
        self.rows
            .iter()
            .filter_map(|(id, row)| row.baseline.as_ref().map(|fields| to_record(id, fields)))
            .collect()
    }

    /// Apply a change to the baselines.
    ///
    /// Used for authority deltas and for folding in acknowledged local
    /// changes. The affected row ends up [`RowState::Unchanged`] (or gone).
    /// A failing update leaves the row untouched.
    pub fn apply_change(&mut self, change: &Change) -> Result<(), LocalStateError> {
        let row_id = change.row_id.as_str();
        match &change.op {
            RowOp::Insert(fields) => {
                if self.baseline(row_id).is_some() {
                    return Err(LocalStateError::DuplicateRow {
                        table: self.id.clone(),
                        row: row_id.to_string(),
                    });
                }
                self.install(row_id, fields.clone());
            }
            RowOp::Delete => {
                if self.baseline(row_id).is_none() {
                    return Err(self.missing(row_id));
                }
                self.rows.remove(row_id);
            }
            RowOp::Update(ops) => {
                let mut fields = self
                    .baseline(row_id)
                    .cloned()
                    .ok_or_else(|| self.missing(row_id))?;
                for (name, op) in ops {
                    apply_field_op(&mut fields, name, op)?;
                }
                self.install(row_id, fields);
            }
        }
        Ok(())
    }

    /// Drop every queued change.
    ///
    /// Affected rows return to [`RowState::Unchanged`]; rows whose insert was
    /// aborted disappear.
    pub fn revert_pending_changes(&mut self) {
        for change in std::mem::take(&mut self.pending) {
            let aborted = match self.rows.get_mut(&change.row_id) {
                Some(row) => {
                    row.state = RowState::Unchanged;
                    row.baseline.is_none()
                }
                None => false,
            };
            if aborted {
                self.rows.remove(&change.row_id);
            }
        }
    }

    /// Fold acknowledged changes into the baselines, in queue order.
    pub fn flush_acknowledged_changes(&mut self) -> Result<(), LocalStateError> {
        for change in std::mem::take(&mut self.pending) {
            self.apply_change(&change)?;
        }
        Ok(())
    }

    fn missing(&self, row_id: &str) -> LocalStateError {
        LocalStateError::MissingRow {
            table: self.id.clone(),
            row: row_id.to_string(),
        }
    }
}

fn to_record<R: Record>(row_id: &str, fields: &Fields) -> Result<R, LocalStateError> {
    let map = fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), deserialize(value)?)))
        .collect::<Result<FieldMap, LocalStateError>>()?;
    Ok(R::from_fields(row_id, map)?)
}

/// Operations that turn one field's baseline value into its updated value.
fn field_ops(baseline: Option<&Value>, updated: Option<Value>) -> Vec<FieldOp> {
    match (baseline, updated) {
        (None, None) => Vec::new(),
        (Some(_), None) => vec![FieldOp::Delete],
        (None, Some(Value::List(items))) => std::iter::once(FieldOp::ListCreate)
            .chain(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| FieldOp::ListPut(i, v)),
            )
            .collect(),
        (None, Some(value)) => vec![FieldOp::Put(value)],
        (Some(Value::List(old)), Some(Value::List(new))) => diff::diff(old, &new),
        (Some(old), Some(value)) if *old == value => Vec::new(),
        (Some(_), Some(value)) => vec![FieldOp::Put(value)],
    }
}

/// Apply one field operation to a row's fields.
pub fn apply_field_op(
    fields: &mut Fields,
    name: &str,
    op: &FieldOp,
) -> Result<(), LocalStateError> {
    match op {
        FieldOp::Put(value) => {
            fields.insert(name.to_string(), value.clone());
        }
        FieldOp::Delete => {
            fields.remove(name);
        }
        FieldOp::ListCreate => {
            fields.insert(name.to_string(), Value::List(Vec::new()));
        }
        FieldOp::ListPut(index, value) => {
            let list = list_field(fields, name)?;
            match *index {
                i if i < list.len() => list[i] = value.clone(),
                i if i == list.len() => list.push(value.clone()),
                i => return Err(out_of_range(name, i, list.len())),
            }
        }
        FieldOp::ListInsert(index, value) => {
            let list = list_field(fields, name)?;
            if *index > list.len() {
                return Err(out_of_range(name, *index, list.len()));
            }
            list.insert(*index, value.clone());
        }
        FieldOp::ListRemove(index) => {
            let list = list_field(fields, name)?;
            if *index >= list.len() {
                return Err(out_of_range(name, *index, list.len()));
            }
            list.remove(*index);
        }
        FieldOp::ListMove(from, to) => {
            let list = list_field(fields, name)?;
            if *from >= list.len() || *to >= list.len() {
                return Err(out_of_range(name, (*from).max(*to), list.len()));
            }
            let value = list.remove(*from);
            list.insert(*to, value);
        }
    }
    Ok(())
}

fn list_field<'a>(fields: &'a mut Fields, name: &str) -> Result<&'a mut Vec<Value>, LocalStateError> {
    match fields.get_mut(name) {
        Some(Value::List(items)) => Ok(items),
        _ => Err(LocalStateError::NotAList {
            field: name.to_string(),
        }),
    }
}

fn out_of_range(name: &str, index: usize, len: usize) -> LocalStateError {
    LocalStateError::IndexOutOfRange {
        field: name.to_string(),
        index,
        len,
    }
}
