//! Row-level changes and field operations.
//!
//! A [`Change`] travels as a JSON array `[tag, tableId, rowId, payload?]`:
//!
//! ```text
//! ["I", "tasks", "r1", {"title": "a", "n": {"I": "1"}}]   insert
//! ["U", "tasks", "r1", {"title": ["P", "b"]}]             update
//! ["D", "tasks", "r1"]                                    delete
//! ```
//!
//! Each update payload maps a field to exactly one [`FieldOp`], itself an
//! array `[tag, ...args]`.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

use crate::{Value, WireError};

/// Field name to wire atom; the stored form of a row.
pub type Fields = BTreeMap<String, Value>;

/// Field name to operation; the payload of an update.
pub type FieldOps = BTreeMap<String, FieldOp>;

/// A single operation on one field of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Set the field (`["P", value]`).
    Put(Value),
    /// Remove the field (`["D"]`).
    Delete,
    /// Set the field to an empty list (`["LC"]`).
    ListCreate,
    /// Overwrite a list element (`["LP", index, value]`).
    ListPut(usize, Value),
    /// Insert into a list (`["LI", index, value]`).
    ListInsert(usize, Value),
    /// Remove from a list (`["LD", index]`).
    ListRemove(usize),
    /// Move a list element (`["LM", from, to]`).
    ListMove(usize, usize),
}

impl FieldOp {
    /// The wire tag of this operation.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldOp::Put(_) => "P",
            FieldOp::Delete => "D",
            FieldOp::ListCreate => "LC",
            FieldOp::ListPut(..) => "LP",
            FieldOp::ListInsert(..) => "LI",
            FieldOp::ListRemove(_) => "LD",
            FieldOp::ListMove(..) => "LM",
        }
    }

    /// Encode as `[tag, ...args]`.
    pub fn to_json(&self) -> Json {
        let tag = Json::String(self.tag().to_string());
        match self {
            FieldOp::Put(v) => Json::Array(vec![tag, v.to_json()]),
            FieldOp::Delete | FieldOp::ListCreate => Json::Array(vec![tag]),
            FieldOp::ListPut(i, v) | FieldOp::ListInsert(i, v) => {
                Json::Array(vec![tag, Json::from(*i), v.to_json()])
            }
            FieldOp::ListRemove(i) => Json::Array(vec![tag, Json::from(*i)]),
            FieldOp::ListMove(from, to) => {
                Json::Array(vec![tag, Json::from(*from), Json::from(*to)])
            }
        }
    }

    /// Decode from `[tag, ...args]`.
    pub fn from_json(json: &Json) -> Result<Self, WireError> {
        let parts = json
            .as_array()
            .ok_or_else(|| WireError::InvalidData(format!("field op is not an array: {}", json)))?;
        let tag = parts
            .first()
            .and_then(Json::as_str)
            .ok_or_else(|| WireError::InvalidData(format!("field op without tag: {}", json)))?;

        match tag {
            "P" => Ok(FieldOp::Put(atom_arg(parts, 1)?)),
            "D" => Ok(FieldOp::Delete),
            "LC" => Ok(FieldOp::ListCreate),
            "LP" => Ok(FieldOp::ListPut(index_arg(parts, 1)?, atom_arg(parts, 2)?)),
            "LI" => Ok(FieldOp::ListInsert(index_arg(parts, 1)?, atom_arg(parts, 2)?)),
            "LD" => Ok(FieldOp::ListRemove(index_arg(parts, 1)?)),
            "LM" => Ok(FieldOp::ListMove(index_arg(parts, 1)?, index_arg(parts, 2)?)),
            other => Err(WireError::UnknownFieldOp(other.to_string())),
        }
    }
}

fn atom_arg(parts: &[Json], at: usize) -> Result<Value, WireError> {
    parts
        .get(at)
        .ok_or_else(|| WireError::InvalidData(format!("missing field op argument {}", at)))
        .and_then(Value::from_json)
}

fn index_arg(parts: &[Json], at: usize) -> Result<usize, WireError> {
    parts
        .get(at)
        .and_then(Json::as_u64)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| WireError::InvalidData(format!("missing or invalid list index at {}", at)))
}

/// What a [`Change`] does to its row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOp {
    /// Create the row with the given fields.
    Insert(Fields),
    /// Apply field operations to an existing row.
    Update(FieldOps),
    /// Remove the row.
    Delete,
}

/// A row-level change, either queued locally or sent by the authority.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Table the row belongs to.
    pub table_id: String,
    /// Row identifier.
    pub row_id: String,
    /// The operation.
    pub op: RowOp,
}

impl Change {
    /// Build an insert.
    pub fn insert(table_id: impl Into<String>, row_id: impl Into<String>, fields: Fields) -> Self {
        Self {
            table_id: table_id.into(),
            row_id: row_id.into(),
            op: RowOp::Insert(fields),
        }
    }

    /// Build an update.
    pub fn update(table_id: impl Into<String>, row_id: impl Into<String>, ops: FieldOps) -> Self {
        Self {
            table_id: table_id.into(),
            row_id: row_id.into(),
            op: RowOp::Update(ops),
        }
    }

    /// Build a delete.
    pub fn delete(table_id: impl Into<String>, row_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            row_id: row_id.into(),
            op: RowOp::Delete,
        }
    }

    /// The wire tag of this change.
    pub fn tag(&self) -> &'static str {
        match self.op {
            RowOp::Insert(_) => "I",
            RowOp::Update(_) => "U",
            RowOp::Delete => "D",
        }
    }

    /// Encode as `[tag, tableId, rowId, payload?]`.
    pub fn to_json(&self) -> Json {
        let mut parts = vec![
            Json::String(self.tag().to_string()),
            Json::String(self.table_id.clone()),
            Json::String(self.row_id.clone()),
        ];
        match &self.op {
            RowOp::Insert(fields) => parts.push(Json::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<Map<_, _>>(),
            )),
            RowOp::Update(ops) => parts.push(Json::Object(
                ops.iter().map(|(k, op)| (k.clone(), op.to_json())).collect::<Map<_, _>>(),
            )),
            RowOp::Delete => {}
        }
        Json::Array(parts)
    }

    /// Decode from `[tag, tableId, rowId, payload?]`.
    pub fn from_json(json: &Json) -> Result<Self, WireError> {
        let parts = json
            .as_array()
            .ok_or_else(|| WireError::InvalidData(format!("change is not an array: {}", json)))?;
        let text = |at: usize, what: &str| {
            parts
                .get(at)
                .and_then(Json::as_str)
                .map(str::to_string)
                .ok_or_else(|| WireError::InvalidData(format!("change without {}: {}", what, json)))
        };
        let tag = text(0, "type")?;
        let table_id = text(1, "table id")?;
        let row_id = text(2, "row id")?;

        let op = match tag.as_str() {
            "I" => {
                let fields = payload(parts, &row_id)?
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                    .collect::<Result<Fields, WireError>>()?;
                RowOp::Insert(fields)
            }
            "U" => {
                let ops = payload(parts, &row_id)?
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), FieldOp::from_json(v)?)))
                    .collect::<Result<FieldOps, WireError>>()?;
                RowOp::Update(ops)
            }
            "D" => RowOp::Delete,
            other => return Err(WireError::UnknownOp(other.to_string())),
        };

        Ok(Self {
            table_id,
            row_id,
            op,
        })
    }
}

fn payload<'a>(parts: &'a [Json], row_id: &str) -> Result<&'a Map<String, Json>, WireError> {
    parts.get(3).and_then(Json::as_object).ok_or_else(|| {
        WireError::InvalidData(format!("expected object payload for row {}", row_id))
    })
}

impl Serialize for Change {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Change {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Change::from_json(&json).map_err(de::Error::custom)
    }
}

impl Serialize for FieldOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        FieldOp::from_json(&json).map_err(de::Error::custom)
    }
}
