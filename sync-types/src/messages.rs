//! Request and response bodies exchanged with the authority.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::fmt;

use crate::{BodyError, Change, Fields, Revision, Value, WireError};

/// Remote operations used by the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Full snapshot of a store.
    GetSnapshot,
    /// Deltas since a revision.
    GetDeltas,
    /// Atomic, revision-checked submission of changes.
    PutDelta,
    /// Long-poll for new deltas.
    Await,
}

impl Endpoint {
    /// Path segment of this endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::GetSnapshot => "get_snapshot",
            Endpoint::GetDeltas => "get_deltas",
            Endpoint::PutDelta => "put_delta",
            Endpoint::Await => "await",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True if an optional marker field is present and not `false`.
fn flagged(marker: &Option<Json>) -> bool {
    !matches!(marker, None | Some(Json::Null) | Some(Json::Bool(false)))
}

/// A single row in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Table id.
    pub tid: String,
    /// Row id.
    pub rowid: String,
    /// Row fields.
    pub data: Fields,
}

/// Response to `get_snapshot`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotResponse {
    /// Every row of the store.
    #[serde(default)]
    pub rows: Vec<SnapshotRow>,
    /// Revision the snapshot was taken at.
    #[serde(default)]
    pub rev: Revision,
    /// Present when the store is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notfound: Option<Json>,
}

impl SnapshotResponse {
    /// Decode a `get_snapshot` body.
    ///
    /// Envelope problems are [`BodyError::Shape`]; an invalid atom in a
    /// row is [`BodyError::Wire`].
    pub fn from_body(body: Json) -> Result<Self, BodyError> {
        let raw: RawSnapshot = serde_json::from_value(body)?;
        let rows = raw
            .rows
            .into_iter()
            .map(RawRow::decode)
            .collect::<Result<Vec<_>, WireError>>()?;
        Ok(Self {
            rows,
            rev: raw.rev,
            notfound: raw.notfound,
        })
    }

    /// True if the authority reported the store unknown.
    pub fn is_not_found(&self) -> bool {
        flagged(&self.notfound)
    }
}

/// A revision-stamped batch of changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Revision this delta was committed at.
    pub rev: Revision,
    /// Changes in application order.
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// Response to `get_deltas`, also the per-store payload of `await`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeltasResponse {
    /// Deltas in ascending revision order.
    #[serde(default)]
    pub deltas: Vec<Delta>,
    /// Present when the store is unknown.
    #[serde(default, alias = "notfoundresult", skip_serializing_if = "Option::is_none")]
    pub notfound: Option<Json>,
}

impl DeltasResponse {
    /// Decode a `get_deltas` body.
    ///
    /// Envelope problems are [`BodyError::Shape`]; an unknown change or
    /// field op tag, or a malformed atom, is [`BodyError::Wire`].
    pub fn from_body(body: Json) -> Result<Self, BodyError> {
        let raw: RawDeltas = serde_json::from_value(body)?;
        Ok(raw.decode()?)
    }

    /// True if the authority reported the store unknown.
    pub fn is_not_found(&self) -> bool {
        flagged(&self.notfound)
    }
}

/// Response to `put_delta`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PutDeltaResponse {
    /// New revision when the changes were accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
    /// Present when the client's revision is stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Json>,
    /// Present when the store is unknown.
    #[serde(default, alias = "notfoundresult", skip_serializing_if = "Option::is_none")]
    pub notfound: Option<Json>,
}

impl PutDeltaResponse {
    /// True if the push was rejected because the store moved on.
    pub fn is_conflict(&self) -> bool {
        flagged(&self.conflict)
    }

    /// True if the authority reported the store unknown.
    pub fn is_not_found(&self) -> bool {
        flagged(&self.notfound)
    }
}

/// Argument of the `await` long-poll: last known revision per handle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AwaitCursors {
    /// Handle to revision.
    pub cursors: BTreeMap<String, Revision>,
}

/// Deltas returned by `await`, keyed by handle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AwaitDeltas {
    /// Handle to deltas.
    #[serde(default)]
    pub deltas: BTreeMap<String, DeltasResponse>,
}

/// Response to `await`. Empty when the poll ended without changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AwaitResponse {
    /// Set when at least one watched store changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_deltas: Option<AwaitDeltas>,
}

impl AwaitResponse {
    /// Decode an `await` body, with the same error split as
    /// [`DeltasResponse::from_body`].
    pub fn from_body(body: Json) -> Result<Self, BodyError> {
        let raw: RawAwait = serde_json::from_value(body)?;
        let get_deltas = match raw.get_deltas {
            None => None,
            Some(changed) => Some(AwaitDeltas {
                deltas: changed
                    .deltas
                    .into_iter()
                    .map(|(handle, deltas)| Ok::<_, WireError>((handle, deltas.decode()?)))
                    .collect::<Result<_, WireError>>()?,
            }),
        };
        Ok(Self { get_deltas })
    }
}

// Response envelopes with change and row payloads left as JSON, so they can
// be decoded separately and keep their `WireError`.

#[derive(Deserialize)]
struct RawRow {
    tid: String,
    rowid: String,
    data: Map<String, Json>,
}

impl RawRow {
    fn decode(self) -> Result<SnapshotRow, WireError> {
        let data = self
            .data
            .iter()
            .map(|(name, atom)| Ok((name.clone(), Value::from_json(atom)?)))
            .collect::<Result<Fields, WireError>>()?;
        Ok(SnapshotRow {
            tid: self.tid,
            rowid: self.rowid,
            data,
        })
    }
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    rows: Vec<RawRow>,
    #[serde(default)]
    rev: Revision,
    #[serde(default)]
    notfound: Option<Json>,
}

#[derive(Deserialize)]
struct RawDelta {
    rev: Revision,
    #[serde(default)]
    changes: Vec<Json>,
}

#[derive(Deserialize)]
struct RawDeltas {
    #[serde(default)]
    deltas: Vec<RawDelta>,
    #[serde(default, alias = "notfoundresult")]
    notfound: Option<Json>,
}

impl RawDeltas {
    fn decode(self) -> Result<DeltasResponse, WireError> {
        let deltas = self
            .deltas
            .into_iter()
            .map(|delta| {
                let changes = delta
                    .changes
                    .iter()
                    .map(Change::from_json)
                    .collect::<Result<Vec<_>, WireError>>()?;
                Ok::<_, WireError>(Delta {
                    rev: delta.rev,
                    changes,
                })
            })
            .collect::<Result<Vec<_>, WireError>>()?;
        Ok(DeltasResponse {
            deltas,
            notfound: self.notfound,
        })
    }
}

#[derive(Deserialize)]
struct RawAwaitDeltas {
    #[serde(default)]
    deltas: BTreeMap<String, RawDeltas>,
}

#[derive(Deserialize)]
struct RawAwait {
    #[serde(default)]
    get_deltas: Option<RawAwaitDeltas>,
}
