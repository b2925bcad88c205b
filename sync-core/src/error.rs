//! Local state errors.

use rowsync_types::WireError;
use thiserror::Error;

/// Invariant violations in the local replica.
///
/// These indicate caller misuse or a replica that has diverged from the
/// authority. They are fatal for the current operation and never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocalStateError {
    /// A record has no id and id generation was not allowed.
    #[error("record must have a non-empty id")]
    MissingId,

    /// Insert of a row that already has a baseline.
    #[error("cannot insert row {row} into table {table}: it already exists")]
    DuplicateRow {
        /// Table id.
        table: String,
        /// Row id.
        row: String,
    },

    /// Update or delete of a row that does not exist.
    #[error("row {row} does not exist in table {table}")]
    MissingRow {
        /// Table id.
        table: String,
        /// Row id.
        row: String,
    },

    /// A list operation addressed an index outside the list.
    #[error("list index {index} out of range for field {field} (len {len})")]
    IndexOutOfRange {
        /// Field name.
        field: String,
        /// Offending index.
        index: usize,
        /// List length at the time.
        len: usize,
    },

    /// A list operation targeted a field that is not a list.
    #[error("field {field} is not a list")]
    NotAList {
        /// Field name.
        field: String,
    },

    /// No row id could be generated.
    #[error("failed to generate row id: {0}")]
    IdGeneration(String),

    /// Pull attempted while local changes are queued.
    #[error("unable to pull remote changes into store {store}: local changes are pending")]
    LocalChangesPending {
        /// Store id.
        store: String,
    },

    /// Value conversion failed.
    #[error(transparent)]
    Wire(#[from] WireError),
}
