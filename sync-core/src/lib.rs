//! # rowsync-core
//!
//! Pure logic for rowsync (no I/O, instant tests).
//!
//! This crate implements the local half of the revision-tracked table sync
//! protocol: row tables with their pending-change queues, the list diff,
//! revision tracking and the replica that ties them together.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about row state transitions
//!
//! The actual I/O (talking to the authority, saving sessions) is performed by
//! `rowsync-client`, which feeds snapshots and deltas into a [`Replica`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod diff;
pub mod error;
pub mod ids;
pub mod record;
pub mod replica;
pub mod table;

pub use cursor::{DeltaCheck, RevisionCursor};
pub use diff::diff;
pub use error::LocalStateError;
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use record::{Document, FieldMap, Record, DEFAULT_ID_FIELD};
pub use replica::{DeltaReport, Replica, SavedReplica};
pub use table::{apply_field_op, IdPolicy, RowState, RowTable};
