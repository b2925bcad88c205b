//! # sync-types
//!
//! Wire format types for the rowsync table synchronization protocol.
//!
//! This crate provides the foundational types used across all rowsync crates:
//! - [`Value`] - Tagged wire atoms, and [`Datum`] with [`serialize`]/[`deserialize`]
//!   to convert from and to domain values
//! - [`Change`], [`RowOp`], [`FieldOp`] - Row-level changes
//! - [`Revision`], [`Handle`] - Ordering and identity types
//! - Request/response bodies for the authority endpoints
//! - [`WireError`], [`BodyError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod change;
pub mod codec;
mod error;
mod ids;
mod messages;
mod value;

pub use change::{Change, FieldOp, FieldOps, Fields, RowOp};
pub use codec::{deserialize, equal, serialize, Datum};
pub use error::{BodyError, WireError};
pub use ids::{Handle, Revision};
pub use messages::{
    AwaitCursors, AwaitDeltas, AwaitResponse, Delta, DeltasResponse, Endpoint, PutDeltaResponse,
    SnapshotResponse, SnapshotRow,
};
pub use value::Value;
