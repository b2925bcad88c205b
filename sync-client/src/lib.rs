//! # rowsync-client
//!
//! Client library for the rowsync revision-tracked table sync protocol.
//!
//! This is the main library that applications use to sync data.
//!
//! ## Features
//!
//! - **Sync Sessions**: snapshot and delta pulls, atomic revision-checked pushes, long-poll
//! - **Transactions**: bounded retries on push conflicts, resend or re-derive
//! - **Transport Abstraction**: Pluggable transport layer (HTTP, mock)
//! - **Pure Replica State**: Uses rowsync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use rowsync_client::{HttpTransport, SyncConfig, SyncSession};
//!
//! let transport = HttpTransport::new("https://authority.example/1/datastores")?;
//! let mut session = SyncSession::create("default", handle, transport, SyncConfig::new());
//!
//! session.pull().await?;
//! let applied = session
//!     .transaction()
//!     .run(|s| {
//!         s.table("tasks").remove("r1");
//!         Ok::<_, ClientError>(())
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod session;
pub mod transaction;
pub mod transport;

pub use session::{AwaitOutcome, ClientError, PushOutcome, SyncConfig, SyncSession};
pub use transaction::{RetryStrategy, TransactionRunner};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, Method, MockTransport, Transport, TransportError,
};
