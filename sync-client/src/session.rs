//! SyncSession - the main interface for rowsync.
//!
//! This module provides [`SyncSession`], the API applications use to keep a
//! local replica of a remote store in step with the authority.
//!
//! # Architecture
//!
//! SyncSession owns a pure [`Replica`] (from rowsync-core) and drives it with
//! requests sent through the [`Transport`] trait.
//!
//! ```text
//! Application → SyncSession → Transport → Authority
//!                   ↓
//!              rowsync-core (pure replica state)
//! ```
//!
//! Network operations take `&mut self`, so at most one of `pull`, `push` and
//! `await_deltas` can be in flight per session. Remote state is applied to a
//! staged copy of the replica and committed only once every change applied,
//! so abandoning or failing a call never leaves partial state behind.
//!
//! # Example
//!
//! ```ignore
//! use rowsync_client::{HttpTransport, SyncConfig, SyncSession};
//!
//! let transport = HttpTransport::new("https://authority.example/1/datastores")?;
//! let config = SyncConfig::new().with_api_token("token");
//! let mut session = SyncSession::create("default", Handle::new("S3PZ"), transport, config);
//!
//! session.pull().await?;
//! let mut doc = Document::new().with("title", "buy milk");
//! session.table("tasks").insert(&mut doc, IdPolicy::Generate)?;
//! session.push().await?;
//! ```

use rowsync_core::{DeltaReport, LocalStateError, Replica, RowTable, SavedReplica};
use rowsync_types::{
    AwaitCursors, AwaitResponse, BodyError, Delta, DeltasResponse, Endpoint, Handle,
    PutDeltaResponse, Revision, SnapshotResponse,
};
use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transaction::{RetryStrategy, TransactionRunner};
use crate::transport::{ApiRequest, Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The authority answered with a non-success status.
    #[error("api call {endpoint} returned status code {status}")]
    ApiStatus {
        /// Endpoint called.
        endpoint: Endpoint,
        /// HTTP status code.
        status: u16,
    },

    /// The authority does not know the store.
    #[error("store {store} not found, or was deleted")]
    NotFound {
        /// Store id.
        store: String,
    },

    /// Local replica invariant violated.
    #[error(transparent)]
    LocalState(#[from] LocalStateError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The authority sent a body this client does not understand.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Configuration for SyncSession.
#[derive(Clone)]
pub struct SyncConfig {
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
    /// Push attempts made by a transaction before giving up.
    pub max_retries: u32,
    /// What a transaction does after a conflicted push.
    pub retry_strategy: RetryStrategy,
}

impl SyncConfig {
    /// Default configuration: no token, one push attempt, resend on conflict.
    pub fn new() -> Self {
        Self {
            api_token: None,
            max_retries: 1,
            retry_strategy: RetryStrategy::Resend,
        }
    }

    /// Set the bearer token.
    pub fn with_api_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }

    /// Set the number of push attempts per transaction.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the conflict handling of transactions.
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("max_retries", &self.max_retries)
            .field("retry_strategy", &self.retry_strategy)
            .finish()
    }
}

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The authority accepted the changes.
    Applied,
    /// The authority moved past our revision; changes stay queued.
    Conflict,
}

impl PushOutcome {
    /// True if the changes were accepted.
    pub fn is_applied(&self) -> bool {
        matches!(self, PushOutcome::Applied)
    }
}

/// Result of a long-poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitOutcome {
    /// New deltas were applied.
    Changed,
    /// The poll ended without news.
    Unchanged,
}

/// A synchronized store.
///
/// Owns the local replica and the transport used to reach the authority.
pub struct SyncSession<T: Transport> {
    replica: Replica,
    transport: T,
    config: SyncConfig,
}

impl<T: Transport> SyncSession<T> {
    /// Create a never-synchronized session at revision 0.
    pub fn create(id: &str, handle: Handle, transport: T, config: SyncConfig) -> Self {
        Self::from_replica(Replica::new(id, handle), transport, config)
    }

    /// Restore a session from the JSON produced by [`SyncSession::save`].
    pub fn hydrate(saved: Json, transport: T, config: SyncConfig) -> Result<Self, ClientError> {
        let saved: SavedReplica = serde_json::from_value(saved)
            .map_err(|e| ClientError::Serialization(format!("invalid saved session: {}", e)))?;
        Ok(Self::from_replica(Replica::hydrate(saved), transport, config))
    }

    /// Wrap an existing replica.
    pub fn from_replica(replica: Replica, transport: T, config: SyncConfig) -> Self {
        Self {
            replica,
            transport,
            config,
        }
    }

    /// Serialize id, handle, revision and every baseline.
    ///
    /// Queued changes are not saved.
    pub fn save(&self) -> Result<Json, ClientError> {
        serde_json::to_value(self.replica.save())
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// Logical store id.
    pub fn id(&self) -> &str {
        self.replica.id()
    }

    /// Authority-assigned handle.
    pub fn handle(&self) -> &Handle {
        self.replica.handle()
    }

    /// Next revision expected from the authority (0 = never synchronized).
    pub fn revision(&self) -> Revision {
        self.replica.revision()
    }

    /// Session configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The underlying replica.
    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    /// Get the transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The table with this id, created on first use.
    pub fn table(&mut self, table_id: &str) -> &mut RowTable {
        self.replica.table(table_id)
    }

    /// True if any table has queued changes.
    pub fn has_pending_changes(&self) -> bool {
        self.replica.has_pending_changes()
    }

    /// Discard every queued change.
    pub fn revert(&mut self) {
        self.replica.revert();
    }

    /// A transaction using this session's retry settings.
    pub fn transaction(&mut self) -> TransactionRunner<'_, T> {
        TransactionRunner::new(self)
    }

    /// Bring the replica up to date with the authority.
    ///
    /// Fetches a full snapshot on the first pull and deltas afterwards.
    /// Fails without touching anything if local changes are pending.
    pub async fn pull(&mut self) -> Result<(), ClientError> {
        self.replica.ensure_no_pending()?;

        if self.revision().is_zero() {
            let request = self
                .request(ApiRequest::post(Endpoint::GetSnapshot))
                .param("handle", self.handle());
            let body = self.call(request).await?;
            let snapshot = SnapshotResponse::from_body(body)
                .map_err(|e| body_error(Endpoint::GetSnapshot, e))?;
            if snapshot.is_not_found() {
                return Err(self.not_found());
            }

            let rows = snapshot.rows.len();
            self.replica.install_snapshot(snapshot.rows, snapshot.rev)?;
            info!(store = %self.id(), rev = %self.revision(), rows, "installed snapshot");
        } else {
            let request = self
                .request(ApiRequest::post(Endpoint::GetDeltas))
                .param("handle", self.handle())
                .param("rev", self.revision());
            let body = self.call(request).await?;
            let deltas = DeltasResponse::from_body(body)
                .map_err(|e| body_error(Endpoint::GetDeltas, e))?;
            if deltas.is_not_found() {
                return Err(self.not_found());
            }
            self.apply_deltas(&deltas.deltas)?;
        }
        Ok(())
    }

    /// Submit every queued change against the current revision.
    ///
    /// On [`PushOutcome::Applied`] the changes are folded into the baselines
    /// and the revision advances. On [`PushOutcome::Conflict`] nothing
    /// changes locally.
    pub async fn push(&mut self) -> Result<PushOutcome, ClientError> {
        let changes = self.replica.pending_changes();
        let payload =
            serde_json::to_string(&changes).map_err(|e| ClientError::Serialization(e.to_string()))?;

        let request = self
            .request(ApiRequest::post(Endpoint::PutDelta))
            .param("handle", self.handle())
            .param("rev", self.revision())
            .param("changes", payload);
        let body = self.call(request).await?;
        let response: PutDeltaResponse = serde_json::from_value(body)
            .map_err(|e| body_error(Endpoint::PutDelta, e.into()))?;

        if response.is_not_found() {
            return Err(self.not_found());
        }
        if response.is_conflict() {
            warn!(store = %self.id(), rev = %self.revision(), changes = changes.len(), "push conflicted");
            return Ok(PushOutcome::Conflict);
        }

        let rev = response
            .rev
            .ok_or_else(|| ClientError::Protocol("put_delta response carries no revision".into()))?;
        self.replica.acknowledge_push(rev)?;
        info!(store = %self.id(), rev = %rev, changes = changes.len(), "push applied");
        Ok(PushOutcome::Applied)
    }

    /// Wait for the authority to report new deltas, then apply them.
    ///
    /// A poll that times out or returns no news yields
    /// [`AwaitOutcome::Unchanged`]. Fails if local changes are pending.
    pub async fn await_deltas(&mut self) -> Result<AwaitOutcome, ClientError> {
        self.replica.ensure_no_pending()?;

        let mut cursors = AwaitCursors::default();
        cursors
            .cursors
            .insert(self.handle().to_string(), self.revision());
        let argument =
            serde_json::to_string(&cursors).map_err(|e| ClientError::Serialization(e.to_string()))?;
        let request = self
            .request(ApiRequest::get(Endpoint::Await))
            .param("get_deltas", argument);

        let body = match self.call(request).await {
            Ok(body) => body,
            Err(ClientError::Transport(TransportError::Timeout)) => {
                debug!(store = %self.id(), "await timed out");
                return Ok(AwaitOutcome::Unchanged);
            }
            Err(e) => return Err(e),
        };
        let response =
            AwaitResponse::from_body(body).map_err(|e| body_error(Endpoint::Await, e))?;

        let result = response
            .get_deltas
            .and_then(|mut changed| changed.deltas.remove(self.handle().as_str()));
        match result {
            None => Ok(AwaitOutcome::Unchanged),
            Some(result) if result.is_not_found() => Err(self.not_found()),
            Some(result) => {
                self.apply_deltas(&result.deltas)?;
                Ok(AwaitOutcome::Changed)
            }
        }
    }

    fn apply_deltas(&mut self, deltas: &[Delta]) -> Result<DeltaReport, ClientError> {
        let before = self.revision();
        let report = self.replica.apply_deltas(deltas)?;

        if report.skipped > 0 {
            debug!(store = %self.id(), skipped = report.skipped, "skipped deltas already applied");
        }
        for (expected, received) in &report.gaps {
            warn!(store = %self.id(), %expected, %received, "delta revisions skipped ahead");
        }
        if self.revision() != before {
            info!(store = %self.id(), from = %before, rev = %self.revision(), applied = report.applied, "applied deltas");
        }
        Ok(report)
    }

    fn request(&self, request: ApiRequest) -> ApiRequest {
        request.with_auth(self.config.api_token.as_deref())
    }

    async fn call(&self, request: ApiRequest) -> Result<Json, ClientError> {
        let endpoint = request.endpoint;
        debug!(store = %self.id(), method = %request.method, %endpoint, "sending request");

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::ApiStatus {
                endpoint,
                status: response.status,
            });
        }

        Ok(response.body)
    }

    fn not_found(&self) -> ClientError {
        ClientError::NotFound {
            store: self.id().to_string(),
        }
    }
}

/// Envelope problems are protocol errors; bad wire data inside a
/// well-formed body is a local state error.
fn body_error(endpoint: Endpoint, err: BodyError) -> ClientError {
    match err {
        BodyError::Shape(e) => {
            ClientError::Protocol(format!("invalid {} response: {}", endpoint, e))
        }
        BodyError::Wire(e) => ClientError::LocalState(e.into()),
    }
}
