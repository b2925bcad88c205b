//! Bounded-retry transactions.
//!
//! A [`TransactionRunner`] runs a local mutation against a session and
//! pushes the result, retrying conflicted pushes up to a fixed number of
//! attempts. Two retry strategies exist:
//!
//! - [`RetryStrategy::Resend`] resends the queued changes unchanged. The
//!   mutation runs once.
//! - [`RetryStrategy::Rederive`] drops the queued changes, pulls, and runs
//!   the mutation again against the fresh baselines before each retry.
//!
//! Errors from the mutation, from `push` or from the re-pull abort the
//! transaction immediately.

use tracing::{debug, warn};

use crate::session::{ClientError, PushOutcome, SyncSession};
use crate::transport::Transport;

/// What to do after a conflicted push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryStrategy {
    /// Resend the same queued changes.
    #[default]
    Resend,
    /// Revert, pull and re-run the mutation before pushing again.
    Rederive,
}

/// Runs a mutation and pushes it with bounded retries.
pub struct TransactionRunner<'a, T: Transport> {
    session: &'a mut SyncSession<T>,
    max_retries: u32,
    strategy: RetryStrategy,
}

impl<'a, T: Transport> TransactionRunner<'a, T> {
    /// A runner using the session's configured retries and strategy.
    pub fn new(session: &'a mut SyncSession<T>) -> Self {
        let max_retries = session.config().max_retries;
        let strategy = session.config().retry_strategy;
        Self {
            session,
            max_retries,
            strategy,
        }
    }

    /// Override the number of push attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the retry strategy.
    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Run `mutate`, then push.
    ///
    /// Returns `Ok(true)` once a push is applied and `Ok(false)` when every
    /// attempt conflicted; the changes then stay queued. With zero attempts
    /// allowed, nothing runs and the result is `Ok(false)`.
    pub async fn run<F, E>(self, mut mutate: F) -> Result<bool, E>
    where
        F: FnMut(&mut SyncSession<T>) -> Result<(), E>,
        E: From<ClientError>,
    {
        let session = self.session;
        if self.max_retries == 0 {
            return Ok(false);
        }

        mutate(&mut *session)?;
        for attempt in 1..=self.max_retries {
            if session.push().await? == PushOutcome::Applied {
                return Ok(true);
            }
            if attempt == self.max_retries {
                break;
            }

            debug!(store = %session.id(), attempt, strategy = ?self.strategy, "retrying conflicted push");
            if self.strategy == RetryStrategy::Rederive {
                session.revert();
                session.pull().await?;
                mutate(&mut *session)?;
            }
        }

        warn!(store = %session.id(), attempts = self.max_retries, "transaction gave up after conflicts");
        Ok(false)
    }
}
