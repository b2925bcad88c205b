//! Row id generation.
//!
//! Inserting a record without an id asks the table's [`IdGenerator`] for a
//! fresh one. Generators are injected into the replica so tests can use
//! [`SequentialIds`] and get predictable ids.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::LocalStateError;

/// Source of fresh row ids.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Return an id not handed out before.
    fn generate(&self) -> Result<String, LocalStateError>;
}

/// Short random ids: 9 random bytes as 12 URL-safe base64 characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> Result<String, LocalStateError> {
        let mut bytes = [0u8; 9];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| LocalStateError::IdGeneration(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// Deterministic ids `<prefix>1`, `<prefix>2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    /// Create a generator starting at 1.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> Result<String, LocalStateError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{}{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_short_and_distinct() {
        let ids = RandomIds;
        let a = ids.generate().unwrap();
        let b = ids.generate().unwrap();
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("row-");
        assert_eq!(ids.generate().unwrap(), "row-1");
        assert_eq!(ids.generate().unwrap(), "row-2");
    }
}
