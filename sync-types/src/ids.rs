//! Identity and ordering types for rowsync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonically increasing revision of a store.
///
/// Assigned by the authority, never by clients. Revision 0 means the
/// local replica has never been synchronized.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Create a new Revision with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Revision.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Create a Revision representing "never synchronized".
    pub fn zero() -> Self {
        Self(0)
    }

    /// True if the replica has never been synchronized.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Increment the revision by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({})", self.0)
    }
}

/// Opaque, authority-assigned reference to a store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Wrap an authority-issued handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        write!(f, "Handle({})", short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_ordering() {
        let r1 = Revision::new(3);
        let r2 = Revision::new(4);
        assert!(r1 < r2);
        assert!(r2 > r1);
    }

    #[test]
    fn revision_next() {
        assert_eq!(Revision::new(100).next().value(), 101);
    }

    #[test]
    fn revision_zero() {
        assert!(Revision::zero().is_zero());
        assert!(!Revision::new(1).is_zero());
    }

    #[test]
    fn revision_saturating_add() {
        let r = Revision::new(u64::MAX);
        assert_eq!(r.next().value(), u64::MAX);
    }

    #[test]
    fn revision_serializes_as_bare_number() {
        let json = serde_json::to_string(&Revision::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn handle_debug_is_truncated() {
        let handle = Handle::new("3Cq5ybudNmPHeWygNSkf73xPF25kmC");
        assert_eq!(format!("{:?}", handle), "Handle(3Cq5ybud)");
        assert_eq!(handle.to_string(), "3Cq5ybudNmPHeWygNSkf73xPF25kmC");
    }
}
