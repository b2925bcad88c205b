//! Revision tracking for a store.
//!
//! The authority numbers accepted deltas with increasing revisions. A
//! replica's revision is the next revision it expects to see:
//! - after a snapshot at revision `r`, it is `r`
//! - after applying a delta with revision `d`, it is `d + 1`
//! - after an acknowledged push answered with `r`, it is `r`
//!
//! Deltas below the current revision have already been applied and are
//! skipped, which makes replays idempotent. The revision never moves
//! backwards.

use rowsync_types::Revision;

/// What to do with an incoming delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaCheck {
    /// Already applied; skip it.
    Stale,
    /// Exactly the expected revision.
    Next,
    /// Ahead of the expected revision; some revisions were never seen.
    Gap {
        /// First revision not seen.
        expected: Revision,
    },
}

/// The replica's position in the authority's revision sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevisionCursor {
    rev: Revision,
}

impl RevisionCursor {
    /// Start at revision 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a saved revision.
    pub fn with_revision(rev: Revision) -> Self {
        Self { rev }
    }

    /// The next revision expected from the authority.
    pub fn current(&self) -> Revision {
        self.rev
    }

    /// Classify an incoming delta against the current revision.
    pub fn check(&self, delta_rev: Revision) -> DeltaCheck {
        if delta_rev < self.rev {
            DeltaCheck::Stale
        } else if delta_rev == self.rev {
            DeltaCheck::Next
        } else {
            DeltaCheck::Gap { expected: self.rev }
        }
    }

    /// Record that the delta with this revision was applied.
    pub fn applied(&mut self, delta_rev: Revision) {
        self.advance_to(delta_rev.next());
    }

    /// Record a snapshot taken at `rev`, or a push acknowledged with `rev`.
    pub fn advance_to(&mut self, rev: Revision) {
        if rev > self.rev {
            self.rev = rev;
        }
    }
}
