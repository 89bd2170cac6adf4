//! Per-peer replication cursors held by a leader.

use keel_core::LogIndex;

/// A follower's replication progress in the view of the leader.
///
/// `match_index` is the highest index known replicated on the peer;
/// `next_index` is the index of the next entry to send. Invariants:
/// `next_index >= 1` and `match_index < next_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Highest index known to be replicated on the peer.
    pub match_index: LogIndex,
    /// Index of the next entry to send to the peer.
    pub next_index: LogIndex,
}

impl Progress {
    /// Fresh cursor for a peer whose log state is unknown: optimistically
    /// start sending right past the leader's last index.
    #[must_use]
    pub const fn new(last_index: LogIndex) -> Self {
        Self {
            match_index: LogIndex::new(0),
            next_index: LogIndex::new(last_index.get() + 1),
        }
    }

    /// Cursor for the leader itself, which holds its whole log.
    #[must_use]
    pub const fn up_to_date(last_index: LogIndex) -> Self {
        Self {
            match_index: last_index,
            next_index: LogIndex::new(last_index.get() + 1),
        }
    }

    /// Records an accepted append up to `index`.
    ///
    /// Returns true when the match actually advanced, so stale or
    /// reordered responses can be told apart from fresh ones.
    pub fn record_success(&mut self, index: LogIndex) -> bool {
        let advanced = index > self.match_index;
        if advanced {
            self.match_index = index;
        }
        if index.get() + 1 > self.next_index.get() {
            self.next_index = LogIndex::new(index.get() + 1);
        }
        advanced
    }

    /// Rewinds `next_index` after a rejected append.
    ///
    /// `hint` is the responder's last index when its log is short, or the
    /// conflicting index minus one on a term mismatch. Never rewinds
    /// below 1 or below an already-confirmed match.
    pub fn record_reject(&mut self, hint: LogIndex) {
        let floor = self.match_index.get() + 1;
        self.next_index = LogIndex::new(hint.get().max(1).max(floor));
    }

    /// Whether the peer holds everything up to the leader's last index.
    #[must_use]
    pub fn is_caught_up(&self, last_index: LogIndex) -> bool {
        self.match_index >= last_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_cursor() {
        let pr = Progress::new(LogIndex::new(5));
        assert_eq!(pr.match_index.get(), 0);
        assert_eq!(pr.next_index.get(), 6);
    }

    #[test]
    fn test_success_advances_both_cursors() {
        let mut pr = Progress::new(LogIndex::new(5));

        assert!(pr.record_success(LogIndex::new(5)));
        assert_eq!(pr.match_index.get(), 5);
        assert_eq!(pr.next_index.get(), 6);

        // A stale response does not move anything.
        assert!(!pr.record_success(LogIndex::new(3)));
        assert_eq!(pr.match_index.get(), 5);
        assert_eq!(pr.next_index.get(), 6);
    }

    #[test]
    fn test_reject_rewinds_next() {
        let mut pr = Progress::new(LogIndex::new(10));
        assert_eq!(pr.next_index.get(), 11);

        pr.record_reject(LogIndex::new(4));
        assert_eq!(pr.next_index.get(), 4);

        // Never below 1.
        pr.record_reject(LogIndex::new(0));
        assert_eq!(pr.next_index.get(), 1);
    }

    #[test]
    fn test_reject_never_undercuts_match() {
        let mut pr = Progress::new(LogIndex::new(10));
        pr.record_success(LogIndex::new(7));

        pr.record_reject(LogIndex::new(2));
        assert_eq!(pr.next_index.get(), 8);
    }

    #[test]
    fn test_caught_up() {
        let mut pr = Progress::new(LogIndex::new(3));
        assert!(!pr.is_caught_up(LogIndex::new(3)));

        pr.record_success(LogIndex::new(3));
        assert!(pr.is_caught_up(LogIndex::new(3)));
    }
}
