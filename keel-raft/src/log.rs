//! Log entries and the in-memory replicated log.
//!
//! The log keeps every entry that has not been compacted, anchored by a
//! sentinel "dummy" entry so term lookups stay total at the boundary:
//!
//! ```text
//!   dummy/first.....applied....committed....stabled.....last
//!   ------|------------------------------------------------|
//!                        log entries
//! ```

use bytes::Bytes;
use keel_core::{LogIndex, TermId};

use crate::error::{RaftError, RaftResult};
use crate::storage::Storage;

/// A single entry in the replicated log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// The log index of this entry.
    pub index: LogIndex,
    /// The term when this entry was created.
    pub term: TermId,
    /// The command payload. Empty for leader noops.
    pub data: Bytes,
}

impl LogEntry {
    /// Creates a new log entry.
    #[must_use]
    pub const fn new(index: LogIndex, term: TermId, data: Bytes) -> Self {
        Self { index, term, data }
    }

    /// Creates the empty entry a fresh leader appends for its term.
    #[must_use]
    pub const fn noop(index: LogIndex, term: TermId) -> Self {
        Self {
            index,
            term,
            data: Bytes::new(),
        }
    }
}

/// In-memory view of the replicated log.
///
/// `entries[0]` is the dummy anchor at `dummy_index`, so position
/// `i - dummy_index` is a valid lookup for every retained index, including
/// `first_index - 1`. Durable state is copied out of [`Storage`] once at
/// construction; the driver persists new entries via [`crate::Ready`].
#[derive(Debug)]
pub struct RaftLog {
    /// All retained entries, beginning with the dummy anchor.
    entries: Vec<LogEntry>,
    /// Index of the dummy anchor; `first_index = dummy_index + 1`.
    dummy_index: LogIndex,
    /// Highest index known to be committed on a quorum.
    committed: LogIndex,
    /// Highest index handed to the application. Invariant: `<= committed`.
    applied: LogIndex,
    /// Highest index already persisted by the driver.
    stabled: LogIndex,
}

impl RaftLog {
    /// Recovers the log from durable storage.
    ///
    /// # Errors
    /// Propagates storage read failures.
    pub fn new<S: Storage>(storage: &S) -> RaftResult<Self> {
        let (hard_state, _) = storage.initial_state()?;
        let first = storage.first_index()?;
        let last = storage.last_index()?;

        let dummy_index = LogIndex::new(first.get() - 1);
        // The dummy carries the term at the compaction boundary (0 on a
        // fresh store) so prev-entry term checks stay answerable there.
        let dummy_term = storage.term(dummy_index)?;

        let mut entries = Vec::with_capacity((last.get() + 2 - first.get()) as usize);
        entries.push(LogEntry::new(dummy_index, dummy_term, Bytes::new()));
        entries.extend(storage.entries(first, LogIndex::new(last.get() + 1))?);

        Ok(Self {
            entries,
            dummy_index,
            committed: hard_state.commit,
            applied: dummy_index,
            stabled: last,
        })
    }

    /// Index of the dummy anchor.
    #[must_use]
    pub const fn dummy_index(&self) -> LogIndex {
        self.dummy_index
    }

    /// First real index, one past the dummy.
    #[must_use]
    pub const fn first_index(&self) -> LogIndex {
        LogIndex::new(self.dummy_index.get() + 1)
    }

    /// Last index present in the log.
    #[must_use]
    pub fn last_index(&self) -> LogIndex {
        LogIndex::new(self.dummy_index.get() + self.entries.len() as u64 - 1)
    }

    /// Term of the last entry (the dummy's term on an empty log).
    #[must_use]
    pub fn last_term(&self) -> TermId {
        // entries is never empty; position 0 holds the dummy.
        self.entries[self.entries.len() - 1].term
    }

    /// Highest committed index.
    #[must_use]
    pub const fn committed(&self) -> LogIndex {
        self.committed
    }

    /// Highest applied index.
    #[must_use]
    pub const fn applied(&self) -> LogIndex {
        self.applied
    }

    /// Highest persisted index.
    #[must_use]
    pub const fn stabled(&self) -> LogIndex {
        self.stabled
    }

    /// Returns the term of the entry at `index`.
    ///
    /// Total over `[dummy_index, last_index]`.
    ///
    /// # Errors
    /// `Compacted` below the dummy, `Unavailable` past the tail.
    pub fn term(&self, index: LogIndex) -> RaftResult<TermId> {
        if index < self.dummy_index {
            return Err(RaftError::Compacted {
                index,
                first: self.first_index(),
            });
        }
        if index > self.last_index() {
            return Err(RaftError::Unavailable {
                index,
                last: self.last_index(),
            });
        }
        Ok(self.entries[self.position(index)].term)
    }

    /// All retained entries, excluding the dummy.
    #[must_use]
    pub fn all_entries(&self) -> &[LogEntry] {
        &self.entries[1..]
    }

    /// Entries not yet persisted by the driver (`stabled + 1 ..`).
    #[must_use]
    pub fn unstable_entries(&self) -> &[LogEntry] {
        &self.entries[self.position(self.stabled) + 1..]
    }

    /// Committed entries the application has not applied yet
    /// (`applied + 1 ..= committed`).
    #[must_use]
    pub fn next_ents(&self) -> &[LogEntry] {
        &self.entries[self.position(self.applied) + 1..=self.position(self.committed)]
    }

    /// Clones the suffix starting at `index`, for append construction.
    ///
    /// Returns an empty vector when `index` is past the tail.
    ///
    /// # Errors
    /// `Compacted` when `index` does not reach past the dummy.
    pub fn entries_from(&self, index: LogIndex) -> RaftResult<Vec<LogEntry>> {
        if index <= self.dummy_index {
            return Err(RaftError::Compacted {
                index,
                first: self.first_index(),
            });
        }
        if index > self.last_index() {
            return Ok(Vec::new());
        }
        Ok(self.entries[self.position(index)..].to_vec())
    }

    /// Appends one entry at the tail.
    ///
    /// The caller assigns term and index; the index must equal
    /// `last_index + 1` at the moment of insertion.
    pub fn append(&mut self, entry: LogEntry) {
        debug_assert_eq!(entry.index.get(), self.last_index().get() + 1);
        debug_assert!(entry.term >= self.last_term());
        self.entries.push(entry);
    }

    /// Drops `entries[index..]` and rewinds `stabled` below the cut.
    pub fn truncate_from(&mut self, index: LogIndex) {
        debug_assert!(index > self.dummy_index && index <= self.last_index());
        self.entries.truncate(self.position(index));
        self.stabled = LogIndex::new(self.stabled.get().min(index.get() - 1));
    }

    /// Advances the committed watermark to `index`.
    pub fn commit_to(&mut self, index: LogIndex) {
        debug_assert!(index >= self.committed && index <= self.last_index());
        self.committed = index;
    }

    /// Records that the application has applied up to `index`.
    pub fn applied_to(&mut self, index: LogIndex) {
        debug_assert!(index >= self.applied && index <= self.committed);
        self.applied = index;
    }

    /// Records that the driver has persisted up to `index`.
    pub fn stabled_to(&mut self, index: LogIndex) {
        debug_assert!(index >= self.stabled && index <= self.last_index());
        self.stabled = index;
    }

    /// Checks whether a candidate log described by (`last_term`,
    /// `last_index`) is at least as up-to-date as ours.
    ///
    /// The comparison is lexicographic on (term, index), per the vote rule.
    #[must_use]
    pub fn is_up_to_date(&self, last_term: TermId, last_index: LogIndex) -> bool {
        last_term > self.last_term()
            || (last_term == self.last_term() && last_index >= self.last_index())
    }

    fn position(&self, index: LogIndex) -> usize {
        (index.get() - self.dummy_index.get()) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HardState, MemStorage};
    use keel_core::NodeId;

    fn make_entry(term: u64, index: u64) -> LogEntry {
        LogEntry::new(
            LogIndex::new(index),
            TermId::new(term),
            Bytes::from(format!("entry-{index}")),
        )
    }

    fn seeded_storage() -> MemStorage {
        let mut storage = MemStorage::new();
        storage.append(&[make_entry(1, 1), make_entry(1, 2), make_entry(2, 3)]);
        storage.set_hard_state(HardState::new(
            TermId::new(2),
            Some(NodeId::new(1)),
            LogIndex::new(2),
        ));
        storage
    }

    #[test]
    fn test_fresh_log() {
        let log = RaftLog::new(&MemStorage::new()).unwrap();

        assert_eq!(log.dummy_index().get(), 0);
        assert_eq!(log.first_index().get(), 1);
        assert_eq!(log.last_index().get(), 0);
        assert_eq!(log.last_term().get(), 0);
        assert_eq!(log.committed().get(), 0);
        assert_eq!(log.applied().get(), 0);
        assert_eq!(log.stabled().get(), 0);
        assert!(log.all_entries().is_empty());
    }

    #[test]
    fn test_recovery_from_storage() {
        let log = RaftLog::new(&seeded_storage()).unwrap();

        assert_eq!(log.last_index().get(), 3);
        assert_eq!(log.last_term().get(), 2);
        assert_eq!(log.committed().get(), 2);
        assert_eq!(log.applied().get(), 0);
        assert_eq!(log.stabled().get(), 3);
        assert_eq!(log.all_entries().len(), 3);
    }

    #[test]
    fn test_recovery_after_compaction() {
        let mut storage = seeded_storage();
        storage.compact(LogIndex::new(2)).unwrap();

        let log = RaftLog::new(&storage).unwrap();

        assert_eq!(log.dummy_index().get(), 2);
        assert_eq!(log.first_index().get(), 3);
        assert_eq!(log.last_index().get(), 3);
        // The dummy inherits the boundary term so prev-entry checks at
        // index 2 still answer.
        assert_eq!(log.term(LogIndex::new(2)).unwrap().get(), 1);
    }

    #[test]
    fn test_term_bounds() {
        let mut storage = seeded_storage();
        storage.compact(LogIndex::new(2)).unwrap();
        let log = RaftLog::new(&storage).unwrap();

        assert!(matches!(
            log.term(LogIndex::new(1)),
            Err(RaftError::Compacted { .. })
        ));
        assert!(matches!(
            log.term(LogIndex::new(4)),
            Err(RaftError::Unavailable { .. })
        ));
        assert_eq!(log.term(LogIndex::new(3)).unwrap().get(), 2);
    }

    #[test]
    fn test_append_and_index_continuity() {
        let mut log = RaftLog::new(&seeded_storage()).unwrap();

        log.append(make_entry(3, 4));
        assert_eq!(log.last_index().get(), 4);

        for (offset, entry) in log.all_entries().iter().enumerate() {
            assert_eq!(entry.index.get(), offset as u64 + 1);
        }
    }

    #[test]
    fn test_truncate_rewinds_stabled() {
        let mut log = RaftLog::new(&seeded_storage()).unwrap();
        assert_eq!(log.stabled().get(), 3);

        log.truncate_from(LogIndex::new(2));

        assert_eq!(log.last_index().get(), 1);
        assert_eq!(log.stabled().get(), 1);
    }

    #[test]
    fn test_unstable_and_next_ents_slices() {
        let mut log = RaftLog::new(&seeded_storage()).unwrap();
        log.append(make_entry(3, 4));
        log.append(make_entry(3, 5));

        // stabled = 3 from storage; 4 and 5 are unstable.
        let unstable = log.unstable_entries();
        assert_eq!(unstable.len(), 2);
        assert_eq!(unstable[0].index.get(), 4);

        // committed = 2, applied = 0.
        let next = log.next_ents();
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].index.get(), 1);
        assert_eq!(next[1].index.get(), 2);

        log.applied_to(LogIndex::new(2));
        assert!(log.next_ents().is_empty());
    }

    #[test]
    fn test_entries_from() {
        let log = RaftLog::new(&seeded_storage()).unwrap();

        let tail = log.entries_from(LogIndex::new(2)).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].index.get(), 2);

        assert!(log.entries_from(LogIndex::new(4)).unwrap().is_empty());
        assert!(matches!(
            log.entries_from(LogIndex::new(0)),
            Err(RaftError::Compacted { .. })
        ));
    }

    #[test]
    fn test_is_up_to_date() {
        let log = RaftLog::new(&seeded_storage()).unwrap();
        // Our log: last = (index 3, term 2).

        // Higher last term wins regardless of length.
        assert!(log.is_up_to_date(TermId::new(3), LogIndex::new(1)));
        // Same term needs at least our length.
        assert!(log.is_up_to_date(TermId::new(2), LogIndex::new(3)));
        assert!(!log.is_up_to_date(TermId::new(2), LogIndex::new(2)));
        // Lower term always loses.
        assert!(!log.is_up_to_date(TermId::new(1), LogIndex::new(9)));
    }
}
