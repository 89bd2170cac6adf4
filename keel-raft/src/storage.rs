//! Durable-state abstraction consumed by the consensus core.
//!
//! The core performs no I/O of its own. At construction it reads the
//! persisted hard state, membership, and log entries out of a [`Storage`]
//! implementation; afterwards the driver is responsible for persisting
//! whatever [`crate::Ready`] hands back. The key persistent state in Raft:
//!
//! - **term**: the latest term the peer has seen
//! - **vote**: the candidate that received our vote in the current term
//! - **log\[\]**: the entries, each carrying term, index, and payload

use bytes::Bytes;
use keel_core::{LogIndex, NodeId, TermId};

use crate::error::{RaftError, RaftResult};
use crate::log::LogEntry;

/// The durable triple that must survive crashes.
///
/// Persisted before responding to vote or append RPCs whenever it changes;
/// reported back to the driver through [`crate::Ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardState {
    /// Latest term the peer has seen (starts at 0, increases monotonically).
    pub term: TermId,
    /// Candidate that received our vote in the current term, if any.
    pub vote: Option<NodeId>,
    /// Highest index known to be committed on a quorum.
    pub commit: LogIndex,
}

impl HardState {
    /// Creates a hard state with the given values.
    #[must_use]
    pub const fn new(term: TermId, vote: Option<NodeId>, commit: LogIndex) -> Self {
        Self { term, vote, commit }
    }
}

/// The persisted cluster membership.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfState {
    /// Ids of all voting members, including the local peer.
    pub peers: Vec<NodeId>,
}

impl ConfState {
    /// Creates a membership from the given peer ids.
    #[must_use]
    pub fn new(peers: Vec<NodeId>) -> Self {
        Self { peers }
    }
}

/// A point-in-time image of the compacted log prefix.
///
/// Installation is not implemented by the core; the type exists so storage
/// implementations and the transport have a common shape to hand around.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Index of the last entry covered by the snapshot.
    pub index: LogIndex,
    /// Term of the entry at `index`.
    pub term: TermId,
    /// Membership as of `index`.
    pub conf_state: ConfState,
    /// Opaque application payload.
    pub data: Bytes,
}

/// Source of durable initial state.
///
/// Consulted only while constructing a peer; the core keeps its own
/// in-memory copy of the log afterwards.
pub trait Storage {
    /// Returns the persisted hard state and membership.
    ///
    /// # Errors
    /// Returns an error if the state cannot be read.
    fn initial_state(&self) -> RaftResult<(HardState, ConfState)>;

    /// Returns the first index present in storage.
    ///
    /// On an empty store this is 1, one past the implicit sentinel at 0.
    ///
    /// # Errors
    /// Returns an error if the bound cannot be read.
    fn first_index(&self) -> RaftResult<LogIndex>;

    /// Returns the last index present in storage, or `first_index - 1`
    /// when the store holds no entries.
    ///
    /// # Errors
    /// Returns an error if the bound cannot be read.
    fn last_index(&self) -> RaftResult<LogIndex>;

    /// Returns the entries in the half-open range `[lo, hi)`.
    ///
    /// # Errors
    /// `Compacted` when `lo` precedes the retained range, `Unavailable`
    /// when `hi` reaches past the last entry.
    fn entries(&self, lo: LogIndex, hi: LogIndex) -> RaftResult<Vec<LogEntry>>;

    /// Returns the term of the entry at `index`.
    ///
    /// Valid for the compaction sentinel as well, so term lookups stay
    /// total at the log boundary.
    ///
    /// # Errors
    /// `Compacted` below the sentinel, `Unavailable` past the last entry.
    fn term(&self, index: LogIndex) -> RaftResult<TermId>;

    /// Returns the most recent snapshot of the compacted prefix.
    ///
    /// # Errors
    /// Returns an error if no snapshot can be produced.
    fn snapshot(&self) -> RaftResult<Snapshot>;
}

/// In-memory [`Storage`] implementation for tests and drivers.
///
/// Holds a sentinel entry at position 0 marking the compaction boundary,
/// so `entries[i - sentinel]` is a valid lookup across the whole retained
/// range. Provides no durability.
#[derive(Debug)]
pub struct MemStorage {
    hard_state: HardState,
    conf_state: ConfState,
    /// entries[0] is the sentinel; its index/term describe the compacted
    /// prefix (index 0, term 0 on a fresh store).
    entries: Vec<LogEntry>,
}

impl MemStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hard_state: HardState::default(),
            conf_state: ConfState::default(),
            entries: vec![LogEntry::new(LogIndex::new(0), TermId::new(0), Bytes::new())],
        }
    }

    /// Creates a store pre-seeded with a membership, as a bootstrap helper.
    #[must_use]
    pub fn with_peers(peers: Vec<NodeId>) -> Self {
        let mut storage = Self::new();
        storage.conf_state = ConfState::new(peers);
        storage
    }

    /// Overwrites the persisted hard state.
    pub fn set_hard_state(&mut self, hard_state: HardState) {
        self.hard_state = hard_state;
    }

    /// Overwrites the persisted membership.
    pub fn set_conf_state(&mut self, conf_state: ConfState) {
        self.conf_state = conf_state;
    }

    /// Appends entries to the store.
    ///
    /// # Panics
    /// Panics if the entries do not continue the stored log densely.
    pub fn append(&mut self, entries: &[LogEntry]) {
        for entry in entries {
            let expected = self.last_offset_index() + 1;
            assert_eq!(
                entry.index.get(),
                expected,
                "storage entry index must be sequential: expected {}, got {}",
                expected,
                entry.index.get()
            );
            self.entries.push(entry.clone());
        }
    }

    /// Discards entries below `index`, making it the new sentinel.
    ///
    /// # Errors
    /// `Compacted` when `index` is already below the retained range,
    /// `Unavailable` when it reaches past the last entry.
    pub fn compact(&mut self, index: LogIndex) -> RaftResult<()> {
        let sentinel = self.sentinel_index();
        if index.get() <= sentinel {
            return Err(RaftError::Compacted {
                index,
                first: LogIndex::new(sentinel + 1),
            });
        }
        let last = self.last_offset_index();
        if index.get() > last {
            return Err(RaftError::Unavailable {
                index,
                last: LogIndex::new(last),
            });
        }
        let offset = (index.get() - sentinel) as usize;
        self.entries.drain(..offset);
        // The entry at `index` stays behind as the new sentinel; its
        // payload is dead weight from here on.
        self.entries[0].data = Bytes::new();
        Ok(())
    }

    fn sentinel_index(&self) -> u64 {
        self.entries[0].index.get()
    }

    fn last_offset_index(&self) -> u64 {
        self.sentinel_index() + self.entries.len() as u64 - 1
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemStorage {
    fn initial_state(&self) -> RaftResult<(HardState, ConfState)> {
        Ok((self.hard_state, self.conf_state.clone()))
    }

    fn first_index(&self) -> RaftResult<LogIndex> {
        Ok(LogIndex::new(self.sentinel_index() + 1))
    }

    fn last_index(&self) -> RaftResult<LogIndex> {
        Ok(LogIndex::new(self.last_offset_index()))
    }

    fn entries(&self, lo: LogIndex, hi: LogIndex) -> RaftResult<Vec<LogEntry>> {
        let sentinel = self.sentinel_index();
        if lo.get() <= sentinel {
            return Err(RaftError::Compacted {
                index: lo,
                first: LogIndex::new(sentinel + 1),
            });
        }
        let last = self.last_offset_index();
        if hi.get() > last + 1 {
            return Err(RaftError::Unavailable {
                index: hi,
                last: LogIndex::new(last),
            });
        }
        if lo >= hi {
            return Ok(Vec::new());
        }
        let start = (lo.get() - sentinel) as usize;
        let end = (hi.get() - sentinel) as usize;
        Ok(self.entries[start..end].to_vec())
    }

    fn term(&self, index: LogIndex) -> RaftResult<TermId> {
        let sentinel = self.sentinel_index();
        if index.get() < sentinel {
            return Err(RaftError::Compacted {
                index,
                first: LogIndex::new(sentinel + 1),
            });
        }
        let last = self.last_offset_index();
        if index.get() > last {
            return Err(RaftError::Unavailable {
                index,
                last: LogIndex::new(last),
            });
        }
        Ok(self.entries[(index.get() - sentinel) as usize].term)
    }

    fn snapshot(&self) -> RaftResult<Snapshot> {
        Ok(Snapshot {
            index: self.entries[0].index,
            term: self.entries[0].term,
            conf_state: self.conf_state.clone(),
            data: Bytes::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(term: u64, index: u64) -> LogEntry {
        LogEntry::new(
            LogIndex::new(index),
            TermId::new(term),
            Bytes::from(format!("entry-{index}")),
        )
    }

    #[test]
    fn test_empty_store_bounds() {
        let storage = MemStorage::new();

        assert_eq!(storage.first_index().unwrap().get(), 1);
        assert_eq!(storage.last_index().unwrap().get(), 0);
        assert_eq!(storage.term(LogIndex::new(0)).unwrap().get(), 0);
    }

    #[test]
    fn test_append_and_read() {
        let mut storage = MemStorage::new();
        storage.append(&[make_entry(1, 1), make_entry(1, 2), make_entry(2, 3)]);

        assert_eq!(storage.first_index().unwrap().get(), 1);
        assert_eq!(storage.last_index().unwrap().get(), 3);

        let range = storage
            .entries(LogIndex::new(1), LogIndex::new(3))
            .unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].index.get(), 1);
        assert_eq!(range[1].index.get(), 2);

        assert_eq!(storage.term(LogIndex::new(3)).unwrap().get(), 2);
    }

    #[test]
    fn test_entries_out_of_range() {
        let mut storage = MemStorage::new();
        storage.append(&[make_entry(1, 1), make_entry(1, 2)]);

        assert!(matches!(
            storage.entries(LogIndex::new(0), LogIndex::new(2)),
            Err(RaftError::Compacted { .. })
        ));
        assert!(matches!(
            storage.entries(LogIndex::new(1), LogIndex::new(4)),
            Err(RaftError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_compact_moves_sentinel() {
        let mut storage = MemStorage::new();
        storage.append(&[make_entry(1, 1), make_entry(1, 2), make_entry(2, 3)]);

        storage.compact(LogIndex::new(2)).unwrap();

        assert_eq!(storage.first_index().unwrap().get(), 3);
        assert_eq!(storage.last_index().unwrap().get(), 3);
        // The sentinel keeps the term of the compacted boundary entry.
        assert_eq!(storage.term(LogIndex::new(2)).unwrap().get(), 1);
        assert!(matches!(
            storage.term(LogIndex::new(1)),
            Err(RaftError::Compacted { .. })
        ));
    }

    #[test]
    fn test_hard_state_roundtrip() {
        let mut storage = MemStorage::new();
        let hs = HardState::new(TermId::new(3), Some(NodeId::new(2)), LogIndex::new(1));
        storage.set_hard_state(hs);

        let (loaded, _) = storage.initial_state().unwrap();
        assert_eq!(loaded, hs);
    }

    #[test]
    fn test_snapshot_describes_compacted_prefix() {
        let mut storage = MemStorage::with_peers(vec![NodeId::new(1), NodeId::new(2)]);
        storage.append(&[make_entry(1, 1), make_entry(2, 2)]);
        storage.compact(LogIndex::new(2)).unwrap();

        let snap = storage.snapshot().unwrap();
        assert_eq!(snap.index.get(), 2);
        assert_eq!(snap.term.get(), 2);
        assert_eq!(snap.conf_state.peers.len(), 2);
    }
}
