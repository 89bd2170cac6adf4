//! The driver handoff: what changed since the last drain.
//!
//! After a batch of `tick`/`step` calls the driver asks the peer for a
//! [`Ready`], then persists `entries` and `hard_state`, sends `messages`,
//! applies `committed_entries`, and acknowledges with
//! [`crate::Raft::advance`].

use crate::log::LogEntry;
use crate::message::Message;
use crate::storage::HardState;

/// A snapshot of pending work for the driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ready {
    /// The durable triple, present only when it changed since the last
    /// acknowledged `Ready`. Must be persisted before sending `messages`.
    pub hard_state: Option<HardState>,

    /// Entries not yet persisted, in index order. Must be persisted
    /// before sending `messages`.
    pub entries: Vec<LogEntry>,

    /// Committed entries the application has not applied yet, in index
    /// order.
    pub committed_entries: Vec<LogEntry>,

    /// Outbound messages, in the order the peer produced them.
    pub messages: Vec<Message>,
}

impl Ready {
    /// True when this `Ready` carries no work at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hard_state.is_none()
            && self.entries.is_empty()
            && self.committed_entries.is_empty()
            && self.messages.is_empty()
    }
}
