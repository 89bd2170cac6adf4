//! Message types driving the consensus state machine.
//!
//! Every input to [`crate::Raft::step`] is a `Message`. Peer-to-peer RPCs
//! carry `from`/`to`/`term`; the local variants (`Hup`, `Beat`, `Propose`,
//! `TransferLeader`) originate on the driver and never cross the wire
//! untargeted. The exact codec is left to the transport.

use bytes::Bytes;
use keel_core::{LogIndex, NodeId, TermId};

use crate::log::LogEntry;
use crate::storage::Snapshot;

/// Inputs to the consensus state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Local: start an election now, bypassing the timer.
    Hup,
    /// Local: broadcast a heartbeat now (leader only).
    Beat,
    /// Local: replicate the given payloads (leader only).
    Propose(ProposeRequest),
    /// Vote solicitation from a candidate.
    RequestVote(RequestVoteRequest),
    /// A voter's answer to a vote solicitation.
    RequestVoteResponse(RequestVoteResponse),
    /// Log replication from the leader; also carries the commit index.
    Append(AppendRequest),
    /// A follower's answer to an append.
    AppendResponse(AppendResponse),
    /// Leader liveness signal; carries no entries.
    Heartbeat(HeartbeatRequest),
    /// A follower's answer to a heartbeat.
    HeartbeatResponse(HeartbeatResponse),
    /// Snapshot offer from the leader for a peer that has fallen behind
    /// the compacted prefix. Installation is not implemented by the core.
    Snapshot(SnapshotRequest),
    /// Ask the leader to hand leadership to `target`.
    TransferLeader(TransferLeaderRequest),
    /// Leader's instruction to start an election immediately, used to
    /// complete a leadership transfer.
    TimeoutNow(TimeoutNowRequest),
}

impl Message {
    /// Source peer of the message, when it travels between peers.
    #[must_use]
    pub const fn from(&self) -> Option<NodeId> {
        match self {
            Self::Hup | Self::Beat | Self::Propose(_) | Self::TransferLeader(_) => None,
            Self::RequestVote(r) => Some(r.from),
            Self::RequestVoteResponse(r) => Some(r.from),
            Self::Append(r) => Some(r.from),
            Self::AppendResponse(r) => Some(r.from),
            Self::Heartbeat(r) => Some(r.from),
            Self::HeartbeatResponse(r) => Some(r.from),
            Self::Snapshot(r) => Some(r.from),
            Self::TimeoutNow(r) => Some(r.from),
        }
    }

    /// Destination peer, when the message travels between peers.
    #[must_use]
    pub const fn to(&self) -> Option<NodeId> {
        match self {
            Self::Hup | Self::Beat | Self::Propose(_) => None,
            Self::RequestVote(r) => Some(r.to),
            Self::RequestVoteResponse(r) => Some(r.to),
            Self::Append(r) => Some(r.to),
            Self::AppendResponse(r) => Some(r.to),
            Self::Heartbeat(r) => Some(r.to),
            Self::HeartbeatResponse(r) => Some(r.to),
            Self::Snapshot(r) => Some(r.to),
            Self::TransferLeader(r) => Some(r.to),
            Self::TimeoutNow(r) => Some(r.to),
        }
    }

    /// Term the message was produced in. Local inputs carry none.
    #[must_use]
    pub const fn term(&self) -> Option<TermId> {
        match self {
            Self::Hup | Self::Beat | Self::Propose(_) | Self::TransferLeader(_) => None,
            Self::RequestVote(r) => Some(r.term),
            Self::RequestVoteResponse(r) => Some(r.term),
            Self::Append(r) => Some(r.term),
            Self::AppendResponse(r) => Some(r.term),
            Self::Heartbeat(r) => Some(r.term),
            Self::HeartbeatResponse(r) => Some(r.term),
            Self::Snapshot(r) => Some(r.term),
            Self::TimeoutNow(r) => Some(r.term),
        }
    }

    /// True for inputs that originate on the local driver.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Hup | Self::Beat | Self::Propose(_) | Self::TransferLeader(_)
        )
    }
}

/// Payloads the driver wants replicated. Term and index are assigned by
/// the leader at append time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposeRequest {
    /// One payload per entry to append.
    pub entries: Vec<Bytes>,
}

impl ProposeRequest {
    /// Creates a proposal from raw payloads.
    #[must_use]
    pub fn new(entries: Vec<Bytes>) -> Self {
        Self { entries }
    }
}

/// Vote solicitation sent by a candidate to every other peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestVoteRequest {
    /// Candidate requesting the vote.
    pub from: NodeId,
    /// Target voter.
    pub to: NodeId,
    /// Candidate's term.
    pub term: TermId,
    /// Index of the candidate's last log entry.
    pub last_log_index: LogIndex,
    /// Term of the candidate's last log entry.
    pub last_log_term: TermId,
}

/// A voter's answer. `reject: false` grants the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestVoteResponse {
    /// The voter.
    pub from: NodeId,
    /// The candidate.
    pub to: NodeId,
    /// The voter's current term, for the candidate to update itself.
    pub term: TermId,
    /// True when the vote was denied.
    pub reject: bool,
}

/// Log replication RPC. An empty `entries` still refreshes leadership and
/// the commit index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRequest {
    /// The leader.
    pub from: NodeId,
    /// Target follower.
    pub to: NodeId,
    /// Leader's term.
    pub term: TermId,
    /// Index of the entry immediately preceding `entries`.
    pub prev_log_index: LogIndex,
    /// Term of the entry at `prev_log_index`.
    pub prev_log_term: TermId,
    /// Entries to store.
    pub entries: Vec<LogEntry>,
    /// Leader's commit index.
    pub commit: LogIndex,
}

/// A follower's answer to an append.
///
/// On accept, `index` is the follower's last index after the append. On
/// reject, it is a back-off hint: the follower's last index when its log
/// was too short, or the conflicting index minus one on a term mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResponse {
    /// The follower.
    pub from: NodeId,
    /// The leader.
    pub to: NodeId,
    /// The follower's current term.
    pub term: TermId,
    /// True when the append was refused.
    pub reject: bool,
    /// Match confirmation or back-off hint, per `reject`.
    pub index: LogIndex,
}

/// Leader liveness signal. Deliberately carries nothing but the term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatRequest {
    /// The leader.
    pub from: NodeId,
    /// Target follower.
    pub to: NodeId,
    /// Leader's term.
    pub term: TermId,
}

/// A follower's answer to a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatResponse {
    /// The follower.
    pub from: NodeId,
    /// The leader.
    pub to: NodeId,
    /// The follower's current term.
    pub term: TermId,
    /// True when the heartbeat came from a stale term.
    pub reject: bool,
}

/// Snapshot offer for a peer whose next entry has been compacted away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    /// The leader.
    pub from: NodeId,
    /// Target follower.
    pub to: NodeId,
    /// Leader's term.
    pub term: TermId,
    /// The offered snapshot.
    pub snapshot: Snapshot,
}

/// Ask the receiving leader to hand leadership to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLeaderRequest {
    /// The peer that should become the next leader.
    pub target: NodeId,
    /// The peer being asked; a non-leader forwards this to its leader.
    pub to: NodeId,
}

/// Instructs a caught-up transfer target to campaign immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutNowRequest {
    /// The transferring leader.
    pub from: NodeId,
    /// The transfer target.
    pub to: NodeId,
    /// The leader's term.
    pub term: TermId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_accessors() {
        let msg = Message::RequestVote(RequestVoteRequest {
            from: NodeId::new(1),
            to: NodeId::new(2),
            term: TermId::new(3),
            last_log_index: LogIndex::new(4),
            last_log_term: TermId::new(2),
        });

        assert_eq!(msg.from(), Some(NodeId::new(1)));
        assert_eq!(msg.to(), Some(NodeId::new(2)));
        assert_eq!(msg.term(), Some(TermId::new(3)));
        assert!(!msg.is_local());
    }

    #[test]
    fn test_local_inputs_carry_no_term() {
        let propose = Message::Propose(ProposeRequest::new(vec![Bytes::from("x")]));
        assert!(propose.is_local());
        assert_eq!(propose.term(), None);
        assert_eq!(propose.from(), None);

        assert!(Message::Hup.is_local());
        assert_eq!(Message::Hup.term(), None);
    }

    #[test]
    fn test_transfer_targets() {
        let msg = Message::TransferLeader(TransferLeaderRequest {
            target: NodeId::new(3),
            to: NodeId::new(1),
        });
        assert!(msg.is_local());
        assert_eq!(msg.to(), Some(NodeId::new(1)));
    }
}
