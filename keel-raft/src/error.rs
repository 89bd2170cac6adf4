//! Error types for the consensus core.
//!
//! All errors are explicit values. Message-level protocol failures (stale
//! terms, log mismatches) are not errors; they travel as rejection replies.

use keel_core::LogIndex;
use thiserror::Error;

/// Result type for consensus operations.
pub type RaftResult<T> = Result<T, RaftError>;

/// Errors surfaced by the consensus core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RaftError {
    /// A proposal could not be accepted and was dropped, so the proposer
    /// can be notified and fail fast.
    #[error("proposal dropped: {reason}")]
    ProposalDropped {
        /// Why the proposal was refused.
        reason: &'static str,
    },

    /// The requested index has been compacted away.
    #[error("index {index} has been compacted (first retained index is {first})")]
    Compacted {
        /// The index that was requested.
        index: LogIndex,
        /// The first index still retained.
        first: LogIndex,
    },

    /// The requested index is past the end of the log.
    #[error("index {index} is unavailable (last index is {last})")]
    Unavailable {
        /// The index that was requested.
        index: LogIndex,
        /// The last index present.
        last: LogIndex,
    },

    /// The peer was constructed from an invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Construction-time configuration failures. Fatal to the driver.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Zero is reserved as the "no node" placeholder.
    #[error("cannot use zero as node id")]
    ZeroId,

    /// The heartbeat interval must be at least one tick.
    #[error("heartbeat tick must be greater than 0")]
    ZeroHeartbeatTick,

    /// Elections must fire strictly less often than heartbeats.
    #[error("election tick ({election}) must be greater than heartbeat tick ({heartbeat})")]
    ElectionTickTooSmall {
        /// Configured election tick.
        election: u32,
        /// Configured heartbeat tick.
        heartbeat: u32,
    },

    /// Neither the config nor the stored membership named any peers.
    #[error("cluster membership is empty")]
    EmptyMembership,

    /// The restart `applied` hint is outside the recovered log bounds.
    #[error("applied index {applied} out of range [{first_allowed}, {committed}]")]
    AppliedOutOfRange {
        /// The configured applied index.
        applied: u64,
        /// The lowest acceptable value.
        first_allowed: u64,
        /// The committed index recovered from storage.
        committed: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RaftError::Compacted {
            index: LogIndex::new(3),
            first: LogIndex::new(5),
        };
        assert_eq!(
            format!("{err}"),
            "index idx-3 has been compacted (first retained index is idx-5)"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: RaftError = ConfigError::ZeroId.into();
        assert_eq!(format!("{err}"), "cannot use zero as node id");
    }
}
