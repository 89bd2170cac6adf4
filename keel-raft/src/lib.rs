//! Keel Raft - deterministic Raft consensus core.
//!
//! This crate implements the Raft state machine as a pure, single-threaded
//! component: leader election, log replication, and commit advancement,
//! driven entirely by [`Raft::tick`] and [`Raft::step`]. It performs no
//! I/O; an external node layer feeds it messages, persists what
//! [`Ready`] hands back, and delivers its outbox.
//!
//! # Design Principles
//!
//! - **Deterministic**: all randomness comes from a seeded RNG
//! - **No internal timers**: logical time advances only through `tick`
//! - **Explicit failures**: invalid config and dropped proposals are
//!   returned values, never panics
//! - **No unsafe code**

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod log;
mod message;
mod progress;
mod raft;
mod ready;
mod storage;

pub use config::RaftConfig;
pub use error::{ConfigError, RaftError, RaftResult};
pub use log::{LogEntry, RaftLog};
pub use message::{
    AppendRequest, AppendResponse, HeartbeatRequest, HeartbeatResponse, Message, ProposeRequest,
    RequestVoteRequest, RequestVoteResponse, SnapshotRequest, TimeoutNowRequest,
    TransferLeaderRequest,
};
pub use progress::Progress;
pub use raft::{Raft, RaftState};
pub use ready::Ready;
pub use storage::{ConfState, HardState, MemStorage, Snapshot, Storage};

/// Configuration limits.
pub mod limits {
    /// Default election tick (ticks before a follower campaigns).
    ///
    /// The effective timeout is randomized in
    /// \[`election_tick`, 2 * `election_tick`) at each campaign. With a
    /// 100ms tick interval this gives a 1-2 second election timeout.
    pub const ELECTION_TICK_DEFAULT: u32 = 10;

    /// Default heartbeat tick (ticks between leader heartbeats).
    /// With a 100ms tick interval this gives a 100ms heartbeat.
    pub const HEARTBEAT_TICK_DEFAULT: u32 = 1;
}
