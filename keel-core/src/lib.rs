//! Keel Core - strongly-typed identifiers for the Keel consensus stack.
//!
//! This crate provides the id newtypes shared by the workspace. It carries
//! no I/O, no clock, and no dependencies; the consensus core in `keel-raft`
//! builds on these types.
//!
//! # Design Principles
//!
//! - **Strongly-typed IDs**: a `NodeId` cannot be mixed up with a `LogIndex`
//! - **Explicit widths**: u64 everywhere, never `usize`
//! - **No unsafe code**

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod types;

pub use types::{LogIndex, NodeId, TermId};
