//! Peer configuration.

use keel_core::{LogIndex, NodeId};

use crate::error::ConfigError;
use crate::limits::{ELECTION_TICK_DEFAULT, HEARTBEAT_TICK_DEFAULT};

/// Parameters for constructing a peer.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// The identity of the local peer. Cannot be zero.
    pub id: NodeId,

    /// Ids of all cluster members, including this peer. Set only when
    /// bootstrapping a new cluster; leave empty on restart and the
    /// membership persisted in storage is used instead.
    pub peers: Vec<NodeId>,

    /// Ticks without a valid message from the leader before a follower
    /// campaigns. Must be greater than `heartbeat_tick`; the effective
    /// timeout is re-randomized into `[election_tick, 2 * election_tick)`
    /// at each campaign.
    pub election_tick: u32,

    /// Ticks between leader heartbeats.
    pub heartbeat_tick: u32,

    /// Last applied index, set only when restarting so entries at or
    /// below it are not handed to the application again.
    pub applied: LogIndex,

    /// Seed for the election-jitter generator. Two peers constructed
    /// with the same seed and fed the same inputs behave identically.
    pub seed: u64,
}

impl RaftConfig {
    /// Creates a configuration with default tick settings.
    #[must_use]
    pub fn new(id: NodeId, peers: Vec<NodeId>) -> Self {
        Self {
            id,
            peers,
            election_tick: ELECTION_TICK_DEFAULT,
            heartbeat_tick: HEARTBEAT_TICK_DEFAULT,
            applied: LogIndex::new(0),
            seed: id.get(),
        }
    }

    /// Sets custom tick thresholds.
    #[must_use]
    pub const fn with_tick_config(mut self, election_tick: u32, heartbeat_tick: u32) -> Self {
        self.election_tick = election_tick;
        self.heartbeat_tick = heartbeat_tick;
        self
    }

    /// Sets the jitter seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the restart applied index.
    #[must_use]
    pub const fn with_applied(mut self, applied: LogIndex) -> Self {
        self.applied = applied;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.get() == 0 {
            return Err(ConfigError::ZeroId);
        }
        if self.heartbeat_tick == 0 {
            return Err(ConfigError::ZeroHeartbeatTick);
        }
        if self.election_tick <= self.heartbeat_tick {
            return Err(ConfigError::ElectionTickTooSmall {
                election: self.election_tick,
                heartbeat: self.heartbeat_tick,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_peers() -> Vec<NodeId> {
        vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]
    }

    #[test]
    fn test_defaults_validate() {
        let config = RaftConfig::new(NodeId::new(1), make_peers());
        assert!(config.validate().is_ok());
        assert_eq!(config.seed, 1);
        assert_eq!(config.applied.get(), 0);
    }

    #[test]
    fn test_zero_id_rejected() {
        let config = RaftConfig::new(NodeId::new(0), make_peers());
        assert_eq!(config.validate(), Err(ConfigError::ZeroId));
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let config = RaftConfig::new(NodeId::new(1), make_peers()).with_tick_config(10, 0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroHeartbeatTick));
    }

    #[test]
    fn test_election_tick_must_exceed_heartbeat() {
        let config = RaftConfig::new(NodeId::new(1), make_peers()).with_tick_config(2, 2);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ElectionTickTooSmall {
                election: 2,
                heartbeat: 2
            })
        );
    }
}
