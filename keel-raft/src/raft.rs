//! The peer state machine.
//!
//! A [`Raft`] is a pure state machine: it consumes ticks and messages and
//! produces outbound messages, log appends, and commit advances. It
//! performs no I/O and consults no wall clock, which makes every run a
//! deterministic function of the input stream and the jitter seed.

use std::collections::BTreeMap;

use bytes::Bytes;
use keel_core::{LogIndex, NodeId, TermId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::config::RaftConfig;
use crate::error::{ConfigError, RaftError, RaftResult};
use crate::log::{LogEntry, RaftLog};
use crate::message::{
    AppendRequest, AppendResponse, HeartbeatRequest, HeartbeatResponse, Message, ProposeRequest,
    RequestVoteRequest, RequestVoteResponse, SnapshotRequest, TimeoutNowRequest,
    TransferLeaderRequest,
};
use crate::progress::Progress;
use crate::ready::Ready;
use crate::storage::{HardState, Storage};

/// Peer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RaftState {
    /// Passive; answers RPCs and waits out the election timer.
    #[default]
    Follower,
    /// Actively soliciting votes.
    Candidate,
    /// Replicating the log and advancing the commit index.
    Leader,
}

/// A Raft consensus peer.
///
/// Role state is mutated only from inside [`Raft::step`] and
/// [`Raft::tick`]; the outbox is owned by the peer and drained only
/// through [`Raft::take_ready`].
#[derive(Debug)]
pub struct Raft {
    id: NodeId,
    term: TermId,
    vote: Option<NodeId>,
    lead: Option<NodeId>,
    state: RaftState,

    log: RaftLog,

    /// Replication cursors, one per member including self. Ordered so
    /// broadcasts hit peers in a stable order.
    prs: BTreeMap<NodeId, Progress>,

    /// Vote tally for the election in flight; absence means no answer yet.
    votes: BTreeMap<NodeId, bool>,

    /// Outbound messages awaiting drain.
    msgs: Vec<Message>,

    /// Configured election baseline; the effective timeout is
    /// re-randomized from it at each campaign.
    base_election_timeout: u32,
    heartbeat_timeout: u32,
    randomized_election_timeout: u32,
    election_elapsed: u32,
    heartbeat_elapsed: u32,

    rng: ChaCha8Rng,

    /// Transfer target while a leadership handoff is in flight.
    lead_transferee: Option<NodeId>,

    /// Admission guard for single-step membership changes: at most one
    /// may sit in the log unapplied. The full change protocol lives
    /// outside the core.
    pending_conf_index: LogIndex,

    /// Hard state as last acknowledged by the driver, for Ready deltas.
    prev_hard_state: HardState,
}

impl Raft {
    /// Constructs a peer from a validated config and durable storage.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] wrapped in [`RaftError::Config`] on an
    /// invalid configuration, or propagates storage read failures.
    pub fn new<S: Storage>(config: &RaftConfig, storage: &S) -> RaftResult<Self> {
        config.validate()?;

        let (hard_state, conf_state) = storage.initial_state()?;
        let log = RaftLog::new(storage)?;

        let membership = if config.peers.is_empty() {
            conf_state.peers
        } else {
            config.peers.clone()
        };
        if membership.is_empty() {
            return Err(ConfigError::EmptyMembership.into());
        }

        if config.applied.get() > 0
            && (config.applied < log.applied() || config.applied > log.committed())
        {
            return Err(ConfigError::AppliedOutOfRange {
                applied: config.applied.get(),
                first_allowed: log.applied().get(),
                committed: log.committed().get(),
            }
            .into());
        }

        let mut prs = BTreeMap::new();
        for id in membership {
            prs.insert(id, Progress::new(log.last_index()));
        }

        let mut raft = Self {
            id: config.id,
            term: hard_state.term,
            vote: hard_state.vote,
            lead: None,
            state: RaftState::Follower,
            log,
            prs,
            votes: BTreeMap::new(),
            msgs: Vec::new(),
            base_election_timeout: config.election_tick,
            heartbeat_timeout: config.heartbeat_tick,
            randomized_election_timeout: config.election_tick,
            election_elapsed: 0,
            heartbeat_elapsed: 0,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            lead_transferee: None,
            pending_conf_index: LogIndex::new(0),
            prev_hard_state: hard_state,
        };
        if config.applied.get() > 0 {
            raft.log.applied_to(config.applied);
        }
        Ok(raft)
    }

    /// This peer's id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Current term.
    #[must_use]
    pub const fn term(&self) -> TermId {
        self.term
    }

    /// Who we voted for in the current term, if anyone.
    #[must_use]
    pub const fn vote(&self) -> Option<NodeId> {
        self.vote
    }

    /// The leader we currently recognize, if any.
    #[must_use]
    pub const fn lead(&self) -> Option<NodeId> {
        self.lead
    }

    /// Current role.
    #[must_use]
    pub const fn state(&self) -> RaftState {
        self.state
    }

    /// True if this peer is the leader.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.state == RaftState::Leader
    }

    /// Highest committed index.
    #[must_use]
    pub const fn committed(&self) -> LogIndex {
        self.log.committed()
    }

    /// Last index in the log.
    #[must_use]
    pub fn last_index(&self) -> LogIndex {
        self.log.last_index()
    }

    /// Read-only view of the log.
    #[must_use]
    pub const fn log(&self) -> &RaftLog {
        &self.log
    }

    /// Replication cursor for `id`, when this peer tracks one.
    #[must_use]
    pub fn progress(&self, id: NodeId) -> Option<&Progress> {
        self.prs.get(&id)
    }

    /// Pending leadership-transfer target, if a handoff is in flight.
    #[must_use]
    pub const fn lead_transferee(&self) -> Option<NodeId> {
        self.lead_transferee
    }

    /// Index of the latest unapplied membership change, if any.
    #[must_use]
    pub const fn pending_conf_index(&self) -> LogIndex {
        self.pending_conf_index
    }

    /// The durable triple as of now.
    #[must_use]
    pub const fn hard_state(&self) -> HardState {
        HardState::new(self.term, self.vote, self.log.committed())
    }

    /// Advances the logical clock by one tick.
    pub fn tick(&mut self) {
        match self.state {
            RaftState::Follower | RaftState::Candidate => {
                self.election_elapsed += 1;
                if self.election_elapsed >= self.randomized_election_timeout {
                    self.campaign();
                }
            }
            RaftState::Leader => {
                self.heartbeat_elapsed += 1;
                if self.heartbeat_elapsed >= self.heartbeat_timeout {
                    self.heartbeat_elapsed = 0;
                    self.bcast_heartbeat();
                }
                if self.lead_transferee.is_some() {
                    // Bound how long a handoff can block proposals.
                    self.election_elapsed += 1;
                    if self.election_elapsed >= self.base_election_timeout {
                        self.election_elapsed = 0;
                        self.lead_transferee = None;
                    }
                }
            }
        }
    }

    /// The single entry point for all inputs.
    ///
    /// # Errors
    /// [`RaftError::ProposalDropped`] when a proposal cannot be accepted.
    pub fn step(&mut self, m: Message) -> RaftResult<()> {
        // A higher term turns any role into a follower before the message
        // body is looked at. Only append-like traffic names a leader.
        if let Some(term) = m.term() {
            if term > self.term {
                let lead = match &m {
                    Message::Append(r) => Some(r.from),
                    Message::Heartbeat(r) => Some(r.from),
                    Message::Snapshot(r) => Some(r.from),
                    _ => None,
                };
                self.become_follower(term, lead);
            }
        }

        match self.state {
            RaftState::Follower => self.step_follower(m),
            RaftState::Candidate => self.step_candidate(m),
            RaftState::Leader => self.step_leader(m),
        }
    }

    /// Convenience wrapper: propose payloads for replication.
    ///
    /// # Errors
    /// [`RaftError::ProposalDropped`] when this peer is not the leader or
    /// a leadership transfer is in flight.
    pub fn propose(&mut self, payloads: Vec<Bytes>) -> RaftResult<()> {
        self.step(Message::Propose(ProposeRequest::new(payloads)))
    }

    fn step_follower(&mut self, m: Message) -> RaftResult<()> {
        match m {
            Message::Hup => {
                self.campaign();
                Ok(())
            }
            Message::Beat => Ok(()),
            Message::Propose(_) => {
                warn!(id = %self.id, "proposal dropped: not leader");
                Err(RaftError::ProposalDropped {
                    reason: "not leader",
                })
            }
            Message::RequestVote(r) => {
                self.handle_request_vote(&r);
                Ok(())
            }
            Message::Append(r) => {
                self.handle_append(r);
                Ok(())
            }
            Message::Heartbeat(r) => {
                self.handle_heartbeat(&r);
                Ok(())
            }
            Message::Snapshot(r) => {
                self.handle_snapshot(&r);
                Ok(())
            }
            Message::TransferLeader(r) => {
                // Not ours to decide; hand it to the leader we know of.
                if let Some(lead) = self.lead {
                    self.msgs.push(Message::TransferLeader(TransferLeaderRequest {
                        target: r.target,
                        to: lead,
                    }));
                } else {
                    debug!(id = %self.id, to = %r.target, "no leader known, dropping transfer request");
                }
                Ok(())
            }
            Message::TimeoutNow(r) => {
                self.handle_timeout_now(&r);
                Ok(())
            }
            Message::RequestVoteResponse(_)
            | Message::AppendResponse(_)
            | Message::HeartbeatResponse(_) => Ok(()),
        }
    }

    fn step_candidate(&mut self, m: Message) -> RaftResult<()> {
        match m {
            Message::Hup => {
                self.campaign();
                Ok(())
            }
            Message::Beat => Ok(()),
            Message::Propose(_) => {
                warn!(id = %self.id, "proposal dropped: election in progress");
                Err(RaftError::ProposalDropped {
                    reason: "not leader",
                })
            }
            Message::RequestVote(r) => {
                self.handle_request_vote(&r);
                Ok(())
            }
            Message::RequestVoteResponse(r) => {
                self.handle_vote_response(&r);
                Ok(())
            }
            Message::Append(r) => {
                // An equal-term append means a leader won this election.
                if r.term >= self.term {
                    self.become_follower(r.term, Some(r.from));
                }
                self.handle_append(r);
                Ok(())
            }
            Message::Heartbeat(r) => {
                if r.term >= self.term {
                    self.become_follower(r.term, Some(r.from));
                }
                self.handle_heartbeat(&r);
                Ok(())
            }
            Message::Snapshot(r) => {
                if r.term >= self.term {
                    self.become_follower(r.term, Some(r.from));
                }
                self.handle_snapshot(&r);
                Ok(())
            }
            Message::TransferLeader(r) => {
                debug!(id = %self.id, to = %r.target, "no leader known, dropping transfer request");
                Ok(())
            }
            Message::AppendResponse(_)
            | Message::HeartbeatResponse(_)
            | Message::TimeoutNow(_) => Ok(()),
        }
    }

    fn step_leader(&mut self, m: Message) -> RaftResult<()> {
        match m {
            Message::Hup => Ok(()),
            Message::Beat => {
                self.bcast_heartbeat();
                Ok(())
            }
            Message::Propose(r) => self.handle_propose(r),
            Message::RequestVote(r) => {
                self.handle_request_vote(&r);
                Ok(())
            }
            Message::Append(r) => {
                self.handle_append(r);
                Ok(())
            }
            Message::AppendResponse(r) => {
                self.handle_append_response(&r);
                Ok(())
            }
            Message::Heartbeat(r) => {
                self.handle_heartbeat(&r);
                Ok(())
            }
            Message::HeartbeatResponse(r) => {
                self.handle_heartbeat_response(&r);
                Ok(())
            }
            Message::TransferLeader(r) => {
                self.handle_transfer_leader(&r);
                Ok(())
            }
            Message::RequestVoteResponse(_)
            | Message::Snapshot(_)
            | Message::TimeoutNow(_) => Ok(()),
        }
    }

    /// Starts an election: bump the term, vote for self, solicit votes.
    fn campaign(&mut self) {
        if !self.prs.contains_key(&self.id) {
            debug!(id = %self.id, "not a member, refusing to campaign");
            return;
        }

        self.become_candidate();

        let last_log_index = self.log.last_index();
        let last_log_term = self.log.last_term();
        for peer in self.peer_ids() {
            self.msgs.push(Message::RequestVote(RequestVoteRequest {
                from: self.id,
                to: peer,
                term: self.term,
                last_log_index,
                last_log_term,
            }));
        }

        // A lone member needs no votes.
        if self.prs.len() == 1 {
            self.become_leader();
        }
    }

    fn become_follower(&mut self, term: TermId, lead: Option<NodeId>) {
        debug_assert!(term >= self.term);
        if term > self.term {
            self.term = term;
            self.vote = None;
        }
        // Stepping down within the same term keeps the vote: granting a
        // second vote in one term would elect two leaders.
        self.state = RaftState::Follower;
        self.lead = lead;
        self.election_elapsed = 0;
        self.lead_transferee = None;
        self.votes.clear();
        debug!(id = %self.id, term = %self.term, lead = ?self.lead, "became follower");
    }

    fn become_candidate(&mut self) {
        self.state = RaftState::Candidate;
        self.term = self.term.next();
        self.vote = Some(self.id);
        self.lead = None;
        self.lead_transferee = None;
        self.votes.clear();
        self.votes.insert(self.id, true);
        self.election_elapsed = 0;
        self.randomized_election_timeout =
            self.base_election_timeout + self.rng.gen_range(0..self.base_election_timeout);
        debug!(id = %self.id, term = %self.term, "became candidate");
    }

    fn become_leader(&mut self) {
        debug_assert_eq!(self.state, RaftState::Candidate);
        self.state = RaftState::Leader;
        self.lead = Some(self.id);
        self.heartbeat_elapsed = 0;
        self.election_elapsed = 0;

        // Reset cursors against the pre-noop tail so the noop itself is
        // replicated to everyone.
        let prev_last = self.log.last_index();
        for pr in self.prs.values_mut() {
            *pr = Progress::new(prev_last);
        }

        // The noop carries the new term into the log; without it the
        // commit rule could never fire for this term.
        self.log.append(LogEntry::noop(prev_last.next(), self.term));
        self.refresh_self_progress();

        debug!(id = %self.id, term = %self.term, "became leader");

        self.bcast_append();
        self.maybe_commit();
    }

    fn handle_propose(&mut self, r: ProposeRequest) -> RaftResult<()> {
        if self.lead_transferee.is_some() {
            warn!(id = %self.id, "proposal dropped: leadership transfer in progress");
            return Err(RaftError::ProposalDropped {
                reason: "leadership transfer in progress",
            });
        }
        if r.entries.is_empty() {
            warn!(id = %self.id, "ignoring empty proposal");
            return Ok(());
        }

        for data in r.entries {
            let index = self.log.last_index().next();
            self.log.append(LogEntry::new(index, self.term, data));
        }
        self.refresh_self_progress();

        self.bcast_append();
        self.maybe_commit();
        Ok(())
    }

    /// Follower-side append handling.
    fn handle_append(&mut self, m: AppendRequest) {
        if m.term < self.term {
            self.msgs.push(Message::AppendResponse(AppendResponse {
                from: self.id,
                to: m.from,
                term: self.term,
                reject: true,
                index: self.log.last_index(),
            }));
            return;
        }

        // The sender is the current-term leader.
        self.lead = Some(m.from);
        self.election_elapsed = 0;

        // Our log must reach prev_log_index at all...
        if m.prev_log_index > self.log.last_index() {
            self.msgs.push(Message::AppendResponse(AppendResponse {
                from: self.id,
                to: m.from,
                term: self.term,
                reject: true,
                index: self.log.last_index(),
            }));
            return;
        }
        // ...with a matching term there. Entries below the dummy are
        // committed and match by definition.
        if let Ok(local_term) = self.log.term(m.prev_log_index) {
            if local_term != m.prev_log_term {
                self.msgs.push(Message::AppendResponse(AppendResponse {
                    from: self.id,
                    to: m.from,
                    term: self.term,
                    reject: true,
                    index: LogIndex::new(m.prev_log_index.get() - 1),
                }));
                return;
            }
        }

        // Walk the overlap; the first diverging term truncates our tail.
        let mut j = 0usize;
        let mut i = m.prev_log_index.get() + 1;
        while i <= self.log.last_index().get() && j < m.entries.len() {
            if self.log.term(LogIndex::new(i)) != Ok(m.entries[j].term) {
                self.log.truncate_from(LogIndex::new(i));
                break;
            }
            i += 1;
            j += 1;
        }
        for entry in m.entries.into_iter().skip(j) {
            self.log.append(entry);
        }

        if m.commit > self.log.committed() {
            let new_commit = LogIndex::new(m.commit.get().min(self.log.last_index().get()));
            self.log.commit_to(new_commit);
        }

        self.msgs.push(Message::AppendResponse(AppendResponse {
            from: self.id,
            to: m.from,
            term: self.term,
            reject: false,
            index: self.log.last_index(),
        }));
    }

    /// Leader-side append-response handling.
    fn handle_append_response(&mut self, m: &AppendResponse) {
        if m.term < self.term {
            return;
        }
        let Some(pr) = self.prs.get_mut(&m.from) else {
            return;
        };

        if m.reject {
            pr.record_reject(m.index);
            self.send_append(m.from);
            return;
        }

        if pr.record_success(m.index) {
            self.maybe_commit();
        }

        // A pending handoff completes once the target holds everything.
        if self.lead_transferee == Some(m.from)
            && self
                .prs
                .get(&m.from)
                .is_some_and(|pr| pr.is_caught_up(self.log.last_index()))
        {
            self.send_timeout_now(m.from);
        }
    }

    fn handle_request_vote(&mut self, m: &RequestVoteRequest) {
        let grant = m.term >= self.term
            && (self.vote.is_none() || self.vote == Some(m.from))
            && self.log.is_up_to_date(m.last_log_term, m.last_log_index);

        if grant {
            self.vote = Some(m.from);
            self.election_elapsed = 0;
        }

        self.msgs.push(Message::RequestVoteResponse(RequestVoteResponse {
            from: self.id,
            to: m.from,
            term: self.term,
            reject: !grant,
        }));
    }

    /// Candidate-side tally.
    fn handle_vote_response(&mut self, m: &RequestVoteResponse) {
        if m.term < self.term {
            return;
        }
        self.votes.insert(m.from, !m.reject);

        let granted = self.votes.values().filter(|granted| **granted).count();
        let rejected = self.votes.len() - granted;
        if granted >= self.quorum() {
            self.become_leader();
        } else if rejected >= self.quorum() {
            // The paper leaves this open; an explicit majority of
            // rejections means this candidacy cannot win, so stop
            // disrupting the cluster and wait out the next timeout.
            self.become_follower(self.term, None);
        }
    }

    fn handle_heartbeat(&mut self, m: &HeartbeatRequest) {
        if m.term < self.term {
            self.msgs.push(Message::HeartbeatResponse(HeartbeatResponse {
                from: self.id,
                to: m.from,
                term: self.term,
                reject: true,
            }));
            return;
        }

        self.lead = Some(m.from);
        self.election_elapsed = 0;
        self.msgs.push(Message::HeartbeatResponse(HeartbeatResponse {
            from: self.id,
            to: m.from,
            term: self.term,
            reject: false,
        }));
    }

    /// Leader-side heartbeat-response handling: catch a lagging follower
    /// up without waiting for the next proposal.
    fn handle_heartbeat_response(&mut self, m: &HeartbeatResponse) {
        if m.term < self.term {
            return;
        }
        if self
            .prs
            .get(&m.from)
            .is_some_and(|pr| !pr.is_caught_up(self.log.last_index()))
        {
            self.send_append(m.from);
        }
    }

    /// Snapshot offers are acknowledged but not installed; the reply
    /// tells the leader where our log actually ends so it can fall back
    /// to plain appends.
    fn handle_snapshot(&mut self, m: &SnapshotRequest) {
        if m.term < self.term {
            return;
        }
        self.lead = Some(m.from);
        self.election_elapsed = 0;
        debug!(
            id = %self.id,
            snapshot_index = %m.snapshot.index,
            "snapshot installation not implemented, ignoring payload"
        );
        self.msgs.push(Message::AppendResponse(AppendResponse {
            from: self.id,
            to: m.from,
            term: self.term,
            reject: false,
            index: self.log.last_index(),
        }));
    }

    fn handle_transfer_leader(&mut self, m: &TransferLeaderRequest) {
        let target = m.target;
        if target == self.id {
            debug!(id = %self.id, "already leader, ignoring transfer to self");
            return;
        }
        if !self.prs.contains_key(&target) {
            debug!(id = %self.id, to = %target, "transfer target is not a member");
            return;
        }
        if self.lead_transferee == Some(target) {
            return;
        }

        self.lead_transferee = Some(target);
        self.election_elapsed = 0;

        if self
            .prs
            .get(&target)
            .is_some_and(|pr| pr.is_caught_up(self.log.last_index()))
        {
            self.send_timeout_now(target);
        } else {
            self.send_append(target);
        }
    }

    fn handle_timeout_now(&mut self, m: &TimeoutNowRequest) {
        if m.term < self.term {
            return;
        }
        if !self.prs.contains_key(&self.id) {
            debug!(id = %self.id, "not a member, ignoring timeout-now");
            return;
        }
        self.campaign();
    }

    /// Admits a new member with an empty cursor.
    pub fn add_node(&mut self, id: NodeId) {
        let fresh = Progress::new(self.log.last_index());
        self.prs.entry(id).or_insert(fresh);
    }

    /// Removes a member. On the leader the quorum may have shrunk, so
    /// pending entries get another commit attempt.
    pub fn remove_node(&mut self, id: NodeId) {
        if self.prs.remove(&id).is_none() {
            return;
        }
        if self.lead_transferee == Some(id) {
            self.lead_transferee = None;
        }
        if self.state == RaftState::Leader && !self.prs.is_empty() {
            self.maybe_commit();
        }
    }

    /// True when there is work for the driver.
    #[must_use]
    pub fn has_ready(&self) -> bool {
        !self.msgs.is_empty()
            || !self.log.unstable_entries().is_empty()
            || !self.log.next_ents().is_empty()
            || self.hard_state() != self.prev_hard_state
    }

    /// Drains the outbox and snapshots pending persistence/apply work.
    pub fn take_ready(&mut self) -> Ready {
        let hard_state = self.hard_state();
        Ready {
            hard_state: (hard_state != self.prev_hard_state).then_some(hard_state),
            entries: self.log.unstable_entries().to_vec(),
            committed_entries: self.log.next_ents().to_vec(),
            messages: std::mem::take(&mut self.msgs),
        }
    }

    /// Acknowledges a [`Ready`]: the driver has persisted `entries` and
    /// `hard_state` and applied `committed_entries`.
    pub fn advance(&mut self, ready: &Ready) {
        if let Some(entry) = ready.entries.last() {
            self.log.stabled_to(entry.index);
        }
        if let Some(entry) = ready.committed_entries.last() {
            self.log.applied_to(entry.index);
        }
        if let Some(hard_state) = ready.hard_state {
            self.prev_hard_state = hard_state;
        }
    }

    /// Builds and queues an append for `to`, from its `next` cursor.
    fn send_append(&mut self, to: NodeId) {
        let Some(pr) = self.prs.get(&to) else {
            return;
        };
        let next = pr.next_index;
        let prev_log_index = LogIndex::new(next.get() - 1);

        let Ok(prev_log_term) = self.log.term(prev_log_index) else {
            // The peer's next entry is behind our compacted prefix; only
            // a snapshot could help it and we do not produce those.
            debug!(id = %self.id, to = %to, next = %next, "peer needs a snapshot, not implemented");
            return;
        };
        let Ok(entries) = self.log.entries_from(next) else {
            debug!(id = %self.id, to = %to, next = %next, "peer needs a snapshot, not implemented");
            return;
        };

        self.msgs.push(Message::Append(AppendRequest {
            from: self.id,
            to,
            term: self.term,
            prev_log_index,
            prev_log_term,
            entries,
            commit: self.log.committed(),
        }));
        self.refresh_self_progress();
    }

    fn send_timeout_now(&mut self, to: NodeId) {
        debug!(id = %self.id, to = %to, "target caught up, requesting immediate election");
        self.msgs.push(Message::TimeoutNow(TimeoutNowRequest {
            from: self.id,
            to,
            term: self.term,
        }));
    }

    fn bcast_append(&mut self) {
        for peer in self.peer_ids() {
            self.send_append(peer);
        }
    }

    fn bcast_heartbeat(&mut self) {
        for peer in self.peer_ids() {
            self.msgs.push(Message::Heartbeat(HeartbeatRequest {
                from: self.id,
                to: peer,
                term: self.term,
            }));
        }
    }

    /// Advances the commit index per the quorum-match rule and, when it
    /// moves, broadcasts so followers learn the new commit index.
    ///
    /// Only entries of the current term count: committing an
    /// earlier-term entry by count alone could later be overwritten.
    fn maybe_commit(&mut self) -> bool {
        let mut advanced = false;
        for i in self.log.committed().get() + 1..=self.log.last_index().get() {
            let index = LogIndex::new(i);
            if self.log.term(index) != Ok(self.term) {
                continue;
            }
            let replicated = self
                .prs
                .values()
                .filter(|pr| pr.match_index >= index)
                .count();
            if replicated >= self.quorum() {
                self.log.commit_to(index);
                advanced = true;
            }
        }
        if advanced {
            self.bcast_append();
        }
        advanced
    }

    fn refresh_self_progress(&mut self) {
        let last_index = self.log.last_index();
        if let Some(pr) = self.prs.get_mut(&self.id) {
            *pr = Progress::up_to_date(last_index);
        }
    }

    fn quorum(&self) -> usize {
        self.prs.len() / 2 + 1
    }

    fn peer_ids(&self) -> Vec<NodeId> {
        self.prs.keys().copied().filter(|id| *id != self.id).collect()
    }
}
