use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io;
use std::mem;
use std::sync::Arc;

use log::debug;
use log::error;
use log::info;
use log::warn;

use crate::api::callback::Callback;
use crate::errors::JournalError;
use crate::errors::LogInconsistency;
use crate::errors::ProposeError;
use crate::journal::Journal;
use crate::raft::election_timer::ElectionTimer;
use crate::raft::entry::RaftEntry;
use crate::raft::message::AppendRequest;
use crate::raft::message::AppendResponse;
use crate::raft::message::Envelope;
use crate::raft::message::Message;
use crate::raft::message::PollRequest;
use crate::raft::message::PollResponse;
use crate::raft::message::SnapshotRequired;
use crate::raft::message::VoteRequest;
use crate::raft::message::VoteResponse;
use crate::raft::meta_store::MetaStore;
use crate::raft::meta_store::RaftMeta;
use crate::raft::pending::PendingProposals;
use crate::raft::progress::quorum;
use crate::raft::progress::quorum_index;
use crate::raft::progress::Progress;
use crate::raft::RaftRole;
use crate::types::Asqn;
use crate::types::Index;
use crate::types::NodeId;
use crate::types::Term;
use crate::types::ASQN_IGNORE;
use crate::Config;

struct LeaderState<C> {
    progress: BTreeMap<NodeId, Progress>,

    /// Index of the initial entry of this term. Nothing below it is committed
    /// by counting replicas.
    initial_index: Index,

    heartbeat_elapsed: u64,

    pending: PendingProposals<C>,
}

enum RoleState<C> {
    Follower,

    /// A follower polling its peers before it starts an election.
    PreCandidate { accepted: BTreeSet<NodeId> },

    Candidate { votes: BTreeSet<NodeId> },
    Leader(LeaderState<C>),
}

/// What a leader sends to a follower on one replication attempt.
enum Replication {
    Skip,
    Snapshot(SnapshotRequired),
    Append { from: Index, with_entries: bool },
}

/// The consensus core of one member of a replicated journal.
///
/// A `RaftNode` does no I/O besides its journal and meta store and has no
/// clock: time advances by [`tick`](Self::tick), messages come in through
/// [`step`](Self::step) and go out through [`take_outbox`](Self::take_outbox).
pub struct RaftNode<C> {
    id: NodeId,
    members: BTreeSet<NodeId>,
    config: Arc<Config>,

    journal: Journal,
    meta: MetaStore,

    role: RoleState<C>,
    leader: Option<NodeId>,

    /// Term of the entry at `journal.last_index()`.
    last_log_term: Term,

    election_timer: ElectionTimer,

    /// Ticks since the node was created.
    now: u64,

    outbox: Vec<Envelope>,

    /// The last snapshot a leader asked this node to install.
    snapshot_required: Option<SnapshotRequired>,

    unhealthy: Option<String>,
    stopped: bool,
}

impl<C: Callback> RaftNode<C> {
    pub fn new(
        id: NodeId,
        members: impl IntoIterator<Item = NodeId>,
        config: Arc<Config>,
        mut journal: Journal,
        meta: MetaStore,
    ) -> Result<Self, JournalError> {
        let members = members.into_iter().collect::<BTreeSet<_>>();
        if !members.contains(&id) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("node {} is not a member of {:?}", id, members),
            )
            .into());
        }

        let m = *meta.meta();
        if m.snapshot_index > journal.commit_index() {
            if journal.last_index() < m.snapshot_index {
                journal.reset(m.snapshot_index + 1)?;
            } else {
                journal.set_commit_index(m.snapshot_index)?;
            }
        }

        let seed = config.random_seed() ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let election_timer = ElectionTimer::new(config.election_timeout_ticks(), seed);

        let mut node = Self {
            id,
            members,
            config,
            journal,
            meta,
            role: RoleState::Follower,
            leader: None,
            last_log_term: 0,
            election_timer,
            now: 0,
            outbox: vec![],
            snapshot_required: None,
            unhealthy: None,
            stopped: false,
        };

        node.last_log_term =
            node.term_at(node.journal.last_index())?.unwrap_or(m.snapshot_term);

        info!(
            "RaftNode-{} started: term: {}, voted_for: {:?}, log: [{}, {}], commit: {}",
            node.id,
            node.term(),
            node.voted_for(),
            node.journal.first_index(),
            node.journal.last_index(),
            node.journal.commit_index()
        );

        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn members(&self) -> &BTreeSet<NodeId> {
        &self.members
    }

    pub fn role(&self) -> RaftRole {
        match self.role {
            RoleState::Follower => RaftRole::Follower,
            RoleState::PreCandidate { .. } => RaftRole::Follower,
            RoleState::Candidate { .. } => RaftRole::Candidate,
            RoleState::Leader(_) => RaftRole::Leader,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, RoleState::Leader(_))
    }

    pub fn term(&self) -> Term {
        self.meta.meta().term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.meta.meta().voted_for
    }

    /// The leader of the current term, if known.
    pub fn leader(&self) -> Option<NodeId> {
        self.leader
    }

    pub fn first_index(&self) -> Index {
        self.journal.first_index()
    }

    pub fn last_index(&self) -> Index {
        self.journal.last_index()
    }

    pub fn commit_index(&self) -> Index {
        self.journal.commit_index()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn is_healthy(&self) -> bool {
        self.unhealthy.is_none()
    }

    /// Why the node is unhealthy.
    pub fn health_issue(&self) -> Option<&str> {
        self.unhealthy.as_deref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The snapshot a leader asked for that is not installed yet.
    pub fn snapshot_required(&self) -> Option<&SnapshotRequired> {
        self.snapshot_required.as_ref()
    }

    /// Drain the messages to send.
    pub fn take_outbox(&mut self) -> Vec<Envelope> {
        mem::take(&mut self.outbox)
    }

    /// Advance the logical clock by one tick.
    pub fn tick(&mut self) {
        if self.stopped {
            return;
        }

        self.now += 1;

        if self.is_leader() {
            self.tick_leader();
        } else if self.election_timer.tick() {
            self.on_election_timeout();
        }
    }

    fn tick_leader(&mut self) {
        let now = self.now;
        let term = self.term();
        let heartbeat_ticks = self.config.heartbeat_ticks();

        let RoleState::Leader(l) = &mut self.role else {
            return;
        };

        l.pending.expire(now, term);

        l.heartbeat_elapsed += 1;
        let heartbeat = l.heartbeat_elapsed >= heartbeat_ticks;
        if heartbeat {
            l.heartbeat_elapsed = 0;
        }

        self.replicate_all(heartbeat);
    }

    fn on_election_timeout(&mut self) {
        if let RoleState::Candidate { .. } = self.role {
            info!(
                "RaftNode-{} election of term {} timed out, back off",
                self.id,
                self.term()
            );
            self.role = RoleState::Follower;
            self.election_timer.reset();
            return;
        }

        if let Some(reason) = &self.unhealthy {
            warn!(
                "RaftNode-{} does not start an election while unhealthy: {}",
                self.id, reason
            );
            self.election_timer.reset();
            return;
        }

        if self.config.pre_vote() && quorum(self.members.len()) > 1 {
            self.start_poll();
        } else {
            self.start_election();
        }
    }

    /// Ask the peers whether they would vote for this node, without changing
    /// the term. The election starts once a majority accepted.
    fn start_poll(&mut self) {
        let term = self.term();

        info!(
            "RaftNode-{} polls for an election after term {}, last log: {}-{}",
            self.id,
            term,
            self.last_log_term,
            self.journal.last_index()
        );

        self.role = RoleState::PreCandidate {
            accepted: BTreeSet::from([self.id]),
        };
        self.leader = None;
        self.election_timer.reset();

        let req = PollRequest {
            term,
            candidate: self.id,
            last_log_index: self.journal.last_index(),
            last_log_term: self.last_log_term,
        };
        for peer in self.peers() {
            self.send(peer, req.clone());
        }
    }

    fn start_election(&mut self) {
        let term = self.term() + 1;

        let meta = RaftMeta {
            term,
            voted_for: Some(self.id),
            ..*self.meta.meta()
        };
        if let Err(e) = self.meta.store(meta) {
            self.fail_io(e);
            self.election_timer.reset();
            return;
        }

        info!(
            "RaftNode-{} starts election of term {}, last log: {}-{}",
            self.id,
            term,
            self.last_log_term,
            self.journal.last_index()
        );

        self.role = RoleState::Candidate {
            votes: BTreeSet::from([self.id]),
        };
        self.leader = None;
        self.election_timer.reset();

        if quorum(self.members.len()) <= 1 {
            self.become_leader();
            return;
        }

        let req = VoteRequest {
            term,
            candidate: self.id,
            last_log_index: self.journal.last_index(),
            last_log_term: self.last_log_term,
        };
        for peer in self.peers() {
            self.send(peer, req.clone());
        }
    }

    fn become_leader(&mut self) {
        let term = self.term();

        let index = match self.append_entry(ASQN_IGNORE, RaftEntry::initial(term)) {
            Ok(index) => index,
            Err(e) => {
                self.handle_journal_error(e);
                return;
            }
        };

        info!(
            "RaftNode-{} becomes leader of term {}, initial entry at {}",
            self.id, term, index
        );

        let progress = self
            .peers()
            .into_iter()
            .map(|peer| (peer, Progress::new(index)))
            .collect();

        self.role = RoleState::Leader(LeaderState {
            progress,
            initial_index: index,
            heartbeat_elapsed: 0,
            pending: PendingProposals::new(),
        });
        self.leader = Some(self.id);

        self.replicate_all(true);
        self.maybe_commit();
    }

    /// Follow `leader` in `term`, which must not be lower than the current
    /// one. Pending proposals of a leader fail.
    fn become_follower(
        &mut self,
        term: Term,
        leader: Option<NodeId>,
    ) -> Result<(), io::Error> {
        if term > self.term() {
            let meta = RaftMeta {
                term,
                voted_for: None,
                ..*self.meta.meta()
            };
            self.meta.store(meta)?;
        }

        let prev = mem::replace(&mut self.role, RoleState::Follower);
        if let RoleState::Leader(mut l) = prev {
            info!(
                "RaftNode-{} steps down in term {}, new leader: {:?}",
                self.id, term, leader
            );
            l.pending.fail_all(ProposeError::not_leader(leader));
        }

        self.leader = leader;
        self.election_timer.reset();
        Ok(())
    }

    /// Append `data` as an entry of the current term.
    ///
    /// The callback receives the committed index, or an error if the entry
    /// can not be committed.
    pub fn propose(&mut self, asqn: Asqn, data: &[u8], callback: C) {
        if self.stopped {
            callback.send(Err(ProposeError::Stopped));
            return;
        }

        if !self.is_leader() {
            callback.send(Err(ProposeError::not_leader(self.leader)));
            return;
        }

        let term = self.term();
        let index = match self.append_entry(asqn, RaftEntry::application(term, data)) {
            Ok(index) => index,
            Err(JournalError::RecordTooLarge(e)) => {
                callback.send(Err(ProposeError::journal(e)));
                return;
            }
            Err(e) => {
                callback.send(Err(ProposeError::journal(&e)));
                self.handle_journal_error(e);
                return;
            }
        };

        debug!("RaftNode-{} appended proposal at {}", self.id, index);

        let deadline = self.now + self.config.request_timeout_ticks();
        if let RoleState::Leader(l) = &mut self.role {
            l.pending.insert(index, deadline, callback);
        }

        self.replicate_all(false);
        self.maybe_commit();
    }

    /// Append and flush an entry of the current term on the leader.
    fn append_entry(
        &mut self,
        asqn: Asqn,
        entry: RaftEntry,
    ) -> Result<Index, JournalError> {
        let buf = entry.to_bytes()?;
        let index = self.journal.append(asqn, &buf)?;
        self.journal.flush()?;
        self.last_log_term = entry.term;
        Ok(index)
    }

    /// Handle a message from another member.
    pub fn step(&mut self, envelope: Envelope) {
        if self.stopped {
            return;
        }

        let Envelope { from, to, message } = envelope;

        if to != self.id || from == self.id || !self.members.contains(&from) {
            warn!(
                "RaftNode-{} ignores message from {} to {}: {}",
                self.id, from, to, message
            );
            return;
        }

        // A poll may come from a node that lost the leader; it must not
        // change the term.
        let is_poll = matches!(message, Message::PollRequest(_));

        if !is_poll && message.term() > self.term() {
            if let Err(e) = self.become_follower(message.term(), message.leader()) {
                self.fail_io(e);
                return;
            }
        }

        match message {
            Message::PollRequest(m) => self.handle_poll_request(from, m),
            Message::PollResponse(m) => self.handle_poll_response(from, m),
            Message::VoteRequest(m) => self.handle_vote_request(from, m),
            Message::VoteResponse(m) => self.handle_vote_response(from, m),
            Message::AppendRequest(m) => self.handle_append_request(from, m),
            Message::AppendResponse(m) => self.handle_append_response(from, m),
            Message::SnapshotRequired(m) => self.handle_snapshot_required(from, m),
        }
    }

    /// Whether a log ending at `last_log_term`-`last_log_index` is at least as
    /// up to date as the local one.
    fn is_up_to_date(&self, last_log_term: Term, last_log_index: Index) -> bool {
        (last_log_term, last_log_index) >= (self.last_log_term, self.journal.last_index())
    }

    fn handle_poll_request(&mut self, from: NodeId, req: PollRequest) {
        let term = self.term();

        if self.is_leader() {
            // The poller lost contact with this leader: send it a heartbeat
            // right away instead of waiting for the next one.
            if let RoleState::Leader(l) = &mut self.role {
                if let Some(p) = l.progress.get_mut(&from) {
                    p.inflight_until = None;
                }
            }
            self.send(from, PollResponse {
                term,
                accepted: false,
            });
            self.replicate(from, true);
            return;
        }

        // A follower that heard from its leader recently keeps following it.
        let has_leader = self.leader.is_some() && self.election_timer.within_base();

        let accepted = req.term >= term
            && !has_leader
            && self.is_up_to_date(req.last_log_term, req.last_log_index);

        debug!(
            "RaftNode-{} poll from {} of term {}: {}",
            self.id, req.candidate, req.term, accepted
        );

        self.send(from, PollResponse { term, accepted });
    }

    fn handle_poll_response(&mut self, from: NodeId, resp: PollResponse) {
        if !resp.accepted {
            return;
        }

        let RoleState::PreCandidate { accepted } = &mut self.role else {
            return;
        };

        accepted.insert(from);
        if accepted.len() >= quorum(self.members.len()) {
            self.start_election();
        }
    }

    fn handle_vote_request(&mut self, from: NodeId, req: VoteRequest) {
        let term = self.term();

        let granted = req.term == term
            && self.voted_for().map_or(true, |v| v == req.candidate)
            && self.is_up_to_date(req.last_log_term, req.last_log_index);

        if granted {
            let meta = RaftMeta {
                voted_for: Some(req.candidate),
                ..*self.meta.meta()
            };
            if let Err(e) = self.meta.store(meta) {
                self.fail_io(e);
                return;
            }
            self.election_timer.reset();
        }

        debug!(
            "RaftNode-{} vote for {} in term {}: {}",
            self.id, req.candidate, req.term, granted
        );

        self.send(from, VoteResponse { term, granted });
    }

    fn handle_vote_response(&mut self, from: NodeId, resp: VoteResponse) {
        if resp.term != self.term() || !resp.granted {
            return;
        }

        let RoleState::Candidate { votes } = &mut self.role else {
            return;
        };

        votes.insert(from);
        if votes.len() >= quorum(self.members.len()) {
            self.become_leader();
        }
    }

    fn handle_append_request(&mut self, from: NodeId, req: AppendRequest) {
        let term = self.term();

        if req.term < term {
            let resp = AppendResponse {
                term,
                success: false,
                last_index: self.journal.last_index(),
                conflict: None,
            };
            self.send(from, resp);
            return;
        }

        if self.is_leader() {
            error!(
                "RaftNode-{} is leader of term {} but received: {}",
                self.id,
                term,
                Message::AppendRequest(req)
            );
            return;
        }

        if self.leader != Some(req.leader) || !matches!(self.role, RoleState::Follower) {
            if let Err(e) = self.become_follower(term, Some(req.leader)) {
                self.fail_io(e);
                return;
            }
        }
        self.election_timer.reset();

        match self.accept_entries(&req) {
            Ok(resp) => self.send(from, resp),
            Err(e) => self.handle_journal_error(e),
        }
    }

    /// Store the entries of an append request that continue the local log and
    /// advance the commit index.
    fn accept_entries(
        &mut self,
        req: &AppendRequest,
    ) -> Result<AppendResponse, JournalError> {
        let term = self.term();
        let first = self.journal.first_index();
        let last = self.journal.last_index();

        let reject = |hint: Index, local_term: Option<Term>| AppendResponse {
            term,
            success: false,
            last_index: hint,
            conflict: Some(LogInconsistency::new(
                req.prev_index,
                req.prev_term,
                local_term,
                last,
            )),
        };

        let contiguous = req
            .entries
            .iter()
            .enumerate()
            .all(|(i, r)| r.index == req.prev_index + 1 + i as u64);
        if !contiguous {
            warn!(
                "RaftNode-{} received non-contiguous entries after {}",
                self.id, req.prev_index
            );
            return Ok(reject(last, None));
        }

        if req.prev_index > last {
            return Ok(reject(last, None));
        }

        // Below `first - 1` everything is compacted, thus committed.
        if req.prev_index + 1 >= first {
            let local_term = self.term_at(req.prev_index)?;
            if local_term != Some(req.prev_term) {
                return Ok(reject(req.prev_index.saturating_sub(1), local_term));
            }
        }

        let mut appended = false;
        let mut last_new = req.prev_index;

        for record in &req.entries {
            last_new = record.index;

            if record.index < first {
                continue;
            }

            if record.index <= self.journal.last_index() {
                let local_term = self.term_at(record.index)?;
                let remote_term = RaftEntry::term_of(&record.data)?;
                if local_term == Some(remote_term) {
                    continue;
                }

                let commit = self.journal.commit_index();
                if record.index <= commit {
                    error!(
                        "RaftNode-{} conflicting entry at {} below commit index {}: local term {:?}, leader term {}",
                        self.id, record.index, commit, local_term, remote_term
                    );
                    return Ok(reject(commit, local_term));
                }

                info!(
                    "RaftNode-{} removes conflicting entries from {}",
                    self.id, record.index
                );
                self.journal.delete_after(record.index - 1)?;
            }

            self.journal.append_record(record)?;
            appended = true;
        }

        if appended {
            self.journal.flush()?;
            let last = self.journal.last_index();
            self.last_log_term = self.term_at(last)?.unwrap_or(self.last_log_term);
        }

        let commit = req.commit_index.min(last_new);
        if commit > self.journal.commit_index() {
            self.journal.set_commit_index(commit)?;
        }

        Ok(AppendResponse {
            term,
            success: true,
            last_index: last_new,
            conflict: None,
        })
    }

    fn handle_append_response(&mut self, from: NodeId, resp: AppendResponse) {
        if resp.term != self.term() {
            return;
        }

        let now = self.now;
        let id = self.id;

        let RoleState::Leader(l) = &mut self.role else {
            return;
        };
        let Some(p) = l.progress.get_mut(&from) else {
            return;
        };

        p.inflight_until = None;

        if resp.success {
            p.snapshot_until = None;
            p.match_index = p.match_index.max(resp.last_index);
            p.next_index = p.next_index.max(p.match_index + 1);

            self.maybe_commit();
            self.replicate(from, false);
            return;
        }

        if let Some(c) = &resp.conflict {
            debug!("RaftNode-{} append to {} rejected: {}", id, from, c);
        }

        let next = (p.match_index + 1).max(
            p.next_index
                .saturating_sub(1)
                .min(resp.last_index + 1),
        );
        let changed = next != p.next_index;
        p.next_index = next;

        if changed && !p.snapshot_pending(now) {
            self.replicate(from, false);
        }
    }

    fn handle_snapshot_required(&mut self, from: NodeId, req: SnapshotRequired) {
        if req.term < self.term() {
            return;
        }

        if self.leader != Some(req.leader) || !matches!(self.role, RoleState::Follower) {
            if let Err(e) = self.become_follower(req.term, Some(req.leader)) {
                self.fail_io(e);
                return;
            }
        }
        self.election_timer.reset();

        let commit = self.journal.commit_index();
        if commit >= req.snapshot_index {
            self.snapshot_required = None;
            let resp = AppendResponse {
                term: self.term(),
                success: true,
                last_index: commit,
                conflict: None,
            };
            self.send(from, resp);
            return;
        }

        if self.snapshot_required.as_ref() != Some(&req) {
            info!(
                "RaftNode-{} requires a snapshot up to {}-{} from leader {}",
                self.id, req.snapshot_term, req.snapshot_index, req.leader
            );
        }
        self.snapshot_required = Some(req);
    }

    fn replicate_all(&mut self, force: bool) {
        for peer in self.peers() {
            self.replicate(peer, force);
        }
    }

    /// Send the entries a follower is missing.
    ///
    /// Without `force`, nothing is sent to a follower that has a request in
    /// flight or is up to date. With `force` at least a heartbeat is sent.
    fn replicate(&mut self, peer: NodeId, force: bool) {
        let now = self.now;
        let term = self.term();
        let first = self.journal.first_index();
        let last = self.journal.last_index();
        let inflight_ticks = self.config.election_timeout_ticks();
        let snapshot_ticks = self.config.request_timeout_ticks();
        let snapshot_term = self.meta.meta().snapshot_term;

        let RoleState::Leader(l) = &mut self.role else {
            return;
        };
        let Some(p) = l.progress.get_mut(&peer) else {
            return;
        };

        let idle = p.is_idle(now);

        let replication = if !force && !(idle && p.next_index <= last) {
            Replication::Skip
        } else if p.next_index < first {
            if force || !p.snapshot_pending(now) {
                if !p.snapshot_pending(now) {
                    p.snapshot_until = Some(now + snapshot_ticks);
                }
                Replication::Snapshot(SnapshotRequired {
                    term,
                    leader: self.id,
                    snapshot_index: first - 1,
                    snapshot_term,
                })
            } else {
                Replication::Skip
            }
        } else {
            let with_entries = idle && p.next_index <= last;
            if with_entries {
                p.inflight_until = Some(now + inflight_ticks);
            }
            Replication::Append {
                from: p.next_index,
                with_entries,
            }
        };

        let (from, with_entries) = match replication {
            Replication::Skip => return,
            Replication::Snapshot(req) => {
                self.send(peer, req);
                return;
            }
            Replication::Append { from, with_entries } => (from, with_entries),
        };

        let prev_index = from - 1;
        let prev_term = match self.term_at(prev_index) {
            Ok(Some(t)) => t,
            Ok(None) => {
                warn!(
                    "RaftNode-{} has no term for {}, can not replicate to {}",
                    self.id, prev_index, peer
                );
                return;
            }
            Err(e) => {
                self.handle_journal_error(e);
                return;
            }
        };

        let entries = if with_entries {
            match self.journal.read_range(from, self.config.max_append_entries()) {
                Ok(entries) => entries,
                Err(e) => {
                    self.handle_journal_error(e);
                    return;
                }
            }
        } else {
            vec![]
        };

        let req = AppendRequest {
            term,
            leader: self.id,
            prev_index,
            prev_term,
            entries,
            commit_index: self.journal.commit_index(),
        };
        self.send(peer, req);
    }

    /// Commit the highest index of this term stored on a quorum.
    fn maybe_commit(&mut self) {
        let last = self.journal.last_index();
        let commit = self.journal.commit_index();

        let RoleState::Leader(l) = &self.role else {
            return;
        };

        let mut matched =
            l.progress.values().map(|p| p.match_index).collect::<Vec<_>>();
        matched.push(last);

        let index = quorum_index(matched, quorum(self.members.len()));
        if index < l.initial_index || index <= commit {
            return;
        }

        if let Err(e) = self.journal.set_commit_index(index) {
            self.handle_journal_error(e);
            return;
        }

        debug!("RaftNode-{} commit index: {}", self.id, index);

        if let RoleState::Leader(l) = &mut self.role {
            l.pending.commit(index);
        }
    }

    /// Allow the journal to discard entries below `lowest_index_still_needed`.
    ///
    /// Only whole committed segments are removed. The boundary is recorded as
    /// the snapshot in the meta store first. Returns the first index left.
    pub fn compact(
        &mut self,
        lowest_index_still_needed: Index,
    ) -> Result<Index, JournalError> {
        let point = self.journal.compaction_point(lowest_index_still_needed);
        let snapshot_index = point - 1;

        if snapshot_index > self.meta.meta().snapshot_index {
            let Some(snapshot_term) = self.term_at(snapshot_index)? else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("no term found for compaction boundary {}", snapshot_index),
                )
                .into());
            };

            let meta = RaftMeta {
                snapshot_index,
                snapshot_term,
                ..*self.meta.meta()
            };
            if let Err(e) = self.meta.store(meta) {
                self.mark_unhealthy(e.to_string());
                return Err(e.into());
            }
        }

        self.journal.compact(point)
    }

    /// Replace the log with a snapshot up to `index` obtained out of band.
    ///
    /// Ignored if `index` is already committed.
    pub fn install_snapshot(
        &mut self,
        index: Index,
        term: Term,
    ) -> Result<(), JournalError> {
        if index <= self.journal.commit_index() {
            info!(
                "RaftNode-{} ignores snapshot up to {}, commit index is {}",
                self.id,
                index,
                self.journal.commit_index()
            );
            return Ok(());
        }

        if self.is_leader() {
            self.become_follower(self.term(), None)?;
        }

        let meta = RaftMeta {
            snapshot_index: index,
            snapshot_term: term,
            ..*self.meta.meta()
        };

        let res = self
            .meta
            .store(meta)
            .map_err(JournalError::from)
            .and_then(|_| self.journal.reset(index + 1));

        if let Err(e) = res {
            self.mark_unhealthy(e.to_string());
            return Err(e);
        }

        info!("RaftNode-{} installed snapshot up to {}-{}", self.id, term, index);

        self.last_log_term = term;
        self.snapshot_required = None;
        Ok(())
    }

    /// Fail pending proposals and close the journal. The node ignores any
    /// further input.
    pub fn stop(&mut self) -> Result<(), JournalError> {
        if !self.stopped {
            self.stopped = true;
            self.outbox.clear();

            if let RoleState::Leader(mut l) =
                mem::replace(&mut self.role, RoleState::Follower)
            {
                l.pending.fail_all(ProposeError::Stopped);
            }

            info!("RaftNode-{} stopped in term {}", self.id, self.term());
        }

        // Retried by a later call if it fails.
        self.journal.close()
    }

    /// Term of the entry at `index`, `None` if it is not in the journal.
    fn term_at(&self, index: Index) -> Result<Option<Term>, JournalError> {
        let meta = self.meta.meta();
        if index == meta.snapshot_index {
            return Ok(Some(meta.snapshot_term));
        }

        match self.journal.read(index)? {
            Some(record) => Ok(Some(RaftEntry::term_of(&record.data)?)),
            None => Ok(None),
        }
    }

    fn peers(&self) -> Vec<NodeId> {
        self.members.iter().copied().filter(|m| *m != self.id).collect()
    }

    fn send(&mut self, to: NodeId, message: impl Into<Message>) {
        self.outbox.push(Envelope::new(self.id, to, message));
    }

    fn handle_journal_error(&mut self, e: JournalError) {
        self.mark_unhealthy(e.to_string());
    }

    fn fail_io(&mut self, e: io::Error) {
        self.mark_unhealthy(e.to_string());
    }

    /// A failed write leaves the local state unknown: stop leading and fail
    /// whatever waits for a commit.
    fn mark_unhealthy(&mut self, reason: String) {
        error!("RaftNode-{} storage failure: {}", self.id, reason);

        if let RoleState::Leader(mut l) = mem::replace(&mut self.role, RoleState::Follower) {
            l.pending.fail_all(ProposeError::Journal(reason.clone()));
            self.leader = None;
        }

        self.unhealthy = Some(reason);
    }
}
