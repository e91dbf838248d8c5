//! An in-memory cluster of [`RaftNode`]s for tests.
//!
//! Time and message delivery are driven by the test: messages are queued and
//! delivered by [`TestCluster::deliver_all`], and a node that is down neither
//! ticks nor sends or receives messages.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::mpsc::sync_channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::api::callback::CommitResult;
use crate::errors::JournalError;
use crate::raft::Envelope;
use crate::raft::MetaStore;
use crate::raft::RaftEntry;
use crate::raft::RaftNode;
use crate::tests::context::TestContext;
use crate::types::NodeId;
use crate::types::Term;
use crate::Config;
use crate::Journal;

pub(crate) type TestNode = RaftNode<SyncSender<CommitResult>>;

pub(crate) struct TestCluster {
    members: Vec<NodeId>,
    contexts: BTreeMap<NodeId, TestContext>,
    nodes: BTreeMap<NodeId, TestNode>,
    down: BTreeSet<NodeId>,
    queue: VecDeque<Envelope>,

    /// Drop messages with this probability.
    drop_rate: f64,
    rng: StdRng,
}

impl TestCluster {
    pub(crate) fn new(n: u64) -> Result<Self, JournalError> {
        Self::with_config(n, |_| {})
    }

    pub(crate) fn with_config(
        n: u64,
        f: impl Fn(&mut Config),
    ) -> Result<Self, JournalError> {
        let members = (1..=n).collect::<Vec<_>>();

        let mut cluster = Self {
            members: members.clone(),
            contexts: BTreeMap::new(),
            nodes: BTreeMap::new(),
            down: BTreeSet::new(),
            queue: VecDeque::new(),
            drop_rate: 0.0,
            rng: StdRng::seed_from_u64(7),
        };

        for id in members {
            let mut ctx = TestContext::new()?;
            ctx.config.election_timeout_ticks = Some(10);
            ctx.config.heartbeat_ticks = Some(2);
            ctx.config.request_timeout_ticks = Some(30);
            ctx.config.random_seed = Some(1);
            f(&mut ctx.config);

            let node = Self::open_node(id, &cluster.members, &ctx)?;
            cluster.contexts.insert(id, ctx);
            cluster.nodes.insert(id, node);
        }

        Ok(cluster)
    }

    fn open_node(
        id: NodeId,
        members: &[NodeId],
        ctx: &TestContext,
    ) -> Result<TestNode, JournalError> {
        let config = ctx.arc_config();
        let journal = Journal::open(config.clone())?;
        let meta = MetaStore::open(&config)?;
        RaftNode::new(id, members.iter().copied(), config, journal, meta)
    }

    pub(crate) fn node(&self, id: NodeId) -> &TestNode {
        &self.nodes[&id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TestNode {
        self.nodes.get_mut(&id).unwrap()
    }

    pub(crate) fn set_drop_rate(&mut self, rate: f64) {
        self.drop_rate = rate;
    }

    pub(crate) fn set_down(&mut self, id: NodeId) {
        self.node_mut(id).take_outbox();
        self.down.insert(id);
    }

    pub(crate) fn set_up(&mut self, id: NodeId) {
        self.down.remove(&id);
    }

    /// Stop a node and open it again from its files.
    pub(crate) fn restart(&mut self, id: NodeId) -> Result<(), JournalError> {
        if let Some(mut node) = self.nodes.remove(&id) {
            node.stop()?;
        }

        let node = Self::open_node(id, &self.members, &self.contexts[&id])?;
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Tick one node and deliver the resulting messages.
    pub(crate) fn tick(&mut self, id: NodeId) {
        self.node_mut(id).tick();
        self.collect(id);
        self.deliver_all();
    }

    /// Tick every node that is up `n` times, delivering messages after each
    /// round.
    pub(crate) fn tick_all(&mut self, n: usize) {
        for _ in 0..n {
            let ids = self.up_nodes();
            for id in ids {
                self.node_mut(id).tick();
                self.collect(id);
            }
            self.deliver_all();
        }
    }

    /// Tick only `id` until it starts an election, then deliver messages
    /// until the election is decided.
    pub(crate) fn elect(&mut self, id: NodeId) {
        let term = self.node(id).term();
        while self.node(id).term() == term {
            self.tick(id);
        }
        assert!(
            self.node(id).is_leader(),
            "node {} is not elected: {:?}",
            id,
            self.node(id).role()
        );
    }

    pub(crate) fn propose(&mut self, id: NodeId, data: &str) -> Receiver<CommitResult> {
        let (tx, rx) = sync_channel(1);
        self.node_mut(id).propose(0, data.as_bytes(), tx);
        self.collect(id);
        rx
    }

    pub(crate) fn deliver_all(&mut self) {
        while let Some(envelope) = self.queue.pop_front() {
            if self.down.contains(&envelope.from) || self.down.contains(&envelope.to) {
                continue;
            }

            if self.drop_rate > 0.0 && self.rng.random_bool(self.drop_rate) {
                continue;
            }

            let to = envelope.to;
            self.node_mut(to).step(envelope);
            self.collect(to);
        }
    }

    fn collect(&mut self, id: NodeId) {
        let outbox = self.node_mut(id).take_outbox();
        if self.down.contains(&id) {
            return;
        }
        self.queue.extend(outbox);
    }

    pub(crate) fn up_nodes(&self) -> Vec<NodeId> {
        self.members
            .iter()
            .copied()
            .filter(|id| !self.down.contains(id))
            .collect()
    }

    /// Leaders among the nodes that are up, with their terms.
    pub(crate) fn leaders(&self) -> Vec<(Term, NodeId)> {
        self.up_nodes()
            .into_iter()
            .filter(|id| self.node(*id).is_leader())
            .map(|id| (self.node(id).term(), id))
            .collect()
    }

    /// `(term, data)` of every entry in the journal of a node.
    pub(crate) fn log(&self, id: NodeId) -> Result<Vec<(Term, Option<String>)>, JournalError> {
        let node = self.node(id);
        let journal = node.journal();
        let records = journal.read_range(journal.first_index(), usize::MAX)?;

        let mut entries = vec![];
        for r in records {
            let entry = RaftEntry::from_record(&r)?;
            let data = entry
                .data()
                .map(|d| String::from_utf8_lossy(d).to_string());
            entries.push((entry.term, data));
        }
        Ok(entries)
    }
}
