use std::fmt;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::api::callback::CommitResult;
use crate::errors::JournalError;
use crate::journal::JournalReader;
use crate::partition::HealthStatus;
use crate::partition::PartitionHealth;
use crate::partition::Transport;
use crate::raft::Envelope;
use crate::raft::RaftNode;
use crate::raft::SnapshotRequired;
use crate::scheduler::ScheduledFuture;
use crate::scheduler::TimerHandle;
use crate::types::Asqn;
use crate::types::Index;
use crate::types::NodeId;
use crate::types::Term;

pub(crate) type PartitionNode = RaftNode<SyncSender<CommitResult>>;

/// A started partition on this node.
///
/// All operations lock the consensus core for their duration; messages it
/// produces are handed to the transport after the lock is released.
pub struct Partition {
    partition_id: u32,
    node_id: NodeId,
    node: Mutex<PartitionNode>,
    transport: Arc<dyn Transport>,
    timer: Mutex<Option<TimerHandle>>,

    /// Returned by the next [`close`](Self::close) instead of closing.
    #[cfg(test)]
    close_failure: Mutex<Option<JournalError>>,
}

impl Partition {
    pub(crate) fn new(
        partition_id: u32,
        node: PartitionNode,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            partition_id,
            node_id: node.id(),
            node: Mutex::new(node),
            transport,
            timer: Mutex::new(None),
            #[cfg(test)]
            close_failure: Mutex::new(None),
        }
    }

    pub(crate) fn set_timer(&self, timer: TimerHandle) {
        *lock(&self.timer) = Some(timer);
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Propose a record. The future resolves with its index once it is
    /// committed.
    pub fn propose(&self, asqn: Asqn, data: &[u8]) -> ScheduledFuture<CommitResult> {
        let (tx, fu) = ScheduledFuture::channel();
        self.with_node(|n| n.propose(asqn, data, tx));
        fu
    }

    /// Handle a message received from another member.
    pub fn deliver(&self, envelope: Envelope) {
        self.with_node(|n| n.step(envelope));
    }

    pub fn tick(&self) {
        self.with_node(|n| n.tick());
    }

    /// Release journal segments below `lowest_index_still_needed`.
    pub fn compact(
        &self,
        lowest_index_still_needed: Index,
    ) -> Result<Index, JournalError> {
        self.with_node(|n| n.compact(lowest_index_still_needed))
    }

    pub fn install_snapshot(&self, index: Index, term: Term) -> Result<(), JournalError> {
        self.with_node(|n| n.install_snapshot(index, term))
    }

    /// The snapshot the leader asked this node to install, if any.
    pub fn snapshot_required(&self) -> Option<SnapshotRequired> {
        lock(&self.node).snapshot_required().cloned()
    }

    pub fn open_reader(&self) -> JournalReader {
        lock(&self.node).journal().open_reader()
    }

    /// Open a reader of committed records, the feed of the application.
    pub fn open_committed_reader(&self) -> JournalReader {
        lock(&self.node).journal().open_committed_reader()
    }

    pub fn health(&self) -> PartitionHealth {
        let n = lock(&self.node);

        let status = if n.is_stopped() {
            HealthStatus::Stopped
        } else if let Some(reason) = n.health_issue() {
            HealthStatus::Unhealthy(reason.to_string())
        } else {
            HealthStatus::Healthy
        };

        PartitionHealth {
            partition_id: self.partition_id,
            node_id: self.node_id,
            role: n.role(),
            term: n.term(),
            leader: n.leader(),
            commit_index: n.commit_index(),
            last_index: n.last_index(),
            status,
        }
    }

    /// Stop ticking, fail pending proposals and close the journal.
    pub(crate) fn close(&self) -> Result<(), JournalError> {
        let timer = lock(&self.timer).take();
        if let Some(t) = timer {
            t.cancel();
        }

        #[cfg(test)]
        if let Some(e) = lock(&self.close_failure).take() {
            return Err(e);
        }

        lock(&self.node).stop()
    }

    #[cfg(test)]
    pub(crate) fn fail_next_close(&self, error: JournalError) {
        *lock(&self.close_failure) = Some(error);
    }

    fn with_node<T>(&self, f: impl FnOnce(&mut PartitionNode) -> T) -> T {
        let (res, outbox) = {
            let mut n = lock(&self.node);
            let res = f(&mut n);
            (res, n.take_outbox())
        };

        for envelope in outbox {
            self.transport.send(envelope);
        }
        res
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("partition_id", &self.partition_id)
            .field("node_id", &self.node_id)
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}
