use std::fmt;
use std::sync::Arc;

use crate::partition::Partition;
use crate::partition::Transport;
use crate::types::NodeId;
use crate::Config;

/// Everything needed to start a partition on this node, and the partition
/// once it is started.
#[derive(Clone)]
pub struct PartitionContext {
    pub partition_id: u32,
    pub node_id: NodeId,
    pub members: Vec<NodeId>,

    /// The node wide config; the partition stores its files in a sub
    /// directory of `config.dir`.
    pub config: Arc<Config>,

    pub transport: Arc<dyn Transport>,

    /// Set by a successful startup, cleared by shutdown.
    pub partition: Option<Arc<Partition>>,
}

impl PartitionContext {
    pub fn new(
        partition_id: u32,
        node_id: NodeId,
        members: impl IntoIterator<Item = NodeId>,
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            partition_id,
            node_id,
            members: members.into_iter().collect(),
            config,
            transport,
            partition: None,
        }
    }

    /// The config of the partition: `{dir}/partition-{partition_id}`.
    pub fn partition_config(&self) -> Config {
        self.config.with_dir(format!(
            "{}/partition-{}",
            self.config.dir, self.partition_id
        ))
    }
}

impl fmt::Debug for PartitionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionContext")
            .field("partition_id", &self.partition_id)
            .field("node_id", &self.node_id)
            .field("members", &self.members)
            .field("dir", &self.config.dir)
            .field("started", &self.partition.is_some())
            .finish()
    }
}
