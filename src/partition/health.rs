use std::fmt;

use crate::raft::RaftRole;
use crate::types::Index;
use crate::types::NodeId;
use crate::types::Term;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,

    /// Storage failed; the reason is the last error.
    Unhealthy(String),

    Stopped,
}

/// A snapshot of the state of a partition on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionHealth {
    pub partition_id: u32,
    pub node_id: NodeId,
    pub role: RaftRole,
    pub term: Term,
    pub leader: Option<NodeId>,
    pub commit_index: Index,
    pub last_index: Index,
    pub status: HealthStatus,
}

impl PartitionHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

impl fmt::Display for PartitionHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Partition-{}@{}: {} of term {}, leader: {:?}, commit: {}, last: {}, status: ",
            self.partition_id,
            self.node_id,
            self.role,
            self.term,
            self.leader,
            self.commit_index,
            self.last_index
        )?;
        match &self.status {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy(reason) => write!(f, "unhealthy: {}", reason),
            HealthStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HealthStatus;
    use super::PartitionHealth;
    use crate::raft::RaftRole;

    #[test]
    fn test_display() {
        let h = PartitionHealth {
            partition_id: 3,
            node_id: 1,
            role: RaftRole::Leader,
            term: 2,
            leader: Some(1),
            commit_index: 5,
            last_index: 6,
            status: HealthStatus::Unhealthy("disk full".to_string()),
        };

        assert!(!h.is_healthy());
        assert_eq!(
            "Partition-3@1: Leader of term 2, leader: Some(1), commit: 5, last: 6, status: unhealthy: disk full",
            h.to_string()
        );
    }
}
