use std::io;

use crate::errors::JournalError;
use crate::partition::PartitionContext;
use crate::types::NodeId;

/// Failure of work submitted to a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
pub enum SchedulerError {
    /// The work was dropped before it produced a result.
    #[error("Scheduled work is cancelled")]
    Cancelled,

    #[error("Timeout waiting for scheduled work")]
    Timeout,
}

impl From<SchedulerError> for io::Error {
    fn from(value: SchedulerError) -> Self {
        let kind = match value {
            SchedulerError::Cancelled => io::ErrorKind::Interrupted,
            SchedulerError::Timeout => io::ErrorKind::TimedOut,
        };
        io::Error::new(kind, value)
    }
}

#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum PartitionError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Partition {0} is already started")]
    AlreadyStarted(u32),

    #[error("Partition {0} is not started")]
    NotStarted(u32),

    #[error("Node {node_id} is not a member of {members:?}")]
    NotAMember {
        node_id: NodeId,
        members: Vec<NodeId>,
    },

    /// The partition could not be closed. `context` still holds it.
    #[error("Partition {} failed to close: {}", .context.partition_id, .source)]
    CloseFailed {
        context: Box<PartitionContext>,
        #[source]
        source: JournalError,
    },
}
