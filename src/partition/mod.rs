//! A partition: one member of a replicated journal, driven by a scheduler.

mod context;
mod health;
mod lifecycle;
#[allow(clippy::module_inception)]
mod partition;

pub use context::PartitionContext;
pub use health::HealthStatus;
pub use health::PartitionHealth;
pub use lifecycle::PartitionLifecycle;
pub use partition::Partition;

use crate::raft::Envelope;

/// Delivers messages to other members of a partition.
///
/// Delivery may be lossy and reorder messages. The receiving side hands a
/// message to [`Partition::deliver`].
pub trait Transport: Send + Sync {
    fn send(&self, envelope: Envelope);
}
