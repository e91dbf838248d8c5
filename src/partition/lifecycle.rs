use std::sync::Arc;

use log::error;
use log::info;

use crate::errors::PartitionError;
use crate::journal::Journal;
use crate::partition::Partition;
use crate::partition::PartitionContext;
use crate::raft::MetaStore;
use crate::raft::RaftNode;
use crate::scheduler::ScheduledFuture;
use crate::scheduler::Scheduler;

/// Starts and stops partitions on the I/O lane of a scheduler.
#[derive(Debug, Clone)]
pub struct PartitionLifecycle {
    scheduler: Arc<Scheduler>,
}

impl PartitionLifecycle {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Open the journal and the consensus core of a partition and start
    /// ticking it.
    ///
    /// Resolves with the context with `partition` set. On failure nothing is
    /// left running.
    pub fn startup(
        &self,
        ctx: PartitionContext,
    ) -> ScheduledFuture<Result<PartitionContext, PartitionError>> {
        let scheduler = self.scheduler.clone();
        self.scheduler.schedule_blocking(move || Self::do_startup(&scheduler, ctx))
    }

    /// Stop a started partition: pending proposals fail and the journal is
    /// flushed and closed.
    ///
    /// Resolves with the context with `partition` cleared. If closing fails,
    /// the context is returned in [`PartitionError::CloseFailed`] with
    /// `partition` still set, and shutdown can be retried with it.
    pub fn shutdown(
        &self,
        ctx: PartitionContext,
    ) -> ScheduledFuture<Result<PartitionContext, PartitionError>> {
        let scheduler = self.scheduler.clone();
        self.scheduler.schedule_blocking(move || Self::do_shutdown(&scheduler, ctx))
    }

    fn do_startup(
        scheduler: &Scheduler,
        mut ctx: PartitionContext,
    ) -> Result<PartitionContext, PartitionError> {
        if ctx.partition.is_some() {
            return Err(PartitionError::AlreadyStarted(ctx.partition_id));
        }

        if !ctx.members.contains(&ctx.node_id) {
            return Err(PartitionError::NotAMember {
                node_id: ctx.node_id,
                members: ctx.members.clone(),
            });
        }

        let config = Arc::new(ctx.partition_config());

        let journal = Journal::open(config.clone())?;
        let meta = MetaStore::open(&config)?;
        let node = RaftNode::new(
            ctx.node_id,
            ctx.members.iter().copied(),
            config.clone(),
            journal,
            meta,
        )?;

        let partition =
            Arc::new(Partition::new(ctx.partition_id, node, ctx.transport.clone()));

        let weak = Arc::downgrade(&partition);
        let timer = scheduler.schedule_timer(config.tick_interval(), move || {
            if let Some(p) = weak.upgrade() {
                p.tick();
            }
        });

        let timer = match timer {
            Ok(t) => t,
            Err(e) => {
                if let Err(close_err) = partition.close() {
                    error!(
                        "Partition-{} failed to close after startup failure: {}",
                        ctx.partition_id, close_err
                    );
                }
                return Err(e.into());
            }
        };
        partition.set_timer(timer);

        info!(
            "Partition-{} started on node {} in {}",
            ctx.partition_id, ctx.node_id, config.dir
        );

        ctx.partition = Some(partition);
        Ok(ctx)
    }

    fn do_shutdown(
        scheduler: &Scheduler,
        mut ctx: PartitionContext,
    ) -> Result<PartitionContext, PartitionError> {
        let Some(partition) = ctx.partition.clone() else {
            return Err(PartitionError::NotStarted(ctx.partition_id));
        };

        if let Err(e) = partition.close() {
            error!("Partition-{} failed to close: {}", ctx.partition_id, e);
            return Err(PartitionError::CloseFailed {
                context: Box::new(ctx),
                source: e,
            });
        }
        ctx.partition = None;

        // Ticks queued before the timer stopped hold the partition until
        // they ran.
        scheduler.schedule_async(|| ()).join()?;

        info!(
            "Partition-{} stopped on node {}",
            ctx.partition_id, ctx.node_id
        );
        Ok(ctx)
    }
}
