use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use pretty_assertions::assert_eq;

use crate::errors::JournalError;
use crate::errors::PartitionError;
use crate::errors::ProposeError;
use crate::partition::HealthStatus;
use crate::raft::Envelope;
use crate::raft::RaftEntry;
use crate::raft::RaftRole;
use crate::raft::VoteRequest;
use crate::raft::VoteResponse;
use crate::tests::context::TestContext;
use crate::Partition;
use crate::PartitionContext;
use crate::PartitionLifecycle;
use crate::Scheduler;
use crate::Transport;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Envelope>>,
}

impl Transport for RecordingTransport {
    fn send(&self, envelope: Envelope) {
        self.sent.lock().unwrap().push(envelope);
    }
}

fn new_context(
    ctx: &TestContext,
    node_id: u64,
    members: Vec<u64>,
) -> (PartitionContext, Arc<RecordingTransport>) {
    let mut config = ctx.config();
    config.tick_interval_ms = Some(1);

    let transport = Arc::new(RecordingTransport::default());
    let pctx = PartitionContext::new(
        7,
        node_id,
        members,
        Arc::new(config),
        transport.clone(),
    );
    (pctx, transport)
}

fn new_lifecycle() -> Result<PartitionLifecycle, PartitionError> {
    let scheduler = Scheduler::new("test")?;
    Ok(PartitionLifecycle::new(Arc::new(scheduler)))
}

fn wait_for_leader(p: &Partition) {
    let start = Instant::now();
    while p.health().role != RaftRole::Leader {
        assert!(start.elapsed() < TIMEOUT, "no leader: {}", p.health());
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_startup_propose_shutdown() -> Result<(), PartitionError> {
    let ctx = TestContext::new()?;
    let lifecycle = new_lifecycle()?;
    let (pctx, transport) = new_context(&ctx, 1, vec![1]);

    let pctx = lifecycle.startup(pctx).join()??;
    let partition = pctx.partition.clone().unwrap();

    assert!(std::path::Path::new(&format!("{}/partition-7", ctx.config.dir)).is_dir());

    wait_for_leader(&partition);

    let res = partition.propose(3, b"hello").join_timeout(TIMEOUT)?;
    assert_eq!(Ok(2), res);

    let health = partition.health();
    assert_eq!(7, health.partition_id);
    assert_eq!(1, health.term);
    assert_eq!(Some(1), health.leader);
    assert_eq!(2, health.commit_index);
    assert!(health.is_healthy());

    let mut reader = partition.open_committed_reader();
    assert_eq!(2, reader.seek_to_asqn(3));
    let record = reader.next().unwrap()?;
    let entry = RaftEntry::from_record(&record)?;
    assert_eq!(Some(&b"hello"[..]), entry.data());

    // A single member never sends anything.
    assert!(transport.sent.lock().unwrap().is_empty());

    let pctx = lifecycle.shutdown(pctx).join()??;
    assert!(pctx.partition.is_none());

    assert_eq!(HealthStatus::Stopped, partition.health().status);
    assert_eq!(
        Ok(Err(ProposeError::Stopped)),
        partition.propose(4, b"late").join_timeout(TIMEOUT)
    );
    assert!(reader.next().is_none());

    Ok(())
}

#[test]
fn test_restart_reopens_journal() -> Result<(), PartitionError> {
    let ctx = TestContext::new()?;
    let lifecycle = new_lifecycle()?;
    let (pctx, _transport) = new_context(&ctx, 1, vec![1]);

    let pctx = {
        let pctx = lifecycle.startup(pctx).join()??;
        let partition = pctx.partition.clone().unwrap();
        wait_for_leader(&partition);

        for i in 0..3 {
            let res = partition.propose(i, b"x").join_timeout(TIMEOUT)?;
            assert_eq!(Ok(i as u64 + 2), res);
        }
        lifecycle.shutdown(pctx).join()??
    };

    let pctx = lifecycle.startup(pctx).join()??;
    let partition = pctx.partition.clone().unwrap();

    let h = partition.health();
    assert!(h.last_index >= 4, "{}", h);
    assert!(h.term >= 1, "{}", h);

    wait_for_leader(&partition);

    // The new term starts with its initial entry after the reopened records.
    let res = partition.propose(10, b"y").join_timeout(TIMEOUT)?;
    let index = res.unwrap();
    assert!(index >= 6, "index: {}", index);
    assert!(partition.health().term >= 2);

    let mut reader = partition.open_reader();
    assert_eq!(3, reader.seek_to_asqn(1));

    drop(partition);
    lifecycle.shutdown(pctx).join()??;

    Ok(())
}

#[test]
fn test_lifecycle_errors() -> Result<(), PartitionError> {
    let ctx = TestContext::new()?;
    let lifecycle = new_lifecycle()?;

    let (pctx, _transport) = new_context(&ctx, 4, vec![1, 2, 3]);
    let res = lifecycle.startup(pctx).join()?;
    assert!(matches!(
        res,
        Err(PartitionError::NotAMember { node_id: 4, .. })
    ));

    let (pctx, _transport) = new_context(&ctx, 1, vec![1, 2, 3]);

    let res = lifecycle.shutdown(pctx.clone()).join()?;
    assert!(matches!(res, Err(PartitionError::NotStarted(7))));

    let started = lifecycle.startup(pctx).join()??;

    let res = lifecycle.startup(started.clone()).join()?;
    assert!(matches!(res, Err(PartitionError::AlreadyStarted(7))));

    // The journal directory is locked by the running partition.
    let mut other = started.clone();
    other.partition = None;
    let res = lifecycle.startup(other).join()?;
    assert!(matches!(res, Err(PartitionError::Journal(_))));

    let stopped = lifecycle.shutdown(started).join()??;
    assert!(stopped.partition.is_none());

    Ok(())
}

#[test]
fn test_shutdown_retry_after_close_failure() -> Result<(), PartitionError> {
    let ctx = TestContext::new()?;
    let lifecycle = new_lifecycle()?;
    let (pctx, _transport) = new_context(&ctx, 1, vec![1]);

    let pctx = lifecycle.startup(pctx).join()??;
    let partition = pctx.partition.clone().unwrap();

    partition.fail_next_close(JournalError::Closed);

    let res = lifecycle.shutdown(pctx).join()?;
    let pctx = match res {
        Err(PartitionError::CloseFailed { context, source }) => {
            assert!(matches!(source, JournalError::Closed));
            *context
        }
        other => panic!("expected close failure, got {:?}", other),
    };
    assert!(pctx.partition.is_some());
    assert_ne!(HealthStatus::Stopped, partition.health().status);

    let pctx = lifecycle.shutdown(pctx).join()??;
    assert!(pctx.partition.is_none());
    assert_eq!(HealthStatus::Stopped, partition.health().status);

    // Stopping a stopped partition again is refused.
    let res = lifecycle.shutdown(pctx).join()?;
    assert!(matches!(res, Err(PartitionError::NotStarted(7))));

    Ok(())
}

/// Messages produced while handling a delivery reach the transport.
#[test]
fn test_deliver_and_transport() -> Result<(), PartitionError> {
    let ctx = TestContext::new()?;
    let lifecycle = new_lifecycle()?;

    let (pctx, transport) = new_context(&ctx, 2, vec![1, 2, 3]);
    let pctx = lifecycle.startup(pctx).join()??;
    let partition = pctx.partition.clone().unwrap();

    partition.deliver(Envelope::new(1, 2, VoteRequest {
        term: 100,
        candidate: 1,
        last_log_index: 0,
        last_log_term: 0,
    }));

    let sent = transport.sent.lock().unwrap().clone();
    assert!(
        sent.contains(&Envelope::new(2, 1, VoteResponse {
            term: 100,
            granted: true,
        })),
        "{:?}",
        sent
    );
    assert!(partition.health().term >= 100);

    drop(partition);
    lifecycle.shutdown(pctx).join()??;

    Ok(())
}
