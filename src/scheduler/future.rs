use std::sync::mpsc::sync_channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::time::Duration;

use crate::errors::SchedulerError;

/// The result of work handed to a [`Scheduler`](crate::scheduler::Scheduler)
/// or a proposal, available once it completes.
#[derive(Debug)]
pub struct ScheduledFuture<T> {
    rx: Receiver<T>,
}

impl<T> ScheduledFuture<T> {
    pub(crate) fn channel() -> (SyncSender<T>, Self) {
        let (tx, rx) = sync_channel(1);
        (tx, Self { rx })
    }

    /// A future that is already completed with `value`.
    pub fn ready(value: T) -> Self {
        let (tx, fu) = Self::channel();
        let _ = tx.send(value);
        fu
    }

    /// Block until the result is available.
    ///
    /// Returns [`SchedulerError::Cancelled`] if the work is dropped without
    /// producing a result.
    pub fn join(self) -> Result<T, SchedulerError> {
        self.rx.recv().map_err(|_| SchedulerError::Cancelled)
    }

    pub fn join_timeout(&self, timeout: Duration) -> Result<T, SchedulerError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => SchedulerError::Timeout,
            RecvTimeoutError::Disconnected => SchedulerError::Cancelled,
        })
    }

    /// The result if it is available already.
    pub fn try_get(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
