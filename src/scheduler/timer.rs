use std::io;
use std::sync::mpsc::sync_channel;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;
use log::error;

use crate::scheduler::lane::Lane;

/// A repeating timer started by
/// [`Scheduler::schedule_timer`](crate::scheduler::Scheduler::schedule_timer).
///
/// The timer stops when it is cancelled or dropped.
#[derive(Debug)]
pub struct TimerHandle {
    name: String,
    cancel: Option<SyncSender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub(crate) fn start<F>(
        name: String,
        interval: Duration,
        lane: Arc<Lane>,
        work: F,
    ) -> Result<Self, io::Error>
    where F: FnMut() + Send + 'static {
        let (cancel, cancelled) = sync_channel::<()>(1);

        let work = Arc::new(Mutex::new(work));

        let timer_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            loop {
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("{} cancelled, quit", timer_name);
                        return;
                    }
                }

                let work = work.clone();
                let task = Box::new(move || {
                    let mut w = match work.lock() {
                        Ok(w) => w,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    (*w)();
                });

                if lane.submit(task).is_err() {
                    debug!("{} lane is closed, quit", timer_name);
                    return;
                }
            }
        })?;

        Ok(Self {
            name,
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// Stop the timer and wait for its thread to quit.
    ///
    /// A firing already queued on the lane may still run.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel.take();

        let Some(handle) = self.handle.take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            error!("{} thread panicked", self.name);
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
