//! Worker lanes that run partition work off the caller's thread.
//!
//! A [`Scheduler`] has a CPU lane for short non-blocking work, such as driving
//! the consensus core, and an I/O lane for work that blocks, such as opening
//! or closing a journal. Work on one lane runs in submission order.

mod future;
pub(crate) mod lane;
mod timer;

use std::io;
use std::sync::Arc;
use std::time::Duration;

pub use future::ScheduledFuture;
use lane::Lane;
use log::info;
pub use timer::TimerHandle;

pub struct Scheduler {
    name: String,
    cpu: Arc<Lane>,
    io: Arc<Lane>,
}

impl Scheduler {
    /// Start the lanes, whose threads are named after `name`.
    pub fn new(name: impl ToString) -> Result<Self, io::Error> {
        let name = name.to_string();

        let cpu = Lane::start(format!("{}_cpu_worker", name))?;
        let io = Lane::start(format!("{}_io_worker", name))?;

        info!("Scheduler {} started", name);

        Ok(Self {
            name,
            cpu: Arc::new(cpu),
            io: Arc::new(io),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run non-blocking `work` on the CPU lane.
    pub fn schedule_async<T, F>(&self, work: F) -> ScheduledFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        Self::submit(&self.cpu, work)
    }

    /// Run `work` that may block on I/O on the I/O lane.
    pub fn schedule_blocking<T, F>(&self, work: F) -> ScheduledFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        Self::submit(&self.io, work)
    }

    /// Run `work` on the CPU lane every `interval` until the returned handle
    /// is cancelled or dropped.
    pub fn schedule_timer<F>(
        &self,
        interval: Duration,
        work: F,
    ) -> Result<TimerHandle, io::Error>
    where
        F: FnMut() + Send + 'static,
    {
        TimerHandle::start(
            format!("{}_timer", self.name),
            interval,
            self.cpu.clone(),
            work,
        )
    }

    fn submit<T, F>(lane: &Lane, work: F) -> ScheduledFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, fu) = ScheduledFuture::channel();

        let task = Box::new(move || {
            let _ = tx.send(work());
        });

        // A rejected task is dropped with its sender: the future is cancelled.
        let _ = lane.submit(task);
        fu
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("name", &self.name).finish()
    }
}
