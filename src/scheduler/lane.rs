use std::io;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::sync_channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::thread::JoinHandle;

use log::error;
use log::info;

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// A worker thread that runs tasks one at a time in submission order.
pub(crate) struct Lane {
    name: String,
    tx: Option<SyncSender<Task>>,
    handle: Option<JoinHandle<()>>,
}

impl Lane {
    pub(crate) fn start(name: String) -> Result<Self, io::Error> {
        let (tx, rx) = sync_channel(1024);

        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(worker_name, rx))?;

        Ok(Self {
            name,
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a task. Returns the task back if the lane is gone.
    ///
    /// Blocks while the queue is full.
    pub(crate) fn submit(&self, task: Task) -> Result<(), Task> {
        let Some(tx) = &self.tx else {
            return Err(task);
        };

        tx.send(task).map_err(|e| e.0)
    }

    fn run(name: String, rx: Receiver<Task>) {
        loop {
            let Ok(task) = rx.recv() else {
                info!("{} input channel closed, quit", name);
                return;
            };

            let res = panic::catch_unwind(AssertUnwindSafe(task));
            if res.is_err() {
                error!("{} task panicked", name);
            }
        }
    }
}

impl Drop for Lane {
    fn drop(&mut self) {
        self.tx.take();

        let Some(handle) = self.handle.take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            error!("{} worker thread panicked", self.name);
        }
    }
}
