//! Background thread pool
//!
//! Fixed set of worker threads draining one shared task queue. The event
//! loop uses it to drop large sorted sets, whose teardown is O(n), without
//! stalling request processing. Tasks are fire-and-forget: nothing is
//! returned and a submitted task cannot be cancelled.
//!
//! ## Concurrency
//! - Queue: `crossbeam` channel; each submission wakes one idle worker
//! - Pending count: `parking_lot` mutex + condvar, so callers can wait
//!   for the queue to drain (`wait_idle`)

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::error::Result;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Submitted-but-unfinished task count
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }
}

/// Marks a task finished even if it panics
struct DoneGuard<'a>(&'a Pending);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

/// Fixed-size worker pool
pub struct ThreadPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl ThreadPool {
    /// Spawn `num_threads` workers (at least one)
    pub fn new(num_threads: usize) -> Result<Self> {
        let num_threads = num_threads.max(1);
        let (sender, receiver) = channel::unbounded::<Task>();
        let pending = Arc::new(Pending::default());

        let mut workers = Vec::with_capacity(num_threads);
        for id in 0..num_threads {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("tidekv-worker-{}", id))
                .spawn(move || worker_loop(receiver, pending))?;
            workers.push(handle);
        }
        tracing::debug!("Thread pool started with {} workers", num_threads);

        Ok(Self {
            sender: Some(sender),
            workers,
            pending,
        })
    }

    /// Queue a task for a worker
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.add();
        let task: Task = Box::new(task);
        let rejected = match &self.sender {
            Some(sender) => sender.send(task).err().map(|e| e.into_inner()),
            None => Some(task),
        };
        // No worker left to take it: run it here rather than leak it
        if let Some(task) = rejected {
            let _done = DoneGuard(&self.pending);
            task();
        }
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Tasks submitted but not yet finished
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Block until every submitted task has finished
    pub fn wait_idle(&self) {
        let mut count = self.pending.count.lock();
        while *count > 0 {
            self.pending.drained.wait(&mut count);
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel lets workers exit once the queue is empty
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Thread pool worker panicked");
            }
        }
    }
}

fn worker_loop(receiver: Receiver<Task>, pending: Arc<Pending>) {
    while let Ok(task) = receiver.recv() {
        let _done = DoneGuard(&pending);
        task();
    }
}
