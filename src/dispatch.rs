//! Completion delivery on the application's main queue.
//!
//! [`DataService`](crate::DataService) runs storage work on a private serial
//! worker, but completion callbacks must run on the application's main
//! thread. [`MainQueue`] is that contract: the worker posts completions
//! through a [`MainQueueHandle`], and the thread that owns the queue drains
//! them. In an application this is the UI thread's run loop; in tests it is
//! the test thread.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// A queued completion callback.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Receiving side of the main queue.
///
/// Owned by the thread that should run completion callbacks. Tasks run in
/// posting order.
pub struct MainQueue {
    tasks: Receiver<Task>,
    sender: Sender<Task>,
}

/// Cloneable posting side of a [`MainQueue`].
#[derive(Clone)]
pub struct MainQueueHandle {
    tasks: Sender<Task>,
}

impl MainQueue {
    /// Creates a new main queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, tasks) = std::sync::mpsc::channel();
        Self { tasks, sender }
    }

    /// Returns a handle for posting tasks onto this queue.
    #[must_use]
    pub fn handle(&self) -> MainQueueHandle {
        MainQueueHandle {
            tasks: self.sender.clone(),
        }
    }

    /// Runs the next queued task, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `true` if a task ran.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.tasks.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            },
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Runs up to `count` tasks within an overall deadline of `timeout`.
    ///
    /// Returns the number of tasks that ran.
    pub fn run(&self, count: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        while ran < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.run_one(remaining) {
                break;
            }
            ran += 1;
        }
        ran
    }

    /// Runs every task already queued, without blocking.
    ///
    /// Returns the number of tasks that ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.tasks.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                },
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return ran,
            }
        }
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainQueueHandle {
    /// Posts a task to run on the queue's owning thread.
    ///
    /// Posting never blocks. If the queue has been dropped the task is
    /// discarded with a warning.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        if self.tasks.send(Box::new(task)).is_err() {
            tracing::warn!("main queue is gone, dropping completion callback");
        }
    }
}
