//! Fixed-size worker pool
//!
//! Workers pull tasks from one unbounded crossbeam channel. The pool is
//! shared through `Arc` and may serve several writers at once; its size is
//! independent of any writer's partition count.

use std::fmt;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{BurstError, Result};

use super::executor::{Executor, Task};

pub struct ThreadPool {
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl ThreadPool {
    /// Start `size` worker threads
    pub fn new_fixed(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(BurstError::Config(
                "thread pool needs at least one worker".to_string(),
            ));
        }

        let (sender, receiver) = channel::unbounded::<Task>();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("burstkv-pool-{}", id))
                .spawn(move || worker_loop(receiver))?;
            workers.push(handle);
        }
        tracing::debug!(size, "Started compaction pool");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

fn worker_loop(receiver: Receiver<Task>) {
    // Ends once every sender is gone and the queue is drained
    for task in receiver.iter() {
        task();
    }
}

impl Executor for ThreadPool {
    fn execute(&self, task: Task) {
        let sender = self.sender.lock().clone();
        match sender {
            Some(tx) => {
                if let Err(rejected) = tx.send(task) {
                    (rejected.into_inner())();
                }
            }
            // Shut down: fall back to the caller's thread
            None => task(),
        }
    }

    fn name(&self) -> &'static str {
        "pool"
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.sender.lock().take();
        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Compaction worker panicked");
            }
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool").field("size", &self.size).finish()
    }
}
