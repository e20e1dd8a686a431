//! Compaction Module
//!
//! Where background compactions run, and how the writer waits for them.
//!
//! ## Responsibilities
//! - Run a task inline, on a shared fixed pool, or on a thread of its own
//! - Track outstanding tasks so `finish` can wait for all of them
//!
//! ## Executors
//! ```text
//!   DirOptions::compaction_pool = Some(pool)  ──►  ThreadPool (shared)
//!   allow_env_threads = true                  ──►  EphemeralThreads
//!   otherwise                                 ──►  Inline (caller's thread)
//! ```
//! The writer only sees `Arc<dyn Executor>`; it never assumes which thread a
//! task lands on.

mod executor;
mod pool;

use std::sync::Arc;

use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

pub use executor::{EphemeralThreads, Executor, Inline, Task};
pub use pool::ThreadPool;

/// Submits compaction tasks and waits for all of them
pub struct CompactionScheduler {
    executor: Arc<dyn Executor>,
    /// Each in-flight task holds a clone; `join_all` waits for them to drop
    outstanding: Mutex<WaitGroup>,
}

impl CompactionScheduler {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            outstanding: Mutex::new(WaitGroup::new()),
        }
    }

    /// Pick the executor `DirOptions` asks for
    pub fn from_options(options: &crate::config::DirOptions) -> Self {
        let executor: Arc<dyn Executor> = match &options.compaction_pool {
            Some(pool) => Arc::clone(pool) as Arc<dyn Executor>,
            None if options.allow_env_threads => Arc::new(EphemeralThreads),
            None => Arc::new(Inline),
        };
        Self::new(executor)
    }

    /// Hand a task to the executor. May run it before returning.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.outstanding.lock().clone();
        self.executor.execute(Box::new(move || {
            task();
            drop(token);
        }));
    }

    /// Block until every task submitted so far has completed
    pub fn join_all(&self) {
        let pending = std::mem::replace(&mut *self.outstanding.lock(), WaitGroup::new());
        pending.wait();
    }
}

impl std::fmt::Debug for CompactionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionScheduler")
            .field("executor", &self.executor.name())
            .finish()
    }
}
