//! Task execution capability

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

/// A unit of background work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted tasks somewhere
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// Runs every task on the submitting thread
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, task: Task) {
        task();
    }

    fn name(&self) -> &'static str {
        "inline"
    }
}

/// Spawns a short-lived thread per task
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralThreads;

impl Executor for EphemeralThreads {
    fn execute(&self, task: Task) {
        // Detached: completion is tracked by the scheduler's wait group.
        // The slot lets a failed spawn hand the task back to this thread.
        let slot = Arc::new(Mutex::new(Some(task)));
        let remote = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name("burstkv-compact".to_string())
            .spawn(move || {
                let task = remote.lock().take();
                if let Some(task) = task {
                    task();
                }
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Failed to spawn compaction thread, running inline");
            let task = slot.lock().take();
            if let Some(task) = task {
                task();
            }
        }
    }

    fn name(&self) -> &'static str {
        "ephemeral"
    }
}
