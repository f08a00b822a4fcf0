//! Factory producing threads with a fixed detached disposition.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::thread::{Runnable, Thread};

/// Creates [`Thread`]s bound to work items.
///
/// The detached disposition is a factory-wide property: pool shutdown
/// branches on whether worker threads can be joined, so a manager refuses a
/// replacement factory whose disposition differs from the incumbent's.
/// Threads are detached by default.
#[derive(Debug, Clone)]
pub struct ThreadFactory {
    detached: bool,
}

impl Default for ThreadFactory {
    fn default() -> Self {
        Self { detached: true }
    }
}

impl ThreadFactory {
    /// Create a factory. Threads from a detached factory cannot be joined.
    #[must_use]
    pub fn new(detached: bool) -> Self {
        Self { detached }
    }

    /// Whether threads produced by this factory are detached.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Bind `runnable` to a new, unstarted thread.
    #[must_use]
    pub fn new_thread(&self, runnable: Arc<dyn Runnable>) -> Arc<Thread> {
        Thread::new(self.detached, runnable)
    }

    /// Opaque id of the calling thread.
    #[must_use]
    pub fn current_thread_id(&self) -> ThreadId {
        thread::current().id()
    }
}
