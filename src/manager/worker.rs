//! The worker loop that consumes the task queue.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

use tracing::{debug, error};

use crate::mutex::MutexGuard;
use crate::thread::{Runnable, Thread};

use super::task::TaskState;
use super::ThreadManager;

/// A single pool member: runs on its own OS thread, looping over the queue
/// until the pool shrinks past it or shuts down.
pub(super) struct Worker {
    manager: Weak<ThreadManager>,
    host: OnceLock<Weak<Thread>>,
}

impl Worker {
    pub(super) fn new(manager: &Arc<ThreadManager>) -> Arc<Self> {
        Arc::new(Self {
            manager: Arc::downgrade(manager),
            host: OnceLock::new(),
        })
    }

    /// Record the thread hosting this worker. Non-owning, so a thread and
    /// its work item never keep each other alive.
    pub(super) fn bind(&self, thread: &Arc<Thread>) {
        let _ = self.host.set(Arc::downgrade(thread));
    }

    fn host_thread(&self) -> Option<Arc<Thread>> {
        self.host.get().and_then(Weak::upgrade)
    }

    fn run_loop(&self, mgr: &ThreadManager) {
        let mut shared = mgr.shared.lock();

        // Entry accounting: claim a slot if the pool still wants another
        // worker, and wake add_worker when the last slot fills.
        let mut active = shared.worker_count < shared.worker_max_count;
        let accounted = active;
        if active {
            shared.worker_count += 1;
            if shared.worker_count == shared.worker_max_count {
                mgr.worker_monitor.notify_one();
            }
        }
        debug!("worker entered its run loop");

        while active {
            active = mgr.worker_active(&shared);

            while active && shared.tasks.is_empty() {
                mgr.idle_count.fetch_add(1, Ordering::Relaxed);
                mgr.task_monitor.wait(&mut shared);
                mgr.idle_count.fetch_sub(1, Ordering::Relaxed);
                active = mgr.worker_active(&shared);
            }

            let mut claimed = None;
            if active {
                if let Some(mut task) = shared.tasks.pop_front() {
                    if task.state == TaskState::Waiting {
                        task.state = if task.is_expired(Instant::now()) {
                            TaskState::TimedOut
                        } else {
                            TaskState::Executing
                        };
                    }
                    claimed = Some(task);
                }

                // The pop may have opened a slot under the cap; at most one
                // blocked producer can make progress per slot.
                if shared.pending_task_count_max > 0
                    && shared.tasks.len() < shared.pending_task_count_max
                {
                    mgr.max_monitor.notify_one();
                }
            }

            let Some(mut task) = claimed else { continue };

            match task.state {
                TaskState::Executing => {
                    MutexGuard::unlocked(&mut shared, || {
                        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task.run())) {
                            error!(
                                panic = panic_message(payload.as_ref()),
                                "work item panicked; worker continues"
                            );
                        }
                    });
                }
                TaskState::TimedOut => {
                    if let Some(callback) = shared.expire_callback.clone() {
                        let runnable = Arc::clone(task.runnable());
                        MutexGuard::unlocked(&mut shared, || callback(runnable));
                        shared.expired_count += 1;
                    }
                }
                TaskState::Waiting | TaskState::Complete => {}
            }
        }

        // Exit accounting: hand the hosting thread over for draining, and
        // wake the next resize waiter once the count converges.
        if let Some(thread) = self.host_thread() {
            shared.dead_workers.push(thread);
        }
        if accounted {
            shared.worker_count -= 1;
        }
        if shared.worker_count == shared.worker_max_count {
            mgr.worker_monitor.notify_one();
        }
        debug!("worker left its run loop");
    }
}

impl Runnable for Worker {
    fn run(&self) {
        let Some(mgr) = self.manager.upgrade() else {
            return;
        };
        self.run_loop(&mgr);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
