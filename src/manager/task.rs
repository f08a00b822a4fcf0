//! Admission record wrapping a user work item.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::thread::Runnable;

/// What has happened to an admitted task so far.
///
/// A task enters the queue `Waiting` and transitions exactly once, when a
/// worker pops it: to `Executing`, or to `TimedOut` when its deadline has
/// already passed. `Complete` is reached only through the `Executing`
/// branch, after the work item returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TaskState {
    /// In the queue, not yet claimed by a worker.
    Waiting,
    /// Claimed by a worker and about to run.
    Executing,
    /// Claimed after its deadline; it will not run.
    TimedOut,
    /// The work item returned.
    Complete,
}

/// A queued work item plus its scheduling state.
pub(super) struct Task {
    runnable: Arc<dyn Runnable>,
    pub(super) state: TaskState,
    expire_at: Option<Instant>,
}

impl Task {
    /// Wrap `runnable`; a nonzero `expiration_ms` arms an absolute deadline
    /// measured from now on the monotonic clock.
    pub(super) fn new(runnable: Arc<dyn Runnable>, expiration_ms: u64) -> Self {
        let expire_at =
            (expiration_ms != 0).then(|| Instant::now() + Duration::from_millis(expiration_ms));
        Self {
            runnable,
            state: TaskState::Waiting,
            expire_at,
        }
    }

    pub(super) fn runnable(&self) -> &Arc<dyn Runnable> {
        &self.runnable
    }

    pub(super) fn into_runnable(self) -> Arc<dyn Runnable> {
        self.runnable
    }

    /// Whether the deadline (if any) has passed at `now`.
    pub(super) fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|deadline| deadline < now)
    }

    /// Run the wrapped work item. Only an `Executing` task runs; it is
    /// `Complete` afterwards.
    pub(super) fn run(&mut self) {
        if self.state == TaskState::Executing {
            self.runnable.run();
            self.state = TaskState::Complete;
        }
    }
}
