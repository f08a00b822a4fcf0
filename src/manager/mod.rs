//! The pool façade: lifecycle, submission, resizing, and statistics.
//!
//! A [`ThreadManager`] owns a FIFO queue of admitted tasks and a set of
//! long-lived worker threads consuming it. All mutable state sits behind one
//! mutex; three [`Monitor`]s share that mutex to signal "queue non-empty"
//! (to idle workers), "queue dropped below its cap" (to blocked producers),
//! and "worker count reached its target" (to resize callers). Keeping the
//! monitors on the single lock lets a worker that dequeues a task open a
//! backlog slot atomically with respect to a submission racing the cap.

mod task;
mod worker;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::factory::ThreadFactory;
use crate::monitor::Monitor;
use crate::mutex::{acquire, LockTimeout, Mutex, MutexGuard};
use crate::thread::{Runnable, Thread};

use task::Task;
use worker::Worker;

/// Callback invoked with the user work item when a task expires unrun.
pub type ExpireCallback = Arc<dyn Fn(Arc<dyn Runnable>) + Send + Sync>;

/// Lifecycle of a [`ThreadManager`]. Linear; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ManagerState {
    /// Built but not yet started.
    Uninitialized = 0,
    /// A start is in flight; racing starters wait this out.
    Starting = 1,
    /// Accepting and executing tasks.
    Started = 2,
    /// Stop in progress; workers drain the queue before leaving.
    Joining = 3,
    /// Terminal shutdown in progress.
    Stopping = 4,
    /// Shut down; `start` is a no-op from here.
    Stopped = 5,
}

impl ManagerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Starting,
            2 => Self::Started,
            3 => Self::Joining,
            4 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Bootstrap applied by `start` on managers built with
/// [`ThreadManager::new_simple`].
#[derive(Debug, Clone, Copy)]
struct Bootstrap {
    worker_count: usize,
    pending_task_count_max: usize,
}

/// Mutable pool state; every field is guarded by the single manager mutex.
struct Shared {
    tasks: VecDeque<Task>,
    workers: Vec<Arc<Thread>>,
    dead_workers: Vec<Arc<Thread>>,
    /// Covers exactly the members of `workers`, keyed by OS thread id.
    id_map: HashMap<ThreadId, Arc<Thread>>,
    worker_count: usize,
    worker_max_count: usize,
    pending_task_count_max: usize,
    expired_count: usize,
    thread_factory: Option<ThreadFactory>,
    expire_callback: Option<ExpireCallback>,
}

impl Shared {
    fn at_capacity(&self) -> bool {
        self.pending_task_count_max > 0 && self.tasks.len() >= self.pending_task_count_max
    }
}

/// A dynamically-resizable pool of worker threads consuming a FIFO queue.
///
/// Producers submit opaque [`Runnable`] work items with [`add`] (optionally
/// bounded by a submission timeout and an expiration deadline). Workers are
/// added and removed at runtime with [`add_worker`] and [`remove_worker`];
/// [`stop`] drains the queue and shuts the pool down. Graceful shutdown
/// requires an explicit `stop` — dropping the last handle does not join
/// worker threads.
///
/// [`add`]: ThreadManager::add
/// [`add_worker`]: ThreadManager::add_worker
/// [`remove_worker`]: ThreadManager::remove_worker
/// [`stop`]: ThreadManager::stop
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use threadmill::{Runnable, ThreadFactory, ThreadManager};
///
/// struct Increment(AtomicUsize);
///
/// impl Runnable for Increment {
///     fn run(&self) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let pool = ThreadManager::new_simple(2, 0);
/// pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
/// pool.start().unwrap();
///
/// let job = Arc::new(Increment(AtomicUsize::new(0)));
/// for _ in 0..16 {
///     pool.submit(Arc::clone(&job) as Arc<dyn Runnable>).unwrap();
/// }
///
/// pool.stop().unwrap();
/// assert_eq!(job.0.load(Ordering::Relaxed), 16);
/// ```
pub struct ThreadManager {
    shared: Mutex<Shared>,
    /// Signaled when the queue becomes non-empty, and at lifecycle edges.
    task_monitor: Monitor,
    /// Signaled when the queue drops below its cap.
    max_monitor: Monitor,
    /// Signaled when the worker count reaches the current target.
    worker_monitor: Monitor,
    /// Mirror of the lifecycle state; written only under `shared`.
    state: AtomicU8,
    /// Mirror of the idle-worker count; written only under `shared`.
    idle_count: AtomicUsize,
    bootstrap: Mutex<Option<Bootstrap>>,
}

impl ThreadManager {
    /// A blank manager: no factory, no workers, unbounded queue.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// A manager whose first `start` also installs `pending_task_count_max`
    /// and spawns `worker_count` workers.
    #[must_use]
    pub fn new_simple(worker_count: usize, pending_task_count_max: usize) -> Arc<Self> {
        Self::build(Some(Bootstrap {
            worker_count,
            pending_task_count_max,
        }))
    }

    /// Build a simple manager from validated configuration, with the thread
    /// factory preset to the configured disposition.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the configuration fails validation.
    pub fn from_config(config: &ManagerConfig) -> Result<Arc<Self>> {
        config.validate().map_err(ManagerError::InvalidArgument)?;
        let manager = Self::new_simple(config.worker_count, config.pending_task_count_max);
        manager.set_thread_factory(ThreadFactory::new(config.detached))?;
        Ok(manager)
    }

    fn build(bootstrap: Option<Bootstrap>) -> Arc<Self> {
        Arc::new(Self {
            shared: Mutex::new(Shared {
                tasks: VecDeque::new(),
                workers: Vec::new(),
                dead_workers: Vec::new(),
                id_map: HashMap::new(),
                worker_count: 0,
                worker_max_count: 0,
                pending_task_count_max: 0,
                expired_count: 0,
                thread_factory: None,
                expire_callback: None,
            }),
            task_monitor: Monitor::new(),
            max_monitor: Monitor::new(),
            worker_monitor: Monitor::new(),
            state: AtomicU8::new(ManagerState::Uninitialized as u8),
            idle_count: AtomicUsize::new(0),
            bootstrap: Mutex::new(bootstrap),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start accepting tasks.
    ///
    /// A no-op once the manager is `Stopped`. On a manager built with
    /// [`new_simple`](ThreadManager::new_simple) or
    /// [`from_config`](ThreadManager::from_config), the first successful
    /// `start` also installs the queue cap and spawns the bootstrap workers;
    /// otherwise no workers are created here — [`add_worker`] is the sole
    /// worker-creation path.
    ///
    /// [`add_worker`]: ThreadManager::add_worker
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when no thread factory is set; `Spawn` when a
    /// bootstrap worker thread cannot be created.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let Some(bootstrap) = self.bootstrap.lock().take() else {
            return self.start_inner();
        };

        if self.state() == ManagerState::Stopped {
            return Ok(());
        }
        self.set_pending_task_count_max(bootstrap.pending_task_count_max);
        if let Err(err) = self.start_inner() {
            // Keep the bootstrap for a retry once a factory is set.
            *self.bootstrap.lock() = Some(bootstrap);
            return Err(err);
        }
        self.add_worker(bootstrap.worker_count)
    }

    fn start_inner(&self) -> Result<()> {
        let mut shared = self.shared.lock();
        match self.state() {
            ManagerState::Stopped => return Ok(()),
            ManagerState::Uninitialized => {
                if shared.thread_factory.is_none() {
                    return Err(ManagerError::InvalidArgument(
                        "thread factory must be set before start".into(),
                    ));
                }
                self.set_state(ManagerState::Started);
                self.task_monitor.notify_all();
                info!("thread manager started");
            }
            _ => {}
        }

        while self.state() == ManagerState::Starting {
            self.task_monitor.wait(&mut shared);
        }
        Ok(())
    }

    /// Drain the queue and shut the pool down.
    ///
    /// Transitions through `Joining`, during which workers keep consuming
    /// until the queue is empty, then blocks until every worker has left its
    /// loop (joining the threads when the factory is joinable) and settles
    /// in `Stopped`. No queued task is silently lost.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when a racing resize still has more live workers
    /// than the current target; retry once the resize completes.
    pub fn stop(&self) -> Result<()> {
        let mut shared = self.shared.lock();
        let drain = !matches!(
            self.state(),
            ManagerState::Stopping | ManagerState::Joining | ManagerState::Stopped
        );
        if drain {
            info!("stopping thread manager");
            self.set_state(ManagerState::Joining);
            let live = shared.worker_count;
            self.remove_workers_locked(&mut shared, live)?;
            info!("thread manager drained");
        }
        self.set_state(ManagerState::Stopped);
        Ok(())
    }

    /// Current lifecycle state.
    ///
    /// Lock-free, eventually-consistent read; do not base correctness
    /// decisions on it.
    #[must_use]
    pub fn state(&self) -> ManagerState {
        ManagerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ManagerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Thread factory
    // ------------------------------------------------------------------

    /// The current thread factory, if any.
    #[must_use]
    pub fn thread_factory(&self) -> Option<ThreadFactory> {
        self.shared.lock().thread_factory.clone()
    }

    /// Install or replace the thread factory.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when a replacement's detached disposition differs
    /// from the incumbent's: workers created under the old disposition would
    /// be joined (or leaked) incorrectly at shutdown.
    pub fn set_thread_factory(&self, factory: ThreadFactory) -> Result<()> {
        let mut shared = self.shared.lock();
        if let Some(current) = &shared.thread_factory {
            if current.is_detached() != factory.is_detached() {
                return Err(ManagerError::InvalidArgument(
                    "replacement thread factory must keep the detached disposition".into(),
                ));
            }
        }
        shared.thread_factory = Some(factory);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------------

    /// Grow the pool by `count` workers.
    ///
    /// Threads are built outside the lock; under the lock the target is
    /// raised, each thread is started, and the call blocks until every new
    /// worker has entered its run loop.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when no thread factory is set. `Spawn` when the OS
    /// refuses a thread; the unstarted remainder is rolled back and workers
    /// already spawned stay in the pool.
    pub fn add_worker(self: &Arc<Self>, count: usize) -> Result<()> {
        let factory = self
            .shared
            .lock()
            .thread_factory
            .clone()
            .ok_or_else(|| ManagerError::InvalidArgument("thread factory not set".into()))?;

        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            let worker = Worker::new(self);
            let thread = factory.new_thread(worker.clone());
            worker.bind(&thread);
            spawned.push(thread);
        }

        let mut shared = self.shared.lock();
        shared.worker_max_count += count;
        shared.workers.extend(spawned.iter().cloned());

        let mut failure = None;
        for (index, thread) in spawned.iter().enumerate() {
            match thread.start() {
                Ok(()) => {
                    if let Some(id) = thread.id() {
                        shared.id_map.insert(id, Arc::clone(thread));
                    }
                }
                Err(err) => {
                    warn!(started = index, requested = count, "worker spawn failed");
                    shared.worker_max_count -= count - index;
                    let unstarted = &spawned[index..];
                    shared
                        .workers
                        .retain(|w| !unstarted.iter().any(|t| Arc::ptr_eq(w, t)));
                    failure = Some(err);
                    break;
                }
            }
        }

        while shared.worker_count != shared.worker_max_count {
            self.worker_monitor.wait(&mut shared);
        }

        match failure {
            Some(err) => Err(ManagerError::Spawn(err)),
            None => {
                debug!(count, total = shared.worker_count, "workers added");
                Ok(())
            }
        }
    }

    /// Shrink the pool by `count` workers.
    ///
    /// Blocks until the worker count has converged on the lowered target,
    /// then drains the departed threads (joining them when the factory is
    /// joinable).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `count` exceeds the current target.
    pub fn remove_worker(&self, count: usize) -> Result<()> {
        let mut shared = self.shared.lock();
        self.remove_workers_locked(&mut shared, count)
    }

    fn remove_workers_locked(
        &self,
        shared: &mut MutexGuard<'_, Shared>,
        count: usize,
    ) -> Result<()> {
        if count > shared.worker_max_count {
            return Err(ManagerError::InvalidArgument(
                "cannot remove more workers than the current maximum".into(),
            ));
        }
        shared.worker_max_count -= count;

        if self.idle_worker_count() > count {
            // One wake per departure.
            for _ in 0..count {
                self.task_monitor.notify_one();
            }
        } else {
            // Not enough idle workers to target individually; every idle
            // worker re-checks its activity and the survivors sleep again.
            self.task_monitor.notify_all();
        }

        while shared.worker_count != shared.worker_max_count {
            self.worker_monitor.wait(shared);
        }

        let join_dead = shared
            .thread_factory
            .as_ref()
            .is_some_and(|factory| !factory.is_detached());
        let dead: Vec<Arc<Thread>> = shared.dead_workers.drain(..).collect();
        for thread in dead {
            if join_dead {
                thread.join();
            }
            if let Some(id) = thread.id() {
                shared.id_map.remove(&id);
            }
            shared.workers.retain(|w| !Arc::ptr_eq(w, &thread));
        }

        debug!(count, total = shared.worker_count, "workers removed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Submit a work item with default timeouts: wait forever for a backlog
    /// slot, never expire.
    ///
    /// # Errors
    ///
    /// See [`add`](ThreadManager::add).
    pub fn submit(&self, runnable: Arc<dyn Runnable>) -> Result<()> {
        self.add(runnable, 0, 0)
    }

    /// Submit a work item for execution.
    ///
    /// `timeout_ms` governs how long the submission may wait — for the pool
    /// mutex and, when the queue is at its cap, for a slot to open: `0`
    /// waits forever, a negative value never waits for a slot, a positive
    /// value bounds the mutex acquisition and re-applies to each slot wait.
    /// Worker threads never wait for a slot regardless of `timeout_ms`; a
    /// worker blocked here could never drain the queue.
    ///
    /// A nonzero `expiration_ms` arms a deadline; a task still queued when
    /// its deadline passes is handed to the expiration callback at dequeue
    /// time instead of run.
    ///
    /// # Errors
    ///
    /// `NotStarted` unless the manager is `Started`; `TooManyPendingTasks`
    /// when the cap holds and the submission cannot (or may not) wait it
    /// out, or when the mutex acquisition itself times out.
    pub fn add(
        &self,
        runnable: Arc<dyn Runnable>,
        timeout_ms: i64,
        expiration_ms: u64,
    ) -> Result<()> {
        let mut shared = acquire(&self.shared, LockTimeout::from_millis(timeout_ms))
            .ok_or(ManagerError::TooManyPendingTasks)?;

        if self.state() != ManagerState::Started {
            return Err(ManagerError::NotStarted);
        }

        if shared.at_capacity() {
            // One expired task may free a slot without waiting.
            Self::remove_expired_locked(&mut shared, true);
        }

        if shared.at_capacity() {
            if Self::can_sleep(&shared) && timeout_ms >= 0 {
                while shared.at_capacity() {
                    let timeout = u64::try_from(timeout_ms).unwrap_or(0);
                    if self.max_monitor.wait_ms(&mut shared, timeout).timed_out() {
                        return Err(ManagerError::TooManyPendingTasks);
                    }
                }
            } else {
                warn!("pending-task cap reached; submission rejected");
                return Err(ManagerError::TooManyPendingTasks);
            }
        }

        shared.tasks.push_back(Task::new(runnable, expiration_ms));

        // Wake one idle worker; busy workers will get to the task in time.
        if self.idle_worker_count() > 0 {
            self.task_monitor.notify_one();
        }
        Ok(())
    }

    /// Remove the first pending task whose work item is `runnable` (by
    /// reference identity). Succeeds silently when no task matches.
    ///
    /// # Errors
    ///
    /// `NotStarted` unless the manager is `Started`.
    pub fn remove(&self, runnable: &Arc<dyn Runnable>) -> Result<()> {
        let mut shared = self.shared.lock();
        if self.state() != ManagerState::Started {
            return Err(ManagerError::NotStarted);
        }
        if let Some(index) = shared
            .tasks
            .iter()
            .position(|task| Arc::ptr_eq(task.runnable(), runnable))
        {
            shared.tasks.remove(index);
        }
        Ok(())
    }

    /// Pop the next pending task and return its work item, or `None` when
    /// the queue is empty.
    ///
    /// # Errors
    ///
    /// `NotStarted` unless the manager is `Started`.
    pub fn remove_next_pending(&self) -> Result<Option<Arc<dyn Runnable>>> {
        let mut shared = self.shared.lock();
        if self.state() != ManagerState::Started {
            return Err(ManagerError::NotStarted);
        }
        Ok(shared.tasks.pop_front().map(Task::into_runnable))
    }

    /// Sweep the queue, dropping every task whose deadline has passed and
    /// reporting each to the expiration callback (if set).
    pub fn remove_expired_tasks(&self) {
        let mut shared = self.shared.lock();
        Self::remove_expired_locked(&mut shared, false);
    }

    /// Install the callback invoked with a task's work item when the task is
    /// dropped for expiration.
    pub fn set_expire_callback<F>(&self, callback: F)
    where
        F: Fn(Arc<dyn Runnable>) + Send + Sync + 'static,
    {
        self.shared.lock().expire_callback = Some(Arc::new(callback));
    }

    fn remove_expired_locked(shared: &mut Shared, just_one: bool) {
        if shared.tasks.is_empty() {
            return;
        }
        let now = Instant::now();

        let mut index = 0;
        while index < shared.tasks.len() {
            if shared.tasks[index].is_expired(now) {
                if let Some(task) = shared.tasks.remove(index) {
                    debug!("dropping expired task");
                    if let Some(callback) = &shared.expire_callback {
                        callback(task.into_runnable());
                    }
                    shared.expired_count += 1;
                    if just_one {
                        return;
                    }
                }
            } else {
                index += 1;
            }
        }
    }

    /// Whether it is acceptable for the calling thread to block on the
    /// backlog: a pool worker blocked in `add` could never drain the queue.
    fn can_sleep(shared: &Shared) -> bool {
        let Some(factory) = &shared.thread_factory else {
            return true;
        };
        !shared.id_map.contains_key(&factory.current_thread_id())
    }

    /// Whether a worker should keep consuming: the pool still wants this
    /// many workers, or a stop is draining a non-empty queue.
    fn worker_active(&self, shared: &Shared) -> bool {
        shared.worker_count <= shared.worker_max_count
            || (self.state() == ManagerState::Joining && !shared.tasks.is_empty())
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Number of workers currently blocked waiting for a task.
    ///
    /// Lock-free, eventually-consistent read; do not base correctness
    /// decisions on it.
    #[must_use]
    pub fn idle_worker_count(&self) -> usize {
        self.idle_count.load(Ordering::Relaxed)
    }

    /// Number of live worker loops.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.lock().worker_count
    }

    /// Number of tasks waiting in the queue.
    #[must_use]
    pub fn pending_task_count(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    /// Number of pending plus executing tasks.
    #[must_use]
    pub fn total_task_count(&self) -> usize {
        let shared = self.shared.lock();
        shared.tasks.len() + shared.worker_count - self.idle_worker_count()
    }

    /// The pending-task cap; `0` means unbounded.
    #[must_use]
    pub fn pending_task_count_max(&self) -> usize {
        self.shared.lock().pending_task_count_max
    }

    /// Replace the pending-task cap; `0` means unbounded.
    pub fn set_pending_task_count_max(&self, max: usize) {
        self.shared.lock().pending_task_count_max = max;
    }

    /// Number of tasks dropped for expiration since construction.
    #[must_use]
    pub fn expired_task_count(&self) -> usize {
        self.shared.lock().expired_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Runnable for Noop {
        fn run(&self) {}
    }

    #[test]
    fn test_start_requires_factory() {
        let pool = ThreadManager::new();
        assert!(matches!(
            pool.start(),
            Err(ManagerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_factory_disposition_is_invariant() {
        let pool = ThreadManager::new();
        pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
        assert!(matches!(
            pool.set_thread_factory(ThreadFactory::new(true)),
            Err(ManagerError::InvalidArgument(_))
        ));
        // Same disposition replaces cleanly.
        pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
    }

    #[test]
    fn test_operations_require_started() {
        let pool = ThreadManager::new();
        pool.set_thread_factory(ThreadFactory::new(false)).unwrap();

        assert!(matches!(
            pool.submit(Arc::new(Noop)),
            Err(ManagerError::NotStarted)
        ));
        assert!(matches!(
            pool.remove(&(Arc::new(Noop) as Arc<dyn Runnable>)),
            Err(ManagerError::NotStarted)
        ));
        assert!(matches!(
            pool.remove_next_pending(),
            Err(ManagerError::NotStarted)
        ));
    }

    #[test]
    fn test_start_after_stop_is_noop() {
        let pool = ThreadManager::new();
        pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
        pool.start().unwrap();
        pool.stop().unwrap();

        pool.start().unwrap();
        assert_eq!(pool.state(), ManagerState::Stopped);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let pool = ThreadManager::new();
        pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
        pool.start().unwrap();
        pool.stop().unwrap();
        pool.stop().unwrap();
        assert_eq!(pool.state(), ManagerState::Stopped);
    }

    #[test]
    fn test_remove_worker_beyond_target_fails() {
        let pool = ThreadManager::new();
        pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
        pool.start().unwrap();
        assert!(matches!(
            pool.remove_worker(1),
            Err(ManagerError::InvalidArgument(_))
        ));
        pool.stop().unwrap();
    }

    #[test]
    fn test_from_config() {
        let config = ManagerConfig::new().with_worker_count(2);
        let pool = ThreadManager::from_config(&config).unwrap();
        assert!(pool.thread_factory().is_some());

        let invalid = ManagerConfig::new().with_worker_count(0);
        assert!(ThreadManager::from_config(&invalid).is_err());
    }

    #[test]
    fn test_cap_accessors() {
        let pool = ThreadManager::new();
        assert_eq!(pool.pending_task_count_max(), 0);
        pool.set_pending_task_count_max(32);
        assert_eq!(pool.pending_task_count_max(), 32);
    }
}
