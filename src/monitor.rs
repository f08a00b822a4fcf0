//! Condition-variable monitor for thread coordination.
//!
//! A [`Monitor`] blocks a thread, consuming no CPU time, until another
//! thread signals it. It follows the scheduler's millisecond timeout
//! convention: a timeout of zero means "wait forever", any positive timeout
//! is a relative bound in milliseconds. Waiting requires the caller to hold
//! the mutex the monitor coordinates on; the guard is released for the
//! duration of the wait and re-acquired before control returns.
//!
//! Several monitors may share one mutex: the underlying
//! `parking_lot::Condvar` binds to whichever mutex the supplied guard
//! belongs to. The scheduler leans on this — its queue, backlog, and
//! worker-count monitors all coordinate on the single pool mutex, so a
//! worker that dequeues under the lock can open a backlog slot atomically
//! with respect to a racing submission.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use threadmill::monitor::Monitor;
//! use threadmill::mutex::Mutex;
//!
//! let shared = Arc::new((Mutex::new(false), Monitor::new()));
//! let signaller = Arc::clone(&shared);
//!
//! thread::spawn(move || {
//!     let (lock, monitor) = &*signaller;
//!     *lock.lock() = true;
//!     monitor.notify_one();
//! });
//!
//! let (lock, monitor) = &*shared;
//! let mut ready = lock.lock();
//! while !*ready {
//!     monitor.wait(&mut ready);
//! }
//! assert!(*ready);
//! ```

use std::time::Duration;

use crate::mutex::MutexGuard;

/// The way a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A notification (or spurious wakeup) ended the wait.
    Signaled,
    /// The relative deadline passed first.
    TimedOut,
}

impl WaitOutcome {
    /// `true` when the deadline passed before any notification arrived.
    #[must_use]
    pub const fn timed_out(self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// A condition variable bound to the mutex of whatever guard it is handed.
///
/// Unlike `std::sync::Condvar`, this type does not implement poisoning.
/// Wakeups may be spurious; callers re-check their predicate in a loop.
#[derive(Debug, Default)]
pub struct Monitor {
    cond: parking_lot::Condvar,
}

impl Monitor {
    /// Creates a new monitor.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cond: parking_lot::Condvar::new(),
        }
    }

    /// Block until notified.
    ///
    /// The mutex behind `guard` is atomically released while waiting and
    /// re-acquired before this returns.
    #[inline]
    pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
        self.cond.wait(guard);
    }

    /// Block until notified or until `timeout_ms` milliseconds pass.
    ///
    /// A zero timeout waits forever, matching [`Monitor::wait`].
    #[inline]
    pub fn wait_ms<T>(&self, guard: &mut MutexGuard<'_, T>, timeout_ms: u64) -> WaitOutcome {
        if timeout_ms == 0 {
            self.cond.wait(guard);
            return WaitOutcome::Signaled;
        }
        if self
            .cond
            .wait_for(guard, Duration::from_millis(timeout_ms))
            .timed_out()
        {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Signaled
        }
    }

    /// Wakes up one thread blocked on this monitor.
    #[inline]
    pub fn notify_one(&self) {
        self.cond.notify_one();
    }

    /// Wakes up every thread blocked on this monitor.
    #[inline]
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutex::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_basic_wait_notify() {
        let shared = Arc::new((Mutex::new(false), Monitor::new()));
        let signaller = Arc::clone(&shared);

        thread::spawn(move || {
            let (lock, monitor) = &*signaller;
            thread::sleep(Duration::from_millis(10));
            *lock.lock() = true;
            monitor.notify_one();
        });

        let (lock, monitor) = &*shared;
        let mut ready = lock.lock();
        while !*ready {
            monitor.wait(&mut ready);
        }
        assert!(*ready);
    }

    #[test]
    fn test_wait_ms_times_out() {
        let lock = Mutex::new(());
        let monitor = Monitor::new();

        let mut guard = lock.lock();
        let start = Instant::now();
        let outcome = monitor.wait_ms(&mut guard, 50);
        assert!(outcome.timed_out());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_zero_timeout_waits_for_notification() {
        let shared = Arc::new((Mutex::new(false), Monitor::new()));
        let signaller = Arc::clone(&shared);

        let handle = thread::spawn(move || {
            let (lock, monitor) = &*signaller;
            thread::sleep(Duration::from_millis(30));
            *lock.lock() = true;
            monitor.notify_one();
        });

        let (lock, monitor) = &*shared;
        let mut ready = lock.lock();
        while !*ready {
            assert!(!monitor.wait_ms(&mut ready, 0).timed_out());
        }
        drop(ready);
        handle.join().unwrap();
    }

    #[test]
    fn test_notify_all_wakes_every_waiter() {
        let shared = Arc::new((Mutex::new(false), Monitor::new()));
        let mut handles = vec![];

        for _ in 0..4 {
            let shared = Arc::clone(&shared);
            handles.push(thread::spawn(move || {
                let (lock, monitor) = &*shared;
                let mut go = lock.lock();
                while !*go {
                    monitor.wait(&mut go);
                }
            }));
        }

        thread::sleep(Duration::from_millis(10));
        {
            let (lock, monitor) = &*shared;
            *lock.lock() = true;
            monitor.notify_all();
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_two_monitors_one_mutex() {
        // Each waiter group sleeps on its own monitor but both coordinate on
        // the same mutex.
        let shared = Arc::new((Mutex::new((false, false)), Monitor::new(), Monitor::new()));

        let first = Arc::clone(&shared);
        let a = thread::spawn(move || {
            let (lock, first_monitor, _) = &*first;
            let mut flags = lock.lock();
            while !flags.0 {
                first_monitor.wait(&mut flags);
            }
        });

        let second = Arc::clone(&shared);
        let b = thread::spawn(move || {
            let (lock, _, second_monitor) = &*second;
            let mut flags = lock.lock();
            while !flags.1 {
                second_monitor.wait(&mut flags);
            }
        });

        thread::sleep(Duration::from_millis(10));

        let (lock, first_monitor, second_monitor) = &*shared;
        {
            let mut flags = lock.lock();
            flags.0 = true;
            first_monitor.notify_one();
        }
        a.join().unwrap();

        {
            let mut flags = lock.lock();
            flags.1 = true;
            second_monitor.notify_one();
        }
        b.join().unwrap();
    }
}
