//! Mutual exclusion primitive and the timed-acquisition convention.
//!
//! The scheduler keeps every piece of mutable pool state behind a single
//! [`Mutex`], re-exported here from the battle-tested `parking_lot` crate.
//! Task submission adds one twist the plain guard does not cover: a producer
//! may ask to give up on the lock after a deadline. [`LockTimeout`] captures
//! the millisecond convention the submission API speaks (`0` blocks forever,
//! a negative value tries once, a positive value bounds the wait) and
//! [`acquire`] turns it into an optional guard.
//!
//! # Examples
//!
//! ```
//! use threadmill::mutex::{acquire, LockTimeout, Mutex};
//!
//! let mutex = Mutex::new(0);
//!
//! // An uncontended try-lock succeeds immediately.
//! {
//!     let mut guard = acquire(&mutex, LockTimeout::from_millis(-1)).unwrap();
//!     *guard = 7;
//! }
//!
//! // A zero timeout blocks until the lock is granted.
//! assert_eq!(*acquire(&mutex, LockTimeout::from_millis(0)).unwrap(), 7);
//! ```

use std::time::Duration;

// Re-export parking_lot's Mutex types
pub use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

/// How long a lock acquisition may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeout {
    /// Block until the lock is granted.
    Forever,
    /// Take the lock only if it is free right now.
    Immediate,
    /// Block for at most the given duration.
    Bounded(Duration),
}

impl LockTimeout {
    /// Interpret a millisecond submission timeout: `0` blocks forever, a
    /// negative value tries once, a positive value bounds the wait.
    #[must_use]
    pub fn from_millis(timeout_ms: i64) -> Self {
        match timeout_ms {
            0 => Self::Forever,
            t if t < 0 => Self::Immediate,
            t => Self::Bounded(Duration::from_millis(t.unsigned_abs())),
        }
    }
}

/// Acquire `mutex` under the given timeout, returning `None` when the
/// deadline passes (or the lock is held, for [`LockTimeout::Immediate`])
/// before the lock is granted. A [`LockTimeout::Forever`] acquisition always
/// returns a guard.
pub fn acquire<T>(mutex: &Mutex<T>, timeout: LockTimeout) -> Option<MutexGuard<'_, T>> {
    match timeout {
        LockTimeout::Forever => Some(mutex.lock()),
        LockTimeout::Immediate => mutex.try_lock(),
        LockTimeout::Bounded(limit) => mutex.try_lock_for(limit),
    }
}
