//! # Threadmill
//!
//! A dynamically-resizable pool of worker threads with a bounded backlog,
//! per-task expiration, and graceful lifecycle management, built on the
//! battle-tested `parking_lot` crate.
//!
//! Producers hand the pool opaque work items ([`Runnable`]); long-lived
//! workers consume them in FIFO order. The pool grows and shrinks at
//! runtime, the queue may be capped (producers then block with a deadline,
//! fail fast, or wait forever), and every task may carry an expiration
//! deadline after which it is reported to a callback instead of run.
//!
//! ## Modules
//!
//! - [`manager`] - the pool façade ([`ThreadManager`])
//! - [`thread`] / [`factory`] - thread handle and thread factory
//! - [`monitor`] / [`mutex`] - the condition-variable and lock primitives the pool is built on
//! - [`config`] - serde-backed pool configuration
//! - [`error`] - error types
//!
//! ## Examples
//!
//! ### Running work on a fixed pool
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use threadmill::{Runnable, ThreadFactory, ThreadManager};
//!
//! struct Increment(AtomicUsize);
//!
//! impl Runnable for Increment {
//!     fn run(&self) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let pool = ThreadManager::new_simple(2, 0);
//! pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
//! pool.start().unwrap();
//!
//! let job = Arc::new(Increment(AtomicUsize::new(0)));
//! for _ in 0..16 {
//!     pool.submit(Arc::clone(&job) as Arc<dyn Runnable>).unwrap();
//! }
//!
//! // stop() drains the queue before the workers leave.
//! pool.stop().unwrap();
//! assert_eq!(job.0.load(Ordering::Relaxed), 16);
//! ```
//!
//! ### Bounded backlog with fail-fast submission
//!
//! ```
//! use std::sync::Arc;
//! use threadmill::{Runnable, ThreadFactory, ThreadManager};
//!
//! struct Noop;
//!
//! impl Runnable for Noop {
//!     fn run(&self) {}
//! }
//!
//! // No workers: the queue fills and stays full.
//! let pool = ThreadManager::new_simple(0, 1);
//! pool.set_thread_factory(ThreadFactory::new(false)).unwrap();
//! pool.start().unwrap();
//!
//! pool.add(Arc::new(Noop), 0, 0).unwrap();
//!
//! // At the cap, a negative timeout fails fast instead of blocking.
//! assert!(pool.add(Arc::new(Noop), -1, 0).is_err());
//!
//! pool.remove_next_pending().unwrap();
//! pool.stop().unwrap();
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod factory;
pub mod manager;
pub mod monitor;
pub mod mutex;
pub mod thread;
pub mod util;

// Re-export main types for convenience
pub use config::ManagerConfig;
pub use error::{ManagerError, Result};
pub use factory::ThreadFactory;
pub use manager::{ExpireCallback, ManagerState, ThreadManager};
pub use monitor::{Monitor, WaitOutcome};
pub use mutex::{acquire, LockTimeout, Mutex, MutexGuard};
pub use thread::{Runnable, Thread, ThreadState};
