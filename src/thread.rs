//! Thread handle and the work-item abstraction.
//!
//! [`Runnable`] is the unit of executable work the pool accepts: one method,
//! no arguments, no result. [`Thread`] binds a work item to an OS thread
//! with an explicit lifecycle, a start handshake, and an optional join,
//! depending on the detached disposition it was created with.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use tracing::warn;

use crate::monitor::Monitor;
use crate::mutex::Mutex;

/// A unit of executable work.
///
/// Implementations run on whichever pool thread claims them; they must not
/// assume any particular thread. A panic inside [`run`](Runnable::run) is
/// contained by the worker that executes it.
pub trait Runnable: Send + Sync {
    /// Execute the work item.
    fn run(&self);
}

/// Lifecycle of a [`Thread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Built but not yet started.
    Uninitialized,
    /// `start` is spawning the OS thread.
    Starting,
    /// The OS thread is running the bound work item.
    Started,
    /// The work item returned; the OS thread is on its way out.
    Stopping,
    /// Joined.
    Stopped,
}

static THREAD_SEQ: AtomicUsize = AtomicUsize::new(0);

struct Inner {
    state: ThreadState,
    id: Option<ThreadId>,
    handle: Option<JoinHandle<()>>,
}

/// An OS thread bound to a [`Runnable`], ready to start.
///
/// Threads come out of a [`ThreadFactory`](crate::ThreadFactory) unstarted.
/// `start` spawns the OS thread and does not return until the spawned thread
/// has captured everything it needs from the calling context, so the caller
/// is free to drop its references immediately afterwards. A thread is
/// joinable iff its factory was not detached.
pub struct Thread {
    runnable: Arc<dyn Runnable>,
    detached: bool,
    inner: Mutex<Inner>,
    handshake: Monitor,
}

impl Thread {
    pub(crate) fn new(detached: bool, runnable: Arc<dyn Runnable>) -> Arc<Self> {
        Arc::new(Self {
            runnable,
            detached,
            inner: Mutex::new(Inner {
                state: ThreadState::Uninitialized,
                id: None,
                handle: None,
            }),
            handshake: Monitor::new(),
        })
    }

    /// Spawn the OS thread and run the bound work item on it.
    ///
    /// Returns once the spawned thread has reached [`ThreadState::Started`].
    /// Calling `start` on a thread that already left `Uninitialized` is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Propagates the OS error when the thread cannot be spawned; the
    /// handle stays `Uninitialized`.
    pub fn start(self: &Arc<Self>) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != ThreadState::Uninitialized {
            return Ok(());
        }
        inner.state = ThreadState::Starting;

        let entry = Arc::clone(self);
        let seq = THREAD_SEQ.fetch_add(1, Ordering::Relaxed);
        let handle = match thread::Builder::new()
            .name(format!("threadmill-{seq}"))
            .spawn(move || entry.thread_main())
        {
            Ok(handle) => handle,
            Err(err) => {
                inner.state = ThreadState::Uninitialized;
                return Err(err);
            }
        };

        inner.id = Some(handle.thread().id());
        inner.handle = (!self.detached).then_some(handle);

        // Rendezvous: the spawned thread owns its own reference to this
        // handle once it flips the state.
        while inner.state == ThreadState::Starting {
            self.handshake.wait(&mut inner);
        }
        Ok(())
    }

    fn thread_main(self: Arc<Self>) {
        {
            let mut inner = self.inner.lock();
            inner.state = ThreadState::Started;
            self.handshake.notify_one();
        }

        self.runnable.run();

        let mut inner = self.inner.lock();
        if inner.state != ThreadState::Stopping && inner.state != ThreadState::Stopped {
            inner.state = ThreadState::Stopping;
        }
    }

    /// Block until the OS thread completes.
    ///
    /// Nothing happens when the thread is detached or was never started.
    pub fn join(&self) {
        if self.detached {
            return;
        }
        let handle = self.inner.lock().handle.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("joined a thread whose work item panicked");
            }
            self.inner.lock().state = ThreadState::Stopped;
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ThreadState {
        self.inner.lock().state
    }

    /// The OS thread id; `None` until the thread is started.
    #[must_use]
    pub fn id(&self) -> Option<ThreadId> {
        self.inner.lock().id
    }

    /// Whether this thread was created detached (and is thus non-joinable).
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}
