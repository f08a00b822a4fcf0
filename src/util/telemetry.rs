//! Telemetry helpers for structured logging.
//!
//! The pool reports lifecycle edges, resize operations, expirations, and
//! work-item panics through `tracing`. Embedders normally install their own
//! subscriber; this helper installs a scheduler-flavored default when none
//! is set: the filter is read from [`LOG_ENV_VAR`] and worker thread names
//! (`threadmill-N`) are included in every record so log lines can be pinned
//! to the worker that emitted them.

/// Environment variable consulted for the log filter, e.g.
/// `THREADMILL_LOG=threadmill=debug`.
pub const LOG_ENV_VAR: &str = "THREADMILL_LOG";

/// Default filter when [`LOG_ENV_VAR`] is unset or unparsable.
const DEFAULT_FILTER: &str = "threadmill=info";

/// Initialize tracing for the pool. A no-op when a dispatcher is already
/// installed.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
