//! Process lifecycle: supervisor readiness notification, signal handling,
//! daemonization, PID file management, and logging.

#[cfg(unix)]
pub mod daemon;
pub mod logging;
pub mod notify;
#[cfg(unix)]
pub mod pid_file;
pub mod signal;

use std::fmt;
use tokio::sync::watch;

/// Why the server is shutting down. Every variant takes the same teardown
/// path; the variant only shows up in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Cancellation injected by the embedding caller (tests, supervisors).
    External,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Terminate => write!(f, "terminate"),
            ShutdownReason::External => write!(f, "external"),
        }
    }
}

/// Receiving half of the shutdown channel consumed by the server run loop.
///
/// The channel is level-triggered: one published reason is enough, and later
/// publications are absorbed without further effect. Production wiring feeds
/// it from [`signal::SignalHandler`]; tests pre-load it directly.
pub type ShutdownReceiver = watch::Receiver<Option<ShutdownReason>>;
