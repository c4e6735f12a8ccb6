use switchboard_core::config::ConfigError;
use switchboard_core::lifecycle::notify::NotifyError;

/// Errors a server run can end with. One pass/fail outcome per invocation:
/// everything bubbles up into the single `run_server` return value.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The config file was unreadable, malformed, or failed validation.
    /// Terminal, returned before any subsystem starts.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A subsystem failed to bind or initialize. Already-started subsystems
    /// are torn down before this is returned.
    #[error("failed to start {subsystem}: {source}")]
    Startup {
        subsystem: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The supervisor readiness notification failed. Only returned when
    /// `readiness.strict` is set; otherwise a logged diagnostic.
    #[error("readiness notification failed: {0}")]
    Notify(#[from] NotifyError),

    /// A subsystem failed to stop cleanly. Teardown still attempts every
    /// subsystem; the first failure becomes the return value.
    #[error("failed to stop {subsystem}: {source}")]
    Teardown {
        subsystem: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
