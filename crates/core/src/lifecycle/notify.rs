//! Supervisor readiness notification over the `NOTIFY_SOCKET` datagram
//! protocol (the subset of sd_notify this server speaks).

use std::path::{Path, PathBuf};

/// Environment variable naming the supervisor's datagram socket.
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

/// The one payload this component ever sends. No trailing newline.
const READY_MESSAGE: &[u8] = b"READY=1";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to open supervisor socket {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write readiness message to {path}: {source}")]
    Send {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Sends the readiness message to an external process supervisor.
///
/// Readiness is best-effort signaling: whether a send failure is fatal is the
/// caller's policy decision, not this component's.
pub struct ReadinessNotifier {
    socket: Option<PathBuf>,
}

impl ReadinessNotifier {
    /// Build a notifier from `NOTIFY_SOCKET`. An unset or empty variable
    /// yields an unconfigured notifier whose [`notify_ready`] is a no-op.
    ///
    /// [`notify_ready`]: ReadinessNotifier::notify_ready
    pub fn from_env() -> Self {
        let socket = std::env::var_os(NOTIFY_SOCKET_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { socket }
    }

    /// Build a notifier targeting an explicit socket path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            socket: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.socket.is_some()
    }

    /// Send `READY=1` to the supervisor socket, once.
    ///
    /// Returns `Ok(())` without any socket activity when no supervisor socket
    /// is configured.
    pub fn notify_ready(&self) -> Result<(), NotifyError> {
        let Some(path) = &self.socket else {
            tracing::debug!("no supervisor socket configured, skipping readiness notification");
            return Ok(());
        };
        self.send(path, READY_MESSAGE)
    }

    #[cfg(unix)]
    fn send(&self, path: &Path, payload: &[u8]) -> Result<(), NotifyError> {
        use std::os::unix::net::UnixDatagram;

        let socket = UnixDatagram::unbound().map_err(|source| NotifyError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        socket.connect(path).map_err(|source| NotifyError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        socket.send(payload).map_err(|source| NotifyError::Send {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(socket = %path.display(), "notified supervisor of readiness");
        Ok(())
    }

    #[cfg(not(unix))]
    fn send(&self, path: &Path, _payload: &[u8]) -> Result<(), NotifyError> {
        tracing::debug!(
            socket = %path.display(),
            "supervisor readiness protocol is unix-only, skipping"
        );
        Ok(())
    }
}
