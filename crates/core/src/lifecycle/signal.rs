//! OS signal handling: SIGINT/SIGTERM are translated into a single shutdown
//! event on a level-triggered channel.

use super::{ShutdownReason, ShutdownReceiver};
use tokio::sync::watch;

/// Listens for termination signals and publishes one shutdown reason.
///
/// The backing watch channel keeps only the latest value, so repeated signals
/// after shutdown has begun are absorbed. Registration is independent of
/// subsystem startup; the handler may be spawned before or after the server
/// starts.
pub struct SignalHandler {
    shutdown_tx: watch::Sender<Option<ShutdownReason>>,
}

impl SignalHandler {
    /// Create a handler and the receiver the server run loop blocks on.
    pub fn new() -> (Self, ShutdownReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { shutdown_tx: tx }, rx)
    }

    /// Wait for the first termination signal, publish it, and return.
    pub async fn run(self) {
        let reason = wait_for_signal().await;
        tracing::info!(signal = %reason, "received termination signal");
        let _ = self.shutdown_tx.send(Some(reason));
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownReason {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => ShutdownReason::Interrupt,
        _ = sigterm.recv() => ShutdownReason::Terminate,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownReason {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    ShutdownReason::Interrupt
}
