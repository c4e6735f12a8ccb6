//! Server lifecycle controller: startup sequencing, readiness signaling, and
//! signal-driven graceful shutdown.

use crate::{AppState, ServerError, build_router};
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;
use switchboard_core::config::{Config, ConfigWatcher};
use switchboard_core::lifecycle::notify::ReadinessNotifier;
use switchboard_core::lifecycle::{ShutdownReason, ShutdownReceiver};
use switchboard_core::scheduler::JobScheduler;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Where the server is in its lifecycle.
///
/// Owned and mutated by the controller alone. Transitions only move forward,
/// and every run ends in exactly one of `Stopped` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::NotStarted => "not-started",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::ShuttingDown => "shutting-down",
            ServerState::Stopped => "stopped",
            ServerState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

fn transition(state: &mut ServerState, next: ServerState) {
    tracing::debug!(from = %state, to = %next, "server state");
    *state = next;
}

/// Run the server through one full lifecycle: load and validate the config,
/// start the job scheduler and HTTP listener, notify the supervisor of
/// readiness, block until a shutdown reason arrives on `shutdown`, then tear
/// everything down in reverse start order.
///
/// Returns `Ok(())` for a clean run-to-shutdown cycle. A bad configuration
/// fails the run before any subsystem starts and before any readiness
/// message is sent.
///
/// Teardown has no timeout: a subsystem that never stops blocks the
/// controller indefinitely.
pub async fn run_server(
    config_path: &Path,
    disable_config_watch: bool,
    legacy_invocation: bool,
    mut shutdown: ShutdownReceiver,
) -> Result<(), ServerError> {
    let mut state = ServerState::NotStarted;
    transition(&mut state, ServerState::Starting);

    if legacy_invocation {
        tracing::warn!(
            "started through the deprecated wrapper entry point; invoke the switchboard binary directly"
        );
    }

    // Fail fast: nothing below runs on a bad config.
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            transition(&mut state, ServerState::Failed);
            return Err(e.into());
        }
    };
    tracing::info!(path = %config_path.display(), "configuration loaded");
    let config = Arc::new(ArcSwap::from_pointee(config));

    // Hot reload is best-effort: a watch that cannot be registered downgrades
    // the run, it does not abort it. Running subsystems pick changes up
    // through the swapped snapshot.
    let watcher = if disable_config_watch {
        None
    } else {
        match ConfigWatcher::start(config_path, config.clone(), |new_config| {
            tracing::info!(
                poll_interval_ms = new_config.jobs.poll_interval_ms,
                "applied reloaded configuration to running subsystems"
            );
        }) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "config watch unavailable, continuing without hot reload");
                None
            }
        }
    };

    // Subsystems start in order: job scheduler first, listener last.
    let mut scheduler = JobScheduler::new(config.clone());
    if let Err(e) = scheduler.start() {
        transition(&mut state, ServerState::Failed);
        return Err(ServerError::Startup {
            subsystem: "job-scheduler",
            source: Box::new(e),
        });
    }

    let bind_address = config.load().bind_address();
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            if let Err(stop_err) = scheduler.stop().await {
                tracing::error!(
                    error = %stop_err,
                    "job scheduler failed to stop while rolling back startup"
                );
            }
            transition(&mut state, ServerState::Failed);
            return Err(ServerError::Startup {
                subsystem: "http-listener",
                source: Box::new(e),
            });
        }
    };
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "listening for connections");
    }

    let router = build_router(AppState::new(config.clone()));
    let (drain_tx, mut drain_rx) = watch::channel(false);
    let serve_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = drain_rx.wait_for(|drain| *drain).await;
            })
            .await
    });

    // Every startup step that can fail has succeeded; tell the supervisor.
    // Sent at most once per run, never retried.
    let notifier = ReadinessNotifier::from_env();
    if let Err(e) = notifier.notify_ready() {
        if config.load().readiness.strict {
            drop(watcher);
            if let Err(teardown_err) = stop_subsystems(drain_tx, serve_task, &mut scheduler).await
            {
                tracing::error!(error = %teardown_err, "teardown error while aborting startup");
            }
            transition(&mut state, ServerState::Failed);
            return Err(ServerError::Notify(e));
        }
        tracing::warn!(error = %e, "readiness notification failed, continuing");
    }

    transition(&mut state, ServerState::Running);

    // The single suspension point: block until a shutdown reason arrives.
    let reason = match shutdown.wait_for(|reason| reason.is_some()).await {
        Ok(value) => (*value).unwrap_or(ShutdownReason::External),
        // The sender went away without signaling; treat it as cancellation.
        Err(_) => ShutdownReason::External,
    };
    transition(&mut state, ServerState::ShuttingDown);
    tracing::info!(reason = %reason, "shutting down");

    // Release the config watch before teardown so no reload can land on
    // subsystems that are already stopping.
    drop(watcher);

    let result = stop_subsystems(drain_tx, serve_task, &mut scheduler).await;
    match &result {
        Ok(()) => transition(&mut state, ServerState::Stopped),
        Err(_) => transition(&mut state, ServerState::Failed),
    }
    result
}

/// Stop subsystems in reverse start order: drain the HTTP listener, then stop
/// the job scheduler. Teardown is not short-circuited — every subsystem is
/// attempted and the first error becomes the result.
async fn stop_subsystems(
    drain_tx: watch::Sender<bool>,
    serve_task: tokio::task::JoinHandle<Result<(), std::io::Error>>,
    scheduler: &mut JobScheduler,
) -> Result<(), ServerError> {
    let mut first_error: Option<ServerError> = None;

    let _ = drain_tx.send(true);
    match serve_task.await {
        Ok(Ok(())) => tracing::info!("http listener stopped"),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "http listener failed to stop cleanly");
            first_error.get_or_insert(ServerError::Teardown {
                subsystem: "http-listener",
                source: Box::new(e),
            });
        }
        Err(e) => {
            tracing::error!(error = %e, "http serve task failed");
            first_error.get_or_insert(ServerError::Teardown {
                subsystem: "http-listener",
                source: Box::new(e),
            });
        }
    }

    if let Err(e) = scheduler.stop().await {
        tracing::error!(error = %e, "job scheduler failed to stop cleanly");
        first_error.get_or_insert(ServerError::Teardown {
            subsystem: "job-scheduler",
            source: Box::new(e),
        });
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
