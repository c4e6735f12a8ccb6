//! Background job scheduler: a single polling task that drains a queue of
//! pending jobs at a configurable interval.

use crate::config::Config;
use arc_swap::ArcSwap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A unit of deferred work. The closure runs on the scheduler task.
pub struct Job {
    name: String,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    pub fn new(name: impl Into<String>, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job scheduler is already running")]
    AlreadyRunning,

    #[error("job scheduler task failed to stop: {source}")]
    Stop {
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Polls for pending jobs on a fixed interval.
///
/// The interval is read from the shared config snapshot on every tick, so a
/// hot reload takes effect without restarting the scheduler. The knob lives
/// in `jobs.poll-interval-ms` and nowhere else.
pub struct JobScheduler {
    config: Arc<ArcSwap<Config>>,
    queue: Arc<Mutex<VecDeque<Job>>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new(config: Arc<ArcSwap<Config>>) -> Self {
        Self {
            config,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Queue a job for the next polling tick.
    pub fn enqueue(&self, job: Job) {
        tracing::debug!(job = %job.name, "job queued");
        self.queue
            .lock()
            .expect("job queue lock poisoned")
            .push_back(job);
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the polling task. Fails if the scheduler is already running.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.handle.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let queue = self.queue.clone();

        let handle = tokio::spawn(async move {
            loop {
                let interval = Duration::from_millis(config.load().jobs.poll_interval_ms.max(1));
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let pending: Vec<Job> = {
                            let mut queue = queue.lock().expect("job queue lock poisoned");
                            queue.drain(..).collect()
                        };
                        for job in pending {
                            tracing::debug!(job = %job.name, "running job");
                            (job.run)();
                        }
                    }
                    _ = shutdown_rx.wait_for(|stop| *stop) => break,
                }
            }
        });

        tracing::info!(
            poll_interval_ms = self.config.load().jobs.poll_interval_ms,
            "job scheduler started"
        );
        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the polling task and wait for it to finish. A no-op when the
    /// scheduler is not running.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        handle.await.map_err(|source| SchedulerError::Stop { source })?;
        tracing::info!("job scheduler stopped");
        Ok(())
    }
}
