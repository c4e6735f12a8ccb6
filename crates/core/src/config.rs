use arc_swap::ArcSwap;
use notify::{RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ─── Config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,

    /// Public base URL of this instance, if it differs from host:port.
    pub site_url: Option<String>,

    // Logging
    pub logging_to_file: bool,
    pub log_dir: Option<String>,

    // Background jobs
    pub jobs: JobSettings,

    // Daemon mode
    pub daemon: DaemonSettings,

    // Supervisor readiness protocol
    pub readiness: ReadinessSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8065,
            site_url: None,
            logging_to_file: false,
            log_dir: None,
            jobs: JobSettings::default(),
            daemon: DaemonSettings::default(),
            readiness: ReadinessSettings::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file, sanitize, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_yaml_ng::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref site_url) = self.site_url {
            let parsed = url::Url::parse(site_url)
                .map_err(|e| ConfigError::Invalid(format!("site-url is not a valid URL: {e}")))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ConfigError::Invalid(format!(
                    "site-url must be http or https, got {}",
                    parsed.scheme()
                )));
            }
        }
        if self.jobs.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "jobs.poll-interval-ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Sanitize and normalize configuration.
    fn sanitize(&mut self) {
        if let Some(ref mut site_url) = self.site_url {
            while site_url.ends_with('/') {
                site_url.pop();
            }
        }
    }

    /// Address the HTTP listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─── Sub-configs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct JobSettings {
    /// How often the job scheduler polls for pending jobs, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DaemonSettings {
    pub pid_file: String,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            pid_file: "./switchboard.pid".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReadinessSettings {
    /// When true, a failed readiness notification aborts startup instead of
    /// being logged and ignored.
    pub strict: bool,
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("config watch error: {0}")]
    Watch(#[from] notify::Error),
}

// ─── Config Watcher ────────────────────────────────────────────────────────

/// Watches the config file and hot-reloads it into an `ArcSwap` snapshot.
///
/// Change events are debounced (150ms) and deduplicated by content hash, so
/// editors that fire several events per save trigger a single reload. A file
/// that fails to load keeps the current configuration in place. Dropping the
/// watcher releases the watch and terminates the reload task.
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn start(
        path: &Path,
        config: Arc<ArcSwap<Config>>,
        on_reload: impl Fn(&Config) + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(16);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res
                && (event.kind.is_modify() || event.kind.is_create())
            {
                let _ = tx.blocking_send(());
            }
        })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;

        let path = path.to_path_buf();
        tracing::info!(path = %path.display(), "config watcher started");

        tokio::spawn(async move {
            let mut last_hash: Option<[u8; 32]> = None;
            let mut debounce: Option<tokio::time::Instant> = None;

            loop {
                tokio::select! {
                    changed = rx.recv() => {
                        match changed {
                            Some(()) => {
                                debounce =
                                    Some(tokio::time::Instant::now() + Duration::from_millis(150));
                            }
                            // Watcher dropped: the watch was released, stop reloading.
                            None => break,
                        }
                    }
                    _ = async {
                        match debounce {
                            Some(deadline) => tokio::time::sleep_until(deadline).await,
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        debounce = None;
                        match std::fs::read(&path) {
                            Ok(contents) => {
                                let hash: [u8; 32] = sha2::Sha256::digest(&contents).into();
                                if last_hash.as_ref() == Some(&hash) {
                                    continue;
                                }
                                last_hash = Some(hash);

                                match Config::load(&path) {
                                    Ok(new_cfg) => {
                                        config.store(Arc::new(new_cfg));
                                        let current = config.load();
                                        on_reload(&current);
                                        tracing::info!("configuration reloaded");
                                    }
                                    Err(e) => {
                                        tracing::error!(
                                            "config reload failed: {e}; keeping current configuration"
                                        );
                                    }
                                }
                            }
                            Err(e) => tracing::error!("config file read failed: {e}"),
                        }
                    }
                }
            }
        });

        Ok(Self { _watcher: watcher })
    }
}
