//! CLI argument parsing with subcommand architecture.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "switchboard",
    version,
    about = "Self-hosted team messaging server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the server (default when no subcommand is given)
    Run(RunArgs),
    /// Stop a running daemon
    Stop(PidArgs),
    /// Check status of a running daemon
    Status(PidArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml", env = "SWITCHBOARD_CONFIG")]
    pub config: String,

    /// Log level
    #[arg(long, default_value = "info", env = "SWITCHBOARD_LOG_LEVEL")]
    pub log_level: String,

    /// Do not watch the config file for live reloads
    #[arg(long)]
    pub disable_config_watch: bool,

    /// Run as a background daemon (unix only)
    #[arg(long)]
    pub daemon: bool,

    /// Path to PID file (overrides config)
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Set by the retired wrapper entry point; only emits a deprecation
    /// warning.
    #[arg(long, hide = true)]
    pub legacy_invocation: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: "config.yaml".to_string(),
            log_level: "info".to_string(),
            disable_config_watch: false,
            daemon: false,
            pid_file: None,
            legacy_invocation: false,
        }
    }
}

#[derive(Parser, Debug)]
pub struct PidArgs {
    /// Path to PID file
    #[arg(long, default_value = "./switchboard.pid")]
    pub pid_file: String,

    /// Timeout in seconds for stop operation
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}
