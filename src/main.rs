mod cli;

use clap::Parser;
use cli::{Cli, Command, RunArgs};
use std::path::Path;
use switchboard_core::config::Config;
use switchboard_core::lifecycle::signal::SignalHandler;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => cmd_run(args),
        Command::Stop(args) => cmd_stop(args),
        Command::Status(args) => cmd_status(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    // Daemonize before creating the tokio runtime (unix only)
    #[cfg(unix)]
    if args.daemon {
        switchboard_core::lifecycle::daemon::daemonize()?;
    }

    // Peek at the config for logging and PID settings; run_server loads it
    // again authoritatively and reports the real error on failure.
    let peeked = Config::load(Path::new(&args.config)).ok();

    let to_file = args.daemon || peeked.as_ref().is_some_and(|c| c.logging_to_file);
    let log_dir = peeked.as_ref().and_then(|c| c.log_dir.clone());
    let _guard = switchboard_core::lifecycle::logging::init_logging(
        &args.log_level,
        to_file,
        log_dir.as_deref(),
    );

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "switchboard starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        // Hold the PID file for the lifetime of the run (unix only)
        #[cfg(unix)]
        let _pid_file = if args.daemon {
            let path = args.pid_file.clone().unwrap_or_else(|| {
                peeked
                    .as_ref()
                    .map(|c| c.daemon.pid_file.clone())
                    .unwrap_or_else(|| "./switchboard.pid".to_string())
            });
            Some(switchboard_core::lifecycle::pid_file::PidFile::acquire(
                path,
            )?)
        } else {
            None
        };

        let (signal_handler, shutdown_rx) = SignalHandler::new();
        tokio::spawn(signal_handler.run());

        switchboard_server::run_server(
            Path::new(&args.config),
            args.disable_config_watch,
            args.legacy_invocation,
            shutdown_rx,
        )
        .await?;

        anyhow::Ok(())
    })
}

#[cfg(unix)]
fn cmd_stop(args: cli::PidArgs) -> anyhow::Result<()> {
    use switchboard_core::lifecycle::pid_file::PidFile;

    let pid = PidFile::read_pid(&args.pid_file)?;
    if !PidFile::is_alive(pid) {
        println!("Process {pid} is not running.");
        return Ok(());
    }

    println!("Stopping PID {pid} (timeout {}s)...", args.timeout);
    PidFile::stop(pid, std::time::Duration::from_secs(args.timeout))?;
    println!("Stopped.");
    Ok(())
}

#[cfg(not(unix))]
fn cmd_stop(_args: cli::PidArgs) -> anyhow::Result<()> {
    anyhow::bail!("The 'stop' command is only supported on Unix systems");
}

#[cfg(unix)]
fn cmd_status(args: cli::PidArgs) -> anyhow::Result<()> {
    use switchboard_core::lifecycle::pid_file::PidFile;

    match PidFile::read_pid(&args.pid_file) {
        Ok(pid) => {
            if PidFile::is_alive(pid) {
                println!("switchboard is running (PID {pid})");
            } else {
                println!("switchboard is NOT running (stale PID file, PID {pid})");
            }
        }
        Err(_) => {
            println!(
                "switchboard is NOT running (no PID file at {})",
                args.pid_file
            );
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn cmd_status(_args: cli::PidArgs) -> anyhow::Result<()> {
    anyhow::bail!("The 'status' command is only supported on Unix systems");
}
