//! End-to-end lifecycle tests: drive `run_server` through full
//! startup/shutdown cycles against real config files and a mock supervisor
//! socket.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use switchboard_core::lifecycle::{ShutdownReason, ShutdownReceiver};
use switchboard_server::{ServerError, run_server};
use tokio::sync::watch;

/// A config that binds an ephemeral port and polls jobs every 200ms so a
/// full startup/shutdown cycle takes milliseconds, not the 15s default.
const TEST_CONFIG: &str = "host: \"127.0.0.1\"\nport: 0\njobs:\n  poll-interval-ms: 200\n";

// `run_server` reads NOTIFY_SOCKET from the process environment, so every
// test that runs a server serializes through this lock and restores the
// variable when done.
static NOTIFY_ENV: Mutex<()> = Mutex::new(());

struct NotifyEnv {
    _lock: MutexGuard<'static, ()>,
    previous: Option<std::ffi::OsString>,
}

impl NotifyEnv {
    fn set(path: &Path) -> Self {
        let lock = NOTIFY_ENV.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::env::var_os("NOTIFY_SOCKET");
        // SAFETY: tests touching NOTIFY_SOCKET hold NOTIFY_ENV for their
        // whole duration, so no concurrent reads or writes race this.
        unsafe { std::env::set_var("NOTIFY_SOCKET", path) };
        Self {
            _lock: lock,
            previous,
        }
    }

    fn unset() -> Self {
        let lock = NOTIFY_ENV.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::env::var_os("NOTIFY_SOCKET");
        // SAFETY: see `set`.
        unsafe { std::env::remove_var("NOTIFY_SOCKET") };
        Self {
            _lock: lock,
            previous,
        }
    }
}

impl Drop for NotifyEnv {
    fn drop(&mut self) {
        // SAFETY: the lock is still held until this guard is fully dropped.
        match &self.previous {
            Some(value) => unsafe { std::env::set_var("NOTIFY_SOCKET", value) },
            None => unsafe { std::env::remove_var("NOTIFY_SOCKET") },
        }
    }
}

fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn shutdown_pair(
    pre_queued: bool,
) -> (watch::Sender<Option<ShutdownReason>>, ShutdownReceiver) {
    let initial = pre_queued.then_some(ShutdownReason::External);
    watch::channel(initial)
}

async fn run(
    config_path: &Path,
    disable_config_watch: bool,
    shutdown: ShutdownReceiver,
) -> Result<(), ServerError> {
    tokio::time::timeout(
        Duration::from_secs(30),
        run_server(config_path, disable_config_watch, false, shutdown),
    )
    .await
    .expect("run_server did not return within 30s")
}

#[tokio::test]
async fn clean_run_with_queued_shutdown() {
    let _env = NotifyEnv::unset();
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, TEST_CONFIG);

    // The queued value makes the run loop stop as soon as startup completes.
    let (_tx, shutdown) = shutdown_pair(true);
    run(&config_path, true, shutdown).await.unwrap();
}

#[tokio::test]
async fn clean_run_with_config_watch_enabled() {
    let _env = NotifyEnv::unset();
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, TEST_CONFIG);

    let (_tx, shutdown) = shutdown_pair(true);
    run(&config_path, false, shutdown).await.unwrap();
}

#[tokio::test]
async fn shutdown_signal_delivered_while_running() {
    let _env = NotifyEnv::unset();
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, TEST_CONFIG);

    let (tx, shutdown) = shutdown_pair(false);
    let server = tokio::spawn(async move {
        tokio::time::timeout(
            Duration::from_secs(30),
            run_server(&config_path, true, false, shutdown),
        )
        .await
        .expect("run_server did not return within 30s")
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(Some(ShutdownReason::Interrupt)).unwrap();
    // A second delivery once shutdown has begun has no further effect.
    let _ = tx.send(Some(ShutdownReason::Interrupt));

    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn missing_config_file_fails_before_startup() {
    let _env = NotifyEnv::unset();
    let (_tx, shutdown) = shutdown_pair(true);

    let err = run(Path::new("/nonexistent/switchboard/config.yaml"), true, shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Config(_)));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::net::UnixDatagram;

    /// Bind a mock supervisor socket in `dir` and return it with its path.
    fn supervisor_socket(dir: &tempfile::TempDir) -> (UnixDatagram, PathBuf) {
        let path = dir.path().join("supervisor.sock");
        let socket = UnixDatagram::bind(&path).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        (socket, path)
    }

    #[tokio::test]
    async fn readiness_notification_sent_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let (socket, socket_path) = supervisor_socket(&dir);
        let _env = NotifyEnv::set(&socket_path);
        let config_path = write_config(&dir, TEST_CONFIG);

        let (_tx, shutdown) = shutdown_pair(true);
        run(&config_path, true, shutdown).await.unwrap();

        let mut buf = [0u8; 64];
        let n = socket.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"READY=1");

        // Exactly one message: nothing else ever arrives on the socket.
        assert!(socket.recv(&mut buf).is_err());
    }

    #[tokio::test]
    async fn malformed_config_sends_no_readiness() {
        let dir = tempfile::tempdir().unwrap();
        let (socket, socket_path) = supervisor_socket(&dir);
        let _env = NotifyEnv::set(&socket_path);
        let config_path = write_config(&dir, "host: [unclosed");

        let (_tx, shutdown) = shutdown_pair(true);
        let err = run(&config_path, true, shutdown).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));

        let mut buf = [0u8; 64];
        assert!(socket.recv(&mut buf).is_err(), "no readiness expected");
    }

    #[tokio::test]
    async fn unreadable_config_fails_before_startup() {
        use std::os::unix::fs::PermissionsExt;

        let _env = NotifyEnv::unset();
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(&dir, TEST_CONFIG);
        std::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o200)).unwrap();

        // Permission bits don't apply to root; nothing to assert there.
        if std::fs::read(&config_path).is_ok() {
            return;
        }

        let (_tx, shutdown) = shutdown_pair(true);
        let err = run(&config_path, true, shutdown).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[tokio::test]
    async fn unreachable_supervisor_is_nonfatal_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing-dir").join("supervisor.sock");
        let _env = NotifyEnv::set(&missing);
        let config_path = write_config(&dir, TEST_CONFIG);

        let (_tx, shutdown) = shutdown_pair(true);
        run(&config_path, true, shutdown).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_supervisor_fails_run_in_strict_mode() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing-dir").join("supervisor.sock");
        let _env = NotifyEnv::set(&missing);
        let config_path = write_config(
            &dir,
            &format!("{TEST_CONFIG}readiness:\n  strict: true\n"),
        );

        let (_tx, shutdown) = shutdown_pair(true);
        let err = run(&config_path, true, shutdown).await.unwrap_err();
        assert!(matches!(err, ServerError::Notify(_)));
    }

    #[tokio::test]
    async fn occupied_port_fails_startup_and_sends_no_readiness() {
        let dir = tempfile::tempdir().unwrap();
        let (socket, socket_path) = supervisor_socket(&dir);
        let _env = NotifyEnv::set(&socket_path);

        // Hold the port open so the server's bind must fail.
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let config_path = write_config(
            &dir,
            &format!("host: \"127.0.0.1\"\nport: {port}\njobs:\n  poll-interval-ms: 200\n"),
        );

        let (_tx, shutdown) = shutdown_pair(true);
        let err = run(&config_path, true, shutdown).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Startup {
                subsystem: "http-listener",
                ..
            }
        ));

        let mut buf = [0u8; 64];
        assert!(socket.recv(&mut buf).is_err(), "no readiness expected");
    }
}
