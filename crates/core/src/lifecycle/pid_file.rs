//! RAII PID file management with advisory file locking.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// RAII guard for a PID file. Holds an exclusive advisory lock while alive
/// and removes the file on drop.
pub struct PidFile {
    path: PathBuf,
    // The open handle keeps the flock held; dropping it releases the lock.
    _file: fs::File,
}

impl PidFile {
    /// Acquire a PID file at `path`: take an exclusive non-blocking `flock`
    /// and write the current PID. Fails if another instance holds the lock.
    pub fn acquire(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use std::os::unix::io::AsRawFd;

        let path = path.as_ref().to_path_buf();

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if ret != 0 {
            let err = std::io::Error::last_os_error();
            anyhow::bail!(
                "failed to lock PID file {}: {} (is another switchboard instance running?)",
                path.display(),
                err
            );
        }

        write!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { path, _file: file })
    }

    /// Read the PID stored in a PID file.
    pub fn read_pid(path: impl AsRef<Path>) -> anyhow::Result<u32> {
        let contents = fs::read_to_string(path.as_ref())?;
        let pid: u32 = contents.trim().parse()?;
        Ok(pid)
    }

    /// Check whether a process with the given PID is alive.
    pub fn is_alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    /// Send a signal to a process.
    pub fn send_signal(pid: u32, signal: i32) -> anyhow::Result<()> {
        let ret = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if ret != 0 {
            anyhow::bail!(
                "failed to send signal {} to PID {}: {}",
                signal,
                pid,
                std::io::Error::last_os_error()
            );
        }
        Ok(())
    }

    /// Gracefully stop a process: SIGTERM, poll for exit up to `timeout`,
    /// SIGKILL as a last resort.
    pub fn stop(pid: u32, timeout: std::time::Duration) -> anyhow::Result<()> {
        if !Self::is_alive(pid) {
            return Ok(());
        }

        Self::send_signal(pid, libc::SIGTERM)?;

        let start = std::time::Instant::now();
        let poll_interval = std::time::Duration::from_millis(100);
        while start.elapsed() < timeout {
            if !Self::is_alive(pid) {
                return Ok(());
            }
            std::thread::sleep(poll_interval);
        }

        if Self::is_alive(pid) {
            tracing::warn!("PID {} did not exit within timeout, sending SIGKILL", pid);
            Self::send_signal(pid, libc::SIGKILL)?;
            std::thread::sleep(std::time::Duration::from_millis(500));
        }

        Ok(())
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        // Remove before the handle closes so no window exists where a stale
        // file sits unlocked on disk.
        let _ = fs::remove_file(&self.path);
    }
}
