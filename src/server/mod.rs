//! Inference server process supervision
//!
//! Owns the lifetime of the inference server subprocess: spawn with output
//! redirected to append-mode log files, wait for readiness, terminate
//! gracefully. [`ServerGuard`] ties termination to scope exit so the server
//! is stopped on every path out of a benchmark run, including panics.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{MedirError, Result};

/// Lifecycle state carried by a [`ServerHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Process spawned, readiness not yet confirmed
    Starting,
    /// Process settled and accepting requests
    Running,
    /// Process terminated
    Stopped,
}

/// Configuration for spawning and settling the server process
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Executable to launch
    pub command: String,
    /// Arguments passed to the executable
    pub args: Vec<String>,
    /// Directory receiving `stdout.log` and `stderr.log`
    pub log_dir: PathBuf,
    /// Fixed wait after spawn when no readiness probe is installed
    pub settle: Duration,
    /// Interval between readiness probe attempts
    pub poll_interval: Duration,
    /// Maximum time to wait for the readiness probe to succeed
    pub ready_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "ollama".to_string(),
            args: vec!["serve".to_string()],
            log_dir: PathBuf::from("logs"),
            settle: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create the default `ollama serve` configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the executable and its arguments
    #[must_use]
    pub fn with_command(mut self, command: &str, args: &[&str]) -> Self {
        self.command = command.to_string();
        self.args = args.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Set the log directory
    #[must_use]
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Set the fixed post-spawn settle interval
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the readiness poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the readiness deadline
    #[must_use]
    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }
}

/// Handle to a running server process
///
/// At most one live handle exists per benchmark run. Stopping consumes the
/// handle, so a double stop is rejected at compile time.
#[derive(Debug)]
pub struct ServerHandle {
    child: Child,
    pid: u32,
    state: ServerState,
}

impl ServerHandle {
    /// Operating-system process id of the server
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state
    }
}

/// Spawns, settles, and terminates the inference server process
///
/// No respawn logic: a failed start propagates to the caller.
pub struct ServerSupervisor {
    config: ServerConfig,
    probe: Option<Box<dyn Fn() -> bool + Send>>,
}

impl ServerSupervisor {
    /// Create a supervisor with the given configuration and no probe
    ///
    /// Without a probe, `start` falls back to the fixed settle interval.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            probe: None,
        }
    }

    /// Install a readiness probe polled after spawn
    ///
    /// The probe replaces the fixed settle sleep: `start` returns as soon as
    /// the probe reports ready, or fails once `ready_timeout` elapses.
    #[must_use]
    pub fn with_readiness_probe(mut self, probe: impl Fn() -> bool + Send + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Launch the server process and block until it is ready
    ///
    /// Creates the log directory if absent and redirects the child's stdout
    /// and stderr to append-mode log files inside it.
    ///
    /// # Errors
    /// `ServerError` if the log files or the process cannot be created;
    /// `ServerNotReady` if a probe is installed and the deadline elapses
    /// (the spawned process is terminated before returning).
    pub fn start(&self) -> Result<ServerHandle> {
        std::fs::create_dir_all(&self.config.log_dir).map_err(|e| {
            MedirError::ServerError(format!(
                "Failed to create log directory '{}': {e}",
                self.config.log_dir.display()
            ))
        })?;

        let stdout_log = self.open_log("stdout.log")?;
        let stderr_log = self.open_log("stderr.log")?;

        let child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log))
            .spawn()
            .map_err(|e| {
                MedirError::ServerError(format!(
                    "Failed to spawn '{}': {e}",
                    self.config.command
                ))
            })?;

        let pid = child.id();
        let mut handle = ServerHandle {
            child,
            pid,
            state: ServerState::Starting,
        };

        match &self.probe {
            Some(probe) => self.await_ready(&mut handle, probe.as_ref())?,
            None => std::thread::sleep(self.config.settle),
        }

        handle.state = ServerState::Running;
        Ok(handle)
    }

    /// Gracefully terminate the server and block until it has exited
    ///
    /// Consumes the handle; termination happens at most once per handle.
    ///
    /// # Errors
    /// `ServerError` if the signal cannot be delivered or the exit wait
    /// fails.
    pub fn stop(&self, handle: ServerHandle) -> Result<()> {
        let ServerHandle { mut child, pid, .. } = handle;

        send_terminate(&mut child, pid).map_err(|e| {
            MedirError::ServerError(format!("Failed to signal server (pid {pid}): {e}"))
        })?;

        child.wait().map_err(|e| {
            MedirError::ServerError(format!("Failed to wait for server exit (pid {pid}): {e}"))
        })?;
        Ok(())
    }

    fn open_log(&self, name: &str) -> Result<std::fs::File> {
        let path = self.config.log_dir.join(name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                MedirError::ServerError(format!(
                    "Failed to open log file '{}': {e}",
                    path.display()
                ))
            })
    }

    fn await_ready(&self, handle: &mut ServerHandle, probe: &(dyn Fn() -> bool + Send)) -> Result<()> {
        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            if probe() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                // Reap the unready process so a failed start leaks nothing
                let _ = send_terminate(&mut handle.child, handle.pid);
                let _ = handle.child.wait();
                return Err(MedirError::ServerNotReady(
                    self.config.ready_timeout.as_secs(),
                ));
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }
}

/// Scope guard that stops the server on every exit path
///
/// Obtained from a started handle; `release` stops the server and surfaces
/// any failure, while the drop handler covers early returns and panics with
/// a best-effort stop.
pub struct ServerGuard<'a> {
    supervisor: &'a ServerSupervisor,
    handle: Option<ServerHandle>,
}

impl<'a> ServerGuard<'a> {
    /// Tie a started handle to the current scope
    #[must_use]
    pub fn new(supervisor: &'a ServerSupervisor, handle: ServerHandle) -> Self {
        Self {
            supervisor,
            handle: Some(handle),
        }
    }

    /// Lifecycle state of the guarded server
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.handle
            .as_ref()
            .map_or(ServerState::Stopped, ServerHandle::state)
    }

    /// Process id of the guarded server, if it is still held
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(ServerHandle::pid)
    }

    /// Stop the server now, surfacing any stop failure
    ///
    /// Idempotent: a second call (or the drop handler) finds nothing left
    /// to stop.
    ///
    /// # Errors
    /// Propagates the supervisor's stop failure.
    pub fn release(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.supervisor.stop(handle),
            None => Ok(()),
        }
    }
}

impl Drop for ServerGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.supervisor.stop(handle) {
                eprintln!("[server] Warning: failed to stop server during cleanup: {e}");
            }
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child, pid: u32) -> std::io::Result<()> {
    // SAFETY: the pid belongs to a child we spawned and have not yet reaped,
    // so it cannot refer to a recycled process.
    let rc = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        child.kill()
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, _pid: u32) -> std::io::Result<()> {
    child.kill()
}
