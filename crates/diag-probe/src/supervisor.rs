//! Daemon process supervision
//!
//! A [`DaemonProcess`] is tied to a cancellation token. A watcher task owns
//! the child: it either observes the child exiting on its own or, once the
//! token is cancelled, kills and reaps it. Dropping the handle cancels the
//! token, so the daemon never outlives the run that started it.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use diag_protocol::TransportKind;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{CommandError, SpawnError};

/// What to launch
#[derive(Debug, Clone)]
pub struct DaemonCommand {
    pub executable: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(OsString, OsString)>,
}

impl DaemonCommand {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// `butler --json --dbpath <db> daemon [--transport <kind>]`
    pub fn butlerd(
        executable: impl Into<PathBuf>,
        database: &Path,
        transport: Option<TransportKind>,
    ) -> Self {
        let mut command = Self::new(executable)
            .arg("--json")
            .arg("--dbpath")
            .arg(database)
            .arg("daemon");
        if let Some(kind) = transport {
            command = command.arg("--transport").arg(kind.to_string());
        }
        command
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Launch the process under a child of `parent`.
    ///
    /// Returns as soon as the process image is running; readiness is
    /// signalled separately through its output.
    pub fn start(&self, parent: &CancellationToken) -> Result<DaemonProcess, SpawnError> {
        let mut child = self.to_command().spawn().map_err(|source| SpawnError {
            executable: self.executable.clone(),
            source,
        })?;

        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let token = parent.child_token();
        let (exit_tx, exit_rx) = watch::channel(None);

        tracing::debug!(
            executable = %self.executable.display(),
            pid = ?pid,
            "Spawned daemon"
        );
        tokio::spawn(watch_child(child, token.clone(), exit_tx));

        Ok(DaemonProcess {
            executable: self.executable.clone(),
            pid,
            stdout,
            stderr,
            exit_rx,
            _guard: token.clone().drop_guard(),
            token,
        })
    }
}

impl fmt::Display for DaemonCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How the daemon process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonExit {
    /// Exited on its own
    Exited(ExitStatus),
    /// Killed because its token was cancelled
    Killed,
    /// Waiting on the process failed
    Unknown(String),
}

impl fmt::Display for DaemonExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonExit::Exited(status) => write!(f, "exited ({})", status),
            DaemonExit::Killed => write!(f, "was killed"),
            DaemonExit::Unknown(reason) => write!(f, "was lost ({})", reason),
        }
    }
}

/// Handle to a running daemon
pub struct DaemonProcess {
    executable: PathBuf,
    pid: Option<u32>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    exit_rx: watch::Receiver<Option<DaemonExit>>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl DaemonProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Token whose cancellation kills the daemon
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Exit state, if the process has already ended
    pub fn try_exit(&self) -> Option<DaemonExit> {
        self.exit_rx.borrow().clone()
    }

    /// Wait until the process has ended and been reaped
    pub async fn wait_exit(&self) -> DaemonExit {
        let mut rx = self.exit_rx.clone();
        let result = rx.wait_for(Option::is_some).await;
        match result {
            Ok(exit) => exit
                .clone()
                .unwrap_or_else(|| DaemonExit::Unknown("no exit status".to_string())),
            Err(_) => DaemonExit::Unknown("watcher stopped".to_string()),
        }
    }

    /// Kill the daemon and wait up to `grace` for it to be reaped
    pub async fn shutdown(self, grace: Duration) -> Option<DaemonExit> {
        self.token.cancel();
        match tokio::time::timeout(grace, self.wait_exit()).await {
            Ok(exit) => {
                tracing::debug!(pid = ?self.pid, "Daemon {}", exit);
                Some(exit)
            }
            Err(_) => {
                tracing::warn!(pid = ?self.pid, "Daemon still running after {:?}", grace);
                None
            }
        }
    }
}

async fn watch_child(
    mut child: Child,
    token: CancellationToken,
    exit_tx: watch::Sender<Option<DaemonExit>>,
) {
    let exit = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => DaemonExit::Exited(status),
            Err(e) => DaemonExit::Unknown(e.to_string()),
        },
        _ = token.cancelled() => {
            // kill() also reaps, so no zombie is left behind
            match child.kill().await {
                Ok(()) => DaemonExit::Killed,
                Err(e) => {
                    tracing::warn!("Failed to kill daemon: {}", e);
                    match child.try_wait() {
                        Ok(Some(status)) => DaemonExit::Exited(status),
                        _ => DaemonExit::Unknown(e.to_string()),
                    }
                }
            }
        }
    };

    exit_tx.send_replace(Some(exit));
}

/// Run a short-lived command to completion and collect its output.
///
/// The command is killed if it does not finish within `limit`.
pub async fn capture_output(command: &DaemonCommand, limit: Duration) -> Result<Output, CommandError> {
    let child = command.to_command().spawn().map_err(|source| SpawnError {
        executable: command.executable.clone(),
        source,
    })?;

    // Dropping the future on timeout drops the child, which kills it
    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(CommandError::Timeout(limit)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use diag_core::process::is_process_alive;

    fn shell(script: &str) -> DaemonCommand {
        DaemonCommand::new("/bin/sh").arg("-c").arg(script)
    }

    #[test]
    fn test_butlerd_arguments() {
        let command = DaemonCommand::butlerd("butler", Path::new("/db/butler.db"), None);
        assert_eq!(command.to_string(), "butler --json --dbpath /db/butler.db daemon");

        let command =
            DaemonCommand::butlerd("butler", Path::new("/db/butler.db"), Some(TransportKind::Http));
        assert_eq!(
            command.to_string(),
            "butler --json --dbpath /db/butler.db daemon --transport http"
        );
    }

    #[tokio::test]
    async fn test_spawn_error_names_executable() {
        let err = DaemonCommand::new("/definitely/not/here")
            .start(&CancellationToken::new())
            .err()
            .expect("spawn should fail");
        assert_eq!(err.executable, PathBuf::from("/definitely/not/here"));
    }

    #[tokio::test]
    async fn test_exit_is_observed() {
        let daemon = shell("exit 3").start(&CancellationToken::new()).unwrap();
        match daemon.wait_exit().await {
            DaemonExit::Exited(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected exit: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parent_cancel_kills_and_reaps() {
        let parent = CancellationToken::new();
        let daemon = shell("sleep 30").start(&parent).unwrap();
        let pid = daemon.pid().unwrap();
        assert!(is_process_alive(pid));

        parent.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(5), daemon.wait_exit())
            .await
            .unwrap();
        assert_eq!(exit, DaemonExit::Killed);
        assert!(!is_process_alive(pid));
    }

    #[tokio::test]
    async fn test_drop_kills_daemon() {
        let daemon = shell("sleep 30").start(&CancellationToken::new()).unwrap();
        let pid = daemon.pid().unwrap();
        drop(daemon);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while is_process_alive(pid) {
            assert!(tokio::time::Instant::now() < deadline, "daemon survived drop");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_stdout_is_piped() {
        use tokio::io::AsyncReadExt;

        let mut daemon = shell("echo hello").start(&CancellationToken::new()).unwrap();
        let mut stdout = daemon.take_stdout().unwrap();
        let mut text = String::new();
        stdout.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "hello\n");
        assert!(daemon.take_stdout().is_none());
    }

    #[tokio::test]
    async fn test_capture_output_and_timeout() {
        let output = capture_output(&shell("echo 15.21.0"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "15.21.0");

        let err = capture_output(&shell("sleep 30"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout(_)));
    }
}
