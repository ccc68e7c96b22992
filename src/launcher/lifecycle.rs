//! Inference-server process lifecycle.
//!
//! Spawns the launcher, reports whether it is still running, and tears it
//! down. The handle is the only owner of the child process; if it is dropped
//! while the child is still running, the child is killed.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use super::errors::LauncherError;

// ─── LaunchCommand ───────────────────────────────────────────────────────────

/// A fully resolved command line for the inference server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra env vars on top of the inherited environment.
    pub env: HashMap<String, String>,
}

impl LaunchCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
        }
    }
}

/// Whether the launched process is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// `code` is `None` when the process was terminated by a signal.
    Exited { code: Option<i32> },
}

// ─── LauncherHandle ──────────────────────────────────────────────────────────

/// The running inference-server process.
#[derive(Debug)]
pub struct LauncherHandle {
    program: String,
    child: Child,
    /// Set once a termination signal has been sent (or attempted).
    terminated: bool,
}

impl LauncherHandle {
    /// Spawn the process. Stdout and stderr are inherited so the server's own
    /// logs stay visible.
    pub fn start(command: &LaunchCommand) -> Result<Self, LauncherError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|e| LauncherError::SpawnFailed {
            command: command.program.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            program = %command.program,
            args = ?command.args,
            pid = child.id(),
            "launched inference server"
        );

        Ok(Self {
            program: command.program.clone(),
            child,
            terminated: false,
        })
    }

    /// OS process id, or `None` once the child has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Non-blocking exit check.
    pub fn status(&mut self) -> Result<ProcessStatus, LauncherError> {
        match self.child.try_wait() {
            Ok(None) => Ok(ProcessStatus::Running),
            Ok(Some(status)) => Ok(ProcessStatus::Exited {
                code: status.code(),
            }),
            Err(e) => Err(LauncherError::ProcessStatus {
                reason: e.to_string(),
            }),
        }
    }

    /// Send SIGTERM to the process. Best-effort; later calls are no-ops.
    pub fn stop(&mut self) {
        if self.terminated {
            tracing::debug!(program = %self.program, "launcher already stopped");
            return;
        }
        self.terminated = true;

        let Some(pid) = self.child.id() else {
            tracing::debug!(program = %self.program, "launcher already exited");
            return;
        };

        match send_terminate(&mut self.child, pid) {
            Ok(()) => tracing::info!(pid, "sent termination signal to launcher"),
            Err(e) => tracing::warn!(pid, error = %e, "failed to signal launcher"),
        }
    }

    /// Stop, wait up to `grace` for the process to exit, then force-kill.
    pub async fn shutdown(&mut self, grace: Duration) {
        self.stop();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(status = %status, "launcher exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed waiting for launcher, killing");
                let _ = self.child.kill().await;
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "launcher ignored termination signal, killing"
                );
                let _ = self.child.kill().await;
            }
        }
    }
}

impl Drop for LauncherHandle {
    fn drop(&mut self) {
        // A stopped launcher may have ignored SIGTERM; kill anything not yet reaped.
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.start_kill();
        }
    }
}

#[cfg(unix)]
fn send_terminate(_child: &mut Child, pid: u32) -> Result<(), String> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|e| e.to_string())?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, _pid: u32) -> Result<(), String> {
    child.start_kill().map_err(|e| e.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
