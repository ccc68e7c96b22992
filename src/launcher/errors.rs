//! Launcher error types.

use thiserror::Error;

/// Errors that can occur while running the inference-server process.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// The executable could not be started.
    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    /// The process exited before it ever accepted a connection.
    #[error("launcher exited unexpectedly with {}", describe_exit(.exit_code))]
    LaunchFailure { exit_code: Option<i32> },

    /// The optional overall readiness limit elapsed.
    #[error("server on {host}:{port} not reachable after {waited_secs}s")]
    ReadinessTimeout {
        host: String,
        port: u16,
        waited_secs: u64,
    },

    /// Querying the child's exit status failed.
    #[error("failed to query process status: {reason}")]
    ProcessStatus { reason: String },

    /// `download-weights` finished with a non-zero status.
    #[error("weight download for '{model_id}' failed with {}", describe_exit(.exit_code))]
    DownloadFailed {
        model_id: String,
        exit_code: Option<i32>,
    },
}

impl LauncherError {
    /// Exit code carried by a [`LauncherError::LaunchFailure`].
    pub fn launch_exit_code(&self) -> Option<Option<i32>> {
        match self {
            LauncherError::LaunchFailure { exit_code } => Some(*exit_code),
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}
