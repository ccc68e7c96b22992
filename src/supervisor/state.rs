//! Supervisor lifecycle state.

use std::fmt;

/// Where the supervisor is in its lifecycle.
///
/// `Uninitialized -> Launching -> Ready -> Terminated`, or
/// `Launching -> Failed` when the launcher dies before accepting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Uninitialized,
    Launching,
    Ready,
    /// `exit_code` is `None` for spawn failures and signal deaths.
    Failed { exit_code: Option<i32> },
    Terminated,
}

impl SupervisorState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SupervisorState::Ready)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Uninitialized => f.write_str("uninitialized"),
            SupervisorState::Launching => f.write_str("launching"),
            SupervisorState::Ready => f.write_str("ready"),
            SupervisorState::Failed {
                exit_code: Some(code),
            } => write!(f, "failed (exit code {code})"),
            SupervisorState::Failed { exit_code: None } => f.write_str("failed"),
            SupervisorState::Terminated => f.write_str("terminated"),
        }
    }
}
