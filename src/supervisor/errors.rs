//! Supervisor error types.

use thiserror::Error;

use super::SupervisorState;
use crate::inference::InferenceError;
use crate::launcher::LauncherError;

/// Errors surfaced by [`super::Supervisor`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Generation was requested before the server became ready.
    #[error("inference server is not ready (state: {state})")]
    NotReady { state: SupervisorState },

    /// `launch` was called a second time.
    #[error("launcher already started (state: {state})")]
    AlreadyStarted { state: SupervisorState },

    #[error(transparent)]
    Launcher(#[from] LauncherError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}
