//! Launcher: owns the Text Generation Inference server process.
//!
//! This module handles:
//! - Spawning `text-generation-launcher` with the configured flags
//! - Polling the listen port until the server accepts connections
//! - Failing fast when the process exits before becoming reachable
//! - Terminating the process on teardown
//! - The ahead-of-time weight download step

pub mod download;
pub mod errors;
pub mod lifecycle;
pub mod readiness;

// Re-exports for convenience
pub use download::download_weights;
pub use errors::LauncherError;
pub use lifecycle::{LaunchCommand, LauncherHandle, ProcessStatus};
pub use readiness::{await_ready, ReadinessPolicy, ReadinessState};
