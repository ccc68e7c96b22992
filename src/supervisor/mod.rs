//! Supervisor: ties the launcher process and the inference client together.
//!
//! Launches the server, waits until it is reachable, serves `generate` /
//! `generate_stream` calls against it, and terminates it on shutdown.

pub mod errors;
pub mod service;
pub mod state;

// Re-exports for convenience
pub use errors::SupervisorError;
pub use service::Supervisor;
pub use state::SupervisorState;
