//! Inference client for the local Text Generation Inference server.
//!
//! This module handles all HTTP communication with the launched model:
//! - Blocking completions (`POST /generate`)
//! - Token streaming over SSE (`POST /generate_stream`)
//! - Health checks (`GET /health`)
//!
//! Requests are never retried here; every failure is surfaced to the caller.

pub mod client;
pub mod errors;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use client::TgiClient;
pub use errors::{InferenceError, ServerErrorKind};
pub use types::{FinishReason, GenerateParameters, GenerateResponse, StreamResponse, Token};
