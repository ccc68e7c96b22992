//! Command-line subcommands.
//!
//! Each subcommand lives in its own module with a clap `Args` struct and an
//! `execute` entrypoint called from `main`.

use std::path::Path;

use anyhow::Context;

use crate::prompt::METADATA_DEFAULT;

pub mod generate;
pub mod serve;
pub mod signal;
pub mod weights;

/// Question used when `generate` or `prompt` is run without one.
pub const EXAMPLE_QUESTION: &str = "Do we get more revenue from customers in New York compared to customers in San Francisco? Give me the total revenue for each city, and the difference between the two.";

/// Read schema text from `path`, or fall back to the built-in sales schema.
pub(crate) fn load_schema(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema metadata from {}", path.display())),
        None => Ok(METADATA_DEFAULT.to_string()),
    }
}
