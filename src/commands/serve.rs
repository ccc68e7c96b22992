//! `serve`: keep the server up and answer questions read from stdin.
//!
//! One request per line, either plain question text (answered against the
//! built-in schema) or a JSON object `{"question": ..., "schema_metadata": ...}`.
//! Generated SQL is streamed to stdout, followed by a blank line.

use std::io::Write;

use anyhow::Context;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::signal::{until_shutdown, ShutdownSignal};
use crate::config::ServeConfig;
use crate::prompt::PromptRequest;
use crate::supervisor::Supervisor;

pub async fn execute(config: ServeConfig) -> anyhow::Result<()> {
    let mut supervisor = Supervisor::new(config)?;
    let mut signal = ShutdownSignal::new().context("failed to install signal handlers")?;

    let outcome = until_shutdown(run(&mut supervisor), &mut signal)
        .await
        .unwrap_or(Ok(()));

    supervisor.shutdown().await;
    outcome
}

async fn run(supervisor: &mut Supervisor) -> anyhow::Result<()> {
    supervisor.launch().await?;
    if !supervisor.client().health_check().await.unwrap_or(false) {
        tracing::warn!("server accepts connections but /health is not reporting ready yet");
    }
    eprintln!("ready, reading questions from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let request = match parse_request(&line) {
            Some(Ok(request)) => request,
            Some(Err(e)) => {
                eprintln!("error: invalid request: {e}");
                continue;
            }
            None => continue,
        };

        if let Err(e) = answer(supervisor, &request).await {
            tracing::warn!(error = %e, "generation failed");
            eprintln!("error: {e}");
        }
    }

    tracing::info!("stdin closed");
    Ok(())
}

async fn answer(supervisor: &Supervisor, request: &PromptRequest) -> anyhow::Result<()> {
    let fragments = supervisor
        .generate_stream(&request.question, &request.schema_metadata)
        .await?;
    futures::pin_mut!(fragments);

    let mut stdout = std::io::stdout();
    while let Some(fragment) = fragments.next().await {
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    writeln!(stdout)?;
    Ok(())
}

/// Parse one input line. Blank lines yield `None`.
fn parse_request(line: &str) -> Option<Result<PromptRequest, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') {
        return Some(serde_json::from_str(line));
    }
    Some(Ok(PromptRequest::with_default_schema(line)))
}
