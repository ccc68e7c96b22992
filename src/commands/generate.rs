//! `generate` and `prompt`: one-shot SQL generation and prompt preview.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use futures::StreamExt;

use super::signal::{until_shutdown, ShutdownSignal};
use super::{load_schema, EXAMPLE_QUESTION};
use crate::config::ServeConfig;
use crate::prompt::render_prompt;
use crate::supervisor::Supervisor;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Natural-language question to answer with SQL
    #[arg(default_value = EXAMPLE_QUESTION)]
    pub question: String,

    /// File containing the schema (CREATE TABLE statements); defaults to the
    /// built-in sales schema
    #[arg(long, value_name = "PATH")]
    pub metadata_file: Option<PathBuf>,

    /// Print tokens as they are generated
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args, Debug)]
pub struct PromptArgs {
    /// Natural-language question to render into the prompt
    #[arg(default_value = EXAMPLE_QUESTION)]
    pub question: String,

    /// File containing the schema; defaults to the built-in sales schema
    #[arg(long, value_name = "PATH")]
    pub metadata_file: Option<PathBuf>,
}

/// Launch the server, answer one question, and shut down.
pub async fn execute(args: GenerateArgs, config: ServeConfig) -> anyhow::Result<()> {
    let schema = load_schema(args.metadata_file.as_deref())?;

    let mut supervisor = Supervisor::new(config)?;
    let mut signal = ShutdownSignal::new().context("failed to install signal handlers")?;

    let work = async {
        supervisor
            .launch()
            .await
            .context("inference server failed to start")?;
        run(&supervisor, &args.question, &schema, args.stream).await
    };
    let result = until_shutdown(work, &mut signal)
        .await
        .unwrap_or_else(|| Err(anyhow::anyhow!("interrupted before generation finished")));

    supervisor.shutdown().await;
    result
}

async fn run(
    supervisor: &Supervisor,
    question: &str,
    schema: &str,
    stream: bool,
) -> anyhow::Result<()> {
    if !stream {
        let sql = supervisor
            .generate(question, schema)
            .await
            .context("generation failed")?;
        println!("{sql}");
        return Ok(());
    }

    let fragments = supervisor
        .generate_stream(question, schema)
        .await
        .context("generation failed")?;
    futures::pin_mut!(fragments);

    let mut stdout = std::io::stdout();
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment.context("generation stream failed")?;
        write!(stdout, "{fragment}")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

/// Print the rendered prompt without launching anything.
pub fn execute_prompt(args: PromptArgs) -> anyhow::Result<()> {
    let schema = load_schema(args.metadata_file.as_deref())?;
    print!("{}", render_prompt(&args.question, &schema));
    Ok(())
}
