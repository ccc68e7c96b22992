//! sqlcoder-tgi: run SQLCoder behind a local Text Generation Inference server.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sqlcoder_tgi::commands::{self, generate::GenerateArgs, generate::PromptArgs};
use sqlcoder_tgi::config::{resolve_serve_config, CONFIG_PATH_ENV};

/// Supervise a TGI launcher serving SQLCoder and turn questions into SQL.
///
/// Examples:
///   sqlcoder-tgi download-weights
///   sqlcoder-tgi generate "How many salespeople are there?"
///   sqlcoder-tgi generate --stream --metadata-file schema.sql "Top customers by revenue?"
///   echo "How many salespeople are there?" | sqlcoder-tgi serve
#[derive(Parser, Debug)]
#[command(name = "sqlcoder-tgi", version, propagate_version = true)]
struct Cli {
    /// Configuration file path (defaults to config/serve.yaml found upward
    /// from the working directory)
    #[arg(long, global = true, value_name = "PATH", env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the server, answer one question, and shut down
    Generate(GenerateArgs),

    /// Launch the server and answer questions read from stdin until EOF or Ctrl+C
    Serve,

    /// Download the configured model weights
    #[command(name = "download-weights")]
    DownloadWeights,

    /// Print the rendered prompt without launching anything
    Prompt(PromptArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config =
        resolve_serve_config(cli.config.as_deref()).context("failed to load configuration")?;
    sqlcoder_tgi::init_tracing(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, config).await,
        Commands::Serve => commands::serve::execute(config).await,
        Commands::DownloadWeights => commands::weights::execute(&config).await,
        Commands::Prompt(args) => commands::generate::execute_prompt(args),
    }
}
