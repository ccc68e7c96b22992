//! Weight download step.
//!
//! Runs `text-generation-server download-weights` ahead of serving so the
//! model cache is warm when the launcher starts. Gated models need the Hugging
//! Face token, which is forwarded to the child under the name TGI reads.

use tokio::process::Command;

use super::errors::LauncherError;
use crate::config::{ServeConfig, HF_TOKEN_ENV};

/// Arguments for the download subcommand.
pub fn download_args(config: &ServeConfig) -> Vec<String> {
    vec![
        "download-weights".to_string(),
        config.launcher.model_id.clone(),
        "--revision".to_string(),
        config.launcher.revision.clone(),
    ]
}

/// Download (and convert to safetensors, if needed) the configured weights.
pub async fn download_weights(config: &ServeConfig) -> Result<(), LauncherError> {
    let env = config.token_env();
    if !env.contains_key(HF_TOKEN_ENV) {
        tracing::warn!(
            token_env = %config.download.token_env,
            "no Hugging Face token set; gated models will fail to download"
        );
    }

    let args = download_args(config);
    tracing::info!(
        command = %config.download.command,
        model_id = %config.launcher.model_id,
        revision = %config.launcher.revision,
        "downloading model weights"
    );

    let status = Command::new(&config.download.command)
        .args(&args)
        .envs(&env)
        .status()
        .await
        .map_err(|e| LauncherError::SpawnFailed {
            command: config.download.command.clone(),
            reason: e.to_string(),
        })?;

    if !status.success() {
        return Err(LauncherError::DownloadFailed {
            model_id: config.launcher.model_id.clone(),
            exit_code: status.code(),
        });
    }

    tracing::info!(model_id = %config.launcher.model_id, "model weights ready");
    Ok(())
}
