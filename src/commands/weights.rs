//! `download-weights`: fetch model weights ahead of the first launch.

use anyhow::Context;

use crate::config::ServeConfig;
use crate::launcher::download_weights;

pub async fn execute(config: &ServeConfig) -> anyhow::Result<()> {
    download_weights(config)
        .await
        .with_context(|| format!("failed to download weights for {}", config.launcher.model_id))?;
    println!("{}@{}", config.launcher.model_id, config.launcher.revision);
    Ok(())
}
