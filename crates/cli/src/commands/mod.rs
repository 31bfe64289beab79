pub mod run;
pub mod serve;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info};
use vite_ssg_core::{Config, load_config};

/// Load `vite-ssg.toml` (or defaults) and apply environment overrides
pub fn load(path: Option<PathBuf>) -> Result<Config> {
    let mut config = match &path {
        Some(p) => load_config(Some(p))
            .with_context(|| format!("Failed to load config from {}", p.display()))?,
        None => load_config(None::<PathBuf>)?,
    };
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;
    Ok(config)
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
