use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::debug;
use vite_ssg_core::config::PathsConfig;
use vite_ssg_core::{Error, Result, RunRequest};

/// Directory inside the checkout that Vite builds into
pub const BUILD_DIR: &str = "dist";

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Everything one pipeline run owns.
///
/// Paths are keyed by a run id (repo name, start time, process-wide sequence)
/// rather than the repository name alone, so concurrent runs of the same
/// repository never share a checkout or bundle.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub id: String,
    pub repo_url: String,
    pub checkout_dir: PathBuf,
    pub out_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(request: &RunRequest, paths: &PathsConfig) -> Result<Self> {
        let started_at = Utc::now();
        let id = format!(
            "{}-{}-{}",
            request.repo_name(),
            started_at.format("%Y%m%d%H%M%S%3f"),
            RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let work_root = std::path::absolute(&paths.work_root)?;
        let out_root = std::path::absolute(&paths.out_root)?;

        Ok(Self {
            checkout_dir: work_root.join(&id),
            out_dir: out_root.join(&id),
            repo_url: request.repo_url.clone(),
            started_at,
            id,
        })
    }

    /// Build tree produced by the build step
    pub fn build_dir(&self) -> PathBuf {
        self.checkout_dir.join(BUILD_DIR)
    }

    /// Remove anything left at this run's paths and create the parent roots.
    ///
    /// The checkout directory itself is left absent for the clone to create.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.checkout_dir, &self.out_dir] {
            remove_stale(dir)?;
            if let Some(parent) = dir.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::create_dir_all(&self.out_dir)?;
        Ok(())
    }

    /// Delete the checkout once the bundle no longer needs it
    pub fn remove_checkout(&self) -> Result<()> {
        remove_stale(&self.checkout_dir)
    }

    pub fn elapsed_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

fn remove_stale(dir: &Path) -> Result<()> {
    if dir.exists() {
        debug!(dir = %dir.display(), "removing stale directory");
        fs::remove_dir_all(dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to remove {}: {}", dir.display(), e),
            ))
        })?;
    }
    Ok(())
}
