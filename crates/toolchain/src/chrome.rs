use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, info};
use vite_ssg_core::{Error, Result};

use crate::Renderer;
use crate::exec::Cmd;

/// Virtual time granted to the page before the DOM is dumped. Chrome
/// fast-forwards timers and waits for pending network fetches within it.
const DEFAULT_SETTLE_BUDGET_MS: u64 = 10_000;

/// Renders pages with headless Chrome / Chromium via `--dump-dom`.
///
/// Every call uses a throwaway profile directory, so cookies, storage and
/// caches never carry over between routes.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    program: String,
    timeout: Duration,
    settle_budget_ms: u64,
}

impl ChromeRenderer {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            settle_budget_ms: DEFAULT_SETTLE_BUDGET_MS,
        }
    }

    pub fn with_settle_budget(mut self, budget: Duration) -> Self {
        self.settle_budget_ms = budget.as_millis() as u64;
        self
    }

    fn command(&self, url: &str, profile: &std::path::Path) -> Cmd {
        Cmd::new(&self.program)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--no-first-run",
                "--no-default-browser-check",
                "--disable-dev-shm-usage",
                "--hide-scrollbars",
            ])
            .arg(format!("--user-data-dir={}", profile.display()))
            .arg(format!("--virtual-time-budget={}", self.settle_budget_ms))
            .arg("--dump-dom")
            .arg(url)
            .timeout(self.timeout)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let profile = TempDir::new().map_err(|e| Error::Render {
            route: url.to_string(),
            cause: format!("Failed to create browser profile: {}", e),
        })?;

        info!(url, "rendering");
        let output = self
            .command(url, profile.path())
            .run(|cause| Error::Render {
                route: url.to_string(),
                cause,
            })
            .await?;

        let dom = String::from_utf8_lossy(&output.stdout).into_owned();
        if dom.trim().is_empty() {
            return Err(Error::Render {
                route: url.to_string(),
                cause: "browser returned an empty document".to_string(),
            });
        }

        debug!(url, bytes = dom.len(), "rendered");
        Ok(with_doctype(dom))
    }
}

/// `--dump-dom` serializes the document element only
fn with_doctype(dom: String) -> String {
    if dom.trim_start().to_ascii_lowercase().starts_with("<!doctype") {
        dom
    } else {
        format!("<!DOCTYPE html>\n{}", dom)
    }
}
