use std::time::Duration;

use async_trait::async_trait;
use vite_ssg_core::{Error, Result};

use crate::Formatter;
use crate::exec::Cmd;

/// Formats HTML with `prettier --parser html`, reading the document on stdin
#[derive(Debug, Clone)]
pub struct PrettierFormatter {
    npx: String,
    timeout: Duration,
}

impl PrettierFormatter {
    pub fn new(npx: impl Into<String>, timeout: Duration) -> Self {
        Self {
            npx: npx.into(),
            timeout,
        }
    }

    fn command(&self) -> Cmd {
        Cmd::new(&self.npx)
            .args(["--yes", "prettier", "--parser", "html"])
            .timeout(self.timeout)
    }
}

#[async_trait]
impl Formatter for PrettierFormatter {
    async fn format(&self, html: &str) -> Result<String> {
        let output = self.command().stdin(html).run(Error::Formatting).await?;
        String::from_utf8(output.stdout)
            .map_err(|e| Error::Formatting(format!("prettier produced invalid UTF-8: {}", e)))
    }
}

/// Leaves documents exactly as rendered
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Formatter for Passthrough {
    async fn format(&self, html: &str) -> Result<String> {
        Ok(html.to_string())
    }
}
