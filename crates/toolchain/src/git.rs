use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use vite_ssg_core::{Error, Result};

use crate::Checkout;
use crate::exec::Cmd;

/// Clones with the `git` command line client
#[derive(Debug, Clone)]
pub struct GitCheckout {
    program: String,
    timeout: Duration,
}

impl GitCheckout {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, url: &str, dest: &Path) -> Cmd {
        Cmd::new(&self.program)
            .args(["clone", "--depth", "1", "--quiet", "--"])
            .arg(url)
            .arg(dest)
            // never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.timeout)
    }
}

#[async_trait]
impl Checkout for GitCheckout {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        info!(url, dest = %dest.display(), "cloning repository");
        self.command(url, dest).run(Error::Checkout).await?;
        Ok(())
    }
}
