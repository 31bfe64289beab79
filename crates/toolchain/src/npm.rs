use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use vite_ssg_core::{Error, Result};

use crate::BuildRunner;
use crate::exec::Cmd;

/// `npm install` followed by `npm run build`
#[derive(Debug, Clone)]
pub struct NpmRunner {
    program: String,
    install_timeout: Duration,
    build_timeout: Duration,
}

impl NpmRunner {
    pub fn new(program: impl Into<String>, install_timeout: Duration, build_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            install_timeout,
            build_timeout,
        }
    }
}

#[async_trait]
impl BuildRunner for NpmRunner {
    async fn install(&self, cwd: &Path) -> Result<()> {
        info!(cwd = %cwd.display(), "installing dependencies");
        Cmd::new(&self.program)
            .args(["install", "--no-audit", "--no-fund"])
            .cwd(cwd)
            .timeout(self.install_timeout)
            .run(Error::Build)
            .await?;
        Ok(())
    }

    async fn build(&self, cwd: &Path) -> Result<()> {
        info!(cwd = %cwd.display(), "building");
        Cmd::new(&self.program)
            .args(["run", "build"])
            .cwd(cwd)
            .timeout(self.build_timeout)
            .run(Error::Build)
            .await?;
        Ok(())
    }
}
