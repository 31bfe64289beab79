use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tracing::{debug, info, warn};
use vite_ssg_core::{Error, Result};

use crate::exec::Cmd;
use crate::{PreviewProcess, PreviewServer};

/// Default time a preview server gets to exit after SIGTERM before it is killed
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// `vite preview` on a fixed port
#[derive(Debug, Clone)]
pub struct VitePreview {
    npx: String,
    stop_grace: Duration,
}

impl VitePreview {
    pub fn new(npx: impl Into<String>, stop_grace: Duration) -> Self {
        Self {
            npx: npx.into(),
            stop_grace,
        }
    }

    /// `vite preview` must run from the project root to pick up its config;
    /// the build tree is passed relative to it.
    fn command(&self, served_dir: &Path, port: u16) -> Result<Cmd> {
        let (Some(project_dir), Some(out_dir)) = (served_dir.parent(), served_dir.file_name())
        else {
            return Err(Error::ServerStart(format!(
                "Build output has no parent project directory: {}",
                served_dir.display()
            )));
        };

        Ok(Cmd::new(&self.npx)
            .args(["vite", "preview", "--strictPort", "--host", "127.0.0.1"])
            .arg("--port")
            .arg(port.to_string())
            .arg("--outDir")
            .arg(out_dir)
            .cwd(project_dir))
    }
}

#[async_trait]
impl PreviewServer for VitePreview {
    async fn start(&self, served_dir: &Path, port: u16) -> Result<Box<dyn PreviewProcess>> {
        let cmd = self.command(served_dir, port)?;
        let line = cmd.display();

        let mut command = cmd.command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // own process group, so npx and the node process it spawns stop together
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| Error::ServerStart(format!("Failed to spawn `{}`: {}", line, e)))?;

        info!(port, pid = ?child.id(), served = %served_dir.display(), "preview server started");

        Ok(Box::new(ChildProcess::new(
            child,
            served_dir.to_path_buf(),
            self.stop_grace,
        )))
    }
}

/// A spawned preview server process, leading its own process group.
///
/// Dropping a handle that was never stopped kills the whole group, so
/// grandchildren (the `node` process behind `npx`) never outlive the run.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    served_dir: PathBuf,
    /// Process group id, which is the leader's pid
    pgid: Option<u32>,
    stop_grace: Duration,
    stopped: bool,
}

impl ChildProcess {
    /// Wrap a child spawned with `process_group(0)`.
    pub fn new(child: Child, served_dir: PathBuf, stop_grace: Duration) -> Self {
        let pgid = child.id();
        Self {
            child,
            served_dir,
            pgid,
            stop_grace,
            stopped: false,
        }
    }
}

#[async_trait]
impl PreviewProcess for ChildProcess {
    fn exited(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(format!("preview server exited with {}", status)),
            Ok(None) => None,
            Err(e) => Some(format!("preview server state unknown: {}", e)),
        }
    }

    async fn stop(mut self: Box<Self>) -> Result<()> {
        if let Ok(Some(status)) = self.child.try_wait() {
            // leftovers of the group are swept on drop
            debug!(%status, "preview server already exited");
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            signal_group(pgid, "TERM").await;
        }

        match tokio::time::timeout(self.stop_grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.stopped = true;
                info!(%status, served = %self.served_dir.display(), "preview server stopped");
                return Ok(());
            }
            Ok(Err(e)) => warn!(error = %e, "waiting for preview server failed"),
            Err(_) => warn!("preview server ignored SIGTERM, killing"),
        }

        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            signal_group(pgid, "KILL").await;
        }
        self.child.kill().await.map_err(|e| {
            Error::ServerStart(format!("Failed to kill preview server: {}", e))
        })?;
        self.stopped = true;
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            debug!(pgid, "killing preview process group on drop");
            kill_group_now(pgid);
        }
    }
}

fn group_kill_script(pgid: u32, signal: &str) -> String {
    format!("kill -{} -{}", signal, pgid)
}

/// Signal a whole process group led by `pgid`
#[cfg(unix)]
async fn signal_group(pgid: u32, signal: &str) {
    let result = Cmd::new("sh")
        .arg("-c")
        .arg(group_kill_script(pgid, signal))
        .timeout(Duration::from_secs(5))
        .run(Error::ServerStart)
        .await;
    if let Err(e) = result {
        warn!(pgid, signal, error = %e, "signalling preview process group failed");
    }
}

/// SIGKILL a process group without an async runtime; used from `Drop`
#[cfg(unix)]
fn kill_group_now(pgid: u32) {
    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(group_kill_script(pgid, "KILL"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        // a non-zero exit means the group is already empty
        Ok(status) => debug!(pgid, %status, "killed preview process group"),
        Err(e) => warn!(pgid, error = %e, "failed to kill preview process group"),
    }
}
