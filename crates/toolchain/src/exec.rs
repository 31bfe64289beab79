//! External command execution.
//!
//! A small builder over `tokio::process::Command` that captures output,
//! enforces a timeout and turns failures into the caller's error variant.
//!
//! ```ignore
//! Cmd::new("npm")
//!     .args(["run", "build"])
//!     .cwd(&checkout)
//!     .timeout(Duration::from_secs(900))
//!     .run(Error::Build)
//!     .await?;
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use vite_ssg_core::{Error, Result};

/// Lines of stderr kept in error messages
const ERROR_TAIL_LINES: usize = 20;

/// Command builder for external process execution.
#[derive(Debug, Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    stdin_data: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl Cmd {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    pub fn env<K: AsRef<str>, V: AsRef<str>>(mut self, key: K, value: V) -> Self {
        self.envs
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Pipe this data to the process's stdin.
    pub fn stdin<D: AsRef<[u8]>>(mut self, data: D) -> Self {
        self.stdin_data = Some(data.as_ref().to_vec());
        self
    }

    /// Kill the process and fail if it runs longer than this.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Human-readable command line for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the underlying command without running it.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().cloned())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run to completion and return its output.
    ///
    /// Spawn failures, timeouts and non-zero exits are all reported through
    /// `stage_error`, so each collaborator fails with its own error kind.
    pub async fn run<F>(self, stage_error: F) -> Result<Output>
    where
        F: Fn(String) -> Error,
    {
        let line = self.display();
        debug!(command = %line, cwd = ?self.cwd, "running");

        let mut cmd = self.command();
        cmd.stdin(if self.stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| stage_error(format!("Failed to spawn `{}`: {}", line, e)))?;

        if let Some(data) = self.stdin_data
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin
                .write_all(&data)
                .await
                .map_err(|e| stage_error(format!("Failed to write stdin to `{}`: {}", line, e)))?;
            // close stdin so the process sees EOF
            drop(stdin);
        }

        let wait = child.wait_with_output();
        let output = match self.timeout {
            // dropping the future drops the child, which kills it
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                stage_error(format!("`{}` timed out after {}s", line, limit.as_secs()))
            })?,
            None => wait.await,
        }
        .map_err(|e| stage_error(format!("Failed to wait for `{}`: {}", line, e)))?;

        log_output(&line, &output);

        if !output.status.success() {
            return Err(stage_error(format_failure(&line, &output)));
        }

        Ok(output)
    }
}

fn log_output(line: &str, output: &Output) {
    for text in [&output.stdout, &output.stderr] {
        for l in String::from_utf8_lossy(text).lines() {
            let l = l.trim_end();
            if !l.is_empty() {
                debug!(command = %line, "{}", l);
            }
        }
    }
}

fn format_failure(line: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail = tail_lines(&stderr, ERROR_TAIL_LINES);
    if tail.is_empty() {
        format!("`{}` exited with {}", line, output.status)
    } else {
        format!("`{}` exited with {}\n{}", line, output.status, tail)
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
