// External collaborators of a pipeline run: checkout, build, preview,
// headless rendering and formatting. Each sits behind a trait so runs can
// be driven by fakes in tests.

pub mod chrome;
pub mod exec;
pub mod git;
pub mod npm;
pub mod port;
pub mod prettier;
pub mod probe;
pub mod vite;

use std::path::Path;

use async_trait::async_trait;
use vite_ssg_core::Result;

pub use chrome::ChromeRenderer;
pub use git::GitCheckout;
pub use npm::NpmRunner;
pub use port::{PortAllocator, PortLease};
pub use prettier::{Passthrough, PrettierFormatter};
pub use vite::VitePreview;

/// Fetches a repository into a local directory
#[async_trait]
pub trait Checkout: Send + Sync {
    /// Fails with `Error::Checkout` on an unreachable or invalid reference.
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Installs dependencies and builds a checkout
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn install(&self, cwd: &Path) -> Result<()>;
    async fn build(&self, cwd: &Path) -> Result<()>;
}

/// Starts a static preview server for a build tree
#[async_trait]
pub trait PreviewServer: Send + Sync {
    /// Serve `served_dir` on exactly `port`, or fail with `Error::ServerStart`.
    async fn start(&self, served_dir: &Path, port: u16) -> Result<Box<dyn PreviewProcess>>;
}

/// A running preview server
#[async_trait]
pub trait PreviewProcess: Send {
    /// Exit description if the server has already terminated.
    fn exited(&mut self) -> Option<String>;

    /// Terminate the server and wait for it to exit.
    async fn stop(self: Box<Self>) -> Result<()>;
}

/// Captures the settled markup of a page
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `url`, wait for rendering and network activity to quiesce and
    /// return the serialized document.
    async fn render(&self, url: &str) -> Result<String>;
}

/// Canonical, purely cosmetic HTML formatting
#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format(&self, html: &str) -> Result<String>;
}
