use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use vite_ssg_bundler::{MaterializeReport, materialize, prepare_bundle};
use vite_ssg_core::config::{FormatterKind, PathsConfig};
use vite_ssg_core::{Config, Error, Result, Route, RunRequest};
use vite_ssg_toolchain::probe::wait_until_ready;
use vite_ssg_toolchain::{
    BuildRunner, Checkout, ChromeRenderer, Formatter, GitCheckout, NpmRunner, Passthrough,
    PortAllocator, PrettierFormatter, PreviewProcess, PreviewServer, Renderer, VitePreview,
};

use crate::context::RunContext;
use crate::render::{RenderedRoute, RouteRenderer};

/// Stage of a pipeline run, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Acquiring,
    Building,
    Serving,
    Rendering,
    Materializing,
    Finalized,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Acquiring => "acquiring",
            RunState::Building => "building",
            RunState::Serving => "serving",
            RunState::Rendering => "rendering",
            RunState::Materializing => "materializing",
            RunState::Finalized => "finalized",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The external tools a run drives
#[derive(Clone)]
pub struct Collaborators {
    pub checkout: Arc<dyn Checkout>,
    pub builder: Arc<dyn BuildRunner>,
    pub preview: Arc<dyn PreviewServer>,
    pub renderer: Arc<dyn Renderer>,
    pub formatter: Arc<dyn Formatter>,
}

impl Collaborators {
    /// git, npm, `vite preview`, headless Chromium and prettier as configured
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        let timeouts = &config.timeouts;

        let formatter: Arc<dyn Formatter> = match tools.formatter {
            FormatterKind::Prettier => {
                Arc::new(PrettierFormatter::new(&tools.npx, timeouts.render))
            }
            FormatterKind::None => Arc::new(Passthrough),
        };

        Self {
            checkout: Arc::new(GitCheckout::new(&tools.git, timeouts.clone)),
            builder: Arc::new(NpmRunner::new(&tools.npm, timeouts.install, timeouts.build)),
            preview: Arc::new(VitePreview::new(&tools.npx, timeouts.stop)),
            renderer: Arc::new(
                ChromeRenderer::new(&tools.chrome, timeouts.render)
                    .with_settle_budget(config.preview.settle_budget),
            ),
            formatter,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub out_dir: PathBuf,
    /// Bundle-relative document paths, in route order
    pub documents: Vec<PathBuf>,
    pub assets: MaterializeReport,
}

/// Sequences one static-site generation run:
/// acquire → build → serve → render each route → materialize → tear down.
///
/// A `Pipeline` is shared by concurrent runs; each run gets its own
/// `RunContext` and preview port.
#[derive(Clone)]
pub struct Pipeline {
    collaborators: Collaborators,
    ports: PortAllocator,
    paths: PathsConfig,
    ready_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        collaborators: Collaborators,
        ports: PortAllocator,
        paths: PathsConfig,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            collaborators,
            ports,
            paths,
            ready_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Collaborators::from_config(config),
            PortAllocator::new(config.preview.port_start..=config.preview.port_end),
            config.paths.clone(),
            config.preview.ready_timeout,
        )
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    /// Run the whole pipeline for one request.
    ///
    /// Any stage failure aborts the run. The preview server, once started,
    /// is stopped on every path; a partially written bundle is left as is.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        self.run_until(request, std::future::pending()).await
    }

    /// Like `run`, but aborts with `Error::Cancelled` once `shutdown`
    /// completes. A running preview server is still stopped gracefully
    /// before this returns.
    pub async fn run_until<F>(&self, request: RunRequest, shutdown: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        let ctx = RunContext::new(&request, &self.paths)?;
        transition(&ctx, RunState::Idle);

        let shutdown = std::pin::pin!(shutdown);
        match self.execute(&ctx, &request.routes, shutdown).await {
            Ok(outcome) => {
                transition(&ctx, RunState::Finalized);
                info!(
                    run = %ctx.id,
                    out = %outcome.out_dir.display(),
                    documents = outcome.documents.len(),
                    elapsed_secs = ctx.elapsed_secs(),
                    "run complete"
                );
                if let Err(e) = ctx.remove_checkout() {
                    warn!(run = %ctx.id, error = %e, "failed to remove checkout");
                }
                Ok(outcome)
            }
            Err(e) => {
                transition(&ctx, RunState::Failed);
                error!(run = %ctx.id, error = %e, elapsed_secs = ctx.elapsed_secs(), "run failed");
                Err(e)
            }
        }
    }

    async fn execute<F>(
        &self,
        ctx: &RunContext,
        routes: &[Route],
        mut shutdown: Pin<&mut F>,
    ) -> Result<RunOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        // dropping the build future kills the running git/npm child
        let build_dir = tokio::select! {
            biased;
            _ = &mut shutdown => return Err(Error::Cancelled("build".to_string())),
            built = self.acquire_and_build(ctx) => built?,
        };

        transition(ctx, RunState::Serving);
        prepare_bundle(&ctx.out_dir)?;
        let lease = self.ports.allocate()?;
        let origin = format!("http://127.0.0.1:{}", lease.port());
        let process = self
            .collaborators
            .preview
            .start(&build_dir, lease.port())
            .await?;
        let mut preview = PreviewGuard::new(process);

        let result = tokio::select! {
            biased;
            _ = &mut shutdown => Err(Error::Cancelled("rendering".to_string())),
            served = self.serve(ctx, &origin, routes, &mut preview) => served,
        };

        // stop before the lease goes back to the pool
        if let Err(e) = preview.stop().await {
            warn!(run = %ctx.id, error = %e, "failed to stop preview server");
        }
        drop(lease);

        result
    }

    async fn acquire_and_build(&self, ctx: &RunContext) -> Result<PathBuf> {
        transition(ctx, RunState::Acquiring);
        ctx.prepare()?;
        self.collaborators
            .checkout
            .clone_repo(&ctx.repo_url, &ctx.checkout_dir)
            .await?;

        transition(ctx, RunState::Building);
        self.collaborators.builder.install(&ctx.checkout_dir).await?;
        self.collaborators.builder.build(&ctx.checkout_dir).await?;
        let build_dir = ctx.build_dir();
        if !build_dir.is_dir() {
            return Err(Error::Build(format!(
                "Build did not produce {}",
                build_dir.display()
            )));
        }
        Ok(build_dir)
    }

    /// Everything that needs the preview server alive
    async fn serve(
        &self,
        ctx: &RunContext,
        origin: &str,
        routes: &[Route],
        preview: &mut PreviewGuard,
    ) -> Result<RunOutcome> {
        let process = preview
            .process_mut()
            .ok_or_else(|| Error::ServerStart("preview server already stopped".to_string()))?;
        wait_until_ready(origin, self.ready_timeout, process).await?;
        info!(run = %ctx.id, origin, "preview server ready");

        transition(ctx, RunState::Rendering);
        let renderer = RouteRenderer::new(
            Arc::clone(&self.collaborators.renderer),
            Arc::clone(&self.collaborators.formatter),
        );
        let mut documents = Vec::with_capacity(routes.len());
        for route in routes {
            let rendered = renderer.render_route(origin, route).await?;
            write_document(&ctx.out_dir, &rendered)?;
            info!(run = %ctx.id, %route, document = %rendered.document_name.display(), "wrote document");
            documents.push(rendered.document_name);
        }

        transition(ctx, RunState::Materializing);
        let source = ctx.build_dir();
        let dest = ctx.out_dir.clone();
        let assets = tokio::task::spawn_blocking(move || materialize(&source, &dest))
            .await
            .map_err(|e| Error::Materialization(format!("materialize task failed: {}", e)))??;

        Ok(RunOutcome {
            run_id: ctx.id.clone(),
            out_dir: ctx.out_dir.clone(),
            documents,
            assets,
        })
    }
}

fn transition(ctx: &RunContext, state: RunState) {
    info!(run = %ctx.id, %state, "run state");
}

/// Write a rendered route into the bundle, creating parent directories for
/// nested routes.
fn write_document(out_dir: &Path, rendered: &RenderedRoute) -> Result<()> {
    let path = out_dir.join(&rendered.document_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Materialization(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    fs::write(&path, &rendered.html).map_err(|e| {
        Error::Materialization(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Owns the running preview server for the Serving..Materializing window.
///
/// `stop` terminates it at most once. Dropping an un-stopped guard (the run
/// future itself was dropped) drops the process handle, which kills the
/// server's process group.
struct PreviewGuard {
    process: Option<Box<dyn PreviewProcess>>,
}

impl PreviewGuard {
    fn new(process: Box<dyn PreviewProcess>) -> Self {
        Self {
            process: Some(process),
        }
    }

    fn process_mut(&mut self) -> Option<&mut (dyn PreviewProcess + 'static)> {
        self.process.as_deref_mut()
    }

    async fn stop(&mut self) -> Result<()> {
        match self.process.take() {
            Some(process) => process.stop().await,
            None => Ok(()),
        }
    }
}

impl Drop for PreviewGuard {
    fn drop(&mut self) {
        if self.process.is_some() {
            warn!("preview server dropped without stop, killing");
        }
    }
}
