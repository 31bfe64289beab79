// Pipeline orchestration: per-run context, route rendering and the run
// state machine.

pub mod context;
pub mod orchestrator;
pub mod render;

pub use context::RunContext;
pub use orchestrator::{Collaborators, Pipeline, RunOutcome, RunState};
pub use render::{RenderedRoute, RouteRenderer};
