// Output bundle assembly: asset materialization and reference rewriting

pub mod materialize;
pub mod rewrite;

pub use materialize::{MaterializeReport, materialize, prepare_bundle};
pub use rewrite::rewrite_references;
