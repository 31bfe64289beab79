use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::{path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use vite_ssg_core::{Error, RunRequest, SsgRequest};
use vite_ssg_pipeline::Pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SsgResponse {
    success: bool,
    out_path: String,
}

/// Start the generation API.
///
/// Config comes from `vite-ssg.toml` (when given), then `PORT`, then the
/// `--port` flag. Runs until Ctrl+C.
pub async fn run(config: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let mut config = super::load(config)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let pipeline = Pipeline::from_config(&config);
    let app = router(Arc::new(pipeline));

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(
        addr = %addr,
        work_root = %config.paths.work_root.display(),
        out_root = %config.paths.out_root.display(),
        "vite-ssg API listening"
    );
    println!("🚀 Listening on http://{}", addr);
    println!("   POST /api/ssg {{\"repoUrl\": \"...\", \"routes\": [\"/\"]}}");
    println!("   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(super::ctrl_c())
        .await
        .context("Server error")?;

    Ok(())
}

fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/ssg", post(generate))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<SsgRequest>, JsonRejection>,
) -> Result<Json<SsgResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: rejection.body_text(),
    })?;
    let request = RunRequest::try_from(body)?;

    info!(repo = %request.repo_url, routes = request.routes.len(), "generation requested");
    // detached from the request, so a client hanging up cannot cancel a
    // run halfway through a stage
    let pipeline = Arc::clone(&state.pipeline);
    let outcome = tokio::spawn(async move { pipeline.run(request).await })
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Generation task failed: {}", e),
        })??;

    Ok(Json(SsgResponse {
        success: true,
        out_path: outcome.out_dir.display().to_string(),
    }))
}

/// `{ "error": message }` with a status derived from the failure
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            warn!(error = %err, "rejected request");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %err, "generation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
