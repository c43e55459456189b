//! HTTP surface: the compute endpoint, static hosting of cached rasters and a
//! health check.
//!
//! Every pipeline failure is turned into a `{"detail": ...}` JSON body with a
//! status derived from its error category.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::core::engine::StatsEngine;
use crate::core::{AreaOfInterest, RasterSource, StatisticResult, StatsPipeline};
use crate::utils::error::{ErrorCategory, StatsError};

// ============================================================================
// State
// ============================================================================

pub struct AppState<P: StatsPipeline> {
    pub engine: Arc<StatsEngine<P>>,
    pub default_cog_url: Arc<str>,
}

impl<P: StatsPipeline> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            default_cog_url: Arc::clone(&self.default_cog_url),
        }
    }
}

impl<P: StatsPipeline> AppState<P> {
    pub fn new(engine: StatsEngine<P>, default_cog_url: impl Into<Arc<str>>) -> Self {
        Self {
            engine: Arc::new(engine),
            default_cog_url: default_cog_url.into(),
        }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ComputeQuery {
    pub cog_url: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct ComputeRequest {
    pub geom: geojson::Feature,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug)]
pub struct ApiError(pub StatsError);

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        Self(err)
    }
}

fn rejected(message: String) -> ApiError {
    ApiError(StatsError::ValidationError { message })
}

pub fn status_for(err: &StatsError) -> StatusCode {
    match err.category() {
        ErrorCategory::Upstream => StatusCode::BAD_GATEWAY,
        ErrorCategory::Geometry | ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Raster
        | ErrorCategory::Compute
        | ErrorCategory::Configuration
        | ErrorCategory::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        tracing::error!(
            "Request failed: {} (Category: {:?}, Status: {})",
            self.0,
            self.0.category(),
            status
        );
        tracing::debug!("Recovery suggestion: {}", self.0.recovery_suggestion());

        let body = ErrorResponse {
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn compute_statistics<P: StatsPipeline + 'static>(
    State(state): State<AppState<P>>,
    query: Result<Query<ComputeQuery>, QueryRejection>,
    request: Result<Json<ComputeRequest>, JsonRejection>,
) -> Result<Json<StatisticResult>, ApiError> {
    let Query(query) = query.map_err(|e| rejected(e.body_text()))?;
    let Json(request) = request.map_err(|e| rejected(e.body_text()))?;
    let cog_url = query
        .cog_url
        .as_deref()
        .unwrap_or(&state.default_cog_url);
    let source = RasterSource::parse(cog_url)?.with_refresh(query.refresh);
    let aoi = AreaOfInterest::new(request.geom);

    let result = state.engine.run(&source, aoi).await?;
    Ok(Json(result))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub fn router<P: StatsPipeline + 'static>(state: AppState<P>, static_dir: impl Into<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/compute/", post(compute_statistics::<P>))
        .route("/compute", post(compute_statistics::<P>))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(static_dir.into()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
