//! # shelf-api: HTTP Delivery for the Image Shelf
//!
//! Serves uploaded originals and their resized variants straight from disk.
//! Variants are generated on first request by `shelf-variants` and served
//! from the cache directory afterwards.
//!
//! ## API Surface
//!
//! | Route                      | Module             | Purpose                  |
//! |----------------------------|--------------------|--------------------------|
//! | `/originals/{*id}`         | [`routes::images`] | Original file            |
//! | `/variants/{size}/{*id}`   | [`routes::images`] | Named-size variant       |
//! | `/health/liveness`         | this module        | Process is up            |
//! | `/health/readiness`        | this module        | Storage root is readable |
//! | `/metrics`                 | this module        | Prometheus scrape        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};

use crate::error::AppError;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` sit outside the request-metrics middleware
/// so scrapes do not count themselves.
pub fn app(state: AppState) -> Router {
    let mut images = routes::images::router();

    if state.metrics_enabled {
        images = images
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(state.metrics.clone()));
    }

    let images = images
        .layer(middleware::tracing_layer::layer())
        .with_state(state.clone());

    let mut probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    if state.metrics_enabled {
        probes = probes
            .route("/metrics", get(prometheus_metrics))
            .layer(Extension(state.metrics.clone()));
    }

    let probes = probes.with_state(state);

    Router::new()
        .merge(probes)
        .merge(images)
        .fallback(unknown_route)
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(Extension(metrics): Extension<ApiMetrics>) -> impl IntoResponse {
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 "ready" while originals can be read, else 503.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if !state.originals.is_available() {
        return (StatusCode::SERVICE_UNAVAILABLE, "storage root unavailable").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

async fn unknown_route() -> AppError {
    AppError::not_found("no such route")
}
