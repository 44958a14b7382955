//! # Image Routes
//!
//! - `GET /originals/{*id}`        : the uploaded file, unchanged
//! - `GET /variants/{size}/{*id}`  : the original resized to a named size
//!
//! `size` is one of `thumb`, `small`, `medium`, `original`. Anything else
//! is 404 before the filesystem is touched. `original` bypasses the variant
//! cache. When a variant cannot be produced the original is served in its
//! place with a revalidating `Cache-Control`, so clients pick up the real
//! variant once it exists.

use std::path::PathBuf;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::header::IF_NONE_MATCH;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use shelf_core::NamedSize;

use crate::delivery::{self, CachePolicy, Delivery};
use crate::error::AppError;
use crate::middleware::metrics::VariantServed;
use crate::state::AppState;

/// Assemble the image router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/originals/{*id}", get(get_original))
        .route("/variants/{size}/{*id}", get(get_variant))
}

fn if_none_match(headers: &HeaderMap) -> Option<&str> {
    headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok())
}

/// Resolve `id` to an original that exists as a regular file.
async fn existing_original(state: &AppState, id: &str) -> Result<PathBuf, AppError> {
    let path = state
        .originals
        .resolve(id)
        .ok_or_else(|| AppError::not_found(format!("no image {id:?}")))?;
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        Ok(_) => Err(AppError::not_found(format!("no image {id:?}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::not_found(format!("no image {id:?}")))
        }
        Err(e) => Err(AppError::internal(format!("stat {}: {e}", path.display()))),
    }
}

/// GET /originals/{*id}
async fn get_original(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Delivery, AppError> {
    let original = existing_original(&state, &id).await?;
    delivery::serve(&original, if_none_match(&headers), CachePolicy::Immutable).await
}

/// GET /variants/{size}/{*id}
async fn get_variant(
    State(state): State<AppState>,
    Path((size, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Delivery, AppError> {
    let size: NamedSize = size.parse()?;
    let original = existing_original(&state, &id).await?;
    let validator = if_none_match(&headers);

    let Some(width) = size.width() else {
        return delivery::serve(&original, validator, CachePolicy::Immutable).await;
    };

    let started = Instant::now();
    match state.variants.get_or_create(&original, width).await {
        Ok(outcome) => {
            state.metrics.record_variant(if outcome.is_hit() {
                VariantServed::Hit
            } else {
                VariantServed::Generated
            });
            delivery::serve(outcome.path(), validator, CachePolicy::Immutable).await
        }
        Err(err) => {
            state.metrics.record_variant(VariantServed::Fallback);
            tracing::warn!(
                image = %id,
                size = %size,
                error = %err,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "variant unavailable, serving original"
            );
            delivery::serve(&original, validator, CachePolicy::Revalidate).await
        }
    }
}
