//! # Conditional File Delivery
//!
//! Serves one file from disk with validation headers. Given a path, an
//! optional `If-None-Match` value, and a [`CachePolicy`], [`serve`] either
//! answers 304 with no body or streams the file with:
//!
//! | Header           | Value                                   |
//! |------------------|-----------------------------------------|
//! | `ETag`           | [`EntityTag`] of the file               |
//! | `Cache-Control`  | from the [`CachePolicy`]                |
//! | `Vary`           | `Accept-Encoding`                       |
//! | `Content-Type`   | guessed from the extension              |
//! | `Content-Length` | file size                               |
//!
//! The body is read incrementally; a file is never buffered whole.

use std::io::ErrorKind;
use std::path::Path;

use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, VARY};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::body::AsyncReadBody;
use shelf_core::EntityTag;

use crate::error::AppError;

/// `Cache-Control` for content whose URL never names different bytes.
pub const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// `Cache-Control` for content clients must revalidate before reuse.
pub const REVALIDATE: &str = "no-cache";

/// How long clients may reuse a response without asking again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Cache for a year without revalidation.
    Immutable,
    /// Store, but revalidate with the ETag on every use.
    Revalidate,
}

impl CachePolicy {
    pub fn header_value(self) -> HeaderValue {
        match self {
            Self::Immutable => HeaderValue::from_static(IMMUTABLE),
            Self::Revalidate => HeaderValue::from_static(REVALIDATE),
        }
    }
}

/// Outcome of [`serve`], ready to become a response.
#[derive(Debug)]
pub enum Delivery {
    /// The client's validator matched.
    NotModified { etag: EntityTag, policy: CachePolicy },
    /// The full file.
    File {
        etag: EntityTag,
        policy: CachePolicy,
        len: u64,
        content_type: HeaderValue,
        file: tokio::fs::File,
    },
}

impl Delivery {
    pub fn etag(&self) -> &EntityTag {
        match self {
            Self::NotModified { etag, .. } | Self::File { etag, .. } => etag,
        }
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified { .. })
    }
}

/// Open `path` and decide between 304 and a full response.
///
/// The tag is computed from the opened handle, so it describes the same
/// file the body is streamed from. A missing path or a directory is
/// [`AppError::NotFound`].
pub async fn serve(
    path: &Path,
    if_none_match: Option<&str>,
    policy: CachePolicy,
) -> Result<Delivery, AppError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::not_found("file not found"));
        }
        Err(e) => return Err(AppError::internal(format!("open {}: {e}", path.display()))),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| AppError::internal(format!("stat {}: {e}", path.display())))?;
    if !metadata.is_file() {
        return Err(AppError::not_found("file not found"));
    }

    let etag = EntityTag::from_metadata(&metadata)?;
    if if_none_match.is_some_and(|candidate| etag.matches(candidate)) {
        return Ok(Delivery::NotModified { etag, policy });
    }

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok(Delivery::File {
        etag,
        policy,
        len: metadata.len(),
        content_type,
        file,
    })
}

fn validation_headers(etag: &EntityTag, policy: CachePolicy) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(etag.as_str()) {
        headers.insert(ETAG, value);
    }
    headers.insert(CACHE_CONTROL, policy.header_value());
    headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
    headers
}

impl IntoResponse for Delivery {
    fn into_response(self) -> Response {
        match self {
            Self::NotModified { etag, policy } => {
                (StatusCode::NOT_MODIFIED, validation_headers(&etag, policy)).into_response()
            }
            Self::File {
                etag,
                policy,
                len,
                content_type,
                file,
            } => {
                let mut headers = validation_headers(&etag, policy);
                headers.insert(CONTENT_TYPE, content_type);
                headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
                (StatusCode::OK, headers, AsyncReadBody::new(file)).into_response()
            }
        }
    }
}
