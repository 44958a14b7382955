//! # Variant Error Types
//!
//! Everything that can go wrong while producing a variant. None of these are
//! retried here; the HTTP layer turns them into a fallback to the original.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from variant generation.
#[derive(Error, Debug)]
pub enum VariantError {
    /// Width of zero was requested.
    #[error("invalid target width: {0}")]
    InvalidWidth(u32),

    /// The original could not be read or is not a supported image.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The variant's extension names no known image format.
    #[error("no image format for {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// The resized image could not be encoded.
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A cache directory or file could not be created or written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generation task panicked or was cancelled by runtime shutdown.
    #[error("variant generation task failed: {0}")]
    Task(String),
}

impl VariantError {
    /// Whether the failure lies with the original rather than the cache.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
