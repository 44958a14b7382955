//! # Error Types
//!
//! Errors raised by the core types. Kept small: the core does almost no I/O,
//! so most failures are input validation.

use thiserror::Error;

/// Top-level error type for `shelf-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Size token is not one of the named sizes.
    #[error("unknown size: {0:?}")]
    UnknownSize(String),

    /// IO error while reading file metadata.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
