//! # Cache Validator
//!
//! An [`EntityTag`] is recomputed from a file's modification time and size
//! every time the file is served; nothing is stored. Encoding:
//!
//! ```text
//! "<hex mtime seconds>-<hex byte size>"      e.g. "65a1b2c3-1f40"
//! ```
//!
//! The quotes are part of the tag. Comparison against a client's
//! `If-None-Match` is exact string equality.
//!
//! ## Known Limitation
//!
//! A content change that preserves both mtime (to the second) and size
//! yields the same tag, and clients holding it will keep their stale copy.

use std::fmt;
use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CoreError;

/// Opaque validator derived from file metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag(String);

impl EntityTag {
    /// Build a tag from a Unix modification time (seconds) and a byte size.
    pub fn from_parts(mtime_unix: i64, size: u64) -> Self {
        let mtime = if mtime_unix < 0 {
            format!("-{:x}", mtime_unix.unsigned_abs())
        } else {
            format!("{mtime_unix:x}")
        };
        Self(format!("\"{mtime}-{size:x}\""))
    }

    /// Build a tag from file metadata.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, CoreError> {
        let modified = metadata.modified()?;
        Ok(Self::from_parts(unix_seconds(modified), metadata.len()))
    }

    /// Whether a client-supplied validator names this exact tag.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }

    /// The header value, quotes included.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whole seconds since the epoch, truncated toward negative infinity for
/// times before 1970 so they agree with `stat`'s view.
fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => {
            let d = before.duration();
            let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
            if d.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}
