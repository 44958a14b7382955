//! # Original Storage
//!
//! Turns the opaque identifier in a request URL into a path under the
//! storage root. Resolution is lexical: it rejects identifiers that could
//! name anything outside the root, but does not touch the filesystem.
//! Handlers check existence asynchronously afterwards.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Resolves request identifiers to original image paths.
pub trait OriginalResolver: Send + Sync + fmt::Debug {
    /// Path of the original named by `id`, or `None` if `id` cannot name a
    /// file under this resolver's root. The file may not exist.
    fn resolve(&self, id: &str) -> Option<PathBuf>;

    /// Whether originals can currently be read at all.
    fn is_available(&self) -> bool;
}

/// [`OriginalResolver`] backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    /// Serve originals from `root`. Callers pass an absolute, canonical path
    /// so that derived variant paths mirror the storage layout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OriginalResolver for StorageRoot {
    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let mut components = relative.components().peekable();
        components.peek()?;
        if !components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn is_available(&self) -> bool {
        self.root.is_dir()
    }
}
