//! # Application State
//!
//! Shared by every handler. Cheap to clone: each field is a handle to
//! shared data.

use std::path::Path;
use std::sync::Arc;

use shelf_core::VariantPathDeriver;
use shelf_variants::VariantCache;

use crate::config::ServerConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::storage::{OriginalResolver, StorageRoot};

#[derive(Debug, Clone)]
pub struct AppState {
    /// Resolves request identifiers to original paths.
    pub originals: Arc<dyn OriginalResolver>,
    /// Variant lookup and generation.
    pub variants: VariantCache,
    pub metrics: ApiMetrics,
    /// Whether `/metrics` and the request-metrics middleware are mounted.
    pub metrics_enabled: bool,
}

impl AppState {
    /// State serving originals from `storage_root` and writing variants
    /// under `cache_root`. Both should be absolute.
    pub fn new(storage_root: &Path, cache_root: &Path) -> Self {
        let deriver = VariantPathDeriver::new(storage_root, cache_root);
        Self::with_parts(
            Arc::new(StorageRoot::new(storage_root)),
            VariantCache::new(deriver),
        )
    }

    /// State from a prepared [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut state = Self::new(&config.storage_root, &config.cache_root);
        state.metrics_enabled = config.metrics_enabled;
        state
    }

    /// State from explicit collaborators.
    pub fn with_parts(originals: Arc<dyn OriginalResolver>, variants: VariantCache) -> Self {
        Self {
            originals,
            variants,
            metrics: ApiMetrics::new(),
            metrics_enabled: true,
        }
    }
}
