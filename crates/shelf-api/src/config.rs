//! # Server Configuration
//!
//! Command-line flags with environment fallbacks, parsed by `clap`.
//!
//! | Flag               | Env                     | Default           |
//! |--------------------|-------------------------|-------------------|
//! | `--port`           | `PORT`                  | `8080`            |
//! | `--storage-root`   | `IMAGE_STORAGE`         | `./static/images` |
//! | `--cache-root`     | `IMAGE_CACHE`           | `./static/cache`  |
//! | `--log-format`     | `LOG_FORMAT`            | `text`            |
//! | `--metrics-enabled`| `SHELF_METRICS_ENABLED` | `true`            |

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use thiserror::Error;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Configuration for the image server.
#[derive(Debug, Clone, Parser)]
#[command(name = "shelf-api", version, about = "Serve originals and on-demand resized image variants")]
pub struct ServerConfig {
    /// TCP port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding original uploads.
    #[arg(long, env = "IMAGE_STORAGE", default_value = "./static/images")]
    pub storage_root: PathBuf,

    /// Directory variants are written under. Created on first generation.
    #[arg(long, env = "IMAGE_CACHE", default_value = "./static/cache")]
    pub cache_root: PathBuf,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Expose `/metrics` and record request metrics.
    #[arg(long, env = "SHELF_METRICS_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub metrics_enabled: bool,
}

/// Errors raised while preparing the filesystem layout at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot create storage root {path}: {source}")]
    StorageRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot determine working directory: {0}")]
    CurrentDir(std::io::Error),
}

impl ServerConfig {
    /// Make both roots absolute.
    ///
    /// The storage root is created if missing and canonicalized, so derived
    /// variant paths mirror its layout exactly. The cache root is only made
    /// absolute; it is created lazily by the first variant write.
    pub fn prepare(mut self) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(&self.storage_root).map_err(|source| ConfigError::StorageRoot {
            path: self.storage_root.clone(),
            source,
        })?;
        self.storage_root =
            self.storage_root
                .canonicalize()
                .map_err(|source| ConfigError::StorageRoot {
                    path: self.storage_root.clone(),
                    source,
                })?;
        self.cache_root = absolute(&self.cache_root)?;
        Ok(self)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    Ok(cwd.join(path))
}
