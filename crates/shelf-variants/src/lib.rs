//! # shelf-variants: On-Demand Image Variant Cache
//!
//! Given an original image and a target width, [`VariantCache`] returns the
//! path of a resized copy, generating and persisting it on first request and
//! reusing it afterwards.
//!
//! ## Cache Model
//!
//! - The variant's path is derived from the key by
//!   [`shelf_core::VariantPathDeriver`]; existence of a regular file at that
//!   path is the whole cache index. There is no TTL and no eviction.
//! - Generation on a miss is single-flight per derived path: concurrent
//!   requests for the same key wait for one generation and then observe the
//!   finished file. Different keys generate in parallel.
//! - Files are written to a temporary sibling and renamed into place, so a
//!   variant path never names a partially written file.
//! - Generation runs in its own task. Dropping the requesting future does
//!   not abort it; the result still lands in the cache.
//!
//! ## Known Limitation
//!
//! Variants are never invalidated. A replaced original keeps its old
//! variants, which are served as hits until the cache root is cleared
//! externally. A deleted original leaves its variant files on disk.
//!
//! ## Crate Policy
//!
//! - Failures are returned as [`VariantError`]. Deciding to fall back to the
//!   original is the caller's job.

pub mod backend;
pub mod cache;
pub mod error;

pub use backend::{ImageBackend, ImageCrateBackend, JPEG_QUALITY};
pub use cache::{VariantCache, VariantOutcome};
pub use error::VariantError;
