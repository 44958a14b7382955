//! # shelf-core: Foundational Types for the Image Shelf
//!
//! Leaf crate of the workspace. Everything here is pure or, in the case of
//! [`EntityTag::from_metadata`], reads nothing but already-fetched file
//! metadata. The variant cache (`shelf-variants`) and the HTTP service
//! (`shelf-api`) both build on these types.
//!
//! ## Contents
//!
//! - [`NamedSize`]: the caller-facing size tokens and their fixed widths.
//! - [`VariantKey`]: the (original path, width) identity of a variant.
//! - [`VariantPathDeriver`]: maps a key to its deterministic cache path.
//! - [`EntityTag`]: the metadata-derived validator used for conditional GET.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `shelf-*` crates.
//! - No `.unwrap()` outside tests.

pub mod error;
pub mod path;
pub mod size;
pub mod validator;

pub use error::CoreError;
pub use path::{scaled_height, VariantKey, VariantPathDeriver};
pub use size::NamedSize;
pub use validator::EntityTag;
