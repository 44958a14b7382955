//! # API Route Modules
//!
//! - `images`: originals and named-size variants, with conditional
//!   delivery and fallback to the original when generation fails.

pub mod images;
