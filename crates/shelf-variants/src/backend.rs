//! # Image Backend
//!
//! The [`ImageBackend`] trait separates *what* the cache does (decide hit or
//! miss, serialize generation) from *how* pixels are produced. Production
//! uses [`ImageCrateBackend`]; tests substitute doubles that count calls.
//!
//! The original's format is detected from its content, so an upload whose
//! extension disagrees with its bytes still decodes.
//!
//! ## Output Encoding
//!
//! The variant keeps its original's extension, so the output format is the
//! one that extension names. JPEG is written at the fixed [`JPEG_QUALITY`]
//! with any alpha channel dropped; other formats use their default
//! encoder.

use std::io::{Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use shelf_core::scaled_height;

use crate::error::VariantError;

/// JPEG quality for every JPEG variant.
pub const JPEG_QUALITY: u8 = 85;

/// Produces a resized copy of an image on disk.
///
/// Implementations run on the blocking pool and may take as long as decoding
/// and encoding need. `dest`'s parent directory exists when this is called.
/// On success `dest` must name a complete file; on failure it must not exist.
pub trait ImageBackend: Send + Sync + 'static {
    /// Resize `source` to `width` pixels wide, preserving aspect ratio, and
    /// write the result to `dest`.
    fn resize(&self, source: &Path, width: u32, dest: &Path) -> Result<(), VariantError>;
}

/// [`ImageBackend`] built on the `image` crate with Lanczos3 resampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateBackend;

impl ImageBackend for ImageCrateBackend {
    fn resize(&self, source: &Path, width: u32, dest: &Path) -> Result<(), VariantError> {
        let format = ImageFormat::from_path(dest).map_err(|_| VariantError::UnsupportedFormat {
            path: dest.to_path_buf(),
        })?;

        let img = decode(source).map_err(|source_err| VariantError::Decode {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        let height = scaled_height(img.width(), img.height(), width);
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);

        let mut encoded = Cursor::new(Vec::new());
        encode(&resized, format, &mut encoded).map_err(|source| VariantError::Encode {
            path: dest.to_path_buf(),
            source,
        })?;

        persist_atomically(dest, encoded.get_ref())
    }
}

/// Decode with the format sniffed from the file's leading bytes, falling
/// back to the extension only when the bytes are not recognized.
fn decode(source: &Path) -> Result<DynamicImage, image::ImageError> {
    ImageReader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)?
        .decode()
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    out: &mut Cursor<Vec<u8>>,
) -> Result<(), image::ImageError> {
    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(out, JPEG_QUALITY))
        }
        other => img.write_to(out, other),
    }
}

/// Write `bytes` to a temporary file beside `dest`, then rename it over
/// `dest`. The temporary file is removed if anything fails.
fn persist_atomically(dest: &Path, bytes: &[u8]) -> Result<(), VariantError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".variant-")
        .tempfile_in(dir)
        .map_err(|e| VariantError::write(dir, e))?;

    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| VariantError::write(tmp.path(), e))?;

    tmp.persist(dest)
        .map_err(|e| VariantError::write(dest, e.error))?;
    Ok(())
}
