//! # Variant Path Derivation
//!
//! Maps a [`VariantKey`] to the file where its resized variant lives. The
//! mapping is a pure function of the key and the two configured roots:
//!
//! ```text
//! {storage_root}/2024/a.jpg  --(150)-->  {cache_root}/2024/a_150w.jpg
//! ```
//!
//! The original's directory, taken relative to the storage root, is
//! re-rooted under the cache root, so two uploads that share a filename in
//! different directories never share a variant file. Existence of that file
//! is the only cache-hit signal, which is why the layout must stay stable
//! across restarts.
//!
//! Only [`Component::Normal`] segments are carried over. A derived path
//! therefore always stays inside the cache root, even for originals outside
//! the storage root or paths containing `..`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Identity of a variant: which original, resized to which width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    /// Absolute path of the original image.
    pub original: PathBuf,
    /// Target width in pixels.
    pub width: u32,
}

impl VariantKey {
    /// Construct a key.
    pub fn new(original: impl Into<PathBuf>, width: u32) -> Self {
        Self {
            original: original.into(),
            width,
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}w", self.original.display(), self.width)
    }
}

/// Derives cache paths for variants.
///
/// Owns its roots explicitly so independent instances (one per test, say)
/// never share a cache tree.
#[derive(Debug, Clone)]
pub struct VariantPathDeriver {
    storage_root: PathBuf,
    cache_root: PathBuf,
}

impl VariantPathDeriver {
    /// Create a deriver for originals under `storage_root`, placing variants
    /// under `cache_root`.
    pub fn new(storage_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            cache_root: cache_root.into(),
        }
    }

    /// Root directory originals are expected under.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Root directory variants are written under.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Path of the variant of `original` at `width`.
    ///
    /// The filename is `{stem}_{width}w{.ext}`; an original without an
    /// extension yields `{stem}_{width}w`.
    pub fn derive(&self, original: &Path, width: u32) -> PathBuf {
        let mut name = OsString::from(original.file_stem().unwrap_or_default());
        name.push(format!("_{width}w"));
        if let Some(ext) = original.extension() {
            name.push(".");
            name.push(ext);
        }

        let parent = original.parent().unwrap_or_else(|| Path::new(""));
        let relative = parent.strip_prefix(&self.storage_root).unwrap_or(parent);

        self.cache_root.join(normal_components(relative)).join(name)
    }

    /// [`derive`](Self::derive) for a [`VariantKey`].
    pub fn derive_key(&self, key: &VariantKey) -> PathBuf {
        self.derive(&key.original, key.width)
    }
}

/// Keep only plain directory names: drops root, prefix, `.` and `..`.
fn normal_components(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Height that keeps the aspect ratio of an `orig_w`×`orig_h` image scaled
/// to `target_w` pixels wide. Rounds to the nearest pixel and never returns 0.
pub fn scaled_height(orig_w: u32, orig_h: u32, target_w: u32) -> u32 {
    if orig_w == 0 {
        return orig_h.max(1);
    }
    let (w, h, t) = (u64::from(orig_w), u64::from(orig_h), u64::from(target_w));
    let scaled = (h * t + w / 2) / w;
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn deriver() -> VariantPathDeriver {
        VariantPathDeriver::new("/srv/images", "/srv/cache")
    }

    #[test]
    fn mirrors_storage_layout() {
        let path = deriver().derive(Path::new("/srv/images/2024/a.jpg"), 150);
        assert_eq!(path, PathBuf::from("/srv/cache/2024/a_150w.jpg"));
    }

    #[test]
    fn file_at_storage_root_lands_at_cache_root() {
        let path = deriver().derive(Path::new("/srv/images/a.png"), 480);
        assert_eq!(path, PathBuf::from("/srv/cache/a_480w.png"));
    }

    #[test]
    fn relative_roots_work() {
        let d = VariantPathDeriver::new("images", "cache");
        assert_eq!(
            d.derive(Path::new("images/2024/a.jpg"), 150),
            PathBuf::from("cache/2024/a_150w.jpg")
        );
    }

    #[test]
    fn only_last_extension_is_split_off() {
        let path = deriver().derive(Path::new("/srv/images/x/photo.final.jpeg"), 800);
        assert_eq!(path, PathBuf::from("/srv/cache/x/photo.final_800w.jpeg"));
    }

    #[test]
    fn missing_extension_is_preserved_as_missing() {
        let path = deriver().derive(Path::new("/srv/images/raw/scan"), 150);
        assert_eq!(path, PathBuf::from("/srv/cache/raw/scan_150w"));
    }

    #[test]
    fn original_outside_storage_root_stays_inside_cache() {
        let path = deriver().derive(Path::new("/elsewhere/pics/b.jpg"), 150);
        assert_eq!(path, PathBuf::from("/srv/cache/elsewhere/pics/b_150w.jpg"));
    }

    #[test]
    fn parent_dir_segments_cannot_escape_cache_root() {
        let path = deriver().derive(Path::new("/srv/images/../../etc/c.jpg"), 150);
        assert!(path.starts_with("/srv/cache"));
        assert!(!path.components().any(|c| c == Component::ParentDir));
    }

    #[test]
    fn same_filename_in_different_directories_does_not_collide() {
        let d = deriver();
        let a = d.derive(Path::new("/srv/images/2024/a.jpg"), 150);
        let b = d.derive(Path::new("/srv/images/2025/a.jpg"), 150);
        assert_ne!(a, b);
    }

    #[test]
    fn widths_do_not_collide() {
        let d = deriver();
        let original = Path::new("/srv/images/a.jpg");
        assert_ne!(d.derive(original, 150), d.derive(original, 480));
    }

    #[test]
    fn derive_key_matches_derive() {
        let d = deriver();
        let key = VariantKey::new("/srv/images/2024/a.jpg", 150);
        assert_eq!(d.derive_key(&key), d.derive(&key.original, key.width));
        assert_eq!(key.to_string(), "/srv/images/2024/a.jpg@150w");
    }

    #[test]
    fn scaled_height_preserves_aspect_ratio() {
        assert_eq!(scaled_height(1600, 1200, 800), 600);
        assert_eq!(scaled_height(1000, 333, 150), 50); // 49.95 rounds up
        assert_eq!(scaled_height(300, 100, 150), 50);
    }

    #[test]
    fn scaled_height_is_never_zero() {
        assert_eq!(scaled_height(10_000, 1, 150), 1);
        assert_eq!(scaled_height(0, 0, 150), 1);
    }

    proptest! {
        #[test]
        fn derive_is_deterministic(
            dir in "[a-z0-9]{1,8}(/[a-z0-9]{1,8}){0,3}",
            stem in "[a-zA-Z0-9_-]{1,12}",
            width in 1u32..4096,
        ) {
            let d = deriver();
            let original = PathBuf::from(format!("/srv/images/{dir}/{stem}.jpg"));
            prop_assert_eq!(d.derive(&original, width), d.derive(&original, width));
            prop_assert!(d.derive(&original, width).starts_with("/srv/cache"));
        }

        #[test]
        fn distinct_directories_never_collide(
            dir_a in "[a-z]{1,8}",
            dir_b in "[a-z]{1,8}",
            stem in "[a-z]{1,8}",
        ) {
            prop_assume!(dir_a != dir_b);
            let d = deriver();
            let a = d.derive(&PathBuf::from(format!("/srv/images/{dir_a}/{stem}.jpg")), 150);
            let b = d.derive(&PathBuf::from(format!("/srv/images/{dir_b}/{stem}.jpg")), 150);
            prop_assert_ne!(a, b);
        }
    }
}
