//! # Named Sizes
//!
//! The caller-facing size tokens accepted in variant URLs and the fixed
//! pixel widths they resolve to. The mapping is static: adding a size means
//! adding a variant here, and every `match` on [`NamedSize`] must then
//! handle it.
//!
//! | Token      | Width  |
//! |------------|--------|
//! | `thumb`    | 150 px |
//! | `small`    | 480 px |
//! | `medium`   | 800 px |
//! | `original` | bypasses the variant cache |

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A display size a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedSize {
    /// Gallery thumbnails.
    Thumb,
    /// Mobile and list views.
    Small,
    /// Detail views.
    Medium,
    /// The untouched upload.
    Original,
}

impl NamedSize {
    /// Returns every named size, resized ones first.
    pub fn all() -> &'static [NamedSize] {
        &[Self::Thumb, Self::Small, Self::Medium, Self::Original]
    }

    /// Target width in pixels, or `None` for [`NamedSize::Original`].
    pub fn width(&self) -> Option<u32> {
        match self {
            Self::Thumb => Some(150),
            Self::Small => Some(480),
            Self::Medium => Some(800),
            Self::Original => None,
        }
    }

    /// The URL token for this size.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Original => "original",
        }
    }
}

impl fmt::Display for NamedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamedSize {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumb" => Ok(Self::Thumb),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "original" => Ok(Self::Original),
            other => Err(CoreError::UnknownSize(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_size_table() {
        assert_eq!(NamedSize::Thumb.width(), Some(150));
        assert_eq!(NamedSize::Small.width(), Some(480));
        assert_eq!(NamedSize::Medium.width(), Some(800));
        assert_eq!(NamedSize::Original.width(), None);
    }

    #[test]
    fn as_str_roundtrip() {
        for size in NamedSize::all() {
            let parsed: NamedSize = size.as_str().parse().unwrap();
            assert_eq!(*size, parsed);
            assert_eq!(size.to_string(), size.as_str());
        }
    }

    #[test]
    fn unknown_tokens_rejected() {
        assert!(matches!(
            "huge".parse::<NamedSize>(),
            Err(CoreError::UnknownSize(ref s)) if s == "huge"
        ));
        assert!("THUMB".parse::<NamedSize>().is_err()); // case-sensitive
        assert!("".parse::<NamedSize>().is_err());
        assert!("150".parse::<NamedSize>().is_err());
    }

    #[test]
    fn resized_widths_strictly_increase() {
        let widths: Vec<u32> = NamedSize::all().iter().filter_map(|s| s.width()).collect();
        assert_eq!(widths.len(), 3);
        assert!(widths.windows(2).all(|w| w[0] < w[1]));
    }
}
