//! Compressed transport formats used between the coordinator and workers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Image codec applied to every work unit before it crosses the cluster link.
///
/// `Jpeg` is lossy and keeps unit messages small. `Png` is lossless and trades
/// message size for exact pixels. Neither option restores the neighbourhood
/// context lost at row-chunk boundaries.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum UnitCodec {
    /// Baseline JPEG at the configured quality.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl UnitCodec {
    /// Wire tag used in unit frames.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Jpeg => 0,
            Self::Png => 1,
        }
    }

    /// Resolves a wire tag back to a codec.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Jpeg),
            1 => Some(Self::Png),
            _ => None,
        }
    }
}

/// Errors encountered while parsing a [`UnitCodec`] from text.
pub type UnitCodecParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_resolve_to_the_same_codec() {
        for codec in [UnitCodec::Jpeg, UnitCodec::Png] {
            assert_eq!(UnitCodec::from_tag(codec.tag()), Some(codec));
        }
        assert_eq!(UnitCodec::from_tag(7), None);
    }

    #[test]
    fn parses_display_form() {
        assert_eq!("png".parse::<UnitCodec>().expect("parse"), UnitCodec::Png);
        assert_eq!(UnitCodec::Jpeg.to_string(), "jpeg");
    }
}
