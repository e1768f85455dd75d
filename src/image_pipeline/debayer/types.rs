//! Types for debayering operations

use std::fmt;
use std::str::FromStr;

use crate::image_pipeline::common::error::ImageError;

/// Colour recorded by one photosite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfaColor {
    Red,
    Green,
    Blue,
}

impl CfaColor {
    /// Channel index in interleaved RGB output.
    pub fn channel(self) -> usize {
        match self {
            CfaColor::Red => 0,
            CfaColor::Green => 1,
            CfaColor::Blue => 2,
        }
    }
}

/// The 2x2 colour filter array tile, named by its top-left, top-right,
/// bottom-left and bottom-right photosites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfaPattern {
    Rggb,
    Gbrg,
    Grbg,
    Bggr,
}

impl CfaPattern {
    pub const ALL: [CfaPattern; 4] = [
        CfaPattern::Rggb,
        CfaPattern::Gbrg,
        CfaPattern::Grbg,
        CfaPattern::Bggr,
    ];

    fn tile(self) -> [CfaColor; 4] {
        use CfaColor::{Blue as B, Green as G, Red as R};
        match self {
            CfaPattern::Rggb => [R, G, G, B],
            CfaPattern::Gbrg => [G, B, R, G],
            CfaPattern::Grbg => [G, R, B, G],
            CfaPattern::Bggr => [B, G, G, R],
        }
    }

    /// Colour of the photosite at `(row, col)`.
    pub fn color_at(self, row: usize, col: usize) -> CfaColor {
        self.tile()[(row % 2) * 2 + col % 2]
    }

    /// Offset `(row, col)` of `color` inside the 2x2 tile. Green resolves to the
    /// photosite sharing a row with red.
    pub fn offset_of(self, color: CfaColor) -> (usize, usize) {
        let tile = self.tile();
        let index = match color {
            CfaColor::Green => {
                let red = tile.iter().position(|&c| c == CfaColor::Red).unwrap_or(0);
                // the green on red's row sits in the other column
                (red / 2) * 2 + (1 - red % 2)
            }
            _ => tile.iter().position(|&c| c == color).unwrap_or(0),
        };
        (index / 2, index % 2)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CfaPattern::Rggb => "RGGB",
            CfaPattern::Gbrg => "GBRG",
            CfaPattern::Grbg => "GRBG",
            CfaPattern::Bggr => "BGGR",
        }
    }
}

impl fmt::Display for CfaPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CfaPattern {
    type Err = ImageError;

    /// Accepts `RGGB`-style tokens in any case, with or without the
    /// `DC1394_COLOR_FILTER_` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase();
        let token = token.strip_prefix("DC1394_COLOR_FILTER_").unwrap_or(&token);
        match token {
            "RGGB" => Ok(CfaPattern::Rggb),
            "GBRG" => Ok(CfaPattern::Gbrg),
            "GRBG" => Ok(CfaPattern::Grbg),
            "BGGR" => Ok(CfaPattern::Bggr),
            _ => Err(ImageError::InvalidFilter(format!(
                "`{s}` (expected one of RGGB, GBRG, GRBG, BGGR)"
            ))),
        }
    }
}

/// Interpolation used to rebuild the missing colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DemosaicMethod {
    /// Each 2x2 tile's samples replicated over the tile.
    Nearest,
    /// Mean of same-colour neighbours in the 3x3 window.
    #[default]
    Bilinear,
    /// Bilinear green, then red and blue scaled by the local red/green and
    /// blue/green ratios.
    SmoothHue,
    /// Cubic interpolation from the `bayer` crate.
    Cubic,
    /// One RGB pixel per 2x2 tile; halves both dimensions.
    Downsample,
}

impl DemosaicMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DemosaicMethod::Nearest => "nearest",
            DemosaicMethod::Bilinear => "bilinear",
            DemosaicMethod::SmoothHue => "smooth_hue",
            DemosaicMethod::Cubic => "cubic",
            DemosaicMethod::Downsample => "downsample",
        }
    }
}

impl fmt::Display for DemosaicMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemosaicMethod {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        let token = token.strip_prefix("dc1394_bayer_method_").unwrap_or(&token);
        match token {
            "nearest" | "replication" | "simple" => Ok(DemosaicMethod::Nearest),
            "bilinear" | "linear" => Ok(DemosaicMethod::Bilinear),
            "smooth_hue" | "smoothhue" => Ok(DemosaicMethod::SmoothHue),
            "cubic" | "hqlinear" => Ok(DemosaicMethod::Cubic),
            "downsample" => Ok(DemosaicMethod::Downsample),
            "edgesense" | "vng" | "ahd" => Err(ImageError::InvalidMethod(format!(
                "`{s}`: the DC1394 {token} method is not available (use nearest, bilinear, \
                 smooth_hue, cubic or downsample)"
            ))),
            _ => Err(ImageError::InvalidMethod(format!(
                "`{s}` (expected nearest, bilinear, smooth_hue, cubic or downsample)"
            ))),
        }
    }
}
