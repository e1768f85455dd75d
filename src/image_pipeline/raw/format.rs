//! Camera format descriptors, resolved once from a rawtype identifier.

use std::fmt;

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::debayer::types::CfaPattern;
use crate::image_pipeline::raw::types::{BitDepth, ColorLayout, PackingOrder};

/// Mosaic tile of Chronos 1.4 and Photron colour sensors.
pub const SENSOR_BAYER_PATTERN: CfaPattern = CfaPattern::Grbg;

/// Layout of a headerless packed RAW dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRawSpec {
    pub depth: BitDepth,
    pub packing: PackingOrder,
    /// Bytes skipped before the first frame.
    pub start_offset: usize,
    pub layout: ColorLayout,
}

impl PackedRawSpec {
    pub fn samples_per_frame(&self, width: usize, height: usize) -> usize {
        width * height * self.layout.channels()
    }

    /// Bits taken by one frame; 12-bit frames with an odd sample count end mid-byte.
    pub fn frame_stride_bits(&self, width: usize, height: usize) -> usize {
        self.samples_per_frame(width, height) * self.depth.bits() as usize
    }
}

/// Every supported RAW format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormatSpec {
    /// Headerless packed dump (Chronos, Photron, generic). Dimensions come from the caller.
    Packed(PackedRawSpec),
    /// PCO B16 / B16DAT; dimensions come from the file header.
    B16 { double_exposure: bool },
}

/// Caller-supplied settings that refine an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub start_offset: usize,
    /// Unpack 12-bit data written by Chronos firmware 0.2.
    pub legacy_packing: bool,
    /// Each B16 file holds two exposures (PIV pairs).
    pub double_exposure: bool,
    /// Replaces the sensor's default mosaic tile.
    pub bayer_pattern: Option<CfaPattern>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            start_offset: 0,
            legacy_packing: false,
            double_exposure: true,
            bayer_pattern: None,
        }
    }
}

/// Identifier families accepted by [`RawFormatSpec::from_identifier`].
pub const KNOWN_IDENTIFIERS: &[&str] = &[
    "b16",
    "b16dat",
    "chronos14_{mono|gray|color}_{12|16}bit_noheader",
    "photron_mraw_{mono|color|rgb}_{8|12|16}bit",
    "raw_{8|12|16}bit_{mono|rgb|rggb|gbrg|grbg|bggr}",
];

impl RawFormatSpec {
    pub fn from_identifier(identifier: &str, options: &FormatOptions) -> Result<Self> {
        let id = identifier.trim().to_ascii_lowercase();
        if id == "b16" || id == "b16dat" {
            return Ok(RawFormatSpec::B16 {
                double_exposure: options.double_exposure,
            });
        }

        let parts: Vec<&str> = id.split('_').collect();
        let (depth, packing, layout) = match parts.as_slice() {
            ["chronos14", kind, depth, "noheader"] => {
                let depth = parse_depth(depth).filter(|d| *d != BitDepth::Eight);
                let layout = match *kind {
                    "mono" | "gray" => Some(ColorLayout::Mono),
                    "color" => Some(ColorLayout::Bayer(SENSOR_BAYER_PATTERN)),
                    _ => None,
                };
                (depth, PackingOrder::Standard, layout)
            }
            ["photron", "mraw", kind, depth] => {
                let layout = match *kind {
                    "mono" => Some(ColorLayout::Mono),
                    "color" => Some(ColorLayout::Bayer(SENSOR_BAYER_PATTERN)),
                    "rgb" => Some(ColorLayout::Rgb),
                    _ => None,
                };
                (parse_depth(depth), PackingOrder::MsbFirst, layout)
            }
            ["raw", depth, kind] => {
                let layout = match *kind {
                    "mono" => Some(ColorLayout::Mono),
                    "rgb" => Some(ColorLayout::Rgb),
                    other => other.parse::<CfaPattern>().ok().map(ColorLayout::Bayer),
                };
                (parse_depth(depth), PackingOrder::Standard, layout)
            }
            _ => (None, PackingOrder::Standard, None),
        };

        let (Some(depth), Some(mut layout)) = (depth, layout) else {
            return Err(unknown_identifier(identifier));
        };

        let packing = if options.legacy_packing {
            if depth != BitDepth::Twelve || packing != PackingOrder::Standard {
                return Err(ImageError::UnsupportedFormat(format!(
                    "legacy packing order only applies to 12-bit little-endian formats, not `{identifier}`"
                )));
            }
            PackingOrder::LegacyV0_2
        } else {
            packing
        };

        if let Some(pattern) = options.bayer_pattern {
            match layout {
                ColorLayout::Bayer(_) => layout = ColorLayout::Bayer(pattern),
                _ => {
                    return Err(ImageError::UnsupportedFormat(format!(
                        "`{identifier}` is not a Bayer format, cannot apply pattern {pattern}"
                    )));
                }
            }
        }

        Ok(RawFormatSpec::Packed(PackedRawSpec {
            depth,
            packing,
            start_offset: options.start_offset,
            layout,
        }))
    }

    /// Declared sensor depth of decoded samples.
    pub fn bits_per_sample(&self) -> u32 {
        match self {
            RawFormatSpec::Packed(spec) => spec.depth.bits(),
            RawFormatSpec::B16 { .. } => 16,
        }
    }

    pub fn layout(&self) -> ColorLayout {
        match self {
            RawFormatSpec::Packed(spec) => spec.layout,
            RawFormatSpec::B16 { .. } => ColorLayout::Mono,
        }
    }

    /// Packed dumps carry no dimensions and need them from the caller.
    pub fn requires_dimensions(&self) -> bool {
        matches!(self, RawFormatSpec::Packed(_))
    }
}

impl fmt::Display for RawFormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawFormatSpec::Packed(spec) => write!(
                f,
                "{}-bit {:?} packed RAW ({:?}, offset {})",
                spec.depth.bits(),
                spec.layout,
                spec.packing,
                spec.start_offset
            ),
            RawFormatSpec::B16 { double_exposure } => write!(
                f,
                "PCO B16 ({} exposure)",
                if *double_exposure { "double" } else { "single" }
            ),
        }
    }
}

fn parse_depth(token: &str) -> Option<BitDepth> {
    let bits = token.strip_suffix("bit")?.parse().ok()?;
    BitDepth::from_bits(bits).ok()
}

fn unknown_identifier(identifier: &str) -> ImageError {
    ImageError::UnsupportedFormat(format!(
        "unknown rawtype `{identifier}` (allowed: {})",
        KNOWN_IDENTIFIERS.join(", ")
    ))
}
