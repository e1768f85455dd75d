//! RAW decoding data types

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::FrameBuffer;
use crate::image_pipeline::debayer::types::CfaPattern;

/// Bits per stored sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Twelve,
    Sixteen,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Twelve => 12,
            BitDepth::Sixteen => 16,
        }
    }

    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            12 => Ok(BitDepth::Twelve),
            16 => Ok(BitDepth::Sixteen),
            other => Err(ImageError::UnsupportedFormat(format!(
                "{other}-bit packing (supported: 8, 12, 16)"
            ))),
        }
    }

    /// Largest code a sample of this depth can hold.
    pub fn max_code(self) -> u16 {
        ((1u32 << self.bits()) - 1) as u16
    }
}

/// Bit layout of packed samples.
///
/// Only 12-bit data has distinct packings; for 8 and 16 bits `MsbFirst` selects
/// big-endian words and the other variants little-endian words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PackingOrder {
    /// Current Chronos firmware: each 3-byte group is a little-endian 24-bit word,
    /// sample 0 in bits 0-11 and sample 1 in bits 12-23.
    ///
    /// `s0 = b0 | (b1 & 0x0F) << 8`, `s1 = (b1 >> 4) | b2 << 4`
    #[default]
    Standard,
    /// Chronos firmware 0.2: the two nibbles of the middle byte are swapped
    /// relative to `Standard`.
    ///
    /// `s0 = b0 | (b1 & 0xF0) << 4`, `s1 = (b1 & 0x0F) | b2 << 4`
    LegacyV0_2,
    /// Big-endian bit stream (Photron MRAW).
    ///
    /// `s0 = b0 << 4 | b1 >> 4`, `s1 = (b1 & 0x0F) << 8 | b2`
    MsbFirst,
}

/// How samples of one frame map onto colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorLayout {
    Mono,
    /// Single-channel mosaic behind a colour filter array.
    Bayer(CfaPattern),
    /// Three interleaved samples per pixel.
    Rgb,
}

impl ColorLayout {
    pub fn channels(self) -> usize {
        match self {
            ColorLayout::Mono | ColorLayout::Bayer(_) => 1,
            ColorLayout::Rgb => 3,
        }
    }

    pub fn bayer_pattern(self) -> Option<CfaPattern> {
        match self {
            ColorLayout::Bayer(pattern) => Some(pattern),
            _ => None,
        }
    }
}

/// Half-open frame window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: usize,
    pub end: usize,
}

impl FrameRange {
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start >= end {
            return Err(ImageError::InvalidFrameRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Resolves this window against `available` units.
    ///
    /// Returns the window actually served and whether it was shortened.
    pub fn resolve(&self, available: usize, policy: RangePolicy) -> Result<(FrameRange, bool)> {
        if self.is_empty() {
            return Err(ImageError::InvalidFrameRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.end <= available {
            return Ok((*self, false));
        }
        let out_of_range = ImageError::FrameRange {
            start: self.start,
            end: self.end,
            available,
        };
        match policy {
            RangePolicy::Strict => Err(out_of_range),
            RangePolicy::Clip if self.start < available => Ok((
                FrameRange {
                    start: self.start,
                    end: available,
                },
                true,
            )),
            RangePolicy::Clip => Err(out_of_range),
        }
    }
}

/// What to do when a requested window runs past the available frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    /// Fail with `ImageError::FrameRange`.
    #[default]
    Strict,
    /// Serve `min(end, available)` and flag the result as clipped.
    Clip,
}

/// Frames decoded from one input, with the window that produced them.
#[derive(Debug, Clone)]
pub struct DecodedFrames {
    pub frames: Vec<FrameBuffer>,
    /// Frames present in the input.
    pub available: usize,
    /// Index, within the input, of `frames[0]`.
    pub first_frame: usize,
    /// True when the requested window was shortened to fit `available`.
    pub clipped: bool,
    /// Mosaic tile of the frames, when they are undemosaiced Bayer data.
    pub bayer_pattern: Option<CfaPattern>,
}

impl DecodedFrames {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
