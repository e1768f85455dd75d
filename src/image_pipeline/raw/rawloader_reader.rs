//! Camera RAW stills (ARW, CR2, NEF, DNG, RAF, ...) through the rawloader library.
//!
//! The sensor mosaic is returned undemosaiced, together with the CFA tile rawloader
//! reports, so it can go through the same debayer stage as packed dumps.

use std::io::Cursor;

use rawloader::RawImageData as RawloaderImageData;
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleBuffer};
use crate::image_pipeline::debayer::types::CfaPattern;
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::types::{DecodedFrames, FrameRange, RangePolicy};

/// Default bit depth when no white level information is available from the RAW file.
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

const U16_BITS: u32 = 16;

/// One decoded still and its mosaic tile, when the sensor has one.
#[derive(Debug, Clone)]
pub struct RawStill {
    pub frame: FrameBuffer,
    pub pattern: Option<CfaPattern>,
}

pub struct RawLoaderReader;

impl RawLoaderReader {
    pub fn read_still(&self, data: &[u8]) -> Result<RawStill> {
        debug!("Decoding camera RAW still, {} bytes", data.len());

        let decoded = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| ImageError::DecodeError(e.to_string()))?;

        // Float data is normalized to 0.0-1.0
        let samples: Vec<u16> = match decoded.data {
            RawloaderImageData::Integer(values) => values,
            RawloaderImageData::Float(values) => values
                .iter()
                .map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32) as u16)
                .collect(),
        };

        // The white level is the largest code the sensor produces
        let max_white_level = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
        let bits_per_sample = if max_white_level == 0 {
            DEFAULT_BITS_PER_SAMPLE
        } else {
            U16_BITS - max_white_level.leading_zeros()
        };

        let channels = decoded.cpp;
        let frame = FrameBuffer::new(
            decoded.width,
            decoded.height,
            channels,
            bits_per_sample,
            SampleBuffer::U16(samples),
        )?;

        let pattern = if channels == 1 {
            match decoded.cfa.name.parse::<CfaPattern>() {
                Ok(pattern) => Some(pattern),
                Err(_) => {
                    warn!(cfa = %decoded.cfa.name, "Sensor CFA is not a 2x2 Bayer tile");
                    None
                }
            }
        } else {
            None
        };

        debug!(
            width = decoded.width,
            height = decoded.height,
            bits_per_sample,
            max_white_level,
            "Decoded camera RAW still"
        );
        Ok(RawStill { frame, pattern })
    }
}

impl RawImageReader for RawLoaderReader {
    fn read_frames(&self, data: &[u8], range: Option<FrameRange>, policy: RangePolicy) -> Result<DecodedFrames> {
        let still = self.read_still(data)?;
        let (window, clipped) = match range {
            Some(requested) => requested.resolve(1, policy)?,
            None => (FrameRange { start: 0, end: 1 }, false),
        };
        Ok(DecodedFrames {
            frames: vec![still.frame],
            available: 1,
            first_frame: window.start,
            clipped,
            bayer_pattern: still.pattern,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_decode_error() {
        let result = RawLoaderReader.read_still(&[0u8; 64]);
        assert!(matches!(result, Err(ImageError::DecodeError(_))));
    }
}
