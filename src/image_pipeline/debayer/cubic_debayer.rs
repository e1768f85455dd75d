use std::io::Cursor;

use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use tracing::info;

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleBuffer};
use crate::image_pipeline::debayer::types::CfaPattern;

fn bayer_cfa(pattern: CfaPattern) -> CFA {
    match pattern {
        CfaPattern::Rggb => CFA::RGGB,
        CfaPattern::Gbrg => CFA::GBRG,
        CfaPattern::Grbg => CFA::GRBG,
        CfaPattern::Bggr => CFA::BGGR,
    }
}

/// Smallest width and height the `bayer` cubic kernel accepts.
pub const CUBIC_MIN_SIDE: usize = 4;

/// Cubic interpolation through the `bayer` crate.
pub struct CubicDebayer {
    pattern: CfaPattern,
}

impl CubicDebayer {
    pub fn new(pattern: CfaPattern) -> Self {
        Self { pattern }
    }

    pub fn process(&self, frame: &FrameBuffer) -> Result<FrameBuffer> {
        let width = frame.width();
        let height = frame.height();
        info!("Starting cubic debayering for image {}x{}", width, height);

        // bayer crate only supports 8 and 16 bit
        let (bayer_depth, raster_depth, bytes_per_sample, bayer_bytes) = match frame.samples() {
            SampleBuffer::U8(values) => (BayerDepth::Depth8, RasterDepth::Depth8, 1, values.clone()),
            SampleBuffer::U16(values) => (
                BayerDepth::Depth16LE,
                RasterDepth::Depth16,
                2,
                values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            ),
            other => {
                return Err(ImageError::UnsupportedDepth(format!(
                    "cubic demosaic takes u8 or u16 mosaics, got {:?}",
                    other.dtype()
                )));
            }
        };

        let mut output_buf = vec![0u8; width * height * 3 * bytes_per_sample];
        let mut cursor = Cursor::new(&bayer_bytes[..]);
        let mut output_raster = RasterMut::new(width, height, raster_depth, &mut output_buf);

        bayer::run_demosaic(
            &mut cursor,
            bayer_depth,
            bayer_cfa(self.pattern),
            Demosaic::Cubic,
            &mut output_raster,
        )
        .map_err(|e| ImageError::DemosaicError(format!("{:?}", e)))?;

        // 16-bit rasters are written in native byte order
        let samples = if bytes_per_sample == 1 {
            SampleBuffer::U8(output_buf)
        } else {
            SampleBuffer::U16(
                output_buf
                    .chunks_exact(2)
                    .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                    .collect(),
            )
        };
        FrameBuffer::new(width, height, 3, frame.bits_per_sample(), samples)
    }
}
