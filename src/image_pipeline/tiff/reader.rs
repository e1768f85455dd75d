//! Still TIFF decoding for image sequences.

use std::io::Cursor;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleBuffer};
use crate::image_pipeline::raw::{DecodedFrames, FrameRange, RangePolicy, RawImageReader};

fn decode_error(e: tiff::TiffError) -> ImageError {
    ImageError::DecodeError(e.to_string())
}

/// Reads the first image of a TIFF file: unsigned 8 to 64-bit gray or RGB.
pub struct StandardTiffReader;

impl StandardTiffReader {
    pub fn read_still(&self, data: &[u8]) -> Result<FrameBuffer> {
        let mut decoder = Decoder::new(Cursor::new(data)).map_err(decode_error)?;
        let (width, height) = decoder.dimensions().map_err(decode_error)?;
        let colortype = decoder.colortype().map_err(decode_error)?;
        let (channels, bits) = match colortype {
            ColorType::Gray(bits) => (1, bits as u32),
            ColorType::RGB(bits) => (3, bits as u32),
            other => {
                return Err(ImageError::UnsupportedFormat(format!("TIFF color type {other:?}")));
            }
        };
        debug!(width, height, channels, bits, "Decoding TIFF still");

        let samples = match decoder.read_image().map_err(decode_error)? {
            DecodingResult::U8(v) => SampleBuffer::U8(v),
            DecodingResult::U16(v) => SampleBuffer::U16(v),
            DecodingResult::U32(v) => SampleBuffer::U32(v),
            DecodingResult::U64(v) => SampleBuffer::U64(v),
            _ => {
                return Err(ImageError::UnsupportedFormat(
                    "signed or floating-point TIFF samples".to_string(),
                ));
            }
        };
        FrameBuffer::new(width as usize, height as usize, channels, bits, samples)
    }
}

impl RawImageReader for StandardTiffReader {
    fn read_frames(&self, data: &[u8], range: Option<FrameRange>, policy: RangePolicy) -> Result<DecodedFrames> {
        let frame = self.read_still(data)?;
        let (window, clipped) = match range {
            Some(requested) => requested.resolve(1, policy)?,
            None => (FrameRange { start: 0, end: 1 }, false),
        };
        Ok(DecodedFrames {
            frames: vec![frame],
            available: 1,
            first_frame: window.start,
            clipped,
            bayer_pattern: None,
        })
    }
}
