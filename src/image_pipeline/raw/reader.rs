use std::path::Path;

use tracing::{info_span, instrument};

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::raw::b16::B16Decoder;
use crate::image_pipeline::raw::decoder::RawFrameDecoder;
use crate::image_pipeline::raw::format::RawFormatSpec;
use crate::image_pipeline::raw::types::{DecodedFrames, FrameRange, RangePolicy};

/// Turns the bytes of one input unit into frames.
pub trait RawImageReader {
    fn read_frames(&self, data: &[u8], range: Option<FrameRange>, policy: RangePolicy) -> Result<DecodedFrames>;
}

/// Picks the reader for `spec`. Packed formats need `width` and `height`; B16 ignores them.
pub fn reader_for(
    spec: &RawFormatSpec,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<Box<dyn RawImageReader + Send + Sync>> {
    match *spec {
        RawFormatSpec::Packed(packed) => Ok(Box::new(RawFrameDecoder::new(packed, width, height)?)),
        RawFormatSpec::B16 { double_exposure } => Ok(Box::new(B16Decoder::new(double_exposure))),
    }
}

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let _span = info_span!("read_input_file", path = %path.display()).entered();
    std::fs::read(path).map_err(|e| ImageError::InputReadError(format!("{}: {}", path.display(), e)))
}

/// Reads `path` and decodes it as `spec`.
#[instrument(skip(spec), fields(path = %path.as_ref().display(), format = %spec))]
pub fn decode_file<P: AsRef<Path>>(
    path: P,
    spec: &RawFormatSpec,
    width: Option<usize>,
    height: Option<usize>,
    range: Option<FrameRange>,
    policy: RangePolicy,
) -> Result<DecodedFrames> {
    let reader = reader_for(spec, width, height)?;
    let data = read_input(path.as_ref())?;
    let _span = info_span!("decode_raw", bytes = data.len()).entered();
    reader.read_frames(&data, range, policy)
}
