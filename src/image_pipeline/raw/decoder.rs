use tracing::{debug, info, instrument, warn};

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleBuffer};
use crate::image_pipeline::raw::format::PackedRawSpec;
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::types::{DecodedFrames, FrameRange, RangePolicy};
use crate::image_pipeline::raw::unpack::BitUnpacker;

/// Splits a headerless packed RAW dump into `width x height` frames.
///
/// Frames follow each other from `start_offset` with no padding, so frame `n` starts at
/// sample `n * width * height * channels` of the unpacked stream.
#[derive(Debug, Clone)]
pub struct RawFrameDecoder {
    spec: PackedRawSpec,
    width: usize,
    height: usize,
    unpacker: BitUnpacker,
}

impl RawFrameDecoder {
    pub fn new(spec: PackedRawSpec, width: Option<usize>, height: Option<usize>) -> Result<Self> {
        let (Some(w), Some(h)) = (width, height) else {
            return Err(ImageError::Dimension { width, height });
        };
        if w == 0 || h == 0 {
            return Err(ImageError::Dimension { width, height });
        }
        Ok(Self {
            spec,
            width: w,
            height: h,
            unpacker: BitUnpacker::new(spec.depth, spec.packing),
        })
    }

    pub fn spec(&self) -> &PackedRawSpec {
        &self.spec
    }

    pub fn samples_per_frame(&self) -> usize {
        self.spec.samples_per_frame(self.width, self.height)
    }

    /// Whole frames present in `data`.
    pub fn frames_available(&self, data: &[u8]) -> Result<usize> {
        let samples = self.unpacker.available_samples(data, self.spec.start_offset)?;
        Ok(samples / self.samples_per_frame())
    }

    /// Whole frames a file of `len` bytes holds, without reading it.
    pub fn frames_in_len(&self, len: usize) -> usize {
        let payload_bits = len.saturating_sub(self.spec.start_offset) * 8;
        payload_bits / self.spec.frame_stride_bits(self.width, self.height)
    }

    #[instrument(skip(self, data), fields(bytes = data.len(), width = self.width, height = self.height))]
    pub fn decode(&self, data: &[u8], range: Option<FrameRange>, policy: RangePolicy) -> Result<DecodedFrames> {
        let per_frame = self.samples_per_frame();
        let available = self.frames_available(data)?;
        if available == 0 {
            return Err(ImageError::TruncatedData {
                needed: self.spec.start_offset + self.unpacker.bytes_for(per_frame),
                available: data.len(),
            });
        }

        let (window, clipped) = match range {
            Some(requested) => {
                let (window, clipped) = requested.resolve(available, policy)?;
                if clipped {
                    warn!(
                        requested_start = requested.start,
                        requested_end = requested.end,
                        available,
                        "Frame range clipped to the frames present in the file"
                    );
                }
                (window, clipped)
            }
            None => (FrameRange { start: 0, end: available }, false),
        };

        debug!(
            start = window.start,
            end = window.end,
            per_frame,
            "Unpacking frame window"
        );
        let codes = self.unpacker.unpack_range(
            data,
            self.spec.start_offset,
            window.start * per_frame,
            window.len() * per_frame,
        )?;

        let bits = self.spec.depth.bits();
        let channels = self.spec.layout.channels();
        let frames = codes
            .chunks_exact(per_frame)
            .map(|frame| {
                let samples = SampleBuffer::from_codes(bits, frame.to_vec())?;
                FrameBuffer::new(self.width, self.height, channels, bits, samples)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            frames = frames.len(),
            available,
            clipped,
            "Decoded packed RAW frames"
        );
        Ok(DecodedFrames {
            frames,
            available,
            first_frame: window.start,
            clipped,
            bayer_pattern: self.spec.layout.bayer_pattern(),
        })
    }
}

impl RawImageReader for RawFrameDecoder {
    fn read_frames(&self, data: &[u8], range: Option<FrameRange>, policy: RangePolicy) -> Result<DecodedFrames> {
        self.decode(data, range, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::frame::SampleDtype;
    use crate::image_pipeline::debayer::types::CfaPattern;
    use crate::image_pipeline::raw::types::{BitDepth, ColorLayout, PackingOrder};
    use crate::image_pipeline::raw::unpack::pack_samples;
    use proptest::prelude::*;

    fn spec(depth: BitDepth, layout: ColorLayout) -> PackedRawSpec {
        PackedRawSpec {
            depth,
            packing: PackingOrder::Standard,
            start_offset: 0,
            layout,
        }
    }

    /// `frames` frames of `w x h`, each sample encoding its frame, row and column.
    fn synthetic(w: usize, h: usize, frames: usize) -> Vec<u16> {
        (0..frames * w * h).map(|i| (i % 4096) as u16).collect()
    }

    #[test]
    fn test_requires_dimensions() {
        let spec = spec(BitDepth::Twelve, ColorLayout::Mono);
        assert!(matches!(
            RawFrameDecoder::new(spec, None, Some(4)),
            Err(ImageError::Dimension { width: None, .. })
        ));
        assert!(matches!(
            RawFrameDecoder::new(spec, Some(4), Some(0)),
            Err(ImageError::Dimension { .. })
        ));
    }

    #[test]
    fn test_frames_in_len_counts_mid_byte_frames() {
        // 3 x 1 twelve-bit frames take 36 bits, so 14 bytes hold three of them
        let decoder = RawFrameDecoder::new(spec(BitDepth::Twelve, ColorLayout::Mono), Some(3), Some(1)).unwrap();
        assert_eq!(decoder.spec().frame_stride_bits(3, 1), 36);
        assert_eq!(decoder.frames_in_len(14), 3);
        assert_eq!(decoder.frames_in_len(13), 2);
        assert_eq!(decoder.frames_in_len(0), 0);
    }

    #[test]
    fn test_decodes_frames_in_order() {
        let spec = spec(BitDepth::Twelve, ColorLayout::Mono);
        let codes = synthetic(4, 3, 3);
        let data = pack_samples(&codes, BitDepth::Twelve, PackingOrder::Standard);
        let decoder = RawFrameDecoder::new(spec, Some(4), Some(3)).unwrap();

        let decoded = decoder.decode(&data, None, RangePolicy::Strict).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.available, 3);
        assert!(!decoded.clipped);
        let second = &decoded.frames[1];
        assert_eq!(second.shape(), vec![3, 4]);
        assert_eq!(second.dtype(), SampleDtype::U16);
        assert_eq!(second.sample(0, 0, 0), Some(12));
        assert_eq!(second.sample(2, 3, 0), Some(23));
    }

    #[test]
    fn test_full_range_matches_no_range() {
        let spec = spec(BitDepth::Sixteen, ColorLayout::Mono);
        let data = pack_samples(&synthetic(5, 2, 4), BitDepth::Sixteen, PackingOrder::Standard);
        let decoder = RawFrameDecoder::new(spec, Some(5), Some(2)).unwrap();

        let all = decoder.decode(&data, None, RangePolicy::Strict).unwrap();
        let ranged = decoder
            .decode(&data, Some(FrameRange::new(0, 4).unwrap()), RangePolicy::Strict)
            .unwrap();
        assert_eq!(all.frames, ranged.frames);
    }

    #[test]
    fn test_range_past_end_reports_available() {
        let spec = spec(BitDepth::Twelve, ColorLayout::Mono);
        let data = pack_samples(&synthetic(4, 4, 6), BitDepth::Twelve, PackingOrder::Standard);
        let decoder = RawFrameDecoder::new(spec, Some(4), Some(4)).unwrap();
        let range = FrameRange::new(0, 16).unwrap();

        let err = decoder.decode(&data, Some(range), RangePolicy::Strict).unwrap_err();
        assert!(matches!(err, ImageError::FrameRange { start: 0, end: 16, available: 6 }));

        let clipped = decoder.decode(&data, Some(range), RangePolicy::Clip).unwrap();
        assert_eq!(clipped.len(), 6);
        assert_eq!(clipped.available, 6);
        assert!(clipped.clipped);
    }

    #[test]
    fn test_partial_window_starts_mid_file() {
        let spec = spec(BitDepth::Twelve, ColorLayout::Mono);
        // 3x3 frames have an odd sample count, so frame 1 starts mid-byte
        let codes = synthetic(3, 3, 4);
        let data = pack_samples(&codes, BitDepth::Twelve, PackingOrder::Standard);
        let decoder = RawFrameDecoder::new(spec, Some(3), Some(3)).unwrap();

        let decoded = decoder
            .decode(&data, Some(FrameRange::new(1, 3).unwrap()), RangePolicy::Strict)
            .unwrap();
        assert_eq!(decoded.first_frame, 1);
        assert_eq!(decoded.frames[0].samples(), &SampleBuffer::U16(codes[9..18].to_vec()));
        assert_eq!(decoded.frames[1].samples(), &SampleBuffer::U16(codes[18..27].to_vec()));
    }

    #[test]
    fn test_start_offset_and_trailing_bytes() {
        let mut spec = spec(BitDepth::Eight, ColorLayout::Bayer(CfaPattern::Rggb));
        spec.start_offset = 3;
        let mut data = vec![0xAA; 3];
        data.extend((0u8..20).collect::<Vec<_>>());
        let decoder = RawFrameDecoder::new(spec, Some(3), Some(2)).unwrap();

        let decoded = decoder.decode(&data, None, RangePolicy::Strict).unwrap();
        // 20 bytes hold three 6-sample frames; the last two bytes are dropped
        assert_eq!(decoded.available, 3);
        assert_eq!(decoded.frames[2].samples(), &SampleBuffer::U8(vec![12, 13, 14, 15, 16, 17]));
        assert_eq!(decoder.frames_in_len(data.len()), 3);
    }

    #[test]
    fn test_rgb_frames_are_interleaved() {
        let spec = spec(BitDepth::Sixteen, ColorLayout::Rgb);
        let codes: Vec<u16> = (0..24).collect();
        let data = pack_samples(&codes, BitDepth::Sixteen, PackingOrder::Standard);
        let decoder = RawFrameDecoder::new(spec, Some(2), Some(2)).unwrap();

        let decoded = decoder.decode(&data, None, RangePolicy::Strict).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.frames[1].shape(), vec![2, 2, 3]);
        assert_eq!(decoded.frames[1].sample(0, 1, 2), Some(17));
    }

    #[test]
    fn test_less_than_one_frame_is_truncated() {
        let spec = spec(BitDepth::Sixteen, ColorLayout::Mono);
        let decoder = RawFrameDecoder::new(spec, Some(8), Some(8)).unwrap();
        assert!(matches!(
            decoder.decode(&[0u8; 100], None, RangePolicy::Strict),
            Err(ImageError::TruncatedData { needed: 128, available: 100 })
        ));
    }

    proptest! {
        #[test]
        fn prop_window_is_slice_of_full_decode(
            frames in 1usize..6,
            start in 0usize..6,
            len in 1usize..6,
        ) {
            let spec = spec(BitDepth::Twelve, ColorLayout::Mono);
            let data = pack_samples(&synthetic(3, 5, frames), BitDepth::Twelve, PackingOrder::Standard);
            let decoder = RawFrameDecoder::new(spec, Some(3), Some(5)).unwrap();
            let all = decoder.decode(&data, None, RangePolicy::Strict).unwrap();
            let range = FrameRange::new(start, start + len).unwrap();
            match decoder.decode(&data, Some(range), RangePolicy::Strict) {
                Ok(window) => prop_assert_eq!(&window.frames[..], &all.frames[start..start + len]),
                Err(ImageError::FrameRange { available, .. }) => {
                    prop_assert_eq!(available, frames);
                    prop_assert!(start + len > frames);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
    }
}
