use tracing::{debug, info, warn};

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleDtype};
use crate::image_pipeline::debayer::{self, CfaPattern, DemosaicMethod};
use crate::image_pipeline::sequence::types::FailedUnit;

/// Ordered frames of identical shape and dtype, indexed from zero regardless of
/// the numbering in the source file names.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    frames: Vec<FrameBuffer>,
    source_bits: u32,
    bayer_pattern: Option<CfaPattern>,
    failed: Vec<FailedUnit>,
    clipped: bool,
}

impl ImageSequence {
    /// Stacks `frames`; mixed dtypes are promoted to the widest one present.
    pub fn from_frames(frames: Vec<FrameBuffer>) -> Result<Self> {
        let Some(first) = frames.first() else {
            return Err(ImageError::Shape {
                width: 0,
                height: 0,
                channels: 0,
                reason: "a sequence needs at least one frame".to_string(),
            });
        };
        let (width, height, channels) = (first.width(), first.height(), first.channels());
        for (index, frame) in frames.iter().enumerate() {
            if (frame.width(), frame.height(), frame.channels()) != (width, height, channels) {
                return Err(ImageError::ShapeMismatch {
                    index,
                    reason: format!(
                        "{}x{}x{} frame in a {}x{}x{} sequence",
                        frame.width(),
                        frame.height(),
                        frame.channels(),
                        width,
                        height,
                        channels
                    ),
                });
            }
        }

        let source_bits = frames.iter().map(|f| f.bits_per_sample()).max().unwrap_or(0);
        let dtype = frames.iter().map(|f| f.dtype()).max().unwrap_or(SampleDtype::U8);
        let frames = if frames.iter().any(|f| f.dtype() != dtype) {
            debug!(?dtype, "Promoting mixed-dtype frames");
            frames
                .iter()
                .map(|f| f.promoted(dtype))
                .collect::<Result<Vec<_>>>()?
        } else {
            frames
        };

        Ok(Self {
            frames,
            source_bits,
            bayer_pattern: None,
            failed: Vec::new(),
            clipped: false,
        })
    }

    pub(crate) fn with_bayer_pattern(mut self, pattern: Option<CfaPattern>) -> Self {
        self.bayer_pattern = pattern;
        self
    }

    pub(crate) fn with_failures(mut self, failed: Vec<FailedUnit>) -> Self {
        self.failed = failed;
        self
    }

    pub(crate) fn with_clipped(mut self, clipped: bool) -> Self {
        self.clipped = clipped;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&FrameBuffer> {
        self.frames.get(index)
    }

    /// `[N, height, width]`, with a trailing `3` for RGB.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.frames.len()];
        shape.extend(self.frames[0].shape());
        shape
    }

    pub fn width(&self) -> usize {
        self.frames[0].width()
    }

    pub fn height(&self) -> usize {
        self.frames[0].height()
    }

    pub fn dtype(&self) -> SampleDtype {
        self.frames[0].dtype()
    }

    /// Bit depth the sensor recorded, independent of storage.
    pub fn source_bits(&self) -> u32 {
        self.source_bits
    }

    /// Mosaic tile of undemosaiced frames, if known.
    pub fn bayer_pattern(&self) -> Option<CfaPattern> {
        self.bayer_pattern
    }

    /// Units skipped in best-effort mode.
    pub fn failed(&self) -> &[FailedUnit] {
        &self.failed
    }

    /// True when the requested frame range was shortened to what was available.
    pub fn clipped(&self) -> bool {
        self.clipped
    }

    pub fn stored_bytes_per_sample(&self) -> usize {
        self.dtype().bytes()
    }

    pub fn byte_size(&self) -> usize {
        self.frames.iter().map(|f| f.byte_size()).sum()
    }

    /// Smallest and largest sample over the whole sequence.
    pub fn intensity_range(&self) -> Option<(u64, u64)> {
        self.frames
            .iter()
            .filter_map(|f| f.min_max())
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }

    /// Keeps rows `y1..=y2` and columns `x1..=x2` of every frame.
    pub fn crop(&mut self, y1: usize, y2: usize, x1: usize, x2: usize) -> Result<()> {
        self.frames = self
            .frames
            .iter()
            .map(|f| f.crop(y1, y2, x1, x2))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    pub fn mask_box(&mut self, y1: usize, y2: usize, x1: usize, x2: usize, fill: u64) -> Result<()> {
        for frame in &mut self.frames {
            frame.mask_box(y1, y2, x1, x2, fill)?;
        }
        Ok(())
    }

    pub fn mask_radius(&mut self, y: f64, x: f64, radius: f64, fill: u64) {
        for frame in &mut self.frames {
            frame.mask_radius(y, x, radius, fill);
        }
    }

    pub fn flip_horizontal(&mut self) {
        self.frames.iter_mut().for_each(FrameBuffer::flip_horizontal);
    }

    pub fn flip_vertical(&mut self) {
        self.frames.iter_mut().for_each(FrameBuffer::flip_vertical);
    }

    /// Widens storage one step (u8 to u16, u16 to u32, u32 to u64).
    pub fn increase_dtype(&mut self) -> Result<()> {
        let current = self.dtype();
        let target = current.widened();
        if target == current {
            return Ok(());
        }
        info!(from = ?current, to = ?target, "Increasing stored bit depth");
        self.frames = self
            .frames
            .iter()
            .map(|f| f.promoted(target))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Sums RGB frames into one channel with widened storage. Mono sequences are untouched.
    pub fn to_monochrome(&mut self) {
        if self.frames[0].channels() == 1 {
            return;
        }
        self.frames = self.frames.iter().map(FrameBuffer::to_monochrome).collect();
    }

    /// Demosaics every frame in parallel. `pattern` falls back to the tile recorded
    /// at load time.
    pub fn bayer_decode(
        &mut self,
        pattern: Option<CfaPattern>,
        method: DemosaicMethod,
        io_threads: usize,
    ) -> Result<()> {
        let pattern = match (pattern, self.bayer_pattern) {
            (Some(pattern), _) => pattern,
            (None, Some(recorded)) => recorded,
            (None, None) => {
                return Err(ImageError::InvalidFilter(
                    "no Bayer pattern given and none recorded for this sequence".to_string(),
                ));
            }
        };
        if self.frames[0].channels() != 1 {
            warn!("Sequence is already RGB, demosaic will be refused");
        }
        self.frames = debayer::demosaic_all(&self.frames, pattern, method, io_threads)?;
        self.bayer_pattern = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::frame::SampleBuffer;

    fn mono(width: usize, height: usize, base: u16) -> FrameBuffer {
        let data = (0..width * height).map(|i| base + i as u16).collect();
        FrameBuffer::new(width, height, 1, 12, SampleBuffer::U16(data)).unwrap()
    }

    #[test]
    fn test_shape_and_range() {
        let seq = ImageSequence::from_frames(vec![mono(4, 3, 0), mono(4, 3, 100)]).unwrap();
        assert_eq!(seq.shape(), vec![2, 3, 4]);
        assert_eq!(seq.intensity_range(), Some((0, 111)));
        assert_eq!(seq.stored_bytes_per_sample(), 2);
        assert_eq!(seq.byte_size(), 2 * 12 * 2);
        assert_eq!(seq.source_bits(), 12);
    }

    #[test]
    fn test_mismatched_frame_reports_index() {
        let err = ImageSequence::from_frames(vec![mono(4, 3, 0), mono(4, 3, 0), mono(3, 4, 0)]).unwrap_err();
        assert!(matches!(err, ImageError::ShapeMismatch { index: 2, .. }));
    }

    #[test]
    fn test_mixed_dtypes_promoted() {
        let small = FrameBuffer::new(2, 1, 1, 8, SampleBuffer::U8(vec![1, 2])).unwrap();
        let wide = FrameBuffer::new(2, 1, 1, 16, SampleBuffer::U16(vec![300, 400])).unwrap();
        let seq = ImageSequence::from_frames(vec![small, wide]).unwrap();
        assert_eq!(seq.dtype(), SampleDtype::U16);
        assert_eq!(seq.frames()[0].samples(), &SampleBuffer::U16(vec![1, 2]));
    }

    #[test]
    fn test_crop_flip_and_widen() {
        let mut seq = ImageSequence::from_frames(vec![mono(4, 4, 0)]).unwrap();
        seq.crop(1, 2, 0, 1).unwrap();
        assert_eq!(seq.shape(), vec![1, 2, 2]);
        assert_eq!(seq.frames()[0].samples(), &SampleBuffer::U16(vec![4, 5, 8, 9]));
        seq.flip_horizontal();
        assert_eq!(seq.frames()[0].samples(), &SampleBuffer::U16(vec![5, 4, 9, 8]));
        seq.flip_vertical();
        assert_eq!(seq.frames()[0].samples(), &SampleBuffer::U16(vec![9, 8, 5, 4]));
        seq.increase_dtype().unwrap();
        assert_eq!(seq.dtype(), SampleDtype::U32);
    }

    #[test]
    fn test_masks_apply_to_every_frame() {
        let mut seq = ImageSequence::from_frames(vec![mono(3, 3, 1), mono(3, 3, 50)]).unwrap();
        seq.mask_box(0, 0, 0, 2, 0).unwrap();
        seq.mask_radius(2.0, 2.0, 0.5, 7);
        for frame in seq.frames() {
            assert_eq!(frame.sample(0, 1, 0), Some(0));
            assert_eq!(frame.sample(2, 2, 0), Some(7));
        }
        assert!(seq.mask_box(0, 5, 0, 0, 0).is_err());
    }

    #[test]
    fn test_bayer_decode_uses_recorded_pattern() {
        let mut seq = ImageSequence::from_frames(vec![mono(4, 4, 0), mono(4, 4, 9)])
            .unwrap()
            .with_bayer_pattern(Some(CfaPattern::Grbg));
        seq.bayer_decode(None, DemosaicMethod::Downsample, 2).unwrap();
        assert_eq!(seq.shape(), vec![2, 2, 2, 3]);
        assert_eq!(seq.bayer_pattern(), None);

        let mut plain = ImageSequence::from_frames(vec![mono(4, 4, 0)]).unwrap();
        assert!(matches!(
            plain.bayer_decode(None, DemosaicMethod::Bilinear, 1),
            Err(ImageError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_to_monochrome() {
        let rgb = FrameBuffer::new(1, 1, 3, 8, SampleBuffer::U8(vec![200, 100, 50])).unwrap();
        let mut seq = ImageSequence::from_frames(vec![rgb]).unwrap();
        seq.to_monochrome();
        assert_eq!(seq.shape(), vec![1, 1, 1]);
        assert_eq!(seq.frames()[0].samples(), &SampleBuffer::U16(vec![350]));
    }
}
