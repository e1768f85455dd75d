//! Frame storage shared by the RAW decoders, the debayer stage and image sequences.
//!
//! Samples are stored row-major, `[row][column][channel]`, with channels interleaved
//! when a frame carries colour (`[R, G, B, R, G, B, ...]`).

use tracing::warn;

use crate::image_pipeline::common::error::{ImageError, Result};

/// Unsigned storage type of a frame's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleDtype {
    U8,
    U16,
    U32,
    U64,
}

impl SampleDtype {
    pub fn bits(self) -> u32 {
        match self {
            SampleDtype::U8 => 8,
            SampleDtype::U16 => 16,
            SampleDtype::U32 => 32,
            SampleDtype::U64 => 64,
        }
    }

    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Smallest storage type that holds `bits`-deep samples without reinterpretation.
    pub fn for_bits(bits: u32) -> Option<Self> {
        match bits {
            1..=8 => Some(SampleDtype::U8),
            9..=16 => Some(SampleDtype::U16),
            17..=32 => Some(SampleDtype::U32),
            33..=64 => Some(SampleDtype::U64),
            _ => None,
        }
    }

    /// Next wider storage type; `U64` stays `U64`.
    pub fn widened(self) -> Self {
        match self {
            SampleDtype::U8 => SampleDtype::U16,
            SampleDtype::U16 => SampleDtype::U32,
            SampleDtype::U32 | SampleDtype::U64 => SampleDtype::U64,
        }
    }

    pub fn max_value(self) -> u64 {
        match self {
            SampleDtype::U8 => u8::MAX as u64,
            SampleDtype::U16 => u16::MAX as u64,
            SampleDtype::U32 => u32::MAX as u64,
            SampleDtype::U64 => u64::MAX,
        }
    }
}

/// Typed sample storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

/// Applies `$body` to the vector inside any variant, rewrapping in the same variant.
macro_rules! map_samples {
    ($buf:expr, |$v:ident| $body:expr) => {
        match $buf {
            SampleBuffer::U8($v) => SampleBuffer::U8($body),
            SampleBuffer::U16($v) => SampleBuffer::U16($body),
            SampleBuffer::U32($v) => SampleBuffer::U32($body),
            SampleBuffer::U64($v) => SampleBuffer::U64($body),
        }
    };
}

/// Runs `$body` against the vector inside any variant.
macro_rules! with_samples {
    ($buf:expr, |$v:ident| $body:expr) => {
        match $buf {
            SampleBuffer::U8($v) => $body,
            SampleBuffer::U16($v) => $body,
            SampleBuffer::U32($v) => $body,
            SampleBuffer::U64($v) => $body,
        }
    };
}

impl SampleBuffer {
    pub fn dtype(&self) -> SampleDtype {
        match self {
            SampleBuffer::U8(_) => SampleDtype::U8,
            SampleBuffer::U16(_) => SampleDtype::U16,
            SampleBuffer::U32(_) => SampleDtype::U32,
            SampleBuffer::U64(_) => SampleDtype::U64,
        }
    }

    pub fn len(&self) -> usize {
        with_samples!(self, |v| v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        with_samples!(self, |v| v.get(index).map(|&s| s as u64))
    }

    pub fn to_u64_vec(&self) -> Vec<u64> {
        with_samples!(self, |v| v.iter().map(|&s| s as u64).collect())
    }

    /// Stores unpacked sensor codes in the smallest type that fits `bits`.
    pub fn from_codes(bits: u32, codes: Vec<u16>) -> Result<Self> {
        match SampleDtype::for_bits(bits) {
            Some(SampleDtype::U8) => Ok(SampleBuffer::U8(codes.into_iter().map(|c| c as u8).collect())),
            Some(SampleDtype::U16) => Ok(SampleBuffer::U16(codes)),
            _ => Err(ImageError::UnsupportedFormat(format!(
                "{bits}-bit sensor codes cannot be stored from a 16-bit unpacker"
            ))),
        }
    }

    /// Builds a buffer of `dtype` from values already known to fit it.
    fn from_u64_vec(dtype: SampleDtype, values: Vec<u64>) -> Self {
        match dtype {
            SampleDtype::U8 => SampleBuffer::U8(values.into_iter().map(|v| v as u8).collect()),
            SampleDtype::U16 => SampleBuffer::U16(values.into_iter().map(|v| v as u16).collect()),
            SampleDtype::U32 => SampleBuffer::U32(values.into_iter().map(|v| v as u32).collect()),
            SampleDtype::U64 => SampleBuffer::U64(values),
        }
    }

    /// Converts to a storage type at least as wide as the current one.
    pub fn promoted(&self, dtype: SampleDtype) -> Result<Self> {
        if dtype < self.dtype() {
            return Err(ImageError::UnsupportedDepth(format!(
                "cannot narrow {:?} samples to {:?}",
                self.dtype(),
                dtype
            )));
        }
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        Ok(Self::from_u64_vec(dtype, self.to_u64_vec()))
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    channels: usize,
    bits_per_sample: u32,
    samples: SampleBuffer,
}

impl FrameBuffer {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        bits_per_sample: u32,
        samples: SampleBuffer,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ImageError::Dimension {
                width: Some(width),
                height: Some(height),
            });
        }
        if channels != 1 && channels != 3 {
            return Err(ImageError::Shape {
                width,
                height,
                channels,
                reason: "frames carry 1 or 3 channels".to_string(),
            });
        }
        let expected = width * height * channels;
        if samples.len() != expected {
            return Err(ImageError::Shape {
                width,
                height,
                channels,
                reason: format!("expected {expected} samples, got {}", samples.len()),
            });
        }
        if bits_per_sample == 0 || bits_per_sample > samples.dtype().bits() {
            return Err(ImageError::UnsupportedDepth(format!(
                "{bits_per_sample}-bit samples do not fit {:?} storage",
                samples.dtype()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            bits_per_sample,
            samples,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Declared sensor depth, which may be narrower than the storage type.
    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    pub fn dtype(&self) -> SampleDtype {
        self.samples.dtype()
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    pub fn byte_size(&self) -> usize {
        self.samples.len() * self.dtype().bytes()
    }

    /// `[height, width]` for mono frames, `[height, width, channels]` otherwise.
    pub fn shape(&self) -> Vec<usize> {
        if self.channels == 1 {
            vec![self.height, self.width]
        } else {
            vec![self.height, self.width, self.channels]
        }
    }

    pub fn sample(&self, row: usize, col: usize, channel: usize) -> Option<u64> {
        if row >= self.height || col >= self.width || channel >= self.channels {
            return None;
        }
        self.samples
            .get((row * self.width + col) * self.channels + channel)
    }

    pub fn min_max(&self) -> Option<(u64, u64)> {
        with_samples!(&self.samples, |v| {
            let min = v.iter().min().map(|&s| s as u64);
            let max = v.iter().max().map(|&s| s as u64);
            min.zip(max)
        })
    }

    /// Inclusive crop to rows `y1..=y2` and columns `x1..=x2`.
    pub fn crop(&self, y1: usize, y2: usize, x1: usize, x2: usize) -> Result<FrameBuffer> {
        self.check_region(y1, y2, x1, x2)?;
        let (width, channels) = (self.width, self.channels);
        let out_width = x2 - x1 + 1;
        let samples = map_samples!(&self.samples, |v| {
            let mut out = Vec::with_capacity((y2 - y1 + 1) * out_width * channels);
            for row in y1..=y2 {
                let start = (row * width + x1) * channels;
                out.extend_from_slice(&v[start..start + out_width * channels]);
            }
            out
        });
        FrameBuffer::new(out_width, y2 - y1 + 1, channels, self.bits_per_sample, samples)
    }

    /// Sets every channel inside the inclusive box to `fill`, saturated to the storage type.
    pub fn mask_box(&mut self, y1: usize, y2: usize, x1: usize, x2: usize, fill: u64) -> Result<()> {
        self.check_region(y1, y2, x1, x2)?;
        let (width, channels) = (self.width, self.channels);
        self.fill_where(fill, |row, col| {
            (y1..=y2).contains(&row) && (x1..=x2).contains(&col)
        }, width, channels);
        Ok(())
    }

    /// Sets every pixel within `radius` of `(y, x)` to `fill`.
    pub fn mask_radius(&mut self, y: f64, x: f64, radius: f64, fill: u64) {
        let (width, channels) = (self.width, self.channels);
        self.fill_where(fill, |row, col| {
            let dy = row as f64 - y;
            let dx = col as f64 - x;
            (dy * dy + dx * dx).sqrt() <= radius
        }, width, channels);
    }

    pub fn flip_horizontal(&mut self) {
        let (width, channels) = (self.width, self.channels);
        with_samples!(&mut self.samples, |v| {
            for row in v.chunks_exact_mut(width * channels) {
                for col in 0..width / 2 {
                    let mirror = width - 1 - col;
                    for ch in 0..channels {
                        row.swap(col * channels + ch, mirror * channels + ch);
                    }
                }
            }
        });
    }

    pub fn flip_vertical(&mut self) {
        let (height, stride) = (self.height, self.width * self.channels);
        with_samples!(&mut self.samples, |v| {
            for row in 0..height / 2 {
                let mirror = height - 1 - row;
                let (top, bottom) = v.split_at_mut(mirror * stride);
                top[row * stride..(row + 1) * stride].swap_with_slice(&mut bottom[..stride]);
            }
        });
    }

    pub fn promoted(&self, dtype: SampleDtype) -> Result<FrameBuffer> {
        Ok(FrameBuffer {
            samples: self.samples.promoted(dtype)?,
            ..self.clone()
        })
    }

    /// Sums the colour channels into one, widening storage so the sum cannot overflow.
    pub fn to_monochrome(&self) -> FrameBuffer {
        if self.channels == 1 {
            return self.clone();
        }
        let dtype = self.dtype().widened();
        let max = dtype.max_value();
        let mut saturated = false;
        let sums: Vec<u64> = self
            .samples
            .to_u64_vec()
            .chunks_exact(self.channels)
            .map(|px| {
                px.iter().fold(0u64, |acc, &s| match acc.checked_add(s) {
                    Some(total) if total <= max => total,
                    _ => {
                        saturated = true;
                        max
                    }
                })
            })
            .collect();
        if saturated {
            warn!("Possible overflow/clipping detected when summing RGB channels");
        }
        FrameBuffer {
            width: self.width,
            height: self.height,
            channels: 1,
            bits_per_sample: (self.bits_per_sample + 2).min(dtype.bits()),
            samples: SampleBuffer::from_u64_vec(dtype, sums),
        }
    }

    fn check_region(&self, y1: usize, y2: usize, x1: usize, x2: usize) -> Result<()> {
        if y1 > y2 || x1 > x2 || y2 >= self.height || x2 >= self.width {
            return Err(ImageError::InvalidRegion(format!(
                "rows {y1}..={y2}, columns {x1}..={x2} outside {}x{} frame",
                self.width, self.height
            )));
        }
        Ok(())
    }

    fn fill_where(
        &mut self,
        fill: u64,
        inside: impl Fn(usize, usize) -> bool,
        width: usize,
        channels: usize,
    ) {
        let fill = fill.min(self.dtype().max_value());
        with_samples!(&mut self.samples, |v| {
            for (index, px) in v.chunks_exact_mut(channels).enumerate() {
                if inside(index / width, index % width) {
                    px.iter_mut().for_each(|s| *s = fill as _);
                }
            }
        });
    }
}
