//! PCO B16 / B16DAT reader.
//!
//! A B16 file is a little-endian header starting with `PCO-`, followed by one
//! 16-bit mono image. PIV cameras store both exposures of a pair stacked
//! vertically in that image.

use tracing::{debug, instrument, warn};

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleBuffer};
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::types::{DecodedFrames, FrameRange, RangePolicy};

pub const B16_MAGIC: &[u8; 4] = b"PCO-";

const FILE_SIZE_OFFSET: usize = 4;
const HEADER_LENGTH_OFFSET: usize = 8;
const WIDTH_OFFSET: usize = 12;
const HEIGHT_OFFSET: usize = 16;
/// Magic plus the four fields read here.
pub const MIN_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct B16Header {
    pub file_size: usize,
    pub header_length: usize,
    pub width: usize,
    pub height: usize,
}

impl B16Header {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_HEADER_LEN {
            return Err(ImageError::InvalidHeader(format!(
                "B16 header needs {MIN_HEADER_LEN} bytes, file has {}",
                data.len()
            )));
        }
        if &data[..4] != B16_MAGIC {
            return Err(ImageError::InvalidHeader(format!(
                "bad B16 magic {:02X?}, expected `PCO-`",
                &data[..4]
            )));
        }

        let header = Self {
            file_size: read_field(data, FILE_SIZE_OFFSET, "file size")?,
            header_length: read_field(data, HEADER_LENGTH_OFFSET, "header length")?,
            width: read_field(data, WIDTH_OFFSET, "width")?,
            height: read_field(data, HEIGHT_OFFSET, "height")?,
        };
        if header.header_length < MIN_HEADER_LEN {
            return Err(ImageError::InvalidHeader(format!(
                "B16 header length {} is shorter than the fixed fields",
                header.header_length
            )));
        }
        if header.width == 0 || header.height == 0 {
            return Err(ImageError::Dimension {
                width: Some(header.width),
                height: Some(header.height),
            });
        }
        Ok(header)
    }

    pub fn image_bytes(&self) -> usize {
        self.width * self.height * 2
    }
}

fn read_field(data: &[u8], offset: usize, name: &str) -> Result<usize> {
    let bytes: [u8; 4] = data[offset..offset + 4]
        .try_into()
        .map_err(|_| ImageError::InvalidHeader(format!("B16 {name} field is truncated")))?;
    let value = i32::from_le_bytes(bytes);
    usize::try_from(value)
        .map_err(|_| ImageError::InvalidHeader(format!("negative B16 {name}: {value}")))
}

/// Decodes one B16 file into one frame, or two when `double_exposure` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct B16Decoder {
    pub double_exposure: bool,
}

impl B16Decoder {
    pub fn new(double_exposure: bool) -> Self {
        Self { double_exposure }
    }

    pub fn frames_per_file(&self) -> usize {
        if self.double_exposure { 2 } else { 1 }
    }

    #[instrument(skip(self, data), fields(bytes = data.len(), double_exposure = self.double_exposure))]
    pub fn decode(&self, data: &[u8]) -> Result<Vec<FrameBuffer>> {
        let header = B16Header::parse(data)?;
        if header.file_size != data.len() {
            warn!(
                declared = header.file_size,
                actual = data.len(),
                "B16 file size field does not match the file"
            );
        }

        let needed = header.header_length + header.image_bytes();
        if data.len() < needed {
            return Err(ImageError::TruncatedData {
                needed,
                available: data.len(),
            });
        }
        let pixels: Vec<u16> = data[header.header_length..needed]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        debug!(width = header.width, height = header.height, "Read B16 image");

        let exposures = self.frames_per_file();
        if header.height % exposures != 0 {
            return Err(ImageError::Dimension {
                width: Some(header.width),
                height: Some(header.height),
            });
        }
        let rows = header.height / exposures;
        pixels
            .chunks_exact(rows * header.width)
            .map(|exposure| FrameBuffer::new(header.width, rows, 1, 16, SampleBuffer::U16(exposure.to_vec())))
            .collect()
    }
}

impl RawImageReader for B16Decoder {
    fn read_frames(&self, data: &[u8], range: Option<FrameRange>, policy: RangePolicy) -> Result<DecodedFrames> {
        let frames = self.decode(data)?;
        let available = frames.len();
        let (window, clipped) = match range {
            Some(requested) => requested.resolve(available, policy)?,
            None => (FrameRange { start: 0, end: available }, false),
        };
        if clipped {
            warn!(available, "Frame range clipped to the exposures in the B16 file");
        }
        Ok(DecodedFrames {
            frames: frames[window.start..window.end].to_vec(),
            available,
            first_frame: window.start,
            clipped,
            bayer_pattern: None,
        })
    }
}

/// Builds a B16 file around `pixels`, for tests and benches.
pub fn encode_b16(width: usize, height: usize, pixels: &[u16]) -> Vec<u8> {
    let header_length = 128usize;
    let file_size = header_length + pixels.len() * 2;
    let mut out = Vec::with_capacity(file_size);
    out.extend_from_slice(B16_MAGIC);
    for field in [file_size, header_length, width, height] {
        out.extend_from_slice(&(field as i32).to_le_bytes());
    }
    out.resize(header_length, 0);
    for px in pixels {
        out.extend_from_slice(&px.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(width: usize, height: usize) -> (Vec<u16>, Vec<u8>) {
        let pixels: Vec<u16> = (0..width * height).map(|i| (i * 1000) as u16).collect();
        let file = encode_b16(width, height, &pixels);
        (pixels, file)
    }

    #[test]
    fn test_parse_header() {
        let (_, file) = sample(6, 4);
        let header = B16Header::parse(&file).unwrap();
        assert_eq!(
            header,
            B16Header {
                file_size: file.len(),
                header_length: 128,
                width: 6,
                height: 4
            }
        );
    }

    #[test]
    fn test_single_exposure() {
        let (pixels, file) = sample(5, 3);
        let decoder = B16Decoder::new(false);
        let frames = decoder.decode(&file).unwrap();
        assert_eq!(frames.len(), decoder.frames_per_file());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].shape(), vec![3, 5]);
        assert_eq!(frames[0].samples(), &SampleBuffer::U16(pixels));
    }

    #[test]
    fn test_double_exposure_splits_height() {
        let (pixels, file) = sample(4, 6);
        let decoder = B16Decoder::new(true);
        let frames = decoder.decode(&file).unwrap();
        assert_eq!(frames.len(), decoder.frames_per_file());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].shape(), vec![3, 4]);
        assert_eq!(frames[0].samples(), &SampleBuffer::U16(pixels[..12].to_vec()));
        assert_eq!(frames[1].samples(), &SampleBuffer::U16(pixels[12..].to_vec()));
    }

    #[test]
    fn test_double_exposure_odd_height() {
        let (_, file) = sample(4, 5);
        assert!(matches!(
            B16Decoder::new(true).decode(&file),
            Err(ImageError::Dimension { height: Some(5), .. })
        ));
    }

    #[test]
    fn test_bad_magic_and_short_header() {
        let (_, mut file) = sample(2, 2);
        assert!(matches!(B16Header::parse(&file[..10]), Err(ImageError::InvalidHeader(_))));
        file[0] = b'X';
        assert!(matches!(B16Header::parse(&file), Err(ImageError::InvalidHeader(_))));
    }

    #[test]
    fn test_truncated_pixels() {
        let (_, file) = sample(8, 8);
        let short = &file[..file.len() - 3];
        assert!(matches!(
            B16Decoder::new(false).decode(short),
            Err(ImageError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_reader_selects_exposure() {
        let (pixels, file) = sample(2, 4);
        let decoder = B16Decoder::new(true);
        let second = decoder
            .read_frames(&file, Some(FrameRange::new(1, 2).unwrap()), RangePolicy::Strict)
            .unwrap();
        assert_eq!(second.available, 2);
        assert_eq!(second.first_frame, 1);
        assert_eq!(second.frames[0].samples(), &SampleBuffer::U16(pixels[4..].to_vec()));
    }
}
