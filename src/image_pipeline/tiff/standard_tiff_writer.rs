use std::io::{Cursor, Write};

use tiff::encoder::colortype::{Gray8, Gray16, Gray32, Gray64, RGB8, RGB16, RGB32, RGB64};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Predictor;
use tracing::debug;

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleBuffer};
use crate::image_pipeline::tiff::types::{ExportConfig, TiffCompression};
use crate::image_pipeline::tiff::writer::TiffWriter;

pub struct StandardTiffWriter;

fn encoder_compression(compression: TiffCompression) -> Compression {
    match compression {
        TiffCompression::None => Compression::Uncompressed,
        TiffCompression::Lzw => Compression::Lzw,
        TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
        TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
        TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
    }
}

impl TiffWriter for StandardTiffWriter {
    fn write_frame(&self, frame: &FrameBuffer, output: &mut dyn Write, config: &ExportConfig) -> Result<()> {
        debug!(
            "Encoding TIFF image: {}x{}x{} {:?}",
            frame.width(),
            frame.height(),
            frame.channels(),
            frame.dtype()
        );

        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| ImageError::EncodeError(e.to_string()))?
            .with_compression(encoder_compression(config.compression));

        if let Some(predictor_val) = config.predictor {
            let predictor = match predictor_val {
                2 => Predictor::Horizontal,
                _ => Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        let (width, height) = (frame.width() as u32, frame.height() as u32);
        let rgb = frame.channels() == 3;
        let written = match frame.samples() {
            SampleBuffer::U8(data) if rgb => encoder.write_image::<RGB8>(width, height, data),
            SampleBuffer::U8(data) => encoder.write_image::<Gray8>(width, height, data),
            SampleBuffer::U16(data) if rgb => encoder.write_image::<RGB16>(width, height, data),
            SampleBuffer::U16(data) => encoder.write_image::<Gray16>(width, height, data),
            SampleBuffer::U32(data) if rgb => encoder.write_image::<RGB32>(width, height, data),
            SampleBuffer::U32(data) => encoder.write_image::<Gray32>(width, height, data),
            SampleBuffer::U64(data) if rgb => encoder.write_image::<RGB64>(width, height, data),
            SampleBuffer::U64(data) => encoder.write_image::<Gray64>(width, height, data),
        };
        written.map_err(|e| ImageError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete");
        Ok(())
    }
}
