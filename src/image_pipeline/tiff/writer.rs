use std::io::Write;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::common::frame::FrameBuffer;
use crate::image_pipeline::tiff::types::ExportConfig;

pub trait TiffWriter {
    fn write_frame(&self, frame: &FrameBuffer, output: &mut dyn Write, config: &ExportConfig) -> Result<()>;
}
