//! TIFF module
//!
//! This module provides still TIFF reading and TIFF writing with various compression options.

mod reader;
mod standard_tiff_writer;
pub mod types;
mod writer;

pub use reader::StandardTiffReader;
pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{ExportConfig, ExportConfigBuilder, TiffCompression};
pub use writer::TiffWriter;
