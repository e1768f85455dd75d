//! RAW image decoding module
//!
//! Packed sensor dumps, PCO B16 files and camera RAW stills, all decoded into
//! [`FrameBuffer`](crate::image_pipeline::common::FrameBuffer)s.

pub mod b16;
pub mod decoder;
pub mod format;
mod rawloader_reader;
mod reader;
pub mod types;
pub mod unpack;

pub use b16::{B16Decoder, B16Header};
pub use decoder::RawFrameDecoder;
pub use format::{FormatOptions, PackedRawSpec, RawFormatSpec};
pub use rawloader_reader::{RawLoaderReader, RawStill};
pub use reader::{RawImageReader, decode_file, read_input, reader_for};
pub use types::{BitDepth, ColorLayout, DecodedFrames, FrameRange, PackingOrder, RangePolicy};
pub use unpack::BitUnpacker;
