//! Image processing pipeline module
//!
//! Decoding of packed scientific-camera RAW formats, Bayer demosaicing, sequence
//! assembly and TIFF export, each in its own module.

pub mod common;
pub mod conversions;
pub mod debayer;
pub mod raw;
pub mod sequence;
pub mod tiff;

pub use common::{FrameBuffer, ImageError, Result, SampleBuffer, SampleDtype};

pub use raw::{
    BitDepth, BitUnpacker, ColorLayout, DecodedFrames, FormatOptions, FrameRange, PackedRawSpec,
    PackingOrder, RangePolicy, RawFormatSpec, RawFrameDecoder, RawImageReader, decode_file,
};

pub use debayer::{CfaPattern, DemosaicMethod, demosaic, demosaic_all};

pub use sequence::{
    FailureMode, ImageSequence, SequenceAssembler, SequenceConfig, SequenceConfigBuilder,
    SequenceSource,
};

pub use tiff::{ExportConfig, ExportConfigBuilder, StandardTiffWriter, TiffCompression, TiffWriter};

pub use conversions::RawToTiffPipeline;
