use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Truncated data: need {needed} bytes, {available} available")]
    TruncatedData { needed: usize, available: usize },

    #[error("Requested frames {start}..{end} but only {available} frames are available")]
    FrameRange {
        start: usize,
        end: usize,
        available: usize,
    },

    #[error("Invalid frame range {start}..{end}: start must be below end")]
    InvalidFrameRange { start: usize, end: usize },

    #[error("Invalid image dimensions: width={width:?}, height={height:?}")]
    Dimension {
        width: Option<usize>,
        height: Option<usize>,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid file header: {0}")]
    InvalidHeader(String),

    #[error("Invalid Bayer filter pattern: {0}")]
    InvalidFilter(String),

    #[error("Invalid demosaic method: {0}")]
    InvalidMethod(String),

    #[error("Unsupported sample depth for demosaicing: {0}")]
    UnsupportedDepth(String),

    #[error("Incompatible frame shape {width}x{height}x{channels}: {reason}")]
    Shape {
        width: usize,
        height: usize,
        channels: usize,
        reason: String,
    },

    #[error("Frame {index} does not match the sequence layout: {reason}")]
    ShapeMismatch { index: usize, reason: String },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Ambiguous input: {0}")]
    AmbiguousInput(String),

    #[error("Unit {index} ({}) failed: {source}", path.display())]
    Unit {
        index: usize,
        path: PathBuf,
        #[source]
        source: Box<ImageError>,
    },

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Failed to encode TIFF image: {0}")]
    EncodeError(String),

    #[error("Demosaic failed: {0}")]
    DemosaicError(String),

    #[error("Worker pool error: {0}")]
    ThreadPoolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImageError>;
