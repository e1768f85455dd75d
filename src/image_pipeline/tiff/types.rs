//! TIFF export configuration types

use std::str::FromStr;

use crate::image_pipeline::common::error::ImageError;
use crate::image_pipeline::common::pool::DEFAULT_IO_THREADS;
use crate::image_pipeline::debayer::types::{CfaPattern, DemosaicMethod};

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    #[default]
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

impl FromStr for TiffCompression {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" | "uncompressed" => Ok(TiffCompression::None),
            "lzw" => Ok(TiffCompression::Lzw),
            "deflate_fast" => Ok(TiffCompression::DeflateFast),
            "deflate" | "deflate_balanced" => Ok(TiffCompression::DeflateBalanced),
            "deflate_best" => Ok(TiffCompression::DeflateBest),
            _ => Err(ImageError::UnsupportedFormat(format!(
                "TIFF compression `{s}` (expected none, lzw, deflate_fast, deflate_balanced or deflate_best)"
            ))),
        }
    }
}

/// Configuration for exporting a sequence as numbered TIFFs
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Compression method to use
    pub compression: TiffCompression,
    /// Predictor value for compression (typically 2 for horizontal differencing)
    pub predictor: Option<u16>,
    /// Demosaic mosaics before writing; `None` writes the frames as they are
    pub debayer: Option<DemosaicMethod>,
    /// Mosaic tile for `debayer`; `None` uses the tile recorded when the sequence was read
    pub bayer_pattern: Option<CfaPattern>,
    /// Worker threads for demosaicing
    pub io_threads: usize,
    /// Replace existing files instead of failing
    pub overwrite: bool,
    /// Output names are `<prefix>_<NNNNNN>.tif`
    pub prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression: TiffCompression::None,
            predictor: None,
            debayer: None,
            bayer_pattern: None,
            io_threads: DEFAULT_IO_THREADS,
            overwrite: false,
            prefix: "frame".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    pub fn file_name(&self, index: usize) -> String {
        format!("{}_{:06}.tif", self.prefix, index)
    }
}

/// Builder for ExportConfig
#[derive(Default)]
pub struct ExportConfigBuilder {
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
    debayer: Option<Option<DemosaicMethod>>,
    bayer_pattern: Option<Option<CfaPattern>>,
    io_threads: Option<usize>,
    overwrite: Option<bool>,
    prefix: Option<String>,
}

impl ExportConfigBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn debayer(mut self, method: Option<DemosaicMethod>) -> Self {
        self.debayer = Some(method);
        self
    }

    pub fn bayer_pattern(mut self, pattern: Option<CfaPattern>) -> Self {
        self.bayer_pattern = Some(pattern);
        self
    }

    pub fn io_threads(mut self, threads: usize) -> Self {
        self.io_threads = Some(threads);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> ExportConfig {
        let default = ExportConfig::default();
        ExportConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
            debayer: self.debayer.unwrap_or(default.debayer),
            bayer_pattern: self.bayer_pattern.unwrap_or(default.bayer_pattern),
            io_threads: self.io_threads.unwrap_or(default.io_threads),
            overwrite: self.overwrite.unwrap_or(default.overwrite),
            prefix: self.prefix.unwrap_or(default.prefix),
        }
    }
}
