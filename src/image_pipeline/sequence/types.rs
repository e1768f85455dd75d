//! Sequence loading configuration types

use std::path::PathBuf;

use crate::image_pipeline::common::pool::DEFAULT_IO_THREADS;
use crate::image_pipeline::debayer::types::CfaPattern;
use crate::image_pipeline::raw::format::FormatOptions;
use crate::image_pipeline::raw::types::{FrameRange, RangePolicy};

/// What a batch does when one unit fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Stop dispatching and return the first failure.
    #[default]
    FailFast,
    /// Skip failing units and record them on the sequence.
    BestEffort,
}

/// A unit skipped in best-effort mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnit {
    pub index: usize,
    pub path: PathBuf,
    pub error: String,
}

/// Configuration for loading an image sequence
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceConfig {
    /// RAW format identifier; required for `.raw` dumps
    pub rawtype: Option<String>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    /// Frames to load. Counts frames inside a single file and files in a multi-file sequence
    pub frames: Option<FrameRange>,
    pub range_policy: RangePolicy,
    /// Bytes skipped before the first packed frame
    pub start_offset: usize,
    /// Unpack 12-bit Chronos data with the firmware 0.2 nibble order
    pub legacy_packing: bool,
    /// B16 files hold two exposures each
    pub double_exposure: bool,
    /// Worker threads for batch decoding
    pub io_threads: usize,
    pub failure_mode: FailureMode,
    /// Sum RGB still images (TIFF, camera RAW) into one channel
    pub monochrome: bool,
    /// Replaces the sensor's default mosaic tile
    pub bayer_pattern: Option<CfaPattern>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            rawtype: None,
            width: None,
            height: None,
            frames: None,
            range_policy: RangePolicy::Strict,
            start_offset: 0,
            legacy_packing: false,
            double_exposure: true,
            io_threads: DEFAULT_IO_THREADS,
            failure_mode: FailureMode::FailFast,
            monochrome: true,
            bayer_pattern: None,
        }
    }
}

impl SequenceConfig {
    pub fn builder() -> SequenceConfigBuilder {
        SequenceConfigBuilder::default()
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            start_offset: self.start_offset,
            legacy_packing: self.legacy_packing,
            double_exposure: self.double_exposure,
            bayer_pattern: self.bayer_pattern,
        }
    }
}

/// Builder for SequenceConfig
#[derive(Default)]
pub struct SequenceConfigBuilder {
    config: SequenceConfig,
}

impl SequenceConfigBuilder {
    pub fn rawtype(mut self, rawtype: impl Into<String>) -> Self {
        self.config.rawtype = Some(rawtype.into());
        self
    }

    pub fn dimensions(mut self, width: usize, height: usize) -> Self {
        self.config.width = Some(width);
        self.config.height = Some(height);
        self
    }

    pub fn width(mut self, width: Option<usize>) -> Self {
        self.config.width = width;
        self
    }

    pub fn height(mut self, height: Option<usize>) -> Self {
        self.config.height = height;
        self
    }

    pub fn frames(mut self, frames: Option<FrameRange>) -> Self {
        self.config.frames = frames;
        self
    }

    pub fn range_policy(mut self, policy: RangePolicy) -> Self {
        self.config.range_policy = policy;
        self
    }

    pub fn start_offset(mut self, offset: usize) -> Self {
        self.config.start_offset = offset;
        self
    }

    pub fn legacy_packing(mut self, legacy: bool) -> Self {
        self.config.legacy_packing = legacy;
        self
    }

    pub fn double_exposure(mut self, double_exposure: bool) -> Self {
        self.config.double_exposure = double_exposure;
        self
    }

    pub fn io_threads(mut self, threads: usize) -> Self {
        self.config.io_threads = threads;
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.failure_mode = mode;
        self
    }

    pub fn monochrome(mut self, monochrome: bool) -> Self {
        self.config.monochrome = monochrome;
        self
    }

    pub fn bayer_pattern(mut self, pattern: Option<CfaPattern>) -> Self {
        self.config.bayer_pattern = pattern;
        self
    }

    pub fn build(self) -> SequenceConfig {
        self.config
    }
}
