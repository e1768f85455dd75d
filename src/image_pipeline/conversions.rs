//! Pipeline conversions module
//!
//! This module contains orchestration logic for exporting image sequences.

mod raw_to_tiff;

pub use raw_to_tiff::RawToTiffPipeline;
