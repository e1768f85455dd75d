//! Image sequence loading
//!
//! Discovers input files, dispatches them to the matching decoder and stacks the
//! decoded frames into an [`ImageSequence`].

pub mod assembler;
pub mod file_order;
mod image_sequence;
pub mod timing;
pub mod types;

pub use assembler::{SequenceAssembler, SequenceSource};
pub use file_order::{InputKind, list_inputs, natural_cmp};
pub use image_sequence::ImageSequence;
pub use timing::{LoadStep, LoadTimings, StepTimer};
pub use types::{FailedUnit, FailureMode, SequenceConfig, SequenceConfigBuilder};
