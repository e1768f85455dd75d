//! Common utilities module
//!
//! This module contains the error type, frame storage and worker pools shared across the image pipeline.

pub mod error;
pub mod frame;
pub mod pool;

pub use error::{ImageError, Result};
pub use frame::{FrameBuffer, SampleBuffer, SampleDtype};
pub use pool::{DEFAULT_IO_THREADS, worker_pool};
