//! Debayering module for converting Bayer mosaics to RGB

pub mod cpu_debayer;
pub mod cubic_debayer;
pub mod types;

pub use cpu_debayer::CpuDebayer;
pub use cubic_debayer::{CUBIC_MIN_SIDE, CubicDebayer};
pub use types::{CfaColor, CfaPattern, DemosaicMethod};

use rayon::prelude::*;
use tracing::{info, instrument};

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleDtype};
use crate::image_pipeline::common::pool::worker_pool;

fn check_mosaic(frame: &FrameBuffer, method: DemosaicMethod) -> Result<()> {
    let (width, height, channels) = (frame.width(), frame.height(), frame.channels());
    let shape_error = |reason: &str| ImageError::Shape {
        width,
        height,
        channels,
        reason: reason.to_string(),
    };

    if channels != 1 {
        return Err(shape_error("demosaicing needs a single-channel mosaic"));
    }
    if !matches!(frame.dtype(), SampleDtype::U8 | SampleDtype::U16) {
        return Err(ImageError::UnsupportedDepth(format!(
            "{:?} mosaic (demosaicing takes u8 or u16)",
            frame.dtype()
        )));
    }
    match method {
        DemosaicMethod::Downsample if width % 2 != 0 || height % 2 != 0 => {
            Err(shape_error("downsampling needs even width and height"))
        }
        DemosaicMethod::Cubic if width < CUBIC_MIN_SIDE || height < CUBIC_MIN_SIDE => {
            Err(shape_error("cubic demosaicing needs at least 4x4 pixels"))
        }
        _ if width < 2 || height < 2 => Err(shape_error("demosaicing needs at least 2x2 pixels")),
        _ => Ok(()),
    }
}

/// Rebuilds RGB from a single-channel mosaic. The output keeps the input's dtype
/// and bit depth; `Downsample` halves both dimensions.
#[instrument(skip(frame), fields(width = frame.width(), height = frame.height()))]
pub fn demosaic(frame: &FrameBuffer, pattern: CfaPattern, method: DemosaicMethod) -> Result<FrameBuffer> {
    check_mosaic(frame, method)?;
    let cpu = CpuDebayer::new(pattern);
    match method {
        DemosaicMethod::Nearest => cpu.nearest(frame),
        DemosaicMethod::Bilinear => cpu.bilinear(frame),
        DemosaicMethod::SmoothHue => cpu.smooth_hue(frame),
        DemosaicMethod::Downsample => cpu.downsample(frame),
        DemosaicMethod::Cubic => CubicDebayer::new(pattern).process(frame),
    }
}

/// Demosaics every frame on a pool of `io_threads` workers, keeping frame order.
/// Stops at the first failing frame.
pub fn demosaic_all(
    frames: &[FrameBuffer],
    pattern: CfaPattern,
    method: DemosaicMethod,
    io_threads: usize,
) -> Result<Vec<FrameBuffer>> {
    info!(
        frames = frames.len(),
        %pattern,
        %method,
        "Demosaicing sequence"
    );
    let pool = worker_pool(io_threads, frames.len())?;
    pool.install(|| {
        frames
            .par_iter()
            .map(|frame| demosaic(frame, pattern, method))
            .collect()
    })
}
