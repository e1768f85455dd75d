use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use scicam_rs::image_pipeline::{
    CfaPattern, DemosaicMethod, ExportConfig, FailureMode, FrameRange, RangePolicy, RawToTiffPipeline,
    SequenceConfig, TiffCompression,
};
use scicam_rs::logger;

use tracing::{error, info};

/// Converts scientific-camera RAW dumps, PCO B16 files and still sequences to numbered TIFFs.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input file or directory.
    input: PathBuf,
    /// Directory the TIFFs are written to.
    #[arg(short, long, default_value = "tiff_out")]
    output: PathBuf,
    /// RAW format identifier, e.g. chronos14_mono_12bit_noheader.
    #[arg(long)]
    rawtype: Option<String>,
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    /// Half-open frame range `start:end`.
    #[arg(long)]
    frames: Option<String>,
    /// Serve the available frames when the range runs past the end.
    #[arg(long, default_value_t = false)]
    clip_range: bool,
    /// Bytes to skip before the first frame.
    #[arg(long, default_value_t = 0)]
    start_offset: usize,
    /// 12-bit data written by Chronos firmware 0.2.
    #[arg(long, default_value_t = false)]
    legacy_packing: bool,
    /// B16 files hold a single exposure.
    #[arg(long, default_value_t = false)]
    single_exposure: bool,
    /// Worker threads for decoding and demosaicing.
    #[arg(long, default_value_t = 8)]
    threads: usize,
    /// Skip files that fail to decode.
    #[arg(long, default_value_t = false)]
    best_effort: bool,
    /// Keep RGB still images in colour instead of summing them into one channel.
    #[arg(long, default_value_t = false)]
    keep_rgb: bool,
    /// Bayer tile override (RGGB, GBRG, GRBG, BGGR).
    #[arg(long)]
    pattern: Option<String>,
    /// Demosaic before writing (nearest, bilinear, smooth_hue, cubic, downsample).
    #[arg(long)]
    method: Option<String>,
    /// none, lzw, deflate_fast, deflate_balanced or deflate_best.
    #[arg(long, default_value = "none")]
    compression: String,
    /// Output file name prefix.
    #[arg(long, default_value = "frame")]
    prefix: String,
    /// Replace existing output files.
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

fn parse_frames(arg: &str) -> anyhow::Result<FrameRange> {
    let Some((start, end)) = arg.split_once(':') else {
        bail!("frame range `{arg}` must look like start:end");
    };
    let start = start.trim().parse().with_context(|| format!("bad range start in `{arg}`"))?;
    let end = end.trim().parse().with_context(|| format!("bad range end in `{arg}`"))?;
    Ok(FrameRange::new(start, end)?)
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    info!("Starting scicam...");

    let frames = args.frames.as_deref().map(parse_frames).transpose()?;
    let pattern = args.pattern.as_deref().map(str::parse::<CfaPattern>).transpose()?;
    let method = args.method.as_deref().map(str::parse::<DemosaicMethod>).transpose()?;
    let compression: TiffCompression = args.compression.parse()?;

    let sequence = SequenceConfig::builder()
        .width(args.width)
        .height(args.height)
        .frames(frames)
        .range_policy(if args.clip_range { RangePolicy::Clip } else { RangePolicy::Strict })
        .start_offset(args.start_offset)
        .legacy_packing(args.legacy_packing)
        .double_exposure(!args.single_exposure)
        .io_threads(args.threads)
        .failure_mode(if args.best_effort { FailureMode::BestEffort } else { FailureMode::FailFast })
        .monochrome(!args.keep_rgb)
        .bayer_pattern(pattern);
    let sequence = match args.rawtype {
        Some(rawtype) => sequence.rawtype(rawtype),
        None => sequence,
    }
    .build();

    let export = ExportConfig::builder()
        .compression(compression)
        .debayer(method)
        .bayer_pattern(pattern)
        .io_threads(args.threads)
        .prefix(args.prefix)
        .overwrite(args.overwrite)
        .build();

    let pipeline = RawToTiffPipeline::new(sequence, export);
    info!("Compression: {:?}", pipeline.config().compression);
    info!(
        "Debayering: {}",
        match pipeline.config().debayer {
            Some(method) => method.as_str(),
            None => "disabled",
        }
    );

    match pipeline.convert_path(&args.input, &args.output) {
        Ok(paths) => {
            info!("Conversion successful! Wrote {} files", paths.len());
            Ok(())
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            Err(e.into())
        }
    }
}
