use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, info_span, instrument, warn};

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::FrameBuffer;
use crate::image_pipeline::common::pool::worker_pool;
use crate::image_pipeline::debayer::types::CfaPattern;
use crate::image_pipeline::raw::{
    FrameRange, RangePolicy, RawFormatSpec, RawImageReader, RawLoaderReader, read_input, reader_for,
};
use crate::image_pipeline::sequence::file_order::{InputKind, list_inputs};
use crate::image_pipeline::sequence::image_sequence::ImageSequence;
use crate::image_pipeline::sequence::timing::{LoadStep, LoadTimings};
use crate::image_pipeline::sequence::types::{FailedUnit, FailureMode, SequenceConfig};
use crate::image_pipeline::tiff::StandardTiffReader;

type SharedReader = Box<dyn RawImageReader + Send + Sync>;

/// Anything that turns an input path into a sequence.
pub trait SequenceSource {
    fn load(&self, path: &Path) -> Result<ImageSequence>;
}

/// Frames of one decoded unit, tagged with the unit's index for re-ordering.
struct UnitOutput {
    index: usize,
    frames: Vec<FrameBuffer>,
    bayer_pattern: Option<CfaPattern>,
}

/// Loads a file or directory into an [`ImageSequence`].
///
/// Packed `.raw` dumps must be a single file, with the range selecting frames inside
/// it. For sequences of B16, TIFF or camera RAW files the range selects files, and
/// files are decoded on a pool of `io_threads` workers.
pub struct SequenceAssembler {
    config: SequenceConfig,
}

impl SequenceAssembler {
    pub fn new(config: SequenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<ImageSequence> {
        let path = path.as_ref();
        let mut timings = LoadTimings::new();
        info!("Reading {}", path.display());

        let (kind, files) = timings.time(LoadStep::ListInputs, || list_inputs(path))?;
        info!(files = files.len(), ?kind, "Found input files");

        let (spec, reader) = self.reader_for_kind(kind)?;
        let decoded = if let Some(RawFormatSpec::Packed(_)) = spec {
            if files.len() != 1 {
                return Err(ImageError::AmbiguousInput(format!(
                    "{} packed .raw files found at {}; pass exactly one",
                    files.len(),
                    path.display()
                )));
            }
            timings.time(LoadStep::Decode, || self.decode_single(&files[0], reader.as_ref()))?
        } else if files.len() == 1 {
            timings.time(LoadStep::Decode, || self.decode_single(&files[0], reader.as_ref()))?
        } else {
            timings.time(LoadStep::Decode, || self.decode_batch(&files, reader.as_ref()))?
        };

        let sequence = {
            let _span = info_span!("stack_frames", frames = decoded.frames.len()).entered();
            let collapse = self.config.monochrome
                && matches!(kind, InputKind::Tiff | InputKind::CameraRaw)
                && decoded.frames.iter().any(|f| f.channels() == 3);
            let (frames, pattern) = if collapse {
                info!("Collapsing RGB stills to monochrome");
                let frames = decoded.frames.iter().map(FrameBuffer::to_monochrome).collect();
                (frames, None)
            } else {
                (decoded.frames, decoded.bayer_pattern)
            };
            timings.time(LoadStep::Stack, || ImageSequence::from_frames(frames))?
                .with_bayer_pattern(pattern)
                .with_failures(decoded.failed)
                .with_clipped(decoded.clipped)
        };

        let total = timings.total().as_secs_f64();
        info!(
            shape = ?sequence.shape(),
            dtype = ?sequence.dtype(),
            range = ?sequence.intensity_range(),
            mib_per_sec = ?timings.throughput_mib_s(sequence.byte_size()),
            "Read {:.1} MiB in {:.3} sec",
            sequence.byte_size() as f64 / 1024.0 / 1024.0,
            total
        );
        timings.log_summary();
        Ok(sequence)
    }

    fn reader_for_kind(&self, kind: InputKind) -> Result<(Option<RawFormatSpec>, SharedReader)> {
        let options = self.config.format_options();
        match kind {
            InputKind::PackedRaw => {
                let rawtype = self.config.rawtype.as_deref().ok_or_else(|| {
                    ImageError::UnsupportedFormat(
                        "packed .raw input needs a rawtype identifier".to_string(),
                    )
                })?;
                let spec = RawFormatSpec::from_identifier(rawtype, &options)?;
                info!(format = %spec, "Resolved rawtype");
                let reader = reader_for(&spec, self.config.width, self.config.height)?;
                Ok((Some(spec), reader))
            }
            InputKind::B16 => {
                if let Some(rawtype) = &self.config.rawtype {
                    if !rawtype.to_ascii_lowercase().starts_with("b16") {
                        warn!(rawtype = %rawtype, "Ignoring rawtype for B16 input");
                    }
                }
                let spec = RawFormatSpec::B16 {
                    double_exposure: options.double_exposure,
                };
                Ok((Some(spec), reader_for(&spec, None, None)?))
            }
            InputKind::Tiff => Ok((None, Box::new(StandardTiffReader))),
            InputKind::CameraRaw => Ok((None, Box::new(RawLoaderReader))),
        }
    }

    /// One file; the range selects frames inside it.
    fn decode_single(&self, path: &Path, reader: &(dyn RawImageReader + Send + Sync)) -> Result<Decoded> {
        let data = read_input(path)?;
        let decoded = {
            let _span = info_span!("decode_raw", bytes = data.len()).entered();
            reader.read_frames(&data, self.config.frames, self.config.range_policy)?
        };
        info!(
            frames = decoded.len(),
            available = decoded.available,
            first = decoded.first_frame,
            "Decoded single input file"
        );
        Ok(Decoded {
            frames: decoded.frames,
            bayer_pattern: decoded.bayer_pattern,
            failed: Vec::new(),
            clipped: decoded.clipped,
        })
    }

    /// Many files; the range selects files, each decoded whole on the worker pool.
    fn decode_batch(&self, files: &[PathBuf], reader: &(dyn RawImageReader + Send + Sync)) -> Result<Decoded> {
        let (window, clipped) = match self.config.frames {
            Some(requested) => {
                let (window, clipped) = requested.resolve(files.len(), self.config.range_policy)?;
                if clipped {
                    warn!(
                        requested_end = requested.end,
                        available = files.len(),
                        "Frame range clipped to the files present"
                    );
                }
                (window, clipped)
            }
            None => (FrameRange { start: 0, end: files.len() }, false),
        };
        let selected = &files[window.start..window.end];

        let pool = worker_pool(self.config.io_threads, selected.len())?;
        info!(
            units = selected.len(),
            threads = pool.current_num_threads(),
            "Decoding files in parallel"
        );

        let decode_unit = |offset: usize, path: &PathBuf| -> Result<UnitOutput> {
            let index = window.start + offset;
            read_input(path)
                .and_then(|data| reader.read_frames(&data, None, RangePolicy::Strict))
                .map(|decoded| UnitOutput {
                    index,
                    frames: decoded.frames,
                    bayer_pattern: decoded.bayer_pattern,
                })
                .map_err(|source| ImageError::Unit {
                    index,
                    path: path.clone(),
                    source: Box::new(source),
                })
        };

        let (mut units, failed) = match self.config.failure_mode {
            FailureMode::FailFast => {
                let units = pool.install(|| {
                    selected
                        .par_iter()
                        .enumerate()
                        .map(|(offset, path)| decode_unit(offset, path))
                        .collect::<Result<Vec<_>>>()
                })?;
                (units, Vec::new())
            }
            FailureMode::BestEffort => {
                let results: Vec<Result<UnitOutput>> = pool.install(|| {
                    selected
                        .par_iter()
                        .enumerate()
                        .map(|(offset, path)| decode_unit(offset, path))
                        .collect()
                });
                let mut units = Vec::with_capacity(results.len());
                let mut failed = Vec::new();
                for result in results {
                    match result {
                        Ok(unit) => units.push(unit),
                        Err(ImageError::Unit { index, path, source }) => {
                            warn!(index, path = %path.display(), error = %source, "Skipping unit");
                            failed.push(FailedUnit {
                                index,
                                path,
                                error: source.to_string(),
                            });
                        }
                        Err(other) => return Err(other),
                    }
                }
                if units.is_empty() {
                    return Err(ImageError::DecodeError(format!(
                        "all {} units failed to decode",
                        failed.len()
                    )));
                }
                (units, failed)
            }
        };
        units.sort_by_key(|unit| unit.index);

        let bayer_pattern = units.first().and_then(|unit| unit.bayer_pattern);
        let frames = units.into_iter().flat_map(|unit| unit.frames).collect();
        Ok(Decoded {
            frames,
            bayer_pattern,
            failed,
            clipped,
        })
    }
}

impl SequenceSource for SequenceAssembler {
    fn load(&self, path: &Path) -> Result<ImageSequence> {
        self.open(path)
    }
}

/// Frames gathered from every unit of one input, before stacking.
struct Decoded {
    frames: Vec<FrameBuffer>,
    bayer_pattern: Option<CfaPattern>,
    failed: Vec<FailedUnit>,
    clipped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::frame::SampleBuffer;
    use crate::image_pipeline::raw::b16::encode_b16;
    use crate::image_pipeline::raw::{BitDepth, PackingOrder};
    use crate::image_pipeline::raw::unpack::pack_samples;

    fn write_b16(dir: &Path, name: &str, width: usize, height: usize, base: u16) {
        let pixels: Vec<u16> = (0..width * height).map(|i| base + i as u16).collect();
        std::fs::write(dir.join(name), encode_b16(width, height, &pixels)).unwrap();
    }

    #[test]
    fn test_b16_directory_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        write_b16(dir.path(), "piv_10.b16", 2, 4, 1000);
        write_b16(dir.path(), "piv_2.b16", 2, 4, 200);
        write_b16(dir.path(), "piv_1.b16", 2, 4, 100);

        let assembler = SequenceAssembler::new(SequenceConfig::builder().io_threads(2).build());
        let seq = assembler.open(dir.path()).unwrap();
        // three files, two exposures each
        assert_eq!(seq.shape(), vec![6, 2, 2]);
        assert_eq!(seq.frames()[0].sample(0, 0, 0), Some(100));
        assert_eq!(seq.frames()[1].sample(0, 0, 0), Some(104));
        assert_eq!(seq.frames()[2].sample(0, 0, 0), Some(200));
        assert_eq!(seq.frames()[4].sample(0, 0, 0), Some(1000));
    }

    #[test]
    fn test_b16_range_selects_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            write_b16(dir.path(), &format!("f{i}.b16"), 2, 2, i * 10);
        }
        let config = SequenceConfig::builder()
            .double_exposure(false)
            .frames(Some(FrameRange::new(1, 3).unwrap()))
            .build();
        let seq = SequenceAssembler::new(config).open(dir.path()).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frames()[0].sample(0, 0, 0), Some(10));
    }

    #[test]
    fn test_fail_fast_names_unit() {
        let dir = tempfile::tempdir().unwrap();
        write_b16(dir.path(), "a1.b16", 2, 2, 0);
        std::fs::write(dir.path().join("a2.b16"), b"not a b16 file at all").unwrap();
        write_b16(dir.path(), "a3.b16", 2, 2, 0);

        let err = SequenceAssembler::new(SequenceConfig::default())
            .open(dir.path())
            .unwrap_err();
        match err {
            ImageError::Unit { index, path, .. } => {
                assert_eq!(index, 1);
                assert!(path.ends_with("a2.b16"));
            }
            other => panic!("expected unit error, got {other}"),
        }
    }

    #[test]
    fn test_best_effort_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_b16(dir.path(), "a1.b16", 2, 2, 0);
        std::fs::write(dir.path().join("a2.b16"), b"PCO-").unwrap();
        write_b16(dir.path(), "a3.b16", 2, 2, 5);

        let config = SequenceConfig::builder()
            .failure_mode(FailureMode::BestEffort)
            .build();
        let seq = SequenceAssembler::new(config).open(dir.path()).unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.failed().len(), 1);
        assert_eq!(seq.failed()[0].index, 1);
        assert_eq!(seq.frames()[2].sample(0, 0, 0), Some(5));
    }

    #[test]
    fn test_packed_raw_needs_rawtype_and_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = pack_samples(&[1, 2, 3, 4], BitDepth::Twelve, PackingOrder::Standard);
        std::fs::write(dir.path().join("one.raw"), &data).unwrap();

        let err = SequenceAssembler::new(SequenceConfig::default())
            .open(dir.path())
            .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat(_)));

        std::fs::write(dir.path().join("two.raw"), &data).unwrap();
        let config = SequenceConfig::builder()
            .rawtype("chronos14_mono_12bit_noheader")
            .dimensions(2, 2)
            .build();
        let err = SequenceAssembler::new(config).open(dir.path()).unwrap_err();
        assert!(matches!(err, ImageError::AmbiguousInput(_)));
    }

    fn write_rgb_tiff(dir: &Path, name: &str, value: u8) {
        use crate::image_pipeline::tiff::{ExportConfig, StandardTiffWriter, TiffWriter};
        let frame = FrameBuffer::new(2, 2, 3, 8, SampleBuffer::U8(vec![value; 12])).unwrap();
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        StandardTiffWriter.write_frame(&frame, &mut file, &ExportConfig::default()).unwrap();
    }

    #[test]
    fn test_rgb_stills_collapse_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_tiff(dir.path(), "a.tif", 10);
        write_rgb_tiff(dir.path(), "b.tif", 20);

        let seq = SequenceAssembler::new(SequenceConfig::default()).open(dir.path()).unwrap();
        assert_eq!(seq.shape(), vec![2, 2, 2]);
        assert_eq!(seq.frames()[1].sample(0, 0, 0), Some(60));

        let keep = SequenceConfig::builder().monochrome(false).build();
        let seq = SequenceAssembler::new(keep).open(dir.path()).unwrap();
        assert_eq!(seq.shape(), vec![2, 2, 2, 3]);
    }

    #[test]
    fn test_packed_rgb_is_not_collapsed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("rgb.raw");
        std::fs::write(&file, vec![7u8; 2 * 2 * 3 * 2]).unwrap();

        let config = SequenceConfig::builder()
            .rawtype("raw_8bit_rgb")
            .dimensions(2, 2)
            .build();
        let seq = SequenceAssembler::new(config).open(&file).unwrap();
        assert_eq!(seq.shape(), vec![2, 2, 2, 3]);
    }

    #[test]
    fn test_packed_colour_records_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let codes: Vec<u16> = (0..48).collect();
        let file = dir.path().join("shot.raw");
        std::fs::write(&file, pack_samples(&codes, BitDepth::Twelve, PackingOrder::Standard)).unwrap();

        let config = SequenceConfig::builder()
            .rawtype("chronos14_color_12bit_noheader")
            .dimensions(4, 2)
            .frames(Some(FrameRange::new(2, 10).unwrap()))
            .range_policy(RangePolicy::Clip)
            .build();
        let seq = SequenceAssembler::new(config).open(&file).unwrap();
        assert_eq!(seq.len(), 4);
        assert!(seq.clipped());
        assert_eq!(seq.bayer_pattern(), Some(CfaPattern::Grbg));
        assert_eq!(seq.frames()[0].sample(0, 0, 0), Some(16));
    }
}
