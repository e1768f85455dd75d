use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::image_pipeline::{
    common::error::{ImageError, Result},
    common::frame::FrameBuffer,
    sequence::{ImageSequence, SequenceAssembler, SequenceConfig, SequenceSource},
    tiff::{ExportConfig, StandardTiffWriter, TiffWriter},
};

/// Loads a sequence and writes every frame to `<prefix>_<NNNNNN>.tif`.
pub struct RawToTiffPipeline<S: SequenceSource, W: TiffWriter> {
    source: S,
    writer: W,
    config: ExportConfig,
}

impl RawToTiffPipeline<SequenceAssembler, StandardTiffWriter> {
    pub fn new(sequence: SequenceConfig, config: ExportConfig) -> Self {
        Self {
            source: SequenceAssembler::new(sequence),
            writer: StandardTiffWriter,
            config,
        }
    }
}

impl<S: SequenceSource, W: TiffWriter> RawToTiffPipeline<S, W> {
    pub fn with_custom(source: S, writer: W, config: ExportConfig) -> Self {
        Self {
            source,
            writer,
            config,
        }
    }

    #[instrument(skip(self, frame, output), fields(width = frame.width(), height = frame.height()))]
    pub fn convert(&self, frame: &FrameBuffer, output: &mut dyn Write) -> Result<()> {
        let _span = tracing::info_span!("encode_tiff").entered();
        self.writer.write_frame(frame, output, &self.config)
    }

    /// Output paths for `count` frames; fails before anything is written if one
    /// exists and overwriting is off.
    fn output_paths(&self, output_dir: &Path, count: usize) -> Result<Vec<PathBuf>> {
        let paths: Vec<PathBuf> = (0..count)
            .map(|index| output_dir.join(self.config.file_name(index)))
            .collect();
        if !self.config.overwrite {
            if let Some(existing) = paths.iter().find(|p| p.exists()) {
                return Err(ImageError::OutputWriteError(format!(
                    "{} already exists (enable overwrite to replace it)",
                    existing.display()
                )));
            }
        }
        Ok(paths)
    }

    #[instrument(skip(self, sequence, output_dir), fields(frames = sequence.len()))]
    pub fn convert_sequence(&self, sequence: &mut ImageSequence, output_dir: &Path) -> Result<Vec<PathBuf>> {
        if let Some(method) = self.config.debayer {
            let _span = tracing::info_span!("demosaic", %method).entered();
            sequence.bayer_decode(self.config.bayer_pattern, method, self.config.io_threads)?;
        }

        let paths = self.output_paths(output_dir, sequence.len())?;
        {
            let _span = tracing::info_span!("create_output_dir").entered();
            std::fs::create_dir_all(output_dir).map_err(|e| {
                ImageError::OutputWriteError(format!("{}: {}", output_dir.display(), e))
            })?;
        }

        for (frame, path) in sequence.frames().iter().zip(&paths) {
            let mut output_file = {
                let _span = tracing::info_span!("create_output_file").entered();
                std::fs::File::create(path).map_err(|e| {
                    ImageError::OutputWriteError(format!("{}: {}", path.display(), e))
                })?
            };
            self.convert(frame, &mut output_file)?;
        }

        info!(
            frames = paths.len(),
            output = %output_dir.display(),
            "Conversion complete"
        );
        Ok(paths)
    }

    #[instrument(skip(self, input, output_dir))]
    pub fn convert_path<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output_dir: Q) -> Result<Vec<PathBuf>> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();

        info!(
            input = %input.display(),
            output = %output_dir.display(),
            "Converting sequence"
        );

        let mut sequence = {
            let _span = tracing::info_span!("load_sequence").entered();
            self.source.load(input)?
        };
        self.convert_sequence(&mut sequence, output_dir)
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }
}
