use chrono::{DateTime, Utc};

use bg_png_writer::BgPngWriter;
use ffmpeg_raw_writer::{EncoderOptions, FfmpegRawWriter};
use rgb_frame::RgbFrame;

use crate::error::SinkError;

/// Receives finished canvases from the compositor.
///
/// `ordinal` is the emission tag: the output frame number in fixed-rate
/// runs, the triggering message ordinal in skip-sampled runs.
pub trait FrameSink {
    fn write_frame(
        &mut self,
        ordinal: usize,
        stamp: DateTime<Utc>,
        canvas: &RgbFrame,
    ) -> Result<(), SinkError>;

    /// Flush and release the underlying writer. Must be called exactly
    /// once, after the last frame.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// One zero-padded PNG file per frame, written through the background
/// pool.
pub struct ImageDirSink {
    outdir: std::path::PathBuf,
    writer: BgPngWriter,
}

impl ImageDirSink {
    pub fn new<P: Into<std::path::PathBuf>>(outdir: P) -> Result<Self, SinkError> {
        let outdir = outdir.into();
        std::fs::create_dir_all(&outdir).map_err(|source| SinkError::CreateDir {
            path: outdir.display().to_string(),
            source,
        })?;
        Ok(Self {
            outdir,
            writer: BgPngWriter::new(),
        })
    }
}

impl FrameSink for ImageDirSink {
    fn write_frame(
        &mut self,
        ordinal: usize,
        _stamp: DateTime<Utc>,
        canvas: &RgbFrame,
    ) -> Result<(), SinkError> {
        let path = self.outdir.join(format!("frame_{:06}.png", ordinal));
        self.writer.write(path, canvas.clone())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.finish()?;
        Ok(())
    }
}

/// Sequential video frames through the ffmpeg pipe.
pub struct VideoSink {
    writer: Option<FfmpegRawWriter>,
}

impl VideoSink {
    pub fn open(
        path: &str,
        width: u32,
        height: u32,
        opts: &EncoderOptions,
    ) -> Result<Self, SinkError> {
        let writer = FfmpegRawWriter::new(path, width, height, opts)?;
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl FrameSink for VideoSink {
    fn write_frame(
        &mut self,
        _ordinal: usize,
        _stamp: DateTime<Utc>,
        canvas: &RgbFrame,
    ) -> Result<(), SinkError> {
        match &mut self.writer {
            Some(writer) => {
                writer.append(canvas)?;
                Ok(())
            }
            None => Err(SinkError::Video(ffmpeg_raw_writer::Error::Io(
                std::io::Error::other("video sink already finished"),
            ))),
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}
