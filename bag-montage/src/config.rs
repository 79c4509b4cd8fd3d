use serde::{Deserialize, Serialize};

use topic_source::TimePolicy;

use crate::error::{Error, Result};

/// A wrapper newtype indicating the inner type has been validated.
pub struct Valid<T>(T);

impl<T> Valid<T> {
    /// Return a reference to the validated inner type.
    pub fn valid(&self) -> &T {
        &self.0
    }
}

/// Which annotations to render into each output frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayConfig {
    /// Render the formatted UTC date and time.
    pub date: bool,
    /// Render the raw timestamp in seconds.
    pub raw: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum ExportMode {
    /// Emit frames at a fixed rate into one video file.
    FixedRate {
        /// Output frame rate; estimated from topic frequencies when
        /// absent.
        fps: Option<f64>,
        /// ffmpeg video codec name.
        codec: String,
        /// ffmpeg `-q:v` quality value.
        quality: Option<u8>,
        /// Destination video file.
        output: String,
    },
    /// Emit every Nth merged frame as a numbered image file.
    SkipSampled {
        /// Write every Nth frame.
        skip: usize,
        /// Destination directory for the image files.
        outdir: String,
    },
}

/// Everything one compositing run needs, independent of where the
/// messages come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Image topics in canvas order, left to right.
    pub topics: Vec<String>,
    /// Index of the topic whose height (after `scale`) every other topic
    /// is resized to.
    pub reference_index: usize,
    /// Global scale applied to the reference height.
    pub scale: f64,
    /// Start of the time window, seconds.
    pub start: Option<f64>,
    /// End of the time window, seconds.
    pub stop: Option<f64>,
    /// Which recorded timestamp drives synchronization.
    pub time_policy: TimePolicy,
    pub overlay: OverlayConfig,
    pub mode: ExportMode,
    /// Show a progress bar while processing.
    pub show_progress: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            topics: vec!["/camera/image_raw".to_string()],
            reference_index: 0,
            scale: 1.0,
            start: None,
            stop: None,
            time_policy: TimePolicy::default(),
            overlay: OverlayConfig::default(),
            mode: ExportMode::FixedRate {
                fps: None,
                codec: "libx264".to_string(),
                quality: None,
                output: "output.mp4".to_string(),
            },
            show_progress: false,
        }
    }
}

impl ExportConfig {
    /// Validate the configuration. All checks run before any I/O.
    pub fn validate(self) -> Result<Valid<Self>> {
        if self.topics.is_empty() {
            return Err(Error::Config("at least one topic is required".to_string()));
        }
        if self.reference_index >= self.topics.len() {
            return Err(Error::Config(format!(
                "reference index {} out of bounds for {} topics",
                self.reference_index,
                self.topics.len()
            )));
        }
        if !(self.scale > 0.0) {
            return Err(Error::Config(format!(
                "scale must be positive, not {}",
                self.scale
            )));
        }
        if let (Some(start), Some(stop)) = (self.start, self.stop) {
            if start > stop {
                return Err(Error::Config(format!(
                    "start time {} is after stop time {}",
                    start, stop
                )));
            }
        }
        match &self.mode {
            ExportMode::FixedRate { fps: Some(fps), .. } => {
                if !(*fps > 0.0) {
                    return Err(Error::Config(format!(
                        "frame rate must be positive, not {}",
                        fps
                    )));
                }
            }
            ExportMode::SkipSampled { skip, .. } => {
                if *skip < 1 {
                    return Err(Error::Config("skip must be at least 1".to_string()));
                }
            }
            _ => {}
        }
        Ok(Valid(self))
    }
}
