//! Job configuration loaded from JSON.
//!
//! Every field has a default so a partial (or empty) `{}` document is valid. Command line flags
//! override values after loading.

use crate::foundation::core::{Canvas, Fps, Rgba8};
use crate::foundation::error::{SyncError, SyncResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Root configuration document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReelConfig {
    /// Output raster settings.
    pub output: OutputConfig,
    /// Frame composition and pipeline settings.
    pub video: VideoConfig,
    /// Caption styling and segmentation policy.
    pub captions: CaptionConfig,
    /// External encoder quality settings.
    pub encoder: EncoderSettings,
}

/// Output raster settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Integer frames per second.
    pub fps: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
        }
    }
}

/// Frame composition and pipeline settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoConfig {
    /// Canvas fill color.
    pub background: Rgba8,
    /// Header/footer bar color.
    pub bar_color: Rgba8,
    /// Optional title drawn in the header bar.
    pub title: Option<String>,
    /// Watermark text; `None` disables the watermark.
    pub watermark: Option<String>,
    /// Seconds over which the chart progress ramps from 0 to 1.
    pub chart_ramp_secs: f64,
    /// Bounded queue capacity between producer and consumer.
    pub queue_capacity: usize,
    /// Maximum wait on either side of the queue before the job aborts.
    pub stall_timeout_secs: f64,
    /// Session length used when neither audio nor captions give one.
    pub fallback_duration_secs: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            background: Rgba8::rgb(30, 30, 30),
            bar_color: Rgba8::rgb(40, 40, 40),
            title: None,
            watermark: Some("Auto-generated".to_owned()),
            chart_ramp_secs: 20.0,
            queue_capacity: 100,
            stall_timeout_secs: 30.0,
            fallback_duration_secs: 60.0,
        }
    }
}

impl VideoConfig {
    /// Stall timeout as a [`Duration`]; values too large to represent saturate.
    pub fn stall_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.stall_timeout_secs.max(0.001)).unwrap_or(Duration::MAX)
    }
}

/// Caption styling and segmentation policy.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptionConfig {
    /// Font family passed to the SVG text renderer.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Caption text color.
    pub color: Rgba8,
    /// Caption band color (alpha is honoured).
    pub band_color: Rgba8,
    /// Reading speed used to derive cue durations.
    pub chars_per_sec: f64,
    /// Shortest cue duration in seconds.
    pub min_cue_secs: f64,
    /// Longest cue duration in seconds.
    pub max_cue_secs: f64,
    /// Paragraphs longer than this many characters are split on punctuation.
    pub long_paragraph_chars: usize,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_owned(),
            font_size: 40.0,
            color: Rgba8::rgb(255, 255, 255),
            band_color: Rgba8([0, 0, 0, 153]),
            chars_per_sec: 5.0,
            min_cue_secs: 1.5,
            max_cue_secs: 8.0,
            long_paragraph_chars: 50,
        }
    }
}

/// External encoder quality settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncoderSettings {
    /// x264 preset.
    pub preset: String,
    /// x264 constant rate factor.
    pub crf: u8,
    /// Audio codec used for muxing and plans.
    pub audio_codec: String,
    /// Audio bitrate, e.g. `192k`.
    pub audio_bitrate: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            preset: "medium".to_owned(),
            crf: 23,
            audio_codec: "aac".to_owned(),
            audio_bitrate: "192k".to_owned(),
        }
    }
}

impl ReelConfig {
    /// Parse a config from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> SyncResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| SyncError::config(format!("parse config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .map_err(|e| SyncError::config(format!("open config '{}': {e}", path.display())))?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check values that would make a render impossible.
    pub fn validate(&self) -> SyncResult<()> {
        Canvas::new(self.output.width, self.output.height)?;
        Fps::integer(self.output.fps)?;
        if self.video.queue_capacity == 0 {
            return Err(SyncError::config("video.queueCapacity must be >= 1"));
        }
        if !(self.video.stall_timeout_secs > 0.0) {
            return Err(SyncError::config("video.stallTimeoutSecs must be > 0"));
        }
        if Duration::try_from_secs_f64(self.video.stall_timeout_secs).is_err() {
            return Err(SyncError::config(format!(
                "video.stallTimeoutSecs {} is out of range",
                self.video.stall_timeout_secs
            )));
        }
        if !(self.video.chart_ramp_secs > 0.0) {
            return Err(SyncError::config("video.chartRampSecs must be > 0"));
        }
        if !(self.captions.chars_per_sec > 0.0) {
            return Err(SyncError::config("captions.charsPerSec must be > 0"));
        }
        if self.captions.min_cue_secs > self.captions.max_cue_secs {
            return Err(SyncError::config(
                "captions.minCueSecs must not exceed captions.maxCueSecs",
            ));
        }
        Ok(())
    }

    /// Validated canvas.
    pub fn canvas(&self) -> SyncResult<Canvas> {
        Canvas::new(self.output.width, self.output.height)
    }

    /// Validated frame rate.
    pub fn fps(&self) -> SyncResult<Fps> {
        Fps::integer(self.output.fps)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
