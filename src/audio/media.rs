use crate::encode::process::run_captured;
use crate::foundation::error::{SyncError, SyncResult};
use std::path::Path;
use std::process::Command;

/// Internal mixing sample rate used across decode/mix/encode.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Channel count of every decoded clip and of the mix.
pub const MIX_CHANNELS: u16 = 2;

#[derive(Clone, Debug, PartialEq)]
/// Decoded interleaved floating-point PCM.
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved `f32` PCM samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Empty buffer at the mix format.
    pub fn empty() -> Self {
        Self {
            sample_rate: MIX_SAMPLE_RATE,
            channels: MIX_CHANNELS,
            interleaved_f32: Vec::new(),
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.interleaved_f32.len() / usize::from(self.channels.max(1))
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Media duration lookup.
pub trait MediaProbe {
    /// Duration of the media at `path`, in seconds.
    fn duration_secs(&self, path: &Path) -> SyncResult<f64>;
}

/// Decoder from an audio file to the mix format.
pub trait ClipDecoder {
    /// Decode `path` to [`MIX_SAMPLE_RATE`] stereo interleaved `f32`.
    fn decode(&self, path: &Path) -> SyncResult<AudioPcm>;
}

/// [`MediaProbe`] backed by the system `ffprobe`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfprobeProbe;

impl MediaProbe for FfprobeProbe {
    fn duration_secs(&self, path: &Path) -> SyncResult<f64> {
        probe_duration_secs(path)
    }
}

/// [`ClipDecoder`] backed by the system `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegDecoder;

impl ClipDecoder for FfmpegDecoder {
    fn decode(&self, path: &Path) -> SyncResult<AudioPcm> {
        decode_audio_f32_stereo(path, MIX_SAMPLE_RATE)
    }
}

/// Container duration reported by `ffprobe`, in seconds.
pub fn probe_duration_secs(path: &Path) -> SyncResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: ProbeFormat,
    }

    if !path.exists() {
        return Err(SyncError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut cmd = Command::new("ffprobe");
    cmd.args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path);
    let out = run_captured(&mut cmd)?;

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| SyncError::malformed(path.display().to_string(), format!("ffprobe json: {e}")))?;
    let secs = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| {
            SyncError::malformed(path.display().to_string(), "ffprobe reported no duration")
        })?;
    Ok(secs)
}

/// Frame size of the first video stream reported by `ffprobe`.
pub fn probe_video_size(path: &Path) -> SyncResult<(u32, u32)> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    if !path.exists() {
        return Err(SyncError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut cmd = Command::new("ffprobe");
    cmd.args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path);
    let out = run_captured(&mut cmd)?;
    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| SyncError::malformed(path.display().to_string(), format!("ffprobe json: {e}")))?;
    parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .and_then(|s| Some((s.width?, s.height?)))
        .filter(|(w, h)| *w > 0 && *h > 0)
        .ok_or_else(|| SyncError::malformed(path.display().to_string(), "no sized video stream"))
}

/// Decode up to `max_frames` RGBA8 frames of `path` at `fps`, scaled to `width`x`height`.
pub fn decode_video_frames_rgba8(
    path: &Path,
    width: u32,
    height: u32,
    fps: f64,
    max_frames: u32,
) -> SyncResult<Vec<Vec<u8>>> {
    if max_frames == 0 || width == 0 || height == 0 {
        return Ok(Vec::new());
    }
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vf",
            &format!("fps={fps},scale={width}:{height}"),
            "-frames:v",
            &max_frames.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ]);
    let out = run_captured(&mut cmd)?;

    let frame_len = width as usize * height as usize * 4;
    if !out.stdout.len().is_multiple_of(frame_len) {
        return Err(SyncError::validation(format!(
            "decoded video batch has invalid size: got {} bytes, expected multiples of {frame_len}",
            out.stdout.len()
        )));
    }
    Ok(out.stdout.chunks_exact(frame_len).map(<[u8]>::to_vec).collect())
}

/// Decode audio from a media file to stereo interleaved `f32` PCM.
///
/// A file without an audio stream decodes to empty PCM.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> SyncResult<AudioPcm> {
    if !path.exists() {
        return Err(SyncError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &MIX_CHANNELS.to_string(),
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ]);
    let out = match run_captured(&mut cmd) {
        Ok(out) => out,
        Err(SyncError::EncoderProcessFailure { stderr, .. })
            if stderr.contains("matches no streams")
                || stderr.contains("does not contain any stream") =>
        {
            return Ok(AudioPcm {
                sample_rate,
                ..AudioPcm::empty()
            });
        }
        Err(e) => return Err(e),
    };

    Ok(AudioPcm {
        sample_rate,
        channels: MIX_CHANNELS,
        interleaved_f32: pcm_from_f32le(&out.stdout)?,
    })
}

/// Interpret little-endian `f32` bytes as samples.
pub fn pcm_from_f32le(bytes: &[u8]) -> SyncResult<Vec<f32>> {
    if !bytes.len().is_multiple_of(4) {
        return Err(SyncError::validation(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
#[path = "../../tests/unit/audio/media.rs"]
mod tests;
