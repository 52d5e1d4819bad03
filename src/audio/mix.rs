use crate::audio::media::{AudioPcm, ClipDecoder, MIX_CHANNELS, MIX_SAMPLE_RATE};
use crate::encode::process::{ensure_parent_dir, run_captured};
use crate::foundation::core::secs_to_millis_rounded;
use crate::foundation::error::{SyncError, SyncResult};
use std::path::{Path, PathBuf};
use std::process::Command;

/// An audio file placed at an absolute start time on the output clock.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    /// Source file.
    pub file: PathBuf,
    /// Start time in seconds.
    pub start_time: f64,
}

impl AudioClip {
    /// Clip starting at `start_time` seconds.
    pub fn new(file: impl Into<PathBuf>, start_time: f64) -> Self {
        Self {
            file: file.into(),
            start_time,
        }
    }
}

/// Result of [`mix_clips`].
#[derive(Clone, Debug, PartialEq)]
pub struct MixedAudio {
    /// The mix at [`MIX_SAMPLE_RATE`], stereo, clamped to `[-1, 1]`.
    pub pcm: AudioPcm,
    /// Clips that contributed samples.
    pub clips_mixed: usize,
    /// Clips that were missing or unreadable.
    pub clips_skipped: usize,
}

/// Result of [`merge_audio_clips`].
#[derive(Clone, Debug, PartialEq)]
pub struct MergedAudio {
    /// Encoded output file.
    pub path: PathBuf,
    /// Mix duration in seconds.
    pub duration_secs: f64,
    /// Clips that contributed samples.
    pub clips_mixed: usize,
    /// Clips that were missing or unreadable.
    pub clips_skipped: usize,
}

struct Placed {
    offset_frames: usize,
    pcm: AudioPcm,
}

fn offset_frames(start_time: f64) -> usize {
    let ms = secs_to_millis_rounded(start_time);
    (ms * u64::from(MIX_SAMPLE_RATE) / 1000) as usize
}

fn to_mix_layout(pcm: AudioPcm) -> Result<AudioPcm, String> {
    if pcm.sample_rate != MIX_SAMPLE_RATE {
        return Err(format!(
            "sample rate {} Hz, expected {MIX_SAMPLE_RATE} Hz",
            pcm.sample_rate
        ));
    }
    match pcm.channels {
        2 => Ok(pcm),
        1 => Ok(AudioPcm {
            channels: MIX_CHANNELS,
            interleaved_f32: pcm.interleaved_f32.iter().flat_map(|&s| [s, s]).collect(),
            ..pcm
        }),
        n => Err(format!("{n} channels, expected mono or stereo")),
    }
}

/// Decode and overlay `clips` into one stereo buffer.
///
/// Clips are placed in start order at their millisecond-rounded offsets; overlapping samples are
/// summed and the result is clamped once at the end. Clips that fail to decode are skipped.
pub fn mix_clips(clips: &[AudioClip], decoder: &dyn ClipDecoder) -> SyncResult<MixedAudio> {
    if clips.is_empty() {
        return Err(SyncError::audio("no audio clips to merge"));
    }

    let mut ordered: Vec<&AudioClip> = clips.iter().collect();
    ordered.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut placed = Vec::with_capacity(ordered.len());
    let mut skipped = 0usize;
    for clip in ordered {
        let decoded = decoder
            .decode(&clip.file)
            .and_then(|pcm| to_mix_layout(pcm).map_err(SyncError::audio));
        match decoded {
            Ok(pcm) if pcm.frames() > 0 => placed.push(Placed {
                offset_frames: offset_frames(clip.start_time),
                pcm,
            }),
            Ok(_) => {
                tracing::warn!(path = %clip.file.display(), "skipping audio clip without samples");
                skipped += 1;
            }
            Err(err) => {
                tracing::warn!(path = %clip.file.display(), %err, "skipping unreadable audio clip");
                skipped += 1;
            }
        }
    }
    if placed.is_empty() {
        return Err(SyncError::audio(format!(
            "none of the {} audio clips could be decoded",
            clips.len()
        )));
    }

    let bed_frames = placed
        .iter()
        .map(|p| p.offset_frames + p.pcm.frames())
        .max()
        .unwrap_or(0);
    let channels = usize::from(MIX_CHANNELS);
    let bed_len = bed_frames
        .checked_mul(channels)
        .ok_or_else(|| SyncError::audio("mix length overflows"))?;
    let mut bed: Vec<f32> = Vec::new();
    bed.try_reserve_exact(bed_len).map_err(|e| {
        SyncError::audio(format!("cannot allocate {bed_len} samples for the mix: {e}"))
    })?;
    bed.resize(bed_len, 0.0);

    for p in &placed {
        let start = p.offset_frames * channels;
        let src = &p.pcm.interleaved_f32[..p.pcm.frames() * channels];
        for (dst, &s) in bed[start..start + src.len()].iter_mut().zip(src) {
            *dst += s;
        }
    }
    for s in &mut bed {
        *s = s.clamp(-1.0, 1.0);
    }

    Ok(MixedAudio {
        pcm: AudioPcm {
            sample_rate: MIX_SAMPLE_RATE,
            channels: MIX_CHANNELS,
            interleaved_f32: bed,
        },
        clips_mixed: placed.len(),
        clips_skipped: skipped,
    })
}

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub fn write_f32le(samples: &[f32], out_path: &Path) -> SyncResult<()> {
    ensure_parent_dir(out_path)?;
    let mut bytes = Vec::<u8>::with_capacity(samples.len() * 4);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        anyhow::anyhow!("failed to write mixed audio file '{}': {e}", out_path.display()).into()
    })
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Mix `clips` and encode the result to `out`.
///
/// The container/codec follows the extension of `out`; a `.f32le` target is written raw.
#[tracing::instrument(skip(clips, decoder), fields(clips = clips.len(), out = %out.display()))]
pub fn merge_audio_clips(
    clips: &[AudioClip],
    out: &Path,
    decoder: &dyn ClipDecoder,
) -> SyncResult<MergedAudio> {
    let mixed = mix_clips(clips, decoder)?;
    let duration_secs = mixed.pcm.duration_secs();

    if out.extension().is_some_and(|e| e == "f32le") {
        write_f32le(&mixed.pcm.interleaved_f32, out)?;
    } else {
        let raw = out.with_extension("mix.f32le");
        let _guard = TempFileGuard(Some(raw.clone()));
        write_f32le(&mixed.pcm.interleaved_f32, &raw)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-y",
            "-v",
            "error",
            "-f",
            "f32le",
            "-ar",
            &MIX_SAMPLE_RATE.to_string(),
            "-ac",
            &MIX_CHANNELS.to_string(),
            "-i",
        ])
        .arg(&raw)
        .arg(out);
        run_captured(&mut cmd)?;
    }

    tracing::info!(
        duration_secs,
        mixed = mixed.clips_mixed,
        skipped = mixed.clips_skipped,
        "merged audio clips"
    );
    Ok(MergedAudio {
        path: out.to_path_buf(),
        duration_secs,
        clips_mixed: mixed.clips_mixed,
        clips_skipped: mixed.clips_skipped,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
