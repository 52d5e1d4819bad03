//! Audio decoding and the single-track mix used as the video soundtrack.

/// `ffprobe`/`ffmpeg` probing and decoding.
pub mod media;
/// Clip mixing into one soundtrack.
pub mod mix;

pub use media::{AudioPcm, ClipDecoder, FfmpegDecoder, FfprobeProbe, MediaProbe};
pub use mix::{AudioClip, MergedAudio, MixedAudio, merge_audio_clips, mix_clips};
