//! reelsync assembles narrated chart videos from a timeline of captions, audio and video clips.
//!
//! - Convert captions between SRT and WebVTT ([`timecode`])
//! - Build, edit and persist a [`TimelineDocument`] and derive an [`EncoderCommand`] from it
//! - Mix speech clips into one soundtrack ([`merge_audio_clips`])
//! - Render frames through a bounded producer/consumer [`RenderJob`] into a [`FrameSink`]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Audio probing, decoding and mixing.
pub mod audio;
/// Frame sinks and external encoder invocations.
pub mod encode;
/// Core types, configuration and errors.
pub mod foundation;
/// Frame composition and the render job.
pub mod render;
/// SRT/VTT time codes and caption documents.
pub mod timecode;
/// Timeline documents and encoder plans.
pub mod timeline;

pub use crate::foundation::config::{CaptionConfig, EncoderSettings, ReelConfig, VideoConfig};
pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use crate::foundation::error::{StallStage, SyncError, SyncResult};

pub use crate::audio::{AudioClip, MergedAudio, merge_audio_clips, mix_clips};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, NullSink, SinkConfig};
pub use crate::render::compose::{
    ChartSource, Corner, FrameComposer, SpeakerOverlay, StaticChart, TimelineComposer,
};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::pipeline::{JobState, RenderJob, RenderReport, session_duration};
pub use crate::render::text::TextRasterizer;
pub use crate::timecode::TimecodeStyle;
pub use crate::timeline::{EncoderCommand, TimelineDocument, build_encoder_plan};
