//! Timeline documents: tracks, persistence, caption segmentation and the encoder plan.

/// Items, spans and tracks.
pub mod model;
/// `ffmpeg` command derived from a document.
pub mod plan;
/// Splitting narration text into timed cues.
pub mod segment;
/// The timeline document and its persistence.
pub mod store;

pub use model::{
    AudioItem, CaptionStyle, Cue, ItemDraft, Span, SubtitleItem, TimelineItem, Track, TrackKind,
    VideoItem, VideoKind, VideoSegment,
};
pub use plan::{CaptionSidecar, EncoderCommand, build_encoder_plan};
pub use segment::{SegmentPolicy, segment_text};
pub use store::{SpeechClip, TimelineDocument, Tracks, adjust_timing};
