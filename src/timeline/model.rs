use crate::foundation::error::{SyncError, SyncResult};
use serde::ser::SerializeStruct as _;
use std::collections::HashMap;
use std::path::PathBuf;

/// Why a start/duration pair was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimingError {
    /// Start time is negative or not finite.
    InvalidStart,
    /// Duration is zero, negative, or not finite.
    InvalidDuration,
}

impl std::fmt::Display for TimingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidStart => f.write_str("startTime must be a finite value >= 0"),
            Self::InvalidDuration => f.write_str("duration must be a finite value > 0"),
        }
    }
}

/// Validated `[startTime, startTime + duration]` interval in seconds.
///
/// `endTime` is always derived, so replacing either bound can never leave it stale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Span {
    start_time: f64,
    duration: f64,
}

impl Span {
    /// Create a span; `start >= 0` and `duration > 0`.
    pub fn new(start_time: f64, duration: f64) -> Result<Self, TimingError> {
        if !start_time.is_finite() || start_time < 0.0 {
            return Err(TimingError::InvalidStart);
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(TimingError::InvalidDuration);
        }
        Ok(Self {
            start_time,
            duration,
        })
    }

    /// Create a span, reporting violations against item `id`.
    pub fn for_item(id: &str, start_time: f64, duration: f64) -> SyncResult<Self> {
        Self::new(start_time, duration).map_err(|e| SyncError::InvalidTiming {
            id: id.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Inclusive start in seconds.
    pub fn start_time(self) -> f64 {
        self.start_time
    }

    /// Length in seconds.
    pub fn duration(self) -> f64 {
        self.duration
    }

    /// Derived end in seconds.
    pub fn end_time(self) -> f64 {
        self.start_time + self.duration
    }

    /// Return `true` when `t` lies in `[start, end]` (both ends inclusive).
    pub fn contains(self, t: f64) -> bool {
        self.start_time <= t && t <= self.end_time()
    }

    /// Replace start and/or duration, keeping the other bound.
    pub fn with(self, start_time: Option<f64>, duration: Option<f64>) -> Result<Self, TimingError> {
        Self::new(
            start_time.unwrap_or(self.start_time),
            duration.unwrap_or(self.duration),
        )
    }

    /// `start' = start * scale + offset`, `duration' = duration * scale`.
    pub fn scaled(self, scale: f64, offset: f64) -> Result<Self, TimingError> {
        Self::new(self.start_time * scale + offset, self.duration * scale)
    }
}

impl serde::Serialize for Span {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut st = s.serialize_struct("Span", 3)?;
        st.serialize_field("startTime", &self.start_time)?;
        st.serialize_field("duration", &self.duration)?;
        st.serialize_field("endTime", &self.end_time())?;
        st.end()
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpanRepr {
    start_time: f64,
    duration: f64,
    // Accepted for compatibility, always re-derived.
    #[serde(default)]
    #[allow(dead_code)]
    end_time: Option<f64>,
}

impl<'de> serde::Deserialize<'de> for Span {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let repr = SpanRepr::deserialize(d)?;
        Span::new(repr.start_time, repr.duration).map_err(serde::de::Error::custom)
    }
}

/// Caption presentation style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionStyle {
    /// Regular bottom caption.
    #[default]
    Default,
    /// Highlighted caption.
    Emphasis,
    /// Larger caption used for section titles.
    Title,
}

/// Role of a video item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoKind {
    /// Rendered chart footage.
    #[default]
    #[serde(alias = "stock_chart")]
    Chart,
    /// Picture-in-picture overlay.
    Overlay,
    /// Full-frame background footage.
    Background,
}

impl std::str::FromStr for VideoKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chart" | "stock_chart" => Ok(Self::Chart),
            "overlay" => Ok(Self::Overlay),
            "background" => Ok(Self::Background),
            other => Err(SyncError::validation(format!("unknown video type '{other}'"))),
        }
    }
}

/// Anything carrying a [`Span`].
pub trait Timed {
    /// Current span.
    fn span(&self) -> Span;
    /// Replace the span.
    fn set_span(&mut self, span: Span);
}

/// An item stored in a [`Track`].
pub trait TrackItem: Timed {
    /// Track this item type belongs to.
    const KIND: TrackKind;
    /// Unique id within the track.
    fn id(&self) -> &str;
}

/// A timed caption produced by segmentation or decoded from SRT/VTT.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Caption text, possibly multi-line.
    pub text: String,
    /// Timing.
    #[serde(flatten)]
    pub span: Span,
    /// Presentation style.
    #[serde(default)]
    pub style: CaptionStyle,
}

impl Cue {
    /// Create a default-styled cue.
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
            style: CaptionStyle::Default,
        }
    }
}

/// Subtitle track item.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleItem {
    /// Unique id within the subtitle track.
    pub id: String,
    /// Timing.
    #[serde(flatten)]
    pub span: Span,
    /// Caption text.
    pub text: String,
    /// Presentation style.
    #[serde(default)]
    pub style: CaptionStyle,
}

impl SubtitleItem {
    /// Promote a cue into a track item.
    pub fn from_cue(id: impl Into<String>, cue: Cue) -> Self {
        Self {
            id: id.into(),
            span: cue.span,
            text: cue.text,
            style: cue.style,
        }
    }
}

/// Audio track item.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioItem {
    /// Unique id within the audio track.
    pub id: String,
    /// Timing.
    #[serde(flatten)]
    pub span: Span,
    /// Audio file.
    pub file: PathBuf,
}

/// Video track item.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    /// Unique id within the video track.
    pub id: String,
    /// Timing.
    #[serde(flatten)]
    pub span: Span,
    /// Video file.
    pub file: PathBuf,
    /// Role of the footage.
    #[serde(rename = "type", default)]
    pub kind: VideoKind,
}

macro_rules! impl_timed {
    ($($ty:ty),*) => {
        $(impl Timed for $ty {
            fn span(&self) -> Span {
                self.span
            }
            fn set_span(&mut self, span: Span) {
                self.span = span;
            }
        })*
    };
}

impl_timed!(Cue, SubtitleItem, AudioItem, VideoItem);

impl TrackItem for SubtitleItem {
    const KIND: TrackKind = TrackKind::Subtitles;
    fn id(&self) -> &str {
        &self.id
    }
}

impl TrackItem for AudioItem {
    const KIND: TrackKind = TrackKind::Audio;
    fn id(&self) -> &str {
        &self.id
    }
}

impl TrackItem for VideoItem {
    const KIND: TrackKind = TrackKind::Video;
    fn id(&self) -> &str {
        &self.id
    }
}

/// The three track names of a timeline document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// `subtitles`
    Subtitles,
    /// `audio`
    Audio,
    /// `video`
    Video,
}

impl TrackKind {
    /// All tracks in document order.
    pub const ALL: [TrackKind; 3] = [TrackKind::Subtitles, TrackKind::Audio, TrackKind::Video];

    /// JSON/API name of the track.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subtitles => "subtitles",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Prefix used for generated item ids (`subtitle_1`, `audio_1`, ...).
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Subtitles => "subtitle",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subtitles" => Ok(Self::Subtitles),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(SyncError::InvalidTrack {
                name: other.to_owned(),
            }),
        }
    }
}

/// Closed set of timeline item variants.
#[derive(Clone, Debug, PartialEq)]
pub enum TimelineItem {
    /// Caption.
    Subtitle(SubtitleItem),
    /// Audio clip.
    Audio(AudioItem),
    /// Video clip.
    Video(VideoItem),
}

impl TimelineItem {
    /// Track the item belongs to.
    pub fn track(&self) -> TrackKind {
        match self {
            Self::Subtitle(_) => TrackKind::Subtitles,
            Self::Audio(_) => TrackKind::Audio,
            Self::Video(_) => TrackKind::Video,
        }
    }

    /// Item id.
    pub fn id(&self) -> &str {
        match self {
            Self::Subtitle(i) => &i.id,
            Self::Audio(i) => &i.id,
            Self::Video(i) => &i.id,
        }
    }

    /// Item span.
    pub fn span(&self) -> Span {
        match self {
            Self::Subtitle(i) => i.span,
            Self::Audio(i) => i.span,
            Self::Video(i) => i.span,
        }
    }
}

/// Insertion-ordered items with an id index for constant-time lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct Track<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Track<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: TrackItem> Track<T> {
    /// Empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a track, rejecting duplicate ids.
    pub fn from_items(items: Vec<T>) -> SyncResult<Self> {
        let mut track = Self::new();
        for item in items {
            track.push(item)?;
        }
        Ok(track)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return `true` when the track has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Items as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Item by position.
    pub fn at(&self, pos: usize) -> Option<&T> {
        self.items.get(pos)
    }

    /// Item by id.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    /// Return `true` when an item with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    // Callers must not change the id through this reference.
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        let i = *self.index.get(id)?;
        self.items.get_mut(i)
    }

    /// Append an item; fails on a duplicate id.
    pub fn push(&mut self, item: T) -> SyncResult<()> {
        if self.index.contains_key(item.id()) {
            return Err(SyncError::DuplicateItem {
                track: T::KIND.as_str().to_owned(),
                id: item.id().to_owned(),
            });
        }
        self.index.insert(item.id().to_owned(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Remove an item by id, preserving the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let pos = self.index.remove(id)?;
        let item = self.items.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(item)
    }

    /// Latest end time in the track, `None` when empty.
    pub fn max_end(&self) -> Option<f64> {
        self.items
            .iter()
            .map(|i| i.span().end_time())
            .reduce(f64::max)
    }

    /// Smallest `n` such that `<prefix>_n` is not yet used, counting from `len + 1`.
    pub fn next_id(&self) -> String {
        let mut n = self.items.len() + 1;
        loop {
            let id = format!("{}_{n}", T::KIND.id_prefix());
            if !self.index.contains_key(&id) {
                return id;
            }
            n += 1;
        }
    }
}

impl<'a, T> IntoIterator for &'a Track<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: serde::Serialize> serde::Serialize for Track<T> {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(&self.items)
    }
}

impl<'de, T: TrackItem + serde::Deserialize<'de>> serde::Deserialize<'de> for Track<T> {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(d)?;
        Track::from_items(items).map_err(serde::de::Error::custom)
    }
}

/// Loosely typed item input, as received from an editor or JSON payload.
///
/// Every field is optional so that missing required fields can be reported precisely.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    /// Item id (required).
    pub id: Option<String>,
    /// Start time in seconds (required).
    pub start_time: Option<f64>,
    /// Duration in seconds (required).
    pub duration: Option<f64>,
    /// Caption text (subtitles).
    pub text: Option<String>,
    /// Caption style (subtitles).
    pub style: Option<CaptionStyle>,
    /// Media file (audio and video, required there).
    pub file: Option<PathBuf>,
    /// Video role.
    #[serde(rename = "type")]
    pub kind: Option<VideoKind>,
}

impl ItemDraft {
    /// Draft with the three required fields set.
    pub fn new(id: impl Into<String>, start_time: f64, duration: f64) -> Self {
        Self {
            id: Some(id.into()),
            start_time: Some(start_time),
            duration: Some(duration),
            ..Self::default()
        }
    }

    /// Set caption text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set media file.
    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Set video role.
    pub fn kind(mut self, kind: VideoKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Validate the draft and build the item variant for `track`.
    pub fn into_item(self, track: TrackKind) -> SyncResult<TimelineItem> {
        let id = self.id.ok_or(SyncError::MissingRequiredField {
            field: "id",
            id: None,
        })?;
        let missing = |field: &'static str| SyncError::MissingRequiredField {
            field,
            id: Some(id.clone()),
        };
        let start = self.start_time.ok_or_else(|| missing("startTime"))?;
        let duration = self.duration.ok_or_else(|| missing("duration"))?;
        let span = Span::for_item(&id, start, duration)?;

        Ok(match track {
            TrackKind::Subtitles => TimelineItem::Subtitle(SubtitleItem {
                id,
                span,
                text: self.text.unwrap_or_default(),
                style: self.style.unwrap_or_default(),
            }),
            TrackKind::Audio => {
                let file = self.file.ok_or_else(|| missing("file"))?;
                TimelineItem::Audio(AudioItem { id, span, file })
            }
            TrackKind::Video => {
                let file = self.file.ok_or_else(|| missing("file"))?;
                TimelineItem::Video(VideoItem {
                    id,
                    span,
                    file,
                    kind: self.kind.unwrap_or_default(),
                })
            }
        })
    }
}

/// Collaborator description of a video clip to place on the timeline.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSegment {
    /// Footage file.
    pub file: PathBuf,
    /// Start in seconds (defaults to 0).
    #[serde(default)]
    pub start_time: f64,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Role of the footage.
    #[serde(rename = "type", default)]
    pub kind: VideoKind,
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
