//! The timeline document: three id-indexed tracks on one clock plus a derived total duration.

use crate::audio::media::MediaProbe;
use crate::audio::mix::AudioClip;
use crate::encode::process::ensure_parent_dir;
use crate::foundation::error::{SyncError, SyncResult};
use crate::timecode::TimecodeStyle;
use crate::timecode::document::write_cues;
use crate::timeline::model::{
    AudioItem, Cue, ItemDraft, Span, SubtitleItem, TimelineItem, Timed, Track, TrackItem,
    TrackKind, VideoItem, VideoSegment,
};
use std::path::{Path, PathBuf};

/// The three tracks of a document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Tracks {
    /// Caption items.
    pub subtitles: Track<SubtitleItem>,
    /// Audio items.
    pub audio: Track<AudioItem>,
    /// Video items.
    pub video: Track<VideoItem>,
}

/// A synthesized speech file paired with the caption it voices.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechClip {
    /// Speech audio file.
    pub file: PathBuf,
    /// 0-based index into the subtitle track.
    pub cue_index: usize,
}

/// Timeline document persisted as `{"tracks": {...}, "totalDuration": n}`.
///
/// `totalDuration` always equals the latest item end across all tracks (0 when empty).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", from = "DocumentRepr")]
pub struct TimelineDocument {
    tracks: Tracks,
    total_duration: f64,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRepr {
    #[serde(default)]
    tracks: Tracks,
    // Stored for readers; recomputed on load.
    #[serde(default)]
    #[allow(dead_code)]
    total_duration: Option<f64>,
}

impl From<DocumentRepr> for TimelineDocument {
    fn from(repr: DocumentRepr) -> Self {
        let mut doc = Self {
            tracks: repr.tracks,
            total_duration: 0.0,
        };
        doc.recompute_total_duration();
        doc
    }
}

/// Rescale and shift spans: `start' = start * scale + offset`, `duration' = duration * scale`.
///
/// The input is left untouched. Fails when any resulting span is invalid.
pub fn adjust_timing<T: Timed + Clone>(items: &[T], scale: f64, offset: f64) -> SyncResult<Vec<T>> {
    items
        .iter()
        .enumerate()
        .map(|(n, item)| {
            let span = item.span().scaled(scale, offset).map_err(|e| SyncError::InvalidTiming {
                id: format!("#{n}"),
                reason: e.to_string(),
            })?;
            let mut out = item.clone();
            out.set_span(span);
            Ok(out)
        })
        .collect()
}

fn update_span<T: TrackItem>(
    track: &mut Track<T>,
    id: &str,
    start: Option<f64>,
    duration: Option<f64>,
) -> SyncResult<bool> {
    let Some(item) = track.get_mut(id) else {
        return Ok(false);
    };
    let span = item
        .span()
        .with(start, duration)
        .map_err(|e| SyncError::InvalidTiming {
            id: id.to_owned(),
            reason: e.to_string(),
        })?;
    item.set_span(span);
    Ok(true)
}

impl TimelineDocument {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from segmented cues, speech files and video segments.
    ///
    /// Audio item `i` starts where subtitle `i` starts (0 when there is no such subtitle) and
    /// lasts as long as `probe` reports. Items without a positive duration are skipped.
    #[tracing::instrument(skip_all, fields(
        subtitles = subtitles.len(),
        audio = audio_files.len(),
        video = video_segments.len()
    ))]
    pub fn create_timeline(
        subtitles: &[Cue],
        audio_files: &[PathBuf],
        video_segments: &[VideoSegment],
        probe: &dyn MediaProbe,
    ) -> Self {
        let mut doc = Self::new();

        for (i, cue) in subtitles.iter().enumerate() {
            let item = SubtitleItem::from_cue(format!("subtitle_{}", i + 1), cue.clone());
            doc.push_logged(TimelineItem::Subtitle(item));
        }

        for (i, file) in audio_files.iter().enumerate() {
            let id = format!("audio_{}", i + 1);
            let start = doc.tracks.subtitles.at(i).map_or(0.0, |s| s.span.start_time());
            let duration = match probe.duration_secs(file) {
                Ok(d) => d,
                Err(err) => {
                    tracing::warn!(%id, path = %file.display(), %err, "skipping audio without duration");
                    continue;
                }
            };
            match Span::for_item(&id, start, duration) {
                Ok(span) => doc.push_logged(TimelineItem::Audio(AudioItem {
                    id,
                    span,
                    file: file.clone(),
                })),
                Err(err) => tracing::warn!(path = %file.display(), %err, "skipping audio item"),
            }
        }

        for (i, seg) in video_segments.iter().enumerate() {
            let id = format!("video_{}", i + 1);
            match Span::for_item(&id, seg.start_time, seg.duration) {
                Ok(span) => doc.push_logged(TimelineItem::Video(VideoItem {
                    id,
                    span,
                    file: seg.file.clone(),
                    kind: seg.kind,
                })),
                Err(err) => tracing::warn!(path = %seg.file.display(), %err, "skipping video item"),
            }
        }

        tracing::info!(total_duration = doc.total_duration, "timeline created");
        doc
    }

    fn push_logged(&mut self, item: TimelineItem) {
        if let Err(err) = self.insert(item) {
            tracing::warn!(%err, "skipping timeline item");
        }
    }

    /// Latest end time over all tracks.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// All tracks.
    pub fn tracks(&self) -> &Tracks {
        &self.tracks
    }

    /// Subtitle track.
    pub fn subtitles(&self) -> &Track<SubtitleItem> {
        &self.tracks.subtitles
    }

    /// Audio track.
    pub fn audio(&self) -> &Track<AudioItem> {
        &self.tracks.audio
    }

    /// Video track.
    pub fn video(&self) -> &Track<VideoItem> {
        &self.tracks.video
    }

    /// Return `true` when every track is empty.
    pub fn is_empty(&self) -> bool {
        self.tracks.subtitles.is_empty() && self.tracks.audio.is_empty() && self.tracks.video.is_empty()
    }

    /// Validate a loosely typed draft and add it to the named track.
    pub fn add_item(&mut self, track: &str, draft: ItemDraft) -> SyncResult<()> {
        let kind: TrackKind = track.parse()?;
        self.insert(draft.into_item(kind)?)
    }

    /// Add a typed item to its track. `totalDuration` only ever grows here.
    pub fn insert(&mut self, item: TimelineItem) -> SyncResult<()> {
        let end = item.span().end_time();
        match item {
            TimelineItem::Subtitle(i) => self.tracks.subtitles.push(i)?,
            TimelineItem::Audio(i) => self.tracks.audio.push(i)?,
            TimelineItem::Video(i) => self.tracks.video.push(i)?,
        }
        self.total_duration = self.total_duration.max(end);
        Ok(())
    }

    /// Remove an item; `Ok(false)` when the id is not in the track.
    pub fn remove_item(&mut self, track: &str, id: &str) -> SyncResult<bool> {
        let removed = match track.parse::<TrackKind>()? {
            TrackKind::Subtitles => self.tracks.subtitles.remove(id).is_some(),
            TrackKind::Audio => self.tracks.audio.remove(id).is_some(),
            TrackKind::Video => self.tracks.video.remove(id).is_some(),
        };
        if removed {
            self.recompute_total_duration();
        }
        Ok(removed)
    }

    /// Partially update an item's timing; `Ok(false)` when the id is not in the track.
    ///
    /// An invalid result leaves the item unchanged.
    pub fn update_item_timing(
        &mut self,
        track: &str,
        id: &str,
        start_time: Option<f64>,
        duration: Option<f64>,
    ) -> SyncResult<bool> {
        let updated = match track.parse::<TrackKind>()? {
            TrackKind::Subtitles => update_span(&mut self.tracks.subtitles, id, start_time, duration)?,
            TrackKind::Audio => update_span(&mut self.tracks.audio, id, start_time, duration)?,
            TrackKind::Video => update_span(&mut self.tracks.video, id, start_time, duration)?,
        };
        if updated {
            self.recompute_total_duration();
        }
        Ok(updated)
    }

    /// Point an audio or video item at a new media file.
    pub fn replace_media(&mut self, track: &str, id: &str, file: impl Into<PathBuf>) -> SyncResult<bool> {
        let slot = match track.parse::<TrackKind>()? {
            TrackKind::Audio => self.tracks.audio.get_mut(id).map(|i| &mut i.file),
            TrackKind::Video => self.tracks.video.get_mut(id).map(|i| &mut i.file),
            TrackKind::Subtitles => {
                return Err(SyncError::InvalidTrack {
                    name: track.to_owned(),
                });
            }
        };
        match slot {
            Some(slot) => {
                *slot = file.into();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// First subtitle (in track order) whose inclusive span contains `t`.
    pub fn active_subtitle(&self, t: f64) -> Option<&SubtitleItem> {
        self.tracks.subtitles.iter().find(|s| s.span.contains(t))
    }

    /// Add a merged soundtrack as a new audio item and return its id.
    pub fn register_audio(
        &mut self,
        file: impl Into<PathBuf>,
        start_time: f64,
        duration: f64,
    ) -> SyncResult<String> {
        let id = self.tracks.audio.next_id();
        let span = Span::for_item(&id, start_time, duration)?;
        self.insert(TimelineItem::Audio(AudioItem {
            id: id.clone(),
            span,
            file: file.into(),
        }))?;
        Ok(id)
    }

    /// The audio item a render muxes: the last item starting at 0 that reaches the end of the
    /// audio track, as left by [`TimelineDocument::register_audio`] for a merged soundtrack.
    pub fn soundtrack(&self) -> Option<&AudioItem> {
        let end = self.tracks.audio.max_end()?;
        self.tracks
            .audio
            .iter()
            .rev()
            .find(|a| a.span.start_time() == 0.0 && a.span.end_time() >= end - 1e-9)
    }

    /// Place speech clips at the start of the caption they voice.
    ///
    /// A clip whose cue index is past the end of the subtitle track starts at 0.
    pub fn speech_clips(&self, clips: &[SpeechClip]) -> Vec<AudioClip> {
        clips
            .iter()
            .map(|c| {
                let start = match self.tracks.subtitles.at(c.cue_index) {
                    Some(s) => s.span.start_time(),
                    None => {
                        tracing::warn!(cue = c.cue_index, path = %c.file.display(), "speech clip has no caption; starting at 0");
                        0.0
                    }
                };
                AudioClip::new(c.file.clone(), start)
            })
            .collect()
    }

    /// Append decoded cues to the subtitle track with fresh ids; returns how many were added.
    pub fn import_cues(&mut self, cues: Vec<Cue>) -> SyncResult<usize> {
        let n = cues.len();
        for cue in cues {
            let id = self.tracks.subtitles.next_id();
            self.insert(TimelineItem::Subtitle(SubtitleItem::from_cue(id, cue)))?;
        }
        Ok(n)
    }

    /// Write the subtitle track as SRT or VTT (by extension).
    pub fn export_captions(&self, path: &Path) -> SyncResult<TimecodeStyle> {
        ensure_parent_dir(path)?;
        let style = write_cues(path, self.tracks.subtitles.as_slice())?;
        tracing::info!(path = %path.display(), cues = self.tracks.subtitles.len(), "exported captions");
        Ok(style)
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        use anyhow::Context as _;
        ensure_parent_dir(path)?;
        let json = serde_json::to_string_pretty(self).context("serialize timeline")?;
        std::fs::write(path, json)
            .with_context(|| format!("write timeline '{}'", path.display()))?;
        tracing::info!(path = %path.display(), total_duration = self.total_duration, "timeline saved");
        Ok(())
    }

    /// Load a document saved by [`TimelineDocument::save`].
    pub fn load(path: &Path) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::DocumentNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SyncError::malformed(path.display().to_string(), e.to_string())
            }
        })?;
        let doc: Self = serde_json::from_str(&text)
            .map_err(|e| SyncError::malformed(path.display().to_string(), e.to_string()))?;
        tracing::info!(path = %path.display(), total_duration = doc.total_duration, "timeline loaded");
        Ok(doc)
    }

    fn recompute_total_duration(&mut self) {
        self.total_duration = [
            self.tracks.subtitles.max_end(),
            self.tracks.audio.max_end(),
            self.tracks.video.max_end(),
        ]
        .into_iter()
        .flatten()
        .fold(0.0, f64::max);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/store.rs"]
mod tests;
