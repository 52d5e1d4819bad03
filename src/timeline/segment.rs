//! Split narration text into caption cues laid back to back on the timeline.

use crate::foundation::config::CaptionConfig;
use crate::timeline::model::{Cue, Span};

const TERMINAL_PUNCTUATION: [char; 7] = ['。', '！', '？', '…', '.', '!', '?'];

/// Reading-speed policy for cue durations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentPolicy {
    /// Characters read per second.
    pub chars_per_sec: f64,
    /// Shortest cue duration.
    pub min_secs: f64,
    /// Longest cue duration.
    pub max_secs: f64,
    /// Paragraphs above this many characters are split on punctuation.
    pub long_paragraph_chars: usize,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self::from(&CaptionConfig::default())
    }
}

impl From<&CaptionConfig> for SegmentPolicy {
    fn from(cfg: &CaptionConfig) -> Self {
        Self {
            chars_per_sec: cfg.chars_per_sec,
            min_secs: cfg.min_cue_secs,
            max_secs: cfg.max_cue_secs,
            long_paragraph_chars: cfg.long_paragraph_chars,
        }
    }
}

impl SegmentPolicy {
    /// Duration for a caption of `chars` characters, clamped to `[min, max]`.
    pub fn duration_for(&self, chars: usize) -> f64 {
        let raw = chars as f64 / self.chars_per_sec.max(f64::EPSILON);
        raw.clamp(self.min_secs, self.max_secs.max(self.min_secs))
    }
}

/// Split `text` into sentences ending at terminal punctuation (the mark stays attached).
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch == '\n' || TERMINAL_PUNCTUATION.contains(&ch) {
            push_trimmed(&mut out, &current);
            current.clear();
        }
    }
    push_trimmed(&mut out, &current);
    out
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let t = s.trim();
    if !t.is_empty() {
        out.push(t.to_owned());
    }
}

/// Caption text units: one per paragraph, with long paragraphs split into sentences.
///
/// Text without any newline is split into sentences directly.
pub fn split_text(text: &str, policy: &SegmentPolicy) -> Vec<String> {
    if !text.contains('\n') {
        return split_sentences(text);
    }
    text.lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .flat_map(|p| {
            if p.chars().count() > policy.long_paragraph_chars {
                split_sentences(p)
            } else {
                vec![p.to_owned()]
            }
        })
        .collect()
}

/// Segment text into cues starting at 0 s, each following the previous one without gaps.
pub fn segment_text(text: &str, policy: &SegmentPolicy) -> Vec<Cue> {
    let mut t = 0.0;
    let mut cues = Vec::new();
    for unit in split_text(text, policy) {
        let duration = policy.duration_for(unit.chars().count());
        match Span::new(t, duration) {
            Ok(span) => {
                cues.push(Cue::new(unit, span));
                t += duration;
            }
            Err(err) => tracing::warn!(%err, "skipping caption with unusable duration"),
        }
    }
    tracing::info!(cues = cues.len(), "segmented caption text");
    cues
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/segment.rs"]
mod tests;
