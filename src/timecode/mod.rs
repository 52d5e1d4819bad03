//! Subtitle time codes and SRT/WebVTT documents.
//!
//! `HH:MM:SS,mmm` for SRT and `HH:MM:SS.mmm` for WebVTT. Formatting truncates to whole
//! milliseconds; hours are zero-padded to two digits and may grow wider.

/// SRT and WebVTT cue documents.
pub mod document;

use crate::foundation::error::{SyncError, SyncResult};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static SRT_TIMECODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2,}):([0-5]\d):([0-5]\d),(\d{3})$").expect("valid SRT timecode pattern")
});

// WebVTT allows the hour field to be omitted.
static VTT_TIMECODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d{2,}):)?([0-5]\d):([0-5]\d)\.(\d{3})$").expect("valid WebVTT timecode pattern")
});

/// Subtitle container flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimecodeStyle {
    /// SubRip (`,` millisecond separator).
    Srt,
    /// WebVTT (`.` millisecond separator).
    Vtt,
}

impl TimecodeStyle {
    /// Millisecond separator character.
    pub fn separator(self) -> char {
        match self {
            Self::Srt => ',',
            Self::Vtt => '.',
        }
    }

    /// Conventional file extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }

    /// Guess the style from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            _ => None,
        }
    }
}

impl std::str::FromStr for TimecodeStyle {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" | "webvtt" => Ok(Self::Vtt),
            other => Err(SyncError::validation(format!(
                "unknown subtitle format '{other}' (expected srt or vtt)"
            ))),
        }
    }
}

/// Format seconds as a time code, truncating to whole milliseconds.
///
/// Negative and non-finite inputs clamp to zero.
pub fn format(seconds: f64, style: TimecodeStyle) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        // Absorb representation error so 1.001 s stays 1001 ms.
        (seconds * 1000.0 + 1e-6).floor() as u64
    } else {
        0
    };
    let h = total_ms / 3_600_000;
    let m = (total_ms / 60_000) % 60;
    let s = (total_ms / 1000) % 60;
    let ms = total_ms % 1000;
    format!("{h:02}:{m:02}:{s:02}{}{ms:03}", style.separator())
}

/// Parse a time code of the given style into seconds.
pub fn parse(text: &str, style: TimecodeStyle) -> SyncResult<f64> {
    let trimmed = text.trim();
    let re = match style {
        TimecodeStyle::Srt => &*SRT_TIMECODE,
        TimecodeStyle::Vtt => &*VTT_TIMECODE,
    };
    let caps = re.captures(trimmed).ok_or_else(|| SyncError::timecode(text))?;
    let field = |i: usize| -> SyncResult<u64> {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<u64>())
            .map_err(|_| SyncError::timecode(text))
    };
    let (h, m, s, ms) = (field(1)?, field(2)?, field(3)?, field(4)?);
    let whole = h
        .checked_mul(3600)
        .and_then(|v| v.checked_add(m * 60 + s))
        .ok_or_else(|| SyncError::timecode(text))?;
    Ok(whole as f64 + ms as f64 / 1000.0)
}

#[cfg(test)]
#[path = "../../tests/unit/timecode/mod.rs"]
mod tests;
