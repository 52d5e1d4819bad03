//! Whole-document SRT/WebVTT decoding and encoding.
//!
//! Decoding is lenient per cue: a block whose timing line does not parse, or whose end is not
//! after its start, is skipped with a warning and the rest of the document still decodes.

use super::{TimecodeStyle, format, parse};
use crate::foundation::error::{SyncError, SyncResult};
use crate::timeline::model::{Cue, Span, SubtitleItem};
use regex::Regex;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid blank line pattern"));

// Cue settings after the end time (`align:start` etc.) are ignored.
static TIMING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+-->\s+(\S+)(?:\s.*)?$").expect("valid timing line pattern")
});

fn normalize_newlines(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

fn blocks(text: &str) -> impl Iterator<Item = Vec<&str>> {
    BLANK_LINE
        .split(text)
        .map(|block| {
            block
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.trim().is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|lines| !lines.is_empty())
}

fn parse_timing(line: &str, style: TimecodeStyle) -> SyncResult<Span> {
    let caps = TIMING_LINE
        .captures(line)
        .ok_or_else(|| SyncError::timecode(line))?;
    let start = parse(&caps[1], style)?;
    let end = parse(&caps[2], style)?;
    Span::new(start, end - start).map_err(|e| SyncError::InvalidTiming {
        id: line.trim().to_owned(),
        reason: e.to_string(),
    })
}

fn cue_from(lines: &[&str], timing_at: usize, style: TimecodeStyle, ordinal: usize) -> Option<Cue> {
    let timing = lines.get(timing_at)?;
    let text = lines.get(timing_at + 1..).filter(|t| !t.is_empty())?;
    match parse_timing(timing, style) {
        Ok(span) => Some(Cue::new(text.join("\n"), span)),
        Err(err) => {
            tracing::warn!(block = ordinal, %err, "skipping subtitle cue");
            None
        }
    }
}

/// Decode a SubRip document.
///
/// Each block needs an index line, a timing line and at least one text line.
pub fn decode_srt(text: &str) -> Vec<Cue> {
    let text = normalize_newlines(text);
    blocks(&text)
        .enumerate()
        .filter_map(|(n, lines)| {
            if lines.len() < 3 {
                tracing::warn!(block = n, lines = lines.len(), "skipping short SRT block");
                return None;
            }
            cue_from(&lines, 1, TimecodeStyle::Srt, n)
        })
        .collect()
}

/// Decode a WebVTT document.
///
/// The `WEBVTT` header is mandatory. Cue identifiers are optional; `NOTE`, `STYLE` and `REGION`
/// blocks are skipped.
pub fn decode_vtt(text: &str) -> SyncResult<Vec<Cue>> {
    let text = normalize_newlines(text);
    let mut it = blocks(&text).enumerate();
    let header_ok = it.next().is_some_and(|(_, lines)| {
        lines[0] == "WEBVTT" || lines[0].starts_with("WEBVTT ") || lines[0].starts_with("WEBVTT\t")
    });
    if !header_ok {
        return Err(SyncError::malformed("<vtt>", "missing WEBVTT header"));
    }

    Ok(it
        .filter_map(|(n, lines)| {
            let first = lines[0];
            if ["NOTE", "STYLE", "REGION"]
                .iter()
                .any(|kw| first == *kw || first.starts_with(&format!("{kw} ")))
            {
                return None;
            }
            let timing_at = usize::from(!first.contains("-->"));
            cue_from(&lines, timing_at, TimecodeStyle::Vtt, n).or_else(|| {
                if lines.len() <= timing_at + 1 {
                    tracing::warn!(block = n, "skipping VTT block without text");
                }
                None
            })
        })
        .collect())
}

/// Decode a document of the given style.
pub fn decode(text: &str, style: TimecodeStyle) -> SyncResult<Vec<Cue>> {
    match style {
        TimecodeStyle::Srt => Ok(decode_srt(text)),
        TimecodeStyle::Vtt => decode_vtt(text),
    }
}

/// Style implied by a file extension (`.srt`, `.vtt`).
pub fn detect_format(path: &Path) -> Option<TimecodeStyle> {
    TimecodeStyle::from_path(path)
}

/// Sniff the style of a document: a leading `WEBVTT` means WebVTT, anything else SRT.
pub fn sniff_format(text: &str) -> TimecodeStyle {
    if text.trim_start_matches('\u{feff}').trim_start().starts_with("WEBVTT") {
        TimecodeStyle::Vtt
    } else {
        TimecodeStyle::Srt
    }
}

/// Encode subtitle items in their given order with 1-based cue indices.
pub fn encode(items: &[SubtitleItem], style: TimecodeStyle) -> String {
    let mut out = String::new();
    if style == TimecodeStyle::Vtt {
        out.push_str("WEBVTT\n\n");
    }
    for (n, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}", n + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format(item.span.start_time(), style),
            format(item.span.end_time(), style)
        );
        let _ = writeln!(out, "{}", item.text);
        out.push('\n');
    }
    out
}

/// Read a subtitle file, taking the style from the extension or, failing that, the content.
pub fn read_cues(path: &Path) -> SyncResult<Vec<Cue>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SyncError::DocumentNotFound {
                path: path.to_path_buf(),
            }
        } else {
            SyncError::malformed(path.display().to_string(), e.to_string())
        }
    })?;
    let style = detect_format(path).unwrap_or_else(|| sniff_format(&text));
    decode(&text, style).map_err(|e| match e {
        SyncError::MalformedDocument { reason, .. } => {
            SyncError::malformed(path.display().to_string(), reason)
        }
        other => other,
    })
}

/// Write subtitle items to `path`; the style follows the extension (SRT when unknown).
pub fn write_cues(path: &Path, items: &[SubtitleItem]) -> SyncResult<TimecodeStyle> {
    let style = detect_format(path).unwrap_or(TimecodeStyle::Srt);
    std::fs::write(path, encode(items, style))
        .map_err(|e| anyhow::anyhow!("write subtitles '{}': {e}", path.display()))?;
    Ok(style)
}

#[cfg(test)]
#[path = "../../tests/unit/timecode/document.rs"]
mod tests;
