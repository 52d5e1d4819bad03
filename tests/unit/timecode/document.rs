use super::*;
use crate::timeline::model::CaptionStyle;

fn item(id: &str, start: f64, dur: f64, text: &str) -> SubtitleItem {
    SubtitleItem {
        id: id.to_owned(),
        span: Span::new(start, dur).unwrap(),
        text: text.to_owned(),
        style: CaptionStyle::Default,
    }
}

#[test]
fn srt_encodes_one_based_blocks() {
    let out = encode(&[item("a", 0.0, 1.5, "Hello"), item("b", 2.0, 1.0, "Two\nlines")], TimecodeStyle::Srt);
    assert_eq!(
        out,
        "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n2\n00:00:02,000 --> 00:00:03,000\nTwo\nlines\n\n"
    );
}

#[test]
fn vtt_encodes_header_and_indices() {
    let out = encode(&[item("a", 1.0, 1.0, "Hi")], TimecodeStyle::Vtt);
    assert_eq!(out, "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\nHi\n\n");
}

#[test]
fn documents_round_trip_in_both_styles() {
    let items = [item("a", 0.5, 1.25, "first"), item("b", 3.0, 2.0, "second\nline")];
    for style in [TimecodeStyle::Srt, TimecodeStyle::Vtt] {
        let cues = decode(&encode(&items, style), style).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first");
        assert!((cues[0].span.start_time() - 0.5).abs() < 1e-9);
        assert!((cues[0].span.end_time() - 1.75).abs() < 1e-9);
        assert_eq!(cues[1].text, "second\nline");
    }
}

#[test]
fn malformed_vtt_cue_is_skipped() {
    let doc = "WEBVTT\n\n00:00:01.000 -> 00:00:02.000\nbroken\n\n00:00:03.000 --> 00:00:04.000\nfine\n";
    let cues = decode_vtt(doc).unwrap();
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "fine");
    assert_eq!(cues[0].span.start_time(), 3.0);
}

#[test]
fn vtt_without_header_is_rejected() {
    let err = decode_vtt("00:00:01.000 --> 00:00:02.000\nhi\n").unwrap_err();
    assert!(matches!(err, SyncError::MalformedDocument { .. }));
}

#[test]
fn vtt_identifiers_notes_and_settings_are_tolerated() {
    let doc = "\u{feff}WEBVTT - captions\r\n\r\nNOTE written by hand\r\n\r\nintro\r\n00:01.000 --> 00:02.500 align:start\r\nHello\r\n";
    let cues = decode_vtt(doc).unwrap();
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "Hello");
    assert_eq!(cues[0].span.duration(), 1.5);
}

#[test]
fn srt_skips_inverted_and_short_blocks() {
    let doc = "1\n00:00:05,000 --> 00:00:04,000\nbackwards\n\n2\n00:00:06,000 --> 00:00:07,000\n\n\n3\n00:00:08,000 --> 00:00:09,000\nok\n";
    let cues = decode_srt(doc);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "ok");
}

#[test]
fn detects_style_from_extension_or_content() {
    assert_eq!(detect_format(Path::new("a.VTT")), Some(TimecodeStyle::Vtt));
    assert_eq!(detect_format(Path::new("a.txt")), None);
    assert_eq!(sniff_format("WEBVTT\n\n"), TimecodeStyle::Vtt);
    assert_eq!(sniff_format("1\n00:00:00,000 --> 00:00:01,000\nx\n"), TimecodeStyle::Srt);
}

#[test]
fn files_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("captions.vtt");
    let style = write_cues(&path, &[item("a", 0.0, 2.0, "disk")]).unwrap();
    assert_eq!(style, TimecodeStyle::Vtt);
    let cues = read_cues(&path).unwrap();
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "disk");
}

#[test]
fn missing_file_reports_not_found() {
    let err = read_cues(Path::new("/definitely/not/here.srt")).unwrap_err();
    assert!(matches!(err, SyncError::DocumentNotFound { .. }));
}
