use super::*;
use crate::timeline::model::VideoKind;
use std::collections::HashMap;

struct FixedProbe(HashMap<PathBuf, f64>);

impl MediaProbe for FixedProbe {
    fn duration_secs(&self, path: &Path) -> SyncResult<f64> {
        self.0
            .get(path)
            .copied()
            .ok_or_else(|| SyncError::DocumentNotFound {
                path: path.to_path_buf(),
            })
    }
}

fn cue(text: &str, start: f64, dur: f64) -> Cue {
    Cue::new(text, Span::new(start, dur).unwrap())
}

fn no_probe() -> FixedProbe {
    FixedProbe(HashMap::new())
}

#[test]
fn two_cue_timeline_lasts_five_seconds() {
    let doc = TimelineDocument::create_timeline(
        &[cue("a", 0.0, 2.0), cue("b", 2.0, 3.0)],
        &[],
        &[],
        &no_probe(),
    );
    assert_eq!(doc.total_duration(), 5.0);
    assert_eq!(doc.subtitles().at(1).map(|s| s.id.as_str()), Some("subtitle_2"));
}

#[test]
fn empty_timeline_has_zero_duration() {
    let doc = TimelineDocument::create_timeline(&[], &[], &[], &no_probe());
    assert!(doc.is_empty());
    assert_eq!(doc.total_duration(), 0.0);
}

#[test]
fn audio_pairs_with_subtitle_starts_and_probe_failures_skip() {
    let probe = FixedProbe(HashMap::from([
        (PathBuf::from("s1.mp3"), 1.8),
        (PathBuf::from("s2.mp3"), 4.0),
        (PathBuf::from("extra.mp3"), 1.0),
    ]));
    let doc = TimelineDocument::create_timeline(
        &[cue("a", 0.0, 2.0), cue("b", 2.5, 2.0)],
        &[
            PathBuf::from("s1.mp3"),
            PathBuf::from("s2.mp3"),
            PathBuf::from("missing.mp3"),
            PathBuf::from("extra.mp3"),
        ],
        &[],
        &probe,
    );
    let audio: Vec<_> = doc.audio().iter().map(|a| (a.id.as_str(), a.span.start_time())).collect();
    assert_eq!(audio, [("audio_1", 0.0), ("audio_2", 2.5), ("audio_4", 0.0)]);
    assert_eq!(doc.total_duration(), 6.5);
}

#[test]
fn zero_length_video_segments_are_skipped() {
    let segs = [
        VideoSegment {
            file: "chart.mp4".into(),
            start_time: 0.0,
            duration: 10.0,
            kind: VideoKind::Chart,
        },
        VideoSegment {
            file: "empty.mp4".into(),
            start_time: 1.0,
            duration: 0.0,
            kind: VideoKind::Overlay,
        },
    ];
    let doc = TimelineDocument::create_timeline(&[], &[], &segs, &no_probe());
    assert_eq!(doc.video().len(), 1);
    assert_eq!(doc.total_duration(), 10.0);
}

#[test]
fn adjust_timing_scales_then_offsets() {
    let input = [cue("x", 1.0, 1.0)];
    let out = adjust_timing(&input, 2.0, 1.0).unwrap();
    assert_eq!(out[0].span.start_time(), 3.0);
    assert_eq!(out[0].span.duration(), 2.0);
    assert_eq!(out[0].span.end_time(), 5.0);
    assert_eq!(input[0].span.start_time(), 1.0);
}

#[test]
fn adjust_timing_rejects_negative_results() {
    let err = adjust_timing(&[cue("x", 1.0, 1.0)], 1.0, -2.0).unwrap_err();
    assert!(matches!(err, SyncError::InvalidTiming { .. }));
}

#[test]
fn add_extends_and_remove_shrinks_total() {
    let mut doc = TimelineDocument::create_timeline(&[cue("a", 0.0, 2.0)], &[], &[], &no_probe());
    doc.add_item("subtitles", ItemDraft::new("late", 8.0, 2.0).text("late")).unwrap();
    assert_eq!(doc.total_duration(), 10.0);
    doc.add_item("subtitles", ItemDraft::new("early", 1.0, 1.0).text("early")).unwrap();
    assert_eq!(doc.total_duration(), 10.0);

    assert!(doc.remove_item("subtitles", "late").unwrap());
    assert_eq!(doc.total_duration(), 2.0);
    assert!(!doc.remove_item("subtitles", "late").unwrap());
}

#[test]
fn add_item_validates_track_fields_and_ids() {
    let mut doc = TimelineDocument::new();
    let err = doc
        .add_item("captions", ItemDraft::new("x", 0.0, 1.0))
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidTrack { .. }));

    let draft = ItemDraft {
        id: Some("x".into()),
        duration: Some(1.0),
        ..ItemDraft::default()
    };
    let err = doc.add_item("subtitles", draft).unwrap_err();
    assert!(matches!(err, SyncError::MissingRequiredField { field: "startTime", .. }));

    doc.add_item("audio", ItemDraft::new("a", 0.0, 1.0).file("a.mp3")).unwrap();
    let err = doc
        .add_item("audio", ItemDraft::new("a", 3.0, 1.0).file("b.mp3"))
        .unwrap_err();
    assert!(matches!(err, SyncError::DuplicateItem { .. }));

    let err = doc
        .add_item("audio", ItemDraft::new("neg", -1.0, 1.0).file("c.mp3"))
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidTiming { .. }));
    assert_eq!(doc.total_duration(), 1.0);
}

#[test]
fn timing_updates_recompute_and_keep_invalid_changes_out() {
    let mut doc = TimelineDocument::create_timeline(
        &[cue("a", 0.0, 2.0), cue("b", 2.0, 3.0)],
        &[],
        &[],
        &no_probe(),
    );
    assert!(doc.update_item_timing("subtitles", "subtitle_2", None, Some(1.0)).unwrap());
    assert_eq!(doc.total_duration(), 3.0);

    assert!(doc
        .update_item_timing("subtitles", "subtitle_1", Some(-5.0), None)
        .is_err());
    assert_eq!(doc.subtitles().get("subtitle_1").map(|s| s.span.start_time()), Some(0.0));
    assert!(!doc.update_item_timing("subtitles", "nope", Some(1.0), None).unwrap());
}

#[test]
fn replace_media_targets_media_tracks_only() {
    let mut doc = TimelineDocument::new();
    doc.add_item("video", ItemDraft::new("v", 0.0, 4.0).file("old.mp4")).unwrap();
    assert!(doc.replace_media("video", "v", "new.mp4").unwrap());
    assert_eq!(doc.video().get("v").map(|v| v.file.clone()), Some(PathBuf::from("new.mp4")));
    assert!(!doc.replace_media("audio", "v", "x.mp3").unwrap());
    assert!(doc.replace_media("subtitles", "v", "x.srt").is_err());
}

#[test]
fn active_subtitle_uses_inclusive_bounds() {
    let doc = TimelineDocument::create_timeline(
        &[cue("a", 0.0, 2.0), cue("b", 2.0, 3.0)],
        &[],
        &[],
        &no_probe(),
    );
    assert_eq!(doc.active_subtitle(2.0).map(|s| s.text.as_str()), Some("a"));
    assert_eq!(doc.active_subtitle(2.1).map(|s| s.text.as_str()), Some("b"));
    assert!(doc.active_subtitle(5.5).is_none());
}

#[test]
fn speech_clips_follow_caption_starts() {
    let doc = TimelineDocument::create_timeline(
        &[cue("a", 0.0, 2.0), cue("b", 2.0, 3.0)],
        &[],
        &[],
        &no_probe(),
    );
    let clips = doc.speech_clips(&[
        SpeechClip {
            file: "b.wav".into(),
            cue_index: 1,
        },
        SpeechClip {
            file: "z.wav".into(),
            cue_index: 9,
        },
    ]);
    assert_eq!(clips[0].start_time, 2.0);
    assert_eq!(clips[1].start_time, 0.0);
}

#[test]
fn register_audio_and_import_cues_allocate_ids() {
    let mut doc = TimelineDocument::new();
    let id = doc.register_audio("mix.mp3", 0.0, 7.5).unwrap();
    assert_eq!(id, "audio_1");
    assert_eq!(doc.total_duration(), 7.5);
    let n = doc.import_cues(vec![cue("x", 0.0, 1.0), cue("y", 9.0, 1.0)]).unwrap();
    assert_eq!(n, 2);
    assert!(doc.subtitles().contains("subtitle_2"));
    assert_eq!(doc.total_duration(), 10.0);
}

#[test]
fn soundtrack_is_the_registered_mix() {
    let mut doc = TimelineDocument::new();
    assert!(doc.soundtrack().is_none());
    doc.add_item("audio", ItemDraft::new("speech_1", 0.0, 2.0).file("s1.wav")).unwrap();
    doc.add_item("audio", ItemDraft::new("speech_2", 2.0, 3.0).file("s2.wav")).unwrap();
    assert!(doc.soundtrack().is_none());

    doc.register_audio("merged.m4a", 0.0, 5.0).unwrap();
    let track = doc.soundtrack().unwrap();
    assert_eq!(track.file, PathBuf::from("merged.m4a"));
    assert_eq!(track.span.duration(), 5.0);
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/timeline.json");
    let mut doc = TimelineDocument::create_timeline(&[cue("a", 0.0, 2.0)], &[], &[], &no_probe());
    doc.add_item("video", ItemDraft::new("v", 1.0, 4.0).file("c.mp4")).unwrap();
    doc.save(&path).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["totalDuration"], 5.0);
    assert_eq!(raw["tracks"]["video"][0]["type"], "chart");
    assert_eq!(raw["tracks"]["subtitles"][0]["endTime"], 2.0);

    assert_eq!(TimelineDocument::load(&path).unwrap(), doc);
}

#[test]
fn load_recomputes_stale_total_and_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.json");
    std::fs::write(
        &path,
        r#"{"tracks":{"subtitles":[{"id":"s","startTime":1,"duration":2,"text":"x"}]},"totalDuration":42}"#,
    )
    .unwrap();
    assert_eq!(TimelineDocument::load(&path).unwrap().total_duration(), 3.0);

    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(
        TimelineDocument::load(&path),
        Err(SyncError::MalformedDocument { .. })
    ));
    assert!(matches!(
        TimelineDocument::load(&dir.path().join("absent.json")),
        Err(SyncError::DocumentNotFound { .. })
    ));
}

#[test]
fn export_captions_writes_the_subtitle_track() {
    let dir = tempfile::tempdir().unwrap();
    let doc = TimelineDocument::create_timeline(&[cue("hello", 0.0, 2.0)], &[], &[], &no_probe());
    let path = dir.path().join("out.srt");
    assert_eq!(doc.export_captions(&path).unwrap(), TimecodeStyle::Srt);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("1\n00:00:00,000 --> 00:00:02,000\nhello"));
}
