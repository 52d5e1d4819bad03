use super::*;

fn sub(id: &str, start: f64, dur: f64) -> SubtitleItem {
    SubtitleItem {
        id: id.to_owned(),
        span: Span::new(start, dur).unwrap(),
        text: format!("text {id}"),
        style: CaptionStyle::Default,
    }
}

#[test]
fn span_rejects_negative_start_and_empty_duration() {
    assert_eq!(Span::new(-0.1, 1.0), Err(TimingError::InvalidStart));
    assert_eq!(Span::new(0.0, 0.0), Err(TimingError::InvalidDuration));
    assert_eq!(Span::new(0.0, f64::NAN), Err(TimingError::InvalidDuration));
    assert!(Span::new(0.0, 0.001).is_ok());
}

#[test]
fn span_end_is_derived_and_inclusive() {
    let s = Span::new(1.0, 2.0).unwrap();
    assert_eq!(s.end_time(), 3.0);
    assert!(s.contains(1.0));
    assert!(s.contains(3.0));
    assert!(!s.contains(3.0001));
    let moved = s.with(Some(4.0), None).unwrap();
    assert_eq!(moved.end_time(), 6.0);
}

#[test]
fn span_serializes_end_time_and_ignores_it_on_input() {
    let item = sub("subtitle_1", 1.0, 2.0);
    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["startTime"], 1.0);
    assert_eq!(json["endTime"], 3.0);
    assert_eq!(json["style"], "default");

    let stale = r#"{"id":"s","startTime":1,"duration":2,"endTime":99,"text":"x"}"#;
    let back: SubtitleItem = serde_json::from_str(stale).unwrap();
    assert_eq!(back.span.end_time(), 3.0);
}

#[test]
fn invalid_span_in_json_is_rejected() {
    let bad = r#"{"id":"s","startTime":1,"duration":0,"text":"x"}"#;
    assert!(serde_json::from_str::<SubtitleItem>(bad).is_err());
}

#[test]
fn video_kind_accepts_stock_chart_alias() {
    let v: VideoItem =
        serde_json::from_str(r#"{"id":"v","startTime":0,"duration":1,"file":"a.mp4","type":"stock_chart"}"#)
            .unwrap();
    assert_eq!(v.kind, VideoKind::Chart);
}

#[test]
fn track_kind_parses_known_names_only() {
    assert_eq!("audio".parse::<TrackKind>().unwrap(), TrackKind::Audio);
    let err = "images".parse::<TrackKind>().unwrap_err();
    assert!(matches!(err, SyncError::InvalidTrack { ref name } if name == "images"));
}

#[test]
fn track_keeps_insertion_order_and_rejects_duplicates() {
    let mut t = Track::new();
    t.push(sub("b", 5.0, 1.0)).unwrap();
    t.push(sub("a", 0.0, 1.0)).unwrap();
    let err = t.push(sub("a", 2.0, 1.0)).unwrap_err();
    assert!(matches!(err, SyncError::DuplicateItem { .. }));
    let ids: Vec<_> = t.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["b", "a"]);
}

#[test]
fn track_remove_reindexes_later_items() {
    let mut t = Track::from_items(vec![sub("a", 0.0, 1.0), sub("b", 1.0, 1.0), sub("c", 2.0, 1.0)])
        .unwrap();
    assert_eq!(t.remove("a").map(|i| i.id), Some("a".to_owned()));
    assert_eq!(t.get("c").map(|i| i.span.start_time()), Some(2.0));
    assert!(t.remove("a").is_none());
    assert_eq!(t.max_end(), Some(3.0));
}

#[test]
fn next_id_skips_taken_ids() {
    let t = Track::from_items(vec![sub("subtitle_2", 0.0, 1.0)]).unwrap();
    assert_eq!(t.next_id(), "subtitle_3");
    let empty: Track<SubtitleItem> = Track::new();
    assert_eq!(empty.next_id(), "subtitle_1");
}

#[test]
fn duplicate_ids_in_json_track_fail() {
    let json = r#"[{"id":"a","startTime":0,"duration":1,"text":"x"},{"id":"a","startTime":1,"duration":1,"text":"y"}]"#;
    assert!(serde_json::from_str::<Track<SubtitleItem>>(json).is_err());
}

#[test]
fn draft_reports_missing_fields() {
    let err = ItemDraft::default().into_item(TrackKind::Subtitles).unwrap_err();
    assert!(matches!(err, SyncError::MissingRequiredField { field: "id", id: None }));

    let draft = ItemDraft {
        id: Some("x".into()),
        start_time: Some(0.0),
        ..ItemDraft::default()
    };
    let err = draft.into_item(TrackKind::Subtitles).unwrap_err();
    assert!(matches!(err, SyncError::MissingRequiredField { field: "duration", .. }));

    let err = ItemDraft::new("v", 0.0, 1.0).into_item(TrackKind::Video).unwrap_err();
    assert!(matches!(err, SyncError::MissingRequiredField { field: "file", .. }));
}

#[test]
fn draft_builds_the_track_variant() {
    let item = ItemDraft::new("v1", 2.0, 3.0)
        .file("chart.mp4")
        .kind(VideoKind::Overlay)
        .into_item(TrackKind::Video)
        .unwrap();
    assert_eq!(item.track(), TrackKind::Video);
    assert_eq!(item.span().end_time(), 5.0);
    let TimelineItem::Video(v) = item else {
        panic!("expected a video item");
    };
    assert_eq!(v.kind, VideoKind::Overlay);
}
