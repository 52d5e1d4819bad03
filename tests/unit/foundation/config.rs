use super::*;

#[test]
fn empty_document_yields_defaults() {
    let cfg = ReelConfig::from_reader("{}".as_bytes()).unwrap();
    assert_eq!(cfg, ReelConfig::default());
    assert_eq!(cfg.video.queue_capacity, 100);
    assert_eq!(cfg.video.stall_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.captions.max_cue_secs, 8.0);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let cfg = ReelConfig::from_reader(
        r#"{"output": {"fps": 25}, "video": {"watermark": null, "title": "AAPL"}}"#.as_bytes(),
    )
    .unwrap();
    assert_eq!(cfg.output.fps, 25);
    assert_eq!(cfg.output.width, 1920);
    assert_eq!(cfg.video.watermark, None);
    assert_eq!(cfg.video.title.as_deref(), Some("AAPL"));
    assert_eq!(cfg.video.queue_capacity, 100);
}

#[test]
fn odd_canvas_is_rejected() {
    let err = ReelConfig::from_reader(r#"{"output": {"width": 1921}}"#.as_bytes()).unwrap_err();
    assert!(err.to_string().contains("even"));
}

#[test]
fn inverted_cue_bounds_are_rejected() {
    let err = ReelConfig::from_reader(
        r#"{"captions": {"minCueSecs": 9.0, "maxCueSecs": 8.0}}"#.as_bytes(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

#[test]
fn zero_queue_capacity_is_rejected() {
    assert!(ReelConfig::from_reader(r#"{"video": {"queueCapacity": 0}}"#.as_bytes()).is_err());
}

#[test]
fn unrepresentable_stall_timeout_is_rejected() {
    let err = ReelConfig::from_reader(r#"{"video": {"stallTimeoutSecs": 1e300}}"#.as_bytes())
        .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert!(err.to_string().contains("stallTimeoutSecs"));

    let unchecked = VideoConfig {
        stall_timeout_secs: 1e300,
        ..VideoConfig::default()
    };
    assert_eq!(unchecked.stall_timeout(), Duration::MAX);
}
