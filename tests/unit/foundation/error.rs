use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        SyncError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(SyncError::config("x").to_string().contains("config error:"));
    assert!(
        SyncError::timecode("00:00")
            .to_string()
            .contains("malformed timecode: '00:00'")
    );
    assert!(
        SyncError::audio("x")
            .to_string()
            .contains("audio unavailable:")
    );
}

#[test]
fn render_timeout_names_the_stalled_stage() {
    let err = SyncError::RenderTimeout {
        stage: StallStage::Producer,
        frames_written: 12,
        frames_total: 60,
    };
    let msg = err.to_string();
    assert!(msg.contains("producer"));
    assert!(msg.contains("12/60"));

    let err = SyncError::RenderTimeout {
        stage: StallStage::Consumer,
        frames_written: 0,
        frames_total: 60,
    };
    assert!(err.to_string().contains("consumer"));
}

#[test]
fn missing_field_mentions_item_id_when_known() {
    let err = SyncError::MissingRequiredField {
        field: "duration",
        id: Some("subtitle_3".to_owned()),
    };
    assert!(err.to_string().contains("subtitle_3"));
    assert!(err.to_string().contains("duration"));

    let err = SyncError::MissingRequiredField {
        field: "id",
        id: None,
    };
    assert!(err.to_string().contains("<unnamed>"));
}

#[test]
fn encoder_failure_formats_missing_status() {
    let err = SyncError::encoder("ffmpeg", None, "spawn failed");
    assert!(err.to_string().contains("status n/a"));
    let err = SyncError::encoder("ffmpeg", Some(1), "bad filter");
    assert!(err.to_string().contains("status 1"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SyncError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
