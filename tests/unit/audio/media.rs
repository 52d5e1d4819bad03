use super::*;

#[test]
fn f32le_bytes_decode_in_order() {
    let mut bytes = Vec::new();
    for s in [0.5f32, -1.0, 0.25] {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    assert_eq!(pcm_from_f32le(&bytes).unwrap(), vec![0.5, -1.0, 0.25]);
    assert!(pcm_from_f32le(&bytes[..5]).is_err());
}

#[test]
fn pcm_duration_counts_stereo_frames() {
    let pcm = AudioPcm {
        interleaved_f32: vec![0.0; MIX_SAMPLE_RATE as usize * 2 * 3],
        ..AudioPcm::empty()
    };
    assert_eq!(pcm.frames(), MIX_SAMPLE_RATE as usize * 3);
    assert_eq!(pcm.duration_secs(), 3.0);
}

#[test]
fn missing_files_are_not_found() {
    let missing = Path::new("/definitely/not/here.wav");
    assert!(matches!(
        probe_duration_secs(missing),
        Err(SyncError::DocumentNotFound { .. })
    ));
    assert!(matches!(
        probe_video_size(missing),
        Err(SyncError::DocumentNotFound { .. })
    ));
    assert!(matches!(
        FfmpegDecoder.decode(missing),
        Err(SyncError::DocumentNotFound { .. })
    ));
}
