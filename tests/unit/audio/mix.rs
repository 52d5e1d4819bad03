use super::*;
use std::collections::HashMap;

struct FakeDecoder(HashMap<PathBuf, AudioPcm>);

impl FakeDecoder {
    fn with(clips: &[(&str, f64, f32)]) -> Self {
        Self(
            clips
                .iter()
                .map(|&(name, secs, level)| {
                    let frames = (secs * f64::from(MIX_SAMPLE_RATE)) as usize;
                    (
                        PathBuf::from(name),
                        AudioPcm {
                            interleaved_f32: vec![level; frames * 2],
                            ..AudioPcm::empty()
                        },
                    )
                })
                .collect(),
        )
    }
}

impl ClipDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> SyncResult<AudioPcm> {
        self.0.get(path).cloned().ok_or_else(|| SyncError::DocumentNotFound {
            path: path.to_path_buf(),
        })
    }
}

#[test]
fn overlapping_clips_span_the_latest_end() {
    let dec = FakeDecoder::with(&[("a.wav", 2.0, 0.25), ("b.wav", 1.0, 0.25)]);
    let clips = [AudioClip::new("b.wav", 1.0), AudioClip::new("a.wav", 0.0)];
    let mixed = mix_clips(&clips, &dec).unwrap();
    assert_eq!(mixed.pcm.duration_secs(), 2.0);
    assert_eq!(mixed.clips_mixed, 2);

    let at = |secs: f64| mixed.pcm.interleaved_f32[(secs * 48_000.0) as usize * 2];
    assert_eq!(at(0.5), 0.25);
    assert_eq!(at(1.5), 0.5);
}

#[test]
fn sums_are_clamped() {
    let dec = FakeDecoder::with(&[("a.wav", 1.0, 0.75), ("b.wav", 1.0, 0.75)]);
    let mixed = mix_clips(&[AudioClip::new("a.wav", 0.0), AudioClip::new("b.wav", 0.0)], &dec).unwrap();
    assert!(mixed.pcm.interleaved_f32.iter().all(|&s| s == 1.0));
}

#[test]
fn unreadable_clips_are_skipped() {
    let dec = FakeDecoder::with(&[("a.wav", 1.0, 0.1)]);
    let mixed = mix_clips(&[AudioClip::new("missing.wav", 3.0), AudioClip::new("a.wav", 0.5)], &dec)
        .unwrap();
    assert_eq!(mixed.clips_skipped, 1);
    assert_eq!(mixed.pcm.duration_secs(), 1.5);
}

#[test]
fn mono_input_is_upmixed() {
    let mut dec = FakeDecoder::with(&[]);
    dec.0.insert(
        PathBuf::from("mono.wav"),
        AudioPcm {
            sample_rate: MIX_SAMPLE_RATE,
            channels: 1,
            interleaved_f32: vec![0.5; 480],
        },
    );
    let mixed = mix_clips(&[AudioClip::new("mono.wav", 0.0)], &dec).unwrap();
    assert_eq!(mixed.pcm.frames(), 480);
    assert_eq!(mixed.pcm.interleaved_f32.len(), 960);
}

#[test]
fn empty_or_unusable_inputs_fail() {
    let dec = FakeDecoder::with(&[]);
    assert!(matches!(mix_clips(&[], &dec), Err(SyncError::AudioUnavailable(_))));
    assert!(matches!(
        mix_clips(&[AudioClip::new("nope.wav", 0.0)], &dec),
        Err(SyncError::AudioUnavailable(_))
    ));
}

#[test]
fn raw_target_is_written_without_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("mix.f32le");
    let dec = FakeDecoder::with(&[("a.wav", 0.5, 0.2)]);
    let merged = merge_audio_clips(&[AudioClip::new("a.wav", 0.0)], &out, &dec).unwrap();
    assert_eq!(merged.duration_secs, 0.5);
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(bytes.len(), 24_000 * 2 * 4);
}
