use super::*;
use crate::encode::sink::InMemorySink;
use crate::foundation::core::Rgba8;
use crate::timeline::model::{Cue, Span};

#[derive(Clone, Default)]
struct TestComposer {
    fail_at: Option<u64>,
    fail_set: Vec<u64>,
    panic_at: Option<u64>,
    wrong_size_at: Option<u64>,
    sleep_at: Option<(u64, Duration)>,
}

fn canvas() -> Canvas {
    Canvas::new(4, 2).unwrap()
}

impl FrameComposer for TestComposer {
    fn canvas(&self) -> Canvas {
        canvas()
    }

    fn compose(&mut self, idx: FrameIndex, _t: f64) -> SyncResult<FrameRGBA> {
        if let Some((at, d)) = self.sleep_at
            && idx.0 == at
        {
            std::thread::sleep(d);
        }
        if self.fail_at == Some(idx.0) || self.fail_set.contains(&idx.0) {
            return Err(SyncError::validation("chart collaborator failed"));
        }
        if self.panic_at == Some(idx.0) {
            panic!("composer exploded at {}", idx.0);
        }
        if self.wrong_size_at == Some(idx.0) {
            return Ok(FrameRGBA::solid(Canvas::new(2, 2).unwrap(), Rgba8::rgb(0, 0, 0)));
        }
        Ok(FrameRGBA::solid(canvas(), Rgba8::rgb(idx.0 as u8, 0, 0)))
    }
}

struct SlowSink {
    inner: InMemorySink,
    delay: Duration,
}

impl FrameSink for SlowSink {
    fn begin(&mut self, cfg: SinkConfig) -> SyncResult<()> {
        self.inner.begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> SyncResult<()> {
        std::thread::sleep(self.delay);
        self.inner.push_frame(idx, frame)
    }

    fn end(&mut self) -> SyncResult<()> {
        self.inner.end()
    }

    fn abort(&mut self) {
        self.inner.abort();
    }
}

struct RejectingSink {
    inner: InMemorySink,
    reject_at: u64,
}

impl FrameSink for RejectingSink {
    fn begin(&mut self, cfg: SinkConfig) -> SyncResult<()> {
        self.inner.begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> SyncResult<()> {
        if idx.0 == self.reject_at {
            return Err(SyncError::encoder("ffmpeg", None, "broken pipe"));
        }
        self.inner.push_frame(idx, frame)
    }

    fn end(&mut self) -> SyncResult<()> {
        self.inner.end()
    }

    fn abort(&mut self) {
        self.inner.abort();
    }
}

fn fps30() -> Fps {
    Fps::integer(30).unwrap()
}

fn assert_in_order(sink: &InMemorySink, total: u64) {
    assert_eq!(sink.frames().len() as u64, total);
    for (i, (idx, _)) in sink.frames().iter().enumerate() {
        assert_eq!(idx.0, i as u64);
    }
}

#[test]
fn two_seconds_at_thirty_fps_writes_sixty_frames() {
    let mut job = RenderJob::new(TestComposer::default(), fps30(), 2.0);
    let mut sink = InMemorySink::new();
    let report = job.run(&mut sink).unwrap();

    assert_eq!(report.state, JobState::Done);
    assert_eq!(job.state(), JobState::Done);
    assert_eq!((report.frames_total, report.frames_written), (60, 60));
    assert_eq!((report.frames_composed, report.frames_placeholder), (60, 0));
    assert!(!report.muxed);
    assert_eq!(report.output, None);
    assert_in_order(&sink, 60);
    assert!(sink.ended());
    assert_eq!(sink.config().unwrap().frames_total, 60);
    assert_eq!(sink.frames()[7].1.pixel(0, 0), Some([7, 0, 0, 255]));
}

#[test]
fn failed_composition_fills_the_rest_with_error_frames() {
    let composer = TestComposer {
        fail_at: Some(20),
        ..TestComposer::default()
    };
    let mut job = RenderJob::new(composer, fps30(), 2.0);
    let mut sink = InMemorySink::new();
    let report = job.run(&mut sink).unwrap();

    assert_eq!(report.frames_written, 60);
    assert_eq!((report.frames_composed, report.frames_placeholder), (20, 40));
    assert_in_order(&sink, 60);
    let placeholder = FrameRGBA::solid(canvas(), ERROR_FRAME_COLOR);
    assert_eq!(sink.frames()[19].1.pixel(0, 0), Some([19, 0, 0, 255]));
    assert!(sink.frames()[20..].iter().all(|(_, f)| *f == placeholder));
}

#[test]
fn failures_at_scattered_indices_still_write_every_frame() {
    let composer = TestComposer {
        fail_set: vec![0, 17, 59],
        ..TestComposer::default()
    };
    let mut job = RenderJob::new(composer, fps30(), 2.0);
    let mut sink = InMemorySink::new();
    let report = job.run(&mut sink).unwrap();

    assert_eq!(report.state, JobState::Done);
    assert_eq!(report.frames_written, 60);
    assert_eq!((report.frames_composed, report.frames_placeholder), (0, 60));
    assert_in_order(&sink, 60);
    let placeholder = FrameRGBA::solid(canvas(), ERROR_FRAME_COLOR);
    assert!(sink.frames().iter().all(|(_, f)| *f == placeholder));
    assert!(sink.ended());
}

#[test]
fn panicking_composition_is_contained() {
    let composer = TestComposer {
        panic_at: Some(5),
        ..TestComposer::default()
    };
    let mut job = RenderJob::new(composer, fps30(), 2.0);
    let mut sink = InMemorySink::new();
    let report = job.run(&mut sink).unwrap();
    assert_eq!(report.frames_written, 60);
    assert_eq!(report.frames_placeholder, 55);
    assert_in_order(&sink, 60);
}

#[test]
fn wrongly_sized_frames_are_replaced() {
    let composer = TestComposer {
        wrong_size_at: Some(59),
        ..TestComposer::default()
    };
    let mut job = RenderJob::new(composer, fps30(), 2.0);
    let mut sink = InMemorySink::new();
    let report = job.run(&mut sink).unwrap();
    assert_eq!(report.frames_placeholder, 1);
    assert!(sink.frames()[59].1.matches(canvas()));
}

#[test]
fn partial_final_frame_rounds_up() {
    let job = RenderJob::new(TestComposer::default(), fps30(), 1.01);
    assert_eq!(job.frames_total(), 31);
}

#[test]
fn slow_producer_times_out() {
    let composer = TestComposer {
        sleep_at: Some((3, Duration::from_millis(400))),
        ..TestComposer::default()
    };
    let mut job = RenderJob::new(composer, fps30(), 1.0).with_stall_timeout(Duration::from_millis(50));
    let mut sink = InMemorySink::new();
    let err = job.run(&mut sink).unwrap_err();

    match err {
        SyncError::RenderTimeout {
            stage,
            frames_written,
            frames_total,
        } => {
            assert_eq!(stage, StallStage::Producer);
            assert_eq!(frames_written, 3);
            assert_eq!(frames_total, 30);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(job.state(), JobState::Aborted);
    assert!(sink.aborted());
    assert!(!sink.ended());
}

#[test]
fn slow_consumer_times_out() {
    let mut job = RenderJob::new(TestComposer::default(), Fps::integer(10).unwrap(), 1.0)
        .with_queue_capacity(1)
        .with_stall_timeout(Duration::from_millis(50));
    let mut sink = SlowSink {
        inner: InMemorySink::new(),
        delay: Duration::from_millis(250),
    };
    let err = job.run(&mut sink).unwrap_err();

    match err {
        SyncError::RenderTimeout {
            stage,
            frames_written,
            frames_total,
        } => {
            assert_eq!(stage, StallStage::Consumer);
            assert!(frames_written < frames_total);
            assert_eq!(frames_total, 10);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sink.inner.aborted());
    assert_eq!(job.state(), JobState::Aborted);
}

#[test]
fn sink_errors_abort_the_job() {
    let mut job = RenderJob::new(TestComposer::default(), fps30(), 1.0);
    let mut sink = RejectingSink {
        inner: InMemorySink::new(),
        reject_at: 3,
    };
    let err = job.run(&mut sink).unwrap_err();
    assert!(matches!(err, SyncError::EncoderProcessFailure { .. }));
    assert_eq!(sink.inner.frames().len(), 3);
    assert!(sink.inner.aborted());
    assert_eq!(job.state(), JobState::Aborted);
}

#[test]
fn a_job_runs_once() {
    let mut job = RenderJob::new(TestComposer::default(), fps30(), 0.1);
    let mut sink = InMemorySink::new();
    job.run(&mut sink).unwrap();
    assert!(job.run(&mut sink).is_err());
}

#[test]
fn empty_sessions_are_rejected() {
    let mut job = RenderJob::new(TestComposer::default(), fps30(), 0.0);
    let mut sink = InMemorySink::new();
    assert!(job.run(&mut sink).is_err());
    assert!(sink.config().is_none());
}

#[test]
fn mux_failure_keeps_the_silent_video() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("silent.mp4");
    let audio = dir.path().join("missing.m4a");
    let mut job = RenderJob::new(TestComposer::default(), fps30(), 0.1).with_audio(&video, &audio);
    let mut sink = InMemorySink::new();
    let report = job.run(&mut sink).unwrap();
    assert_eq!(report.state, JobState::Done);
    assert!(!report.muxed);
    assert_eq!(report.output, Some(video));
}

#[test]
fn session_duration_prefers_audio_then_captions_then_fallback() {
    let mut doc = TimelineDocument::new();
    assert_eq!(session_duration(&doc, None, 60.0), 60.0);
    assert_eq!(session_duration(&doc, Some(0.0), 60.0), 60.0);

    doc.import_cues(vec![
        Cue::new("a", Span::new(0.0, 2.0).unwrap()),
        Cue::new("b", Span::new(2.0, 3.5).unwrap()),
    ])
    .unwrap();
    assert_eq!(session_duration(&doc, None, 60.0), 5.5);
    assert_eq!(session_duration(&doc, Some(12.25), 60.0), 12.25);
}
