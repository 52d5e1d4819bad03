//! Producer/consumer frame render job with a bounded queue, stall detection and placeholder fill.
//!
//! The producer thread composes frames and sends them over a bounded channel; the calling thread
//! drains the channel into a [`FrameSink`]. Both sides wait at most the stall timeout. A frame
//! that fails to compose (or panics) is replaced, together with every frame after it, by the
//! composer's fixed error frame so the sink always receives the full frame count.

use crate::encode::process::mux_in_place;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::config::{EncoderSettings, VideoConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{StallStage, SyncError, SyncResult};
use crate::render::compose::{ERROR_FRAME_COLOR, FrameComposer};
use crate::render::frame::FrameRGBA;
use crate::timeline::store::TimelineDocument;
use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, Sender};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

/// Lifecycle of a [`RenderJob`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Created, not started.
    Idle,
    /// Frames are being composed and written.
    Producing,
    /// All frames written; waiting for the producer to finish.
    Draining,
    /// Stopped by a stall or an error.
    Aborted,
    /// Closing the sink and muxing audio.
    Finalizing,
    /// Finished successfully.
    Done,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Producing => "producing",
            Self::Draining => "draining",
            Self::Aborted => "aborted",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful render job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderReport {
    /// Final job state.
    pub state: JobState,
    /// Frames the job required.
    pub frames_total: u64,
    /// Frames the sink received.
    pub frames_written: u64,
    /// Frames produced by the composer.
    pub frames_composed: u64,
    /// Error frames sent in place of failed compositions.
    pub frames_placeholder: u64,
    /// Video file audio was muxed into, when muxing was requested.
    pub output: Option<PathBuf>,
    /// Whether audio was muxed into `output`.
    pub muxed: bool,
}

/// Resolve how long a render session lasts.
///
/// Audio length wins, then the end of the last subtitle, then the document total, then `fallback`.
pub fn session_duration(doc: &TimelineDocument, audio_secs: Option<f64>, fallback: f64) -> f64 {
    if let Some(a) = audio_secs.filter(|a| a.is_finite() && *a > 0.0) {
        return a;
    }
    if let Some(end) = doc.subtitles().max_end().filter(|e| *e > 0.0) {
        return end;
    }
    let total = doc.total_duration();
    if total > 0.0 { total } else { fallback }
}

enum FrameMsg {
    Frame {
        idx: FrameIndex,
        frame: FrameRGBA,
        placeholder: bool,
    },
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProducerExit {
    Completed,
    Stalled { sent: u64 },
    Cancelled,
}

struct Muxing {
    video: PathBuf,
    audio: PathBuf,
}

/// A single render: composes `frames_total` frames and writes them to a sink.
pub struct RenderJob {
    composer: Option<Box<dyn FrameComposer>>,
    fps: Fps,
    duration_secs: f64,
    queue_capacity: usize,
    stall_timeout: Duration,
    mux: Option<Muxing>,
    settings: EncoderSettings,
    state: JobState,
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("fps", &self.fps)
            .field("duration_secs", &self.duration_secs)
            .field("queue_capacity", &self.queue_capacity)
            .field("stall_timeout", &self.stall_timeout)
            .field("state", &self.state)
            .finish()
    }
}

impl RenderJob {
    /// Job rendering `duration_secs` of `composer` output at `fps`.
    pub fn new(composer: impl FrameComposer + 'static, fps: Fps, duration_secs: f64) -> Self {
        let video = VideoConfig::default();
        Self {
            composer: Some(Box::new(composer)),
            fps,
            duration_secs,
            queue_capacity: video.queue_capacity,
            stall_timeout: video.stall_timeout(),
            mux: None,
            settings: EncoderSettings::default(),
            state: JobState::Idle,
        }
    }

    /// Take queue capacity and stall timeout from `video`.
    pub fn with_video_config(self, video: &VideoConfig) -> Self {
        self.with_queue_capacity(video.queue_capacity)
            .with_stall_timeout(video.stall_timeout())
    }

    /// Bounded queue capacity (at least 1).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Longest wait on either side of the queue.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// After the sink ends, mux `audio` into the video file the sink wrote.
    pub fn with_audio(mut self, video: impl Into<PathBuf>, audio: impl Into<PathBuf>) -> Self {
        self.mux = Some(Muxing {
            video: video.into(),
            audio: audio.into(),
        });
        self
    }

    /// Encoder settings used for muxing.
    pub fn with_settings(mut self, settings: EncoderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// `ceil(duration * fps)`.
    pub fn frames_total(&self) -> u64 {
        self.fps.frames_to_cover(self.duration_secs)
    }

    fn transition(&mut self, next: JobState) {
        tracing::info!(from = %self.state, to = %next, "render job state");
        self.state = next;
    }

    fn abort(&mut self, sink: &mut dyn FrameSink, err: SyncError) -> SyncError {
        sink.abort();
        self.transition(JobState::Aborted);
        err
    }

    /// Run the job to completion, writing every frame to `sink`.
    #[tracing::instrument(skip_all, fields(fps = %format!("{}/{}", self.fps.num, self.fps.den), duration = self.duration_secs))]
    pub fn run(&mut self, sink: &mut dyn FrameSink) -> SyncResult<RenderReport> {
        let composer = self
            .composer
            .take()
            .ok_or_else(|| SyncError::validation("render job has already run"))?;
        let total = self.frames_total();
        if total == 0 {
            return Err(SyncError::validation("render session has no frames"));
        }
        let canvas = composer.canvas();
        sink.begin(SinkConfig::new(canvas, self.fps, total))?;

        let (tx, rx) = crossbeam_channel::bounded::<FrameMsg>(self.queue_capacity.max(1));
        let (fps, timeout) = (self.fps, self.stall_timeout);
        let producer = std::thread::Builder::new()
            .name("reelsync-producer".into())
            .spawn(move || produce(composer, canvas, fps, total, &tx, timeout))
            .map_err(|e| {
                sink.abort();
                anyhow::anyhow!("failed to spawn producer thread: {e}")
            })?;
        self.transition(JobState::Producing);

        let mut written = 0u64;
        let mut placeholders = 0u64;
        while written < total {
            match rx.recv_timeout(timeout) {
                Ok(FrameMsg::Frame {
                    idx,
                    frame,
                    placeholder,
                }) => {
                    if let Err(e) = sink.push_frame(idx, &frame) {
                        tracing::error!(frame = idx.0, error = %e, "sink rejected frame");
                        drop(rx);
                        let _ = producer.join();
                        return Err(self.abort(sink, e));
                    }
                    written += 1;
                    placeholders += u64::from(placeholder);
                }
                Ok(FrameMsg::Done) => break,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::error!(stage = %StallStage::Producer, frames_written = written, frames_total = total, "render queue stalled");
                    // The producer may be stuck inside the composer; leave it detached.
                    drop(rx);
                    drop(producer);
                    let err = SyncError::RenderTimeout {
                        stage: StallStage::Producer,
                        frames_written: written,
                        frames_total: total,
                    };
                    return Err(self.abort(sink, err));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let err = match producer.join() {
                        Ok(ProducerExit::Stalled { sent }) => {
                            tracing::error!(stage = %StallStage::Consumer, frames_sent = sent, frames_written = written, frames_total = total, "render queue stalled");
                            SyncError::RenderTimeout {
                                stage: StallStage::Consumer,
                                frames_written: written,
                                frames_total: total,
                            }
                        }
                        Ok(exit) => SyncError::validation(format!(
                            "producer stopped early ({exit:?}) after {written}/{total} frames"
                        )),
                        Err(_) => SyncError::validation("producer thread panicked"),
                    };
                    return Err(self.abort(sink, err));
                }
            }
        }

        if written < total {
            let err = SyncError::validation(format!(
                "producer finished after {written}/{total} frames"
            ));
            drop(rx);
            let _ = producer.join();
            return Err(self.abort(sink, err));
        }

        self.transition(JobState::Draining);
        match rx.recv_timeout(timeout) {
            Ok(FrameMsg::Done) | Err(RecvTimeoutError::Disconnected) => match producer.join() {
                Ok(exit) => tracing::debug!(?exit, "producer joined"),
                Err(_) => tracing::warn!("producer thread panicked after its last frame"),
            },
            Ok(FrameMsg::Frame { idx, .. }) => {
                tracing::warn!(frame = idx.0, "producer sent a frame past the end; ignoring");
                drop(rx);
                let _ = producer.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    stage = %StallStage::Producer,
                    "completion sentinel not received in time; finishing without it"
                );
                drop(producer);
            }
        }

        self.transition(JobState::Finalizing);
        if let Err(e) = sink.end() {
            tracing::error!(error = %e, "sink failed to finish");
            self.transition(JobState::Aborted);
            return Err(e);
        }

        let mut muxed = false;
        let output = self.mux.as_ref().map(|m| m.video.clone());
        if let Some(m) = self.mux.as_ref() {
            match mux_in_place(&m.video, &m.audio, &self.settings) {
                Ok(()) => muxed = true,
                Err(e) => tracing::warn!(
                    path = %m.video.display(),
                    error = %e,
                    "audio mux failed; keeping silent video"
                ),
            }
        }

        self.transition(JobState::Done);
        let report = RenderReport {
            state: self.state,
            frames_total: total,
            frames_written: written,
            frames_composed: written - placeholders,
            frames_placeholder: placeholders,
            output,
            muxed,
        };
        tracing::info!(
            frames = report.frames_written,
            placeholders = report.frames_placeholder,
            muxed = report.muxed,
            "render finished"
        );
        Ok(report)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn error_frame_for(composer: &dyn FrameComposer, canvas: Canvas) -> FrameRGBA {
    match catch_unwind(AssertUnwindSafe(|| composer.error_frame())) {
        Ok(f) if f.matches(canvas) => f,
        _ => FrameRGBA::solid(canvas, ERROR_FRAME_COLOR),
    }
}

fn produce(
    mut composer: Box<dyn FrameComposer>,
    canvas: Canvas,
    fps: Fps,
    total: u64,
    tx: &Sender<FrameMsg>,
    timeout: Duration,
) -> ProducerExit {
    let mut error_frame: Option<FrameRGBA> = None;

    for i in 0..total {
        let idx = FrameIndex(i);
        let (frame, placeholder) = match &error_frame {
            Some(f) => (f.clone(), true),
            None => {
                let t = fps.frame_time_secs(idx);
                let failure = match catch_unwind(AssertUnwindSafe(|| composer.compose(idx, t))) {
                    Ok(Ok(f)) if f.matches(canvas) => Ok(f),
                    Ok(Ok(f)) => Err(format!(
                        "composed frame is {}x{}, expected {}x{}",
                        f.width, f.height, canvas.width, canvas.height
                    )),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(payload) => Err(format!("panic: {}", panic_message(payload.as_ref()))),
                };
                match failure {
                    Ok(f) => (f, false),
                    Err(reason) => {
                        tracing::error!(frame = i, %reason, "frame composition failed; filling the rest with error frames");
                        let f = error_frame_for(composer.as_ref(), canvas);
                        error_frame = Some(f.clone());
                        (f, true)
                    }
                }
            }
        };

        match tx.send_timeout(
            FrameMsg::Frame {
                idx,
                frame,
                placeholder,
            },
            timeout,
        ) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                tracing::warn!(stage = %StallStage::Consumer, frame = i, "queue full past the stall timeout");
                return ProducerExit::Stalled { sent: i };
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                tracing::debug!(frame = i, "consumer went away; producer stopping");
                return ProducerExit::Cancelled;
            }
        }
    }

    if tx.send_timeout(FrameMsg::Done, timeout).is_err() {
        tracing::debug!("completion sentinel not delivered");
    }
    ProducerExit::Completed
}

#[cfg(test)]
#[path = "../../tests/unit/render/pipeline.rs"]
mod tests;
