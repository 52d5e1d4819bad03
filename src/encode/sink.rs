use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::SyncResult;
use crate::render::frame::FrameRGBA;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Number of frames the job will push.
    pub frames_total: u64,
}

impl SinkConfig {
    /// Config for a canvas at `fps`.
    pub fn new(canvas: Canvas, fps: Fps, frames_total: u64) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            fps,
            frames_total,
        }
    }
}

/// Sink contract for consuming rendered frames in output order.
///
/// `push_frame` is called with strictly increasing, gap-free indices starting at 0.
pub trait FrameSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> SyncResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> SyncResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> SyncResult<()>;
    /// Called instead of [`FrameSink::end`] when the job aborts; releases resources.
    fn abort(&mut self) {}
}

/// In-memory sink for tests and previews.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    ended: bool,
    aborted: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Captured frames in push order.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// `true` once `end` was called.
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// `true` once `abort` was called.
    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> SyncResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> SyncResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> SyncResult<()> {
        self.ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// Sink that only counts frames; used for dry runs.
#[derive(Debug, Default)]
pub struct NullSink {
    /// Frames received.
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn begin(&mut self, _cfg: SinkConfig) -> SyncResult<()> {
        self.frames = 0;
        Ok(())
    }

    fn push_frame(&mut self, _idx: FrameIndex, _frame: &FrameRGBA) -> SyncResult<()> {
        self.frames += 1;
        Ok(())
    }

    fn end(&mut self) -> SyncResult<()> {
        Ok(())
    }
}
