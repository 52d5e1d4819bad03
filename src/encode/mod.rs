//! Frame sinks and external encoder invocations.
//!
//! Sinks consume composed frames in output order and are driven by [`crate::RenderJob`].

/// `ffmpeg`-based video sink (silent H.264 via system `ffmpeg`).
pub mod ffmpeg;
/// Synchronous `ffmpeg` helpers: probing `PATH`, captured runs, audio muxing.
pub mod process;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
