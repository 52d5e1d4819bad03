//! Frame composition and the producer/consumer render job.

/// Per-frame composition and its collaborators.
pub mod compose;
/// Owned RGBA frames.
pub mod frame;
/// Bounded-queue render job.
pub mod pipeline;
/// SVG-backed text rasterization.
pub mod text;
