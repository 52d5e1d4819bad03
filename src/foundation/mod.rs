/// JSON configuration file.
pub mod config;
/// Frame rate, canvas, color and frame index types.
pub mod core;
/// Error taxonomy.
pub mod error;
pub(crate) mod math;
