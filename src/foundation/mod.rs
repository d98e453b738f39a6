//! Shared primitives: time, geometry and the error type.

/// Time ranges, frame rates, canvases and 2D transforms.
pub mod core;
/// Operation error type.
pub mod error;
