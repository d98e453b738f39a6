//! The composition model and its builder.

/// Composition construction from sources and edits.
pub mod builder;
/// Tracks, compositions and their validation.
pub mod model;
