//! Volume ramps.

/// Volume operation compiler and gain envelope.
pub mod mix;
