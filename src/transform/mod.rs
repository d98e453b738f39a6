//! Spatial edits compiled to affine track transforms.

/// Spatial operation compiler.
pub mod compile;
