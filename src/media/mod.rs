//! Media items and the streams a backend reports for them.

/// Media descriptors.
pub mod item;
