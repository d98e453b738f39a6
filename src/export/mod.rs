//! Export jobs, output formats and output storage.

/// Output containers.
pub mod format;
/// Asynchronous export job.
pub mod job;
/// Output locations.
pub mod storage;
