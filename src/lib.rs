//! Montage is a timeline composition and asynchronous export engine for media edits.
//!
//! Every edit (trim, crop, speed, fades, concatenation, format conversion, ...) is expressed
//! the same way: build a virtual multi-track timeline from source items, then render it into
//! a new item through an export job.
//!
//! # Pipeline overview
//!
//! 1. **Dispatch**: [`FeatureRegistry::dispatch`] resolves an operation id, checks that it
//!    applies to the asset and parses its parameters into an [`OperationRequest`].
//! 2. **Build**: [`TimelineBuilder`] lays out tracks, compiling spatial edits into a static
//!    [`Transform2D`] and volume edits into [`AudioMixSegment`] ramps.
//! 3. **Export**: an [`ExportJob`] renders the [`Composition`] on its own tokio task through a
//!    [`MediaBackend`] and resolves to a new [`MediaItem`].
//!
//! Two backends ship with the crate: [`backend::ffmpeg::FfmpegBackend`] drives the system
//! `ffmpeg`/`ffprobe` binaries, and [`backend::cpu::CpuBackend`] is a deterministic in-process
//! reference renderer.
//!
//! The library logs through `tracing` and never installs a subscriber.
#![forbid(unsafe_code)]

mod audio;
mod export;
mod foundation;
mod media;
mod registry;
mod timeline;
mod transform;

/// Decoder/encoder backends.
pub mod backend;
/// Engine configuration.
pub mod config;

pub use crate::audio::mix::{AudioMixSegment, VolumeOp, compile_volume, envelope_gain};
pub use crate::backend::{MediaBackend, open_item, probe_source};
pub use crate::config::{EngineConfig, FfmpegConfig};
pub use crate::export::format::OutputFormat;
pub use crate::export::job::{ExportJob, JobHandle, JobId, JobState};
pub use crate::export::storage::{ScratchStorage, Storage};
pub use crate::foundation::core::{
    Affine, Canvas, Fps, Point, Rect, TIME_EPSILON, TimeRange, TrackId, Transform2D, Vec2,
};
pub use crate::foundation::error::{OperationError, OperationResult};
pub use crate::media::item::{
    Locator, MediaId, MediaItem, MediaKind, ProbedSource, TrackDescriptor, TrackKind,
};
pub use crate::registry::operation::{Operation, OperationDescriptor};
pub use crate::registry::params::{ParamSpec, ParamType, ParamValue, Params, check_schema};
pub use crate::registry::request::OperationRequest;
pub use crate::registry::run::RunContext;
pub use crate::registry::table::FeatureRegistry;
pub use crate::timeline::builder::{ConcatEntry, SingleAssetEdit, TimelineBuilder};
pub use crate::timeline::model::{Composition, MetadataPolicy, Track};
pub use crate::transform::compile::{CompiledTransform, SpatialOp, compile_transform};
