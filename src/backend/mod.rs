//! Decoder/encoder backends.
//!
//! The engine owns no decode or encode logic. A backend reports the streams of a source and
//! renders a [`Composition`] into a file; everything else (timelines, transforms, ramps,
//! job lifecycle) is backend-agnostic.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::export::format::OutputFormat;
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{Locator, MediaItem, ProbedSource, TrackDescriptor};
use crate::timeline::model::Composition;

pub mod cpu;
pub mod ffmpeg;
pub mod filter_graph;

/// Reads source track metadata and renders compositions.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Streams found at `locator`.
    async fn open(&self, locator: &Locator) -> OperationResult<Vec<TrackDescriptor>>;

    /// Render `composition` into `destination` as `format`.
    ///
    /// Implementations should watch `cancel` and return [`OperationError::Cancelled`] once it
    /// fires; whatever they leave at `destination` is removed by the job.
    async fn export(
        &self,
        composition: &Composition,
        format: OutputFormat,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> OperationResult<()>;
}

/// Open `item` and pair it with its streams. Any failure is reported as unreadable.
pub async fn probe_source(
    backend: &dyn MediaBackend,
    item: &MediaItem,
) -> OperationResult<ProbedSource> {
    let tracks = backend.open(&item.locator).await.map_err(|e| match e {
        OperationError::SourceUnreadable(_) => e,
        other => OperationError::source_unreadable(format!("'{}': {other}", item.locator)),
    })?;
    ProbedSource::new(item.clone(), tracks)
}

/// Describe the file at `locator` as a new source item.
pub async fn open_item(backend: &dyn MediaBackend, locator: Locator) -> OperationResult<MediaItem> {
    let tracks = backend.open(&locator).await?;
    MediaItem::from_tracks(locator, &tracks)
}
