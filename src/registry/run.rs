//! Operation bodies: probe, build a timeline, export.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::{MediaBackend, probe_source};
use crate::export::format::OutputFormat;
use crate::export::job::ExportJob;
use crate::export::storage::Storage;
use crate::foundation::core::{Fps, TimeRange};
use crate::foundation::error::OperationResult;
use crate::media::item::{MediaItem, ProbedSource, TrackKind};
use crate::registry::request::OperationRequest;
use crate::timeline::builder::{ConcatEntry, SingleAssetEdit, TimelineBuilder};

/// Collaborators shared by every dispatch.
#[derive(Clone)]
pub struct RunContext {
    pub backend: Arc<dyn MediaBackend>,
    pub storage: Arc<dyn Storage>,
    /// Parent of every job's cancellation token.
    pub cancel: CancellationToken,
    pub default_frame_rate: Fps,
}

impl RunContext {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        storage: Arc<dyn Storage>,
        default_frame_rate: Fps,
    ) -> Self {
        Self {
            backend,
            storage,
            cancel: CancellationToken::new(),
            default_frame_rate,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("backend", &self.backend.name())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("default_frame_rate", &self.default_frame_rate)
            .finish_non_exhaustive()
    }
}

/// Run a parsed request against `asset` and wait for its export.
pub(crate) async fn run(
    request: OperationRequest,
    asset: &MediaItem,
    ctx: &RunContext,
) -> OperationResult<MediaItem> {
    let source = probe_source(ctx.backend.as_ref(), asset).await?;
    let builder = TimelineBuilder::new(ctx.default_frame_rate);
    let default_format = OutputFormat::default_for(asset.kind);

    let (builder, format) = match request {
        OperationRequest::Trim { window } => (
            builder.single(
                &source,
                &SingleAssetEdit {
                    window: Some(window),
                    ..SingleAssetEdit::default()
                },
            )?,
            default_format,
        ),
        OperationRequest::Concat { others, kinds } => {
            let mut probed = vec![source];
            for other in &others {
                probed.push(probe_source(ctx.backend.as_ref(), other).await?);
            }
            let entries: Vec<ConcatEntry<'_>> = probed.iter().map(ConcatEntry::whole).collect();
            (builder.concatenate(&entries, &kinds)?, default_format)
        }
        OperationRequest::Spatial(op) => (
            builder.single(
                &source,
                &SingleAssetEdit {
                    spatial: Some(op),
                    ..SingleAssetEdit::default()
                },
            )?,
            default_format,
        ),
        OperationRequest::Speed { factor } => (
            builder.single(
                &source,
                &SingleAssetEdit {
                    speed: Some(factor),
                    ..SingleAssetEdit::default()
                },
            )?,
            default_format,
        ),
        OperationRequest::ChangeFps { fps } => (
            builder
                .frame_rate(fps)
                .single(&source, &SingleAssetEdit::default())?,
            default_format,
        ),
        OperationRequest::Volume(op) => {
            // Level edits produce an audio item, even from a video.
            let edit = SingleAssetEdit {
                volume: Some(op),
                ..select(TrackKind::Audio)
            };
            (builder.single(&source, &edit)?, OutputFormat::M4a)
        }
        OperationRequest::AddAudio { audio } => {
            let audio = probe_source(ctx.backend.as_ref(), &audio).await?;
            let builder = builder.single(&source, &select(TrackKind::Video))?;
            let span = TimeRange::leading(builder.duration())?;
            (
                builder.overlay(&audio, TrackKind::Audio, span)?,
                OutputFormat::Mov,
            )
        }
        OperationRequest::Select { kinds } => {
            let format = if kinds == [TrackKind::Audio] {
                OutputFormat::M4a
            } else {
                default_format
            };
            let edit = SingleAssetEdit {
                kinds: Some(kinds),
                ..SingleAssetEdit::default()
            };
            (builder.single(&source, &edit)?, format)
        }
        OperationRequest::Reencode { format } => (
            builder.single(&source, &SingleAssetEdit::default())?,
            format,
        ),
        OperationRequest::FrameExport { time, format } => {
            let window = frame_window(&source, time, ctx.default_frame_rate)?;
            let edit = SingleAssetEdit {
                window: Some(window),
                ..select(TrackKind::Video)
            };
            (builder.single(&source, &edit)?, format)
        }
        OperationRequest::Metadata(policy) => (
            builder
                .metadata(policy)
                .single(&source, &SingleAssetEdit::default())?,
            default_format,
        ),
    };

    let composition = builder.build()?;
    let job = ExportJob::new(composition, format)?;
    tracing::debug!(job = %job.id(), %format, "submitting export");
    job.submit(
        ctx.backend.clone(),
        ctx.storage.clone(),
        ctx.cancel.child_token(),
    )
    .outcome()
    .await
}

fn select(kind: TrackKind) -> SingleAssetEdit {
    SingleAssetEdit {
        kinds: Some(vec![kind]),
        ..SingleAssetEdit::default()
    }
}

/// One frame of source time starting at `time`.
fn frame_window(source: &ProbedSource, time: f64, fallback: Fps) -> OperationResult<TimeRange> {
    let fps = source.item.frame_rate.unwrap_or(fallback);
    TimeRange::new(time, fps.frame_duration_secs())
}
