//! Asynchronous export of a [`Composition`] into a new [`MediaItem`].
//!
//! A job moves `Created -> Running -> {Completed | Failed | Cancelled}`. Submission spawns
//! an independent tokio task and returns a [`JobHandle`]; the result is delivered exactly
//! once through [`JobHandle::outcome`]. Failed and cancelled jobs leave no output behind.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::backend::MediaBackend;
use crate::export::format::OutputFormat;
use crate::export::storage::Storage;
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{Locator, MediaItem, MediaKind, TrackKind};
use crate::timeline::model::Composition;

/// Identity of one export job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of an export job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }

    pub fn can_advance_to(&self, next: &JobState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed(_) | Self::Cancelled)
        )
    }
}

/// A composition waiting to be rendered into `format`.
#[derive(Debug)]
pub struct ExportJob {
    id: JobId,
    composition: Composition,
    format: OutputFormat,
    state: JobState,
}

impl ExportJob {
    /// Fails when the composition is invalid or has nothing the format can hold.
    pub fn new(composition: Composition, format: OutputFormat) -> OperationResult<Self> {
        composition.validate()?;
        let needed = match format.media_kind() {
            MediaKind::Video | MediaKind::Image => TrackKind::Video,
            MediaKind::Audio => TrackKind::Audio,
        };
        if !composition.has(needed) {
            return Err(OperationError::invalid_parameters(format!(
                "cannot export {format}: composition has no {needed} track"
            )));
        }
        Ok(Self {
            id: JobId::new(),
            composition,
            format,
            state: JobState::Created,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Hand the job to a new worker task. Must be called inside a tokio runtime.
    ///
    /// `cancel` is the job's cancellation signal; pass a child of a wider token to cancel
    /// groups of jobs together.
    pub fn submit(
        self,
        backend: Arc<dyn MediaBackend>,
        storage: Arc<dyn Storage>,
        cancel: CancellationToken,
    ) -> JobHandle {
        let (state_tx, state_rx) = watch::channel(self.state.clone());
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let id = self.id;
        let span = tracing::info_span!("export_job", job = %id, format = %self.format);

        let run = JobRun {
            id,
            composition: self.composition,
            format: self.format,
            backend,
            storage,
            cancel: cancel.clone(),
            state: state_tx,
        };
        tokio::spawn(
            async move {
                let outcome = run.execute().await;
                if outcome_tx.send(outcome).is_err() {
                    tracing::debug!("job handle dropped before completion");
                }
            }
            .instrument(span),
        );

        JobHandle {
            id,
            cancel,
            state: state_rx,
            outcome: outcome_rx,
        }
    }
}

/// Caller side of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    cancel: CancellationToken,
    state: watch::Receiver<JobState>,
    outcome: oneshot::Receiver<OperationResult<MediaItem>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Snapshot of the current state, for diagnostics.
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Resolves once the worker has picked the job up.
    pub async fn started(&mut self) -> JobState {
        if let Ok(s) = self.state.wait_for(|s| *s != JobState::Created).await {
            return s.clone();
        }
        self.state()
    }

    /// The job's single result.
    pub async fn outcome(self) -> OperationResult<MediaItem> {
        self.outcome.await.unwrap_or_else(|_| {
            Err(OperationError::encode_failed(
                "export worker stopped without reporting a result",
            ))
        })
    }
}

struct JobRun {
    id: JobId,
    composition: Composition,
    format: OutputFormat,
    backend: Arc<dyn MediaBackend>,
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
    state: watch::Sender<JobState>,
}

impl JobRun {
    fn advance(&self, next: JobState) {
        self.state.send_modify(|s| {
            debug_assert!(s.can_advance_to(&next), "illegal job transition {s:?} -> {next:?}");
            *s = next;
        });
    }

    async fn execute(self) -> OperationResult<MediaItem> {
        self.advance(JobState::Running);
        tracing::debug!(backend = self.backend.name(), "job running");

        if self.cancel.is_cancelled() {
            return self.cancelled(None);
        }
        let path = match self.storage.allocate(self.id, self.format) {
            Ok(p) => p,
            Err(e) => return self.failed(None, e),
        };

        let result = self
            .backend
            .export(&self.composition, self.format, &path, &self.cancel)
            .await;

        match result {
            Ok(()) if self.cancel.is_cancelled() => self.cancelled(Some(path)),
            Ok(()) => match self.finish(path.clone()).await {
                Ok(item) => {
                    self.advance(JobState::Completed);
                    tracing::info!(output = %item.locator, duration = item.duration, "job completed");
                    Ok(item)
                }
                Err(e) => self.failed(Some(path), e),
            },
            Err(e) if e.is_cancelled() => self.cancelled(Some(path)),
            Err(e) => self.failed(Some(path), e),
        }
    }

    async fn finish(&self, path: PathBuf) -> OperationResult<MediaItem> {
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(OperationError::encode_failed(format!(
                "backend '{}' reported success but wrote nothing to '{}'",
                self.backend.name(),
                path.display()
            )));
        }
        let comp = &self.composition;
        let kind = self.format.media_kind();
        MediaItem::new(
            Locator::from_path(path),
            kind,
            if kind == MediaKind::Image {
                0.0
            } else {
                comp.duration()
            },
            if kind == MediaKind::Audio {
                None
            } else {
                comp.render_size
            },
            (kind == MediaKind::Video).then_some(comp.frame_rate),
        )
    }

    fn cancelled(&self, partial: Option<PathBuf>) -> OperationResult<MediaItem> {
        if let Some(path) = partial {
            self.storage.discard(&path);
        }
        self.advance(JobState::Cancelled);
        tracing::info!("job cancelled");
        Err(OperationError::Cancelled)
    }

    fn failed(&self, partial: Option<PathBuf>, err: OperationError) -> OperationResult<MediaItem> {
        if let Some(path) = partial {
            self.storage.discard(&path);
        }
        let err = match err {
            OperationError::Other(e) => OperationError::encode_failed(format!("{e:#}")),
            other => other,
        };
        self.advance(JobState::Failed(err.to_string()));
        tracing::info!(error = %err, "job failed");
        Err(err)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/job.rs"]
mod tests;
