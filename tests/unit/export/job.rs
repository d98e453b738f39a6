use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::export::storage::ScratchStorage;
use crate::foundation::core::{Canvas, Fps, TimeRange, TrackId};
use crate::media::item::TrackDescriptor;
use crate::timeline::model::{MetadataPolicy, Track};

enum Behaviour {
    Write,
    WriteNothing,
    FailAfterPartial,
    WaitForCancel,
    IgnoreCancel(Arc<Notify>),
}

struct FakeBackend(Behaviour);

#[async_trait]
impl MediaBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, _locator: &Locator) -> OperationResult<Vec<TrackDescriptor>> {
        Ok(vec![])
    }

    async fn export(
        &self,
        _composition: &Composition,
        _format: OutputFormat,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> OperationResult<()> {
        match &self.0 {
            Behaviour::Write => {
                std::fs::write(destination, b"done").map_err(anyhow::Error::from)?;
                Ok(())
            }
            Behaviour::WriteNothing => Ok(()),
            Behaviour::FailAfterPartial => {
                std::fs::write(destination, b"part").map_err(anyhow::Error::from)?;
                Err(OperationError::encode_failed("muxer exploded"))
            }
            Behaviour::WaitForCancel => {
                std::fs::write(destination, b"part").map_err(anyhow::Error::from)?;
                cancel.cancelled().await;
                Err(OperationError::Cancelled)
            }
            Behaviour::IgnoreCancel(release) => {
                std::fs::write(destination, b"done").map_err(anyhow::Error::from)?;
                release.notified().await;
                Ok(())
            }
        }
    }
}

fn composition() -> Composition {
    let item = MediaItem::new(
        Locator::from_path("src.mov"),
        MediaKind::Video,
        2.0,
        Some(Canvas {
            width: 8,
            height: 8,
        }),
        Some(Fps::new(10, 1).unwrap()),
    )
    .unwrap();
    Composition {
        sources: [(item.id, item.clone())].into_iter().collect(),
        tracks: vec![Track {
            id: TrackId(0),
            kind: TrackKind::Video,
            composition_range: TimeRange::new(0.0, 2.0).unwrap(),
            source: item.id,
            source_range: TimeRange::new(0.0, 2.0).unwrap(),
            transform: None,
        }],
        render_size: Some(Canvas {
            width: 8,
            height: 8,
        }),
        frame_rate: Fps::new(10, 1).unwrap(),
        audio_mix: vec![],
        metadata: MetadataPolicy::Preserve,
    }
}

fn submit(dir: &Path, behaviour: Behaviour) -> JobHandle {
    ExportJob::new(composition(), OutputFormat::Mov)
        .unwrap()
        .submit(
            Arc::new(FakeBackend(behaviour)),
            Arc::new(ScratchStorage::new(dir)),
            CancellationToken::new(),
        )
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[test]
fn transitions_follow_the_state_machine() {
    use JobState::*;
    assert!(Created.can_advance_to(&Running));
    assert!(Running.can_advance_to(&Completed));
    assert!(Running.can_advance_to(&Failed("x".into())));
    assert!(Running.can_advance_to(&Cancelled));
    assert!(!Created.can_advance_to(&Completed));
    assert!(!Completed.can_advance_to(&Running));
    assert!(!Cancelled.can_advance_to(&Failed("x".into())));
    assert!(Completed.is_terminal() && Cancelled.is_terminal() && Failed(String::new()).is_terminal());
    assert!(!Running.is_terminal());
}

#[test]
fn new_rejects_formats_without_matching_tracks() {
    let err = ExportJob::new(composition(), OutputFormat::M4a).unwrap_err();
    assert!(matches!(err, OperationError::InvalidParameters(_)));
    let job = ExportJob::new(composition(), OutputFormat::Png).unwrap();
    assert_eq!(job.state(), &JobState::Created);
}

#[tokio::test]
async fn completed_job_yields_item_from_composition() {
    let dir = tempfile::tempdir().unwrap();
    let handle = submit(dir.path(), Behaviour::Write);
    let item = handle.outcome().await.unwrap();
    assert_eq!(item.kind, MediaKind::Video);
    assert_eq!(item.duration, 2.0);
    assert_eq!(item.frame_rate, Some(Fps::new(10, 1).unwrap()));
    assert!(item.locator.as_path().is_file());
    assert!(item.locator.as_path().starts_with(dir.path()));
}

#[tokio::test]
async fn failed_job_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let handle = submit(dir.path(), Behaviour::FailAfterPartial);
    let err = handle.outcome().await.unwrap_err();
    assert!(matches!(err, OperationError::EncodeFailed(_)));
    assert_eq!(file_count(dir.path()), 0);
}

#[tokio::test]
async fn success_without_output_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let handle = submit(dir.path(), Behaviour::WriteNothing);
    assert!(matches!(
        handle.outcome().await,
        Err(OperationError::EncodeFailed(_))
    ));
}

#[tokio::test]
async fn cancelling_a_running_job_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = submit(dir.path(), Behaviour::WaitForCancel);
    assert_eq!(handle.started().await, JobState::Running);
    handle.cancel();
    let err = handle.outcome().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(file_count(dir.path()), 0);
}

#[tokio::test]
async fn cancel_observed_before_completion_wins_over_late_success() {
    let dir = tempfile::tempdir().unwrap();
    let release = Arc::new(Notify::new());
    let mut handle = submit(dir.path(), Behaviour::IgnoreCancel(release.clone()));
    handle.started().await;
    handle.cancel();
    release.notify_one();
    assert!(handle.outcome().await.unwrap_err().is_cancelled());
    assert_eq!(file_count(dir.path()), 0);
}

#[tokio::test]
async fn concurrent_jobs_get_distinct_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let handles: Vec<_> = (0..4).map(|_| submit(dir.path(), Behaviour::Write)).collect();
    let mut paths = Vec::new();
    for h in handles {
        paths.push(h.outcome().await.unwrap().locator);
    }
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 4);
    assert_eq!(file_count(dir.path()), 4);
}
