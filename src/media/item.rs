use std::fmt;
use std::path::{Path, PathBuf};

use crate::foundation::core::{Canvas, Fps, TimeRange};
use crate::foundation::error::{OperationError, OperationResult};

/// Kind of a [`MediaItem`] as seen by applicability predicates.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Moving pictures, optionally with sound.
    Video,
    /// Sound only.
    Audio,
    /// A single still frame.
    Image,
}

impl MediaKind {
    /// Track kind that carries this item's primary content.
    pub fn primary_track(self) -> TrackKind {
        match self {
            Self::Video | Self::Image => TrackKind::Video,
            Self::Audio => TrackKind::Audio,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
        })
    }
}

/// Kind of a single elementary stream. Still images are carried on video tracks.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Picture stream.
    Video,
    /// Sound stream.
    Audio,
}

impl TrackKind {
    /// Both kinds, in the order tracks are emitted.
    pub const ALL: [TrackKind; 2] = [TrackKind::Video, TrackKind::Audio];
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Audio => "audio",
        })
    }
}

/// Stable identifier of a media item.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct MediaId(pub uuid::Uuid);

impl MediaId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle to durable storage. Backends resolve it to bytes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Locator(PathBuf);

impl Locator {
    /// Locator for a filesystem path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Filesystem path this locator resolves to.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.0
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

/// Immutable descriptor of a piece of media.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaItem {
    /// Identity of this item.
    pub id: MediaId,
    /// Where the bytes live.
    pub locator: Locator,
    /// Primary content kind.
    pub kind: MediaKind,
    /// Duration in seconds; zero for stills.
    pub duration: f64,
    /// Frame size of visual items.
    pub native_size: Option<Canvas>,
    /// Frame rate of video items.
    pub frame_rate: Option<Fps>,
}

impl MediaItem {
    /// Describe a caller-supplied source.
    pub fn new(
        locator: Locator,
        kind: MediaKind,
        duration: f64,
        native_size: Option<Canvas>,
        frame_rate: Option<Fps>,
    ) -> OperationResult<Self> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(OperationError::invalid_parameters(format!(
                "media duration must be finite and >= 0, got {duration}"
            )));
        }
        if kind != MediaKind::Audio && native_size.is_none() {
            return Err(OperationError::invalid_parameters(format!(
                "{kind} item '{locator}' needs a native size"
            )));
        }
        Ok(Self {
            id: MediaId::new(),
            locator,
            kind,
            duration,
            native_size,
            frame_rate,
        })
    }

    /// Build an item from the tracks a backend reported for `locator`.
    ///
    /// The kind is video when a video track with a non-zero duration exists, image for a
    /// zero-length video track, audio otherwise.
    pub fn from_tracks(locator: Locator, tracks: &[TrackDescriptor]) -> OperationResult<Self> {
        let video = tracks.iter().find(|t| t.kind == TrackKind::Video);
        let audio = tracks.iter().find(|t| t.kind == TrackKind::Audio);
        let (kind, duration) = match (video, audio) {
            (Some(v), _) if v.duration > 0.0 => (
                MediaKind::Video,
                tracks.iter().map(|t| t.duration).fold(0.0, f64::max),
            ),
            (Some(_), _) => (MediaKind::Image, 0.0),
            (None, Some(a)) => (MediaKind::Audio, a.duration),
            (None, None) => {
                return Err(OperationError::source_unreadable(format!(
                    "'{locator}' has no video or audio tracks"
                )));
            }
        };
        Self::new(
            locator,
            kind,
            duration,
            video.and_then(|v| v.size),
            video.and_then(|v| v.frame_rate),
        )
    }

    /// Full `[0, duration)` range of the item.
    pub fn full_range(&self) -> TimeRange {
        TimeRange {
            start: 0.0,
            duration: self.duration,
        }
    }
}

/// Metadata of one stream inside a source, as reported by a backend's `open`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackDescriptor {
    /// Stream kind.
    pub kind: TrackKind,
    /// Stream duration in seconds.
    pub duration: f64,
    /// Frame size for video streams.
    pub size: Option<Canvas>,
    /// Frame rate for video streams.
    pub frame_rate: Option<Fps>,
    /// Sample rate for audio streams.
    pub sample_rate: Option<u32>,
}

/// A source item together with the tracks its backend found in it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbedSource {
    /// The source item.
    pub item: MediaItem,
    /// Streams reported by the backend.
    pub tracks: Vec<TrackDescriptor>,
}

impl ProbedSource {
    /// Pair an item with its tracks, checking it actually carries its primary kind.
    pub fn new(item: MediaItem, tracks: Vec<TrackDescriptor>) -> OperationResult<Self> {
        let primary = item.kind.primary_track();
        if !tracks.iter().any(|t| t.kind == primary) {
            return Err(OperationError::source_unreadable(format!(
                "{} item '{}' has no {primary} track",
                item.kind, item.locator
            )));
        }
        Ok(Self { item, tracks })
    }

    /// First track of `kind`, if any.
    pub fn track(&self, kind: TrackKind) -> Option<&TrackDescriptor> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    /// True when the source carries a stream of `kind`.
    pub fn has(&self, kind: TrackKind) -> bool {
        self.track(kind).is_some()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/item.rs"]
mod tests;
