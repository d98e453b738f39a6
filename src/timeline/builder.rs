use std::collections::BTreeMap;

use crate::audio::mix::{AudioMixSegment, VolumeOp, compile_volume};
use crate::foundation::core::{Canvas, Fps, TIME_EPSILON, TimeRange, TrackId, Transform2D};
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{MediaId, MediaItem, ProbedSource, TrackKind};
use crate::timeline::model::{Composition, MetadataPolicy, Track};
use crate::transform::compile::{SpatialOp, compile_transform};

/// One asset of a concatenation, optionally limited to a window of its timeline.
#[derive(Clone, Copy, Debug)]
pub struct ConcatEntry<'a> {
    pub source: &'a ProbedSource,
    pub window: Option<TimeRange>,
}

impl<'a> ConcatEntry<'a> {
    pub fn whole(source: &'a ProbedSource) -> Self {
        Self {
            source,
            window: None,
        }
    }
}

/// Edits applied to a single source in [`TimelineBuilder::single`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SingleAssetEdit {
    /// Source window to keep; the whole item when `None`.
    pub window: Option<TimeRange>,
    /// Track kinds to emit. `None` keeps every kind the source has; an explicit list
    /// requires each listed kind to be present.
    pub kinds: Option<Vec<TrackKind>>,
    /// Placement of the video track.
    pub spatial: Option<SpatialOp>,
    /// Ramps for the audio track.
    pub volume: Option<VolumeOp>,
    /// Playback speed factor; only the source's own kind is kept.
    pub speed: Option<f64>,
}

/// Assembles sources, transforms and mix segments into a validated [`Composition`].
pub struct TimelineBuilder {
    sources: BTreeMap<MediaId, MediaItem>,
    tracks: Vec<Track>,
    render_size: Option<Canvas>,
    frame_rate: Option<Fps>,
    default_frame_rate: Fps,
    audio_mix: Vec<AudioMixSegment>,
    metadata: MetadataPolicy,
}

impl TimelineBuilder {
    /// `default_frame_rate` is used when no source provides one (audio-only timelines).
    pub fn new(default_frame_rate: Fps) -> Self {
        Self {
            sources: BTreeMap::new(),
            tracks: Vec::new(),
            render_size: None,
            frame_rate: None,
            default_frame_rate,
            audio_mix: Vec::new(),
            metadata: MetadataPolicy::Preserve,
        }
    }

    pub fn frame_rate(mut self, fps: Fps) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn metadata(mut self, policy: MetadataPolicy) -> Self {
        self.metadata = policy;
        self
    }

    /// Lay `entries` end to end, one running offset per track kind.
    ///
    /// An entry lacking one of `kinds` contributes nothing to that kind.
    #[tracing::instrument(skip(self, entries), fields(count = entries.len()))]
    pub fn concatenate(
        mut self,
        entries: &[ConcatEntry<'_>],
        kinds: &[TrackKind],
    ) -> OperationResult<Self> {
        let mut offsets: BTreeMap<TrackKind, f64> = BTreeMap::new();
        for entry in entries {
            let item = &entry.source.item;
            let window = resolve_window(item, entry.window)?;
            for &kind in kinds {
                if !entry.source.has(kind) {
                    tracing::debug!(source = %item.locator, %kind, "no track of this kind, skipped");
                    continue;
                }
                let offset = offsets.entry(kind).or_insert(0.0);
                let composition_range = window.at(*offset);
                *offset += window.duration;
                self.adopt_source(entry.source);
                self.push_track(kind, composition_range, item.id, window);
            }
        }
        if self.tracks.is_empty() {
            return Err(OperationError::invalid_parameters(
                "nothing to concatenate for the requested track kinds",
            ));
        }
        Ok(self)
    }

    /// One track per relevant kind of `source`, starting at zero.
    #[tracing::instrument(skip(self, source), fields(locator = %source.item.locator))]
    pub fn single(mut self, source: &ProbedSource, edit: &SingleAssetEdit) -> OperationResult<Self> {
        let item = &source.item;
        let window = resolve_window(item, edit.window)?;

        let mut kinds: Vec<TrackKind> = match &edit.kinds {
            Some(required) => {
                for &kind in required {
                    if !source.has(kind) {
                        return Err(OperationError::source_unreadable(format!(
                            "'{}' has no {kind} track",
                            item.locator
                        )));
                    }
                }
                required.clone()
            }
            None => TrackKind::ALL
                .into_iter()
                .filter(|k| source.has(*k))
                .collect(),
        };

        let mut span = window.at(0.0);
        if let Some(factor) = edit.speed {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(OperationError::invalid_parameters(format!(
                    "speed factor must be finite and > 0, got {factor}"
                )));
            }
            let primary = item.kind.primary_track();
            if kinds.iter().any(|k| *k != primary) {
                tracing::debug!(%primary, "speed change keeps only the primary track kind");
            }
            kinds.retain(|k| *k == primary);
            span = span.scale_duration(1.0 / factor);
        }

        self.adopt_source(source);
        for kind in kinds {
            let id = self.push_track(kind, span, item.id, window);
            match kind {
                TrackKind::Video => {
                    let native = item.native_size.ok_or_else(|| {
                        OperationError::source_unreadable(format!(
                            "'{}' has a video track but no frame size",
                            item.locator
                        ))
                    })?;
                    match &edit.spatial {
                        Some(op) => {
                            let compiled = compile_transform(op, native)?;
                            self.set_transform(id, compiled.transform);
                            self.render_size = Some(compiled.render_size);
                        }
                        None => {
                            self.render_size.get_or_insert(native);
                        }
                    }
                }
                TrackKind::Audio => {
                    if let Some(op) = &edit.volume {
                        self.audio_mix.extend(compile_volume(op, id, span)?);
                    }
                }
            }
        }

        if edit.spatial.is_some() && !self.has_kind(TrackKind::Video) {
            return Err(OperationError::source_unreadable(format!(
                "'{}' has no video track to transform",
                item.locator
            )));
        }
        if edit.volume.is_some() && !self.has_kind(TrackKind::Audio) {
            return Err(OperationError::source_unreadable(format!(
                "'{}' has no audio track to mix",
                item.locator
            )));
        }
        Ok(self)
    }

    /// Lay the `kind` stream of `source` over `span` of the existing timeline, clipped to
    /// the length of the source.
    pub fn overlay(
        mut self,
        source: &ProbedSource,
        kind: TrackKind,
        span: TimeRange,
    ) -> OperationResult<Self> {
        let item = &source.item;
        if !source.has(kind) {
            return Err(OperationError::source_unreadable(format!(
                "'{}' has no {kind} track",
                item.locator
            )));
        }
        if self.has_kind(kind) {
            return Err(OperationError::invalid_parameters(format!(
                "timeline already has a {kind} track"
            )));
        }
        let length = span.duration.min(item.duration);
        if length <= TIME_EPSILON {
            return Err(OperationError::source_unreadable(format!(
                "'{}' has no {kind} content to lay over the timeline",
                item.locator
            )));
        }
        let source_range = TimeRange {
            start: 0.0,
            duration: length,
        };
        self.adopt_source(source);
        self.push_track(kind, source_range.at(span.start), item.id, source_range);
        Ok(self)
    }

    /// Composition length of the tracks added so far.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(|t| t.composition_range.end())
            .fold(0.0, f64::max)
    }

    pub fn build(self) -> OperationResult<Composition> {
        let has_video = self.has_kind(TrackKind::Video);
        let comp = Composition {
            sources: self.sources,
            tracks: self.tracks,
            render_size: if has_video { self.render_size } else { None },
            frame_rate: self.frame_rate.unwrap_or(self.default_frame_rate),
            audio_mix: self.audio_mix,
            metadata: self.metadata,
        };
        comp.validate()?;
        Ok(comp)
    }

    fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }

    fn adopt_source(&mut self, source: &ProbedSource) {
        let item = &source.item;
        if self.frame_rate.is_none() {
            self.frame_rate = item.frame_rate;
        }
        if source.has(TrackKind::Video) && self.render_size.is_none() {
            self.render_size = item.native_size;
        }
        self.sources.entry(item.id).or_insert_with(|| item.clone());
    }

    fn push_track(
        &mut self,
        kind: TrackKind,
        composition_range: TimeRange,
        source: MediaId,
        source_range: TimeRange,
    ) -> TrackId {
        let id = TrackId(self.tracks.len() as u32);
        self.tracks.push(Track {
            id,
            kind,
            composition_range,
            source,
            source_range,
            transform: None,
        });
        id
    }

    fn set_transform(&mut self, id: TrackId, transform: Transform2D) {
        if let Some(t) = self.tracks.iter_mut().find(|t| t.id == id) {
            t.transform = Some(transform);
        }
    }
}

/// Clamp a requested source window to the item; a window starting past the end is an error.
fn resolve_window(item: &MediaItem, window: Option<TimeRange>) -> OperationResult<TimeRange> {
    let Some(w) = window else {
        return Ok(item.full_range());
    };
    if item.duration <= TIME_EPSILON {
        if w.start > TIME_EPSILON {
            return Err(OperationError::invalid_parameters(format!(
                "'{}' is a still; window must start at 0",
                item.locator
            )));
        }
        return Ok(TimeRange::ZERO);
    }
    if w.start >= item.duration - TIME_EPSILON {
        return Err(OperationError::invalid_parameters(format!(
            "window start {} is at or past the end of '{}' ({}s)",
            w.start, item.locator, item.duration
        )));
    }
    TimeRange::from_bounds(w.start, w.end().min(item.duration))
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/builder.rs"]
mod tests;
