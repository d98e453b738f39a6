use std::collections::BTreeMap;

use crate::audio::mix::AudioMixSegment;
use crate::foundation::core::{Canvas, Fps, TIME_EPSILON, TimeRange, TrackId, Transform2D};
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{MediaId, MediaItem, MediaKind, TrackKind};

/// A single source stream placed on the timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Track {
    /// Stable index used by mix segments.
    pub id: TrackId,
    /// Stream kind taken from the source.
    pub kind: TrackKind,
    /// Where the track plays on the output timeline.
    pub composition_range: TimeRange,
    /// Source item the stream is read from.
    pub source: MediaId,
    /// Portion of the source that is played.
    pub source_range: TimeRange,
    /// Static placement inside the render frame (video tracks only).
    pub transform: Option<Transform2D>,
}

impl Track {
    /// Source seconds consumed per composition second.
    pub fn time_scale(&self) -> f64 {
        if self.composition_range.duration <= TIME_EPSILON {
            1.0
        } else {
            self.source_range.duration / self.composition_range.duration
        }
    }

    /// Map a composition time inside this track to source time.
    pub fn source_time(&self, t: f64) -> f64 {
        self.source_range.start + (t - self.composition_range.start) * self.time_scale()
    }

    /// True when the track covers composition time `t`. Zero-length tracks cover their start.
    pub fn is_active_at(&self, t: f64) -> bool {
        let r = self.composition_range;
        if r.is_empty() {
            (t - r.start).abs() <= TIME_EPSILON
        } else {
            r.contains(t)
        }
    }
}

/// How container-level metadata of the output is produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", content = "entries", rename_all = "snake_case")]
pub enum MetadataPolicy {
    /// Carry over whatever the first source has.
    #[default]
    Preserve,
    /// Write no metadata.
    Strip,
    /// Write exactly these entries.
    Replace(BTreeMap<String, String>),
}

/// Virtual multi-track timeline, consumed by exactly one export job.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Composition {
    /// Items referenced by the tracks.
    pub sources: BTreeMap<MediaId, MediaItem>,
    /// Tracks in insertion order; per kind ordered by start.
    pub tracks: Vec<Track>,
    /// Output frame size; required when any video track is present.
    pub render_size: Option<Canvas>,
    /// Output frame rate.
    pub frame_rate: Fps,
    /// Volume ramps applied to audio tracks.
    pub audio_mix: Vec<AudioMixSegment>,
    /// Output metadata handling.
    pub metadata: MetadataPolicy,
}

impl Composition {
    /// End of the last track, in seconds.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(|t| t.composition_range.end())
            .fold(0.0, f64::max)
    }

    pub fn frame_duration(&self) -> f64 {
        self.frame_rate.frame_duration_secs()
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    pub fn has(&self, kind: TrackKind) -> bool {
        self.tracks_of(kind).next().is_some()
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn source(&self, track: &Track) -> OperationResult<&MediaItem> {
        self.sources.get(&track.source).ok_or_else(|| {
            OperationError::invalid_parameters(format!(
                "track {} references missing source {}",
                track.id.0, track.source
            ))
        })
    }

    /// Mix segments of one track, time-ordered.
    pub fn mix_for(&self, track: TrackId) -> Vec<AudioMixSegment> {
        let mut segs: Vec<_> = self
            .audio_mix
            .iter()
            .filter(|s| s.track == track)
            .copied()
            .collect();
        segs.sort_by(|a, b| a.time_range.start.total_cmp(&b.time_range.start));
        segs
    }

    pub fn validate(&self) -> OperationResult<()> {
        if self.frame_rate.num == 0 || self.frame_rate.den == 0 {
            return Err(OperationError::invalid_parameters(
                "frame rate must have num>0 and den>0",
            ));
        }
        if self.tracks.is_empty() {
            return Err(OperationError::invalid_parameters(
                "composition has no tracks",
            ));
        }
        if self.has(TrackKind::Video) {
            match self.render_size {
                Some(c) if c.width > 0 && c.height > 0 => {}
                Some(c) => {
                    return Err(OperationError::transform_invalid(format!(
                        "render size must be > 0, got {}x{}",
                        c.width, c.height
                    )));
                }
                None => {
                    return Err(OperationError::invalid_parameters(
                        "composition with video tracks needs a render size",
                    ));
                }
            }
        }

        for track in &self.tracks {
            let source = self.source(track)?;
            let compatible = match track.kind {
                TrackKind::Video => source.kind != MediaKind::Audio,
                TrackKind::Audio => source.kind != MediaKind::Image,
            };
            if !compatible {
                return Err(OperationError::invalid_parameters(format!(
                    "track {} is a {} track over a {} source",
                    track.id.0, track.kind, source.kind
                )));
            }
            for (name, r) in [
                ("composition", track.composition_range),
                ("source", track.source_range),
            ] {
                if !r.start.is_finite() || !r.duration.is_finite() || r.start < 0.0 || r.duration < 0.0
                {
                    return Err(OperationError::invalid_parameters(format!(
                        "track {} has an invalid {name} range",
                        track.id.0
                    )));
                }
            }
            if !track.source_range.is_within(source.full_range()) {
                return Err(OperationError::invalid_parameters(format!(
                    "track {} source range [{}, {}) exceeds source duration {}",
                    track.id.0,
                    track.source_range.start,
                    track.source_range.end(),
                    source.duration
                )));
            }
            if let Some(t) = track.transform {
                if track.kind != TrackKind::Video {
                    return Err(OperationError::transform_invalid(format!(
                        "track {} is not spatial but carries a transform",
                        track.id.0
                    )));
                }
                let coeffs = t.to_affine().as_coeffs();
                if coeffs.iter().any(|c| !c.is_finite()) {
                    return Err(OperationError::transform_invalid(format!(
                        "track {} transform is not finite",
                        track.id.0
                    )));
                }
            }
        }

        for kind in TrackKind::ALL {
            let mut prev: Option<&Track> = None;
            for track in self.tracks_of(kind) {
                if let Some(p) = prev {
                    if track.composition_range.start + TIME_EPSILON < p.composition_range.start {
                        return Err(OperationError::invalid_parameters(format!(
                            "{kind} track {} starts before track {}",
                            track.id.0, p.id.0
                        )));
                    }
                    if track.composition_range.overlaps(p.composition_range) {
                        return Err(OperationError::invalid_parameters(format!(
                            "{kind} tracks {} and {} overlap",
                            p.id.0, track.id.0
                        )));
                    }
                }
                prev = Some(track);
            }
        }

        for seg in &self.audio_mix {
            let track = self.track(seg.track).ok_or_else(|| {
                OperationError::invalid_parameters(format!(
                    "mix segment references missing track {}",
                    seg.track.0
                ))
            })?;
            if track.kind != TrackKind::Audio {
                return Err(OperationError::invalid_parameters(format!(
                    "mix segment targets {} track {}",
                    track.kind, track.id.0
                )));
            }
            if !seg.time_range.is_within(track.composition_range) {
                return Err(OperationError::invalid_parameters(format!(
                    "mix segment [{}, {}) lies outside track {}",
                    seg.time_range.start,
                    seg.time_range.end(),
                    track.id.0
                )));
            }
            for v in [seg.start_volume, seg.end_volume] {
                if !(0.0..=1.0).contains(&v) {
                    return Err(OperationError::invalid_parameters(format!(
                        "mix volume {v} is outside [0, 1]"
                    )));
                }
            }
        }
        for track in self.tracks_of(TrackKind::Audio) {
            let segs = self.mix_for(track.id);
            if segs
                .windows(2)
                .any(|w| w[0].time_range.overlaps(w[1].time_range))
            {
                return Err(OperationError::invalid_parameters(format!(
                    "mix segments overlap on track {}",
                    track.id.0
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
