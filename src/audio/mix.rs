use crate::foundation::core::{TIME_EPSILON, TimeRange, TrackId};
use crate::foundation::error::{OperationError, OperationResult};

/// Volume edit requested by an operation. Durations are seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeOp {
    /// Ramp 0 -> 1 over the first `duration` seconds.
    FadeIn { duration: f64 },
    /// Ramp 1 -> 0 over the last `duration` seconds.
    FadeOut { duration: f64 },
    /// Both ramps on the same track.
    FadeInOut { fade_in: f64, fade_out: f64 },
    /// Constant level over the whole track.
    Flat { level: f64 },
}

/// Linear gain ramp over a span of composition time on one audio track.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioMixSegment {
    pub track: TrackId,
    pub time_range: TimeRange,
    pub start_volume: f32,
    pub end_volume: f32,
}

impl AudioMixSegment {
    /// Volumes are clamped to `[0, 1]`.
    pub fn new(track: TrackId, time_range: TimeRange, start_volume: f32, end_volume: f32) -> Self {
        Self {
            track,
            time_range,
            start_volume: clamp_volume(start_volume),
            end_volume: clamp_volume(end_volume),
        }
    }

    /// Gain at composition time `t`, or `None` outside `[start, end]`.
    pub fn volume_at(&self, t: f64) -> Option<f32> {
        let r = self.time_range;
        if t < r.start - TIME_EPSILON || t > r.end() + TIME_EPSILON {
            return None;
        }
        if r.duration <= TIME_EPSILON {
            return Some(self.end_volume);
        }
        let k = ((t - r.start) / r.duration).clamp(0.0, 1.0) as f32;
        Some(self.start_volume + (self.end_volume - self.start_volume) * k)
    }
}

fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Gain of a time-ordered segment list at `t`.
///
/// Unity before the first ramp; after a ramp the last end volume holds until the next one.
pub fn envelope_gain(segments: &[AudioMixSegment], t: f64) -> f32 {
    let mut gain = 1.0;
    for seg in segments {
        if t < seg.time_range.start - TIME_EPSILON {
            break;
        }
        match seg.volume_at(t) {
            Some(v) => return v,
            None => gain = seg.end_volume,
        }
    }
    gain
}

/// Compile `op` into ramp segments for the track occupying `span` of composition time.
///
/// When a combined fade does not fit, both fades shrink proportionally so the fade-in ends
/// exactly where the fade-out starts.
pub fn compile_volume(
    op: &VolumeOp,
    track: TrackId,
    span: TimeRange,
) -> OperationResult<Vec<AudioMixSegment>> {
    let total = span.duration;
    let mut out = Vec::with_capacity(2);

    let (fade_in, fade_out) = match *op {
        VolumeOp::FadeIn { duration } => (fade_len("fade-in", duration, total)?, 0.0),
        VolumeOp::FadeOut { duration } => (0.0, fade_len("fade-out", duration, total)?),
        VolumeOp::FadeInOut { fade_in, fade_out } => {
            let fi = fade_len("fade-in", fade_in, f64::INFINITY)?;
            let fo = fade_len("fade-out", fade_out, f64::INFINITY)?;
            if fi + fo > total {
                let meet = total * fi / (fi + fo);
                (meet, total - meet)
            } else {
                (fi, fo)
            }
        }
        VolumeOp::Flat { level } => {
            if !level.is_finite() {
                return Err(OperationError::invalid_parameters(format!(
                    "volume level must be finite, got {level}"
                )));
            }
            let level = level as f32;
            out.push(AudioMixSegment::new(track, span, level, level));
            return Ok(out);
        }
    };

    if fade_in > TIME_EPSILON {
        out.push(AudioMixSegment::new(
            track,
            TimeRange {
                start: span.start,
                duration: fade_in,
            },
            0.0,
            1.0,
        ));
    }
    if fade_out > TIME_EPSILON {
        out.push(AudioMixSegment::new(
            track,
            TimeRange {
                start: span.end() - fade_out,
                duration: fade_out,
            },
            1.0,
            0.0,
        ));
    }
    Ok(out)
}

fn fade_len(what: &str, d: f64, total: f64) -> OperationResult<f64> {
    if !d.is_finite() || d < 0.0 {
        return Err(OperationError::invalid_parameters(format!(
            "{what} duration must be finite and >= 0, got {d}"
        )));
    }
    Ok(d.min(total))
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
