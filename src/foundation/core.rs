use crate::foundation::error::{OperationError, OperationResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Index of a track inside a composition.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TrackId(pub u32);

/// Tolerance used when comparing timeline positions in seconds.
pub const TIME_EPSILON: f64 = 1e-6;

/// Half-open time interval `[start, start + duration)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub const ZERO: Self = Self {
        start: 0.0,
        duration: 0.0,
    };

    pub fn new(start: f64, duration: f64) -> OperationResult<Self> {
        if !start.is_finite() || start < 0.0 {
            return Err(OperationError::invalid_parameters(format!(
                "time range start must be finite and >= 0, got {start}"
            )));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(OperationError::invalid_parameters(format!(
                "time range duration must be finite and >= 0, got {duration}"
            )));
        }
        Ok(Self { start, duration })
    }

    pub fn from_bounds(start: f64, end: f64) -> OperationResult<Self> {
        if end < start {
            return Err(OperationError::invalid_parameters(format!(
                "time range end {end} is before start {start}"
            )));
        }
        Self::new(start, end - start)
    }

    /// `[0, duration)`.
    pub fn leading(duration: f64) -> OperationResult<Self> {
        Self::new(0.0, duration)
    }

    pub fn end(self) -> f64 {
        self.start + self.duration
    }

    pub fn is_empty(self) -> bool {
        self.duration <= TIME_EPSILON
    }

    pub fn contains(self, t: f64) -> bool {
        self.start <= t && t < self.end()
    }

    /// True when `self` lies inside `outer`, allowing [`TIME_EPSILON`] slack at both ends.
    pub fn is_within(self, outer: TimeRange) -> bool {
        self.start + TIME_EPSILON >= outer.start && self.end() <= outer.end() + TIME_EPSILON
    }

    pub fn overlaps(self, other: TimeRange) -> bool {
        self.start + TIME_EPSILON < other.end() && other.start + TIME_EPSILON < self.end()
    }

    /// Move the range to start at `start`, keeping its duration.
    pub fn at(self, start: f64) -> Self {
        Self {
            start,
            duration: self.duration,
        }
    }

    /// Keep the start, multiply the duration by `factor`.
    pub fn scale_duration(self, factor: f64) -> Self {
        Self {
            start: self.start,
            duration: self.duration * factor,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> OperationResult<Self> {
        if den == 0 {
            return Err(OperationError::invalid_parameters("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(OperationError::invalid_parameters("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Approximate a floating point rate with a millisecond-denominator ratio.
    pub fn from_f64(rate: f64) -> OperationResult<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(OperationError::invalid_parameters(format!(
                "frame rate must be finite and > 0, got {rate}"
            )));
        }
        let num = (rate * 1000.0).round();
        if num < 1.0 || num > f64::from(u32::MAX) {
            return Err(OperationError::invalid_parameters(format!(
                "frame rate {rate} is out of range"
            )));
        }
        let (num, den) = reduce(num as u32, 1000);
        Self::new(num, den)
    }

    /// Parse `"30000/1001"` or `"25"`.
    pub fn parse_ratio(s: &str) -> Option<Self> {
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim().parse().ok()?, d.trim().parse().ok()?),
            None => (s.trim().parse().ok()?, 1),
        };
        Self::new(num, den).ok()
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Number of frames needed to cover `secs`, counting a trailing partial frame.
    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * self.as_f64() - TIME_EPSILON).ceil().max(0.0) as u64
    }
}

fn reduce(num: u32, den: u32) -> (u32, u32) {
    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 { a } else { gcd(b, a % b) }
    }
    let g = gcd(num, den).max(1);
    (num / g, den / g)
}

/// Pixel dimensions of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> OperationResult<Self> {
        if width == 0 || height == 0 {
            return Err(OperationError::invalid_parameters(format!(
                "canvas dimensions must be > 0, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn size(self) -> Vec2 {
        Vec2::new(f64::from(self.width), f64::from(self.height))
    }
}

/// Static placement of a spatial track, applied scale first, then rotation, then translation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform2D {
    pub translate: Vec2,
    pub rotation_rad: f64,
    pub scale: Vec2, // default (1,1)
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            rotation_rad: 0.0,
            scale: Vec2::new(1.0, 1.0),
        }
    }
}

impl Transform2D {
    pub fn to_affine(self) -> Affine {
        let t_translate = Affine::translate(self.translate);
        let t_rotate = Affine::rotate(self.rotation_rad);
        let t_scale = Affine::scale_non_uniform(self.scale.x, self.scale.y);

        // Canonical order: T(translate) * R(rot) * S(scale)
        t_translate * t_rotate * t_scale
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
