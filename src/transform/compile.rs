//! Spatial parameters to static track placement.
//!
//! Every supported operation maps to one [`Transform2D`] (scale, then rotation about the
//! origin, then translation) plus the pixel size of the output frame.

use crate::foundation::core::{Affine, Canvas, Transform2D, Vec2};
use crate::foundation::error::{OperationError, OperationResult};

/// Spatial edit requested by an operation, in source pixel units.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpatialOp {
    /// Keep the `width`x`height` window whose top-left corner is at (`x`, `y`).
    Crop {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Rotate about the frame origin; the frame keeps its size.
    Rotate { angle_rad: f64 },
    /// Mirror along one or both axes.
    Flip { horizontal: bool, vertical: bool },
    /// Stretch to exactly `width`x`height`.
    Scale { width: f64, height: f64 },
    /// Center the unscaled source on a `width`x`height` frame.
    ChangeCanvas { width: f64, height: f64 },
}

/// Result of compiling a [`SpatialOp`] against a source size.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompiledTransform {
    /// Placement of the source inside the output frame.
    pub transform: Transform2D,
    /// Output frame size.
    pub render_size: Canvas,
}

impl CompiledTransform {
    /// Source-to-output mapping.
    pub fn affine(&self) -> Affine {
        self.transform.to_affine()
    }
}

/// Compile `op` for a source of size `source`.
pub fn compile_transform(op: &SpatialOp, source: Canvas) -> OperationResult<CompiledTransform> {
    let src = source.size();
    let (transform, render_size) = match *op {
        SpatialOp::Crop {
            x,
            y,
            width,
            height,
        } => {
            finite("crop x", x)?;
            finite("crop y", y)?;
            let t = Transform2D {
                translate: Vec2::new(-x, -y),
                ..Transform2D::default()
            };
            (t, render_dims(width, height)?)
        }
        SpatialOp::Rotate { angle_rad } => {
            finite("rotation angle", angle_rad)?;
            let t = Transform2D {
                rotation_rad: angle_rad,
                ..Transform2D::default()
            };
            (t, source)
        }
        SpatialOp::Flip {
            horizontal,
            vertical,
        } => {
            // scale(-1, 1) after translate(-w, 0) maps x to w - x; same for y.
            let mut t = Transform2D::default();
            if horizontal {
                t.scale.x = -1.0;
                t.translate.x = src.x;
            }
            if vertical {
                t.scale.y = -1.0;
                t.translate.y = src.y;
            }
            (t, source)
        }
        SpatialOp::Scale { width, height } => {
            let render_size = render_dims(width, height)?;
            if source.width == 0 || source.height == 0 {
                return Err(OperationError::transform_invalid(format!(
                    "cannot scale a {}x{} source",
                    source.width, source.height
                )));
            }
            let t = Transform2D {
                scale: Vec2::new(width / src.x, height / src.y),
                ..Transform2D::default()
            };
            (t, render_size)
        }
        SpatialOp::ChangeCanvas { width, height } => {
            let render_size = render_dims(width, height)?;
            let t = Transform2D {
                translate: Vec2::new((width - src.x) / 2.0, (height - src.y) / 2.0),
                ..Transform2D::default()
            };
            (t, render_size)
        }
    };

    Ok(CompiledTransform {
        transform,
        render_size,
    })
}

fn finite(what: &str, v: f64) -> OperationResult<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(OperationError::transform_invalid(format!(
            "{what} must be finite, got {v}"
        )))
    }
}

fn render_dims(width: f64, height: f64) -> OperationResult<Canvas> {
    fn dim(what: &str, v: f64) -> OperationResult<u32> {
        finite(what, v)?;
        let px = v.round();
        if px < 1.0 || px > f64::from(u32::MAX) {
            return Err(OperationError::transform_invalid(format!(
                "{what} must be > 0 pixels, got {v}"
            )));
        }
        Ok(px as u32)
    }

    Ok(Canvas {
        width: dim("render width", width)?,
        height: dim("render height", height)?,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/transform/compile.rs"]
mod tests;
