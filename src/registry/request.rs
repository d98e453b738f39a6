use crate::audio::mix::VolumeOp;
use crate::export::format::OutputFormat;
use crate::foundation::core::{Fps, TimeRange};
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{MediaItem, MediaKind, TrackKind};
use crate::registry::operation::Operation;
use crate::registry::params::{ParamReader, Params, check_schema};
use crate::timeline::model::MetadataPolicy;
use crate::transform::compile::SpatialOp;

/// Parameters of one invocation, parsed and range-checked.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationRequest {
    /// Keep a source window.
    Trim { window: TimeRange },
    /// Append `others` after the asset, per track kind.
    Concat {
        others: Vec<MediaItem>,
        kinds: Vec<TrackKind>,
    },
    Spatial(SpatialOp),
    Speed { factor: f64 },
    ChangeFps { fps: Fps },
    Volume(VolumeOp),
    AddAudio { audio: MediaItem },
    /// Keep only these track kinds.
    Select { kinds: Vec<TrackKind> },
    /// Re-encode everything into `format`.
    Reencode { format: OutputFormat },
    FrameExport { time: f64, format: OutputFormat },
    Metadata(MetadataPolicy),
}

impl OperationRequest {
    /// Check `params` against the schema of `op` and build its request for `asset`.
    pub fn parse(op: Operation, asset: &MediaItem, params: &Params) -> OperationResult<Self> {
        check_schema(op.params(), params)?;
        let p = ParamReader::new(params);
        Ok(match op {
            Operation::Trim | Operation::AudioTrim => {
                let start = p.non_negative("start")?;
                let duration = p.positive("duration")?;
                Self::Trim {
                    window: TimeRange::new(start, duration)?,
                }
            }
            Operation::Concat | Operation::MergeAudio => {
                let others = p.assets("assets")?;
                if others.is_empty() {
                    return Err(OperationError::invalid_parameters(
                        "'assets' must name at least one asset",
                    ));
                }
                let kinds = if op == Operation::Concat {
                    TrackKind::ALL.to_vec()
                } else {
                    vec![TrackKind::Audio]
                };
                for other in others {
                    let ok = match op {
                        Operation::MergeAudio => other.kind == MediaKind::Audio,
                        _ => other.kind != MediaKind::Image,
                    };
                    if !ok {
                        return Err(OperationError::invalid_parameters(format!(
                            "cannot {op} a {} asset",
                            other.kind
                        )));
                    }
                }
                Self::Concat {
                    others: others.to_vec(),
                    kinds,
                }
            }
            Operation::Crop => {
                let (x, y) = (p.non_negative("x")?, p.non_negative("y")?);
                let (w, h) = (p.pixels("w")?, p.pixels("h")?);
                if let Some(size) = asset.native_size {
                    if x + w > f64::from(size.width) || y + h > f64::from(size.height)
                    {
                        return Err(OperationError::invalid_parameters(format!(
                            "crop {w}x{h} at ({x}, {y}) exceeds the {}x{} frame",
                            size.width, size.height
                        )));
                    }
                }
                Self::Spatial(SpatialOp::Crop {
                    x,
                    y,
                    width: w,
                    height: h,
                })
            }
            Operation::Rotate => Self::Spatial(SpatialOp::Rotate {
                angle_rad: p.number("angle")?,
            }),
            Operation::Flip => {
                let horizontal = p.opt_bool("horizontal")?.unwrap_or(false);
                let vertical = p.opt_bool("vertical")?.unwrap_or(false);
                if !horizontal && !vertical {
                    return Err(OperationError::invalid_parameters(
                        "flip needs 'horizontal' or 'vertical' set",
                    ));
                }
                Self::Spatial(SpatialOp::Flip {
                    horizontal,
                    vertical,
                })
            }
            Operation::Mirror => {
                let vertical = p.opt_bool("vertical")?.unwrap_or(false);
                Self::Spatial(SpatialOp::Flip {
                    horizontal: !vertical,
                    vertical,
                })
            }
            Operation::Upscale | Operation::Resize => Self::Spatial(SpatialOp::Scale {
                width: p.pixels("width")?,
                height: p.pixels("height")?,
            }),
            Operation::ChangeCanvas => Self::Spatial(SpatialOp::ChangeCanvas {
                width: p.pixels("width")?,
                height: p.pixels("height")?,
            }),
            Operation::Speed => Self::Speed {
                factor: p.positive("factor")?,
            },
            Operation::ChangeFps => Self::ChangeFps {
                fps: Fps::from_f64(p.positive("fps")?)?,
            },
            Operation::FadeAudio => Self::Volume(VolumeOp::FadeInOut {
                fade_in: p.non_negative("fadeIn")?,
                fade_out: p.non_negative("fadeOut")?,
            }),
            Operation::AudioFadeIn => Self::Volume(VolumeOp::FadeIn {
                duration: p.non_negative("fadeIn")?,
            }),
            Operation::AudioFadeOut => Self::Volume(VolumeOp::FadeOut {
                duration: p.non_negative("fadeOut")?,
            }),
            Operation::Volume => Self::Volume(VolumeOp::Flat {
                level: p.non_negative("volume")?,
            }),
            Operation::AddAudio => {
                let audio = p.asset("audio")?;
                if audio.kind == MediaKind::Image {
                    return Err(OperationError::invalid_parameters(
                        "'audio' must be an audio or video asset",
                    ));
                }
                Self::AddAudio {
                    audio: audio.clone(),
                }
            }
            Operation::RemoveAudio => Self::Select {
                kinds: vec![TrackKind::Video],
            },
            Operation::ExtractAudio => Self::Select {
                kinds: vec![TrackKind::Audio],
            },
            Operation::ExportFormat => {
                let format: OutputFormat = p.text("format")?.parse()?;
                if format.media_kind() != asset.kind {
                    return Err(OperationError::invalid_parameters(format!(
                        "cannot export a {} asset as {format}",
                        asset.kind
                    )));
                }
                Self::Reencode { format }
            }
            Operation::AudioToWav => Self::Reencode {
                format: OutputFormat::Wav,
            },
            Operation::FrameExport => {
                let time = p.non_negative("time")?;
                let format = match p.opt_text("format")? {
                    Some(s) => s.parse()?,
                    None => OutputFormat::Png,
                };
                if !format.is_still() {
                    return Err(OperationError::invalid_parameters(format!(
                        "frame export needs png or jpg, got {format}"
                    )));
                }
                Self::FrameExport { time, format }
            }
            Operation::DuplicateVideo | Operation::DuplicateAudio => Self::Reencode {
                format: OutputFormat::default_for(asset.kind),
            },
            Operation::SaveMetadata => {
                Self::Metadata(MetadataPolicy::Replace(p.map("metadata")?.clone()))
            }
            Operation::RemoveMetadata => Self::Metadata(MetadataPolicy::Strip),
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/registry/request.rs"]
mod tests;
