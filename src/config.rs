//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::core::Fps;
use crate::foundation::error::{OperationError, OperationResult};

/// Top-level settings shared by the registry, storage and backends.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory export jobs write into.
    pub scratch_dir: PathBuf,
    /// Frame rate used when no source or operation provides one.
    pub default_frame_rate: f64,
    pub ffmpeg: FfmpegConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("montage"),
            default_frame_rate: 30.0,
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> OperationResult<()> {
        self.frame_rate()?;
        if self.scratch_dir.as_os_str().is_empty() {
            return Err(OperationError::invalid_parameters(
                "scratch_dir must not be empty",
            ));
        }
        self.ffmpeg.validate()
    }

    /// `default_frame_rate` as an exact rate.
    pub fn frame_rate(&self) -> OperationResult<Fps> {
        Fps::from_f64(self.default_frame_rate)
    }
}

/// Programs and encoder settings for the ffmpeg backend.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub video_codec: String,
    /// Constant rate factor, 0..=51.
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Sample rate every audio segment is resampled to before concatenation.
    pub sample_rate: u32,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            video_codec: "libx264".to_string(),
            crf: 20,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            sample_rate: 48_000,
        }
    }
}

impl FfmpegConfig {
    pub fn validate(&self) -> OperationResult<()> {
        if self.crf > 51 {
            return Err(OperationError::invalid_parameters(format!(
                "crf must be in 0..=51, got {}",
                self.crf
            )));
        }
        if self.sample_rate == 0 {
            return Err(OperationError::invalid_parameters(
                "sample_rate must be non-zero",
            ));
        }
        for (name, value) in [
            ("video_codec", &self.video_codec),
            ("pixel_format", &self.pixel_format),
            ("audio_codec", &self.audio_codec),
            ("audio_bitrate", &self.audio_bitrate),
        ] {
            if value.trim().is_empty() {
                return Err(OperationError::invalid_parameters(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Whether the configured pixel format subsamples chroma and so needs even dimensions.
    pub fn needs_even_dimensions(&self) -> bool {
        self.pixel_format.starts_with("yuv420") || self.pixel_format.starts_with("nv12")
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
