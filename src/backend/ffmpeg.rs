//! Backend driving the system `ffprobe` and `ffmpeg` binaries.
//!
//! Probing parses `ffprobe -print_format json`. Exports run one `ffmpeg` process per job with
//! the graph from [`crate::backend::filter_graph::lower`]; the child is killed when the job
//! is cancelled or the export future is dropped.

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::backend::MediaBackend;
use crate::backend::filter_graph;
use crate::config::FfmpegConfig;
use crate::export::format::OutputFormat;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{Locator, TrackDescriptor, TrackKind};
use crate::timeline::model::Composition;

const STDERR_TAIL: usize = 2048;

/// Backend over external ffmpeg programs.
#[derive(Clone, Debug, Default)]
pub struct FfmpegBackend {
    cfg: FfmpegConfig,
}

impl FfmpegBackend {
    pub fn new(cfg: FfmpegConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.cfg
    }

    /// Whether both configured programs start and answer `-version`.
    pub async fn is_available(&self) -> bool {
        for program in [&self.cfg.ffmpeg, &self.cfg.ffprobe] {
            let ok = Command::new(program)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);
            if !ok {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    #[tracing::instrument(skip(self), fields(backend = "ffmpeg"))]
    async fn open(&self, locator: &Locator) -> OperationResult<Vec<TrackDescriptor>> {
        let output = Command::new(&self.cfg.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(locator.as_path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                OperationError::source_unreadable(format!(
                    "failed to run '{}': {e}",
                    self.cfg.ffprobe.display()
                ))
            })?;
        if !output.status.success() {
            return Err(OperationError::source_unreadable(format!(
                "ffprobe rejected '{locator}': {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parse ffprobe output for '{locator}'"))
            .map_err(|e| OperationError::source_unreadable(format!("{e:#}")))?;
        let tracks = probe.tracks();
        tracing::debug!(tracks = tracks.len(), "probed");
        Ok(tracks)
    }

    #[tracing::instrument(skip(self, composition, cancel), fields(backend = "ffmpeg"))]
    async fn export(
        &self,
        composition: &Composition,
        format: OutputFormat,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> OperationResult<()> {
        let plan = filter_graph::lower(composition, format, &self.cfg)?;
        tracing::debug!(graph = %plan.filter_complex, "lowered composition");

        let mut child = Command::new(&self.cfg.ffmpeg)
            .args(plan.args(destination))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OperationError::encode_failed(format!(
                    "failed to spawn '{}' (is it installed?): {e}",
                    self.cfg.ffmpeg.display()
                ))
            })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| OperationError::encode_failed("ffmpeg stderr was not captured"))?;
        let drain = tokio::spawn(async move {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes).await.map(|_| bytes)
        });

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| {
                OperationError::encode_failed(format!("failed to wait for ffmpeg: {e}"))
            })?,
            () = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill ffmpeg");
                }
                drain.abort();
                return Err(OperationError::Cancelled);
            }
        };

        let stderr = match drain.await {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Err(e)) => format!("<stderr read failed: {e}>"),
            Err(e) => format!("<stderr drain failed: {e}>"),
        };
        if !status.success() {
            return Err(OperationError::encode_failed(format!(
                "ffmpeg exited with {status}: {}",
                tail(stderr.trim(), STDERR_TAIL)
            )));
        }
        Ok(())
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[derive(Debug, Default, serde::Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    duration: Option<String>,
}

impl ProbeOutput {
    fn is_still(&self) -> bool {
        let name = self.format.format_name.as_str();
        name == "image2" || name.ends_with("_pipe")
    }

    /// First stream of each kind, in video-then-audio order.
    fn tracks(&self) -> Vec<TrackDescriptor> {
        let container = parse_secs(self.format.duration.as_deref());
        let still = self.is_still();
        let mut out = Vec::new();
        for kind in TrackKind::ALL {
            let wanted = match kind {
                TrackKind::Video => "video",
                TrackKind::Audio => "audio",
            };
            let Some(s) = self.streams.iter().find(|s| s.codec_type == wanted) else {
                continue;
            };
            let duration = if still {
                0.0
            } else {
                parse_secs(s.duration.as_deref()).or(container).unwrap_or(0.0)
            };
            out.push(TrackDescriptor {
                kind,
                duration,
                size: match (s.width, s.height) {
                    (Some(w), Some(h)) => Canvas::new(w, h).ok(),
                    _ => None,
                },
                frame_rate: if still {
                    None
                } else {
                    s.r_frame_rate.as_deref().and_then(Fps::parse_ratio)
                },
                sample_rate: s.sample_rate.as_deref().and_then(|r| r.parse().ok()),
            });
        }
        out
    }
}

fn parse_secs(s: Option<&str>) -> Option<f64> {
    s?.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
#[path = "../../tests/unit/backend/ffmpeg.rs"]
mod tests;
