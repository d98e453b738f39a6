//! Deterministic in-process backend.
//!
//! Sources and outputs are [`RawClip`] JSON files (straight RGBA8 frames plus mono `f32`
//! PCM) or PNG/JPEG stills. Frames are produced by sampling each source through the inverse
//! of its track transform at pixel centers (nearest neighbour); uncovered pixels are opaque
//! black. Audio is mixed through each track's gain envelope.

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::audio::mix::envelope_gain;
use crate::backend::MediaBackend;
use crate::export::format::OutputFormat;
use crate::foundation::core::{Canvas, Fps, Point};
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{Locator, MediaId, MediaKind, TrackDescriptor, TrackKind};
use crate::timeline::model::{Composition, MetadataPolicy, Track};

const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 255];
const DEFAULT_SAMPLE_RATE: u32 = 48_000;
const SAMPLE_EPSILON: f64 = 1e-6;

/// Straight-alpha RGBA8 frames at a fixed rate.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawVideo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Fps,
    /// One `width * height * 4` buffer per frame.
    pub frames: Vec<Vec<u8>>,
}

impl RawVideo {
    /// Build `frame_count` frames from a per-pixel function of `(frame, x, y)`.
    pub fn from_fn(
        width: u32,
        height: u32,
        frame_rate: Fps,
        frame_count: usize,
        mut pixel: impl FnMut(usize, u32, u32) -> [u8; 4],
    ) -> Self {
        let frames = (0..frame_count)
            .map(|f| {
                let mut data = Vec::with_capacity(rgba_len(width, height));
                for y in 0..height {
                    for x in 0..width {
                        data.extend_from_slice(&pixel(f, x, y));
                    }
                }
                data
            })
            .collect();
        Self {
            width,
            height,
            frame_rate,
            frames,
        }
    }

    pub fn duration(&self) -> f64 {
        self.frame_rate.frames_to_secs(self.frames.len() as u64)
    }

    pub fn pixel(&self, frame: usize, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let data = self.frames.get(frame)?;
        let i = (y as usize * self.width as usize + x as usize) * 4;
        data.get(i..i + 4)?.try_into().ok()
    }

    /// Index of the frame shown at `t`, held at the last frame past the end.
    pub fn frame_index_at(&self, t: f64) -> usize {
        let idx = (t * self.frame_rate.as_f64() + SAMPLE_EPSILON).floor().max(0.0) as usize;
        idx.min(self.frames.len().saturating_sub(1))
    }
}

/// Mono PCM.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawAudio {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl RawAudio {
    pub fn from_fn(sample_rate: u32, count: usize, sample: impl FnMut(usize) -> f32) -> Self {
        Self {
            sample_rate,
            samples: (0..count).map(sample).collect(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Sample at `t`, silence outside the buffer.
    pub fn sample_at(&self, t: f64) -> f32 {
        if t < 0.0 {
            return 0.0;
        }
        let idx = (t * f64::from(self.sample_rate) + SAMPLE_EPSILON).floor() as usize;
        self.samples.get(idx).copied().unwrap_or(0.0)
    }
}

/// File format of the CPU backend.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawClip {
    #[serde(default)]
    pub video: Option<RawVideo>,
    #[serde(default)]
    pub audio: Option<RawAudio>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RawClip {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open raw clip '{}'", path.display()))?;
        serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse raw clip '{}'", path.display()))
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        let f = std::fs::File::create(path)
            .with_context(|| format!("create raw clip '{}'", path.display()))?;
        serde_json::to_writer(BufWriter::new(f), self)
            .with_context(|| format!("write raw clip '{}'", path.display()))
    }

    pub fn tracks(&self) -> Vec<TrackDescriptor> {
        let mut out = Vec::new();
        if let Some(v) = &self.video {
            out.push(TrackDescriptor {
                kind: TrackKind::Video,
                duration: v.duration(),
                size: Some(Canvas {
                    width: v.width,
                    height: v.height,
                }),
                frame_rate: Some(v.frame_rate),
                sample_rate: None,
            });
        }
        if let Some(a) = &self.audio {
            out.push(TrackDescriptor {
                kind: TrackKind::Audio,
                duration: a.duration(),
                size: None,
                frame_rate: None,
                sample_rate: Some(a.sample_rate),
            });
        }
        out
    }
}

enum LoadedSource {
    Clip(RawClip),
    Still(image::RgbaImage),
}

impl LoadedSource {
    fn load(path: &Path) -> anyhow::Result<Self> {
        if is_still_path(path) {
            let img = image::open(path)
                .with_context(|| format!("decode image '{}'", path.display()))?;
            Ok(Self::Still(img.to_rgba8()))
        } else {
            RawClip::read(path).map(Self::Clip)
        }
    }

    fn pixel_at(&self, t: f64, x: i64, y: i64) -> Option<[u8; 4]> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        match self {
            Self::Still(img) => img.get_pixel_checked(x, y).map(|p| p.0),
            Self::Clip(clip) => {
                let v = clip.video.as_ref()?;
                v.pixel(v.frame_index_at(t), x, y)
            }
        }
    }

    fn audio(&self) -> Option<&RawAudio> {
        match self {
            Self::Clip(clip) => clip.audio.as_ref(),
            Self::Still(_) => None,
        }
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        match self {
            Self::Clip(clip) => clip.metadata.clone(),
            Self::Still(_) => BTreeMap::new(),
        }
    }
}

/// Byte length of one RGBA8 frame.
fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn is_still_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("png" | "jpg" | "jpeg")
    )
}

/// CPU reference backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    #[tracing::instrument(skip(self), fields(backend = "cpu"))]
    async fn open(&self, locator: &Locator) -> OperationResult<Vec<TrackDescriptor>> {
        let path = locator.as_path().to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || LoadedSource::load(&path))
            .await
            .map_err(|e| OperationError::source_unreadable(format!("probe task failed: {e}")))?
            .map_err(|e| OperationError::source_unreadable(format!("{e:#}")))?;
        Ok(match loaded {
            LoadedSource::Clip(clip) => clip.tracks(),
            LoadedSource::Still(img) => vec![TrackDescriptor {
                kind: TrackKind::Video,
                duration: 0.0,
                size: Some(Canvas {
                    width: img.width(),
                    height: img.height(),
                }),
                frame_rate: None,
                sample_rate: None,
            }],
        })
    }

    #[tracing::instrument(skip(self, composition, cancel), fields(backend = "cpu"))]
    async fn export(
        &self,
        composition: &Composition,
        format: OutputFormat,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> OperationResult<()> {
        let comp = composition.clone();
        let dest = destination.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || render_to_file(&comp, format, &dest, &cancel))
            .await
            .map_err(|e| OperationError::encode_failed(format!("render task failed: {e}")))?
    }
}

fn render_to_file(
    comp: &Composition,
    format: OutputFormat,
    dest: &Path,
    cancel: &CancellationToken,
) -> OperationResult<()> {
    let mut sources = BTreeMap::new();
    for (id, item) in &comp.sources {
        let loaded = LoadedSource::load(item.locator.as_path())
            .map_err(|e| OperationError::source_unreadable(format!("{e:#}")))?;
        sources.insert(*id, loaded);
    }

    if format.is_still() {
        let size = render_size(comp)?;
        let frame = render_frame(comp, &sources, size, 0.0)?;
        let img = image::RgbaImage::from_raw(size.width, size.height, frame)
            .ok_or_else(|| OperationError::encode_failed("frame buffer size mismatch"))?;
        let encoded = match format {
            OutputFormat::Jpeg => image::DynamicImage::ImageRgba8(img)
                .to_rgb8()
                .save_with_format(dest, image::ImageFormat::Jpeg),
            _ => img.save_with_format(dest, image::ImageFormat::Png),
        };
        return encoded
            .with_context(|| format!("write still '{}'", dest.display()))
            .map_err(Into::into);
    }

    let video = if format.media_kind() == MediaKind::Video {
        Some(render_video(comp, &sources, cancel)?)
    } else {
        None
    };
    let audio = if comp.has(TrackKind::Audio) {
        Some(render_audio(comp, &sources, cancel)?)
    } else {
        None
    };
    if cancel.is_cancelled() {
        return Err(OperationError::Cancelled);
    }

    let metadata = match &comp.metadata {
        MetadataPolicy::Preserve => comp
            .tracks
            .first()
            .and_then(|t| sources.get(&t.source))
            .map(LoadedSource::metadata)
            .unwrap_or_default(),
        MetadataPolicy::Strip => BTreeMap::new(),
        MetadataPolicy::Replace(entries) => entries.clone(),
    };

    RawClip {
        video,
        audio,
        metadata,
    }
    .write(dest)?;
    Ok(())
}

fn render_size(comp: &Composition) -> OperationResult<Canvas> {
    comp.render_size
        .ok_or_else(|| OperationError::encode_failed("composition has no render size"))
}

fn render_video(
    comp: &Composition,
    sources: &BTreeMap<MediaId, LoadedSource>,
    cancel: &CancellationToken,
) -> OperationResult<RawVideo> {
    let size = render_size(comp)?;
    let fps = comp.frame_rate;
    let count = fps.secs_to_frames_ceil(comp.duration()) as usize;
    let mut frames = Vec::with_capacity(count);
    for i in 0..count {
        if cancel.is_cancelled() {
            return Err(OperationError::Cancelled);
        }
        frames.push(render_frame(comp, sources, size, fps.frames_to_secs(i as u64))?);
    }
    tracing::debug!(frames = frames.len(), "rendered video");
    Ok(RawVideo {
        width: size.width,
        height: size.height,
        frame_rate: fps,
        frames,
    })
}

fn render_frame(
    comp: &Composition,
    sources: &BTreeMap<MediaId, LoadedSource>,
    size: Canvas,
    t: f64,
) -> OperationResult<Vec<u8>> {
    let mut data = Vec::with_capacity(rgba_len(size.width, size.height));
    let Some(track) = comp
        .tracks_of(TrackKind::Video)
        .find(|tr| tr.is_active_at(t))
    else {
        for _ in 0..size.width as usize * size.height as usize {
            data.extend_from_slice(&OPAQUE_BLACK);
        }
        return Ok(data);
    };

    let source = source_for(sources, track)?;
    let inverse = track.transform.unwrap_or_default().to_affine().inverse();
    let src_t = track.source_time(t);
    for y in 0..size.height {
        for x in 0..size.width {
            let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let px = source
                .pixel_at(src_t, p.x.floor() as i64, p.y.floor() as i64)
                .unwrap_or(OPAQUE_BLACK);
            data.extend_from_slice(&px);
        }
    }
    Ok(data)
}

fn render_audio(
    comp: &Composition,
    sources: &BTreeMap<MediaId, LoadedSource>,
    cancel: &CancellationToken,
) -> OperationResult<RawAudio> {
    let sample_rate = comp
        .tracks_of(TrackKind::Audio)
        .find_map(|t| sources.get(&t.source).and_then(LoadedSource::audio))
        .map(|a| a.sample_rate)
        .unwrap_or(DEFAULT_SAMPLE_RATE);
    let total = (comp.duration() * f64::from(sample_rate)).round() as usize;
    let mut out = vec![0.0f32; total];

    for track in comp.tracks_of(TrackKind::Audio) {
        if cancel.is_cancelled() {
            return Err(OperationError::Cancelled);
        }
        let Some(pcm) = source_for(sources, track)?.audio() else {
            continue;
        };
        let segments = comp.mix_for(track.id);
        for (i, slot) in out.iter_mut().enumerate() {
            let t = i as f64 / f64::from(sample_rate);
            if !track.is_active_at(t) {
                continue;
            }
            *slot += pcm.sample_at(track.source_time(t)) * envelope_gain(&segments, t);
        }
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    Ok(RawAudio {
        sample_rate,
        samples: out,
    })
}

fn source_for<'a>(
    sources: &'a BTreeMap<MediaId, LoadedSource>,
    track: &Track,
) -> OperationResult<&'a LoadedSource> {
    sources.get(&track.source).ok_or_else(|| {
        OperationError::encode_failed(format!("track {} source was not loaded", track.id.0))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/backend/cpu.rs"]
mod tests;
