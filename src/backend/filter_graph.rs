//! Lowering of a [`Composition`] to one `ffmpeg` invocation.
//!
//! Every source becomes one input. Each track kind is laid out as a sequence of segments
//! (tracks, plus filler for gaps) joined with `concat`, so the graph always ends in
//! `[vout]` and/or `[aout]`. Nothing here touches the filesystem; the result is plain
//! argument data.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::audio::mix::AudioMixSegment;
use crate::config::FfmpegConfig;
use crate::export::format::OutputFormat;
use crate::foundation::core::{Canvas, Point, TIME_EPSILON, Transform2D};
use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::{MediaId, MediaKind, TrackKind};
use crate::timeline::model::{Composition, MetadataPolicy, Track};

pub const VIDEO_OUT: &str = "vout";
pub const AUDIO_OUT: &str = "aout";

/// One `-i` input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub path: PathBuf,
    /// Stills are looped so they can be trimmed like any other stream.
    pub looped: bool,
}

/// Everything needed to run the export, minus the program and destination.
#[derive(Clone, Debug, PartialEq)]
pub struct FfmpegCommand {
    pub inputs: Vec<Input>,
    pub filter_complex: String,
    pub output: Vec<String>,
}

impl FfmpegCommand {
    pub fn args(&self, destination: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
            .into_iter()
            .map(OsString::from)
            .collect();
        for input in &self.inputs {
            if input.looped {
                args.push("-loop".into());
                args.push("1".into());
            }
            args.push("-i".into());
            args.push(input.path.clone().into_os_string());
        }
        args.push("-filter_complex".into());
        args.push(self.filter_complex.clone().into());
        args.extend(self.output.iter().map(OsString::from));
        args.push(destination.as_os_str().to_os_string());
        args
    }
}

/// Build the ffmpeg command rendering `comp` as `format`.
pub fn lower(
    comp: &Composition,
    format: OutputFormat,
    cfg: &FfmpegConfig,
) -> OperationResult<FfmpegCommand> {
    let kind = format.media_kind();
    let with_video = kind != MediaKind::Audio && comp.has(TrackKind::Video);
    let with_audio = kind != MediaKind::Image && comp.has(TrackKind::Audio);
    if !with_video && !with_audio {
        return Err(OperationError::encode_failed(format!(
            "nothing to encode as {format}"
        )));
    }

    let mut inputs = Vec::with_capacity(comp.sources.len());
    let mut index = BTreeMap::new();
    for (id, item) in &comp.sources {
        index.insert(*id, inputs.len());
        inputs.push(Input {
            path: item.locator.as_path().to_path_buf(),
            looped: item.kind == MediaKind::Image,
        });
    }

    // A still export still needs one frame's worth of timeline.
    let total = comp.duration().max(comp.frame_duration());
    let mut lowering = Lowering {
        comp,
        cfg,
        index,
        total,
        chains: Vec::new(),
    };
    if with_video {
        lowering.video()?;
    }
    if with_audio {
        lowering.audio();
    }

    let mut output = Vec::new();
    if with_video {
        output.extend(["-map".to_string(), format!("[{VIDEO_OUT}]")]);
    }
    if with_audio {
        output.extend(["-map".to_string(), format!("[{AUDIO_OUT}]")]);
    }
    output.extend(codec_args(format, comp, cfg, with_audio));
    if !format.is_still() {
        output.extend(["-t".to_string(), secs(comp.duration())]);
        output.extend(metadata_args(&comp.metadata));
    }

    Ok(FfmpegCommand {
        inputs,
        filter_complex: lowering.chains.join(";"),
        output,
    })
}

struct Lowering<'a> {
    comp: &'a Composition,
    cfg: &'a FfmpegConfig,
    index: BTreeMap<MediaId, usize>,
    total: f64,
    chains: Vec<String>,
}

impl Lowering<'_> {
    fn input_of(&self, track: &Track) -> OperationResult<usize> {
        self.index.get(&track.source).copied().ok_or_else(|| {
            OperationError::encode_failed(format!("track {} has no input", track.id.0))
        })
    }

    fn video(&mut self) -> OperationResult<()> {
        let comp = self.comp;
        let size = comp
            .render_size
            .ok_or_else(|| OperationError::encode_failed("composition has no render size"))?;
        let fps = comp.frame_rate;
        let rate = format!("{}/{}", fps.num, fps.den);
        let canvas = format!("{}x{}", size.width, size.height);

        let mut segments = Vec::new();
        let mut cursor = 0.0;
        for track in sorted(comp, TrackKind::Video) {
            let r = track.composition_range;
            if r.start - cursor > TIME_EPSILON {
                let label = format!("vg{}", segments.len());
                self.chains.push(format!(
                    "color=c=black:s={canvas}:r={rate}:d={},setsar=1[{label}]",
                    secs(r.start - cursor)
                ));
                segments.push(label);
            }

            let n = self.input_of(track)?;
            let source = comp.source(track)?;
            let native = source.native_size.ok_or_else(|| {
                OperationError::encode_failed(format!("source '{}' has no frame size", source.locator))
            })?;
            let len = r.duration.max(comp.frame_duration());
            let mut chain = format!("[{n}:v]");
            if source.kind == MediaKind::Image {
                chain.push_str(&format!("trim=duration={},setpts=PTS-STARTPTS", secs(len)));
            } else {
                chain.push_str(&format!(
                    "trim=start={}:duration={},setpts=(PTS-STARTPTS)*{}",
                    secs(track.source_range.start),
                    secs(track.source_range.duration),
                    ratio(1.0 / track.time_scale())
                ));
            }
            let (filters, at) = affine_filters(track.transform.unwrap_or_default(), native)?;
            for f in filters {
                chain.push(',');
                chain.push_str(&f);
            }
            let t = segments.len();
            chain.push_str(&format!(",format=rgba[vt{t}]"));
            self.chains.push(chain);
            self.chains.push(format!(
                "color=c=black:s={canvas}:r={rate}:d={}[vb{t}]",
                secs(len)
            ));
            let label = format!("vs{t}");
            self.chains.push(format!(
                "[vb{t}][vt{t}]overlay=x={}:y={}:eof_action=pass,setsar=1[{label}]",
                at.x.round(),
                at.y.round()
            ));
            segments.push(label);
            cursor = (r.start + len).max(cursor);
        }
        if self.total - cursor > TIME_EPSILON {
            let label = format!("vg{}", segments.len());
            self.chains.push(format!(
                "color=c=black:s={canvas}:r={rate}:d={},setsar=1[{label}]",
                secs(self.total - cursor)
            ));
            segments.push(label);
        }

        let mut tail = String::new();
        if self.cfg.needs_even_dimensions() && (size.width % 2 == 1 || size.height % 2 == 1) {
            tail.push_str(&format!(
                ",pad={}:{}",
                size.width + size.width % 2,
                size.height + size.height % 2
            ));
        }
        self.chains
            .push(join(&segments, "v=1:a=0", "null", &tail, VIDEO_OUT));
        Ok(())
    }

    fn audio(&mut self) {
        let comp = self.comp;
        let sr = self.cfg.sample_rate;
        let normalize = format!("aresample={sr},aformat=sample_fmts=fltp:channel_layouts=stereo");

        let mut segments = Vec::new();
        let mut cursor = 0.0;
        for track in sorted(comp, TrackKind::Audio) {
            let r = track.composition_range;
            if r.start - cursor > TIME_EPSILON {
                let label = format!("ag{}", segments.len());
                self.chains
                    .push(silence(sr, r.start - cursor, &normalize, &label));
                segments.push(label);
            }

            let Some(n) = self.index.get(&track.source).copied() else {
                continue;
            };
            let mut chain = format!(
                "[{n}:a]atrim=start={}:duration={},asetpts=PTS-STARTPTS",
                secs(track.source_range.start),
                secs(track.source_range.duration)
            );
            for piece in atempo_chain(track.time_scale()) {
                chain.push_str(&format!(",atempo={}", ratio(piece)));
            }
            chain.push(',');
            chain.push_str(&normalize);
            let segs = comp.mix_for(track.id);
            if let Some(expr) = volume_expr(&segs, r.start) {
                chain.push_str(&format!(",volume='{expr}':eval=frame"));
            }
            let label = format!("as{}", segments.len());
            chain.push_str(&format!("[{label}]"));
            self.chains.push(chain);
            segments.push(label);
            cursor = r.end().max(cursor);
        }
        if comp.duration() - cursor > TIME_EPSILON {
            let label = format!("ag{}", segments.len());
            self.chains.push(silence(
                sr,
                comp.duration() - cursor,
                &normalize,
                &label,
            ));
            segments.push(label);
        }
        self.chains
            .push(join(&segments, "v=0:a=1", "anull", "", AUDIO_OUT));
    }
}

fn sorted(comp: &Composition, kind: TrackKind) -> Vec<&Track> {
    let mut tracks: Vec<&Track> = comp.tracks_of(kind).collect();
    tracks.sort_by(|a, b| a.composition_range.start.total_cmp(&b.composition_range.start));
    tracks
}

fn silence(sample_rate: u32, duration: f64, normalize: &str, label: &str) -> String {
    format!(
        "anullsrc=r={sample_rate}:cl=stereo,atrim=duration={},{normalize}[{label}]",
        secs(duration)
    )
}

fn join(segments: &[String], streams: &str, passthrough: &str, tail: &str, out: &str) -> String {
    let inputs: String = segments.iter().map(|s| format!("[{s}]")).collect();
    if segments.len() == 1 {
        format!("{inputs}{passthrough}{tail}[{out}]")
    } else {
        format!(
            "{inputs}concat=n={}:{streams}{tail}[{out}]",
            segments.len()
        )
    }
}

/// Filters placing a `source`-sized frame under `transform`, and the top-left corner of the
/// result on the canvas.
///
/// ffmpeg applies scale (with flips for negative factors), then rotation about the frame
/// centre into its bounding box; the affine's translation is recovered from where the
/// transformed source corners land.
pub fn affine_filters(
    transform: Transform2D,
    source: Canvas,
) -> OperationResult<(Vec<String>, Point)> {
    let (sx, sy) = (transform.scale.x, transform.scale.y);
    if !sx.is_finite() || !sy.is_finite() || !transform.rotation_rad.is_finite() {
        return Err(OperationError::transform_invalid("non-finite track transform"));
    }
    let mut filters = Vec::new();
    if (sx.abs() - 1.0).abs() > TIME_EPSILON || (sy.abs() - 1.0).abs() > TIME_EPSILON {
        let w = (f64::from(source.width) * sx.abs()).round();
        let h = (f64::from(source.height) * sy.abs()).round();
        if w < 1.0 || h < 1.0 {
            return Err(OperationError::transform_invalid(format!(
                "track scales {}x{} to an empty frame",
                source.width, source.height
            )));
        }
        filters.push(format!("scale={w}:{h}"));
    }
    if sx < 0.0 {
        filters.push("hflip".to_string());
    }
    if sy < 0.0 {
        filters.push("vflip".to_string());
    }
    let a = transform.rotation_rad;
    if a.abs() > TIME_EPSILON {
        filters.push("format=rgba".to_string());
        filters.push(format!(
            "rotate={a}:ow=rotw({a}):oh=roth({a}):c=black@0",
            a = ratio(a)
        ));
    }

    let affine = transform.to_affine();
    let (w, h) = (f64::from(source.width), f64::from(source.height));
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(0.0, h),
        Point::new(w, h),
    ]
    .map(|p| affine * p);
    let min = corners.iter().fold(Point::new(f64::INFINITY, f64::INFINITY), |m, p| {
        Point::new(m.x.min(p.x), m.y.min(p.y))
    });
    Ok((filters, min))
}

/// Split a tempo factor into `atempo` stages, each within `[0.5, 2]`.
pub fn atempo_chain(factor: f64) -> Vec<f64> {
    if !factor.is_finite() || factor <= 0.0 || (factor - 1.0).abs() <= TIME_EPSILON {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut rest = factor;
    while rest > 2.0 {
        out.push(2.0);
        rest /= 2.0;
    }
    while rest < 0.5 {
        out.push(0.5);
        rest /= 0.5;
    }
    out.push(rest);
    out
}

/// ffmpeg expression of the gain envelope over track-local time, or `None` for unity.
///
/// Mirrors [`crate::audio::mix::envelope_gain`]: unity before the first ramp, each ramp's end
/// level held until the next one starts.
pub fn volume_expr(segments: &[AudioMixSegment], track_start: f64) -> Option<String> {
    let last = segments.last()?;
    let mut expr = level(last.end_volume);
    for (i, seg) in segments.iter().enumerate().rev() {
        let a = seg.time_range.start - track_start;
        let b = a + seg.time_range.duration;
        let before = if i == 0 {
            "1".to_string()
        } else {
            level(segments[i - 1].end_volume)
        };
        let ramp = if seg.time_range.duration <= TIME_EPSILON
            || (seg.start_volume - seg.end_volume).abs() <= f32::EPSILON
        {
            level(seg.end_volume)
        } else {
            format!(
                "{}+({})*(t-{})/{}",
                level(seg.start_volume),
                level(seg.end_volume - seg.start_volume),
                secs(a),
                secs(seg.time_range.duration)
            )
        };
        expr = format!(
            "if(lt(t,{}),{before},if(lte(t,{}),{ramp},{expr}))",
            secs(a),
            secs(b)
        );
    }
    Some(expr)
}

fn codec_args(
    format: OutputFormat,
    comp: &Composition,
    cfg: &FfmpegConfig,
    with_audio: bool,
) -> Vec<String> {
    let s = |v: &str| v.to_string();
    let fps = comp.frame_rate;
    let aac = [
        s("-c:a"),
        cfg.audio_codec.clone(),
        s("-b:a"),
        cfg.audio_bitrate.clone(),
    ];
    match format {
        OutputFormat::Mov | OutputFormat::Mp4 => {
            let mut args = vec![
                s("-c:v"),
                cfg.video_codec.clone(),
                s("-crf"),
                cfg.crf.to_string(),
                s("-pix_fmt"),
                cfg.pixel_format.clone(),
                s("-r"),
                format!("{}/{}", fps.num, fps.den),
            ];
            if with_audio {
                args.extend(aac);
            }
            args.extend([s("-movflags"), s("+faststart")]);
            args
        }
        OutputFormat::M4a => {
            let mut args = vec![s("-vn")];
            args.extend(aac);
            args
        }
        OutputFormat::Wav => vec![s("-vn"), s("-c:a"), s("pcm_s16le")],
        OutputFormat::Png => vec![s("-frames:v"), s("1"), s("-update"), s("1")],
        OutputFormat::Jpeg => vec![
            s("-frames:v"),
            s("1"),
            s("-update"),
            s("1"),
            s("-q:v"),
            s("2"),
        ],
    }
}

fn metadata_args(policy: &MetadataPolicy) -> Vec<String> {
    match policy {
        MetadataPolicy::Preserve => vec!["-map_metadata".to_string(), "0".to_string()],
        MetadataPolicy::Strip => vec!["-map_metadata".to_string(), "-1".to_string()],
        MetadataPolicy::Replace(entries) => {
            let mut args = vec!["-map_metadata".to_string(), "-1".to_string()];
            for (k, v) in entries {
                args.push("-metadata".to_string());
                args.push(format!("{k}={v}"));
            }
            args
        }
    }
}

fn secs(v: f64) -> String {
    format!("{v:.6}")
}

fn ratio(v: f64) -> String {
    format!("{v:.9}")
}

fn level(v: f32) -> String {
    format!("{v:.6}")
}

#[cfg(test)]
#[path = "../../tests/unit/backend/filter_graph.rs"]
mod tests;
