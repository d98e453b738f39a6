use super::*;
use crate::foundation::core::{Fps, TimeRange, TrackId, Vec2};
use crate::media::item::{Locator, MediaItem};
use crate::transform::compile::{SpatialOp, compile_transform};

fn video_item(name: &str, duration: f64, width: u32, height: u32) -> MediaItem {
    MediaItem::new(
        Locator::from_path(format!("/media/{name}")),
        MediaKind::Video,
        duration,
        Some(Canvas { width, height }),
        Some(Fps::new(25, 1).unwrap()),
    )
    .unwrap()
}

fn track(id: u32, kind: TrackKind, source: &MediaItem, start: f64, src: TimeRange) -> Track {
    Track {
        id: TrackId(id),
        kind,
        composition_range: TimeRange::new(start, src.duration).unwrap(),
        source: source.id,
        source_range: src,
        transform: None,
    }
}

fn comp(items: &[&MediaItem], tracks: Vec<Track>, size: Canvas) -> Composition {
    Composition {
        sources: items.iter().map(|i| (i.id, (*i).clone())).collect(),
        tracks,
        render_size: Some(size),
        frame_rate: Fps::new(25, 1).unwrap(),
        audio_mix: vec![],
        metadata: MetadataPolicy::Preserve,
    }
}

#[test]
fn atempo_stages_stay_in_range() {
    assert!(atempo_chain(1.0).is_empty());
    assert_eq!(atempo_chain(1.5), vec![1.5]);
    assert_eq!(atempo_chain(3.0), vec![2.0, 1.5]);
    assert_eq!(atempo_chain(4.0), vec![2.0, 2.0]);
    assert_eq!(atempo_chain(0.25), vec![0.5, 0.5]);
    let product: f64 = atempo_chain(0.3).iter().product();
    assert!((product - 0.3).abs() < 1e-9);
}

#[test]
fn volume_expression_follows_envelope() {
    assert_eq!(volume_expr(&[], 0.0), None);

    let fade_in = AudioMixSegment::new(TrackId(1), TimeRange::new(1.0, 2.0).unwrap(), 0.0, 1.0);
    let expr = volume_expr(&[fade_in], 1.0).unwrap();
    assert_eq!(
        expr,
        "if(lt(t,0.000000),1,if(lte(t,2.000000),\
         0.000000+(1.000000)*(t-0.000000)/2.000000,1.000000))"
    );

    let flat = AudioMixSegment::new(TrackId(1), TimeRange::new(0.0, 4.0).unwrap(), 0.5, 0.5);
    let expr = volume_expr(&[flat], 0.0).unwrap();
    assert_eq!(
        expr,
        "if(lt(t,0.000000),1,if(lte(t,4.000000),0.500000,0.500000))"
    );
}

#[test]
fn affine_lowering_matches_spatial_ops() {
    let src = Canvas {
        width: 8,
        height: 6,
    };

    let (filters, at) = affine_filters(Transform2D::default(), src).unwrap();
    assert!(filters.is_empty());
    assert_eq!(at, Point::new(0.0, 0.0));

    let crop = compile_transform(
        &SpatialOp::Crop {
            x: 3.0,
            y: 2.0,
            width: 4.0,
            height: 4.0,
        },
        src,
    )
    .unwrap();
    let (filters, at) = affine_filters(crop.transform, src).unwrap();
    assert!(filters.is_empty());
    assert_eq!(at, Point::new(-3.0, -2.0));

    let flip = compile_transform(
        &SpatialOp::Flip {
            horizontal: true,
            vertical: false,
        },
        src,
    )
    .unwrap();
    let (filters, at) = affine_filters(flip.transform, src).unwrap();
    assert_eq!(filters, vec!["hflip".to_string()]);
    assert!((at.x).abs() < 1e-9 && (at.y).abs() < 1e-9);

    let scaled = Transform2D {
        scale: Vec2::new(2.0, 0.5),
        ..Transform2D::default()
    };
    let (filters, _) = affine_filters(scaled, src).unwrap();
    assert_eq!(filters, vec!["scale=16:3".to_string()]);

    let rotated = Transform2D {
        rotation_rad: std::f64::consts::FRAC_PI_2,
        ..Transform2D::default()
    };
    let (filters, at) = affine_filters(rotated, src).unwrap();
    assert_eq!(filters[0], "format=rgba");
    assert!(filters[1].starts_with("rotate=1.570796327:ow=rotw(1.570796327)"));
    assert!((at.x + 6.0).abs() < 1e-9 && at.y.abs() < 1e-9);
}

#[test]
fn degenerate_scale_is_rejected() {
    let t = Transform2D {
        scale: Vec2::new(0.01, 1.0),
        ..Transform2D::default()
    };
    let err = affine_filters(t, Canvas { width: 8, height: 6 }).unwrap_err();
    assert!(matches!(err, OperationError::TransformInvalid(_)));
}

#[test]
fn trimmed_movie_lowers_both_kinds() {
    let v = video_item("a.mov", 5.0, 640, 360);
    let window = TimeRange::new(1.0, 2.0).unwrap();
    let c = comp(
        &[&v],
        vec![
            track(0, TrackKind::Video, &v, 0.0, window),
            track(1, TrackKind::Audio, &v, 0.0, window),
        ],
        Canvas {
            width: 640,
            height: 360,
        },
    );
    let cmd = lower(&c, OutputFormat::Mov, &FfmpegConfig::default()).unwrap();

    assert_eq!(cmd.inputs.len(), 1);
    assert!(!cmd.inputs[0].looped);
    let g = &cmd.filter_complex;
    assert!(g.contains("[0:v]trim=start=1.000000:duration=2.000000,setpts=(PTS-STARTPTS)*1.000000000"));
    assert!(g.contains("[0:a]atrim=start=1.000000:duration=2.000000,asetpts=PTS-STARTPTS"));
    assert!(g.contains("color=c=black:s=640x360:r=25/1:d=2.000000[vb0]"));
    assert!(g.contains("[vs0]null[vout]"));
    assert!(g.contains("[as0]anull[aout]"));
    assert!(!g.contains("atempo"));

    let out = cmd.output.join(" ");
    assert!(out.starts_with("-map [vout] -map [aout] -c:v libx264 -crf 20 -pix_fmt yuv420p"));
    assert!(out.contains("-c:a aac -b:a 192k"));
    assert!(out.contains("-t 2.000000"));
    assert!(out.ends_with("-map_metadata 0"));

    let args = cmd.args(Path::new("/tmp/out.mov"));
    assert_eq!(args.last().unwrap(), "/tmp/out.mov");
    assert!(args.iter().any(|a| a == "-filter_complex"));
}

#[test]
fn sped_up_audio_uses_atempo_and_ramps() {
    let v = video_item("a.mov", 4.0, 320, 240);
    let mut t = track(
        0,
        TrackKind::Audio,
        &v,
        0.0,
        TimeRange::new(0.0, 4.0).unwrap(),
    );
    t.composition_range = TimeRange::new(0.0, 1.0).unwrap();
    let mut c = comp(&[&v], vec![t], Canvas { width: 320, height: 240 });
    c.render_size = None;
    c.audio_mix = vec![AudioMixSegment::new(
        TrackId(0),
        TimeRange::new(0.0, 1.0).unwrap(),
        0.0,
        1.0,
    )];

    let cmd = lower(&c, OutputFormat::M4a, &FfmpegConfig::default()).unwrap();
    let g = &cmd.filter_complex;
    assert!(g.contains(",atempo=2.000000000,atempo=2.000000000,"));
    assert!(g.contains("aresample=48000,aformat=sample_fmts=fltp:channel_layouts=stereo"));
    assert!(g.contains(",volume='if(lt(t,0.000000),1,"));
    assert!(!g.contains("[vout]"));
    assert_eq!(cmd.output[..2], ["-map".to_string(), "[aout]".to_string()]);
    assert!(cmd.output.contains(&"-vn".to_string()));
}

#[test]
fn gaps_are_filled_before_concat() {
    let a = video_item("a.mov", 2.0, 64, 64);
    let b = video_item("b.mov", 2.0, 64, 64);
    let c = comp(
        &[&a, &b],
        vec![
            track(0, TrackKind::Video, &a, 0.0, TimeRange::new(0.0, 2.0).unwrap()),
            track(1, TrackKind::Video, &b, 3.0, TimeRange::new(0.0, 2.0).unwrap()),
        ],
        Canvas {
            width: 64,
            height: 64,
        },
    );
    let cmd = lower(&c, OutputFormat::Mp4, &FfmpegConfig::default()).unwrap();
    let g = &cmd.filter_complex;
    assert_eq!(cmd.inputs.len(), 2);
    assert!(g.contains("color=c=black:s=64x64:r=25/1:d=1.000000,setsar=1[vg1]"));
    assert!(g.contains("[vs0][vg1][vs2]concat=n=3:v=1:a=0[vout]"));
    assert!(cmd.output.contains(&"-t".to_string()));
    assert!(!cmd.output.contains(&"-c:a".to_string()));
}

#[test]
fn odd_canvas_is_padded_for_subsampled_output() {
    let v = video_item("a.mov", 1.0, 63, 31);
    let c = comp(
        &[&v],
        vec![track(0, TrackKind::Video, &v, 0.0, TimeRange::new(0.0, 1.0).unwrap())],
        Canvas {
            width: 63,
            height: 31,
        },
    );
    let cmd = lower(&c, OutputFormat::Mov, &FfmpegConfig::default()).unwrap();
    assert!(cmd.filter_complex.ends_with("[vs0]null,pad=64:32[vout]"));

    let cfg = FfmpegConfig {
        pixel_format: "yuv444p".to_string(),
        ..FfmpegConfig::default()
    };
    let cmd = lower(&c, OutputFormat::Mov, &cfg).unwrap();
    assert!(cmd.filter_complex.ends_with("[vs0]null[vout]"));
}

#[test]
fn stills_and_metadata_policies() {
    let v = video_item("a.mov", 5.0, 32, 32);
    let frame = TimeRange::new(2.0, 0.04).unwrap();
    let mut c = comp(
        &[&v],
        vec![track(0, TrackKind::Video, &v, 0.0, frame)],
        Canvas {
            width: 32,
            height: 32,
        },
    );

    let png = lower(&c, OutputFormat::Png, &FfmpegConfig::default()).unwrap();
    assert!(png.output.contains(&"-frames:v".to_string()));
    assert!(!png.output.contains(&"-t".to_string()));
    assert!(!png.output.contains(&"-map_metadata".to_string()));

    c.metadata = MetadataPolicy::Strip;
    let stripped = lower(&c, OutputFormat::Mov, &FfmpegConfig::default()).unwrap();
    assert!(stripped.output.join(" ").ends_with("-map_metadata -1"));

    c.metadata = MetadataPolicy::Replace(
        [("title".to_string(), "Holiday".to_string())]
            .into_iter()
            .collect(),
    );
    let replaced = lower(&c, OutputFormat::Mov, &FfmpegConfig::default()).unwrap();
    assert!(
        replaced
            .output
            .join(" ")
            .ends_with("-map_metadata -1 -metadata title=Holiday")
    );

    let err = lower(&c, OutputFormat::Wav, &FfmpegConfig::default()).unwrap_err();
    assert!(matches!(err, OperationError::EncodeFailed(_)));
}
