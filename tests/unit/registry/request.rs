use super::*;
use crate::foundation::core::Canvas;
use crate::media::item::Locator;
use crate::registry::params::ParamValue;
use crate::transform::compile::compile_transform;

fn video() -> MediaItem {
    MediaItem::new(
        Locator::from_path("clip.mov"),
        MediaKind::Video,
        5.0,
        Some(Canvas {
            width: 64,
            height: 48,
        }),
        Some(Fps::new(25, 1).unwrap()),
    )
    .unwrap()
}

fn audio() -> MediaItem {
    MediaItem::new(Locator::from_path("tone.m4a"), MediaKind::Audio, 3.0, None, None).unwrap()
}

fn params(entries: &[(&str, ParamValue)]) -> Params {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn num(v: f64) -> ParamValue {
    ParamValue::Number(v)
}

#[test]
fn trim_builds_a_window() {
    let req = OperationRequest::parse(
        Operation::Trim,
        &video(),
        &params(&[("start", num(1.0)), ("duration", num(2.0))]),
    )
    .unwrap();
    assert_eq!(
        req,
        OperationRequest::Trim {
            window: TimeRange::new(1.0, 2.0).unwrap()
        }
    );

    let err = OperationRequest::parse(
        Operation::Trim,
        &video(),
        &params(&[("start", num(1.0)), ("duration", num(0.0))]),
    )
    .unwrap_err();
    assert!(matches!(err, OperationError::InvalidParameters(_)));
}

#[test]
fn crop_must_fit_the_frame() {
    let ok = OperationRequest::parse(
        Operation::Crop,
        &video(),
        &params(&[("x", num(4.0)), ("y", num(8.0)), ("w", num(32.0)), ("h", num(16.0))]),
    )
    .unwrap();
    assert_eq!(
        ok,
        OperationRequest::Spatial(SpatialOp::Crop {
            x: 4.0,
            y: 8.0,
            width: 32.0,
            height: 16.0
        })
    );

    let err = OperationRequest::parse(
        Operation::Crop,
        &video(),
        &params(&[("x", num(40.0)), ("y", num(0.0)), ("w", num(32.0)), ("h", num(16.0))]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("exceeds the 64x48 frame"));
}

#[test]
fn flip_and_mirror_pick_axes() {
    let err = OperationRequest::parse(Operation::Flip, &video(), &Params::new()).unwrap_err();
    assert!(matches!(err, OperationError::InvalidParameters(_)));

    let req = OperationRequest::parse(Operation::Mirror, &video(), &Params::new()).unwrap();
    assert_eq!(
        req,
        OperationRequest::Spatial(SpatialOp::Flip {
            horizontal: true,
            vertical: false
        })
    );
    let req = OperationRequest::parse(
        Operation::Mirror,
        &video(),
        &params(&[("vertical", ParamValue::Bool(true))]),
    )
    .unwrap();
    assert_eq!(
        req,
        OperationRequest::Spatial(SpatialOp::Flip {
            horizontal: false,
            vertical: true
        })
    );
}

#[test]
fn volume_and_fades() {
    let req = OperationRequest::parse(
        Operation::FadeAudio,
        &audio(),
        &params(&[("fadeIn", num(1.0)), ("fadeOut", num(0.5))]),
    )
    .unwrap();
    assert_eq!(
        req,
        OperationRequest::Volume(VolumeOp::FadeInOut {
            fade_in: 1.0,
            fade_out: 0.5
        })
    );
    assert_eq!(
        OperationRequest::parse(Operation::Volume, &audio(), &params(&[("volume", num(1.5))]))
            .unwrap(),
        OperationRequest::Volume(VolumeOp::Flat { level: 1.5 })
    );
    assert!(
        OperationRequest::parse(Operation::Volume, &audio(), &params(&[("volume", num(-0.5))]))
            .is_err()
    );
    assert!(
        OperationRequest::parse(
            Operation::AudioFadeIn,
            &audio(),
            &params(&[("fadeIn", ParamValue::Bool(true))])
        )
        .is_err()
    );
}

#[test]
fn formats_must_match_the_asset() {
    let fmt = |s: &str| params(&[("format", ParamValue::Text(s.to_string()))]);
    assert_eq!(
        OperationRequest::parse(Operation::ExportFormat, &video(), &fmt("mp4")).unwrap(),
        OperationRequest::Reencode {
            format: OutputFormat::Mp4
        }
    );
    assert!(OperationRequest::parse(Operation::ExportFormat, &video(), &fmt("wav")).is_err());
    assert!(OperationRequest::parse(Operation::ExportFormat, &audio(), &fmt("avi")).is_err());

    let still = OperationRequest::parse(
        Operation::FrameExport,
        &video(),
        &params(&[("time", num(1.0)), ("format", ParamValue::Text("jpg".to_string()))]),
    )
    .unwrap();
    assert_eq!(
        still,
        OperationRequest::FrameExport {
            time: 1.0,
            format: OutputFormat::Jpeg
        }
    );
    assert!(
        OperationRequest::parse(
            Operation::FrameExport,
            &video(),
            &params(&[("time", num(1.0)), ("format", ParamValue::Text("mov".to_string()))]),
        )
        .is_err()
    );
}

#[test]
fn merge_audio_rejects_video_assets() {
    let err = OperationRequest::parse(
        Operation::MergeAudio,
        &audio(),
        &params(&[("assets", ParamValue::Assets(vec![video()]))]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("cannot merge_audio a video asset"));

    let empty = OperationRequest::parse(
        Operation::Concat,
        &video(),
        &params(&[("assets", ParamValue::Assets(vec![]))]),
    );
    assert!(empty.is_err());
}

#[test]
fn every_operation_rejects_an_empty_call_or_accepts_it() {
    // Operations without required parameters parse from nothing; all others must not.
    for op in Operation::ALL {
        let asset = if op.kinds().contains(&MediaKind::Video) {
            video()
        } else {
            audio()
        };
        let needs_params = op.params().iter().any(|p| p.required) || op == Operation::Flip;
        let parsed = OperationRequest::parse(op, &asset, &Params::new());
        assert_eq!(parsed.is_err(), needs_params, "{op}");
    }
}

#[test]
fn degenerate_sizes_reach_the_transform_compiler() {
    let req = OperationRequest::parse(
        Operation::Resize,
        &video(),
        &params(&[("width", num(0.0)), ("height", num(48.0))]),
    )
    .unwrap();
    let OperationRequest::Spatial(op) = req else {
        panic!("expected a spatial request, got {req:?}");
    };
    let err = compile_transform(&op, video().native_size.unwrap()).unwrap_err();
    assert!(matches!(err, OperationError::TransformInvalid(_)));

    let err = OperationRequest::parse(
        Operation::Resize,
        &video(),
        &params(&[("width", num(10.5)), ("height", num(48.0))]),
    )
    .unwrap_err();
    assert!(matches!(err, OperationError::InvalidParameters(_)));
}
