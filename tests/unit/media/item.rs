use super::*;

fn video_track(duration: f64) -> TrackDescriptor {
    TrackDescriptor {
        kind: TrackKind::Video,
        duration,
        size: Some(Canvas {
            width: 64,
            height: 48,
        }),
        frame_rate: Some(Fps::new(25, 1).unwrap()),
        sample_rate: None,
    }
}

fn audio_track(duration: f64) -> TrackDescriptor {
    TrackDescriptor {
        kind: TrackKind::Audio,
        duration,
        size: None,
        frame_rate: None,
        sample_rate: Some(48_000),
    }
}

#[test]
fn from_tracks_classifies_kinds() {
    let loc = Locator::from_path("clip.mov");
    let v = MediaItem::from_tracks(loc.clone(), &[video_track(4.0), audio_track(4.5)]).unwrap();
    assert_eq!(v.kind, MediaKind::Video);
    assert_eq!(v.duration, 4.5);
    assert_eq!(v.native_size.unwrap().width, 64);

    let a = MediaItem::from_tracks(loc.clone(), &[audio_track(2.0)]).unwrap();
    assert_eq!(a.kind, MediaKind::Audio);
    assert!(a.native_size.is_none());

    let i = MediaItem::from_tracks(loc.clone(), &[video_track(0.0)]).unwrap();
    assert_eq!(i.kind, MediaKind::Image);
    assert_eq!(i.duration, 0.0);

    assert!(matches!(
        MediaItem::from_tracks(loc, &[]),
        Err(OperationError::SourceUnreadable(_))
    ));
}

#[test]
fn visual_items_require_a_size() {
    let err = MediaItem::new(
        Locator::from_path("a.mov"),
        MediaKind::Video,
        1.0,
        None,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, OperationError::InvalidParameters(_)));
    assert!(
        MediaItem::new(Locator::from_path("a.wav"), MediaKind::Audio, -1.0, None, None).is_err()
    );
}

#[test]
fn probed_source_requires_primary_track() {
    let item = MediaItem::new(
        Locator::from_path("a.mov"),
        MediaKind::Video,
        1.0,
        Some(Canvas {
            width: 2,
            height: 2,
        }),
        None,
    )
    .unwrap();
    assert!(matches!(
        ProbedSource::new(item.clone(), vec![audio_track(1.0)]),
        Err(OperationError::SourceUnreadable(_))
    ));
    let src = ProbedSource::new(item, vec![video_track(1.0)]).unwrap();
    assert!(src.has(TrackKind::Video));
    assert!(!src.has(TrackKind::Audio));
}

#[test]
fn locator_extension_is_lowercased() {
    assert_eq!(
        Locator::from_path("/tmp/X.MOV").extension().as_deref(),
        Some("mov")
    );
    assert_eq!(Locator::from_path("/tmp/noext").extension(), None);
}
