use super::*;

#[test]
fn time_range_contains_boundaries() {
    let r = TimeRange::new(1.0, 2.0).unwrap();
    assert!(!r.contains(0.5));
    assert!(r.contains(1.0));
    assert!(r.contains(2.5));
    assert!(!r.contains(3.0));
    assert_eq!(r.end(), 3.0);
}

#[test]
fn time_range_rejects_negative_and_non_finite() {
    assert!(TimeRange::new(-0.1, 1.0).is_err());
    assert!(TimeRange::new(0.0, -1.0).is_err());
    assert!(TimeRange::new(f64::NAN, 1.0).is_err());
    assert!(TimeRange::from_bounds(2.0, 1.0).is_err());
    assert_eq!(
        TimeRange::from_bounds(1.0, 4.0).unwrap(),
        TimeRange::new(1.0, 3.0).unwrap()
    );
}

#[test]
fn time_range_overlap_and_nesting() {
    let a = TimeRange::new(0.0, 5.0).unwrap();
    let b = TimeRange::new(4.0, 3.0).unwrap();
    assert!(a.overlaps(b));
    assert!(!a.overlaps(TimeRange::new(5.0, 1.0).unwrap()));
    assert!(TimeRange::new(1.0, 2.0).unwrap().is_within(a));
    assert!(!b.is_within(a));
    assert!(!a.overlaps(TimeRange::new(6.0, 1.0).unwrap()));
}

#[test]
fn fps_frames_secs_roundtrip_ceil() {
    let fps = Fps::new(30000, 1001).unwrap();
    let secs = fps.frames_to_secs(123);
    assert_eq!(fps.secs_to_frames_ceil(secs), 123);
    assert_eq!(Fps::new(10, 1).unwrap().secs_to_frames_ceil(2.0), 20);
    assert_eq!(Fps::new(10, 1).unwrap().secs_to_frames_ceil(2.05), 21);
}

#[test]
fn fps_parses_ratios_and_floats() {
    assert_eq!(Fps::parse_ratio("30000/1001"), Some(Fps { num: 30000, den: 1001 }));
    assert_eq!(Fps::parse_ratio("25"), Some(Fps { num: 25, den: 1 }));
    assert_eq!(Fps::parse_ratio("0/0"), None);
    assert_eq!(Fps::from_f64(24.0).unwrap(), Fps { num: 24, den: 1 });
    assert_eq!(Fps::from_f64(12.5).unwrap(), Fps { num: 25, den: 2 });
    assert!(Fps::from_f64(0.0).is_err());
}

#[test]
fn transform_to_affine_applies_scale_rotate_translate() {
    let t = Transform2D::default();
    assert_eq!(t.scale, Vec2::new(1.0, 1.0));
    assert_eq!(t.to_affine(), Affine::IDENTITY);

    let t = Transform2D {
        translate: Vec2::new(10.0, 0.0),
        rotation_rad: std::f64::consts::FRAC_PI_2,
        scale: Vec2::new(2.0, 1.0),
    };
    // (1,0) -> scale (2,0) -> rotate (0,2) -> translate (10,2)
    let p = t.to_affine() * Point::new(1.0, 0.0);
    assert!((p.x - 10.0).abs() < 1e-9);
    assert!((p.y - 2.0).abs() < 1e-9);
}
