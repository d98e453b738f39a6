use super::*;
use crate::foundation::core::Point;

const SRC: Canvas = Canvas {
    width: 640,
    height: 360,
};

fn assert_point(p: Point, x: f64, y: f64) {
    assert!(
        (p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9,
        "got ({}, {}), want ({x}, {y})",
        p.x,
        p.y
    );
}

#[test]
fn crop_translates_window_to_origin() {
    let c = compile_transform(
        &SpatialOp::Crop {
            x: 100.0,
            y: 20.0,
            width: 200.0,
            height: 120.0,
        },
        SRC,
    )
    .unwrap();
    assert_eq!(
        c.render_size,
        Canvas {
            width: 200,
            height: 120
        }
    );
    assert_point(c.affine() * Point::new(100.0, 20.0), 0.0, 0.0);
    assert_eq!(c.affine(), Affine::translate(Vec2::new(-100.0, -20.0)));
}

#[test]
fn rotate_keeps_native_size() {
    let c = compile_transform(
        &SpatialOp::Rotate {
            angle_rad: std::f64::consts::FRAC_PI_2,
        },
        SRC,
    )
    .unwrap();
    assert_eq!(c.render_size, SRC);
    assert_point(c.affine() * Point::new(1.0, 0.0), 0.0, 1.0);
}

#[test]
fn flip_matches_scale_after_translate() {
    let c = compile_transform(
        &SpatialOp::Flip {
            horizontal: true,
            vertical: false,
        },
        SRC,
    )
    .unwrap();
    let expected = Affine::scale_non_uniform(-1.0, 1.0) * Affine::translate(Vec2::new(-640.0, 0.0));
    let p = Point::new(10.0, 7.0);
    assert_point(c.affine() * p, (expected * p).x, (expected * p).y);
    assert_point(c.affine() * p, 630.0, 7.0);
    assert_eq!(c.render_size, SRC);
}

#[test]
fn horizontal_flip_is_self_inverse() {
    let c = compile_transform(
        &SpatialOp::Flip {
            horizontal: true,
            vertical: false,
        },
        SRC,
    )
    .unwrap();
    let twice = c.affine() * c.affine();
    for p in [Point::new(0.0, 0.0), Point::new(13.5, 200.0), Point::new(640.0, 360.0)] {
        assert_point(twice * p, p.x, p.y);
    }
}

#[test]
fn flip_both_axes_maps_corners() {
    let c = compile_transform(
        &SpatialOp::Flip {
            horizontal: true,
            vertical: true,
        },
        SRC,
    )
    .unwrap();
    assert_point(c.affine() * Point::new(0.0, 0.0), 640.0, 360.0);
    assert_point(c.affine() * Point::new(640.0, 360.0), 0.0, 0.0);
}

#[test]
fn scale_stretches_non_uniformly() {
    let c = compile_transform(
        &SpatialOp::Scale {
            width: 1280.0,
            height: 1080.0,
        },
        SRC,
    )
    .unwrap();
    assert_eq!(
        c.render_size,
        Canvas {
            width: 1280,
            height: 1080
        }
    );
    assert_point(c.affine() * Point::new(640.0, 360.0), 1280.0, 1080.0);
}

#[test]
fn change_canvas_centers_source() {
    let c = compile_transform(
        &SpatialOp::ChangeCanvas {
            width: 800.0,
            height: 800.0,
        },
        SRC,
    )
    .unwrap();
    assert_point(c.affine() * Point::new(0.0, 0.0), 80.0, 220.0);

    let smaller = compile_transform(
        &SpatialOp::ChangeCanvas {
            width: 320.0,
            height: 360.0,
        },
        SRC,
    )
    .unwrap();
    assert_point(smaller.affine() * Point::new(0.0, 0.0), -160.0, 0.0);
}

#[test]
fn degenerate_dimensions_are_rejected() {
    for op in [
        SpatialOp::Crop {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 10.0,
        },
        SpatialOp::Scale {
            width: 10.0,
            height: -4.0,
        },
        SpatialOp::ChangeCanvas {
            width: f64::INFINITY,
            height: 10.0,
        },
        SpatialOp::Rotate {
            angle_rad: f64::NAN,
        },
    ] {
        assert!(matches!(
            compile_transform(&op, SRC),
            Err(OperationError::TransformInvalid(_))
        ));
    }
}
