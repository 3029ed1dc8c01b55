//! Integration tests: synthetic document photos through detection and
//! rectification.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use docquad_pipeline::{
    DetectConfig, DetectorKind, FrameGeometry, PipelineError, Point, QuadSource, Quadrilateral,
    detect, detect_with_config, detect_with_source, order, rectify,
};
use image::{DynamicImage, Rgb, RgbImage};

const PAPER: Rgb<u8> = Rgb([250, 250, 250]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// White image with filled rectangles given as `(x0, y0, x1, y1, color)`
/// half-open ranges. Earlier rectangles are drawn on top.
fn scene(width: u32, height: u32, rects: &[(u32, u32, u32, u32, Rgb<u8>)]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        rects
            .iter()
            .find(|(x0, y0, x1, y1, _)| (*x0..*x1).contains(&x) && (*y0..*y1).contains(&y))
            .map_or(PAPER, |r| r.4)
    }))
}

fn assert_corners_near(quad: &Quadrilateral, expected: [(f64, f64); 4], tolerance: f64) {
    for (got, (ex, ey)) in quad.corners().iter().zip(expected) {
        assert!(
            (got.x - ex).abs() <= tolerance && (got.y - ey).abs() <= tolerance,
            "corner {got:?} not within {tolerance} of ({ex}, {ey}); quad {quad:?}",
        );
    }
}

#[test]
fn black_page_on_white_is_found_in_display_space() {
    let img = scene(800, 1200, &[(100, 100, 700, 1100, INK)]);
    let frame = FrameGeometry::for_image(400, 600, &img).unwrap();
    assert!((frame.scale_factor() - 0.5).abs() < 1e-12);

    let detection = detect_with_source(&img, &frame).unwrap();
    eprintln!("detected {:?}", detection.quad);
    assert_eq!(detection.source, QuadSource::Detected);
    assert_corners_near(
        &detection.quad,
        [(50.0, 50.0), (350.0, 50.0), (350.0, 550.0), (50.0, 550.0)],
        3.0,
    );
}

#[test]
fn blank_photo_falls_back_to_centered_half() {
    let img = scene(800, 1200, &[]);
    let frame = FrameGeometry::for_image(400, 600, &img).unwrap();

    let detection = detect_with_source(&img, &frame).unwrap();
    assert_eq!(detection.source, QuadSource::Fallback);
    let expected = [
        Point::new(100.0, 150.0),
        Point::new(300.0, 150.0),
        Point::new(300.0, 450.0),
        Point::new(100.0, 450.0),
    ];
    assert_eq!(detection.quad.corners(), &expected);
}

#[test]
fn larger_of_two_rectangles_wins() {
    // 20x25 (area 500) and 40x50 (area 2000).
    let img = scene(
        200,
        200,
        &[(20, 20, 40, 45, INK), (100, 100, 140, 150, INK)],
    );
    let frame = FrameGeometry::for_image(200, 200, &img).unwrap();
    let quad = detect(&img, &frame).unwrap();
    assert_corners_near(
        &quad,
        [(100.0, 100.0), (140.0, 100.0), (140.0, 150.0), (100.0, 150.0)],
        3.0,
    );
}

/// White 600x600 image with a dark parallelogram whose vertical sides
/// lean by `shear` pixels per row.
fn parallelogram(shear: f64) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(600, 600, |x, y| {
        if !(150..450).contains(&y) {
            return PAPER;
        }
        let left = 150.0 + shear * f64::from(y - 150);
        let x = f64::from(x);
        if x >= left && x < left + 250.0 {
            INK
        } else {
            PAPER
        }
    }))
}

#[test]
fn skewed_corners_fail_the_right_angle_test() {
    // tan(10°): corners of 80° and 100°, |cos| ~ 0.17.
    let img = parallelogram(0.176);
    let frame = FrameGeometry::for_image(600, 600, &img).unwrap();

    let strict = detect_with_source(&img, &frame).unwrap();
    assert_eq!(strict.source, QuadSource::Fallback);

    let relaxed = DetectConfig {
        max_corner_cosine: 0.3,
        ..DetectConfig::default()
    };
    let detection = detect_with_config(&img, &frame, &relaxed).unwrap();
    assert_eq!(detection.source, QuadSource::Detected);
    let tl = detection.quad.top_left();
    let br = detection.quad.bottom_right();
    assert!((tl.x - 150.0).abs() <= 4.0 && (tl.y - 150.0).abs() <= 4.0, "{tl:?}");
    assert!((br.x - 452.8).abs() <= 5.0 && (br.y - 450.0).abs() <= 4.0, "{br:?}");
}

#[test]
fn upright_rectangle_passes_the_right_angle_test() {
    let img = parallelogram(0.0);
    let frame = FrameGeometry::for_image(600, 600, &img).unwrap();
    let detection = detect_with_source(&img, &frame).unwrap();
    assert_eq!(detection.source, QuadSource::Detected);
}

#[test]
fn every_strategy_handles_the_page_scene() {
    let img = scene(800, 1200, &[(100, 100, 700, 1100, INK)]);
    let frame = FrameGeometry::for_image(400, 600, &img).unwrap();
    for detector in DetectorKind::ALL {
        let config = DetectConfig {
            detector,
            ..DetectConfig::default()
        };
        let detection = detect_with_config(&img, &frame, &config).unwrap();
        assert_eq!(detection.source, QuadSource::Detected, "{detector}");
        assert_corners_near(
            &detection.quad,
            [(50.0, 50.0), (350.0, 50.0), (350.0, 550.0), (50.0, 550.0)],
            5.0,
        );
    }
}

#[test]
fn scaling_round_trips_and_keeps_aspect_ratio() {
    let frame = FrameGeometry::new(400, 600, 1000, 1200).unwrap();
    assert!((frame.scale_factor() - 0.4).abs() < 1e-12);

    let dims = frame.detection_dimensions();
    assert_eq!((dims.width, dims.height), (400, 480));

    for p in [
        Point::new(0.0, 0.0),
        Point::new(123.5, 77.25),
        Point::new(999.0, 1199.0),
    ] {
        let back = frame.to_pixel_space(frame.to_display_space(p));
        assert!(back.distance(p) < 1e-9, "{p:?} -> {back:?}");
    }
}

#[test]
fn canonical_order_holds_for_arbitrary_point_sets() {
    // Small deterministic LCG so the point sets are reproducible.
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        #[allow(clippy::cast_precision_loss)]
        let v = (state >> 33) as f64 / f64::from(1u32 << 31);
        v * 1000.0
    };

    for _ in 0..200 {
        let points = [
            Point::new(next(), next()),
            Point::new(next(), next()),
            Point::new(next(), next()),
            Point::new(next(), next()),
        ];
        let quad = order::canonicalize(points);
        let [tl, tr, br, bl] = *quad.corners();
        for p in points {
            assert!(tl.sum() <= p.sum());
            assert!(br.sum() >= p.sum());
            assert!(tr.difference() <= p.difference());
            assert!(bl.difference() >= p.difference());
        }
        for corner in quad.corners() {
            assert!(points.contains(corner));
        }
    }
}

#[test]
fn rectified_page_keeps_its_colors() {
    let red = Rgb([220, 20, 20]);
    let img = scene(
        800,
        1200,
        &[(300, 500, 500, 700, red), (100, 100, 700, 1100, INK)],
    );
    let frame = FrameGeometry::for_image(400, 600, &img).unwrap();
    let quad = detect(&img, &frame).unwrap();

    let flat = rectify(&img, &quad, &frame).unwrap().to_rgba8();
    let (w, h) = flat.dimensions();
    eprintln!("rectified to {w}x{h}");
    assert!((585..=615).contains(&w), "width {w}");
    assert!((985..=1015).contains(&h), "height {h}");

    let center = flat.get_pixel(w / 2, h / 2).0;
    assert!(center[0] > 180 && center[1] < 60 && center[2] < 60, "{center:?}");
    let margin = flat.get_pixel(w / 10, h / 10).0;
    assert!(margin[0] < 40 && margin[1] < 40 && margin[2] < 40, "{margin:?}");
}

#[test]
fn rectify_rejects_collapsed_and_mismatched_inputs() {
    let img = scene(100, 100, &[]);
    let frame = FrameGeometry::for_image(100, 100, &img).unwrap();

    let line = Quadrilateral::from_ordered([
        Point::new(10.0, 50.0),
        Point::new(90.0, 50.0),
        Point::new(90.0, 50.0),
        Point::new(10.0, 50.0),
    ]);
    assert!(matches!(
        rectify(&img, &line, &frame),
        Err(PipelineError::DegenerateGeometry { .. })
    ));

    let other = scene(50, 50, &[]);
    let quad = Quadrilateral::from_ordered([
        Point::new(10.0, 10.0),
        Point::new(40.0, 10.0),
        Point::new(40.0, 40.0),
        Point::new(10.0, 40.0),
    ]);
    assert!(matches!(
        rectify(&other, &quad, &frame),
        Err(PipelineError::InvalidInput(_))
    ));
}

#[test]
fn detection_serializes_to_json() {
    let img = scene(200, 200, &[]);
    let frame = FrameGeometry::for_image(200, 200, &img).unwrap();
    let detection = detect_with_source(&img, &frame).unwrap();
    let json = serde_json::to_value(detection).unwrap();
    assert_eq!(json["source"], "Fallback");
    assert_eq!(json["quad"]["corners"][0]["x"], 50.0);
}
