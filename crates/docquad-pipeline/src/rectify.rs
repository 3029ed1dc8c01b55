//! Perspective rectification: flatten the region inside a quadrilateral
//! into an axis-aligned image.
//!
//! Corners arrive in display space and are divided by the frame's scale
//! factor to address the full-resolution buffer. The output size is the
//! shorter of each pair of opposite edges, so a foreshortened document
//! is never upscaled along its compressed axis.

use image::{DynamicImage, GrayImage, Pixel, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::frame::FrameGeometry;
use crate::resize::{ResizeFilter, resize_exact};
use crate::types::{Dimensions, PipelineError, Quadrilateral};

/// Estimated outputs narrower or shorter than this many pixels are
/// rejected as degenerate.
pub const MIN_OUTPUT_EXTENT: f64 = 1.0;

/// Resampling used while warping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WarpInterpolation {
    /// Nearest source pixel.
    Nearest,
    /// Bilinear blend of the four nearest source pixels.
    #[default]
    Bilinear,
    /// Bicubic blend of the sixteen nearest source pixels.
    Bicubic,
}

impl WarpInterpolation {
    const fn to_imageproc(self) -> Interpolation {
        match self {
            Self::Nearest => Interpolation::Nearest,
            Self::Bilinear => Interpolation::Bilinear,
            Self::Bicubic => Interpolation::Bicubic,
        }
    }
}

/// Options for [`rectify_with_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Interpolation used by the warp.
    pub interpolation: WarpInterpolation,
    /// RGBA color for output pixels whose source lies outside the image.
    /// Grayscale inputs use its luminance.
    pub fill: [u8; 4],
    /// Resize the flattened image to this width. With only one of
    /// `target_width`/`target_height` set, the other follows the aspect
    /// ratio.
    pub target_width: Option<u32>,
    /// Resize the flattened image to this height.
    pub target_height: Option<u32>,
    /// Filter used for the optional resize.
    pub resize_filter: ResizeFilter,
}

impl RectifyConfig {
    /// White, opaque.
    pub const DEFAULT_FILL: [u8; 4] = [255, 255, 255, 255];
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            interpolation: WarpInterpolation::default(),
            fill: Self::DEFAULT_FILL,
            target_width: None,
            target_height: None,
            resize_filter: ResizeFilter::default(),
        }
    }
}

/// Output size for a quadrilateral already in pixel space:
/// `(min(top, bottom), min(left, right))` edge lengths.
#[must_use]
pub fn estimate_output_size(quad: &Quadrilateral) -> (f64, f64) {
    let top = quad.top_left().distance(quad.top_right());
    let bottom = quad.bottom_left().distance(quad.bottom_right());
    let left = quad.top_left().distance(quad.bottom_left());
    let right = quad.top_right().distance(quad.bottom_right());
    (top.min(bottom), left.min(right))
}

/// Flatten the region of `image` bounded by `quad` (display space).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if `image` is empty or does
/// not match `frame`, and [`PipelineError::DegenerateGeometry`] if the
/// quadrilateral collapses to (near) zero width or height or has a
/// non-finite corner.
pub fn rectify(
    image: &DynamicImage,
    quad: &Quadrilateral,
    frame: &FrameGeometry,
) -> Result<DynamicImage, PipelineError> {
    rectify_with_config(image, quad, frame, &RectifyConfig::default())
}

/// [`rectify`] with explicit interpolation, fill color and output sizing.
///
/// # Errors
///
/// Same as [`rectify`], plus [`PipelineError::InvalidConfig`] when a
/// target dimension is zero.
#[instrument(skip(image, config), fields(width = image.width(), height = image.height()))]
pub fn rectify_with_config(
    image: &DynamicImage,
    quad: &Quadrilateral,
    frame: &FrameGeometry,
    config: &RectifyConfig,
) -> Result<DynamicImage, PipelineError> {
    if config.target_width == Some(0) || config.target_height == Some(0) {
        return Err(PipelineError::InvalidConfig(
            "rectify target dimensions must be positive".to_string(),
        ));
    }
    frame.check_image(image)?;

    let pixel_quad = frame.quad_to_pixel_space(quad);
    let (width, height) = estimate_output_size(&pixel_quad);
    // `f64::min` drops a NaN operand, so non-finite corners are checked
    // directly before they reach the projection solver.
    let finite = pixel_quad
        .corners()
        .iter()
        .all(|p| p.x.is_finite() && p.y.is_finite());
    if !finite
        || !width.is_finite()
        || !height.is_finite()
        || width < MIN_OUTPUT_EXTENT
        || height < MIN_OUTPUT_EXTENT
    {
        warn!(width, height, "degenerate quadrilateral");
        return Err(PipelineError::DegenerateGeometry { width, height });
    }

    let out = output_dimensions(width, height);
    let projection = projection_to_rectangle(&pixel_quad, out)
        .ok_or(PipelineError::DegenerateGeometry { width, height })?;
    debug!(out_width = out.width, out_height = out.height, "warping");

    let interpolation = config.interpolation.to_imageproc();
    let fill = Rgba(config.fill);
    let warped = match image {
        DynamicImage::ImageLuma8(gray) => {
            let mut output = GrayImage::new(out.width, out.height);
            warp_into(gray, &projection, interpolation, fill.to_luma(), &mut output);
            DynamicImage::ImageLuma8(output)
        }
        other => {
            let rgba = other.to_rgba8();
            let mut output = RgbaImage::new(out.width, out.height);
            warp_into(&rgba, &projection, interpolation, fill, &mut output);
            DynamicImage::ImageRgba8(output)
        }
    };

    Ok(apply_target_size(warped, config))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn output_dimensions(width: f64, height: f64) -> Dimensions {
    Dimensions {
        width: width.round().max(1.0) as u32,
        height: height.round().max(1.0) as u32,
    }
}

/// Projection taking the pixel-space quad onto
/// `(0,0), (w-1,0), (w-1,h-1), (0,h-1)`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn projection_to_rectangle(quad: &Quadrilateral, out: Dimensions) -> Option<Projection> {
    let right = out.width.saturating_sub(1) as f32;
    let bottom = out.height.saturating_sub(1) as f32;
    let src = quad.corners().map(|p| (p.x as f32, p.y as f32));
    let dst = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
    Projection::from_control_points(src, dst)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn apply_target_size(image: DynamicImage, config: &RectifyConfig) -> DynamicImage {
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let target = match (config.target_width, config.target_height) {
        (None, None) => return image,
        (Some(tw), Some(th)) => Dimensions {
            width: tw,
            height: th,
        },
        (Some(tw), None) => Dimensions {
            width: tw,
            height: (f64::from(tw) * h / w).round().max(1.0) as u32,
        },
        (None, Some(th)) => Dimensions {
            width: (f64::from(th) * w / h).round().max(1.0) as u32,
            height: th,
        },
    };
    resize_exact(&image, target, config.resize_filter).0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;
    use image::Luma;

    fn quad(pts: [(f64, f64); 4]) -> Quadrilateral {
        Quadrilateral::from_ordered(pts.map(|(x, y)| Point::new(x, y)))
    }

    /// 40x30 image: red inside (10..30, 5..25), blue elsewhere.
    fn red_patch() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(40, 30, |x, y| {
            if (10..30).contains(&x) && (5..25).contains(&y) {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }))
    }

    #[test]
    fn estimate_uses_shorter_edges() {
        // Trapezoid: top edge 100, bottom edge 80; left/right edges ~50.
        let q = quad([(0.0, 0.0), (100.0, 0.0), (90.0, 50.0), (10.0, 50.0)]);
        let (w, h) = estimate_output_size(&q);
        assert!((w - 80.0).abs() < 1e-9);
        assert!((h - 50.990_195).abs() < 1e-5);
    }

    #[test]
    fn axis_aligned_rectangle_keeps_aspect_ratio() {
        let img = DynamicImage::new_rgba8(800, 1200);
        let frame = FrameGeometry::for_image(400, 600, &img).unwrap();
        // Display-space rectangle (50,50)-(350,550) is (100,100)-(700,1100) in pixels.
        let q = quad([(50.0, 50.0), (350.0, 50.0), (350.0, 550.0), (50.0, 550.0)]);
        let out = rectify(&img, &q, &frame).unwrap();
        assert_eq!((out.width(), out.height()), (600, 1000));
        let ratio = f64::from(out.width()) / f64::from(out.height());
        assert!((ratio - 0.6).abs() < 1e-9);
    }

    #[test]
    fn rectified_patch_has_patch_color() {
        let img = red_patch();
        let frame = FrameGeometry::for_image(40, 30, &img).unwrap();
        let q = quad([(11.0, 6.0), (28.0, 6.0), (28.0, 23.0), (11.0, 23.0)]);
        let out = rectify(&img, &q, &frame).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (17, 17));
        for p in out.pixels() {
            let [r, g, b, _] = p.0;
            assert!(r >= 254 && g <= 1 && b <= 1, "unexpected color {:?}", p.0);
        }
    }

    #[test]
    fn grayscale_input_stays_grayscale() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([77])));
        let frame = FrameGeometry::for_image(20, 20, &img).unwrap();
        let q = quad([(2.0, 2.0), (17.0, 2.0), (17.0, 17.0), (2.0, 17.0)]);
        let out = rectify(&img, &q, &frame).unwrap();
        let gray = out.as_luma8().unwrap();
        assert!(gray.pixels().all(|p| p.0[0].abs_diff(77) <= 1));
    }

    #[test]
    fn collapsed_quad_is_degenerate() {
        let img = red_patch();
        let frame = FrameGeometry::for_image(40, 30, &img).unwrap();
        let q = quad([(5.0, 5.0), (5.0, 5.0), (5.0, 20.0), (5.0, 20.0)]);
        assert!(matches!(
            rectify(&img, &q, &frame),
            Err(PipelineError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn nan_corner_is_degenerate() {
        let img = red_patch();
        let frame = FrameGeometry::for_image(40, 30, &img).unwrap();
        let q = quad([(f64::NAN, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert!(matches!(
            rectify(&img, &q, &frame),
            Err(PipelineError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn nan_corner_does_not_hide_behind_the_other_edge() {
        let q = quad([(f64::NAN, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        // The opposite edge still measures 10, so only the corner check
        // can reject this quad.
        assert_eq!(estimate_output_size(&q), (10.0, 10.0));
    }

    #[test]
    fn infinite_corners_are_degenerate() {
        let img = red_patch();
        let frame = FrameGeometry::for_image(40, 30, &img).unwrap();
        for bad in [f64::INFINITY, f64::NEG_INFINITY] {
            let q = quad([(bad, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
            assert!(matches!(
                rectify(&img, &q, &frame),
                Err(PipelineError::DegenerateGeometry { .. })
            ));
            let q = quad([(0.0, 0.0), (10.0, 0.0), (10.0, bad), (0.0, 10.0)]);
            assert!(matches!(
                rectify(&img, &q, &frame),
                Err(PipelineError::DegenerateGeometry { .. })
            ));
        }
    }

    #[test]
    fn mismatched_frame_is_invalid_input() {
        let img = red_patch();
        let frame = FrameGeometry::new(40, 30, 80, 60).unwrap();
        let q = quad([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert!(matches!(
            rectify(&img, &q, &frame),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn fill_color_covers_outside_samples() {
        let img = red_patch();
        let frame = FrameGeometry::for_image(40, 30, &img).unwrap();
        // Quad extends left of the image.
        let q = quad([(-20.0, 5.0), (19.0, 5.0), (19.0, 24.0), (-20.0, 24.0)]);
        let config = RectifyConfig {
            fill: [0, 255, 0, 255],
            interpolation: WarpInterpolation::Nearest,
            ..RectifyConfig::default()
        };
        let out = rectify_with_config(&img, &q, &frame, &config).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(0, 10).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(out.width() - 1, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn single_target_dimension_keeps_aspect() {
        let img = DynamicImage::new_rgba8(200, 100);
        let frame = FrameGeometry::for_image(200, 100, &img).unwrap();
        let q = quad([(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)]);
        let config = RectifyConfig {
            target_width: Some(50),
            ..RectifyConfig::default()
        };
        let out = rectify_with_config(&img, &q, &frame, &config).unwrap();
        assert_eq!((out.width(), out.height()), (50, 25));

        let config = RectifyConfig {
            target_width: Some(30),
            target_height: Some(70),
            ..RectifyConfig::default()
        };
        let out = rectify_with_config(&img, &q, &frame, &config).unwrap();
        assert_eq!((out.width(), out.height()), (30, 70));
    }

    #[test]
    fn zero_target_is_invalid_config() {
        let img = DynamicImage::new_rgba8(20, 20);
        let frame = FrameGeometry::for_image(20, 20, &img).unwrap();
        let q = quad([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let config = RectifyConfig {
            target_height: Some(0),
            ..RectifyConfig::default()
        };
        assert!(matches!(
            rectify_with_config(&img, &q, &frame, &config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rectify_config_deserializes_partial_json() {
        let config: RectifyConfig =
            serde_json::from_str(r#"{"interpolation": "Nearest", "target_width": 120}"#).unwrap();
        assert_eq!(config.interpolation, WarpInterpolation::Nearest);
        assert_eq!(config.target_width, Some(120));
        assert_eq!(config.fill, RectifyConfig::DEFAULT_FILL);
    }
}
