//! Shared types for the docquad detection and rectification pipeline.

use serde::{Deserialize, Serialize};

use crate::detector::DetectorKind;
use crate::fallback::FallbackShape;
use crate::resize::ResizeFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `DynamicImage`, the input and output buffer type of the
/// public `detect` / `rectify` functions.
pub use image::DynamicImage;

/// Re-export `RgbaImage` for callers that build synthetic inputs.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
///
/// Equality is exact-value equality on both coordinates; the candidate
/// selector relies on it to reject quadrilaterals with repeated corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// `x + y`, the key that identifies the top-left and bottom-right corners.
    #[must_use]
    pub fn sum(self) -> f64 {
        self.x + self.y
    }

    /// `y - x`, the key that identifies the top-right and bottom-left corners.
    #[must_use]
    pub fn difference(self) -> f64 {
        self.y - self.x
    }

    /// Multiply both coordinates by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// A closed boundary curve, in traversal order.
///
/// The last point implicitly connects back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a new contour from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the contour and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Enclosed area (absolute shoelace area of the closed curve).
    #[must_use]
    pub fn area(&self) -> f64 {
        crate::geometry::polygon_area(&self.0)
    }

    /// Length of the closed curve, including the closing segment.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        crate::geometry::arc_length(&self.0, true)
    }
}

/// One of the four canonical corners of a [`Quadrilateral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    /// Minimal `x + y`.
    TopLeft,
    /// Minimal `y - x`.
    TopRight,
    /// Maximal `x + y`.
    BottomRight,
    /// Maximal `y - x`.
    BottomLeft,
}

impl Corner {
    /// All corners in canonical order.
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
    ];

    /// Index of this corner in the canonical `[TL, TR, BR, BL]` array.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::TopLeft => 0,
            Self::TopRight => 1,
            Self::BottomRight => 2,
            Self::BottomLeft => 3,
        }
    }
}

/// Four points ordered `[TL, TR, BR, BL]`.
///
/// Construct from an unordered set with [`crate::order::canonicalize`],
/// or with [`Quadrilateral::from_ordered`] when the order is already known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    corners: [Point; 4],
}

impl Quadrilateral {
    /// Wrap four points that are already in `[TL, TR, BR, BL]` order.
    #[must_use]
    pub const fn from_ordered(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// The corners in `[TL, TR, BR, BL]` order.
    #[must_use]
    pub const fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    /// A single corner.
    #[must_use]
    pub const fn corner(&self, corner: Corner) -> Point {
        self.corners[corner.index()]
    }

    /// Top-left corner.
    #[must_use]
    pub const fn top_left(&self) -> Point {
        self.corners[0]
    }

    /// Top-right corner.
    #[must_use]
    pub const fn top_right(&self) -> Point {
        self.corners[1]
    }

    /// Bottom-right corner.
    #[must_use]
    pub const fn bottom_right(&self) -> Point {
        self.corners[2]
    }

    /// Bottom-left corner.
    #[must_use]
    pub const fn bottom_left(&self) -> Point {
        self.corners[3]
    }

    /// Returns `true` if any two corners are exactly equal.
    #[must_use]
    pub fn has_duplicate_corners(&self) -> bool {
        (0..4).any(|i| ((i + 1)..4).any(|j| self.corners[i] == self.corners[j]))
    }

    /// Multiply every corner by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_ordered(self.corners.map(|p| p.scaled(factor)))
    }

    /// Enclosed area.
    #[must_use]
    pub fn area(&self) -> f64 {
        crate::geometry::polygon_area(&self.corners)
    }

    /// Move one corner, subject to the quadrant rule used by the
    /// confirmation overlay.
    ///
    /// Each corner must stay strictly inside its own quadrant of the
    /// display frame: top-left in the upper-left quarter, top-right in
    /// the upper-right quarter, and so on. Returns `true` and updates the
    /// corner when `to` is allowed; otherwise the quadrilateral is left
    /// unchanged and `false` is returned.
    pub fn try_move_corner(
        &mut self,
        corner: Corner,
        to: Point,
        frame: &crate::frame::FrameGeometry,
    ) -> bool {
        let w = f64::from(frame.display_width());
        let h = f64::from(frame.display_height());
        let (half_w, half_h) = (w / 2.0, h / 2.0);

        let (x_range, y_range) = match corner {
            Corner::TopLeft => ((0.0, half_w), (0.0, half_h)),
            Corner::TopRight => ((half_w, w), (0.0, half_h)),
            Corner::BottomRight => ((half_w, w), (half_h, h)),
            Corner::BottomLeft => ((0.0, half_w), (half_h, h)),
        };

        let inside = to.x > x_range.0 && to.x < x_range.1 && to.y > y_range.0 && to.y < y_range.1;
        if inside {
            self.corners[corner.index()] = to;
        }
        inside
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Configuration for quadrilateral detection.
///
/// All parameters are plain values passed into each call; nothing is
/// cached between calls. The defaults are the thresholds the multi-stage
/// detector was tuned with at preview resolution.
///
/// Only [`DetectorKind::MultiStage`] reads the preprocessing and
/// selection fields. The other strategies carry their own fixed tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Which detection strategy to run.
    pub detector: DetectorKind,

    /// Resampling filter used to bring the source down to detection
    /// resolution.
    pub resize_filter: ResizeFilter,

    /// Side length of the square Gaussian blur kernel. Must be odd.
    pub blur_kernel_size: u32,

    /// Bright values above this are flattened before re-normalizing.
    pub truncate_threshold: u8,

    /// Canny low (hysteresis) threshold.
    pub canny_low: f32,

    /// Canny high threshold.
    pub canny_high: f32,

    /// Edge pixels at or below this value are zeroed after Canny.
    pub edge_cutoff: u8,

    /// Side length of the square structuring element used for closing.
    pub close_kernel_size: u32,

    /// Number of largest contours kept for candidate selection.
    pub max_contours: usize,

    /// Polygon approximation tolerance as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,

    /// Largest accepted `|cos|` of a measured corner angle.
    pub max_corner_cosine: f64,

    /// Candidates with a smaller enclosed area are skipped.
    pub min_candidate_area: f64,

    /// Shape returned when no candidate passes.
    pub fallback: FallbackShape,
}

impl DetectConfig {
    /// Default blur kernel size.
    pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 5;
    /// Default truncation threshold.
    pub const DEFAULT_TRUNCATE_THRESHOLD: u8 = 150;
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = 85.0;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = 185.0;
    /// Default post-Canny cutoff.
    pub const DEFAULT_EDGE_CUTOFF: u8 = 155;
    /// Default closing kernel size.
    pub const DEFAULT_CLOSE_KERNEL_SIZE: u32 = 10;
    /// Default number of contours considered.
    pub const DEFAULT_MAX_CONTOURS: usize = 10;
    /// Default approximation tolerance ratio.
    pub const DEFAULT_APPROX_EPSILON_RATIO: f64 = 0.02;
    /// `cos(85°)`: every corner must be within 5° of a right angle.
    pub const DEFAULT_MAX_CORNER_COSINE: f64 = 0.087_155_742_747_658_17;
    /// Default minimum candidate area.
    pub const DEFAULT_MIN_CANDIDATE_AREA: f64 = 0.0;
    /// Largest structuring element the morphology stage accepts.
    pub const MAX_KERNEL_SIZE: u32 = 255;

    /// Check the configuration for values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_kernel_size must be odd, got {}",
                self.blur_kernel_size
            )));
        }
        if self.close_kernel_size == 0 || self.close_kernel_size > Self::MAX_KERNEL_SIZE {
            return Err(PipelineError::InvalidConfig(format!(
                "close_kernel_size must be in 1..={}, got {}",
                Self::MAX_KERNEL_SIZE,
                self.close_kernel_size
            )));
        }
        if !self.canny_low.is_finite() || !self.canny_high.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "canny thresholds must be finite".to_string(),
            ));
        }
        if self.canny_low > self.canny_high {
            return Err(PipelineError::InvalidConfig(format!(
                "canny_low ({}) > canny_high ({})",
                self.canny_low, self.canny_high
            )));
        }
        if self.max_contours == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_contours must be at least 1".to_string(),
            ));
        }
        if !(self.approx_epsilon_ratio.is_finite() && self.approx_epsilon_ratio > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "approx_epsilon_ratio must be positive, got {}",
                self.approx_epsilon_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.max_corner_cosine) {
            return Err(PipelineError::InvalidConfig(format!(
                "max_corner_cosine must be in 0.0..=1.0, got {}",
                self.max_corner_cosine
            )));
        }
        if !(self.min_candidate_area.is_finite() && self.min_candidate_area >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "min_candidate_area must be non-negative, got {}",
                self.min_candidate_area
            )));
        }
        Ok(())
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            detector: DetectorKind::default(),
            resize_filter: ResizeFilter::default(),
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            truncate_threshold: Self::DEFAULT_TRUNCATE_THRESHOLD,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            edge_cutoff: Self::DEFAULT_EDGE_CUTOFF,
            close_kernel_size: Self::DEFAULT_CLOSE_KERNEL_SIZE,
            max_contours: Self::DEFAULT_MAX_CONTOURS,
            approx_epsilon_ratio: Self::DEFAULT_APPROX_EPSILON_RATIO,
            max_corner_cosine: Self::DEFAULT_MAX_CORNER_COSINE,
            min_candidate_area: Self::DEFAULT_MIN_CANDIDATE_AREA,
            fallback: FallbackShape::default(),
        }
    }
}

/// Where a detected quadrilateral came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadSource {
    /// A contour passed every candidate check.
    Detected,
    /// No candidate passed; the default quadrilateral was used.
    Fallback,
}

/// Result of a detection call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Corners in display space, `[TL, TR, BR, BL]`.
    pub quad: Quadrilateral,
    /// Whether the quadrilateral was detected or is the fallback.
    pub source: QuadSource,
}

/// Errors that can occur during detection or rectification.
///
/// Finding no candidate is not an error; it yields
/// [`QuadSource::Fallback`].
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// Frame geometry or image buffer cannot be processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The rectification quadrilateral collapses to (near) zero size.
    #[error("degenerate quadrilateral: estimated output is {width:.2}x{height:.2} pixels")]
    DegenerateGeometry {
        /// Estimated output width in pixels.
        width: f64,
        /// Estimated output height in pixels.
        height: f64,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::FrameGeometry;

    fn unit_square() -> Quadrilateral {
        Quadrilateral::from_ordered([
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ])
    }

    // --- Point tests ---

    #[test]
    fn point_equality_is_exact() {
        assert_eq!(Point::new(1.0, 2.0), Point::new(1.0, 2.0));
        assert_ne!(Point::new(1.0, 2.0), Point::new(1.0, 2.000_000_1));
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_sum_and_difference() {
        let p = Point::new(3.0, 7.0);
        assert!((p.sum() - 10.0).abs() < f64::EPSILON);
        assert!((p.difference() - 4.0).abs() < f64::EPSILON);
    }

    // --- Contour tests ---

    #[test]
    fn contour_area_and_perimeter() {
        let c = Contour::new(unit_square().corners().to_vec());
        assert!((c.area() - 100.0).abs() < 1e-10);
        assert!((c.perimeter() - 40.0).abs() < 1e-10);
    }

    // --- Quadrilateral tests ---

    #[test]
    fn quad_accessors_follow_canonical_order() {
        let q = unit_square();
        assert_eq!(q.top_left(), Point::new(0.0, 0.0));
        assert_eq!(q.top_right(), Point::new(10.0, 0.0));
        assert_eq!(q.bottom_right(), Point::new(10.0, 10.0));
        assert_eq!(q.bottom_left(), Point::new(0.0, 10.0));
        for corner in Corner::ALL {
            assert_eq!(q.corner(corner), q.corners()[corner.index()]);
        }
    }

    #[test]
    fn duplicate_corners_detected() {
        assert!(!unit_square().has_duplicate_corners());
        let q = Quadrilateral::from_ordered([
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(q.has_duplicate_corners());
    }

    #[test]
    fn corner_moves_within_its_quadrant() {
        let frame = FrameGeometry::new(100, 100, 100, 100).unwrap();
        let mut q = Quadrilateral::from_ordered([
            Point::new(25.0, 25.0),
            Point::new(75.0, 25.0),
            Point::new(75.0, 75.0),
            Point::new(25.0, 75.0),
        ]);
        assert!(q.try_move_corner(Corner::TopLeft, Point::new(10.0, 40.0), &frame));
        assert_eq!(q.top_left(), Point::new(10.0, 40.0));
        assert!(q.try_move_corner(Corner::BottomRight, Point::new(99.0, 51.0), &frame));
        assert_eq!(q.bottom_right(), Point::new(99.0, 51.0));
    }

    #[test]
    fn corner_rejected_outside_its_quadrant() {
        let frame = FrameGeometry::new(100, 100, 100, 100).unwrap();
        let mut q = unit_square();
        let before = q;
        // Top-right may not cross into the left half.
        assert!(!q.try_move_corner(Corner::TopRight, Point::new(40.0, 10.0), &frame));
        // Boundaries are exclusive.
        assert!(!q.try_move_corner(Corner::BottomLeft, Point::new(0.0, 75.0), &frame));
        assert!(!q.try_move_corner(Corner::TopLeft, Point::new(50.0, 10.0), &frame));
        assert_eq!(q, before);
    }

    // --- DetectConfig tests ---

    #[test]
    fn detect_config_defaults() {
        let config = DetectConfig::default();
        assert_eq!(config.detector, DetectorKind::MultiStage);
        assert_eq!(config.blur_kernel_size, 5);
        assert_eq!(config.truncate_threshold, 150);
        assert!((config.canny_low - 85.0).abs() < f32::EPSILON);
        assert!((config.canny_high - 185.0).abs() < f32::EPSILON);
        assert_eq!(config.edge_cutoff, 155);
        assert_eq!(config.close_kernel_size, 10);
        assert_eq!(config.max_contours, 10);
        assert!((config.approx_epsilon_ratio - 0.02).abs() < f64::EPSILON);
        assert!((config.max_corner_cosine - 85.0_f64.to_radians().cos()).abs() < 1e-12);
        assert_eq!(config.fallback, FallbackShape::CenteredHalf);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn even_blur_kernel_rejected() {
        let config = DetectConfig {
            blur_kernel_size: 4,
            ..DetectConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn inverted_canny_thresholds_rejected() {
        let config = DetectConfig {
            canny_low: 200.0,
            canny_high: 100.0,
            ..DetectConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid pipeline configuration: canny_low (200) > canny_high (100)",
        );
    }

    #[test]
    fn oversized_close_kernel_rejected() {
        let config = DetectConfig {
            close_kernel_size: 300,
            ..DetectConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn detect_config_deserializes_partial_json() {
        let config: DetectConfig =
            serde_json::from_str(r#"{"blur_kernel_size": 7, "detector": "SimpleCanny"}"#).unwrap();
        assert_eq!(config.blur_kernel_size, 7);
        assert_eq!(config.detector, DetectorKind::SimpleCanny);
        assert_eq!(config.close_kernel_size, DetectConfig::DEFAULT_CLOSE_KERNEL_SIZE);
    }

    // --- PipelineError tests ---

    #[test]
    fn degenerate_geometry_display() {
        let err = PipelineError::DegenerateGeometry {
            width: 0.0,
            height: 12.5,
        };
        assert_eq!(
            err.to_string(),
            "degenerate quadrilateral: estimated output is 0.00x12.50 pixels",
        );
    }

    #[test]
    fn pipeline_error_serde_round_trip() {
        let err = PipelineError::InvalidInput("image has zero width".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
