//! Edge-map entry point used by the preprocessing steps.
//!
//! Thresholds come straight from [`DetectConfig`](crate::DetectConfig) or a
//! CLI flag. They are clamped here so a zero or inverted pair still yields
//! a usable edge map instead of one that marks every gradient.

use image::GrayImage;

/// Smallest threshold handed to the detector.
pub const MIN_THRESHOLD: f32 = 1.0;

/// Binary Canny edge map of `image`: 255 on edges, 0 elsewhere.
///
/// `high` is raised to at least [`MIN_THRESHOLD`]; `low` is raised to the
/// same floor and then capped at `high`.
#[must_use = "returns the edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (low, high) = sanitize_thresholds(low, high);
    crate::canny::canny(image, low, high)
}

fn sanitize_thresholds(low: f32, high: f32) -> (f32, f32) {
    let high = high.max(MIN_THRESHOLD);
    (low.max(MIN_THRESHOLD).min(high), high)
}

/// Number of pixels set to 255.
#[must_use]
pub fn count_edge_pixels(image: &GrayImage) -> u64 {
    image.pixels().filter(|p| p.0[0] == u8::MAX).count() as u64
}
