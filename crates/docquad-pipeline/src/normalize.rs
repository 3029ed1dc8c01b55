//! Intensity normalization and thresholding.
//!
//! The multi-stage preprocessor stretches intensities to the full
//! `[0, 255]` range, flattens everything brighter than a threshold (so
//! white paper becomes one uniform plateau), then stretches again. The
//! same module provides the "to zero" threshold applied to the Canny
//! output.

use image::{GrayImage, Luma};

/// Linearly stretch intensities so the darkest pixel becomes 0 and the
/// brightest 255.
///
/// A uniform image has no range to stretch and maps to all zeros.
#[must_use = "returns the normalized image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_min_max(image: &GrayImage) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));

    if image.width() == 0 || image.height() == 0 || min >= max {
        return GrayImage::new(image.width(), image.height());
    }

    let scale = 255.0 / f32::from(max - min);
    let mut out = image.clone();
    for p in out.pixels_mut() {
        let stretched = f32::from(p.0[0] - min) * scale;
        *p = Luma([stretched.round().clamp(0.0, 255.0) as u8]);
    }
    out
}

/// Clamp every pixel to at most `threshold`.
#[must_use = "returns the truncated image"]
pub fn truncate(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = p.0[0].min(threshold);
    }
    out
}

/// Zero every pixel at or below `cutoff`; keep the rest unchanged.
#[must_use = "returns the thresholded image"]
pub fn threshold_to_zero(image: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        if p.0[0] <= cutoff {
            p.0[0] = 0;
        }
    }
    out
}

/// Mean intensity, used by stage diagnostics.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_intensity(image: &GrayImage) -> f64 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let total: u64 = image.pixels().map(|p| u64::from(p.0[0])).sum();
    total as f64 / count as f64
}
