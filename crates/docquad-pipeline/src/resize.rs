//! Resampling the source image to detection resolution.
//!
//! Detection thresholds are tuned for the preview-sized image, so the
//! full-resolution capture is brought down to
//! [`FrameGeometry::detection_dimensions`](crate::frame::FrameGeometry::detection_dimensions)
//! before any other stage runs. The same helper resizes rectified output
//! when the caller asks for a fixed size.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Resampling filter used when resizing.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Resize `image` to exactly `target` pixels.
///
/// Returns the (possibly unchanged) image and whether resampling was
/// actually applied. An image already at `target` is returned as-is.
#[must_use]
pub fn resize_exact(
    image: &DynamicImage,
    target: Dimensions,
    filter: ResizeFilter,
) -> (DynamicImage, bool) {
    if (image.width(), image.height()) == (target.width, target.height) {
        return (image.clone(), false);
    }
    let resized = image.resize_exact(target.width, target.height, filter.to_image_filter());
    (resized, true)
}

/// Resize `image` to fit inside `max_width` x `max_height`, preserving
/// its aspect ratio. Used for thumbnails.
#[must_use]
pub fn resize_to_fit(
    image: &DynamicImage,
    max_width: u32,
    max_height: u32,
    filter: ResizeFilter,
) -> DynamicImage {
    image.resize(max_width, max_height, filter.to_image_filter())
}
