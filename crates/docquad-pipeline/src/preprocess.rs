//! Preprocessing: grayscale intensity image to binary edge map.
//!
//! Each detection strategy describes its preprocessing as a list of
//! [`PreprocessStep`]s. The steps are plain values built from the
//! per-call configuration, so two concurrent detections never share a
//! kernel or threshold.

use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::DetectConfig;
use crate::{blur, edge, morphology, normalize};

/// One raster transform applied to the intensity image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PreprocessStep {
    /// Gaussian blur with the sigma implied by a square kernel.
    Blur {
        /// Kernel side length.
        kernel_size: u32,
    },
    /// Min-max stretch to `[0, 255]`.
    Normalize,
    /// Clamp values above `threshold`.
    Truncate {
        /// Brightest value kept.
        threshold: u8,
    },
    /// Canny edge detection.
    EdgeDetection {
        /// Hysteresis low threshold.
        low: f32,
        /// Hysteresis high threshold.
        high: f32,
    },
    /// Zero every pixel at or below `cutoff`.
    ThresholdToZero {
        /// Largest value zeroed.
        cutoff: u8,
    },
    /// Morphological closing with a square element.
    Close {
        /// Element side length.
        kernel_size: u32,
    },
    /// Repeated dilation with a 3x3 square.
    Dilate {
        /// Number of passes.
        iterations: u32,
    },
}

impl PreprocessStep {
    /// Apply this step, returning a new image of the same size.
    #[must_use = "returns the processed image"]
    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        match *self {
            Self::Blur { kernel_size } => blur::blur_with_kernel(image, kernel_size),
            Self::Normalize => normalize::normalize_min_max(image),
            Self::Truncate { threshold } => normalize::truncate(image, threshold),
            Self::EdgeDetection { low, high } => edge::canny(image, low, high),
            Self::ThresholdToZero { cutoff } => normalize::threshold_to_zero(image, cutoff),
            Self::Close { kernel_size } => morphology::close(image, kernel_size),
            Self::Dilate { iterations } => morphology::dilate_3x3(image, iterations),
        }
    }

    /// Short lowercase name, used for logging and dump file names.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Blur { .. } => "blur",
            Self::Normalize => "normalize",
            Self::Truncate { .. } => "truncate",
            Self::EdgeDetection { .. } => "edges",
            Self::ThresholdToZero { .. } => "threshold",
            Self::Close { .. } => "close",
            Self::Dilate { .. } => "dilate",
        }
    }
}

impl fmt::Display for PreprocessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blur { kernel_size } => write!(f, "blur {kernel_size}x{kernel_size}"),
            Self::Normalize => f.write_str("normalize"),
            Self::Truncate { threshold } => write!(f, "truncate >{threshold}"),
            Self::EdgeDetection { low, high } => write!(f, "canny {low}/{high}"),
            Self::ThresholdToZero { cutoff } => write!(f, "threshold <={cutoff}"),
            Self::Close { kernel_size } => write!(f, "close {kernel_size}x{kernel_size}"),
            Self::Dilate { iterations } => write!(f, "dilate 3x3 x{iterations}"),
        }
    }
}

/// The multi-stage sequence: blur, normalize, truncate, normalize,
/// Canny, threshold, close.
#[must_use]
pub fn multi_stage_steps(config: &DetectConfig) -> Vec<PreprocessStep> {
    vec![
        PreprocessStep::Blur {
            kernel_size: config.blur_kernel_size,
        },
        PreprocessStep::Normalize,
        PreprocessStep::Truncate {
            threshold: config.truncate_threshold,
        },
        PreprocessStep::Normalize,
        PreprocessStep::EdgeDetection {
            low: config.canny_low,
            high: config.canny_high,
        },
        PreprocessStep::ThresholdToZero {
            cutoff: config.edge_cutoff,
        },
        PreprocessStep::Close {
            kernel_size: config.close_kernel_size,
        },
    ]
}

/// Run `steps` in order.
#[must_use = "returns the edge map"]
pub fn run_steps(image: &GrayImage, steps: &[PreprocessStep]) -> GrayImage {
    steps
        .iter()
        .fold(image.clone(), |current, step| step.apply(&current))
}
