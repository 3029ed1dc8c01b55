//! Smoothing ahead of edge detection.
//!
//! Detection thresholds are tuned against a square kernel side length
//! rather than a sigma. [`blur_with_kernel`] converts one into the other
//! and hands the work to `imageproc`'s separable Gaussian.

use image::GrayImage;

/// Gaussian blur with standard deviation `sigma`.
///
/// `imageproc` rejects non-positive sigmas, so those return a copy.
#[must_use = "returns the smoothed image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(image, sigma)
    } else {
        image.clone()
    }
}

/// Sigma implied by a square kernel of side `kernel_size`:
/// `0.3 * ((k - 1) / 2 - 1) + 0.8`.
///
/// A 3x3 kernel gives 0.8, 5x5 gives 1.1, 11x11 gives 2.0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    let k = kernel_size as f32;
    0.3_f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Blur with the Gaussian that a `kernel_size` x `kernel_size` kernel
/// describes. Kernel sizes of 0 or 1 leave the image unchanged.
#[must_use = "returns the smoothed image"]
pub fn blur_with_kernel(image: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return image.clone();
    }
    gaussian_blur(image, sigma_for_kernel(kernel_size))
}
