//! Morphological operations on edge maps.
//!
//! The structuring element is built per call from the requested size;
//! nothing is cached between calls.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

/// Square structuring element of side `size`, anchored at its center
/// (`size / 2` on both axes, so even sizes lean towards the bottom-right).
///
/// `size` is clamped to `1..=255`.
#[must_use]
pub fn square_mask(size: u32) -> Mask {
    let size = size.clamp(1, 255);
    anchored_square(size, size / 2)
}

#[allow(clippy::cast_possible_truncation)]
fn anchored_square(size: u32, anchor: u32) -> Mask {
    let element = GrayImage::from_pixel(size, size, Luma([255]));
    let anchor = anchor as u8;
    Mask::from_image(&element, anchor, anchor)
}

/// Morphological closing (dilation then erosion) with a `size` x `size`
/// square. Joins edge fragments separated by gaps narrower than the
/// element. A size of 0 or 1 leaves the image unchanged.
///
/// The erosion uses the dilation element reflected about its anchor. For
/// even sizes the two anchors differ by one pixel, and using the same one
/// for both passes would shift the result towards the bottom-right.
#[must_use = "returns the closed edge map"]
pub fn close(image: &GrayImage, size: u32) -> GrayImage {
    let size = size.clamp(1, 255);
    if size == 1 {
        return image.clone();
    }
    let anchor = size / 2;
    let dilated = grayscale_dilate(image, &anchored_square(size, anchor));
    grayscale_erode(&dilated, &anchored_square(size, size - 1 - anchor))
}

/// Dilate `iterations` times with a 3x3 square.
#[must_use = "returns the dilated edge map"]
pub fn dilate_3x3(image: &GrayImage, iterations: u32) -> GrayImage {
    let mut out = image.clone();
    for _ in 0..iterations {
        out = imageproc::morphology::dilate(&out, Norm::LInf, 1);
    }
    out
}
