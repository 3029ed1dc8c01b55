//! Grayscale conversion.
//!
//! Accepts a decoded buffer of any color model and produces the
//! single-channel intensity image every later stage works on. Decoding
//! bytes is the caller's job; this crate never touches files.

use image::{DynamicImage, GrayImage};

/// Convert a decoded image to a single intensity channel.
///
/// Color images use the `image` crate's luminance weights, so green
/// contributes most and blue least. Images that are already
/// single-channel 8-bit are copied without conversion.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    }
}
