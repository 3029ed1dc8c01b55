//! Frame geometry: the mapping between the display (preview) space a
//! user sees and the pixel space of the captured image.
//!
//! Detection runs on the source image resized by `scale_factor`, so the
//! points it produces are already in display space. Rectification needs
//! them back in pixel space, which is a division by the same factor.

use image::DynamicImage;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Dimensions, PipelineError, Point, Quadrilateral};

/// Display frame and source image sizes plus the single scale factor
/// that converts between them.
///
/// `scale_factor = min(display_width / source_width,
/// display_height / source_height)` and is always positive.
///
/// Deserializing goes through [`FrameGeometry::new`]: a serialized
/// `scale_factor` is ignored and recomputed, and zero dimensions are
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameGeometry {
    display_width: u32,
    display_height: u32,
    source_width: u32,
    source_height: u32,
    scale_factor: f64,
}

impl FrameGeometry {
    /// Build a frame geometry, computing the scale factor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if any dimension is zero.
    pub fn new(
        display_width: u32,
        display_height: u32,
        source_width: u32,
        source_height: u32,
    ) -> Result<Self, PipelineError> {
        if display_width == 0 || display_height == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "display frame must be non-empty, got {display_width}x{display_height}"
            )));
        }
        if source_width == 0 || source_height == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "source image must be non-empty, got {source_width}x{source_height}"
            )));
        }
        let scale_factor = (f64::from(display_width) / f64::from(source_width))
            .min(f64::from(display_height) / f64::from(source_height));
        Ok(Self {
            display_width,
            display_height,
            source_width,
            source_height,
            scale_factor,
        })
    }

    /// Frame geometry for displaying `image` in a `display_width` x
    /// `display_height` frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if the frame or the image
    /// is empty.
    pub fn for_image(
        display_width: u32,
        display_height: u32,
        image: &DynamicImage,
    ) -> Result<Self, PipelineError> {
        Self::new(display_width, display_height, image.width(), image.height())
    }

    /// Display frame width.
    #[must_use]
    pub const fn display_width(&self) -> u32 {
        self.display_width
    }

    /// Display frame height.
    #[must_use]
    pub const fn display_height(&self) -> u32 {
        self.display_height
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn source_dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.source_width,
            height: self.source_height,
        }
    }

    /// The pixel-space to display-space conversion factor.
    #[must_use]
    pub const fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Size of the image the detector works on: the source scaled by
    /// `scale_factor`, rounded, and at least one pixel on each axis.
    #[must_use]
    pub fn detection_dimensions(&self) -> Dimensions {
        Dimensions {
            width: scaled_len(self.source_width, self.scale_factor),
            height: scaled_len(self.source_height, self.scale_factor),
        }
    }

    /// Convert a display-space point to pixel space.
    #[must_use]
    pub fn to_pixel_space(&self, p: Point) -> Point {
        Point::new(p.x / self.scale_factor, p.y / self.scale_factor)
    }

    /// Convert a pixel-space point to display space.
    #[must_use]
    pub fn to_display_space(&self, p: Point) -> Point {
        p.scaled(self.scale_factor)
    }

    /// Convert every corner of a display-space quadrilateral to pixel space.
    #[must_use]
    pub fn quad_to_pixel_space(&self, quad: &Quadrilateral) -> Quadrilateral {
        Quadrilateral::from_ordered(quad.corners().map(|p| self.to_pixel_space(p)))
    }

    /// Check that `image` is the buffer this geometry was built for.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] on an empty image or a
    /// size mismatch.
    pub fn check_image(&self, image: &DynamicImage) -> Result<(), PipelineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "image buffer must be non-empty, got {}x{}",
                image.width(),
                image.height()
            )));
        }
        if (image.width(), image.height()) != (self.source_width, self.source_height) {
            return Err(PipelineError::InvalidInput(format!(
                "image is {}x{} but frame geometry expects {}x{}",
                image.width(),
                image.height(),
                self.source_width,
                self.source_height
            )));
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for FrameGeometry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Sizes {
            display_width: u32,
            display_height: u32,
            source_width: u32,
            source_height: u32,
        }

        let sizes = Sizes::deserialize(deserializer)?;
        Self::new(
            sizes.display_width,
            sizes.display_height,
            sizes.source_width,
            sizes.source_height,
        )
        .map_err(serde::de::Error::custom)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_len(len: u32, factor: f64) -> u32 {
    (f64::from(len) * factor).round().max(1.0) as u32
}

/// Center-crop `image` to the aspect ratio of a `display_width` x
/// `display_height` frame, keeping the full source height when the
/// frame is narrower than the image (and the full width otherwise).
///
/// Returns the image unchanged when either frame dimension is zero or
/// the ratios already match.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
pub fn fit_to_aspect(image: &DynamicImage, display_width: u32, display_height: u32) -> DynamicImage {
    if display_width == 0 || display_height == 0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let ratio = f64::from(display_width) / f64::from(display_height);
    let (w, h) = (image.width(), image.height());

    let wanted_w = (f64::from(h) * ratio).round() as u32;
    let (crop_w, crop_h) = if wanted_w <= w {
        (wanted_w.max(1), h)
    } else {
        (w, ((f64::from(w) / ratio).round() as u32).clamp(1, h))
    };
    if (crop_w, crop_h) == (w, h) {
        return image.clone();
    }
    image.crop_imm((w - crop_w) / 2, (h - crop_h) / 2, crop_w, crop_h)
}
