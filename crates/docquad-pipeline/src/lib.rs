//! docquad-pipeline: document corner detection and perspective
//! rectification (sans-IO).
//!
//! Detection turns a photographed page into four corners through:
//! resize -> grayscale -> preprocessing (blur, normalize, Canny,
//! closing, ...) -> contour extraction -> candidate selection ->
//! canonical ordering, with a fixed fallback quadrilateral when nothing
//! passes. Rectification maps the region inside a quadrilateral onto an
//! axis-aligned image with a projective warp.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! [`image::DynamicImage`] buffers and returns structured data. Decoding
//! files and writing results lives in `docquad-cli`.
//!
//! # Coordinate spaces
//!
//! Corners are reported in *display space*: the source scaled by
//! [`FrameGeometry::scale_factor`] so that it fits the display frame.
//! [`rectify`] divides them by the same factor to address the
//! full-resolution buffer.

pub mod blur;
pub mod canny;
pub mod contour;
pub mod detector;
pub mod diagnostics;
pub mod edge;
pub mod fallback;
pub mod frame;
pub mod geometry;
pub mod grayscale;
pub mod morphology;
pub mod normalize;
pub mod order;
pub mod pipeline;
pub mod preprocess;
pub mod rectify;
pub mod resize;
pub mod select;
pub mod simplify;
pub mod types;

pub use detector::{DetectorKind, QuadDetector};
pub use diagnostics::{Clock, DetectionDiagnostics, detect_with_diagnostics};
pub use fallback::FallbackShape;
pub use frame::FrameGeometry;
pub use pipeline::{Pipeline, StagedDetection};
pub use rectify::{RectifyConfig, WarpInterpolation, rectify, rectify_with_config};
pub use resize::ResizeFilter;
pub use types::{
    Contour, Corner, DetectConfig, Detection, Dimensions, PipelineError, Point, QuadSource,
    Quadrilateral,
};

use image::DynamicImage;
use tracing::{debug, instrument};

/// Detect the document corners in `image` with the default
/// configuration.
///
/// Returns corners in display space, ordered `[TL, TR, BR, BL]`. When no
/// candidate passes, the fallback quadrilateral is returned; use
/// [`detect_with_source`] to tell the two apart.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if `image` is empty or does
/// not match `frame`'s source dimensions.
pub fn detect(image: &DynamicImage, frame: &FrameGeometry) -> Result<Quadrilateral, PipelineError> {
    detect_with_source(image, frame).map(|detection| detection.quad)
}

/// [`detect`], also reporting whether the corners were detected or are
/// the fallback.
///
/// # Errors
///
/// Same as [`detect`].
pub fn detect_with_source(
    image: &DynamicImage,
    frame: &FrameGeometry,
) -> Result<Detection, PipelineError> {
    detect_with_config(image, frame, &DetectConfig::default())
}

/// Run detection with an explicit configuration.
///
/// Unlike the staged [`Pipeline`], intermediates are dropped as soon as
/// the next step has consumed them.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation
/// and [`PipelineError::InvalidInput`] if `image` is empty or does not
/// match `frame`.
#[instrument(skip(image, config), fields(detector = %config.detector))]
pub fn detect_with_config(
    image: &DynamicImage,
    frame: &FrameGeometry,
    config: &DetectConfig,
) -> Result<Detection, PipelineError> {
    config.validate()?;
    frame.check_image(image)?;

    let gray = {
        let (resized, _) =
            resize::resize_exact(image, frame.detection_dimensions(), config.resize_filter);
        grayscale::to_grayscale(&resized)
    };
    let outcome = config.detector.detect_candidate(&gray, config);

    let detection = match outcome.candidate {
        Some(candidate) => Detection {
            quad: candidate.quad,
            source: QuadSource::Detected,
        },
        None => Detection {
            quad: fallback::fallback_quadrilateral(frame, config.fallback),
            source: QuadSource::Fallback,
        },
    };
    debug!(
        evaluated = outcome.evaluated,
        source = ?detection.source,
        "detection finished"
    );
    Ok(detection)
}

/// Run detection and keep every intermediate raster, the traced
/// contours and the selection details.
///
/// # Errors
///
/// Same as [`detect_with_config`].
pub fn detect_staged(
    image: &DynamicImage,
    frame: FrameGeometry,
    config: &DetectConfig,
) -> Result<StagedDetection, PipelineError> {
    Ok(Pipeline::new(image, frame, config.clone())?
        .resize()
        .grayscale()
        .preprocess()
        .extract_contours()
        .select()
        .into_result())
}
