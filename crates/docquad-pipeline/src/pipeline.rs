//! Incremental detection: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::detect_with_config`], which runs detection in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use docquad_pipeline::{DetectConfig, FrameGeometry, Pipeline, PipelineError};
//! # fn run(image: &image::DynamicImage) -> Result<(), PipelineError> {
//! let frame = FrameGeometry::for_image(400, 600, image)?;
//! let staged = Pipeline::new(image, frame, DetectConfig::default())?
//!     .resize()
//!     .grayscale()
//!     .preprocess()
//!     .extract_contours()
//!     .select()
//!     .into_result();
//! println!("{:?}", staged.detection);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, carrying
//! the intermediates computed so far. [`Preprocessing`] can also be
//! advanced one raster step at a time with
//! [`apply_next`](Preprocessing::apply_next).
//!
//! # Memory
//!
//! Every stage from [`Preprocessed`] onward keeps one grayscale raster
//! per preprocessing step alongside the resized color image, so that
//! [`StagedDetection`] can hand all of them to a caller that wants to
//! inspect or dump them. Callers that only need the corners should use
//! [`crate::detect`], which drops the intermediates as it goes.

use std::collections::VecDeque;

use image::{DynamicImage, GrayImage};
use serde::Serialize;
use tracing::debug;

use crate::detector::QuadDetector;
use crate::diagnostics::StageMetrics;
use crate::fallback::fallback_quadrilateral;
use crate::frame::FrameGeometry;
use crate::preprocess::PreprocessStep;
use crate::select::SelectionOutcome;
use crate::types::{Contour, DetectConfig, Detection, PipelineError, QuadSource};

/// Entry point of the staged API.
pub struct Pipeline;

impl Pipeline {
    /// Validate inputs and create the first stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// validation and [`PipelineError::InvalidInput`] if `image` is
    /// empty or does not match `frame`'s source dimensions.
    pub fn new(
        image: &DynamicImage,
        frame: FrameGeometry,
        config: DetectConfig,
    ) -> Result<Pending<'_>, PipelineError> {
        config.validate()?;
        frame.check_image(image)?;
        Ok(Pending {
            image,
            frame,
            config,
        })
    }
}

/// A preprocessing step together with the image it produced.
#[derive(Debug, Clone)]
pub struct StageImage {
    /// The step that ran.
    pub step: PreprocessStep,
    /// Its output.
    pub image: GrayImage,
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Inputs validated, nothing computed yet.
#[must_use = "pipeline stages are consumed by advancing; call .resize() to continue"]
pub struct Pending<'a> {
    image: &'a DynamicImage,
    frame: FrameGeometry,
    config: DetectConfig,
}

impl Pending<'_> {
    /// The frame geometry detection runs against.
    #[must_use]
    pub const fn frame(&self) -> &FrameGeometry {
        &self.frame
    }

    /// Resize the source to detection resolution.
    pub fn resize(self) -> Resized {
        let target = self.frame.detection_dimensions();
        let (image, applied) =
            crate::resize::resize_exact(self.image, target, self.config.resize_filter);
        debug!(
            width = target.width,
            height = target.height,
            applied,
            "resized to detection resolution"
        );
        Resized {
            frame: self.frame,
            config: self.config,
            source_width: self.image.width(),
            source_height: self.image.height(),
            image,
            applied,
        }
    }
}

// ───────────────────────── Stage 1: Resized ──────────────────────────

/// Source brought down to detection resolution.
#[must_use = "pipeline stages are consumed by advancing; call .grayscale() to continue"]
pub struct Resized {
    frame: FrameGeometry,
    config: DetectConfig,
    source_width: u32,
    source_height: u32,
    image: DynamicImage,
    applied: bool,
}

impl Resized {
    /// The resized color image.
    #[must_use]
    pub const fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Metrics for the resize step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Resize {
            source_width: self.source_width,
            source_height: self.source_height,
            width: self.image.width(),
            height: self.image.height(),
            resampled: self.applied,
        }
    }

    /// Convert to a single intensity channel and queue the strategy's
    /// preprocessing steps.
    pub fn grayscale(self) -> Preprocessing {
        let gray = crate::grayscale::to_grayscale(&self.image);
        let remaining = self.config.detector.preprocess_steps(&self.config).into();
        Preprocessing {
            frame: self.frame,
            config: self.config,
            resized: self.image,
            gray,
            remaining,
            done: Vec::new(),
        }
    }
}

// ───────────────────────── Stage 2: Preprocessing ────────────────────

/// Grayscale image plus the preprocessing steps still to run.
#[must_use = "pipeline stages are consumed by advancing; call .preprocess() to continue"]
pub struct Preprocessing {
    frame: FrameGeometry,
    config: DetectConfig,
    resized: DynamicImage,
    gray: GrayImage,
    remaining: VecDeque<PreprocessStep>,
    done: Vec<StageImage>,
}

impl Preprocessing {
    /// The grayscale image the steps start from.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Metrics for the grayscale conversion.
    #[must_use]
    pub fn grayscale_metrics(&self) -> StageMetrics {
        StageMetrics::Grayscale {
            width: self.gray.width(),
            height: self.gray.height(),
        }
    }

    /// The most recent output (the grayscale image before any step ran).
    #[must_use]
    pub fn current(&self) -> &GrayImage {
        self.done.last().map_or(&self.gray, |s| &s.image)
    }

    /// The step [`apply_next`](Self::apply_next) would run.
    #[must_use]
    pub fn next_step(&self) -> Option<PreprocessStep> {
        self.remaining.front().copied()
    }

    /// Steps that have already run, with their outputs.
    #[must_use]
    pub fn completed(&self) -> &[StageImage] {
        &self.done
    }

    /// Run one queued step. Does nothing once the queue is empty.
    pub fn apply_next(mut self) -> Self {
        if let Some(step) = self.remaining.pop_front() {
            let image = step.apply(self.current());
            debug!(step = step.name(), "preprocessing step applied");
            self.done.push(StageImage { step, image });
        }
        self
    }

    /// Run every remaining step.
    pub fn preprocess(mut self) -> Preprocessed {
        while !self.remaining.is_empty() {
            self = self.apply_next();
        }
        Preprocessed {
            frame: self.frame,
            config: self.config,
            resized: self.resized,
            gray: self.gray,
            intermediates: self.done,
        }
    }
}

// ───────────────────────── Stage 3: Preprocessed ─────────────────────

/// Edge map ready for contour extraction.
#[must_use = "pipeline stages are consumed by advancing; call .extract_contours() to continue"]
pub struct Preprocessed {
    frame: FrameGeometry,
    config: DetectConfig,
    resized: DynamicImage,
    gray: GrayImage,
    intermediates: Vec<StageImage>,
}

impl Preprocessed {
    /// The final edge map.
    #[must_use]
    pub fn edges(&self) -> &GrayImage {
        self.intermediates.last().map_or(&self.gray, |s| &s.image)
    }

    /// Trace and order contours with the configured strategy.
    pub fn extract_contours(self) -> ContoursExtracted {
        let contours = self
            .config
            .detector
            .extract_contours(self.edges(), &self.config);
        debug!(count = contours.len(), "contours extracted");
        ContoursExtracted {
            frame: self.frame,
            config: self.config,
            resized: self.resized,
            gray: self.gray,
            intermediates: self.intermediates,
            contours,
        }
    }
}

// ───────────────────────── Stage 4: ContoursExtracted ────────────────

/// Contours in the order selection will examine them.
#[must_use = "pipeline stages are consumed by advancing; call .select() to continue"]
pub struct ContoursExtracted {
    frame: FrameGeometry,
    config: DetectConfig,
    resized: DynamicImage,
    gray: GrayImage,
    intermediates: Vec<StageImage>,
    contours: Vec<Contour>,
}

impl ContoursExtracted {
    /// The extracted contours.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Metrics for contour extraction.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::ContourExtraction {
            contour_count: self.contours.len(),
            total_point_count: self.contours.iter().map(Contour::len).sum(),
            largest_area: self.contours.iter().map(Contour::area).fold(0.0, f64::max),
        }
    }

    /// Choose a candidate, falling back to the default quadrilateral
    /// when none passes.
    pub fn select(self) -> Selected {
        let selection = self.config.detector.select(&self.contours, &self.config);
        let detection = match selection.candidate {
            Some(candidate) => {
                debug!(
                    rank = candidate.rank,
                    area = candidate.area,
                    max_cosine = candidate.max_cosine,
                    "candidate selected"
                );
                Detection {
                    quad: candidate.quad,
                    source: QuadSource::Detected,
                }
            }
            None => {
                debug!(
                    evaluated = selection.evaluated,
                    shape = ?self.config.fallback,
                    "no candidate passed, using fallback"
                );
                Detection {
                    quad: fallback_quadrilateral(&self.frame, self.config.fallback),
                    source: QuadSource::Fallback,
                }
            }
        };
        Selected {
            frame: self.frame,
            resized: self.resized,
            gray: self.gray,
            intermediates: self.intermediates,
            contours: self.contours,
            selection,
            detection,
        }
    }
}

// ───────────────────────── Stage 5: Selected ─────────────────────────

/// Final stage: the detection is known.
#[must_use = "call .into_result() or .detection() to use the outcome"]
pub struct Selected {
    frame: FrameGeometry,
    resized: DynamicImage,
    gray: GrayImage,
    intermediates: Vec<StageImage>,
    contours: Vec<Contour>,
    selection: SelectionOutcome,
    detection: Detection,
}

impl Selected {
    /// The detection result, in display space.
    #[must_use]
    pub const fn detection(&self) -> Detection {
        self.detection
    }

    /// Metrics for candidate selection.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Selection {
            evaluated: self.selection.evaluated,
            rejected: self.selection.rejections.len(),
            selected_rank: self.selection.candidate.map(|c| c.rank),
            max_cosine: self.selection.candidate.map(|c| c.max_cosine),
            fallback: self.detection.source == QuadSource::Fallback,
        }
    }

    /// Give up stage-by-stage access and keep every intermediate.
    pub fn into_result(self) -> StagedDetection {
        StagedDetection {
            frame: self.frame,
            resized: self.resized,
            gray: self.gray,
            intermediates: self.intermediates,
            contours: self.contours,
            selection: self.selection,
            detection: self.detection,
        }
    }
}

/// Every intermediate of one detection run.
#[derive(Debug, Clone, Serialize)]
pub struct StagedDetection {
    /// Frame geometry used.
    pub frame: FrameGeometry,
    /// Source at detection resolution.
    #[serde(skip)]
    pub resized: DynamicImage,
    /// Grayscale conversion of `resized`.
    #[serde(skip)]
    pub gray: GrayImage,
    /// Preprocessing outputs, in order.
    #[serde(skip)]
    pub intermediates: Vec<StageImage>,
    /// Contours as seen by selection.
    pub contours: Vec<Contour>,
    /// Selection details, including rejections.
    pub selection: SelectionOutcome,
    /// Final corners and their provenance.
    pub detection: Detection,
}

impl StagedDetection {
    /// The edge map contours were traced from.
    #[must_use]
    pub fn edges(&self) -> &GrayImage {
        self.intermediates.last().map_or(&self.gray, |s| &s.image)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::detector::DetectorKind;
    use image::{Luma, RgbaImage};

    /// 200x300 source with a dark rectangle at (40..160, 60..240).
    fn scene() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(200, 300, |x, y| {
            if (40..160).contains(&x) && (60..240).contains(&y) {
                image::Rgba([15, 15, 15, 255])
            } else {
                image::Rgba([240, 240, 240, 255])
            }
        }))
    }

    #[test]
    fn stages_advance_to_detection() {
        let img = scene();
        let frame = FrameGeometry::for_image(100, 150, &img).unwrap();
        let resized = Pipeline::new(&img, frame, DetectConfig::default())
            .unwrap()
            .resize();
        assert_eq!((resized.image().width(), resized.image().height()), (100, 150));

        let staged = resized
            .grayscale()
            .preprocess()
            .extract_contours()
            .select()
            .into_result();
        assert_eq!(staged.detection.source, QuadSource::Detected);
        assert_eq!(staged.intermediates.len(), 7);
        assert_eq!(staged.edges().dimensions(), (100, 150));

        let tl = staged.detection.quad.top_left();
        assert!((tl.x - 20.0).abs() <= 3.0 && (tl.y - 30.0).abs() <= 3.0, "{tl:?}");
    }

    #[test]
    fn preprocessing_can_be_stepped() {
        let img = scene();
        let frame = FrameGeometry::for_image(200, 300, &img).unwrap();
        let mut stage = Pipeline::new(&img, frame, DetectConfig::default())
            .unwrap()
            .resize()
            .grayscale();
        assert_eq!(stage.next_step(), Some(PreprocessStep::Blur { kernel_size: 5 }));
        assert_eq!(stage.current(), stage.gray());

        stage = stage.apply_next();
        assert_eq!(stage.completed().len(), 1);
        assert_eq!(stage.next_step(), Some(PreprocessStep::Normalize));

        let done = stage.preprocess();
        assert_eq!(done.edges().dimensions(), (200, 300));
    }

    #[test]
    fn strategy_controls_step_count() {
        let img = scene();
        let frame = FrameGeometry::for_image(200, 300, &img).unwrap();
        let config = DetectConfig {
            detector: DetectorKind::SimpleCanny,
            ..DetectConfig::default()
        };
        let staged = Pipeline::new(&img, frame, config)
            .unwrap()
            .resize()
            .grayscale()
            .preprocess()
            .extract_contours()
            .select()
            .into_result();
        assert_eq!(staged.intermediates.len(), 2);
    }

    #[test]
    fn blank_source_falls_back() {
        let img = DynamicImage::new_luma8(80, 80);
        let frame = FrameGeometry::for_image(80, 80, &img).unwrap();
        let selected = Pipeline::new(&img, frame, DetectConfig::default())
            .unwrap()
            .resize()
            .grayscale()
            .preprocess()
            .extract_contours()
            .select();
        assert_eq!(selected.detection().source, QuadSource::Fallback);
        assert!(matches!(
            selected.metrics(),
            StageMetrics::Selection { fallback: true, evaluated: 0, .. }
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let img = scene();
        let frame = FrameGeometry::for_image(200, 300, &img).unwrap();
        let config = DetectConfig {
            blur_kernel_size: 2,
            ..DetectConfig::default()
        };
        assert!(matches!(
            Pipeline::new(&img, frame, config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn mismatched_image_is_rejected() {
        let img = scene();
        let frame = FrameGeometry::new(200, 300, 100, 100).unwrap();
        assert!(matches!(
            Pipeline::new(&img, frame, DetectConfig::default()),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
