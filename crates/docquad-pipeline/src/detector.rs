//! Quadrilateral detection strategies.
//!
//! This module defines the [`QuadDetector`] trait for pluggable
//! detection strategies and the [`DetectorKind`] enum for selecting one
//! at runtime.
//!
//! # Strategy pattern
//!
//! A strategy decides three things: which preprocessing steps build the
//! edge map, how contours are pulled out of it, and how one contour is
//! chosen. Resizing, canonical ordering, and the fallback are shared by
//! every strategy and live outside the trait.

use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::contour;
use crate::preprocess::{self, PreprocessStep};
use crate::select::{self, SelectionCriteria, SelectionOutcome};
use crate::types::{Contour, DetectConfig};

/// Selects which detection strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetectorKind {
    /// Blur, normalize, truncate, Canny, threshold and closing, then
    /// convex hulls ranked by area with a greedy first-pass selection.
    ///
    /// Reads every tuning field of [`DetectConfig`].
    #[default]
    MultiStage,

    /// Light blur and a single Canny pass; the five largest raw contours
    /// are checked for a four-vertex approximation with a minimum area.
    /// No hull and no angle test.
    SimpleCanny,

    /// Heavy blur, low-threshold Canny and two dilations; every contour
    /// is checked and the convex near-rectangle with the largest bounding
    /// box wins.
    Squares,
}

impl DetectorKind {
    /// All strategies, default first.
    pub const ALL: [Self; 3] = [Self::MultiStage, Self::SimpleCanny, Self::Squares];
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiStage => f.write_str("MultiStage"),
            Self::SimpleCanny => f.write_str("SimpleCanny"),
            Self::Squares => f.write_str("Squares"),
        }
    }
}

/// Trait for quadrilateral detection strategies.
///
/// Input: a single-channel intensity image at detection resolution.
/// Output: the selection result, whose candidate (if any) is in the
/// image's own coordinates.
pub trait QuadDetector {
    /// Preprocessing that turns the intensity image into an edge map.
    fn preprocess_steps(&self, config: &DetectConfig) -> Vec<PreprocessStep>;

    /// Contours to consider, in the order selection should see them.
    fn extract_contours(&self, edges: &GrayImage, config: &DetectConfig) -> Vec<Contour>;

    /// Pick at most one candidate from `contours`.
    fn select(&self, contours: &[Contour], config: &DetectConfig) -> SelectionOutcome;

    /// Run preprocessing, extraction and selection in one go.
    fn detect_candidate(&self, image: &GrayImage, config: &DetectConfig) -> SelectionOutcome {
        let edges = preprocess::run_steps(image, &self.preprocess_steps(config));
        let contours = self.extract_contours(&edges, config);
        self.select(&contours, config)
    }
}

mod simple_canny {
    pub const BLUR_KERNEL_SIZE: u32 = 5;
    pub const CANNY_LOW: f32 = 75.0;
    pub const CANNY_HIGH: f32 = 200.0;
    pub const MAX_CONTOURS: usize = 5;
    pub const MIN_AREA: f64 = 150.0;
}

mod squares {
    pub const BLUR_KERNEL_SIZE: u32 = 11;
    pub const CANNY_LOW: f32 = 10.0;
    pub const CANNY_HIGH: f32 = 20.0;
    pub const DILATE_ITERATIONS: u32 = 2;
    pub const MIN_AREA: f64 = 1000.0;
    pub const MAX_CORNER_COSINE: f64 = 0.3;
}

impl QuadDetector for DetectorKind {
    fn preprocess_steps(&self, config: &DetectConfig) -> Vec<PreprocessStep> {
        match *self {
            Self::MultiStage => preprocess::multi_stage_steps(config),
            Self::SimpleCanny => vec![
                PreprocessStep::Blur {
                    kernel_size: simple_canny::BLUR_KERNEL_SIZE,
                },
                PreprocessStep::EdgeDetection {
                    low: simple_canny::CANNY_LOW,
                    high: simple_canny::CANNY_HIGH,
                },
            ],
            Self::Squares => vec![
                PreprocessStep::Blur {
                    kernel_size: squares::BLUR_KERNEL_SIZE,
                },
                PreprocessStep::EdgeDetection {
                    low: squares::CANNY_LOW,
                    high: squares::CANNY_HIGH,
                },
                PreprocessStep::Dilate {
                    iterations: squares::DILATE_ITERATIONS,
                },
            ],
        }
    }

    fn extract_contours(&self, edges: &GrayImage, config: &DetectConfig) -> Vec<Contour> {
        match *self {
            Self::MultiStage => contour::extract_ranked_hulls(edges, config.max_contours),
            Self::SimpleCanny => {
                contour::rank_by_area(contour::trace_contours(edges), simple_canny::MAX_CONTOURS)
            }
            Self::Squares => contour::trace_contours(edges),
        }
    }

    fn select(&self, contours: &[Contour], config: &DetectConfig) -> SelectionOutcome {
        match *self {
            Self::MultiStage => select::select_first_passing(
                contours,
                &SelectionCriteria {
                    approx_epsilon_ratio: config.approx_epsilon_ratio,
                    max_corner_cosine: Some(config.max_corner_cosine),
                    min_area: config.min_candidate_area,
                    require_convex: false,
                },
            ),
            Self::SimpleCanny => select::select_first_passing(
                contours,
                &SelectionCriteria {
                    approx_epsilon_ratio: DetectConfig::DEFAULT_APPROX_EPSILON_RATIO,
                    max_corner_cosine: None,
                    min_area: simple_canny::MIN_AREA,
                    require_convex: false,
                },
            ),
            Self::Squares => select::select_largest_box(
                contours,
                &SelectionCriteria {
                    approx_epsilon_ratio: DetectConfig::DEFAULT_APPROX_EPSILON_RATIO,
                    max_corner_cosine: Some(squares::MAX_CORNER_COSINE),
                    min_area: squares::MIN_AREA,
                    require_convex: true,
                },
            ),
        }
    }
}
