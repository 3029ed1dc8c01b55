//! Detection diagnostics: timing, counts, and other metrics per stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning. [`detect_with_diagnostics`] drives the staged
//! [`Pipeline`](crate::Pipeline) and records each transition.
//!
//! Timestamps come from a caller-supplied [`Clock`], so this crate does
//! not depend on any particular time source. Durations are serialized as
//! fractional seconds (`f64`) for JSON compatibility, since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::edge::count_edge_pixels;
use crate::frame::FrameGeometry;
use crate::normalize::mean_intensity;
use crate::pipeline::{Pipeline, StagedDetection};
use crate::preprocess::PreprocessStep;
use crate::types::{DetectConfig, DynamicImage, GrayImage, PipelineError, QuadSource};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionDiagnostics {
    /// Resize to detection resolution.
    pub resize: StageDiagnostics,
    /// Grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// One entry per preprocessing step, in order.
    pub preprocess: Vec<StageDiagnostics>,
    /// Contour extraction.
    pub contour_extraction: StageDiagnostics,
    /// Candidate selection (and fallback).
    pub selection: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: DetectionSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Resize to detection resolution.
    Resize {
        /// Source width in pixels.
        source_width: u32,
        /// Source height in pixels.
        source_height: u32,
        /// Detection width in pixels.
        width: u32,
        /// Detection height in pixels.
        height: u32,
        /// Whether resampling actually ran.
        resampled: bool,
    },
    /// Grayscale conversion.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Gaussian blur.
    Blur {
        /// Kernel side length.
        kernel_size: u32,
        /// Sigma derived from the kernel size.
        sigma: f32,
    },
    /// Min-max normalization.
    Normalize {
        /// Mean intensity of the output.
        mean_intensity: f64,
    },
    /// Bright-value truncation.
    Truncate {
        /// Brightest value kept.
        threshold: u8,
        /// Mean intensity of the output.
        mean_intensity: f64,
    },
    /// Canny edge detection.
    EdgeDetection {
        /// Low threshold.
        low_threshold: f32,
        /// High threshold.
        high_threshold: f32,
        /// Number of edge pixels (value == 255) in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Threshold-to-zero on the edge map.
    Threshold {
        /// Largest value zeroed.
        cutoff: u8,
        /// Edge pixels remaining.
        edge_pixel_count: u64,
    },
    /// Morphological closing.
    Closing {
        /// Element side length.
        kernel_size: u32,
        /// Edge pixels after closing.
        edge_pixel_count: u64,
    },
    /// Repeated 3x3 dilation.
    Dilation {
        /// Number of passes.
        iterations: u32,
        /// Edge pixels after dilation.
        edge_pixel_count: u64,
    },
    /// Contour extraction.
    ContourExtraction {
        /// Number of contours handed to selection.
        contour_count: usize,
        /// Total points across those contours.
        total_point_count: usize,
        /// Area of the largest contour.
        largest_area: f64,
    },
    /// Candidate selection.
    Selection {
        /// Contours examined.
        evaluated: usize,
        /// Contours rejected.
        rejected: usize,
        /// Rank of the chosen contour, if any.
        selected_rank: Option<usize>,
        /// Largest corner `|cos|` of the chosen quadrilateral.
        max_cosine: Option<f64>,
        /// Whether the fallback quadrilateral was used.
        fallback: bool,
    },
}

impl StageMetrics {
    /// Metrics for a preprocessing step given its output.
    #[must_use]
    pub fn for_step(step: &PreprocessStep, output: &GrayImage) -> Self {
        match *step {
            PreprocessStep::Blur { kernel_size } => Self::Blur {
                kernel_size,
                sigma: crate::blur::sigma_for_kernel(kernel_size),
            },
            PreprocessStep::Normalize => Self::Normalize {
                mean_intensity: mean_intensity(output),
            },
            PreprocessStep::Truncate { threshold } => Self::Truncate {
                threshold,
                mean_intensity: mean_intensity(output),
            },
            PreprocessStep::EdgeDetection { low, high } => Self::EdgeDetection {
                low_threshold: low,
                high_threshold: high,
                edge_pixel_count: count_edge_pixels(output),
                total_pixel_count: u64::from(output.width()) * u64::from(output.height()),
            },
            PreprocessStep::ThresholdToZero { cutoff } => Self::Threshold {
                cutoff,
                edge_pixel_count: count_edge_pixels(output),
            },
            PreprocessStep::Close { kernel_size } => Self::Closing {
                kernel_size,
                edge_pixel_count: count_edge_pixels(output),
            },
            PreprocessStep::Dilate { iterations } => Self::Dilation {
                iterations,
                edge_pixel_count: count_edge_pixels(output),
            },
        }
    }

    /// Display label for the report table.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "Resize",
            Self::Grayscale { .. } => "Grayscale",
            Self::Blur { .. } => "Blur",
            Self::Normalize { .. } => "Normalize",
            Self::Truncate { .. } => "Truncate",
            Self::EdgeDetection { .. } => "Edge Detection",
            Self::Threshold { .. } => "Threshold",
            Self::Closing { .. } => "Closing",
            Self::Dilation { .. } => "Dilation",
            Self::ContourExtraction { .. } => "Contour Extraction",
            Self::Selection { .. } => "Selection",
        }
    }
}

/// High-level summary of a detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Source image width in pixels.
    pub source_width: u32,
    /// Source image height in pixels.
    pub source_height: u32,
    /// Display-to-pixel scale factor.
    pub scale_factor: f64,
    /// Contours handed to selection.
    pub contour_count: usize,
    /// Whether the corners were detected or are the fallback.
    pub source: QuadSource,
}

impl DetectionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Detection Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Source: {}x{} (scale {:.4})",
            self.summary.source_width, self.summary.source_height, self.summary.scale_factor,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = std::iter::once(&self.resize)
            .chain(std::iter::once(&self.grayscale))
            .chain(&self.preprocess)
            .chain(std::iter::once(&self.contour_extraction))
            .chain(std::iter::once(&self.selection));

        for diag in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let name = diag.metrics.label();
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Contours: {}  |  Result: {:?}",
            self.summary.contour_count, self.summary.source,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Resize {
            source_width,
            source_height,
            width,
            height,
            resampled,
        } => {
            let note = if *resampled { "" } else { " (unchanged)" };
            format!("{source_width}x{source_height} -> {width}x{height}{note}")
        }
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Blur { kernel_size, sigma } => {
            format!("{kernel_size}x{kernel_size} sigma={sigma:.2}")
        }
        StageMetrics::Normalize { mean_intensity } => format!("mean={mean_intensity:.1}"),
        StageMetrics::Truncate {
            threshold,
            mean_intensity,
        } => format!("max={threshold} mean={mean_intensity:.1}"),
        StageMetrics::EdgeDetection {
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::Threshold {
            cutoff,
            edge_pixel_count,
        } => format!("cutoff={cutoff} edges={edge_pixel_count}"),
        StageMetrics::Closing {
            kernel_size,
            edge_pixel_count,
        } => format!("{kernel_size}x{kernel_size} edges={edge_pixel_count}"),
        StageMetrics::Dilation {
            iterations,
            edge_pixel_count,
        } => format!("x{iterations} edges={edge_pixel_count}"),
        StageMetrics::ContourExtraction {
            contour_count,
            total_point_count,
            largest_area,
        } => format!("{contour_count} contours, {total_point_count} pts, largest area={largest_area:.1}"),
        StageMetrics::Selection {
            evaluated,
            rejected,
            selected_rank,
            max_cosine,
            fallback,
        } => match (selected_rank, max_cosine) {
            (Some(rank), Some(cos)) => {
                format!("{evaluated} evaluated, {rejected} rejected, picked #{rank} (max |cos|={cos:.4})")
            }
            _ if *fallback => format!("{evaluated} evaluated, {rejected} rejected, fallback"),
            _ => format!("{evaluated} evaluated, {rejected} rejected"),
        },
    }
}

/// Run detection stage by stage, timing each transition with `clock`.
///
/// Returns every intermediate along with the diagnostics.
///
/// # Errors
///
/// Same as [`Pipeline::new`].
pub fn detect_with_diagnostics<C: Clock>(
    image: &DynamicImage,
    frame: FrameGeometry,
    config: &DetectConfig,
    clock: &C,
) -> Result<(StagedDetection, DetectionDiagnostics), PipelineError> {
    let start = clock.now();
    let pending = Pipeline::new(image, frame, config.clone())?;

    let t = clock.now();
    let resized = pending.resize();
    let resize = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: resized.metrics(),
    };

    let t = clock.now();
    let mut stage = resized.grayscale();
    let grayscale = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: stage.grayscale_metrics(),
    };

    let mut preprocess = Vec::new();
    while let Some(step) = stage.next_step() {
        let t = clock.now();
        stage = stage.apply_next();
        let duration = clock.elapsed(&t);
        preprocess.push(StageDiagnostics {
            duration,
            metrics: StageMetrics::for_step(&step, stage.current()),
        });
    }

    let t = clock.now();
    let extracted = stage.preprocess().extract_contours();
    let contour_extraction = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: extracted.metrics(),
    };

    let t = clock.now();
    let selected = extracted.select();
    let selection = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: selected.metrics(),
    };

    let staged = selected.into_result();
    let source = frame.source_dimensions();
    let diagnostics = DetectionDiagnostics {
        resize,
        grayscale,
        preprocess,
        contour_extraction,
        selection,
        total_duration: clock.elapsed(&start),
        summary: DetectionSummary {
            source_width: source.width,
            source_height: source.height,
            scale_factor: frame.scale_factor(),
            contour_count: staged.contours.len(),
            source: staged.detection.source,
        },
    };
    Ok((staged, diagnostics))
}
