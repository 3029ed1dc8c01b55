//! docquad: find the corners of a photographed document and flatten it.
//!
//! `detect` prints the four corners (display space, `TL TR BR BL`) and can
//! dump every intermediate raster for threshold tuning. `rectify` warps
//! the region inside the detected or supplied corners into an upright
//! image, optionally writing a thumbnail next to it.
//!
//! # Usage
//!
//! ```text
//! docquad detect photo.jpg --display 400x600 --diagnostics --dump-dir out/
//! docquad rectify photo.jpg -o page.png --corners 50,50,350,50,350,550,50,550
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `warn`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod io;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use docquad_pipeline::diagnostics::{Clock, DetectionDiagnostics};
use docquad_pipeline::{
    DetectConfig, Detection, DetectorKind, FallbackShape, FrameGeometry, Point, Quadrilateral,
    RectifyConfig, WarpInterpolation,
};
use image::DynamicImage;
use serde::Serialize;
use tracing::{info, warn};

use crate::io::CliError;

/// Document corner detection and perspective rectification.
#[derive(Parser)]
#[command(name = "docquad", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the four document corners and print them.
    Detect(DetectArgs),
    /// Detect (or take) corners and write the flattened document.
    Rectify(RectifyArgs),
}

/// Input image, display frame and detection tuning shared by both
/// subcommands.
#[derive(Args)]
struct InputArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Display frame as `WIDTHxHEIGHT`. Defaults to the image size
    /// (scale factor 1).
    #[arg(long, value_parser = parse_size)]
    display: Option<(u32, u32)>,

    /// Center-crop the image to the display frame's aspect ratio first.
    #[arg(long, requires = "display")]
    fit_frame: bool,

    /// Detection strategy.
    #[arg(long, value_enum, default_value_t = Detector::MultiStage)]
    detector: Detector,

    /// Canny low threshold.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Blur kernel side length (odd).
    #[arg(long, default_value_t = DetectConfig::DEFAULT_BLUR_KERNEL_SIZE)]
    blur_kernel: u32,

    /// Closing kernel side length.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_CLOSE_KERNEL_SIZE)]
    close_kernel: u32,

    /// Shape used when no candidate passes.
    #[arg(long, value_enum, default_value_t = Fallback::CenteredHalf)]
    fallback: Fallback,

    /// Full detection config as a JSON string.
    ///
    /// When provided, the individual tuning flags above are ignored.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct DetectArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Print the result (and diagnostics) as JSON.
    #[arg(long)]
    json: bool,

    /// Time every stage and print a per-stage report.
    #[arg(long)]
    diagnostics: bool,

    /// Number of runs for averaging stage timings (implies --diagnostics).
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Write every intermediate raster and `detection.json` here.
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

#[derive(Args)]
struct RectifyArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output path; the format follows the extension.
    #[arg(short, long)]
    output: PathBuf,

    /// Corners in display space as `x,y` pairs in `TL,TR,BR,BL` order.
    /// Detection is skipped when given.
    #[arg(long, value_delimiter = ',')]
    corners: Option<Vec<f64>>,

    /// Warp interpolation.
    #[arg(long, value_enum, default_value_t = Interp::Bilinear)]
    interpolation: Interp,

    /// Resize the flattened image to this width.
    #[arg(long)]
    width: Option<u32>,

    /// Resize the flattened image to this height.
    #[arg(long)]
    height: Option<u32>,

    /// Also write a thumbnail of the flattened image here.
    #[arg(long)]
    thumbnail: Option<PathBuf>,

    /// Longest side of the thumbnail in pixels.
    #[arg(long, default_value_t = 256)]
    thumbnail_size: u32,
}

/// Detection strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Detector {
    /// Blur, normalize, truncate, Canny, threshold, close; convex hulls.
    MultiStage,
    /// Light blur and a single Canny pass on raw contours.
    SimpleCanny,
    /// Heavy blur, dilation, convex near-rectangles by bounding box.
    Squares,
}

impl From<Detector> for DetectorKind {
    fn from(d: Detector) -> Self {
        match d {
            Detector::MultiStage => Self::MultiStage,
            Detector::SimpleCanny => Self::SimpleCanny,
            Detector::Squares => Self::Squares,
        }
    }
}

/// Fallback quadrilateral selection.
#[derive(Clone, Copy, ValueEnum)]
enum Fallback {
    /// Quarter to three-quarter rectangle of the frame.
    CenteredHalf,
    /// Square with side half the frame width, centered.
    CenteredSquare,
}

impl From<Fallback> for FallbackShape {
    fn from(f: Fallback) -> Self {
        match f {
            Fallback::CenteredHalf => Self::CenteredHalf,
            Fallback::CenteredSquare => Self::CenteredSquare,
        }
    }
}

/// Warp interpolation selection.
#[derive(Clone, Copy, ValueEnum)]
enum Interp {
    Nearest,
    Bilinear,
    Bicubic,
}

impl From<Interp> for WarpInterpolation {
    fn from(i: Interp) -> Self {
        match i {
            Interp::Nearest => Self::Nearest,
            Interp::Bilinear => Self::Bilinear,
            Interp::Bicubic => Self::Bicubic,
        }
    }
}

/// Parse `WIDTHxHEIGHT`.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width {w:?}: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height {h:?}: {e}"))?;
    Ok((w, h))
}

/// Build a [`DetectConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual tuning flags are ignored.
fn config_from_cli(input: &InputArgs) -> Result<DetectConfig, CliError> {
    let config = if let Some(ref json) = input.config_json {
        serde_json::from_str(json)
            .map_err(|e| CliError::Config(format!("error parsing --config-json: {e}")))?
    } else {
        DetectConfig {
            detector: input.detector.into(),
            canny_low: input.canny_low,
            canny_high: input.canny_high,
            blur_kernel_size: input.blur_kernel,
            close_kernel_size: input.close_kernel,
            fallback: input.fallback.into(),
            ..DetectConfig::default()
        }
    };
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config)
}

/// Load the image, optionally fit it to the display aspect ratio, and
/// build the frame geometry.
fn prepare_input(input: &InputArgs) -> Result<(DynamicImage, FrameGeometry), CliError> {
    let mut image = io::load_image(&input.image_path)?;
    let (display_width, display_height) = input
        .display
        .unwrap_or((image.width(), image.height()));
    if input.fit_frame {
        image = docquad_pipeline::frame::fit_to_aspect(&image, display_width, display_height);
        info!(
            width = image.width(),
            height = image.height(),
            "cropped to frame aspect"
        );
    }
    let frame = FrameGeometry::for_image(display_width, display_height, &image)?;
    Ok((image, frame))
}

/// JSON shape of `detect --json`.
#[derive(Serialize)]
struct DetectReport<'a> {
    detection: Detection,
    scale_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a DetectionDiagnostics>,
}

fn run_detect(args: &DetectArgs) -> Result<(), CliError> {
    let config = config_from_cli(&args.input)?;
    let (image, frame) = prepare_input(&args.input)?;

    let wants_diagnostics = args.diagnostics || args.runs > 1;
    let mut all_diagnostics = Vec::with_capacity(args.runs);
    let mut staged = None;
    if wants_diagnostics || args.dump_dir.is_some() {
        for _ in 0..args.runs {
            let (run, diagnostics) =
                docquad_pipeline::detect_with_diagnostics(&image, frame, &config, &StdClock)?;
            all_diagnostics.push(diagnostics);
            staged = Some(run);
        }
    }

    let detection = match &staged {
        Some(run) => run.detection,
        None => docquad_pipeline::detect_with_config(&image, &frame, &config)?,
    };

    if let (Some(dir), Some(run)) = (&args.dump_dir, &staged) {
        io::dump_intermediates(dir, run)?;
    }

    let last_diagnostics = all_diagnostics.last().filter(|_| wants_diagnostics);
    if args.json {
        let report = DetectReport {
            detection,
            scale_factor: frame.scale_factor(),
            diagnostics: last_diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(diagnostics) = last_diagnostics {
            println!("{}", diagnostics.report());
            println!();
        }
        print_detection(&detection);
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

fn print_detection(detection: &Detection) {
    let names = ["TL", "TR", "BR", "BL"];
    let corners: Vec<String> = names
        .iter()
        .zip(detection.quad.corners())
        .map(|(name, p)| format!("{name} {:.1},{:.1}", p.x, p.y))
        .collect();
    println!("{}  ({:?})", corners.join("  "), detection.source);
}

fn quad_from_flags(values: &[f64]) -> Result<Quadrilateral, CliError> {
    if values.len() != 8 {
        return Err(CliError::Config(format!(
            "--corners needs exactly 8 numbers, got {}",
            values.len()
        )));
    }
    let points: Vec<Point> = values
        .chunks_exact(2)
        .map(|xy| Point::new(xy[0], xy[1]))
        .collect();
    let corners: [Point; 4] = points
        .try_into()
        .map_err(|_| CliError::Config("--corners needs four x,y pairs".to_string()))?;
    Ok(Quadrilateral::from_ordered(corners))
}

fn run_rectify(args: &RectifyArgs) -> Result<(), CliError> {
    let (image, frame) = prepare_input(&args.input)?;

    let quad = if let Some(ref values) = args.corners {
        quad_from_flags(values)?
    } else {
        let config = config_from_cli(&args.input)?;
        let detection = docquad_pipeline::detect_with_config(&image, &frame, &config)?;
        if detection.source == docquad_pipeline::QuadSource::Fallback {
            warn!("no document found, rectifying the fallback quadrilateral");
        }
        detection.quad
    };

    let rectify_config = RectifyConfig {
        interpolation: args.interpolation.into(),
        target_width: args.width,
        target_height: args.height,
        ..RectifyConfig::default()
    };
    let flat = docquad_pipeline::rectify_with_config(&image, &quad, &frame, &rectify_config)?;
    io::write_image(&args.output, &flat)?;
    eprintln!(
        "wrote {} ({}x{})",
        args.output.display(),
        flat.width(),
        flat.height()
    );

    if let Some(ref thumb) = args.thumbnail {
        io::write_thumbnail(thumb, &flat, args.thumbnail_size)?;
        eprintln!("wrote thumbnail {}", thumb.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Detect(args) => run_detect(args),
        Command::Rectify(args) => run_rectify(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&DetectionDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[DetectionDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Resize", |d| d.resize.duration),
        ("Grayscale", |d| d.grayscale.duration),
        ("Preprocess", |d| d.preprocess.iter().map(|s| s.duration).sum()),
        ("Contour Extraction", |d| d.contour_extraction.duration),
        ("Selection", |d| d.selection.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
