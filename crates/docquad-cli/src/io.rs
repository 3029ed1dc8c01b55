//! Image source and output sink: everything that touches the filesystem.

use std::path::{Path, PathBuf};

use docquad_pipeline::pipeline::StagedDetection;
use docquad_pipeline::{PipelineError, ResizeFilter};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

/// Errors raised by the command-line front end.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The input could not be read or decoded.
    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An output image could not be encoded or written.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Detection or rectification rejected its inputs.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Flags or `--config-json` could not be turned into a configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Decode the image at `path`.
pub fn load_image(path: &Path) -> Result<DynamicImage, CliError> {
    let image = image::open(path).map_err(|source| CliError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded image"
    );
    Ok(image)
}

/// Encode `image` in the format implied by `path`'s extension and write it.
///
/// Formats without an alpha channel (JPEG, BMP) get an RGB copy.
pub fn write_image(path: &Path, image: &DynamicImage) -> Result<(), CliError> {
    let wrap = |source: image::ImageError| CliError::Write {
        path: path.to_path_buf(),
        source,
    };
    let format = ImageFormat::from_path(path).map_err(wrap)?;
    let result = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp if image.color().has_alpha() => {
            DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, format)
        }
        _ => image.save_with_format(path, format),
    };
    result.map_err(wrap)?;
    debug!(path = %path.display(), "wrote image");
    Ok(())
}

/// Shrink `image` to fit a `size` x `size` box and write it.
pub fn write_thumbnail(path: &Path, image: &DynamicImage, size: u32) -> Result<(), CliError> {
    let thumb = docquad_pipeline::resize::resize_to_fit(image, size, size, ResizeFilter::Triangle);
    write_image(path, &thumb)
}

/// Write every raster of a staged detection to `dir` as numbered PNGs,
/// plus the contours and selection details as `detection.json`.
pub fn dump_intermediates(dir: &Path, staged: &StagedDetection) -> Result<(), CliError> {
    std::fs::create_dir_all(dir)?;

    write_image(&dir.join("00-resized.png"), &staged.resized)?;
    write_image(
        &dir.join("01-grayscale.png"),
        &DynamicImage::ImageLuma8(staged.gray.clone()),
    )?;
    for (i, stage) in staged.intermediates.iter().enumerate() {
        let name = format!("{:02}-{}.png", i + 2, stage.step.name());
        write_image(
            &dir.join(name),
            &DynamicImage::ImageLuma8(stage.image.clone()),
        )?;
    }

    let json = serde_json::to_string_pretty(staged)?;
    std::fs::write(dir.join("detection.json"), json)?;

    info!(
        dir = %dir.display(),
        rasters = staged.intermediates.len() + 2,
        "dumped intermediates"
    );
    Ok(())
}
