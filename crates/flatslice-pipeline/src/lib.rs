//! flatslice-pipeline: raster image to closed polygons (sans-IO core).
//!
//! Converts raster images into closed vector contours through:
//! decode -> binarize -> boundary extraction -> contour tracing ->
//! simplification.
//!
//! Everything except [`RasterImage::load`] operates on in-memory byte
//! slices. Turning polygons into machine commands lives in
//! `flatslice-export`.

pub mod binarize;
pub mod cancel;
pub mod contour;
pub mod diagnostics;
pub mod geometry;
pub mod grid;
pub mod outline;
pub mod raster;
pub mod resolution;
pub mod simplify;
pub mod types;

pub use cancel::CancelFlag;
pub use contour::{ContourTracer, ContourTracerKind};
pub use diagnostics::{Clock, TraceDiagnostics};
pub use geometry::BoundingBox;
pub use grid::PixelGrid;
pub use raster::RasterImage;
pub use resolution::{Resolution, ResolutionUnit};
pub use types::{Dimensions, PipelineConfig, PipelineError, PixelState, Point, Polygon};

/// Run the full pipeline on raw image bytes.
///
/// Decodes, traces and simplifies with `config.simplify_tolerance`.
/// An image with no foreground yields an empty polygon set, not an
/// error.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::Cancelled`] if `cancel` fires.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
    cancel: &CancelFlag,
    clock: &impl Clock,
) -> Result<RasterImage, PipelineError> {
    let mut image = RasterImage::from_bytes(image_bytes, config, clock)?;
    image.trace(cancel, clock)?;
    image.simplify(config.simplify_tolerance, cancel, clock)?;
    Ok(image)
}
