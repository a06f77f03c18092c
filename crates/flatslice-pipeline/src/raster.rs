//! A loaded raster image and the polygons traced from it.

use std::path::{Path, PathBuf};

use crate::binarize;
use crate::cancel::CancelFlag;
use crate::contour::ContourTracer;
use crate::diagnostics::{
    Clock, StageDiagnostics, StageMetrics, TraceDiagnostics, TraceSummary, duration_ms,
    polygon_stats, reduction_ratio, total_points,
};
use crate::grid::PixelGrid;
use crate::outline;
use crate::resolution::Resolution;
use crate::simplify;
use crate::types::{Dimensions, PipelineConfig, PipelineError, PixelState, Polygon};

/// An image thresholded into a padded grid, plus the polygons traced
/// from it once [`trace`](Self::trace) has run.
///
/// Tracing happens at most once per image: it consumes the boundary
/// pixels, leaving them [`PixelState::Visited`] in the grid.
#[derive(Debug, Clone)]
pub struct RasterImage {
    source: Option<PathBuf>,
    grid: PixelGrid,
    polygons: Vec<Polygon>,
    config: PipelineConfig,
    resolution: Option<Resolution>,
    traced: bool,
    diagnostics: TraceDiagnostics,
}

impl RasterImage {
    /// Read and binarize the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read, and
    /// anything [`from_bytes`](Self::from_bytes) returns.
    pub fn load(
        path: impl AsRef<Path>,
        config: &PipelineConfig,
        clock: &impl Clock,
    ) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mut image = Self::from_bytes(&bytes, config, clock)?;
        tracing::info!("loaded image from {}", path.display());
        image.source = Some(path.to_path_buf());
        Ok(image)
    }

    /// Decode and binarize in-memory image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// validation, [`PipelineError::EmptyInput`] for empty input, and
    /// [`PipelineError::ImageDecode`] for unreadable image data.
    pub fn from_bytes(
        bytes: &[u8],
        config: &PipelineConfig,
        clock: &impl Clock,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let start = clock.now();
        let decoded = binarize::decode(bytes)?;
        let dimensions = decoded.dimensions();
        let decode = StageDiagnostics {
            duration: clock.elapsed(&start),
            metrics: StageMetrics::Decode {
                input_bytes: bytes.len(),
                width: dimensions.width,
                height: dimensions.height,
                image_dpi: decoded.resolution.and_then(|r| r.dpi()),
            },
        };

        let start = clock.now();
        let grid = binarize::binarize(&decoded.image, config.threshold, config.border);
        let binarize = StageDiagnostics {
            duration: clock.elapsed(&start),
            metrics: StageMetrics::Binarize {
                threshold: config.threshold,
                border: config.border,
                foreground_pixels: grid.count(PixelState::Foreground),
            },
        };

        let summary = TraceSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: u64::from(dimensions.width) * u64::from(dimensions.height),
            ..TraceSummary::default()
        };

        Ok(Self {
            source: None,
            grid,
            polygons: Vec::new(),
            config: config.clone(),
            resolution: decoded.resolution,
            traced: false,
            diagnostics: TraceDiagnostics::new(decode, binarize, summary),
        })
    }

    /// Classify boundary pixels and trace them into polygons.
    ///
    /// Calling this again after a successful trace does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if `cancel` fires. The image is
    /// left untouched in that case and may be traced again.
    pub fn trace(&mut self, cancel: &CancelFlag, clock: &impl Clock) -> Result<(), PipelineError> {
        if self.traced {
            tracing::debug!("image already traced");
            return Ok(());
        }

        let start = clock.now();
        let mut classified = outline::extract_boundary(&self.grid, cancel)?;
        let outline = StageDiagnostics {
            duration: clock.elapsed(&start),
            metrics: StageMetrics::Outline {
                boundary_pixels: classified.count(PixelState::Boundary),
            },
        };

        let start = clock.now();
        let output = self.config.contour_tracer.trace(&classified, cancel)?;
        output.visited.commit(&mut classified);
        let duration = clock.elapsed(&start);

        let stats = polygon_stats(&output.polygons);
        let tracing_stage = StageDiagnostics {
            duration,
            metrics: StageMetrics::ContourTracing {
                polygon_count: output.polygons.len(),
                total_point_count: stats.total,
                min_polygon_points: stats.min,
                max_polygon_points: stats.max,
                mean_polygon_points: stats.mean,
                traces_started: output.stats.traces_started,
                degenerate_discarded: output.stats.degenerate_discarded,
                forced_closures: output.stats.forced_closures,
            },
        };

        tracing::info!(
            "image {} converted in {:.2} ms: {} polygons",
            self.name(),
            duration_ms(outline.duration + duration),
            output.polygons.len(),
        );

        self.grid = classified;
        self.polygons = output.polygons;
        self.traced = true;
        self.diagnostics.record_outline(outline);
        self.diagnostics
            .record_tracing(tracing_stage, &self.polygons);
        Ok(())
    }

    /// Replace every polygon with its RDP simplification.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a negative or
    /// non-finite `epsilon`, and [`PipelineError::Cancelled`] if `cancel`
    /// fires, leaving the polygons unchanged.
    pub fn simplify(
        &mut self,
        epsilon: f64,
        cancel: &CancelFlag,
        clock: &impl Clock,
    ) -> Result<(), PipelineError> {
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "simplify tolerance must be non-negative, got {epsilon}"
            )));
        }

        let start = clock.now();
        let before = total_points(&self.polygons);
        let simplified = simplify::simplify_all(&self.polygons, epsilon, cancel)?;
        let after = total_points(&simplified);
        let stage = StageDiagnostics {
            duration: clock.elapsed(&start),
            metrics: StageMetrics::Simplification {
                tolerance: epsilon,
                points_before: before,
                points_after: after,
                reduction_ratio: reduction_ratio(before, after),
            },
        };
        tracing::info!(
            "simplified {} polygons in {:.2} ms: {before} -> {after} points",
            simplified.len(),
            duration_ms(stage.duration),
        );

        self.polygons = simplified;
        self.diagnostics
            .record_simplification(stage, &self.polygons);
        Ok(())
    }

    /// The file this image was loaded from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The padded grid. After tracing, consumed boundary pixels read as
    /// [`PixelState::Visited`].
    #[must_use]
    pub const fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Traced polygons in image pixel coordinates. Empty before tracing.
    #[must_use]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Whether [`trace`](Self::trace) has completed.
    #[must_use]
    pub const fn is_traced(&self) -> bool {
        self.traced
    }

    /// Source image dimensions, without the border.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.grid.image_dimensions()
    }

    /// Resolution used for the pixel to millimetre scale.
    #[must_use]
    pub const fn dpi(&self) -> f64 {
        self.config.dpi
    }

    /// Millimetres per pixel.
    #[must_use]
    pub fn pixel_to_mm(&self) -> f64 {
        self.config.pixel_to_mm()
    }

    /// Resolution stored in the image metadata, if any.
    #[must_use]
    pub const fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Metadata resolution in DPI when it has a usable unit. Advisory
    /// only: nothing applies it unless the caller asks.
    #[must_use]
    pub fn image_dpi(&self) -> Option<f64> {
        self.resolution.and_then(|r| r.dpi())
    }

    /// Override the configured resolution.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `dpi` is not a positive
    /// finite number.
    pub fn set_dpi(&mut self, dpi: f64) -> Result<(), PipelineError> {
        let config = PipelineConfig {
            dpi,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Switch to the metadata resolution if there is a usable one.
    /// Returns the resolution now in effect.
    pub fn use_image_dpi(&mut self) -> f64 {
        if let Some(dpi) = self.image_dpi() {
            tracing::info!("using image resolution of {dpi:.1} dpi");
            self.config.dpi = dpi;
        }
        self.config.dpi
    }

    /// Diagnostics for the stages run so far.
    #[must_use]
    pub const fn diagnostics(&self) -> &TraceDiagnostics {
        &self.diagnostics
    }

    fn name(&self) -> String {
        self.source
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(|| "<memory>".to_owned(), |n| n.to_string_lossy().into_owned())
    }
}
