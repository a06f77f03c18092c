//! Shared types for the flatslice tracing pipeline.

use serde::{Deserialize, Serialize};

use crate::contour::ContourTracerKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Vector from `other` to `self`.
    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    /// Z component of the 2D cross product `self × other`.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x.mul_add(other.y, -(self.y * other.x))
    }

    /// Length of this point interpreted as a vector.
    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// A closed contour: an ordered point sequence whose last point equals
/// its first.
///
/// Polygons produced by the tracer always hold at least three distinct
/// points plus the closing duplicate. Simplification replaces a polygon
/// with a reduced one that keeps both endpoints, so closure survives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a polygon from a point sequence.
    ///
    /// The caller is responsible for closure; see [`is_closed`](Self::is_closed).
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of points, including the closing duplicate.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// `true` when the first and last points are equal and there are at
    /// least three distinct points before the closing duplicate.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.len() >= 4 && self.0.first() == self.0.last()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Classification of one cell in a [`PixelGrid`](crate::grid::PixelGrid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelState {
    /// Light pixel (gray level above the threshold), including the border.
    Background,
    /// Dark pixel (gray level at or below the threshold).
    Foreground,
    /// Background pixel 8-adjacent to at least one foreground pixel.
    Boundary,
    /// Boundary pixel consumed by a completed trace.
    Visited,
}

/// Configuration for turning an image into polygons.
///
/// Values are resolved once by the caller; the pipeline never looks up
/// settings by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Image resolution in dots per inch, used for the pixel to
    /// millimetre scale.
    pub dpi: f64,

    /// Ramer-Douglas-Peucker tolerance in pixels.
    pub simplify_tolerance: f64,

    /// Width of the background margin padded around the image, in pixels.
    pub border: u32,

    /// Gray levels at or below this value are foreground.
    pub threshold: u8,

    /// Which contour tracing algorithm to use.
    pub contour_tracer: ContourTracerKind,
}

impl PipelineConfig {
    /// Default image resolution.
    pub const DEFAULT_DPI: f64 = 300.0;
    /// Default simplification tolerance in pixels.
    pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.5;
    /// Default margin around the image.
    pub const DEFAULT_BORDER: u32 = 10;
    /// Default foreground threshold.
    pub const DEFAULT_THRESHOLD: u8 = 127;

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `dpi` is not a positive
    /// finite number or `simplify_tolerance` is negative or not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "dpi must be positive, got {}",
                self.dpi
            )));
        }
        if !(self.simplify_tolerance.is_finite() && self.simplify_tolerance >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "simplify_tolerance must be non-negative, got {}",
                self.simplify_tolerance
            )));
        }
        Ok(())
    }

    /// Millimetres per pixel at the configured resolution.
    #[must_use]
    pub fn pixel_to_mm(&self) -> f64 {
        25.4 / self.dpi
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: Self::DEFAULT_DPI,
            simplify_tolerance: Self::DEFAULT_SIMPLIFY_TOLERANCE,
            border: Self::DEFAULT_BORDER,
            threshold: Self::DEFAULT_THRESHOLD,
            contour_tracer: ContourTracerKind::default(),
        }
    }
}

/// Errors that can occur while loading and tracing an image.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The source file could not be read.
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The caller cancelled the run; partial results were discarded.
    #[error("processing was cancelled")]
    Cancelled,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance_squared() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_cross_is_signed_area() {
        let a = Point::new(1.0, 0.0);
        let b = Point::new(0.0, 1.0);
        assert!((a.cross(b) - 1.0).abs() < f64::EPSILON);
        assert!((b.cross(a) + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn polygon_closure() {
        let open = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        assert!(!open.is_closed());

        let closed = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ]);
        assert!(closed.is_closed());
    }

    #[test]
    fn two_point_loop_is_not_closed() {
        let pl = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
        ]);
        assert!(!pl.is_closed());
    }

    #[test]
    fn config_defaults() {
        let config = PipelineConfig::default();
        assert!((config.dpi - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.border, 10);
        assert_eq!(config.threshold, 127);
        assert!((config.pixel_to_mm() - 25.4 / 300.0).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_values() {
        let config = PipelineConfig {
            dpi: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let config = PipelineConfig {
            simplify_tolerance: f64::NAN,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"dpi": 96.0}"#).unwrap();
        assert!((config.dpi - 96.0).abs() < f64::EPSILON);
        assert_eq!(config.border, PipelineConfig::DEFAULT_BORDER);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::Cancelled.to_string(),
            "processing was cancelled"
        );
    }
}
