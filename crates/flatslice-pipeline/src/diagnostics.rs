//! Pipeline diagnostics: timing and counts for each stage.
//!
//! Every [`RasterImage`](crate::RasterImage) collects diagnostics as its
//! stages run. Timestamps come from a caller-supplied [`Clock`], so the
//! core makes no assumption about the platform timer.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Polygon;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
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

/// Diagnostics collected while loading, tracing and simplifying one
/// image.
///
/// Decode and binarize always run at load time. The later stages are
/// `None` until they have been executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceDiagnostics {
    /// Image decoding.
    pub decode: StageDiagnostics,
    /// Thresholding into the padded grid.
    pub binarize: StageDiagnostics,
    /// Boundary pixel classification.
    pub outline: Option<StageDiagnostics>,
    /// Contour tracing.
    pub contour_tracing: Option<StageDiagnostics>,
    /// RDP simplification.
    pub simplification: Option<StageDiagnostics>,
    /// Sum of all executed stage durations (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: TraceSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Resolution found in the image metadata, if usable.
        image_dpi: Option<f64>,
    },
    /// Binarization metrics.
    Binarize {
        /// Foreground threshold.
        threshold: u8,
        /// Margin added on every side.
        border: u32,
        /// Number of foreground pixels.
        foreground_pixels: usize,
    },
    /// Boundary classification metrics.
    Outline {
        /// Number of boundary pixels found.
        boundary_pixels: usize,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Number of polygons kept.
        polygon_count: usize,
        /// Total number of points across all polygons.
        total_point_count: usize,
        /// Minimum points in any single polygon.
        min_polygon_points: usize,
        /// Maximum points in any single polygon.
        max_polygon_points: usize,
        /// Mean points per polygon.
        mean_polygon_points: f64,
        /// Seeds that started a trace.
        traces_started: usize,
        /// Traces dropped as degenerate.
        degenerate_discarded: usize,
        /// Traces closed by force after backtracking.
        forced_closures: usize,
    },
    /// Simplification metrics.
    Simplification {
        /// RDP tolerance in pixels.
        tolerance: f64,
        /// Total points before simplification.
        points_before: usize,
        /// Total points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
}

/// High-level summary counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of polygons currently held.
    pub polygon_count: usize,
    /// Points across all polygons currently held.
    pub final_point_count: usize,
}

impl TraceDiagnostics {
    /// Diagnostics for a freshly loaded image.
    #[must_use]
    pub fn new(decode: StageDiagnostics, binarize: StageDiagnostics, summary: TraceSummary) -> Self {
        let total_duration = decode.duration + binarize.duration;
        Self {
            decode,
            binarize,
            outline: None,
            contour_tracing: None,
            simplification: None,
            total_duration,
            summary,
        }
    }

    /// Record the outline stage.
    pub fn record_outline(&mut self, stage: StageDiagnostics) {
        self.total_duration += stage.duration;
        self.outline = Some(stage);
    }

    /// Record the tracing stage and refresh the polygon summary.
    pub fn record_tracing(&mut self, stage: StageDiagnostics, polygons: &[Polygon]) {
        self.total_duration += stage.duration;
        self.contour_tracing = Some(stage);
        self.update_polygons(polygons);
    }

    /// Record the simplification stage and refresh the polygon summary.
    pub fn record_simplification(&mut self, stage: StageDiagnostics, polygons: &[Polygon]) {
        self.total_duration += stage.duration;
        self.simplification = Some(stage);
        self.update_polygons(polygons);
    }

    fn update_polygons(&mut self, polygons: &[Polygon]) {
        self.summary.polygon_count = polygons.len();
        self.summary.final_point_count = total_points(polygons);
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Trace Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
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
        let stages = [
            ("Decode", Some(&self.decode)),
            ("Binarize", Some(&self.binarize)),
            ("Outline", self.outline.as_ref()),
            ("Contour Tracing", self.contour_tracing.as_ref()),
            ("Simplification", self.simplification.as_ref()),
        ];

        for (name, diag) in stages {
            let Some(diag) = diag else { continue };
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Polygons: {}  |  Points: {}",
            self.summary.polygon_count, self.summary.final_point_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            image_dpi,
        } => match image_dpi {
            Some(dpi) => format!("{input_bytes} bytes -> {width}x{height} @ {dpi:.1}dpi"),
            None => format!("{input_bytes} bytes -> {width}x{height}"),
        },
        StageMetrics::Binarize {
            threshold,
            border,
            foreground_pixels,
        } => format!("threshold={threshold} border={border} foreground={foreground_pixels}"),
        StageMetrics::Outline { boundary_pixels } => format!("boundary={boundary_pixels}"),
        StageMetrics::ContourTracing {
            polygon_count,
            total_point_count,
            min_polygon_points,
            max_polygon_points,
            mean_polygon_points,
            traces_started,
            degenerate_discarded,
            forced_closures,
        } => format!(
            "{polygon_count}/{traces_started} polygons, {total_point_count} pts (min={min_polygon_points} max={max_polygon_points} mean={mean_polygon_points:.1}) degenerate={degenerate_discarded} forced={forced_closures}",
        ),
        StageMetrics::Simplification {
            tolerance,
            points_before,
            points_after,
            reduction_ratio,
        } => format!(
            "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
            reduction_ratio * 100.0,
        ),
    }
}

/// Statistics for a set of polygons.
pub(crate) struct PolygonStats {
    pub total: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

/// Compute point-count statistics for a set of polygons.
pub(crate) fn polygon_stats(polygons: &[Polygon]) -> PolygonStats {
    let total = total_points(polygons);
    let min = polygons.iter().map(Polygon::len).min().unwrap_or(0);
    let max = polygons.iter().map(Polygon::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if polygons.is_empty() {
        0.0
    } else {
        total as f64 / polygons.len() as f64
    };
    PolygonStats {
        total,
        min,
        max,
        mean,
    }
}

/// Total points across a slice of polygons.
pub(crate) fn total_points(polygons: &[Polygon]) -> usize {
    polygons.iter().map(Polygon::len).sum()
}

/// `1.0 - after / before`, or 0.0 when there was nothing to reduce.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn reduction_ratio(before: usize, after: usize) -> f64 {
    if before == 0 {
        0.0
    } else {
        1.0 - after as f64 / before as f64
    }
}
