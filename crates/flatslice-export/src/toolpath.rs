//! Toolpath generation: polygons to a [`LaserJob`].
//!
//! Two toolpaths are produced, both in image pixel coordinates:
//!
//! - **Outline**: every polygon perimeter in trace order. Travel to the
//!   first point, burn to each following point including the closing
//!   duplicate, then switch the laser off.
//! - **Infill**: horizontal scanlines across the union bounding box of
//!   all polygons, intersected with polygon edges and paired under the
//!   even-odd rule. The resulting fill segments are stitched greedily,
//!   always continuing with the nearest unburned segment end.
//!
//! [`generate`] wraps both in a header and footer and converts the job
//! to machine coordinates.

use flatslice_pipeline::{BoundingBox, Point, Polygon};
use rayon::prelude::*;

use crate::command::Unit;
use crate::config::{InfillSettings, JobConfig};
use crate::job::{JobError, LaserJob, Target};

/// A horizontal fill span at one scanline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillSegment {
    /// End reached first in scan order.
    pub start: Point,
    /// Other end.
    pub end: Point,
}

/// Build the complete job for `polygons`.
///
/// Passes with a count of zero are not generated. `image_height_px` and
/// `pixel_to_mm` place the pixel-space toolpaths in the machine frame.
///
/// # Errors
///
/// Returns [`JobError::InvalidConfig`] if `config` fails validation or
/// `pixel_to_mm` is not a positive finite number.
pub fn generate(
    polygons: &[Polygon],
    image_height_px: u32,
    pixel_to_mm: f64,
    config: &JobConfig,
) -> Result<LaserJob, JobError> {
    if !(pixel_to_mm.is_finite() && pixel_to_mm > 0.0) {
        return Err(JobError::InvalidConfig(format!(
            "pixel_to_mm must be positive, got {pixel_to_mm}"
        )));
    }
    let height = f64::from(image_height_px);
    let mut job = LaserJob::new(config.clone())?;

    job.begin_header()?;
    job.move_to(Target::xyz(0.0, 0.0, 0.0), Unit::Millimeter, false)?;

    if config.outline.passes > 0 {
        job.begin_outline()?;
        outline(&mut job, polygons)?;
        tracing::info!(
            "outline: {} polygons, {} passes",
            polygons.len(),
            config.outline.passes
        );
    }

    if config.infill.passes > 0 {
        job.begin_infill()?;
        let segments = fill_segments(polygons, config.infill.line_spacing / pixel_to_mm);
        let origin = Point::new(0.0, height);
        stitch(&mut job, &segments, origin, &config.infill, config.machine.min_travel, pixel_to_mm)?;
        tracing::info!(
            "infill: {} segments, {} passes",
            segments.len(),
            config.infill.passes
        );
    }

    job.end()?;
    job.apply(height, pixel_to_mm);
    Ok(job)
}

/// Burn every polygon perimeter in order.
///
/// # Errors
///
/// Returns [`JobError::InvalidPhase`] unless the job is in the outline
/// or infill phase.
pub fn outline(job: &mut LaserJob, polygons: &[Polygon]) -> Result<(), JobError> {
    for polygon in polygons {
        let Some((first, rest)) = polygon.points().split_first() else {
            continue;
        };
        job.travel(Target::from(*first), Unit::Pixel)?;
        for &point in rest {
            job.burn(Target::from(point), Unit::Pixel)?;
        }
        job.power_off()?;
    }
    Ok(())
}

/// Fill segments for every scanline, `spacing` pixels apart.
///
/// Scanlines sit at the middle of `floor(height / spacing)` equal bands
/// across the union bounding box. Intersections are sorted ascending on
/// even scanlines and descending on odd ones, then paired.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fill_segments(polygons: &[Polygon], spacing: f64) -> Vec<FillSegment> {
    let boxes: Vec<Option<BoundingBox>> = polygons
        .par_iter()
        .map(|p| BoundingBox::of(p.points()))
        .collect();
    let Some(union) = boxes.iter().flatten().copied().reduce(BoundingBox::union) else {
        return Vec::new();
    };
    if !(spacing.is_finite() && spacing > 0.0) {
        return Vec::new();
    }

    let lines = (union.height() / spacing).floor() as usize;
    if lines == 0 {
        return Vec::new();
    }
    let step = union.height() / lines as f64;

    let mut segments = Vec::new();
    let mut xs = Vec::new();
    for i in 0..lines {
        let y = (i as f64 + 0.5).mul_add(step, union.min.y);
        xs.clear();
        for (polygon, bbox) in polygons.iter().zip(&boxes) {
            if bbox.is_some_and(|b| b.spans_y(y)) {
                scanline_intersections(polygon.points(), y, &mut xs);
            }
        }

        xs.sort_by(f64::total_cmp);
        if i % 2 == 1 {
            xs.reverse();
        }
        segments.extend(xs.chunks_exact(2).map(|pair| FillSegment {
            start: Point::new(pair[0], y),
            end: Point::new(pair[1], y),
        }));
    }
    segments
}

/// Append the x positions where the horizontal line at `y` crosses the
/// edges of `points`.
///
/// Horizontal edges are skipped. Each edge covers `y` half-open, lower
/// end included and upper end excluded, so a vertex shared by two edges
/// is counted once.
pub fn scanline_intersections(points: &[Point], y: f64, out: &mut Vec<f64>) {
    for edge in points.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        if a.y == b.y {
            continue;
        }
        let (lo, hi) = if a.y < b.y { (a.y, b.y) } else { (b.y, a.y) };
        if y < lo || y >= hi {
            continue;
        }
        let t = (y - a.y) / (b.y - a.y);
        out.push(t.mul_add(b.x - a.x, a.x));
    }
}

/// Burn `segments` in greedy nearest-neighbour order starting at `from`.
///
/// The search for the next segment stops early at any end closer than
/// `settings.good_enough`. Gaps longer than `min_travel` (mm) are
/// travelled with the laser at minimum power; shorter gaps are burned
/// through.
///
/// # Errors
///
/// Returns [`JobError::InvalidPhase`] unless the job is in the outline
/// or infill phase.
pub fn stitch(
    job: &mut LaserJob,
    segments: &[FillSegment],
    from: Point,
    settings: &InfillSettings,
    min_travel: f64,
    pixel_to_mm: f64,
) -> Result<(), JobError> {
    let good_enough_sq = (settings.good_enough / pixel_to_mm).powi(2);
    let min_travel_sq = (min_travel / pixel_to_mm).powi(2);

    let mut consumed = vec![false; segments.len()];
    let mut current = from;
    for _ in 0..segments.len() {
        let Some((index, reversed, distance_sq)) =
            nearest(segments, &consumed, current, good_enough_sq)
        else {
            break;
        };
        consumed[index] = true;

        let segment = segments[index];
        let (near, far) = if reversed {
            (segment.end, segment.start)
        } else {
            (segment.start, segment.end)
        };
        if distance_sq > min_travel_sq {
            job.travel(Target::from(near), Unit::Pixel)?;
        } else {
            job.burn(Target::from(near), Unit::Pixel)?;
        }
        job.burn(Target::from(far), Unit::Pixel)?;
        current = far;
    }
    if !segments.is_empty() {
        job.power_off()?;
    }
    Ok(())
}

/// Index of the unconsumed segment with the end nearest `to`, whether
/// that end is its `end` rather than its `start`, and the squared
/// distance.
fn nearest(
    segments: &[FillSegment],
    consumed: &[bool],
    to: Point,
    good_enough_sq: f64,
) -> Option<(usize, bool, f64)> {
    let mut best: Option<(usize, bool, f64)> = None;
    for (i, segment) in segments.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        for (reversed, end) in [(false, segment.start), (true, segment.end)] {
            let d = to.distance_squared(end);
            if best.is_none_or(|(_, _, best_d)| d < best_d) {
                best = Some((i, reversed, d));
            }
        }
        if best.is_some_and(|(_, _, d)| d < good_enough_sq) {
            break;
        }
    }
    best
}
