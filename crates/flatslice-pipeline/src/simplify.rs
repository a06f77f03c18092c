//! Polygon simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! The algorithm runs iteratively over an explicit stack of index ranges
//! and an inclusion mask, so it never recurses. Points whose perpendicular
//! distance to the governing chord is not strictly greater than epsilon
//! are dropped. In particular, an epsilon of 0.0 still removes exactly
//! collinear points.
//!
//! The batch form copies every polygon into one flat point buffer with
//! per-polygon index ranges and simplifies the ranges in parallel.

use std::ops::Range;

use rayon::prelude::*;

use crate::cancel::CancelFlag;
use crate::geometry::perpendicular_distance;
use crate::types::{PipelineError, Point, Polygon};

/// Simplify a single polygon.
///
/// Both endpoints are always retained, so a closed polygon stays closed.
/// Sequences with fewer than 3 points are returned unchanged.
#[must_use = "returns the simplified polygon"]
pub fn simplify(polygon: &Polygon, epsilon: f64) -> Polygon {
    let points = polygon.points();
    let mut keep = vec![true; points.len()];
    rdp_mask(points, epsilon, &mut keep);
    Polygon::new(retained(points, &keep))
}

/// Simplify every polygon against one flattened point buffer.
///
/// # Errors
///
/// Returns [`PipelineError::Cancelled`] if `cancel` fires; no partial
/// result is returned.
pub fn simplify_all(
    polygons: &[Polygon],
    epsilon: f64,
    cancel: &CancelFlag,
) -> Result<Vec<Polygon>, PipelineError> {
    let arena = PointArena::from_polygons(polygons);
    let mut keep = vec![true; arena.points.len()];

    let mut jobs: Vec<(&[Point], &mut [bool])> = Vec::with_capacity(arena.ranges.len());
    let mut rest = keep.as_mut_slice();
    for range in &arena.ranges {
        let (mask, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
        jobs.push((&arena.points[range.clone()], mask));
        rest = tail;
    }

    jobs.into_par_iter().try_for_each(|(points, mask)| {
        cancel.check()?;
        rdp_mask(points, epsilon, mask);
        Ok::<(), PipelineError>(())
    })?;

    Ok(arena
        .ranges
        .iter()
        .map(|range| {
            Polygon::new(retained(
                &arena.points[range.clone()],
                &keep[range.clone()],
            ))
        })
        .collect())
}

/// All polygon points back to back, with the range each polygon owns.
struct PointArena {
    points: Vec<Point>,
    ranges: Vec<Range<usize>>,
}

impl PointArena {
    fn from_polygons(polygons: &[Polygon]) -> Self {
        let total = polygons.iter().map(Polygon::len).sum();
        let mut points = Vec::with_capacity(total);
        let mut ranges = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            let start = points.len();
            points.extend_from_slice(polygon.points());
            ranges.push(start..points.len());
        }
        Self { points, ranges }
    }
}

fn retained(points: &[Point], keep: &[bool]) -> Vec<Point> {
    points
        .iter()
        .zip(keep)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Clear `keep` for every point RDP discards. `keep` must start all
/// `true` and be as long as `points`.
fn rdp_mask(points: &[Point], epsilon: f64, keep: &mut [bool]) {
    debug_assert!(
        epsilon.is_finite() && epsilon >= 0.0,
        "epsilon must be finite and non-negative, got {epsilon}"
    );
    debug_assert_eq!(points.len(), keep.len());
    if points.len() < 3 {
        return;
    }

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut max_idx = start;
        for i in (start + 1)..end {
            if keep[i] {
                let d = perpendicular_distance(points[i], points[start], points[end]);
                if d > max_dist {
                    max_dist = d;
                    max_idx = i;
                }
            }
        }

        if max_dist > epsilon {
            stack.push((start, max_idx));
            stack.push((max_idx, end));
        } else {
            keep[(start + 1)..end].fill(false);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn polygon(coords: &[(f64, f64)]) -> Polygon {
        Polygon::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn short_sequences_unchanged() {
        assert!(simplify(&polygon(&[]), 1.0).is_empty());
        assert_eq!(simplify(&polygon(&[(1.0, 2.0)]), 1.0).len(), 1);
        assert_eq!(simplify(&polygon(&[(0.0, 0.0), (9.0, 0.0)]), 1.0).len(), 2);
    }

    #[test]
    fn zero_epsilon_still_drops_collinear_points() {
        let result = simplify(&polygon(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]), 0.0);
        assert_eq!(result, polygon(&[(0.0, 0.0), (3.0, 0.0)]));
    }

    #[test]
    fn zero_epsilon_keeps_off_line_points() {
        let input = polygon(&[(0.0, 0.0), (1.0, 0.1), (2.0, 0.0), (3.0, 0.05), (4.0, 0.0)]);
        assert_eq!(simplify(&input, 0.0).len(), 5);
    }

    #[test]
    fn closed_square_keeps_its_corners() {
        let square = polygon(&[
            (-1.0, -1.0),
            (4.0, -1.0),
            (10.0, -1.0),
            (10.0, 10.0),
            (-1.0, 10.0),
            (-1.0, 3.0),
            (-1.0, -1.0),
        ]);
        let result = simplify(&square, 0.5);
        assert_eq!(
            result,
            polygon(&[
                (-1.0, -1.0),
                (10.0, -1.0),
                (10.0, 10.0),
                (-1.0, 10.0),
                (-1.0, -1.0)
            ])
        );
        assert!(result.is_closed());
    }

    #[test]
    fn zigzag_retains_peaks_below_epsilon() {
        let zigzag = polygon(&[(0.0, 0.0), (2.0, 5.0), (4.0, 0.0), (6.0, 5.0), (8.0, 0.0)]);
        assert_eq!(simplify(&zigzag, 1.0).len(), 5);
        assert_eq!(simplify(&zigzag, 10.0).len(), 2);
    }

    #[test]
    fn dropped_points_are_within_epsilon_of_kept_chord() {
        let input = polygon(&[
            (0.0, 0.0),
            (1.0, 0.3),
            (2.0, -0.2),
            (3.0, 2.0),
            (4.0, 2.4),
            (5.0, 1.9),
            (6.0, 0.0),
        ]);
        let epsilon = 0.5;
        let result = simplify(&input, epsilon);
        let kept = result.points();

        assert_eq!(kept.first(), input.first());
        assert_eq!(kept.last(), input.last());
        assert!(kept.len() <= input.len());

        // Each dropped point lies between two consecutive kept points.
        for pair in kept.windows(2) {
            let lo = input.points().iter().position(|p| *p == pair[0]).unwrap();
            let hi = input.points().iter().position(|p| *p == pair[1]).unwrap();
            for p in &input.points()[lo + 1..hi] {
                assert!(perpendicular_distance(*p, pair[0], pair[1]) <= epsilon);
            }
        }
    }

    #[test]
    fn batch_matches_single() {
        let polygons = vec![
            polygon(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]),
            polygon(&[(0.0, 0.0), (1.0, 5.0), (2.0, 0.0)]),
            polygon(&[]),
            polygon(&[(0.0, 0.0), (5.0, 0.1), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)]),
        ];
        let batch = simplify_all(&polygons, 0.5, &CancelFlag::new()).unwrap();
        let single: Vec<Polygon> = polygons.iter().map(|p| simplify(p, 0.5)).collect();
        assert_eq!(batch, single);
        assert_eq!(batch[0].len(), 2);
        assert_eq!(batch[1].len(), 3);
        assert!(batch[2].is_empty());
    }

    #[test]
    fn cancelled_batch_returns_error() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let polygons = vec![polygon(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)])];
        assert!(matches!(
            simplify_all(&polygons, 0.5, &cancel),
            Err(PipelineError::Cancelled)
        ));
    }
}
