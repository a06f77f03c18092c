//! Geometry helpers shared by simplification and toolpath generation.

use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Perpendicular distance from `point` to the infinite line through
/// `start` and `end`.
///
/// Uses `|cross(end - start, start - point)| / |end - start|`. When
/// `start` and `end` coincide the Euclidean distance to `start` is
/// returned instead.
#[must_use]
pub fn perpendicular_distance(point: Point, start: Point, end: Point) -> f64 {
    if start == end {
        return point.distance(start);
    }
    let chord = end.sub(start);
    chord.cross(start.sub(point)).abs() / chord.length()
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Corner with the smallest coordinates.
    pub min: Point,
    /// Corner with the largest coordinates.
    pub max: Point,
}

impl BoundingBox {
    /// Smallest box enclosing every point, or `None` for an empty slice.
    #[must_use]
    pub fn of(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self {
            min: *first,
            max: *first,
        };
        for p in rest {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    /// Smallest box enclosing both boxes.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Width of the box.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height of the box.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// `true` if the horizontal line at `y` passes through the box
    /// (edges inclusive).
    #[must_use]
    pub fn spans_y(&self, y: f64) -> bool {
        self.min.y <= y && y <= self.max.y
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_distance_on_axis() {
        let d = perpendicular_distance(
            Point::new(1.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert!((d - 3.0).abs() < 1e-10);
    }

    #[test]
    fn perpendicular_distance_diagonal_segment() {
        let d = perpendicular_distance(
            Point::new(2.0, -1.0),
            Point::new(0.0, 0.0),
            Point::new(4.0, 2.0),
        );
        let expected = 8.0 / 20.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-10, "got {d}, expected {expected}");
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }

    #[test]
    fn bounding_box_of_points() {
        let bbox = BoundingBox::of(&[
            Point::new(3.0, -1.0),
            Point::new(-2.0, 4.0),
            Point::new(1.0, 1.0),
        ])
        .unwrap();
        assert_eq!(bbox.min, Point::new(-2.0, -1.0));
        assert_eq!(bbox.max, Point::new(3.0, 4.0));
        assert!((bbox.width() - 5.0).abs() < f64::EPSILON);
        assert!((bbox.height() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_box_of_empty_is_none() {
        assert!(BoundingBox::of(&[]).is_none());
    }

    #[test]
    fn union_and_span() {
        let a = BoundingBox::of(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).unwrap();
        let b = BoundingBox::of(&[Point::new(5.0, 2.0), Point::new(6.0, 3.0)]).unwrap();
        let u = a.union(b);
        assert_eq!(u.min, Point::new(0.0, 0.0));
        assert_eq!(u.max, Point::new(6.0, 3.0));
        assert!(a.spans_y(1.0));
        assert!(!a.spans_y(1.5));
    }
}
