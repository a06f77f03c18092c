//! Integration test: a solid square goes through extraction, tracing and
//! simplification and comes out as its four corners.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use flatslice_pipeline::outline::extract_boundary;
use flatslice_pipeline::simplify::simplify_all;
use flatslice_pipeline::{
    CancelFlag, ContourTracer, ContourTracerKind, Dimensions, PixelGrid, PixelState, Point,
};

/// 10x10 foreground square inside a 12x12 grid (1 pixel border).
fn square_grid() -> PixelGrid {
    let mut grid = PixelGrid::new(
        Dimensions {
            width: 10,
            height: 10,
        },
        1,
    );
    for y in 0..10 {
        for x in 0..10 {
            grid.set_image_pixel(x, y, PixelState::Foreground);
        }
    }
    grid
}

#[test]
fn square_yields_single_ring() {
    let grid = square_grid();
    assert_eq!(grid.width(), 12);
    assert_eq!(grid.height(), 12);

    let classified = extract_boundary(&grid, &CancelFlag::new()).unwrap();

    // One-pixel ring fully enclosing the square, nothing else.
    for y in 0..12_isize {
        for x in 0..12_isize {
            let on_ring = x == 0 || y == 0 || x == 11 || y == 11;
            let expected = if on_ring {
                PixelState::Boundary
            } else {
                PixelState::Foreground
            };
            assert_eq!(classified.get(x, y), expected, "cell ({x}, {y})");
        }
    }
}

#[test]
fn square_traces_and_simplifies_to_corners() {
    let cancel = CancelFlag::new();
    let mut classified = extract_boundary(&square_grid(), &cancel).unwrap();
    let output = ContourTracerKind::default()
        .trace(&classified, &cancel)
        .unwrap();
    assert_eq!(output.polygons.len(), 1);

    output.visited.commit(&mut classified);
    assert_eq!(classified.count(PixelState::Boundary), 0);
    assert_eq!(classified.count(PixelState::Visited), 44);

    let simplified = simplify_all(&output.polygons, 0.5, &cancel).unwrap();
    let polygon = &simplified[0];
    assert!(polygon.is_closed());
    assert_eq!(
        polygon.points(),
        [
            Point::new(-1.0, -1.0),
            Point::new(10.0, -1.0),
            Point::new(10.0, 10.0),
            Point::new(-1.0, 10.0),
            Point::new(-1.0, -1.0),
        ]
    );
}
