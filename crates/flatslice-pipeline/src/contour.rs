//! Contour tracing: walk boundary pixels into closed polygons.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! which algorithm to use at runtime.
//!
//! # Boundary walk
//!
//! The grid is scanned row by row for boundary pixels not yet visited.
//! Each one seeds a trace that runs through four states:
//!
//! 1. `Forward`: walk from the seed, always taking the first unvisited
//!    boundary neighbour in [`Direction::PRIORITY`] order, until stuck.
//! 2. `Reversing`: walk again from the seed. The seed is often in the
//!    middle of a contour, so this picks up the part the forward walk
//!    left behind, on the other side of the seed.
//! 3. `Closing`: if the two ends are within [`CLOSE_DISTANCE_SQ`], the
//!    polygon is closed. Otherwise up to [`BACKTRACK_DEPTH`] recorded
//!    points are dropped from the tail, closing early or resuming the walk
//!    from a point that still has unvisited neighbours. When the budget
//!    runs out the seed point is appended as a forced closure.
//! 4. `Done`.
//!
//! A vertex is only recorded where the heading changes, and not at all
//! when the walk is about to snap back to the previous heading. Diagonal
//! staircases therefore collapse into single long segments instead of
//! one vertex per pixel.
//!
//! The priority order (axis-aligned before diagonal) and the closing
//! constants are not rotation invariant. Output is pinned by the
//! regression tests below; changing either alters every traced polygon.

use serde::{Deserialize, Serialize};

use crate::cancel::CancelFlag;
use crate::grid::{PixelGrid, VisitedMask};
use crate::types::{PipelineError, PixelState, Point, Polygon};

/// Squared distance (in pixels) under which the two ends of a trace are
/// joined.
pub const CLOSE_DISTANCE_SQ: f64 = 2.0;

/// Number of tail points a failing closure may drop before forcing the
/// polygon shut.
pub const BACKTRACK_DEPTH: usize = 5;

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Bidirectional boundary walk with direction compression and
    /// bounded backtracking closure.
    #[default]
    BoundaryWalk,
}

/// Everything a trace run produces.
#[derive(Debug, Clone)]
pub struct TraceOutput {
    /// Closed polygons in image pixel coordinates, in scan order.
    pub polygons: Vec<Polygon>,
    /// Cells consumed by the walks.
    pub visited: VisitedMask,
    /// Counters describing the run.
    pub stats: TraceStats,
}

/// Counters collected while tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStats {
    /// Seeds that started a trace.
    pub traces_started: usize,
    /// Traces dropped for having fewer than three distinct points.
    pub degenerate_discarded: usize,
    /// Traces closed by appending the seed after backtracking failed.
    pub forced_closures: usize,
    /// Tail points dropped while closing.
    pub backtracked_points: usize,
}

/// Trait for contour tracing strategies.
///
/// Input: a grid whose boundary pixels have been classified.
/// Output: closed polygons plus the cells the walk consumed.
pub trait ContourTracer {
    /// Trace every boundary ring in `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if `cancel` fires between
    /// seed rows.
    fn trace(&self, grid: &PixelGrid, cancel: &CancelFlag) -> Result<TraceOutput, PipelineError>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, grid: &PixelGrid, cancel: &CancelFlag) -> Result<TraceOutput, PipelineError> {
        match *self {
            Self::BoundaryWalk => trace_boundary_walk(grid, cancel),
        }
    }
}

/// One of the eight headings a walk can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// -x
    Left,
    /// +x
    Right,
    /// -y
    Up,
    /// +y
    Down,
    /// -x -y
    UpLeft,
    /// +x -y
    UpRight,
    /// -x +y
    DownLeft,
    /// +x +y
    DownRight,
}

impl Direction {
    /// Probe order: the four axis-aligned headings, then the diagonals.
    pub const PRIORITY: [Self; 8] = [
        Self::Left,
        Self::Right,
        Self::Up,
        Self::Down,
        Self::UpLeft,
        Self::UpRight,
        Self::DownLeft,
        Self::DownRight,
    ];

    /// Grid offset of one step in this direction.
    #[must_use]
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::UpLeft => (-1, -1),
            Self::UpRight => (1, -1),
            Self::DownLeft => (-1, 1),
            Self::DownRight => (1, 1),
        }
    }
}

type Cell = (isize, isize);

const fn step(cell: Cell, direction: Direction) -> Cell {
    let (dx, dy) = direction.offset();
    (cell.0 + dx, cell.1 + dy)
}

#[allow(clippy::cast_precision_loss)]
fn cell_distance_squared(a: Cell, b: Cell) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy) as f64
}

/// Push `cell` unless it repeats the current tail.
fn push_distinct(points: &mut Vec<Cell>, cell: Cell) {
    if points.last() != Some(&cell) {
        points.push(cell);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceState {
    Forward,
    Reversing,
    Closing,
    Done,
}

struct Walker<'a> {
    grid: &'a PixelGrid,
    visited: VisitedMask,
    stats: TraceStats,
}

impl Walker<'_> {
    fn is_open(&self, cell: Cell) -> bool {
        self.grid.get(cell.0, cell.1) == PixelState::Boundary
            && !self.visited.is_visited(cell.0, cell.1)
    }

    /// First heading from `cell` that leads to an open boundary pixel.
    fn next_heading(&self, cell: Cell) -> Option<Direction> {
        Direction::PRIORITY
            .into_iter()
            .find(|&d| self.is_open(step(cell, d)))
    }

    /// Walk from `from` until no open neighbour remains, passing each
    /// vertex to `record`. Returns the cell the walk got stuck on.
    fn walk(&mut self, from: Cell, mut record: impl FnMut(Cell)) -> Cell {
        let mut current = from;
        let mut previous: Option<Direction> = None;
        self.visited.mark(current.0, current.1);

        while let Some(direction) = self.next_heading(current) {
            let next = step(current, direction);
            if previous != Some(direction) {
                // Staircase corner: the step after `next` turns straight
                // back to the old heading.
                let snaps_back = previous.is_some() && self.next_heading(next) == previous;
                if !snaps_back {
                    record(current);
                }
            }
            self.visited.mark(next.0, next.1);
            current = next;
            previous = Some(direction);
        }
        current
    }

    /// Run one trace from `seed`. Returns grid cells of a closed loop, or
    /// `None` for a degenerate trace.
    fn trace_from(&mut self, seed: Cell) -> Option<Vec<Cell>> {
        let mut state = TraceState::Forward;
        let mut forward = Vec::new();
        let mut points = Vec::new();
        let mut budget = BACKTRACK_DEPTH;

        while state != TraceState::Done {
            state = match state {
                TraceState::Forward => {
                    let end = self.walk(seed, |c| push_distinct(&mut forward, c));
                    push_distinct(&mut forward, end);
                    TraceState::Reversing
                }
                TraceState::Reversing => {
                    let mut reverse = Vec::new();
                    let end = self.walk(seed, |c| push_distinct(&mut reverse, c));
                    push_distinct(&mut reverse, end);
                    // The reverse walk runs away from the seed, so it is
                    // prepended back to front.
                    for cell in reverse.into_iter().rev().chain(forward.drain(..)) {
                        push_distinct(&mut points, cell);
                    }
                    TraceState::Closing
                }
                TraceState::Closing => self.close(&mut points, &mut budget),
                TraceState::Done => TraceState::Done,
            };
        }

        has_three_distinct(&points).then_some(points)
    }

    /// One closing step; see the module docs.
    fn close(&mut self, points: &mut Vec<Cell>, budget: &mut usize) -> TraceState {
        let Some(&first) = points.first() else {
            return TraceState::Done;
        };
        if points.len() > 1
            && let Some(last) = points.last_mut()
            && cell_distance_squared(*last, first) <= CLOSE_DISTANCE_SQ
        {
            *last = first;
            return TraceState::Done;
        }

        if *budget == 0 {
            self.stats.forced_closures += 1;
            tracing::debug!(?first, "forcing closure after backtracking");
            points.push(first);
            return TraceState::Done;
        }
        *budget -= 1;
        self.stats.backtracked_points += 1;
        points.pop();

        let Some(&tail) = points.last() else {
            return TraceState::Done;
        };
        if points.len() > 1 && cell_distance_squared(tail, first) <= CLOSE_DISTANCE_SQ {
            if let Some(last) = points.last_mut() {
                *last = first;
            }
            return TraceState::Done;
        }
        if self.next_heading(tail).is_some() {
            let end = self.walk(tail, |c| push_distinct(points, c));
            push_distinct(points, end);
        }
        TraceState::Closing
    }
}

/// `true` if the loop (ignoring its closing duplicate) visits at least
/// three different cells and is closed.
fn has_three_distinct(points: &[Cell]) -> bool {
    let [first, body @ .., last] = points else {
        return false;
    };
    if first != last {
        return false;
    }
    let mut seen: Vec<Cell> = vec![*first];
    for cell in body {
        if !seen.contains(cell) {
            seen.push(*cell);
            if seen.len() >= 3 {
                return true;
            }
        }
    }
    false
}

/// Bidirectional boundary walk over every unvisited boundary pixel, in
/// row-major seed order.
fn trace_boundary_walk(grid: &PixelGrid, cancel: &CancelFlag) -> Result<TraceOutput, PipelineError> {
    let mut walker = Walker {
        grid,
        visited: VisitedMask::for_grid(grid),
        stats: TraceStats::default(),
    };
    let mut polygons = Vec::new();

    #[allow(clippy::cast_possible_wrap)]
    for y in 0..grid.height() as isize {
        cancel.check()?;
        for x in 0..grid.width() as isize {
            if !walker.is_open((x, y)) {
                continue;
            }
            walker.stats.traces_started += 1;
            match walker.trace_from((x, y)) {
                Some(cells) => polygons.push(to_polygon(grid, &cells)),
                None => {
                    walker.stats.degenerate_discarded += 1;
                    tracing::debug!(x, y, "discarding degenerate trace");
                }
            }
        }
    }

    Ok(TraceOutput {
        polygons,
        visited: walker.visited,
        stats: walker.stats,
    })
}

#[allow(clippy::cast_sign_loss)]
fn to_polygon(grid: &PixelGrid, cells: &[Cell]) -> Polygon {
    Polygon::new(
        cells
            .iter()
            .map(|&(x, y)| grid.to_image_point(x as usize, y as usize))
            .collect::<Vec<Point>>(),
    )
}
