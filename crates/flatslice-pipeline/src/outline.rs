//! Boundary pixel classification.
//!
//! Every background pixel with at least one foreground pixel among its
//! eight neighbours becomes [`PixelState::Boundary`]. The result is a
//! one-pixel ring just outside each foreground region, around outer
//! edges and holes alike.
//!
//! Each output cell depends only on reads from the input grid, so rows
//! are classified in parallel.

use rayon::prelude::*;

use crate::cancel::CancelFlag;
use crate::grid::PixelGrid;
use crate::types::{PipelineError, PixelState};

/// Offsets of the 8-neighbourhood.
pub const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Number of foreground cells among the 8 neighbours of `(x, y)`.
#[must_use]
pub fn foreground_neighbours(grid: &PixelGrid, x: isize, y: isize) -> usize {
    NEIGHBOURS
        .iter()
        .filter(|(dx, dy)| grid.get(x + dx, y + dy) == PixelState::Foreground)
        .count()
}

/// Return a copy of `grid` with boundary pixels classified.
///
/// # Errors
///
/// Returns [`PipelineError::Cancelled`] if `cancel` fires while rows are
/// being processed; the partial grid is dropped.
#[allow(clippy::cast_possible_wrap)]
pub fn extract_boundary(grid: &PixelGrid, cancel: &CancelFlag) -> Result<PixelGrid, PipelineError> {
    let width = grid.width();
    let mut out = grid.clone();
    if width == 0 {
        return Ok(out);
    }

    out.cells_mut()
        .par_chunks_mut(width)
        .enumerate()
        .try_for_each(|(y, row)| {
            cancel.check()?;
            for (x, cell) in row.iter_mut().enumerate() {
                if *cell == PixelState::Background
                    && foreground_neighbours(grid, x as isize, y as isize) > 0
                {
                    *cell = PixelState::Boundary;
                }
            }
            Ok::<(), PipelineError>(())
        })?;

    Ok(out)
}
