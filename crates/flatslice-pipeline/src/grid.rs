//! Typed pixel grid with a background margin, plus the scratch mask the
//! tracer uses to remember which cells it has walked.

use image::{GrayImage, Luma};

use crate::types::{Dimensions, PixelState, Point};

/// Row-major grid of [`PixelState`] cells surrounded by a margin of
/// [`PixelState::Background`].
///
/// Grid coordinates include the margin; [`to_image_point`](Self::to_image_point)
/// converts them back to source image pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    border: usize,
    cells: Vec<PixelState>,
}

impl PixelGrid {
    /// An all-background grid large enough to hold an image of
    /// `dimensions` plus `border` cells on every side.
    #[must_use]
    pub fn new(dimensions: Dimensions, border: u32) -> Self {
        let border = border as usize;
        let width = dimensions.width as usize + 2 * border;
        let height = dimensions.height as usize + 2 * border;
        Self {
            width,
            height,
            border,
            cells: vec![PixelState::Background; width * height],
        }
    }

    /// Grid width including the margin.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height including the margin.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Margin width in cells.
    #[must_use]
    pub const fn border(&self) -> usize {
        self.border
    }

    /// Dimensions of the source image (grid minus margin).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn image_dimensions(&self) -> Dimensions {
        Dimensions {
            width: (self.width - 2 * self.border) as u32,
            height: (self.height - 2 * self.border) as u32,
        }
    }

    /// State at grid coordinates. Out-of-range cells read as background.
    #[must_use]
    pub fn get(&self, x: isize, y: isize) -> PixelState {
        self.index(x, y)
            .map_or(PixelState::Background, |i| self.cells[i])
    }

    /// Set the state at grid coordinates. Out-of-range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, state: PixelState) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = state;
        }
    }

    /// Set the state at source image coordinates (offset by the margin).
    pub fn set_image_pixel(&mut self, x: u32, y: u32, state: PixelState) {
        self.set(x as usize + self.border, y as usize + self.border, state);
    }

    /// Raw row-major cells.
    #[must_use]
    pub fn cells(&self) -> &[PixelState] {
        &self.cells
    }

    /// Mutable row-major cells.
    pub(crate) fn cells_mut(&mut self) -> &mut [PixelState] {
        &mut self.cells
    }

    /// Number of cells in `state`.
    #[must_use]
    pub fn count(&self, state: PixelState) -> usize {
        self.cells.iter().filter(|&&s| s == state).count()
    }

    /// Convert grid coordinates to a point in source image pixels.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn to_image_point(&self, x: usize, y: usize) -> Point {
        let b = self.border as isize;
        Point::new(
            (x as isize - b) as f64,
            (y as isize - b) as f64,
        )
    }

    /// Render the grid as gray levels for inspection: background 255,
    /// foreground 0, boundary 128, visited 64.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let level = match self.cells[y as usize * self.width + x as usize] {
                PixelState::Background => 255,
                PixelState::Foreground => 0,
                PixelState::Boundary => 128,
                PixelState::Visited => 64,
            };
            Luma([level])
        })
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn index(&self, x: isize, y: isize) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }
}

/// One flag per grid cell marking cells consumed by a trace.
///
/// Kept apart from [`PixelGrid`] so the grid stays read-only while
/// tracing; the result is folded back with [`commit`](Self::commit).
#[derive(Debug, Clone)]
pub struct VisitedMask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl VisitedMask {
    /// An empty mask sized to `grid`.
    #[must_use]
    pub fn for_grid(grid: &PixelGrid) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            bits: vec![false; grid.width * grid.height],
        }
    }

    /// Whether the cell has been visited. Out-of-range cells read as
    /// visited so the tracer never steps outside the grid.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn is_visited(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return true;
        }
        self.bits[y as usize * self.width + x as usize]
    }

    /// Mark a cell as visited.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn mark(&mut self, x: isize, y: isize) {
        if x >= 0 && y >= 0 && x < self.width as isize && y < self.height as isize {
            self.bits[y as usize * self.width + x as usize] = true;
        }
    }

    /// Number of visited cells.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Reclassify every visited boundary cell of `grid` as
    /// [`PixelState::Visited`].
    pub fn commit(&self, grid: &mut PixelGrid) {
        for (cell, &visited) in grid.cells_mut().iter_mut().zip(&self.bits) {
            if visited && *cell == PixelState::Boundary {
                *cell = PixelState::Visited;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn new_grid_includes_border() {
        let grid = PixelGrid::new(dims(4, 3), 2);
        assert_eq!(grid.width(), 8);
        assert_eq!(grid.height(), 7);
        assert_eq!(grid.image_dimensions(), dims(4, 3));
        assert_eq!(grid.count(PixelState::Background), 56);
    }

    #[test]
    fn image_pixels_are_offset_by_border() {
        let mut grid = PixelGrid::new(dims(4, 4), 3);
        grid.set_image_pixel(0, 0, PixelState::Foreground);
        assert_eq!(grid.get(3, 3), PixelState::Foreground);
        assert_eq!(grid.to_image_point(3, 3), Point::new(0.0, 0.0));
        assert_eq!(grid.to_image_point(2, 1), Point::new(-1.0, -2.0));
    }

    #[test]
    fn out_of_range_reads_background() {
        let grid = PixelGrid::new(dims(2, 2), 0);
        assert_eq!(grid.get(-1, 0), PixelState::Background);
        assert_eq!(grid.get(0, 2), PixelState::Background);
    }

    #[test]
    fn visited_mask_commit_only_touches_boundary() {
        let mut grid = PixelGrid::new(dims(3, 1), 0);
        grid.set(0, 0, PixelState::Boundary);
        grid.set(1, 0, PixelState::Foreground);
        grid.set(2, 0, PixelState::Boundary);

        let mut mask = VisitedMask::for_grid(&grid);
        mask.mark(0, 0);
        mask.mark(1, 0);
        assert_eq!(mask.count(), 2);
        assert!(mask.is_visited(-1, 0));

        mask.commit(&mut grid);
        assert_eq!(grid.get(0, 0), PixelState::Visited);
        assert_eq!(grid.get(1, 0), PixelState::Foreground);
        assert_eq!(grid.get(2, 0), PixelState::Boundary);
    }

    #[test]
    fn gray_dump_levels() {
        let mut grid = PixelGrid::new(dims(2, 1), 0);
        grid.set(0, 0, PixelState::Foreground);
        let img = grid.to_gray_image();
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(1, 0).0[0], 255);
    }
}
