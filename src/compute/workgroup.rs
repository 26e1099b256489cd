//! Compute dispatch tiling derived from grid size and device limits.

use crate::schema::Grid;

/// Workgroup tile shape and the dispatch that covers a grid with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkgroupSize {
    /// Tile width in invocations.
    pub x: u32,
    /// Tile height in invocations.
    pub y: u32,
    grid: Grid,
}

impl WorkgroupSize {
    /// Derive the tile for a grid given the maximum invocations per workgroup.
    ///
    /// 1. `x = min(width, floor(sqrt(area)))`
    /// 2. `y = min(height, floor(area / x))`
    /// 3. shrink `y` until `x * y <= area`
    ///
    /// Zero inputs are treated as one.
    pub fn size(width: u32, height: u32, max_tile_area: u32) -> (u32, u32) {
        let width = width.max(1);
        let height = height.max(1);
        let area = max_tile_area.max(1);

        let x = width.min(area.isqrt()).max(1);
        let mut y = height.min(area / x).max(1);
        while x as u64 * y as u64 > area as u64 && y > 1 {
            y -= 1;
        }
        (x, y)
    }

    /// Tile a grid under an invocation budget.
    pub fn new(grid: Grid, max_tile_area: u32) -> Self {
        let (x, y) = Self::size(grid.width, grid.height, max_tile_area);
        Self { x, y, grid }
    }

    /// Tile a grid under the device's compute limits.
    ///
    /// The tile area is `max_compute_invocations_per_workgroup`; each side
    /// is additionally clamped to its per-axis workgroup limit.
    pub fn for_limits(grid: Grid, limits: &wgpu::Limits) -> Self {
        let mut size = Self::new(grid, limits.max_compute_invocations_per_workgroup);
        size.x = size.x.min(limits.max_compute_workgroup_size_x.max(1));
        size.y = size.y.min(limits.max_compute_workgroup_size_y.max(1));
        size
    }

    /// Grid this tiling was derived for.
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Number of invocations per workgroup.
    #[inline]
    pub fn area(&self) -> u32 {
        self.x * self.y
    }

    /// Workgroup counts `(ceil(width / x), ceil(height / y))`.
    pub fn dispatch_counts(&self) -> (u32, u32) {
        (
            self.grid.width.div_ceil(self.x),
            self.grid.height.div_ceil(self.y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_square_budget() {
        assert_eq!(WorkgroupSize::size(128, 72, 256), (16, 16));
        assert_eq!(WorkgroupSize::size(1024, 1024, 64), (8, 8));
    }

    #[test]
    fn test_small_grid_clamps_tile() {
        assert_eq!(WorkgroupSize::size(4, 3, 256), (4, 3));
        assert_eq!(WorkgroupSize::size(1, 1000, 256), (1, 256));
    }

    #[test]
    fn test_non_square_budget() {
        // floor(sqrt(200)) = 14, floor(200 / 14) = 14
        assert_eq!(WorkgroupSize::size(500, 500, 200), (14, 14));
        // floor(sqrt(2)) = 1, floor(2 / 1) = 2
        assert_eq!(WorkgroupSize::size(10, 10, 2), (1, 2));
    }

    #[test]
    fn test_dispatch_counts_round_up() {
        let grid = Grid::new(100, 33).unwrap();
        let size = WorkgroupSize::new(grid, 256);
        assert_eq!((size.x, size.y), (16, 16));
        assert_eq!(size.dispatch_counts(), (7, 3));
    }

    #[test]
    fn test_for_limits_respects_axis_limits() {
        let limits = wgpu::Limits {
            max_compute_invocations_per_workgroup: 256,
            max_compute_workgroup_size_x: 256,
            max_compute_workgroup_size_y: 64,
            ..wgpu::Limits::default()
        };
        let grid = Grid::new(1, 4096).unwrap();
        let size = WorkgroupSize::for_limits(grid, &limits);
        assert_eq!((size.x, size.y), (1, 64));
        assert_eq!(size.dispatch_counts(), (1, 64));
    }

    proptest! {
        #[test]
        fn prop_tile_fits_grid_and_budget(
            width in 1u32..4096,
            height in 1u32..4096,
            area in 1u32..2048,
        ) {
            let (x, y) = WorkgroupSize::size(width, height, area);
            prop_assert!(x >= 1 && y >= 1);
            prop_assert!(x * y <= area);
            prop_assert!(x <= width);
            prop_assert!(y <= height);
        }

        #[test]
        fn prop_dispatch_covers_grid(
            width in 1u32..4096,
            height in 1u32..4096,
            area in 1u32..2048,
        ) {
            let grid = Grid::new(width, height).unwrap();
            let size = WorkgroupSize::new(grid, area);
            let (gx, gy) = size.dispatch_counts();
            prop_assert!(gx * size.x >= width);
            prop_assert!(gy * size.y >= height);
            // No workgroup row or column lies entirely outside the grid
            prop_assert!((gx - 1) * size.x < width);
            prop_assert!((gy - 1) * size.y < height);
        }
    }
}
