//! CPU Propagator - Host-side reference of the transition rule.
//!
//! Mirrors the compute kernel cell for cell so GPU output can be checked
//! against it.

use crate::schema::{Grid, PatternSelection, live_count, seed_cells};

/// Neighbour offsets of the Moore neighbourhood.
const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Apply the transition rule to one cell given its current value and the
/// number of live neighbours.
///
/// - 2 neighbours: unchanged
/// - 3 neighbours: alive
/// - otherwise: dead
#[inline]
pub fn next_cell(current: u32, live_neighbours: u32) -> u32 {
    match live_neighbours {
        2 => current,
        3 => 1,
        _ => 0,
    }
}

/// Count live neighbours of `(x, y)` with toroidal wraparound.
pub fn live_neighbours(cells: &[u32], grid: Grid, x: u32, y: u32) -> u32 {
    let w = grid.width as i64;
    let h = grid.height as i64;
    NEIGHBOURS
        .iter()
        .map(|&(dx, dy)| {
            let nx = (x as i64 + dx).rem_euclid(w) as u32;
            let ny = (y as i64 + dy).rem_euclid(h) as u32;
            cells[grid.index(nx, ny)]
        })
        .sum()
}

/// Compute one generation from `current` into `next`.
pub fn step_into(grid: Grid, current: &[u32], next: &mut [u32]) {
    debug_assert_eq!(current.len(), grid.cell_count());
    debug_assert_eq!(next.len(), grid.cell_count());

    for y in 0..grid.height {
        for x in 0..grid.width {
            let i = grid.index(x, y);
            next[i] = next_cell(current[i], live_neighbours(current, grid, x, y));
        }
    }
}

/// Cell values that do not fit the grid they were paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("State has {actual} cells, grid has {expected}")]
pub struct CellCountMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Simulation state container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifeState {
    /// Row-major cell values, 0 or 1.
    pub cells: Vec<u32>,
    /// Grid dimensions.
    pub grid: Grid,
    /// Step count.
    pub step: u64,
}

impl LifeState {
    /// Create new state from a pattern selection.
    pub fn from_selection(selection: &PatternSelection, grid: Grid) -> Self {
        Self {
            cells: seed_cells(selection, grid),
            grid,
            step: 0,
        }
    }

    /// Wrap existing cell values, one per grid cell.
    pub fn from_cells(grid: Grid, cells: Vec<u32>) -> Result<Self, CellCountMismatch> {
        if cells.len() != grid.cell_count() {
            return Err(CellCountMismatch {
                expected: grid.cell_count(),
                actual: cells.len(),
            });
        }
        Ok(Self { cells, grid, step: 0 })
    }

    /// Build a state with the listed cells alive. Coordinates outside the
    /// grid are ignored.
    pub fn with_live_cells(grid: Grid, live: &[(u32, u32)]) -> Self {
        let mut cells = vec![0u32; grid.cell_count()];
        for &(x, y) in live {
            if x < grid.width && y < grid.height {
                cells[grid.index(x, y)] = 1;
            }
        }
        Self { cells, grid, step: 0 }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.cells[self.grid.index(x, y)]
    }

    /// Number of live cells.
    pub fn live_count(&self) -> usize {
        live_count(&self.cells)
    }
}

/// CPU-based propagator.
pub struct CpuPropagator {
    grid: Grid,
    /// Pre-allocated buffer for the next state (swapped each step).
    next: Vec<u32>,
}

impl CpuPropagator {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            next: vec![0u32; grid.cell_count()],
        }
    }

    /// Perform one simulation step.
    ///
    /// The scratch buffer follows the state's grid, so one propagator can
    /// step states of different sizes.
    pub fn step(&mut self, state: &mut LifeState) {
        if state.grid != self.grid {
            self.grid = state.grid;
            self.next.resize(state.grid.cell_count(), 0);
        }
        step_into(self.grid, &state.cells, &mut self.next);
        std::mem::swap(&mut state.cells, &mut self.next);
        state.step += 1;
    }

    /// Run simulation for specified number of steps.
    pub fn run(&mut self, state: &mut LifeState, steps: u64) {
        for _ in 0..steps {
            self.step(state);
        }
    }
}
