//! Seed patterns for initializing the cell state.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Grid;

/// Probability threshold for [`Pattern::Random`]: a cell is alive when a
/// uniform draw in `[0, 1)` exceeds this value.
pub const RANDOM_ALIVE_THRESHOLD: f64 = 0.8;

/// Side length of the glider footprint.
pub const GLIDER_SIZE: u32 = 3;

/// Live cells of the canonical glider, as `(dx, dy)` inside its 3x3 footprint.
pub const GLIDER_CELLS: [(u32, u32); 5] = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];

/// Predefined patterns for initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    /// All cells dead.
    Blank,
    /// Each cell independently alive with probability 0.2.
    #[default]
    Random,
    /// `count` gliders at random offsets.
    Glider {
        /// Number of gliders to place.
        count: u32,
    },
}

/// A pattern choice plus a nonce that distinguishes repeated selections.
///
/// Selecting the same pattern twice produces two different selections, so
/// re-choosing `Random` reseeds instead of being ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSelection {
    pub pattern: Pattern,
    pub nonce: u64,
}

impl PatternSelection {
    pub fn new(pattern: Pattern, nonce: u64) -> Self {
        Self { pattern, nonce }
    }
}

/// Generate initial cell values using the thread-local random source.
pub fn seed_cells(selection: &PatternSelection, grid: Grid) -> Vec<u32> {
    seed_cells_with(&selection.pattern, grid, &mut rand::thread_rng())
}

/// Generate initial cell values from an explicit random source.
///
/// Output is row-major, `grid.cell_count()` long, each value 0 or 1.
pub fn seed_cells_with<R: Rng + ?Sized>(pattern: &Pattern, grid: Grid, rng: &mut R) -> Vec<u32> {
    let mut cells = vec![0u32; grid.cell_count()];

    match pattern {
        Pattern::Blank => {}
        Pattern::Random => {
            for cell in cells.iter_mut() {
                if rng.r#gen::<f64>() > RANDOM_ALIVE_THRESHOLD {
                    *cell = 1;
                }
            }
        }
        Pattern::Glider { count } => {
            for _ in 0..*count {
                let ox = rng.gen_range(0..=grid.width.saturating_sub(GLIDER_SIZE));
                let oy = rng.gen_range(0..=grid.height.saturating_sub(GLIDER_SIZE));
                stamp_glider(&mut cells, grid, ox, oy);
            }
        }
    }

    cells
}

/// Write one glider with its footprint's top-left corner at `(ox, oy)`.
///
/// Cells falling outside the grid are skipped, not wrapped.
fn stamp_glider(cells: &mut [u32], grid: Grid, ox: u32, oy: u32) {
    for &(dx, dy) in GLIDER_CELLS.iter() {
        let x = ox + dx;
        let y = oy + dy;
        if x < grid.width && y < grid.height {
            cells[grid.index(x, y)] = 1;
        }
    }
}

/// Number of live cells in a state slice.
pub fn live_count(cells: &[u32]) -> usize {
    cells.iter().filter(|&&c| c != 0).count()
}
