//! Live control values and change notification.
//!
//! The simulation never owns its playback parameters. It reads them through
//! the [`Controls`] trait on every frame and reacts to [`ControlChange`]
//! notifications for the ones that need GPU work.

use std::time::Duration;

use super::{
    ConfigError, Grid, MIN_UPDATE_INTERVAL_MS, Pattern, PatternSelection, SimulationConfig,
};

/// Read access to the user-controlled simulation parameters.
pub trait Controls {
    /// Current grid dimensions.
    fn grid(&self) -> Grid;
    /// Minimum time between two simulation steps.
    fn update_interval(&self) -> Duration;
    /// Whether the simulation should advance.
    fn playing(&self) -> bool;
    /// Currently selected seeding pattern.
    fn pattern(&self) -> PatternSelection;
}

/// A single change to the control values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlChange {
    GridResized(Grid),
    IntervalChanged(Duration),
    PlayingChanged(bool),
    PatternSelected(PatternSelection),
}

/// In-memory control store that records every change for the owner to drain.
#[derive(Debug, Clone)]
pub struct ControlStore {
    grid: Grid,
    update_interval: Duration,
    playing: bool,
    pattern: PatternSelection,
    next_nonce: u64,
    pending: Vec<ControlChange>,
}

impl ControlStore {
    /// Build a store from a validated configuration.
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            grid: config.grid,
            update_interval: config.update_interval(),
            playing: config.playing,
            pattern: PatternSelection::new(config.pattern, 0),
            next_nonce: 1,
            pending: Vec::new(),
        })
    }

    /// Resize the grid. Notifies only when the dimensions actually change.
    pub fn set_grid(&mut self, grid: Grid) -> Result<(), ConfigError> {
        grid.validate()?;
        if grid != self.grid {
            self.grid = grid;
            self.pending.push(ControlChange::GridResized(grid));
        }
        Ok(())
    }

    /// Resize from a column count, keeping the given height/width ratio.
    pub fn set_grid_width(&mut self, width: u32, aspect: f64) -> Result<(), ConfigError> {
        self.set_grid(Grid::with_aspect(width, aspect)?)
    }

    /// Set the step interval, clamped to the supported minimum.
    pub fn set_update_interval(&mut self, interval: Duration) {
        let interval = interval.max(Duration::from_millis(MIN_UPDATE_INTERVAL_MS));
        if interval != self.update_interval {
            self.update_interval = interval;
            self.pending.push(ControlChange::IntervalChanged(interval));
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing != self.playing {
            self.playing = playing;
            self.pending.push(ControlChange::PlayingChanged(playing));
        }
    }

    pub fn toggle_playing(&mut self) {
        self.set_playing(!self.playing);
    }

    /// Select a pattern. Always notifies, even for the current pattern.
    pub fn select_pattern(&mut self, pattern: Pattern) {
        let selection = PatternSelection::new(pattern, self.next_nonce);
        self.next_nonce = self.next_nonce.wrapping_add(1);
        self.pattern = selection;
        self.pending.push(ControlChange::PatternSelected(selection));
    }

    /// Drain all changes recorded since the last call, oldest first.
    pub fn take_changes(&mut self) -> Vec<ControlChange> {
        std::mem::take(&mut self.pending)
    }
}

impl Controls for ControlStore {
    fn grid(&self) -> Grid {
        self.grid
    }

    fn update_interval(&self) -> Duration {
        self.update_interval
    }

    fn playing(&self) -> bool {
        self.playing
    }

    fn pattern(&self) -> PatternSelection {
        self.pattern
    }
}
