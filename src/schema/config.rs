//! Configuration types for the simulation grid and playback parameters.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Pattern;

/// Smallest update interval accepted from the controls, in milliseconds.
pub const MIN_UPDATE_INTERVAL_MS: u64 = 10;

/// Default grid width in cells.
pub const DEFAULT_GRID_WIDTH: u32 = 128;

/// Grid dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid {
    /// Number of columns (X dimension).
    pub width: u32,
    /// Number of rows (Y dimension).
    pub height: u32,
}

impl Grid {
    /// Create a grid, rejecting zero-sized dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        let grid = Self { width, height };
        grid.validate()?;
        Ok(grid)
    }

    /// Derive a grid from a column count and a height/width aspect ratio.
    ///
    /// The row count is `floor(width * aspect)`, never less than one.
    pub fn with_aspect(width: u32, aspect: f64) -> Result<Self, ConfigError> {
        if !aspect.is_finite() || aspect <= 0.0 {
            return Err(ConfigError::InvalidAspect(aspect));
        }
        let height = (width as f64 * aspect).floor().max(1.0) as u32;
        Self::new(width, height)
    }

    /// Total number of cells (`width * height`).
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index of `(x, y)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Check that both dimensions are non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_WIDTH,
        }
    }
}

fn default_update_interval_ms() -> u64 {
    20
}

/// Top-level simulation configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Grid dimensions.
    #[serde(default)]
    pub grid: Grid,
    /// Minimum time between two simulation steps.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Whether stepping starts immediately.
    #[serde(default)]
    pub playing: bool,
    /// Initial seeding pattern.
    #[serde(default)]
    pub pattern: Pattern,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            update_interval_ms: default_update_interval_ms(),
            playing: false,
            pattern: Pattern::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Update interval as a [`Duration`].
    #[inline]
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        if self.update_interval_ms < MIN_UPDATE_INTERVAL_MS {
            return Err(ConfigError::IntervalTooShort {
                interval_ms: self.update_interval_ms,
                min_ms: MIN_UPDATE_INTERVAL_MS,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions must be non-zero (got {width}x{height})")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Aspect ratio must be positive and finite (got {0})")]
    InvalidAspect(f64),
    #[error("Update interval {interval_ms}ms is below the minimum of {min_ms}ms")]
    IntervalTooShort { interval_ms: u64, min_ms: u64 },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_rejects_zero_dimensions() {
        assert!(Grid::new(0, 4).is_err());
        assert!(Grid::new(4, 0).is_err());
        assert!(Grid::new(1, 1).is_ok());
    }

    #[test]
    fn test_grid_index_is_row_major() {
        let grid = Grid::new(5, 3).unwrap();
        assert_eq!(grid.cell_count(), 15);
        assert_eq!(grid.index(0, 0), 0);
        assert_eq!(grid.index(4, 0), 4);
        assert_eq!(grid.index(0, 1), 5);
        assert_eq!(grid.index(4, 2), 14);
    }

    #[test]
    fn test_grid_with_aspect() {
        let grid = Grid::with_aspect(128, 720.0 / 1280.0).unwrap();
        assert_eq!(grid, Grid { width: 128, height: 72 });

        // Very wide windows still produce at least one row
        let grid = Grid::with_aspect(16, 0.01).unwrap();
        assert_eq!(grid.height, 1);

        assert!(Grid::with_aspect(16, 0.0).is_err());
        assert!(Grid::with_aspect(16, f64::NAN).is_err());
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config = SimulationConfig::from_json("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.update_interval(), Duration::from_millis(20));
        assert!(!config.playing);
    }

    #[test]
    fn test_config_rejects_short_interval() {
        let result = SimulationConfig::from_json(r#"{"update_interval_ms": 5}"#);
        assert!(matches!(
            result,
            Err(ConfigError::IntervalTooShort { interval_ms: 5, .. })
        ));
    }

    #[test]
    fn test_config_parses_glider_pattern() {
        let json = r#"{
            "grid": {"width": 64, "height": 32},
            "update_interval_ms": 200,
            "playing": true,
            "pattern": {"type": "Glider", "count": 4}
        }"#;
        let config = SimulationConfig::from_json(json).unwrap();
        assert_eq!(config.grid, Grid { width: 64, height: 32 });
        assert_eq!(config.pattern, Pattern::Glider { count: 4 });
        assert!(config.playing);
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        assert!(matches!(
            SimulationConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"grid": {"width": 40, "height": 30}}"#).unwrap();

        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(config.grid, Grid { width: 40, height: 30 });
        assert_eq!(config.update_interval_ms, 20);

        let missing = SimulationConfig::from_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
