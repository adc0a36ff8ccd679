use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters used to build a new world: grid size, seeding, and the
/// environment constants the simulation reads every tick.
/// Stored with the world so a snapshot carries its own environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldParams {
    /// 0 draws a seed from entropy; the resolved seed is stored back.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_initial_cells")]
    pub initial_cells: u32,
    /// Starting energy of seeded cells. Absent means each cell's own maximum.
    #[serde(default)]
    pub initial_cell_energy: Option<u32>,
    #[serde(default = "default_geyser_count")]
    pub geyser_count: u32,
    /// Energy gained by one photosynthesis action.
    #[serde(default = "default_sun_level")]
    pub sun_level: u32,
    /// World-wide overflow cap; anything above it is redistributed.
    #[serde(default = "default_energy_cap")]
    pub energy_cap: u32,
    /// Energy carried by one rain drop.
    #[serde(default = "default_rain_energy")]
    pub rain_energy: u32,
    /// Energy a geyser produces per tick.
    #[serde(default = "default_geyser_production")]
    pub geyser_production: u32,
    #[serde(default = "enabled")]
    pub sun: bool,
    #[serde(default = "enabled")]
    pub entropy: bool,
    #[serde(default = "enabled")]
    pub geyser: bool,
    #[serde(default = "enabled")]
    pub rain: bool,
}

fn default_width() -> u32 {
    400
}
fn default_height() -> u32 {
    200
}
fn default_initial_cells() -> u32 {
    10_000
}
fn default_geyser_count() -> u32 {
    10
}
fn default_sun_level() -> u32 {
    5
}
fn default_energy_cap() -> u32 {
    1000
}
fn default_rain_energy() -> u32 {
    10_000
}
fn default_geyser_production() -> u32 {
    50
}
fn enabled() -> bool {
    true
}

/// Largest accepted grid edge.
const MAX_EDGE: u32 = 10_000;

impl Default for WorldParams {
    fn default() -> Self {
        WorldParams {
            seed: 0,
            width: default_width(),
            height: default_height(),
            initial_cells: default_initial_cells(),
            initial_cell_energy: None,
            geyser_count: default_geyser_count(),
            sun_level: default_sun_level(),
            energy_cap: default_energy_cap(),
            rain_energy: default_rain_energy(),
            geyser_production: default_geyser_production(),
            sun: true,
            entropy: true,
            geyser: true,
            rain: true,
        }
    }
}

impl WorldParams {
    /// Load world parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let params: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        params.validate()?;
        Ok(params)
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(3..=MAX_EDGE).contains(&self.width) {
            return Err(format!("width must be 3-{}, got {}", MAX_EDGE, self.width));
        }
        if !(3..=MAX_EDGE).contains(&self.height) {
            return Err(format!("height must be 3-{}, got {}", MAX_EDGE, self.height));
        }
        let area = self.width as u64 * self.height as u64;
        if self.initial_cells as u64 > area {
            return Err(format!(
                "initial_cells must not exceed the grid area {}, got {}",
                area, self.initial_cells
            ));
        }
        if self.geyser_count as u64 > area {
            return Err(format!(
                "geyser_count must not exceed the grid area {}, got {}",
                area, self.geyser_count
            ));
        }
        if self.energy_cap == 0 {
            return Err("energy_cap must be > 0, got 0".to_string());
        }
        if self.rain_energy == 0 {
            return Err("rain_energy must be > 0, got 0".to_string());
        }
        Ok(())
    }
}
