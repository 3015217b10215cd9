// Terrain configuration: static constants consumed by the tile window.
//
// Defaults match the demo boat scene (20-unit tiles sampled 100x100,
// four hollows per tile, sigma 2, texture repeat N/30). Everything can be
// overridden from a TOML file; missing keys fall back to the defaults.

use std::f32::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::terrain::BumpProfile;

// ============================================================================
// RECYCLE MODE
// ============================================================================

/// What happens to a tile when the window scrolls past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleMode {
    /// Rebuild the tile from a seed derived from its new lattice coordinate.
    /// Terrain is novel going forward and identical when revisited.
    #[default]
    Regenerate,
    /// Keep mesh and obstacles, only shift them by three tile lengths.
    /// The landscape repeats with a period of three tiles.
    Translate,
}

// ============================================================================
// COLLISION
// ============================================================================

/// Proximity thresholds used by the collision resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Minimum planar distance kept between the boat and rock obstacles.
    pub rock_threshold: f32,
    /// Minimum planar distance kept between the boat and housing obstacles.
    pub housing_threshold: f32,
    /// Displacement applied per overlapping obstacle per frame.
    pub pushback: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            rock_threshold: 1.5,
            housing_threshold: 2.5,
            pushback: 0.1,
        }
    }
}

// ============================================================================
// TERRAIN CONFIG
// ============================================================================

/// Largest accepted samples per side. N*N must stay addressable by u32 indices.
pub const MAX_TILE_RESOLUTION: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Side length of one square tile in world units.
    pub tile_length: f32,
    /// Samples per tile side (N). Each tile mesh has N*N vertices.
    pub tile_resolution: u32,
    pub obstacles_per_tile: usize,
    pub min_separation: f32,
    /// Peak height of a single bump.
    pub bump_amplitude: f32,
    /// Gaussian width of a bump.
    pub bump_sigma: f32,
    /// Texture repeats across one tile.
    pub uv_repeat: f32,
    /// Height of the flat water sheet drawn over each tile.
    pub water_level: f32,
    /// Upper bound on accessories (grass tufts, crates) attached to one site.
    pub max_accessories: u32,
    /// Candidate draws allowed per tile before generation gives up.
    pub max_placement_attempts: u32,
    pub seed: u64,
    pub recycle_mode: RecycleMode,
    pub collision: CollisionConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            tile_length: 20.0,
            tile_resolution: 100,
            obstacles_per_tile: 4,
            min_separation: 2.5,
            bump_amplitude: 3.0,
            bump_sigma: 2.0,
            uv_repeat: 100.0 / 30.0,
            water_level: 1.0,
            max_accessories: 3,
            max_placement_attempts: 10_000,
            seed: 0x5EED_B0A7,
            recycle_mode: RecycleMode::Regenerate,
            collision: CollisionConfig::default(),
        }
    }
}

impl TerrainConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded terrain config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document. Absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: TerrainConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tile_area(&self) -> f32 {
        self.tile_length * self.tile_length
    }

    pub fn bump_profile(&self) -> BumpProfile {
        BumpProfile {
            amplitude: self.bump_amplitude,
            sigma: self.bump_sigma,
        }
    }

    /// Check every field once, up front. Nothing downstream re-validates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tile_length.is_finite() && self.tile_length > 0.0) {
            return Err(ConfigError::invalid("tile_length", "must be a positive number"));
        }
        if self.tile_resolution < 2 {
            return Err(ConfigError::invalid("tile_resolution", "need at least 2 samples per side"));
        }
        if self.tile_resolution > MAX_TILE_RESOLUTION {
            return Err(ConfigError::invalid(
                "tile_resolution",
                format!("at most {MAX_TILE_RESOLUTION} samples per side"),
            ));
        }
        if !(self.min_separation.is_finite() && self.min_separation >= 0.0) {
            return Err(ConfigError::invalid("min_separation", "must be a non-negative number"));
        }
        if !(self.bump_sigma.is_finite() && self.bump_sigma > 0.0) {
            return Err(ConfigError::invalid("bump_sigma", "must be a positive number"));
        }
        if !(self.bump_amplitude.is_finite() && self.bump_amplitude >= 0.0) {
            return Err(ConfigError::invalid("bump_amplitude", "must be a non-negative number"));
        }
        if !self.uv_repeat.is_finite() {
            return Err(ConfigError::invalid("uv_repeat", "must be finite"));
        }
        if self.max_placement_attempts == 0 {
            return Err(ConfigError::invalid("max_placement_attempts", "must be at least 1"));
        }

        let c = &self.collision;
        for (field, value) in [
            ("collision.rock_threshold", c.rock_threshold),
            ("collision.housing_threshold", c.housing_threshold),
            ("collision.pushback", c.pushback),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(field, "must be a non-negative number"));
            }
        }

        check_feasible(self.obstacles_per_tile, self.min_separation, self.tile_area())
    }
}

/// Reject obstacle counts whose exclusion disks alone cover the tile.
///
/// `count * PI * min_separation^2 >= tile_area` is treated as unsatisfiable.
pub fn check_feasible(count: usize, min_separation: f32, tile_area: f32) -> Result<(), ConfigError> {
    if count == 0 {
        return Ok(());
    }
    let covered = count as f32 * PI * min_separation * min_separation;
    if covered >= tile_area {
        return Err(ConfigError::Infeasible {
            count,
            min_separation,
            tile_area,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        TerrainConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TerrainConfig::from_toml_str(
            r#"
            tile_length = 50.0
            obstacles_per_tile = 3
            min_separation = 10.0
            recycle_mode = "translate"

            [collision]
            pushback = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.tile_length, 50.0);
        assert_eq!(config.obstacles_per_tile, 3);
        assert_eq!(config.recycle_mode, RecycleMode::Translate);
        assert_eq!(config.collision.pushback, 0.5);
        assert_eq!(config.collision.rock_threshold, CollisionConfig::default().rock_threshold);
        assert_eq!(config.tile_resolution, TerrainConfig::default().tile_resolution);
    }

    #[test]
    fn crowded_tile_is_rejected_before_sampling() {
        let config = TerrainConfig {
            tile_length: 10.0,
            obstacles_per_tile: 10,
            min_separation: 5.0,
            ..TerrainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Infeasible { count: 10, .. })));
    }

    #[test]
    fn too_few_samples_is_invalid() {
        let config = TerrainConfig {
            tile_resolution: 1,
            ..TerrainConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "tile_resolution", .. })
        ));
    }

    #[test]
    fn oversized_resolution_is_invalid() {
        let config = TerrainConfig {
            tile_resolution: MAX_TILE_RESOLUTION + 1,
            ..TerrainConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "tile_resolution", .. })
        ));
        let largest = TerrainConfig {
            tile_resolution: MAX_TILE_RESOLUTION,
            ..TerrainConfig::default()
        };
        assert!(largest.validate().is_ok());
        assert!((MAX_TILE_RESOLUTION as u64).pow(2) <= u32::MAX as u64);
    }

    #[test]
    fn negative_pushback_is_invalid() {
        let mut config = TerrainConfig::default();
        config.collision.pushback = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "collision.pushback", .. })
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = TerrainConfig::from_toml_str("tile_length = \"wide\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = TerrainConfig::load("/definitely/not/here/terrain.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
