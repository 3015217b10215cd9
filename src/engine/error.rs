// Error types for terrain configuration and tile generation.
//
// ConfigError is raised before any sampling happens; GenerationError only
// when the rejection sampler runs out of attempts.

use std::path::PathBuf;

/// Problems detected while loading or validating a `TerrainConfig`.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },

    #[error(
        "{count} obstacles with separation {min_separation} cannot fit in a tile of area {tile_area}"
    )]
    Infeasible {
        count: usize,
        min_separation: f32,
        tile_area: f32,
    },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn invalid<T: ToString>(field: &'static str, reason: T) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        }
    }
}

/// Rejection sampling gave up before placing every obstacle.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("placed only {placed} of {requested} obstacles after {attempts} attempts")]
pub struct GenerationError {
    pub placed: usize,
    pub requested: usize,
    pub attempts: u32,
}

/// Anything that can go wrong while building or advancing the tile window.
#[derive(thiserror::Error, Debug)]
pub enum TerrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub type TerrainResult<T> = Result<T, TerrainError>;
