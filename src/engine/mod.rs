// Engine module: terrain window, collision, and the ECS/camera/overlay glue
// that drives it.

pub mod camera;
pub mod collision;
pub mod components;
pub mod config;
pub mod debug_overlay;
pub mod error;
pub mod input;
pub mod mesh;
pub mod obstacles;
pub mod skin;
pub mod subdivide;
pub mod systems;
pub mod terrain;
pub mod tiles;

// Re-export commonly used items
pub use components::*;
pub use config::{CollisionConfig, RecycleMode, TerrainConfig};
pub use error::{ConfigError, GenerationError, TerrainError, TerrainResult};
pub use obstacles::{ObstacleKind, ObstacleRecord, ObstacleRegistry, TileIndex};
pub use tiles::TileCoordinateMap;
