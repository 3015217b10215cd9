// Obstacle records and the per-slot registry that owns the 3×3 tile window.
//
// Records are plain data. Rendering maps `ObstacleKind` to meshes and colors
// on its own side; nothing here knows about the GPU.

use std::f32::consts::TAU;

use glam::Vec2;

use super::error::TerrainResult;
use super::terrain::Tile;

// ============================================================================
// OBSTACLE RECORD
// ============================================================================

/// Prop placed at an obstacle site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObstacleKind {
    Boulder,
    Spire,
    Slab,
    Hut,
}

impl ObstacleKind {
    pub const ALL: [ObstacleKind; 4] = [
        ObstacleKind::Boulder,
        ObstacleKind::Spire,
        ObstacleKind::Slab,
        ObstacleKind::Hut,
    ];

    /// Housing uses the wider collision threshold; everything else is rock.
    pub fn is_housing(self) -> bool {
        matches!(self, ObstacleKind::Hut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleRecord {
    /// World-space X/Z position of the site.
    pub position: Vec2,
    pub kind: ObstacleKind,
    /// Yaw in radians, [0, 2π).
    pub rotation: f32,
    /// Number of small decorations scattered around the site.
    pub accessory_count: u32,
    /// Terrain height at the site.
    pub elevation: f32,
}

impl ObstacleRecord {
    /// Planar offsets for this site's accessories, evenly spaced on a ring of
    /// `radius` starting at the obstacle's own rotation.
    pub fn accessory_offsets(&self, radius: f32) -> impl Iterator<Item = Vec2> + '_ {
        let n = self.accessory_count;
        (0..n).map(move |i| {
            let angle = self.rotation + TAU * i as f32 / n as f32;
            Vec2::new(angle.cos(), angle.sin()) * radius
        })
    }
}

// ============================================================================
// TILE INDEX
// ============================================================================

/// Slot in the fixed 3×3 ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    pub col: usize,
    pub row: usize,
}

impl TileIndex {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }

    /// All nine slots, column-major.
    pub fn all() -> impl Iterator<Item = TileIndex> {
        (0..3).flat_map(|col| (0..3).map(move |row| TileIndex::new(col, row)))
    }

    /// Position in column-major order, 0..9.
    #[inline]
    pub fn flat(self) -> usize {
        debug_assert!(self.col < 3 && self.row < 3, "tile index out of ring: {self:?}");
        self.col * 3 + self.row
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// The nine live tiles and their obstacle lists.
///
/// Written only by the tile window when it recycles a slot; read every frame
/// by collision and rendering.
#[derive(Debug, Clone)]
pub struct ObstacleRegistry {
    tiles: Vec<Tile>,
}

impl ObstacleRegistry {
    /// Build all nine slots, stopping at the first failure.
    pub fn from_fn(mut build: impl FnMut(TileIndex) -> TerrainResult<Tile>) -> TerrainResult<Self> {
        let tiles = TileIndex::all().map(&mut build).collect::<TerrainResult<Vec<_>>>()?;
        Ok(Self { tiles })
    }

    pub fn tile(&self, index: TileIndex) -> &Tile {
        &self.tiles[index.flat()]
    }

    pub(super) fn tile_mut(&mut self, index: TileIndex) -> &mut Tile {
        &mut self.tiles[index.flat()]
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TileIndex, &Tile)> {
        TileIndex::all().zip(&self.tiles)
    }

    pub fn records(&self, index: TileIndex) -> &[ObstacleRecord] {
        &self.tile(index).obstacles
    }

    /// Every record in the window, slot by slot.
    pub fn all_records(&self) -> impl Iterator<Item = &ObstacleRecord> {
        self.tiles.iter().flat_map(|t| t.obstacles.iter())
    }

    pub fn obstacle_count(&self) -> usize {
        self.tiles.iter().map(|t| t.obstacles.len()).sum()
    }

    /// Shift a tile's origin and every one of its records by `delta`.
    pub fn translate(&mut self, index: TileIndex, delta: Vec2) {
        let tile = self.tile_mut(index);
        tile.origin += delta;
        for record in &mut tile.obstacles {
            record.position += delta;
        }
    }

    /// Swap in a freshly generated tile, returning the old one.
    pub(super) fn replace(&mut self, index: TileIndex, tile: Tile) -> Tile {
        std::mem::replace(self.tile_mut(index), tile)
    }

    /// Records within `radius` of `point`. Linear scan; the window holds a few
    /// dozen obstacles at most.
    pub fn query(&self, point: Vec2, radius: f32) -> impl Iterator<Item = &ObstacleRecord> {
        let radius_sq = radius * radius;
        self.all_records()
            .filter(move |r| r.position.distance_squared(point) <= radius_sq)
    }

    /// Slot whose tile covers `point`, if any.
    pub fn locate(&self, point: Vec2) -> Option<TileIndex> {
        self.tiles().find(|(_, t)| t.contains(point)).map(|(i, _)| i)
    }
}
