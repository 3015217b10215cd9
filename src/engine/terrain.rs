// Procedural terrain tiles.
//
// A tile is a square patch of height field with a handful of bumps. Bump
// centers double as obstacle sites: they are placed by rejection sampling so
// that no two sites in a tile are closer than `min_separation`, and each site
// becomes one ObstacleRecord.
//
// Tile-local coordinates run from (0, 0) to (L, L) on the X/Z plane; a tile's
// world origin is its minimum corner.

use std::f32::consts::TAU;

use glam::{IVec2, Vec2};
use rand::Rng;

use super::config::{check_feasible, TerrainConfig};
use super::error::{GenerationError, TerrainResult};
use super::mesh::{grid_mesh, TileMesh};
use super::obstacles::{ObstacleKind, ObstacleRecord};

// ============================================================================
// BOUNDS + HEIGHT FIELD
// ============================================================================

/// Axis-aligned rectangle on the X/Z plane, `min` inclusive, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl TileBounds {
    /// Square of side `length` whose minimum corner is `origin`.
    pub fn square(origin: Vec2, length: f32) -> Self {
        Self { min: origin, max: origin + Vec2::splat(length) }
    }

    pub fn size(&self) -> Vec2 { self.max - self.min }

    pub fn area(&self) -> f32 {
        let s = self.size();
        s.x * s.y
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
    }
}

/// Shape of one Gaussian bump: `amplitude * exp(-d² / (2σ²))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BumpProfile {
    pub amplitude: f32,
    pub sigma: f32,
}

impl BumpProfile {
    #[inline]
    pub fn bump(&self, dist_sq: f32) -> f32 {
        self.amplitude * (-dist_sq / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// Height at `point`: the sum of one bump per center.
///
/// Lies in `[0, amplitude * centers.len()]` for a non-negative amplitude.
pub fn height_field(point: Vec2, centers: &[Vec2], profile: &BumpProfile) -> f32 {
    centers
        .iter()
        .map(|c| profile.bump(point.distance_squared(*c)))
        .sum()
}

// ============================================================================
// REJECTION SAMPLING
// ============================================================================

/// Draw `count` points inside `bounds`, pairwise at least `min_separation` apart.
///
/// Fails fast with a config error when the exclusion disks cannot fit in the
/// bounds, and with a `GenerationError` once `max_attempts` candidates have
/// been drawn without filling the quota.
pub fn generate_centers<R: Rng + ?Sized>(
    bounds: &TileBounds,
    count: usize,
    min_separation: f32,
    max_attempts: u32,
    rng: &mut R,
) -> TerrainResult<Vec<Vec2>> {
    check_feasible(count, min_separation, bounds.area())?;

    let min_sq = min_separation * min_separation;
    let mut centers: Vec<Vec2> = Vec::with_capacity(count);
    let mut attempts = 0u32;

    while centers.len() < count {
        if attempts >= max_attempts {
            log::warn!(
                "Obstacle placement gave up: {}/{} placed after {} draws",
                centers.len(), count, attempts
            );
            return Err(GenerationError {
                placed: centers.len(),
                requested: count,
                attempts,
            }
            .into());
        }
        attempts += 1;

        let candidate = Vec2::new(
            rng.gen_range(bounds.min.x..bounds.max.x),
            rng.gen_range(bounds.min.y..bounds.max.y),
        );
        if centers.iter().all(|c| c.distance_squared(candidate) >= min_sq) {
            centers.push(candidate);
        }
    }

    log::trace!("Placed {} obstacle sites in {} draws", count, attempts);
    Ok(centers)
}

// ============================================================================
// MESHES
// ============================================================================

/// Sample the height field of `centers` on an N×N grid spanning `bounds`.
pub fn build_mesh(
    resolution: u32,
    bounds: &TileBounds,
    centers: &[Vec2],
    profile: &BumpProfile,
    uv_repeat: f32,
) -> TileMesh {
    grid_mesh(resolution, bounds.min, bounds.max, uv_repeat, |p| {
        height_field(p, centers, profile)
    })
}

/// Flat sheet at `level`, same sampling as the terrain so the two line up.
pub fn build_water_mesh(resolution: u32, bounds: &TileBounds, level: f32, uv_repeat: f32) -> TileMesh {
    grid_mesh(resolution, bounds.min, bounds.max, uv_repeat, |_| level)
}

// ============================================================================
// OBSTACLE ATTRIBUTES
// ============================================================================

/// Turn tile-local centers into world-space obstacle records.
///
/// Kind, rotation and accessory count are drawn independently per site.
pub fn assign_obstacle_attributes<R: Rng + ?Sized>(
    centers: &[Vec2],
    origin: Vec2,
    profile: &BumpProfile,
    max_accessories: u32,
    rng: &mut R,
) -> Vec<ObstacleRecord> {
    centers
        .iter()
        .map(|&local| ObstacleRecord {
            position: origin + local,
            kind: ObstacleKind::ALL[rng.gen_range(0..ObstacleKind::ALL.len())],
            rotation: rng.gen_range(0.0..TAU),
            accessory_count: rng.gen_range(0..=max_accessories),
            elevation: height_field(local, centers, profile),
        })
        .collect()
}

// ============================================================================
// TILE
// ============================================================================

/// One slot's worth of terrain: mesh in local coordinates, obstacles in world
/// coordinates.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Absolute (column, row) address in the unbounded tile lattice.
    pub lattice: IVec2,
    /// World position of the tile's minimum corner.
    pub origin: Vec2,
    pub length: f32,
    /// Bump centers in tile-local coordinates.
    pub centers: Vec<Vec2>,
    pub profile: BumpProfile,
    pub mesh: TileMesh,
    pub obstacles: Vec<ObstacleRecord>,
}

impl Tile {
    pub fn bounds(&self) -> TileBounds {
        TileBounds::square(self.origin, self.length)
    }

    pub fn contains(&self, world: Vec2) -> bool {
        self.bounds().contains(world)
    }

    /// Terrain height under a world-space point.
    pub fn surface_height(&self, world: Vec2) -> f32 {
        height_field(world - self.origin, &self.centers, &self.profile)
    }
}

/// Builds tiles from a validated config. Holds no RNG; callers pass one in.
#[derive(Debug, Clone)]
pub struct TerrainTileGenerator {
    pub tile_length: f32,
    pub resolution: u32,
    pub obstacle_count: usize,
    pub min_separation: f32,
    pub max_attempts: u32,
    pub max_accessories: u32,
    pub uv_repeat: f32,
    pub profile: BumpProfile,
}

impl TerrainTileGenerator {
    pub fn new(config: &TerrainConfig) -> Self {
        Self {
            tile_length: config.tile_length,
            resolution: config.tile_resolution,
            obstacle_count: config.obstacles_per_tile,
            min_separation: config.min_separation,
            max_attempts: config.max_placement_attempts,
            max_accessories: config.max_accessories,
            uv_repeat: config.uv_repeat,
            profile: config.bump_profile(),
        }
    }

    /// Local bounds shared by every tile.
    pub fn local_bounds(&self) -> TileBounds {
        TileBounds::square(Vec2::ZERO, self.tile_length)
    }

    pub fn generate_tile<R: Rng + ?Sized>(
        &self,
        lattice: IVec2,
        origin: Vec2,
        rng: &mut R,
    ) -> TerrainResult<Tile> {
        let bounds = self.local_bounds();
        let centers = generate_centers(
            &bounds,
            self.obstacle_count,
            self.min_separation,
            self.max_attempts,
            rng,
        )?;
        let mesh = build_mesh(self.resolution, &bounds, &centers, &self.profile, self.uv_repeat);
        let obstacles =
            assign_obstacle_attributes(&centers, origin, &self.profile, self.max_accessories, rng);

        Ok(Tile {
            lattice,
            origin,
            length: self.tile_length,
            centers,
            profile: self.profile,
            mesh,
            obstacles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::TerrainError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn assert_separated(points: &[Vec2], min_separation: f32) {
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert!(
                    a.distance(*b) >= min_separation - 1e-4,
                    "{a} and {b} closer than {min_separation}"
                );
            }
        }
    }

    #[test]
    fn scenario_three_sites_on_fifty_unit_tile() {
        let config = TerrainConfig {
            tile_length: 50.0,
            tile_resolution: 16,
            obstacles_per_tile: 3,
            min_separation: 10.0,
            ..TerrainConfig::default()
        };
        let generator = TerrainTileGenerator::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tile = generator.generate_tile(IVec2::ZERO, Vec2::ZERO, &mut rng).unwrap();

        assert_eq!(tile.centers.len(), 3);
        assert_separated(&tile.centers, 10.0);
        assert_eq!(tile.mesh.vertex_count(), 16 * 16);
    }

    #[test]
    fn separation_holds_across_seeds() {
        let config = TerrainConfig { tile_resolution: 4, ..TerrainConfig::default() };
        let generator = TerrainTileGenerator::new(&config);
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let tile = generator.generate_tile(IVec2::ZERO, Vec2::ZERO, &mut rng).unwrap();
            let positions: Vec<Vec2> = tile.obstacles.iter().map(|o| o.position).collect();
            assert_eq!(positions.len(), config.obstacles_per_tile);
            assert_separated(&positions, config.min_separation);
        }
    }

    #[test]
    fn centers_stay_inside_bounds() {
        let bounds = TileBounds::square(Vec2::new(-30.0, 12.0), 8.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let centers = generate_centers(&bounds, 5, 1.0, 10_000, &mut rng).unwrap();
        assert!(centers.iter().all(|c| bounds.contains(*c)));
    }

    #[test]
    fn exhausted_budget_is_a_generation_error() {
        let bounds = TileBounds::square(Vec2::ZERO, 20.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate_centers(&bounds, 4, 2.5, 2, &mut rng).unwrap_err();
        match err {
            TerrainError::Generation(e) => {
                assert_eq!(e.requested, 4);
                assert_eq!(e.attempts, 2);
                assert!(e.placed <= 2);
            }
            other => panic!("expected generation error, got {other:?}"),
        }
    }

    #[test]
    fn infeasible_request_fails_before_sampling() {
        let bounds = TileBounds::square(Vec2::ZERO, 10.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate_centers(&bounds, 10, 5.0, 1_000_000, &mut rng).unwrap_err();
        assert!(matches!(err, TerrainError::Config(_)));
    }

    #[test]
    fn zero_obstacles_is_fine() {
        let bounds = TileBounds::square(Vec2::ZERO, 10.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(generate_centers(&bounds, 0, 5.0, 1, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn height_field_is_bounded_by_bump_sum() {
        let profile = BumpProfile { amplitude: 2.0, sigma: 1.5 };
        let bounds = TileBounds::square(Vec2::ZERO, 20.0);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let centers = generate_centers(&bounds, 4, 2.0, 10_000, &mut rng).unwrap();
        let ceiling = profile.amplitude * centers.len() as f32;

        for i in 0..=200 {
            for j in 0..=200 {
                let p = Vec2::new(i as f32, j as f32) * 0.1;
                let h = height_field(p, &centers, &profile);
                assert!((0.0..=ceiling).contains(&h), "height {h} at {p}");
            }
        }
    }

    #[test]
    fn height_peaks_at_isolated_center() {
        let profile = BumpProfile { amplitude: 3.0, sigma: 2.0 };
        let centers = [Vec2::new(5.0, 5.0)];
        assert!((height_field(centers[0], &centers, &profile) - 3.0).abs() < 1e-6);
        assert!(height_field(Vec2::new(50.0, 50.0), &centers, &profile) < 1e-6);
    }

    #[test]
    fn mesh_counts_follow_resolution() {
        let profile = BumpProfile { amplitude: 1.0, sigma: 1.0 };
        let bounds = TileBounds::square(Vec2::ZERO, 10.0);
        let centers = [Vec2::splat(5.0)];
        for n in [2u32, 3, 10, 33] {
            let mesh = build_mesh(n, &bounds, &centers, &profile, 1.0);
            assert_eq!(mesh.vertex_count(), (n * n) as usize);
            assert_eq!(mesh.triangle_count(), 2 * ((n - 1) * (n - 1)) as usize);
        }
    }

    #[test]
    fn water_sheet_is_flat() {
        let bounds = TileBounds::square(Vec2::ZERO, 10.0);
        let water = build_water_mesh(6, &bounds, 1.25, 2.0);
        assert!(water.positions.iter().all(|p| p.y == 1.25));
    }

    #[test]
    fn attributes_are_in_range_and_cover_every_kind() {
        let profile = BumpProfile { amplitude: 1.0, sigma: 1.0 };
        let centers: Vec<Vec2> = (0..400).map(|i| Vec2::new(i as f32 * 3.0, 0.0)).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let records = assign_obstacle_attributes(&centers, Vec2::new(100.0, -40.0), &profile, 3, &mut rng);

        assert_eq!(records.len(), centers.len());
        for (record, local) in records.iter().zip(&centers) {
            assert_eq!(record.position, Vec2::new(100.0, -40.0) + *local);
            assert!((0.0..TAU).contains(&record.rotation));
            assert!(record.accessory_count <= 3);
        }
        for kind in ObstacleKind::ALL {
            assert!(records.iter().any(|r| r.kind == kind), "{kind:?} never drawn");
        }
    }

    #[test]
    fn same_seed_same_tile() {
        let generator = TerrainTileGenerator::new(&TerrainConfig {
            tile_resolution: 8,
            ..TerrainConfig::default()
        });
        let a = generator
            .generate_tile(IVec2::new(4, -2), Vec2::new(80.0, -40.0), &mut ChaCha8Rng::seed_from_u64(99))
            .unwrap();
        let b = generator
            .generate_tile(IVec2::new(4, -2), Vec2::new(80.0, -40.0), &mut ChaCha8Rng::seed_from_u64(99))
            .unwrap();
        assert_eq!(a.centers, b.centers);
        assert_eq!(a.obstacles, b.obstacles);
        assert_eq!(a.mesh.positions, b.mesh.positions);
    }

    #[test]
    fn obstacles_sit_inside_their_tile() {
        let generator = TerrainTileGenerator::new(&TerrainConfig::default());
        let origin = Vec2::new(-20.0, 40.0);
        let tile = generator
            .generate_tile(IVec2::new(-1, 2), origin, &mut ChaCha8Rng::seed_from_u64(2))
            .unwrap();
        for o in &tile.obstacles {
            assert!(tile.contains(o.position));
            assert!((tile.surface_height(o.position) - o.elevation).abs() < 1e-3);
        }
    }
}
