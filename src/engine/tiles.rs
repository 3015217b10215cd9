// Rolling 3×3 tile window.
//
// Slots never move. Each one holds the tile whose lattice column c satisfies
// (c + 1) mod 3 == slot column (rows likewise), so scrolling the window only
// touches the slots that fall off the trailing edge. Cini/Rini track the
// window coordinate of the middle tile, which is its lattice coordinate + 1.

use std::collections::BTreeSet;

use glam::{IVec2, Vec2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::config::{RecycleMode, TerrainConfig};
use super::error::TerrainResult;
use super::obstacles::{ObstacleRegistry, TileIndex};
use super::terrain::{TerrainTileGenerator, Tile};

/// Per-tile RNG seed: the world seed mixed with the tile's lattice address.
///
/// SplitMix64 finalizer, so neighbouring coordinates land far apart.
pub fn tile_seed(world_seed: u64, lattice: IVec2) -> u64 {
    let packed = ((lattice.x as u32 as u64) << 32) | lattice.y as u32 as u64;
    let mut z = world_seed ^ packed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Column,
    Row,
}

impl Axis {
    fn unit(self) -> IVec2 {
        match self {
            Axis::Column => IVec2::X,
            Axis::Row => IVec2::Y,
        }
    }

    fn slots(self, ring: usize) -> [TileIndex; 3] {
        match self {
            Axis::Column => [0, 1, 2].map(|row| TileIndex::new(ring, row)),
            Axis::Row => [0, 1, 2].map(|col| TileIndex::new(col, ring)),
        }
    }
}

/// Owns the nine live tiles and scrolls them under a moving agent.
pub struct TileCoordinateMap {
    config: TerrainConfig,
    generator: TerrainTileGenerator,
    registry: ObstacleRegistry,
    c_ini: i32,
    r_ini: i32,
    recycled_total: u64,
}

impl TileCoordinateMap {
    /// Validate `config` and build the initial window around the lattice origin.
    pub fn initialize(config: TerrainConfig) -> TerrainResult<Self> {
        config.validate()?;
        let generator = TerrainTileGenerator::new(&config);
        let (c_ini, r_ini) = (1, 1);

        let registry = ObstacleRegistry::from_fn(|idx| {
            let lattice = IVec2::new(idx.col as i32 - c_ini, idx.row as i32 - r_ini);
            build_tile(&generator, &config, lattice)
        })?;

        log::info!(
            "Terrain window ready: 9 tiles of {}u, {} obstacles, mode {:?}",
            config.tile_length,
            registry.obstacle_count(),
            config.recycle_mode
        );

        Ok(Self {
            config,
            generator,
            registry,
            c_ini,
            r_ini,
            recycled_total: 0,
        })
    }

    /// Scroll the window so the agent's tile sits in the middle slot.
    ///
    /// Returns every slot whose contents changed this call. Any displacement
    /// is handled in one call; in `Regenerate` mode each touched slot is
    /// rebuilt once, from its final lattice coordinate.
    ///
    /// All or nothing: if any replacement tile fails to generate, the error
    /// is returned and the window, counters included, is left untouched, so
    /// the next call retries the same move.
    pub fn update(&mut self, agent: Vec2) -> TerrainResult<BTreeSet<TileIndex>> {
        let desired = self.desired_window(agent);

        let mut shifts = [IVec2::ZERO; 9];
        plan_axis(Axis::Column, self.c_ini, desired.x, &mut shifts);
        plan_axis(Axis::Row, self.r_ini, desired.y, &mut shifts);

        let recycled: BTreeSet<TileIndex> = TileIndex::all()
            .filter(|idx| shifts[idx.flat()] != IVec2::ZERO)
            .collect();
        if recycled.is_empty() {
            return Ok(recycled);
        }

        match self.config.recycle_mode {
            RecycleMode::Regenerate => {
                let fresh = recycled
                    .iter()
                    .map(|&idx| {
                        let lattice = self.registry.tile(idx).lattice + shifts[idx.flat()];
                        build_tile(&self.generator, &self.config, lattice).map(|tile| (idx, tile))
                    })
                    .collect::<TerrainResult<Vec<_>>>()?;
                for (idx, tile) in fresh {
                    self.registry.replace(idx, tile);
                }
            }
            RecycleMode::Translate => {
                for &idx in &recycled {
                    let lattice_delta = shifts[idx.flat()];
                    self.registry.translate(idx, lattice_delta.as_vec2() * self.config.tile_length);
                    self.registry.tile_mut(idx).lattice += lattice_delta;
                }
            }
        }

        self.c_ini = desired.x;
        self.r_ini = desired.y;
        self.recycled_total += recycled.len() as u64;
        log::debug!(
            "Window moved to Cini={} Rini={}, recycled {} tile(s)",
            self.c_ini,
            self.r_ini,
            recycled.len()
        );
        Ok(recycled)
    }

    /// Window coordinate the middle slot should have for `agent`.
    fn desired_window(&self, agent: Vec2) -> IVec2 {
        (agent / self.config.tile_length).floor().as_ivec2() + IVec2::ONE
    }

    pub fn c_ini(&self) -> i32 {
        self.c_ini
    }

    pub fn r_ini(&self) -> i32 {
        self.r_ini
    }

    pub fn registry(&self) -> &ObstacleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn tile_length(&self) -> f32 {
        self.config.tile_length
    }

    /// Slot currently holding the middle tile.
    pub fn center_index(&self) -> TileIndex {
        TileIndex::new(self.c_ini.rem_euclid(3) as usize, self.r_ini.rem_euclid(3) as usize)
    }

    pub fn center_lattice(&self) -> IVec2 {
        IVec2::new(self.c_ini - 1, self.r_ini - 1)
    }

    /// Tiles recycled since initialization.
    pub fn recycled_total(&self) -> u64 {
        self.recycled_total
    }

    /// Terrain height under `world`, if a live tile covers it.
    pub fn surface_height(&self, world: Vec2) -> Option<f32> {
        let idx = self.registry.locate(world)?;
        Some(self.registry.tile(idx).surface_height(world))
    }
}

/// Build the tile at `lattice` from its own seeded RNG.
fn build_tile(
    generator: &TerrainTileGenerator,
    config: &TerrainConfig,
    lattice: IVec2,
) -> TerrainResult<Tile> {
    let origin = lattice.as_vec2() * config.tile_length;
    let mut rng = ChaCha8Rng::seed_from_u64(tile_seed(config.seed, lattice));
    generator.generate_tile(lattice, origin, &mut rng)
}

/// Accumulate the lattice shift each slot needs to take one axis of the
/// window counter from `from` to `to`.
fn plan_axis(axis: Axis, from: i32, to: i32, shifts: &mut [IVec2; 9]) {
    let mut current = from;
    let mut remaining = to - from;

    // Whole cycles move every ring on this axis by the same amount.
    let cycles = remaining / 3;
    if cycles != 0 {
        for ring in 0..3 {
            shift_ring(axis, ring, cycles, shifts);
        }
        current += 3 * cycles;
        remaining -= 3 * cycles;
    }

    while remaining != 0 {
        let step = remaining.signum();
        let ring = (current - step).rem_euclid(3) as usize;
        shift_ring(axis, ring, step, shifts);
        current += step;
        remaining -= step;
    }
}

/// Move one ring of three slots by `cycles` full window widths.
fn shift_ring(axis: Axis, ring: usize, cycles: i32, shifts: &mut [IVec2; 9]) {
    for idx in axis.slots(ring) {
        shifts[idx.flat()] += axis.unit() * (3 * cycles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::TerrainError;
    use crate::engine::obstacles::ObstacleRecord;
    use rand::Rng;
    use std::collections::HashSet;

    fn small_config(mode: RecycleMode) -> TerrainConfig {
        TerrainConfig {
            tile_length: 20.0,
            tile_resolution: 6,
            recycle_mode: mode,
            ..TerrainConfig::default()
        }
    }

    fn origins(map: &TileCoordinateMap) -> Vec<Vec2> {
        map.registry().tiles().map(|(_, t)| t.origin).collect()
    }

    fn records(map: &TileCoordinateMap) -> Vec<ObstacleRecord> {
        map.registry().all_records().copied().collect()
    }

    /// The window must cover a 3×3 block of distinct lattice cells around the
    /// middle tile, and every tile's origin must match its lattice address.
    fn assert_window_consistent(map: &TileCoordinateMap) {
        let center = map.center_lattice();
        let mut seen = HashSet::new();
        for (idx, tile) in map.registry().tiles() {
            let offset = tile.lattice - center;
            assert!(offset.x.abs() <= 1 && offset.y.abs() <= 1, "{idx:?} at {:?}", tile.lattice);
            assert_eq!((tile.lattice.x + 1).rem_euclid(3) as usize, idx.col);
            assert_eq!((tile.lattice.y + 1).rem_euclid(3) as usize, idx.row);
            assert_eq!(tile.origin, tile.lattice.as_vec2() * map.tile_length());
            assert!(seen.insert(tile.lattice));
        }
        assert_eq!(map.registry().tile(map.center_index()).lattice, center);
    }

    #[test]
    fn initial_window_is_centered_on_origin() {
        let map = TileCoordinateMap::initialize(small_config(RecycleMode::Regenerate)).unwrap();
        assert_eq!((map.c_ini(), map.r_ini()), (1, 1));
        assert_eq!(map.center_index(), TileIndex::new(1, 1));
        assert_eq!(map.registry().tile(TileIndex::new(0, 2)).origin, Vec2::new(-20.0, 20.0));
        assert_eq!(map.registry().tile(TileIndex::new(1, 1)).origin, Vec2::ZERO);
        assert_window_consistent(&map);
    }

    #[test]
    fn crossing_one_boundary_recycles_one_column() {
        let config = TerrainConfig {
            tile_length: 50.0,
            tile_resolution: 8,
            obstacles_per_tile: 3,
            min_separation: 10.0,
            recycle_mode: RecycleMode::Translate,
            ..TerrainConfig::default()
        };
        let mut map = TileCoordinateMap::initialize(config).unwrap();

        assert!(map.update(Vec2::new(40.0, 25.0)).unwrap().is_empty());

        let column: Vec<TileIndex> = (0..3).map(|row| TileIndex::new(0, row)).collect();
        let before: Vec<f32> = column
            .iter()
            .flat_map(|&i| map.registry().records(i).iter().map(|r| r.position.x))
            .collect();

        let recycled = map.update(Vec2::new(60.0, 25.0)).unwrap();
        assert_eq!(recycled.into_iter().collect::<Vec<_>>(), column);
        assert_eq!(map.c_ini(), 2);
        assert_eq!(map.r_ini(), 1);

        let after: Vec<f32> = column
            .iter()
            .flat_map(|&i| map.registry().records(i).iter().map(|r| r.position.x))
            .collect();
        assert_eq!(before.len(), 9);
        for (b, a) in before.iter().zip(&after) {
            assert!((a - b - 150.0).abs() < 1e-3, "{b} -> {a}");
        }
        assert_window_consistent(&map);
    }

    #[test]
    fn there_and_back_restores_window() {
        for mode in [RecycleMode::Translate, RecycleMode::Regenerate] {
            let mut map = TileCoordinateMap::initialize(small_config(mode)).unwrap();
            let start_origins = origins(&map);
            let start_records = records(&map);

            assert_eq!(map.update(Vec2::new(25.0, 5.0)).unwrap().len(), 3);
            assert_eq!(map.update(Vec2::new(5.0, 5.0)).unwrap().len(), 3);

            assert_eq!(map.c_ini(), 1, "{mode:?}");
            assert_eq!(origins(&map), start_origins, "{mode:?}");
            let end_records = records(&map);
            for (a, b) in start_records.iter().zip(&end_records) {
                assert!(a.position.distance(b.position) < 1e-3, "{mode:?}");
                assert_eq!(a.kind, b.kind);
            }
            assert_eq!(map.recycled_total(), 6);
        }
    }

    #[test]
    fn regenerated_tiles_are_new_and_in_bounds() {
        let config = small_config(RecycleMode::Regenerate);
        let mut translated = TileCoordinateMap::initialize(TerrainConfig {
            recycle_mode: RecycleMode::Translate,
            ..config.clone()
        })
        .unwrap();
        let mut regenerated = TileCoordinateMap::initialize(config).unwrap();

        let agent = Vec2::new(30.0, 10.0);
        let recycled = regenerated.update(agent).unwrap();
        translated.update(agent).unwrap();

        for idx in recycled {
            let tile = regenerated.registry().tile(idx);
            assert_eq!(tile.lattice.x, 2);
            for r in &tile.obstacles {
                assert!(tile.contains(r.position));
            }
            assert_ne!(tile.obstacles, translated.registry().tile(idx).obstacles);
        }
        assert_window_consistent(&regenerated);
    }

    #[test]
    fn diagonal_crossing_recycles_five_slots() {
        let mut map = TileCoordinateMap::initialize(small_config(RecycleMode::Translate)).unwrap();
        let recycled = map.update(Vec2::new(30.0, 30.0)).unwrap();
        assert_eq!(recycled.len(), 5);
        assert!(recycled.contains(&TileIndex::new(0, 0)));
        assert!(!recycled.contains(&TileIndex::new(1, 1)));
        assert_eq!((map.c_ini(), map.r_ini()), (2, 2));
        assert_window_consistent(&map);
    }

    #[test]
    fn long_jump_recycles_everything_in_one_call() {
        for mode in [RecycleMode::Translate, RecycleMode::Regenerate] {
            let mut map = TileCoordinateMap::initialize(small_config(mode)).unwrap();
            let recycled = map.update(Vec2::new(10.0 + 20.0 * 7.0, 10.0)).unwrap();
            assert_eq!(recycled.len(), 9);
            assert_eq!(map.c_ini(), 8);
            assert_eq!(map.center_lattice(), IVec2::new(7, 0));
            assert_window_consistent(&map);
        }
    }

    #[test]
    fn negative_coordinates_scroll_the_other_way() {
        let mut map = TileCoordinateMap::initialize(small_config(RecycleMode::Regenerate)).unwrap();
        let agent = Vec2::new(-15.0, -35.0);
        map.update(agent).unwrap();
        assert_eq!(map.center_lattice(), IVec2::new(-1, -2));
        assert_eq!(map.center_index(), TileIndex::new(0, 2));
        assert!(map.registry().tile(map.center_index()).contains(agent));
        assert!(map.surface_height(agent).is_some());
        assert_window_consistent(&map);
    }

    #[test]
    fn random_walk_keeps_agent_in_middle_tile() {
        let mut map = TileCoordinateMap::initialize(small_config(RecycleMode::Translate)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut agent = Vec2::new(10.0, 10.0);
        for _ in 0..500 {
            agent += Vec2::new(
                rng.gen_range(-30..=30) as f32 * 0.5,
                rng.gen_range(-30..=30) as f32 * 0.5,
            );
            map.update(agent).unwrap();
            assert!(map.registry().tile(map.center_index()).contains(agent), "lost {agent}");
            assert_window_consistent(&map);
        }
    }

    #[test]
    fn exhausted_placement_budget_fails_initialization() {
        let config = TerrainConfig {
            obstacles_per_tile: 4,
            max_placement_attempts: 1,
            ..small_config(RecycleMode::Regenerate)
        };
        match TileCoordinateMap::initialize(config) {
            Err(TerrainError::Generation(e)) => {
                assert_eq!(e.requested, 4);
                assert_eq!(e.attempts, 1);
            }
            Err(other) => panic!("expected generation error, got {other:?}"),
            Ok(_) => panic!("four sites cannot be placed in one draw"),
        }
    }

    #[test]
    fn failed_regeneration_leaves_window_untouched() {
        let mut map = TileCoordinateMap::initialize(small_config(RecycleMode::Regenerate)).unwrap();
        let start_origins = origins(&map);
        let start_records = records(&map);
        let start_lattices: Vec<IVec2> = map.registry().tiles().map(|(_, t)| t.lattice).collect();

        // Four sites never fit in a single draw.
        map.generator.max_attempts = 1;
        let agent = Vec2::new(25.0, 5.0);
        assert!(matches!(map.update(agent), Err(TerrainError::Generation(_))));

        assert_eq!((map.c_ini(), map.r_ini()), (1, 1));
        assert_eq!(map.recycled_total(), 0);
        assert_eq!(origins(&map), start_origins);
        assert_eq!(records(&map), start_records);
        let lattices: Vec<IVec2> = map.registry().tiles().map(|(_, t)| t.lattice).collect();
        assert_eq!(lattices, start_lattices);
        assert_window_consistent(&map);

        // Same move again once generation can succeed.
        map.generator.max_attempts = 10_000;
        let recycled = map.update(agent).unwrap();
        assert_eq!(recycled.len(), 3);
        assert_eq!(map.c_ini(), 2);
        assert_window_consistent(&map);

        let fresh = TileCoordinateMap::initialize(small_config(RecycleMode::Regenerate)).unwrap();
        for idx in recycled {
            let tile = map.registry().tile(idx);
            let expected = build_tile(&fresh.generator, fresh.config(), tile.lattice).unwrap();
            assert_eq!(tile.obstacles, expected.obstacles);
        }
    }

    #[test]
    fn tile_seeds_differ_between_neighbours() {
        let seeds: HashSet<u64> = (-2..=2)
            .flat_map(|x| (-2..=2).map(move |y| tile_seed(7, IVec2::new(x, y))))
            .collect();
        assert_eq!(seeds.len(), 25);
        assert_eq!(tile_seed(7, IVec2::new(3, -4)), tile_seed(7, IVec2::new(3, -4)));
    }
}
