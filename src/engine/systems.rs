// ECS systems for the boat scene.
// Each runs once per frame over the World, in the order main.rs calls them:
// steer_boat → movement_system → advance_terrain → resolve_boat_collisions.

use std::collections::BTreeSet;

use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};

use super::collision;
use super::components::*;
use super::error::TerrainResult;
use super::input::BoatControls;
use super::obstacles::TileIndex;
use super::tiles::TileCoordinateMap;

/// The rolling terrain window, shared with the renderer through the World.
#[derive(Resource)]
pub struct Terrain(pub TileCoordinateMap);

pub fn spawn_boat(world: &mut World, planar: Vec2, height: f32) -> Entity {
    world
        .spawn((
            Transform::from_position(Vec3::new(planar.x, height, planar.y)),
            Velocity::default(),
            Boat::default(),
        ))
        .id()
}

/// Apply helm input to every boat's heading and speed, then set its velocity.
pub fn steer_boat(world: &mut World, controls: BoatControls, dt: f32) {
    let mut query = world.query::<(&mut Boat, &mut Velocity)>();
    for (mut boat, mut velocity) in query.iter_mut(world) {
        boat.heading += controls.steer * boat.turn_rate * dt;

        if controls.throttle != 0.0 {
            boat.speed += controls.throttle * boat.acceleration * dt;
        } else {
            boat.speed *= (1.0 - boat.drag * dt).max(0.0);
        }
        // Reverse is half speed
        boat.speed = boat.speed.clamp(-0.5 * boat.max_speed, boat.max_speed);

        let planar = boat.forward() * boat.speed;
        velocity.linear = Vec3::new(planar.x, 0.0, planar.y);
    }
}

/// Integrate velocity into position.
pub fn movement_system(world: &mut World, dt: f32) {
    let mut query = world.query::<(&mut Transform, &Velocity)>();
    for (mut transform, velocity) in query.iter_mut(world) {
        transform.position += velocity.linear * dt;
    }
}

/// Scroll the terrain window under the boat. Returns the recycled slots so
/// the renderer can re-upload their meshes.
pub fn advance_terrain(world: &mut World) -> TerrainResult<BTreeSet<TileIndex>> {
    let Some(boat) = boat_position(world) else {
        return Ok(BTreeSet::new());
    };
    world.resource_mut::<Terrain>().0.update(boat)
}

/// Nudge every boat out of obstacle thresholds.
pub fn resolve_boat_collisions(world: &mut World) {
    world.resource_scope(|world, terrain: Mut<Terrain>| {
        let map = &terrain.0;
        let mut query = world.query_filtered::<&mut Transform, With<Boat>>();
        for mut transform in query.iter_mut(world) {
            let resolved = collision::resolve(transform.planar(), map.registry(), &map.config().collision);
            if resolved != transform.planar() {
                log::trace!("Boat pushed from {} to {}", transform.planar(), resolved);
                transform.set_planar(resolved);
            }
        }
    });
}

/// Planar position of the first boat, if one exists.
pub fn boat_position(world: &mut World) -> Option<Vec2> {
    let mut query = world.query_filtered::<&Transform, With<Boat>>();
    query.iter(world).next().map(Transform::planar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::TerrainConfig;

    fn world_with_terrain() -> World {
        let config = TerrainConfig {
            tile_length: 40.0,
            tile_resolution: 4,
            min_separation: 6.0,
            ..TerrainConfig::default()
        };
        let mut world = World::new();
        world.insert_resource(Terrain(TileCoordinateMap::initialize(config).unwrap()));
        world
    }

    fn boat(world: &World, entity: Entity) -> Boat {
        *world.get::<Boat>(entity).unwrap()
    }

    #[test]
    fn throttle_moves_boat_forward() {
        let mut world = World::new();
        let entity = spawn_boat(&mut world, Vec2::ZERO, 1.0);
        let ahead = BoatControls { throttle: 1.0, steer: 0.0 };

        for _ in 0..10 {
            steer_boat(&mut world, ahead, 0.1);
            movement_system(&mut world, 0.1);
        }

        let transform = world.get::<Transform>(entity).unwrap();
        assert!(transform.position.x > 0.0);
        assert!(transform.position.z.abs() < 1e-5);
        assert_eq!(transform.position.y, 1.0);
    }

    #[test]
    fn speed_is_capped_and_decays() {
        let mut world = World::new();
        let entity = spawn_boat(&mut world, Vec2::ZERO, 0.0);
        let max = boat(&world, entity).max_speed;

        steer_boat(&mut world, BoatControls { throttle: 1.0, steer: 0.0 }, 100.0);
        assert_eq!(boat(&world, entity).speed, max);

        steer_boat(&mut world, BoatControls::default(), 0.1);
        let coasting = boat(&world, entity).speed;
        assert!(coasting < max && coasting > 0.0);

        steer_boat(&mut world, BoatControls { throttle: -1.0, steer: 0.0 }, 100.0);
        assert_eq!(boat(&world, entity).speed, -0.5 * max);
    }

    #[test]
    fn starboard_rudder_turns_toward_positive_z() {
        let mut world = World::new();
        let entity = spawn_boat(&mut world, Vec2::ZERO, 0.0);
        steer_boat(&mut world, BoatControls { throttle: 1.0, steer: 1.0 }, 0.5);
        movement_system(&mut world, 0.5);

        assert!(boat(&world, entity).heading > 0.0);
        assert!(world.get::<Transform>(entity).unwrap().position.z > 0.0);
    }

    #[test]
    fn terrain_follows_boat() {
        let mut world = world_with_terrain();
        let entity = spawn_boat(&mut world, Vec2::new(5.0, 5.0), 1.0);
        assert!(advance_terrain(&mut world).unwrap().is_empty());

        world.get_mut::<Transform>(entity).unwrap().position.x = 45.0;
        let recycled = advance_terrain(&mut world).unwrap();
        assert_eq!(recycled.len(), 3);
        assert_eq!(world.resource::<Terrain>().0.c_ini(), 2);
    }

    #[test]
    fn boat_is_pushed_off_an_obstacle() {
        let mut world = world_with_terrain();
        let registry = world.resource::<Terrain>().0.registry();
        let site = registry
            .all_records()
            .map(|r| r.position)
            .find(|&p| registry.query(p, 3.0).count() == 1)
            .unwrap();
        let start = site + Vec2::new(0.1, 0.0);
        let entity = spawn_boat(&mut world, start, 1.0);

        resolve_boat_collisions(&mut world);
        let after = world.get::<Transform>(entity).unwrap().planar();
        assert!((after.x - start.x - 0.1).abs() < 1e-4, "{start} -> {after}");
        assert_eq!(world.get::<Transform>(entity).unwrap().position.y, 1.0);
    }

    #[test]
    fn no_boat_means_no_scrolling() {
        let mut world = world_with_terrain();
        assert!(advance_terrain(&mut world).unwrap().is_empty());
        assert_eq!(boat_position(&mut world), None);
    }
}
