// ECS components for the boat scene.

use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};

/// World position. Y is up; the terrain lives on X/Z.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Transform {
    pub position: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position }
    }

    /// Position projected onto the terrain plane, (x, z).
    pub fn planar(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    pub fn set_planar(&mut self, planar: Vec2) {
        self.position.x = planar.x;
        self.position.z = planar.y;
    }
}

/// Units per second.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec3,
}

/// Player-steered hull.
///
/// `heading` is a yaw in radians measured from +X toward +Z, so the bow points
/// along `(cos heading, sin heading)` on the X/Z plane.
#[derive(Component, Debug, Clone, Copy)]
pub struct Boat {
    pub heading: f32,
    /// Signed speed along the heading, units/sec.
    pub speed: f32,
    pub max_speed: f32,
    /// Throttle response, units/sec².
    pub acceleration: f32,
    /// Radians/sec at full rudder.
    pub turn_rate: f32,
    /// Fraction of speed shed per second with the throttle released.
    pub drag: f32,
}

impl Default for Boat {
    fn default() -> Self {
        Self {
            heading: 0.0,
            speed: 0.0,
            max_speed: 8.0,
            acceleration: 6.0,
            turn_rate: 1.6,
            drag: 1.2,
        }
    }
}

impl Boat {
    pub fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.heading)
    }
}
