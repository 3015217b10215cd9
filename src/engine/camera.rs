// Chase camera that trails the boat.
//
// Camera model:
//   - Looks at a point slightly above the boat
//   - Sits `distance` behind the boat's heading, raised by `pitch`
//   - Yaw eases toward the boat heading so turns don't snap the view
//   - Mouse wheel zooms in/out

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec2, Vec3};
use super::input::InputState;

pub struct ChaseCamera {
    target: Vec3,

    /// Private: always clamped to [min_distance, max_distance] in update().
    distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    /// Elevation angle in radians (0 = level with the boat)
    pub pitch: f32,

    /// Heading the camera currently trails, radians, same convention as `Boat::heading`.
    yaw: f32,

    /// How quickly yaw catches up with the boat, per second.
    pub follow_rate: f32,

    pub fov: f32,
    pub near: f32,
    pub far: f32,

    /// Zoom change (in distance units) per scroll line
    pub zoom_speed: f32,

    /// Look-at point offset above the hull
    pub look_height: f32,
}

impl ChaseCamera {
    pub fn new() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 14.0,
            min_distance: 5.0,
            max_distance: 40.0,
            pitch: 25.0_f32.to_radians(),
            yaw: 0.0,
            follow_rate: 3.0,
            fov: 60.0_f32.to_radians(),
            near: 0.1,
            far: 250.0,
            zoom_speed: 2.0,
            look_height: 1.0,
        }
    }

    /// Jump straight to the boat without easing.
    pub fn snap_to(&mut self, boat_position: Vec3, heading: f32) {
        self.target = boat_position + Vec3::Y * self.look_height;
        self.yaw = heading;
    }

    /// Follow the boat. Call once per frame after collision has settled its position.
    pub fn update(&mut self, boat_position: Vec3, heading: f32, input: &InputState, dt: f32) {
        self.target = boat_position + Vec3::Y * self.look_height;

        let blend = (self.follow_rate * dt).clamp(0.0, 1.0);
        self.yaw += shortest_angle(self.yaw, heading) * blend;

        // Scroll up (positive delta) zooms in
        self.distance -= input.scroll_delta * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
    }

    pub fn camera_position(&self) -> Vec3 {
        let behind = -Vec2::from_angle(self.yaw) * self.pitch.cos() * self.distance;
        self.target + Vec3::new(behind.x, self.pitch.sin() * self.distance, behind.y)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.camera_position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn target(&self) -> Vec3 { self.target }
    pub fn distance(&self) -> f32 { self.distance }
}

/// Signed difference `to - from`, wrapped into (-π, π].
fn shortest_angle(from: f32, to: f32) -> f32 {
    let d = (to - from).rem_euclid(TAU);
    if d > PI { d - TAU } else { d }
}
