// Input state tracking for keyboard and mouse
// Abstracts winit events into a queryable per-frame snapshot

use std::collections::HashSet;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Default)]
pub struct InputState {
    keys_held: HashSet<KeyCode>,
    // Pressed this frame; cleared in end_frame() so toggles fire once
    keys_pressed: HashSet<KeyCode>,

    // Accumulated vertical scroll this frame, reset in end_frame()
    pub scroll_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a winit WindowEvent into the input state.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if !event.repeat {
                                self.keys_pressed.insert(key);
                            }
                            self.keys_held.insert(key);
                        }
                        ElementState::Released => {
                            self.keys_held.remove(&key);
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.scroll_delta += y;
            }
            WindowEvent::Focused(false) => self.keys_held.clear(),
            _ => {}
        }
    }

    /// Call once per frame after update() and render() have consumed input.
    pub fn end_frame(&mut self) {
        self.scroll_delta = 0.0;
        self.keys_pressed.clear();
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    fn any_held(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|k| self.is_key_held(*k))
    }
}

/// Helm input for one frame, each axis in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoatControls {
    /// +1 ahead, -1 astern.
    pub throttle: f32,
    /// +1 turns to starboard (D / Right).
    pub steer: f32,
}

impl BoatControls {
    pub fn from_input(input: &InputState) -> Self {
        let axis = |pos: bool, neg: bool| pos as i32 as f32 - neg as i32 as f32;
        Self {
            throttle: axis(
                input.any_held(&[KeyCode::KeyW, KeyCode::ArrowUp]),
                input.any_held(&[KeyCode::KeyS, KeyCode::ArrowDown]),
            ),
            steer: axis(
                input.any_held(&[KeyCode::KeyD, KeyCode::ArrowRight]),
                input.any_held(&[KeyCode::KeyA, KeyCode::ArrowLeft]),
            ),
        }
    }
}
