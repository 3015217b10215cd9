// Boat demo over an endless 3×3 window of procedural terrain tiles.
//
// Frame order: input → boat movement → terrain window update → collision
// pushback → chase camera → render.
//
// Usage: tide_runner [terrain.toml]

mod engine;
mod render;

use std::sync::Arc;
use std::time::Instant;

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec2, Vec3};
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use engine::camera::ChaseCamera;
use engine::debug_overlay::{DebugOverlay, DebugStats, ObstacleDebugDraw};
use engine::input::{BoatControls, InputState};
use engine::systems::{self, Terrain};
use engine::{Boat, ConfigError, TerrainConfig, TerrainError, TileCoordinateMap, Transform};
use render::SceneRenderer;

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter")]
    NoAdapter,
    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

// ============================================================================
// FRAME TIMING
// ============================================================================

struct FrameTimer {
    frames: u32,
    window_start: Instant,
    times_ms: Vec<f32>,
    fps: u32,
    avg_ms: f32,
    min_ms: f32,
    max_ms: f32,
}

impl FrameTimer {
    fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
            times_ms: Vec::new(),
            fps: 0,
            avg_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        }
    }

    /// Record one frame; roll the one-second window when it fills.
    fn tick(&mut self, dt: f32) {
        self.frames += 1;
        self.times_ms.push(dt * 1000.0);
        if self.window_start.elapsed().as_secs_f32() >= 1.0 {
            self.fps = self.frames;
            self.avg_ms = self.times_ms.iter().sum::<f32>() / self.times_ms.len() as f32;
            self.min_ms = self.times_ms.iter().copied().fold(f32::INFINITY, f32::min);
            self.max_ms = self.times_ms.iter().copied().fold(0.0, f32::max);
            log::debug!("FPS: {} | frame {:.2} ms", self.fps, self.avg_ms);
            self.frames = 0;
            self.times_ms.clear();
            self.window_start = Instant::now();
        }
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    renderer: SceneRenderer,
    overlay: DebugOverlay,

    world: World,
    camera: ChaseCamera,
    input: InputState,
    last_update: Instant,
    timer: FrameTimer,
    draw_calls: u32,
}

impl State {
    async fn new(window: Arc<Window>, mut world: World) -> Result<Self, AppError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(AppError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = SceneRenderer::new(
            &device,
            surface_format,
            (config.width, config.height),
            &world.resource::<Terrain>().0,
        );
        let overlay = DebugOverlay::new(&window, &device, surface_format);

        let mut camera = ChaseCamera::new();
        if let Some((position, heading)) = boat_pose(&mut world) {
            camera.snap_to(position, heading);
        }

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            renderer,
            overlay,
            world,
            camera,
            input: InputState::new(),
            last_update: Instant::now(),
            timer: FrameTimer::new(),
            draw_calls: 0,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.renderer.resize(&self.device, (new_size.width, new_size.height));
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        // Clamp so a stalled frame can't launch the boat across several tiles
        let dt = (now - self.last_update).as_secs_f32().min(0.1);
        self.last_update = now;
        self.timer.tick(dt);

        if self.input.was_key_pressed(KeyCode::F3) {
            self.overlay.toggle();
        }
        if self.input.was_key_pressed(KeyCode::F4) {
            self.overlay.toggle_thresholds();
        }

        let controls = BoatControls::from_input(&self.input);
        systems::steer_boat(&mut self.world, controls, dt);
        systems::movement_system(&mut self.world, dt);

        match systems::advance_terrain(&mut self.world) {
            Ok(recycled) if !recycled.is_empty() => {
                let map = &self.world.resource::<Terrain>().0;
                self.renderer.upload_tiles(&self.queue, map, &recycled);
            }
            Ok(_) => {}
            // A failed update leaves the window as it was; the GPU copies still match.
            Err(e) => log::error!("Terrain update failed, retrying next frame: {e}"),
        }

        systems::resolve_boat_collisions(&mut self.world);

        if let Some((position, heading)) = boat_pose(&mut self.world) {
            self.camera.update(position, heading, &self.input, dt);
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
        let view_proj = self.camera.view_projection(aspect);
        let (boat_position, heading) = boat_pose(&mut self.world).unwrap_or((Vec3::ZERO, 0.0));

        {
            let map = &self.world.resource::<Terrain>().0;
            self.renderer.prepare(&self.queue, map, view_proj, boat_position, heading);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(render::CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.renderer.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.draw_calls = self.renderer.draw(&mut render_pass);
        }

        let stats = self.overlay.visible.then(|| self.debug_stats(boat_position, heading));
        let thresholds = self
            .overlay
            .show_thresholds
            .then(|| self.threshold_draws(view_proj));

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        self.overlay.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            stats.as_ref(),
            thresholds.as_deref(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.input.end_frame();

        Ok(())
    }

    fn debug_stats(&self, boat_position: Vec3, heading: f32) -> DebugStats {
        let map = &self.world.resource::<Terrain>().0;
        let boat = Vec2::new(boat_position.x, boat_position.z);
        let reach = map.config().collision.reach() * 2.0;
        let mut nearby: Vec<_> = map
            .registry()
            .query(boat, reach)
            .map(|r| (r.kind, r.position.distance(boat)))
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));

        let speed = self
            .world
            .iter_entities()
            .find_map(|e| e.get::<Boat>().map(|b| b.speed))
            .unwrap_or(0.0);
        let center = map.center_lattice();

        DebugStats {
            fps: self.timer.fps,
            frame_time_avg_ms: self.timer.avg_ms,
            frame_time_min_ms: self.timer.min_ms,
            frame_time_max_ms: self.timer.max_ms,
            draw_calls: self.draw_calls,
            resolution: (self.size.width, self.size.height),
            boat_position: (boat.x, boat.y),
            boat_speed: speed,
            heading_deg: heading.to_degrees().rem_euclid(360.0),
            window: (map.c_ini(), map.r_ini()),
            center_lattice: (center.x, center.y),
            recycled_total: map.recycled_total(),
            obstacle_count: map.registry().obstacle_count(),
            nearby,
        }
    }

    fn threshold_draws(&self, view_proj: Mat4) -> Vec<ObstacleDebugDraw> {
        let map = &self.world.resource::<Terrain>().0;
        let collision = &map.config().collision;
        let water = map.config().water_level;
        let right = self.camera.view_matrix().row(0).truncate();
        let scale = self.window.scale_factor() as f32;
        let screen = (self.config.width as f32 / scale, self.config.height as f32 / scale);

        map.registry()
            .all_records()
            .filter_map(|r| {
                let center = Vec3::new(r.position.x, water, r.position.y);
                let threshold = collision.threshold(r.kind);
                let pos = world_to_screen(view_proj, center, screen)?;
                let edge = world_to_screen(view_proj, center + right * threshold, screen)?;
                Some(ObstacleDebugDraw {
                    pos,
                    radius_px: pos.distance(edge),
                    housing: r.kind.is_housing(),
                })
            })
            .collect()
    }
}

/// Position and heading of the first boat.
fn boat_pose(world: &mut World) -> Option<(Vec3, f32)> {
    let mut query = world.query::<(&Transform, &Boat)>();
    query.iter(world).next().map(|(t, b)| (t.position, b.heading))
}

/// Project a world point to egui points. `None` when behind the camera.
fn world_to_screen(view_proj: Mat4, point: Vec3, (width, height): (f32, f32)) -> Option<egui::Pos2> {
    let clip = view_proj * point.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(egui::pos2(
        (ndc.x * 0.5 + 0.5) * width,
        (0.5 - ndc.y * 0.5) * height,
    ))
}

// ============================================================================
// MAIN
// ============================================================================

fn load_config() -> Result<TerrainConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => TerrainConfig::load(path),
        None => {
            let config = TerrainConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn run() -> Result<(), AppError> {
    let config = load_config()?;
    let start = Vec2::splat(config.tile_length * 0.5);
    let water_level = config.water_level;

    let mut world = World::new();
    world.insert_resource(Terrain(TileCoordinateMap::initialize(config)?));
    systems::spawn_boat(&mut world, start, water_level);

    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title("Tide Runner - WASD to steer, F3 stats, F4 collision rings")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), world))?;

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                let _ = state.overlay.handle_window_event(&window, event);
                state.input.process_event(event);

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.exit(),
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => state.resize(state.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => control_flow.exit(),
                            Err(e) => log::warn!("Surface error: {e:?}"),
                        }
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{e}");
        eprintln!("tide_runner: {e}");
        std::process::exit(1);
    }
}
