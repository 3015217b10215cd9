use egui::epaint::Shadow;

use super::obstacles::ObstacleKind;

pub struct DebugStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub draw_calls: u32,
    pub resolution: (u32, u32),
    pub boat_position: (f32, f32),
    pub boat_speed: f32,
    pub heading_deg: f32,
    /// Window counters (Cini, Rini).
    pub window: (i32, i32),
    /// Lattice coordinate of the tile under the boat.
    pub center_lattice: (i32, i32),
    pub recycled_total: u64,
    pub obstacle_count: usize,
    /// Obstacles within collision reach, nearest first: (kind, distance).
    pub nearby: Vec<(ObstacleKind, f32)>,
}

/// One obstacle's collision threshold, already projected to egui screen points.
pub struct ObstacleDebugDraw {
    pub pos: egui::Pos2,
    /// Threshold circle size in screen points.
    pub radius_px: f32,
    pub housing: bool,
}

pub struct DebugOverlay {
    pub visible: bool,
    pub show_thresholds: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(13.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        // Drawn in its own pass after the scene, so no depth attachment
        let egui_renderer = egui_wgpu::Renderer::new(device, surface_format, None, 1, false);

        Self {
            visible: false,
            show_thresholds: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn toggle_thresholds(&mut self) {
        self.show_thresholds = !self.show_thresholds;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Render one egui frame: F4 threshold circles (`obstacles`) underneath,
    /// the F3 stats panel (`stats`) on top. `None` hides a layer.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        stats: Option<&DebugStats>,
        obstacles: Option<&[ObstacleDebugDraw]>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if let Some(draws) = obstacles {
                let painter = ctx.layer_painter(egui::LayerId::new(
                    egui::Order::Background,
                    egui::Id::new("obstacle_thresholds"),
                ));
                let rock = egui::Stroke::new(1.5, egui::Color32::from_rgba_unmultiplied(255, 220, 0, 170));
                let housing = egui::Stroke::new(1.5, egui::Color32::from_rgba_unmultiplied(255, 90, 60, 190));
                for draw in draws {
                    let stroke = if draw.housing { housing } else { rock };
                    painter.circle_stroke(draw.pos, draw.radius_px, stroke);
                    painter.circle_filled(draw.pos, 2.0, stroke.color);
                }
            }

            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("debug_overlay"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                            .inner_margin(egui::Margin::same(8.0))
                            .rounding(4.0)
                            .show(ui, |ui: &mut egui::Ui| stats_panel(ui, stats));
                    });
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn stats_panel(ui: &mut egui::Ui, stats: &DebugStats) {
    ui.label(format!("FPS: {}", stats.fps));
    ui.label(format!(
        "Frame: {:.2} ms (min: {:.1} | max: {:.1})",
        stats.frame_time_avg_ms, stats.frame_time_min_ms, stats.frame_time_max_ms
    ));
    ui.label(format!("Draw calls: {}", stats.draw_calls));
    ui.label(format!("Resolution: {} x {}", stats.resolution.0, stats.resolution.1));
    ui.separator();
    ui.label(format!(
        "Boat: ({:.1}, {:.1})  {:.1} u/s  hdg {:.0}°",
        stats.boat_position.0, stats.boat_position.1, stats.boat_speed, stats.heading_deg
    ));
    ui.label(format!(
        "Window: Cini {}  Rini {}  tile ({}, {})",
        stats.window.0, stats.window.1, stats.center_lattice.0, stats.center_lattice.1
    ));
    ui.label(format!(
        "Obstacles: {}  Recycled: {}",
        stats.obstacle_count, stats.recycled_total
    ));
    if stats.nearby.is_empty() {
        ui.label("Nearby: none");
    } else {
        for (kind, distance) in &stats.nearby {
            ui.label(format!("Nearby: {kind:?} at {distance:.2}"));
        }
    }
}
