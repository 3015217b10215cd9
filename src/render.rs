// Scene renderer: terrain tiles, water, instanced obstacle props and the boat.
//
// Every mesh is drawn through the same vertex + instance layout. Terrain
// tiles keep one vertex buffer per ring slot and share a single index buffer,
// since all tiles have the same triangulation. Recycled slots are re-uploaded
// in place.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use glam::{Mat4, Quat, Vec2, Vec3};
use wgpu::util::DeviceExt;

use crate::engine::mesh::{triangulate_smooth, GpuVertex, RenderMesh};
use crate::engine::obstacles::{ObstacleKind, ObstacleRecord, TileIndex};
use crate::engine::skin::{skin_modifier, SkinGraph};
use crate::engine::subdivide::{roughen, subdivide};
use crate::engine::terrain::{build_water_mesh, TileBounds};
use crate::engine::tiles::TileCoordinateMap;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const TERRAIN_COLOR: [f32; 4] = [0.76, 0.66, 0.47, 1.0];
const WATER_COLOR: [f32; 4] = [0.12, 0.38, 0.55, 0.6];
const ACCESSORY_COLOR: [f32; 4] = [0.36, 0.55, 0.22, 1.0];
const BOAT_COLOR: [f32; 4] = [0.85, 0.25, 0.2, 1.0];
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.55, g: 0.72, b: 0.88, a: 1.0 };

/// Distance from an obstacle site to the ring its accessories sit on.
const ACCESSORY_RING: f32 = 1.2;

// ============================================================================
// GPU DATA
// ============================================================================

/// Per-instance model matrix and tint:
///   @location(3..=6) model columns
///   @location(7)     color
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

impl InstanceData {
    fn new(model: Mat4, color: [f32; 4]) -> Self {
        Self { model: model.to_cols_array_2d(), color }
    }

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4, 7 => Float32x4
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    /// Direction light travels, w unused.
    light_dir: [f32; 4],
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, label: &str, mesh: &RenderMesh) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: mesh.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: mesh.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertices, indices, index_count: mesh.index_count() as u32 }
    }
}

// ============================================================================
// PROP DESCRIPTORS
// ============================================================================

/// How one obstacle kind is drawn.
struct PropDescriptor {
    color: [f32; 4],
    skeleton: SkinGraph,
    subdivisions: u32,
    /// Radial jitter applied after subdivision, as a fraction of radius.
    roughness: f32,
    scale: Vec3,
}

fn prop_descriptor(kind: ObstacleKind) -> PropDescriptor {
    let mut skeleton = SkinGraph::new();
    match kind {
        ObstacleKind::Boulder => {
            skeleton.add_cube(Vec3::ZERO, 1.0);
            PropDescriptor {
                color: [0.45, 0.43, 0.40, 1.0],
                skeleton,
                subdivisions: 3,
                roughness: 0.15,
                scale: Vec3::new(1.4, 0.9, 1.1),
            }
        }
        ObstacleKind::Spire => {
            skeleton.add_node(Vec3::ZERO, Vec3::new(0.6, 1.0, 0.6));
            skeleton.add_node(Vec3::Y * 1.4, Vec3::new(0.3, 0.8, 0.3));
            PropDescriptor {
                color: [0.38, 0.36, 0.38, 1.0],
                skeleton,
                subdivisions: 2,
                roughness: 0.1,
                scale: Vec3::new(1.0, 1.6, 1.0),
            }
        }
        ObstacleKind::Slab => {
            skeleton.add_node(Vec3::ZERO, Vec3::new(1.6, 0.5, 0.9));
            PropDescriptor {
                color: [0.52, 0.50, 0.46, 1.0],
                skeleton,
                subdivisions: 2,
                roughness: 0.08,
                scale: Vec3::ONE,
            }
        }
        ObstacleKind::Hut => {
            skeleton.add_node(Vec3::Y * 0.8, Vec3::new(1.2, 0.8, 1.0));
            skeleton.add_node(Vec3::Y * 1.9, Vec3::new(1.4, 0.35, 1.2));
            PropDescriptor {
                color: [0.62, 0.45, 0.28, 1.0],
                skeleton,
                subdivisions: 0,
                roughness: 0.0,
                scale: Vec3::ONE,
            }
        }
    }
}

fn build_prop_mesh(kind: ObstacleKind) -> (RenderMesh, [f32; 4]) {
    let desc = prop_descriptor(kind);
    let smooth = subdivide(&skin_modifier(&desc.skeleton), desc.subdivisions);
    let rough = roughen(smooth, desc.roughness, kind as u64);
    (triangulate_smooth(&rough.scaled(desc.scale)), desc.color)
}

fn build_accessory_mesh() -> RenderMesh {
    let mut graph = SkinGraph::new();
    graph.add_cube(Vec3::Y * 0.15, 0.25);
    triangulate_smooth(&subdivide(&skin_modifier(&graph), 1))
}

fn build_boat_mesh() -> RenderMesh {
    // Hull along +X, cabin aft
    let mut graph = SkinGraph::new();
    graph.add_node(Vec3::ZERO, Vec3::new(1.2, 0.25, 0.5));
    graph.add_node(Vec3::new(-0.3, 0.45, 0.0), Vec3::new(0.4, 0.25, 0.35));
    triangulate_smooth(&subdivide(&skin_modifier(&graph), 1))
}

fn prop_transform(record: &ObstacleRecord) -> Mat4 {
    Mat4::from_rotation_translation(
        Quat::from_rotation_y(-record.rotation),
        Vec3::new(record.position.x, record.elevation, record.position.y),
    )
}

// ============================================================================
// RENDERER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeshKey {
    Prop(ObstacleKind),
    Accessory,
    Boat,
}

struct Batch {
    mesh: MeshKey,
    instances: Range<u32>,
}

pub struct SceneRenderer {
    opaque_pipeline: wgpu::RenderPipeline,
    water_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,

    /// One vertex buffer per ring slot, in `TileIndex::flat` order.
    tile_vertices: Vec<wgpu::Buffer>,
    tile_indices: wgpu::Buffer,
    tile_index_count: u32,
    water: GpuMesh,

    props: BTreeMap<ObstacleKind, (GpuMesh, [f32; 4])>,
    accessory: GpuMesh,
    boat: GpuMesh,

    instance_buffer: wgpu::Buffer,
    max_instances: usize,
    batches: Vec<Batch>,
    water_level: f32,
}

impl SceneRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        size: (u32, u32),
        map: &TileCoordinateMap,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Terrain Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("terrain.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[Uniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                light_dir: [0.0, -1.0, 0.0, 0.0],
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let opaque_pipeline = create_pipeline(
            device,
            &layout,
            &shader,
            surface_format,
            PipelineKind::Opaque,
        );
        let water_pipeline = create_pipeline(
            device,
            &layout,
            &shader,
            surface_format,
            PipelineKind::Water,
        );

        // Terrain: every slot shares the triangulation of the middle tile.
        let registry = map.registry();
        let tile_vertices: Vec<wgpu::Buffer> = registry
            .tiles()
            .map(|(idx, tile)| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("Tile Vertices {}:{}", idx.col, idx.row)),
                    contents: tile.mesh.to_render_mesh().vertex_bytes(),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();
        let shared = registry.tile(TileIndex::new(1, 1)).mesh.to_render_mesh();
        let tile_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Tile Indices"),
            contents: shared.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });

        let config = map.config();
        let local = TileBounds::square(Vec2::ZERO, config.tile_length);
        let water_mesh = build_water_mesh(config.tile_resolution, &local, config.water_level, config.uv_repeat);
        let water = GpuMesh::upload(device, "Water", &water_mesh.to_render_mesh());

        let props = ObstacleKind::ALL
            .into_iter()
            .map(|kind| {
                let (mesh, color) = build_prop_mesh(kind);
                (kind, (GpuMesh::upload(device, &format!("{kind:?}"), &mesh), color))
            })
            .collect();
        let accessory = GpuMesh::upload(device, "Accessory", &build_accessory_mesh());
        let boat = GpuMesh::upload(device, "Boat", &build_boat_mesh());

        // 9 terrain + 9 water + every prop and accessory + the boat
        let per_tile = config.obstacles_per_tile * (1 + config.max_accessories as usize);
        let max_instances = 18 + 9 * per_tile + 1;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (max_instances * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!(
            "Scene renderer ready: {} tile vertices per slot, {} instance slots",
            shared.vertices.len(),
            max_instances
        );

        Self {
            opaque_pipeline,
            water_pipeline,
            uniform_buffer,
            uniform_bind_group,
            depth_view: create_depth_view(device, size),
            tile_vertices,
            tile_indices,
            tile_index_count: shared.index_count() as u32,
            water,
            props,
            accessory,
            boat,
            instance_buffer,
            max_instances,
            batches: Vec::new(),
            water_level: config.water_level,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        self.depth_view = create_depth_view(device, size);
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Re-upload the meshes of slots the tile window just recycled.
    pub fn upload_tiles(&self, queue: &wgpu::Queue, map: &TileCoordinateMap, recycled: &BTreeSet<TileIndex>) {
        for &idx in recycled {
            let mesh = map.registry().tile(idx).mesh.to_render_mesh();
            queue.write_buffer(&self.tile_vertices[idx.flat()], 0, mesh.vertex_bytes());
        }
    }

    /// Write this frame's uniforms and instance data.
    pub fn prepare(
        &mut self,
        queue: &wgpu::Queue,
        map: &TileCoordinateMap,
        view_proj: Mat4,
        boat_position: Vec3,
        boat_heading: f32,
    ) {
        let uniforms = Uniforms {
            view_proj: view_proj.to_cols_array_2d(),
            light_dir: Vec3::new(-0.4, -1.0, -0.3).normalize().extend(0.0).to_array(),
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let registry = map.registry();
        let mut instances: Vec<InstanceData> = Vec::with_capacity(self.max_instances);
        self.batches.clear();

        // Instances 0..9 terrain, 9..18 water, both in slot order
        for color in [TERRAIN_COLOR, WATER_COLOR] {
            for (_, tile) in registry.tiles() {
                let origin = Vec3::new(tile.origin.x, 0.0, tile.origin.y);
                instances.push(InstanceData::new(Mat4::from_translation(origin), color));
            }
        }

        for (&kind, (_, color)) in &self.props {
            let start = instances.len() as u32;
            for record in registry.all_records().filter(|r| r.kind == kind) {
                instances.push(InstanceData::new(prop_transform(record), *color));
            }
            self.batches.push(Batch {
                mesh: MeshKey::Prop(kind),
                instances: start..instances.len() as u32,
            });
        }

        let start = instances.len() as u32;
        for (_, tile) in registry.tiles() {
            for record in &tile.obstacles {
                for offset in record.accessory_offsets(ACCESSORY_RING) {
                    let p = record.position + offset;
                    let y = tile.surface_height(p).max(self.water_level);
                    let model = Mat4::from_translation(Vec3::new(p.x, y, p.y));
                    instances.push(InstanceData::new(model, ACCESSORY_COLOR));
                }
            }
        }
        self.batches.push(Batch {
            mesh: MeshKey::Accessory,
            instances: start..instances.len() as u32,
        });

        let start = instances.len() as u32;
        let boat_model = Mat4::from_rotation_translation(Quat::from_rotation_y(-boat_heading), boat_position);
        instances.push(InstanceData::new(boat_model, BOAT_COLOR));
        self.batches.push(Batch {
            mesh: MeshKey::Boat,
            instances: start..instances.len() as u32,
        });

        if instances.len() > self.max_instances {
            log::warn!("Dropping {} instances over capacity", instances.len() - self.max_instances);
            instances.truncate(self.max_instances);
            let cap = self.max_instances as u32;
            for batch in &mut self.batches {
                batch.instances = batch.instances.start.min(cap)..batch.instances.end.min(cap);
            }
        }
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
    }

    /// Record the scene into an open render pass. Returns the number of draw calls.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) -> u32 {
        let mut draw_calls = 0;
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

        pass.set_pipeline(&self.opaque_pipeline);
        pass.set_index_buffer(self.tile_indices.slice(..), wgpu::IndexFormat::Uint32);
        for (slot, vertices) in self.tile_vertices.iter().enumerate() {
            let slot = slot as u32;
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.draw_indexed(0..self.tile_index_count, 0, slot..slot + 1);
            draw_calls += 1;
        }

        for batch in &self.batches {
            if batch.instances.is_empty() {
                continue;
            }
            let mesh = match batch.mesh {
                MeshKey::Prop(kind) => match self.props.get(&kind) {
                    Some((mesh, _)) => mesh,
                    None => continue,
                },
                MeshKey::Accessory => &self.accessory,
                MeshKey::Boat => &self.boat,
            };
            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, batch.instances.clone());
            draw_calls += 1;
        }

        // Water last: blended over everything opaque
        pass.set_pipeline(&self.water_pipeline);
        pass.set_vertex_buffer(0, self.water.vertices.slice(..));
        pass.set_index_buffer(self.water.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.water.index_count, 0, 9..18);
        draw_calls + 1
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Opaque,
    Water,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    kind: PipelineKind,
) -> wgpu::RenderPipeline {
    let (label, fragment_entry, blend, cull_mode, depth_write) = match kind {
        PipelineKind::Opaque => ("Opaque Pipeline", "fs_main", wgpu::BlendState::REPLACE, Some(wgpu::Face::Back), true),
        PipelineKind::Water => ("Water Pipeline", "fs_water", wgpu::BlendState::ALPHA_BLENDING, None, false),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[GpuVertex::desc(), InstanceData::desc()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

fn create_depth_view(device: &wgpu::Device, (width, height): (u32, u32)) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
