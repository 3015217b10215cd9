// Procedural mesh types and triangulation.
//
// Two producers feed the renderer:
//   grid_mesh()          → TileMesh  → to_render_mesh() → RenderMesh → GPU  (terrain, water)
//   skin_modifier()      → PolyMesh  → catmull_clark()  → triangulate_smooth() → RenderMesh  (props)

use glam::{Vec2, Vec3};

// ============================================================================
// GPU VERTEX
// ============================================================================

/// GPU-ready vertex:
///   @location(0) position: vec3<f32>
///   @location(1) normal:   vec3<f32>
///   @location(2) uv:       vec2<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal:   [f32; 3],
    pub uv:       [f32; 2],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

// ============================================================================
// POLY MESH
// ============================================================================

/// Intermediate polygon mesh for procedural props.
/// Faces are n-gons with CCW winding viewed from outside.
/// Only built at startup; NOT GPU-ready.
#[derive(Clone, Default)]
pub struct PolyMesh {
    pub positions: Vec<Vec3>,
    pub faces:     Vec<Vec<usize>>,
}

impl PolyMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, pos: Vec3) -> usize {
        let idx = self.positions.len();
        self.positions.push(pos);
        idx
    }

    /// Add a face by vertex indices (CCW order).
    pub fn add_face(&mut self, indices: Vec<usize>) {
        debug_assert!(indices.len() >= 3, "Face must have at least 3 vertices");
        self.faces.push(indices);
    }

    pub fn vertex_count(&self) -> usize { self.positions.len() }

    /// Non-uniform scale about the origin. Turns a rounded cube into a rock.
    pub fn scaled(mut self, scale: Vec3) -> Self {
        for p in &mut self.positions {
            *p *= scale;
        }
        self
    }
}

// ============================================================================
// TILE MESH
// ============================================================================

/// Regular N×N height-field grid in tile-local coordinates (Y up).
///
/// Vertex (ku, kv) lives at index `kv + N * ku`; ku runs along X, kv along Z.
/// Every grid cell is split into two triangles whose normals face +Y.
#[derive(Clone, Debug)]
pub struct TileMesh {
    pub resolution: u32,
    pub positions:  Vec<Vec3>,
    pub normals:    Vec<Vec3>,
    pub uvs:        Vec<Vec2>,
    pub triangles:  Vec<[u32; 3]>,
}

impl TileMesh {
    pub fn vertex_count(&self) -> usize { self.positions.len() }
    pub fn triangle_count(&self) -> usize { self.triangles.len() }

    /// Interleave into GPU vertices and a flat index buffer.
    pub fn to_render_mesh(&self) -> RenderMesh {
        let vertices = self.positions.iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| GpuVertex {
                position: p.to_array(),
                normal:   n.to_array(),
                uv:       uv.to_array(),
            })
            .collect();
        let indices = self.triangles.iter().flatten().copied().collect();
        RenderMesh { vertices, indices }
    }
}

/// Sample `height` on an N×N grid spanning `[min, max]` (planar X/Z).
///
/// Texture coordinates are proportional to the grid parameter, multiplied by
/// `uv_repeat` so a tiling texture repeats across the tile. A resolution
/// below 2 is raised to 2, the smallest grid with a cell.
pub fn grid_mesh(
    resolution: u32,
    min: Vec2,
    max: Vec2,
    uv_repeat: f32,
    height: impl Fn(Vec2) -> f32,
) -> TileMesh {
    let n = resolution.max(2);
    let count = (n * n) as usize;
    let span = max - min;
    let step = 1.0 / (n - 1) as f32;

    let mut positions = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);
    for ku in 0..n {
        for kv in 0..n {
            let u = ku as f32 * step;
            let v = kv as f32 * step;
            let planar = min + Vec2::new(u, v) * span;
            positions.push(Vec3::new(planar.x, height(planar), planar.y));
            uvs.push(Vec2::new(u, v) * uv_repeat);
        }
    }

    let cells = (n - 1) as usize;
    let mut triangles = Vec::with_capacity(2 * cells * cells);
    for ku in 0..n - 1 {
        for kv in 0..n - 1 {
            let a = kv + n * ku; // (ku,   kv)
            let b = a + 1;       // (ku,   kv+1)
            let c = a + n;       // (ku+1, kv)
            let d = c + 1;       // (ku+1, kv+1)
            triangles.push([a, b, d]);
            triangles.push([a, d, c]);
        }
    }

    let normals = smooth_normals(&positions, triangles.iter().copied());

    TileMesh {
        resolution: n,
        positions,
        normals,
        uvs,
        triangles,
    }
}

// ============================================================================
// RENDER MESH
// ============================================================================

/// GPU-ready triangulated mesh with per-vertex normals.
/// Upload vertex_bytes() to a VERTEX buffer, index_bytes() to an INDEX buffer.
pub struct RenderMesh {
    pub vertices: Vec<GpuVertex>,
    pub indices:  Vec<u32>,
}

impl RenderMesh {
    /// Cast vertex slice to raw bytes for wgpu buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Cast index slice to raw bytes for wgpu buffer upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> usize  { self.indices.len() }
}

// ============================================================================
// SMOOTH NORMALS
// ============================================================================

/// Area-weighted vertex normals.
///
/// The unnormalized cross product of two triangle edges has magnitude
/// 2×area, so summing it per vertex weights each face by its area.
fn smooth_normals(positions: &[Vec3], triangles: impl Iterator<Item = [u32; 3]>) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for [i, j, k] in triangles {
        let (i, j, k) = (i as usize, j as usize, k as usize);
        let weighted = (positions[j] - positions[i]).cross(positions[k] - positions[i]);
        accum[i] += weighted;
        accum[j] += weighted;
        accum[k] += weighted;
    }
    accum.into_iter().map(|n| n.normalize_or_zero()).collect()
}

/// Fan-triangulate a PolyMesh and give it smooth normals.
/// Vertices are shared across faces through the index buffer.
pub fn triangulate_smooth(poly: &PolyMesh) -> RenderMesh {
    let mut triangles: Vec<[u32; 3]> = Vec::new();
    for face in &poly.faces {
        for i in 1..(face.len() - 1) {
            triangles.push([face[0] as u32, face[i] as u32, face[i + 1] as u32]);
        }
    }

    let normals = smooth_normals(&poly.positions, triangles.iter().copied());
    let vertices = poly.positions.iter()
        .zip(&normals)
        .map(|(p, n)| GpuVertex {
            position: p.to_array(),
            normal:   n.to_array(),
            uv:       [0.0, 0.0],
        })
        .collect();
    let indices = triangles.into_iter().flatten().collect();

    RenderMesh { vertices, indices }
}
