// Skin modifier: turns a set of box nodes into a closed PolyMesh.
//
// Props are blocked out as a few boxes (a boulder is one squashed box, a hut
// is a base plus a roof) and then rounded by Catmull-Clark subdivision.
// Nodes are skinned independently; overlapping boxes simply interpenetrate.

use glam::Vec3;
use super::mesh::PolyMesh;

/// One box in the skeleton: a center and per-axis half-extents.
#[derive(Debug, Clone, Copy)]
pub struct SkinNode {
    pub position:     Vec3,
    pub half_extents: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct SkinGraph {
    pub nodes: Vec<SkinNode>,
}

impl SkinGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a box node. Returns its index.
    pub fn add_node(&mut self, position: Vec3, half_extents: Vec3) -> usize {
        self.nodes.push(SkinNode { position, half_extents });
        self.nodes.len() - 1
    }

    /// Cube of half-size `radius`.
    pub fn add_cube(&mut self, position: Vec3, radius: f32) -> usize {
        self.add_node(position, Vec3::splat(radius))
    }
}

pub fn skin_modifier(graph: &SkinGraph) -> PolyMesh {
    let mut mesh = PolyMesh::new();
    for node in &graph.nodes {
        skin_box(node, &mut mesh);
    }
    mesh
}

/// Eight corners and six outward-facing CCW quads.
///
/// Corner `i` takes -h or +h on each axis from bits 0 (x), 1 (y), 2 (z).
fn skin_box(node: &SkinNode, mesh: &mut PolyMesh) {
    let base = mesh.vertex_count();
    for i in 0..8 {
        let sign = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        mesh.add_vertex(node.position + sign * node.half_extents);
    }

    const FACES: [[usize; 4]; 6] = [
        [4, 5, 7, 6], // +Z
        [1, 0, 2, 3], // -Z
        [0, 4, 6, 2], // -X
        [5, 1, 3, 7], // +X
        [6, 7, 3, 2], // +Y
        [0, 1, 5, 4], // -Y
    ];
    for face in FACES {
        mesh.add_face(face.iter().map(|&c| base + c).collect());
    }
}
