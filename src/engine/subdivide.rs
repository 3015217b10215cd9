// Catmull-Clark subdivision and surface roughening for prop meshes.
//
// One pass turns every n-gon into n quads; the output is all-quad.
// Closed all-quad mesh counts after a pass: V' = V + E + F, F' = 4F.
//   box: 8/6 → 26/24 → 98/96 → 386/384

use std::collections::HashMap;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::mesh::PolyMesh;

/// Undirected edge table: each edge once, with the faces on either side.
struct EdgeTable {
    index: HashMap<(usize, usize), usize>,
    ends: Vec<(usize, usize)>,
    faces: Vec<Vec<usize>>,
}

impl EdgeTable {
    fn build(mesh: &PolyMesh) -> Self {
        let mut table = Self { index: HashMap::new(), ends: Vec::new(), faces: Vec::new() };
        for (fi, face) in mesh.faces.iter().enumerate() {
            for (a, b) in face_edges(face) {
                let e = table.intern(a, b);
                table.faces[e].push(fi);
            }
        }
        table
    }

    fn intern(&mut self, a: usize, b: usize) -> usize {
        let key = (a.min(b), a.max(b));
        if let Some(&e) = self.index.get(&key) {
            return e;
        }
        let e = self.ends.len();
        self.ends.push(key);
        self.faces.push(Vec::new());
        self.index.insert(key, e);
        e
    }

    fn get(&self, a: usize, b: usize) -> usize {
        self.index[&(a.min(b), a.max(b))]
    }

    fn len(&self) -> usize {
        self.ends.len()
    }
}

fn face_edges(face: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    face.iter().zip(face.iter().cycle().skip(1)).map(|(&a, &b)| (a, b))
}

/// One Catmull-Clark pass. Winding is preserved.
pub fn catmull_clark(mesh: &PolyMesh) -> PolyMesh {
    let nv = mesh.vertex_count();
    let edges = EdgeTable::build(mesh);

    let face_points: Vec<Vec3> = mesh
        .faces
        .iter()
        .map(|f| f.iter().map(|&i| mesh.positions[i]).sum::<Vec3>() / f.len() as f32)
        .collect();

    let midpoint = |e: usize| {
        let (a, b) = edges.ends[e];
        (mesh.positions[a] + mesh.positions[b]) * 0.5
    };

    // Interior edges average endpoints and both face points; open edges keep the midpoint.
    let edge_points: Vec<Vec3> = (0..edges.len())
        .map(|e| match edges.faces[e].as_slice() {
            &[f0, f1] => {
                let (a, b) = edges.ends[e];
                (mesh.positions[a] + mesh.positions[b] + face_points[f0] + face_points[f1]) * 0.25
            }
            _ => midpoint(e),
        })
        .collect();

    // Per-vertex sums of adjacent face points and edge midpoints.
    let mut face_sum = vec![(Vec3::ZERO, 0u32); nv];
    for (fi, face) in mesh.faces.iter().enumerate() {
        for &v in face {
            face_sum[v].0 += face_points[fi];
            face_sum[v].1 += 1;
        }
    }
    let mut edge_sum = vec![(Vec3::ZERO, 0u32); nv];
    for (e, &(a, b)) in edges.ends.iter().enumerate() {
        for v in [a, b] {
            edge_sum[v].0 += midpoint(e);
            edge_sum[v].1 += 1;
        }
    }

    // (F + 2R + (n - 3)P) / n
    let moved: Vec<Vec3> = (0..nv)
        .map(|v| {
            let (fs, fc) = face_sum[v];
            let (es, ec) = edge_sum[v];
            if fc == 0 || ec == 0 {
                return mesh.positions[v];
            }
            let n = fc as f32;
            let f = fs / n;
            let r = es / ec as f32;
            (f + 2.0 * r + (n - 3.0) * mesh.positions[v]) / n
        })
        .collect();

    // Output layout: moved vertices, then edge points, then face points.
    let edge_base = nv;
    let face_base = nv + edges.len();
    let mut out = PolyMesh {
        positions: Vec::with_capacity(face_base + face_points.len()),
        faces: Vec::new(),
    };
    out.positions.extend(moved);
    out.positions.extend(edge_points);
    out.positions.extend(face_points.iter().copied());

    for (fi, face) in mesh.faces.iter().enumerate() {
        let n = face.len();
        for i in 0..n {
            let prev = face[(i + n - 1) % n];
            let curr = face[i];
            let next = face[(i + 1) % n];
            out.add_face(vec![
                curr,
                edge_base + edges.get(curr, next),
                face_base + fi,
                edge_base + edges.get(prev, curr),
            ]);
        }
    }
    out
}

/// Apply `levels` passes. Zero returns a copy.
pub fn subdivide(mesh: &PolyMesh, levels: u32) -> PolyMesh {
    (0..levels).fold(mesh.clone(), |m, _| catmull_clark(&m))
}

/// Push every vertex along its direction from the centroid by a random
/// fraction in `[-amount, amount]`. Same seed, same rock.
pub fn roughen(mut mesh: PolyMesh, amount: f32, seed: u64) -> PolyMesh {
    if mesh.positions.is_empty() || amount <= 0.0 {
        return mesh;
    }
    let centroid = mesh.positions.iter().sum::<Vec3>() / mesh.vertex_count() as f32;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for p in &mut mesh.positions {
        let scale = 1.0 + rng.gen_range(-amount..=amount);
        *p = centroid + (*p - centroid) * scale;
    }
    mesh
}
