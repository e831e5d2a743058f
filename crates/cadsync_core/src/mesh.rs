//! Target mesh geometry.
//!
//! Unlike render meshes, target meshes keep the polygon structure of the
//! source faces (triangles, quads and n-gons side by side) plus loose
//! edges, so that planar CAD faces stay single polygons after import.
//! Post-import passes (auto-smooth, triangle pairing and limited dissolve)
//! operate directly on that polygon list.

use std::collections::HashMap;

use cadsync_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::scene::MaterialId;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A polygon mesh in the target scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetMesh {
    /// Identity name (unique among meshes)
    pub name: String,

    /// Vertex positions in target units
    pub positions: Vec<Vec3>,

    /// Loose edges (index pairs not bounding any face)
    pub edges: Vec<[u32; 2]>,

    /// Polygons as vertex index loops
    pub faces: Vec<Vec<u32>>,

    /// Material slot index per face
    pub face_materials: Vec<u32>,

    /// Material slots
    pub materials: Vec<MaterialId>,

    /// Content hash of positions and faces
    pub fingerprint: u64,

    /// Shading angle, when auto-smooth is enabled
    pub auto_smooth_angle: Option<f32>,

    /// Edges rendered sharp under auto-smooth
    pub sharp_edges: Vec<[u32; 2]>,
}

impl TargetMesh {
    /// Create a mesh from positions, loose edges and polygons.
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        edges: Vec<[u32; 2]>,
        faces: Vec<Vec<u32>>,
    ) -> Self {
        let fingerprint = Self::compute_fingerprint(&positions, &faces);
        let face_materials = vec![0; faces.len()];
        Self {
            name: name.into(),
            positions,
            edges,
            faces,
            face_materials,
            materials: Vec::new(),
            fingerprint,
            auto_smooth_angle: None,
            sharp_edges: Vec::new(),
        }
    }

    /// FNV-1a hash over the raw bytes of positions and face loops.
    ///
    /// Each face is hashed as its length followed by its indices so that
    /// different splits of the same index stream hash differently.
    pub fn compute_fingerprint(positions: &[Vec3], faces: &[Vec<u32>]) -> u64 {
        let points: Vec<[f32; 3]> = positions.iter().map(|p| p.to_array()).collect();
        let mut loops: Vec<u32> = Vec::with_capacity(faces.len() * 5);
        for face in faces {
            loops.push(face.len() as u32);
            loops.extend_from_slice(face);
        }

        let mut hash = FNV_OFFSET;
        let streams: [&[u8]; 2] = [
            bytemuck::cast_slice(points.as_slice()),
            bytemuck::cast_slice(loops.as_slice()),
        ];
        for bytes in streams {
            for byte in bytes {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        hash
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of polygons in the mesh.
    pub fn polygon_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of triangles a fan triangulation of every polygon would yield.
    pub fn triangle_count(&self) -> usize {
        self.faces
            .iter()
            .map(|face| face.len().saturating_sub(2))
            .sum()
    }

    /// True when the mesh has no vertices.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Unit normal of a polygon (Newell's method), zero if degenerate.
    pub fn face_normal(&self, face: usize) -> Vec3 {
        self.faces
            .get(face)
            .map(|polygon| polygon_normal(&self.positions, polygon))
            .unwrap_or(Vec3::ZERO)
    }

    /// Map from undirected edge to the faces using it.
    pub fn edge_faces(&self) -> HashMap<(u32, u32), Vec<usize>> {
        let mut map: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (index, face) in self.faces.iter().enumerate() {
            for i in 0..face.len() {
                let key = edge_key(face[i], face[(i + 1) % face.len()]);
                map.entry(key).or_default().push(index);
            }
        }
        map
    }

    /// Enable auto-smooth: every interior edge whose adjacent polygon
    /// normals differ by more than `angle` radians is marked sharp.
    pub fn apply_auto_smooth(&mut self, angle: f32) {
        let normals: Vec<Vec3> = (0..self.faces.len()).map(|i| self.face_normal(i)).collect();

        let mut sharp: Vec<[u32; 2]> = self
            .edge_faces()
            .into_iter()
            .filter_map(|((a, b), faces)| {
                if faces.len() != 2 {
                    return None;
                }
                let (n0, n1) = (normals[faces[0]], normals[faces[1]]);
                if n0 == Vec3::ZERO || n1 == Vec3::ZERO {
                    return None;
                }
                (n0.angle_between(n1) > angle).then_some([a, b])
            })
            .collect();
        sharp.sort_unstable();

        self.sharp_edges = sharp;
        self.auto_smooth_angle = Some(angle);
    }

    /// Merge pairs of adjacent triangles into convex quads.
    ///
    /// Pairs must share a material and their normals may differ by at most
    /// `max_angle` radians. Flattest pairs are merged first. Returns the
    /// number of quads created.
    pub fn tris_to_quads(&mut self, max_angle: f32) -> usize {
        self.merge_pass(max_angle, true)
    }

    /// Repeatedly merge adjacent polygons that share exactly one edge, use
    /// the same material and are coplanar within `max_angle` radians.
    /// Returns the number of merges.
    pub fn dissolve_limited(&mut self, max_angle: f32) -> usize {
        let mut total = 0;
        loop {
            let merged = self.merge_pass(max_angle, false);
            if merged == 0 {
                break;
            }
            total += merged;
        }
        total
    }

    /// One greedy merge pass; each face takes part in at most one merge.
    fn merge_pass(&mut self, max_angle: f32, triangles_only: bool) -> usize {
        let normals: Vec<Vec3> = (0..self.faces.len()).map(|i| self.face_normal(i)).collect();
        let material = |face: usize| self.face_materials.get(face).copied().unwrap_or(0);

        let mut candidates: Vec<(f32, (u32, u32), usize, usize)> = self
            .edge_faces()
            .into_iter()
            .filter_map(|(key, faces)| {
                if faces.len() != 2 || faces[0] == faces[1] {
                    return None;
                }
                let (a, b) = (faces[0], faces[1]);
                if triangles_only && (self.faces[a].len() != 3 || self.faces[b].len() != 3) {
                    return None;
                }
                if material(a) != material(b) {
                    return None;
                }
                if normals[a] == Vec3::ZERO || normals[b] == Vec3::ZERO {
                    return None;
                }
                let angle = normals[a].angle_between(normals[b]);
                (angle <= max_angle).then_some((angle, key, a, b))
            })
            .collect();
        candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

        let count = self.faces.len();
        let mut consumed = vec![false; count];
        let mut removed = vec![false; count];
        let mut replacement: Vec<Option<Vec<u32>>> = vec![None; count];
        let mut merges = 0;

        for (_, _, a, b) in candidates {
            if consumed[a] || consumed[b] {
                continue;
            }
            let Some(merged) = join_polygons(&self.faces[a], &self.faces[b]) else {
                continue;
            };
            if triangles_only && !is_convex(&self.positions, &merged) {
                continue;
            }
            consumed[a] = true;
            consumed[b] = true;
            removed[b] = true;
            replacement[a] = Some(merged);
            merges += 1;
        }

        if merges == 0 {
            return 0;
        }

        let old_faces = std::mem::take(&mut self.faces);
        let mut faces = Vec::with_capacity(count - merges);
        let mut face_materials = Vec::with_capacity(count - merges);
        for (index, face) in old_faces.into_iter().enumerate() {
            if removed[index] {
                continue;
            }
            face_materials.push(self.face_materials.get(index).copied().unwrap_or(0));
            faces.push(replacement[index].take().unwrap_or(face));
        }
        self.faces = faces;
        self.face_materials = face_materials;
        merges
    }
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn polygon_normal(positions: &[Vec3], polygon: &[u32]) -> Vec3 {
    let point = |i: u32| positions.get(i as usize).copied().unwrap_or(Vec3::ZERO);
    let mut normal = Vec3::ZERO;
    for i in 0..polygon.len() {
        let current = point(polygon[i]);
        let next = point(polygon[(i + 1) % polygon.len()]);
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal.normalize_or_zero()
}

/// Join two polygons across their shared edge.
///
/// The shared edge must appear with opposite winding in the two loops and
/// must be the only one they share.
fn join_polygons(a: &[u32], b: &[u32]) -> Option<Vec<u32>> {
    let (la, lb) = (a.len(), b.len());
    if la < 3 || lb < 3 {
        return None;
    }

    let mut shared = None;
    for i in 0..la {
        let (u, v) = (a[i], a[(i + 1) % la]);
        for j in 0..lb {
            if b[j] == v && b[(j + 1) % lb] == u {
                if shared.is_some() {
                    return None;
                }
                shared = Some((i, j));
            }
        }
    }
    let (i, j) = shared?;

    // a from v around to u, then b's vertices strictly between u and v
    let mut merged = Vec::with_capacity(la + lb - 2);
    merged.extend((0..la).map(|k| a[(i + 1 + k) % la]));
    merged.extend((0..lb - 2).map(|k| b[(j + 2 + k) % lb]));

    let mut unique = merged.clone();
    unique.sort_unstable();
    unique.dedup();
    (unique.len() == merged.len()).then_some(merged)
}

fn is_convex(positions: &[Vec3], polygon: &[u32]) -> bool {
    let normal = polygon_normal(positions, polygon);
    if normal == Vec3::ZERO {
        return false;
    }
    let point = |i: u32| positions.get(i as usize).copied().unwrap_or(Vec3::ZERO);
    let n = polygon.len();
    (0..n).all(|i| {
        let a = point(polygon[i]);
        let b = point(polygon[(i + 1) % n]);
        let c = point(polygon[(i + 2) % n]);
        (b - a).cross(c - b).dot(normal) > 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit cube with outward-facing quads.
    fn cube() -> TargetMesh {
        let positions = (0..8)
            .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
            .collect();
        let faces = vec![
            vec![0, 2, 3, 1], // -Z
            vec![4, 5, 7, 6], // +Z
            vec![0, 1, 5, 4], // -Y
            vec![2, 6, 7, 3], // +Y
            vec![0, 4, 6, 2], // -X
            vec![1, 3, 7, 5], // +X
        ];
        TargetMesh::new("Cube", positions, Vec::new(), faces)
    }

    fn grid_strip(quads: u32) -> TargetMesh {
        let mut positions = Vec::new();
        for y in 0..2 {
            for x in 0..=quads {
                positions.push(Vec3::new(x as f32, y as f32, 0.0));
            }
        }
        let row = quads + 1;
        let faces = (0..quads)
            .map(|x| vec![x, x + 1, row + x + 1, row + x])
            .collect();
        TargetMesh::new("Strip", positions, Vec::new(), faces)
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = cube();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.polygon_count(), 6);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.face_materials, vec![0; 6]);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = cube();
        let b = cube();
        assert_eq!(a.fingerprint, b.fingerprint);

        let mut moved = a.positions.clone();
        moved[0].x += 0.5;
        assert_ne!(TargetMesh::compute_fingerprint(&moved, &a.faces), a.fingerprint);

        let mut rewound = a.faces.clone();
        rewound[0].reverse();
        assert_ne!(TargetMesh::compute_fingerprint(&a.positions, &rewound), a.fingerprint);
    }

    #[test]
    fn test_face_normals_point_outward() {
        let mesh = cube();
        assert!((mesh.face_normal(0) - Vec3::NEG_Z).length() < 1e-6);
        assert!((mesh.face_normal(1) - Vec3::Z).length() < 1e-6);
        assert!((mesh.face_normal(5) - Vec3::X).length() < 1e-6);
        assert_eq!(mesh.face_normal(42), Vec3::ZERO);
    }

    #[test]
    fn test_auto_smooth_marks_sharp_edges() {
        let mut mesh = cube();
        mesh.apply_auto_smooth(30f32.to_radians());
        assert_eq!(mesh.sharp_edges.len(), 12);
        assert_eq!(mesh.auto_smooth_angle, Some(30f32.to_radians()));

        mesh.apply_auto_smooth(100f32.to_radians());
        assert!(mesh.sharp_edges.is_empty());
    }

    #[test]
    fn test_tris_to_quads_merges_coplanar_pair() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = TargetMesh::new(
            "Quad",
            positions,
            Vec::new(),
            vec![vec![0, 1, 2], vec![0, 2, 3]],
        );

        assert_eq!(mesh.tris_to_quads(40f32.to_radians()), 1);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2, 3]]);
        assert_eq!(mesh.face_materials, vec![0]);
    }

    #[test]
    fn test_tris_to_quads_respects_material_and_angle() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let faces = vec![vec![0, 1, 2], vec![0, 2, 3]];

        let mut split = TargetMesh::new("Split", positions.clone(), Vec::new(), faces.clone());
        split.face_materials = vec![0, 1];
        assert_eq!(split.tris_to_quads(40f32.to_radians()), 0);

        // Fold the second triangle up by 90 degrees around the diagonal
        let mut folded_positions = positions;
        folded_positions[3] = Vec3::new(0.5, 0.5, 0.7);
        let mut folded = TargetMesh::new("Folded", folded_positions, Vec::new(), faces);
        assert_eq!(folded.tris_to_quads(40f32.to_radians()), 0);
        assert_eq!(folded.polygon_count(), 2);
    }

    #[test]
    fn test_dissolve_limited_merges_strip() {
        let mut mesh = grid_strip(3);
        assert_eq!(mesh.polygon_count(), 3);

        let merges = mesh.dissolve_limited(5f32.to_radians());

        assert_eq!(merges, 2);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.faces[0].len(), 8);
        assert!((mesh.face_normal(0) - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_dissolve_limited_keeps_cube_faces() {
        let mut mesh = cube();
        assert_eq!(mesh.dissolve_limited(5f32.to_radians()), 0);
        assert_eq!(mesh.polygon_count(), 6);
    }

    #[test]
    fn test_join_polygons_requires_single_shared_edge() {
        assert_eq!(join_polygons(&[0, 1, 2], &[2, 1, 3]), Some(vec![2, 0, 1, 3]));
        // Same winding on the shared edge
        assert_eq!(join_polygons(&[0, 1, 2], &[1, 2, 3]), None);
        // Two shared edges
        assert_eq!(join_polygons(&[0, 1, 2, 3], &[2, 1, 0, 4]), None);
    }
}
