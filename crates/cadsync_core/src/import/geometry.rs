//! Conversion of source geometry into target mesh buffers.

use std::collections::HashMap;

use cadsync_math::{Mat4, Vec3};

use crate::document::{Edge, GeometryKernel, KernelResult, RawMesh, Shape};

use super::config::ImportConfig;

/// Points sampled along a curved loose edge.
const EDGE_SAMPLES: usize = 9;

/// Above this angle (radians) between a polygon's winding normal and the
/// face normal, the polygon is reversed.
const FLIP_ANGLE: f32 = 1.57;

/// Vertex, edge and face buffers in document units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub positions: Vec<Vec3>,

    /// Loose edges
    pub edges: Vec<[u32; 2]>,

    pub faces: Vec<Vec<u32>>,

    /// Number of target faces produced by each source face, in order
    pub face_groups: Vec<usize>,

    lookup: HashMap<[u32; 3], u32>,
}

impl MeshBuffers {
    /// Convert a shape.
    ///
    /// Planar single-wire faces with straight edges stay one polygon unless
    /// `triangulate_meshes` is set; every other face goes through the
    /// kernel. Edges bounding no face become loose edges.
    pub fn from_shape<K: GeometryKernel + ?Sized>(
        shape: &Shape,
        kernel: &K,
        config: &ImportConfig,
    ) -> KernelResult<Self> {
        let mut buffers = Self::default();

        for face in &shape.faces {
            if !config.triangulate_meshes && face.is_simple_polygon() {
                let mut polygon: Vec<u32> =
                    face.outer_wire.iter().map(|p| buffers.vertex(*p)).collect();

                let center = face.center();
                let winding =
                    (face.outer_wire[0] - center).cross(face.outer_wire[1] - center);
                if winding.length_squared() > 0.0
                    && face.normal.length_squared() > 0.0
                    && winding.angle_between(face.normal) > FLIP_ANGLE
                {
                    polygon.reverse();
                }

                buffers.faces.push(polygon);
                buffers.face_groups.push(1);
            } else {
                let tessellation = kernel.tessellate(face, config.tessellation)?;
                let indices: Vec<u32> = tessellation
                    .positions
                    .iter()
                    .map(|p| buffers.vertex(*p))
                    .collect();
                for triangle in &tessellation.triangles {
                    buffers
                        .faces
                        .push(triangle.iter().map(|&i| indices[i as usize]).collect());
                }
                buffers.face_groups.push(tessellation.triangles.len());
            }
        }

        for edge in shape.loose_edges() {
            buffers.add_edge(edge, kernel)?;
        }

        log::debug!(
            "Converted shape: {} vertices, {} faces, {} loose edges",
            buffers.positions.len(),
            buffers.faces.len(),
            buffers.edges.len()
        );
        Ok(buffers)
    }

    /// Take a raw mesh as is. All faces form one material group.
    pub fn from_raw(mesh: &RawMesh) -> Self {
        let mut face_groups = Vec::new();
        if !mesh.faces.is_empty() {
            face_groups.push(mesh.faces.len());
        }
        Self {
            positions: mesh.positions.clone(),
            edges: Vec::new(),
            faces: mesh.faces.clone(),
            face_groups,
            lookup: HashMap::new(),
        }
    }

    fn add_edge<K: GeometryKernel + ?Sized>(&mut self, edge: &Edge, kernel: &K) -> KernelResult<()> {
        let points = if edge.curved {
            kernel.discretize(edge, EDGE_SAMPLES)?
        } else {
            match edge.endpoints() {
                Some((start, end)) => vec![start, end],
                None => return Ok(()),
            }
        };
        for pair in points.windows(2) {
            let a = self.vertex(pair[0]);
            let b = self.vertex(pair[1]);
            self.edges.push([a, b]);
        }
        Ok(())
    }

    /// Index of a position, adding it if no vertex sits exactly there.
    fn vertex(&mut self, position: Vec3) -> u32 {
        // Adding zero folds -0.0 into 0.0
        let key = (position + Vec3::ZERO).to_array().map(f32::to_bits);
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.lookup.insert(key, index);
        index
    }

    /// Apply a matrix to every position.
    pub fn transform(&mut self, matrix: Mat4) {
        for position in &mut self.positions {
            *position = matrix.transform_point3(*position);
        }
        self.lookup.clear();
    }

    /// Positions multiplied by the unit scale.
    pub fn scaled_positions(&self, scale: f32) -> Vec<Vec3> {
        self.positions.iter().map(|p| *p * scale).collect()
    }

    /// No vertices, or vertices without faces or edges.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || (self.faces.is_empty() && self.edges.is_empty())
    }
}
