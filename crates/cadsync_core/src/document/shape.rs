//! Boundary-representation and mesh data attached to document nodes.
//!
//! These types are the hand-over format between a document provider and
//! the importer. They describe geometry in the node's local coordinates.

use std::collections::HashMap;

use cadsync_math::Vec3;
use serde::{Deserialize, Serialize};

/// Key into a document's geometry table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometryHandle(pub String);

impl GeometryHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

/// Triangulated face data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tessellation {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

/// A shape edge, stored as a polyline.
///
/// Straight edges have exactly two points. Curved edges carry a dense
/// polyline that the kernel resamples on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub points: Vec<Vec3>,

    #[serde(default)]
    pub curved: bool,
}

impl Edge {
    /// A straight edge between two points.
    pub fn line(start: Vec3, end: Vec3) -> Self {
        Self {
            points: vec![start, end],
            curved: false,
        }
    }

    /// A curved edge sampled along `points`.
    pub fn curve(points: Vec<Vec3>) -> Self {
        Self {
            points,
            curved: true,
        }
    }

    /// First and last point.
    pub fn endpoints(&self) -> Option<(Vec3, Vec3)> {
        Some((*self.points.first()?, *self.points.last()?))
    }
}

fn default_wire_count() -> usize {
    1
}

fn default_planar() -> bool {
    true
}

/// A bounded surface patch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Ordered vertices of the outer wire
    pub outer_wire: Vec<Vec3>,

    /// Number of wires (more than one means the face has holes)
    #[serde(default = "default_wire_count")]
    pub wire_count: usize,

    /// Surface is a plane
    #[serde(default = "default_planar")]
    pub planar: bool,

    /// Any bounding edge is curved
    #[serde(default)]
    pub curved: bool,

    /// Surface normal at the face's parametric origin
    pub normal: Vec3,

    /// Indices into the owning shape's edge list
    #[serde(default)]
    pub edges: Vec<usize>,

    /// Precomputed tessellation, if the provider has one
    #[serde(default)]
    pub tessellation: Option<Tessellation>,
}

impl Face {
    /// A planar polygonal face without holes.
    pub fn polygon(outer_wire: Vec<Vec3>, normal: Vec3) -> Self {
        Self {
            outer_wire,
            wire_count: 1,
            planar: true,
            curved: false,
            normal,
            edges: Vec::new(),
            tessellation: None,
        }
    }

    /// Average of the outer wire vertices.
    pub fn center(&self) -> Vec3 {
        if self.outer_wire.is_empty() {
            return Vec3::ZERO;
        }
        self.outer_wire.iter().copied().sum::<Vec3>() / self.outer_wire.len() as f32
    }

    /// Planar, single wire, straight edges: can be kept as one polygon.
    pub fn is_simple_polygon(&self) -> bool {
        self.wire_count <= 1 && self.planar && !self.curved && self.outer_wire.len() >= 3
    }
}

/// A boundary-representation shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub faces: Vec<Face>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Shape {
    /// Edges that bound no face.
    pub fn loose_edges(&self) -> impl Iterator<Item = &Edge> {
        let mut bounding = vec![false; self.edges.len()];
        for face in &self.faces {
            for &edge in &face.edges {
                if let Some(flag) = bounding.get_mut(edge) {
                    *flag = true;
                }
            }
        }
        self.edges
            .iter()
            .zip(bounding)
            .filter(|(_, bounding)| !bounding)
            .map(|(edge, _)| edge)
    }

    /// Axis-aligned box with one corner at the origin, like a CAD "Box"
    /// primitive.
    pub fn cuboid(size: Vec3) -> Self {
        let corner = |i: usize| {
            Vec3::new(
                if i & 1 != 0 { size.x } else { 0.0 },
                if i & 2 != 0 { size.y } else { 0.0 },
                if i & 4 != 0 { size.z } else { 0.0 },
            )
        };
        let loops: [([usize; 4], Vec3); 6] = [
            ([0, 2, 3, 1], Vec3::NEG_Z),
            ([4, 5, 7, 6], Vec3::Z),
            ([0, 1, 5, 4], Vec3::NEG_Y),
            ([2, 6, 7, 3], Vec3::Y),
            ([0, 4, 6, 2], Vec3::NEG_X),
            ([1, 3, 7, 5], Vec3::X),
        ];

        let mut edges = Vec::new();
        let mut edge_index: HashMap<(usize, usize), usize> = HashMap::new();
        let mut faces = Vec::with_capacity(loops.len());
        for (corners, normal) in loops {
            let mut face = Face::polygon(corners.iter().map(|&i| corner(i)).collect(), normal);
            for k in 0..corners.len() {
                let (a, b) = (corners[k], corners[(k + 1) % corners.len()]);
                let key = (a.min(b), a.max(b));
                let index = *edge_index.entry(key).or_insert_with(|| {
                    edges.push(Edge::line(corner(key.0), corner(key.1)));
                    edges.len() - 1
                });
                face.edges.push(index);
            }
            faces.push(face);
        }

        Self { faces, edges }
    }
}

/// A pre-triangulated (or polygonal) mesh stored directly on a node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMesh {
    pub positions: Vec<Vec3>,
    pub faces: Vec<Vec<u32>>,
}

/// Geometry behind a handle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    Brep(Shape),
    Mesh(RawMesh),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_topology() {
        let shape = Shape::cuboid(Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(shape.faces.len(), 6);
        assert_eq!(shape.edges.len(), 12);
        assert!(shape.faces.iter().all(|f| f.edges.len() == 4));
        assert_eq!(shape.loose_edges().count(), 0);
        assert!((shape.faces[1].center() - Vec3::new(1.0, 1.5, 4.0)).length() < 1e-6);
    }

    #[test]
    fn test_loose_edges() {
        let mut shape = Shape::cuboid(Vec3::ONE);
        shape.edges.push(Edge::line(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0)));
        let loose: Vec<_> = shape.loose_edges().collect();
        assert_eq!(loose.len(), 1);
        assert_eq!(
            loose[0].endpoints(),
            Some((Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0)))
        );
    }

    #[test]
    fn test_face_classification() {
        let square = Face::polygon(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            Vec3::Z,
        );
        assert!(square.is_simple_polygon());

        let mut holed = square.clone();
        holed.wire_count = 2;
        assert!(!holed.is_simple_polygon());

        let mut curved = square;
        curved.curved = true;
        assert!(!curved.is_simple_polygon());
    }
}
