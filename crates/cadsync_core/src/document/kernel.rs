//! Geometry kernel seam.
//!
//! The importer never evaluates surfaces itself. Curved, holed or
//! non-planar faces and curved loose edges are handed to a
//! [`GeometryKernel`]. [`StoredKernel`] serves documents that already carry
//! tessellations (exported files, tests).

use cadsync_math::Vec3;
use thiserror::Error;

use super::shape::{Edge, Face, Tessellation};

/// Errors raised by a geometry kernel.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Geometry kernel unavailable: {0}")]
    Unavailable(String),

    #[error("Face has no tessellation and fewer than 3 outer wire vertices")]
    EmptyFace,

    #[error("Edge has no points")]
    EmptyEdge,

    #[error("Tessellation references vertex {index} but only {count} exist")]
    InvalidTessellation { index: u32, count: usize },
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Surface and curve evaluation backend.
pub trait GeometryKernel {
    /// Fails when the backend library cannot be used.
    fn check_available(&self) -> KernelResult<()>;

    /// Triangulate a face within `tolerance` (document units).
    fn tessellate(&self, face: &Face, tolerance: f32) -> KernelResult<Tessellation>;

    /// Sample `count` evenly spaced points along an edge.
    fn discretize(&self, edge: &Edge, count: usize) -> KernelResult<Vec<Vec3>>;
}

/// Kernel backed by data stored on the shapes themselves.
///
/// Faces with a stored tessellation return it unchanged. Faces without one
/// are fan-triangulated from the outer wire, wound along the face normal.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoredKernel;

impl GeometryKernel for StoredKernel {
    fn check_available(&self) -> KernelResult<()> {
        Ok(())
    }

    fn tessellate(&self, face: &Face, tolerance: f32) -> KernelResult<Tessellation> {
        if let Some(stored) = &face.tessellation {
            let count = stored.positions.len();
            for triangle in &stored.triangles {
                for &index in triangle {
                    if index as usize >= count {
                        return Err(KernelError::InvalidTessellation { index, count });
                    }
                }
            }
            return Ok(stored.clone());
        }

        let wire = &face.outer_wire;
        if wire.len() < 3 {
            return Err(KernelError::EmptyFace);
        }
        log::debug!(
            "Fan-triangulating {} vertex face (tolerance {} ignored)",
            wire.len(),
            tolerance
        );

        let last = wire.len() as u32 - 1;
        let mut triangles: Vec<[u32; 3]> = (1..last).map(|i| [0, i, i + 1]).collect();

        let fan_normal = (wire[1] - wire[0]).cross(wire[2] - wire[0]);
        if fan_normal.dot(face.normal) < 0.0 {
            for triangle in &mut triangles {
                triangle.swap(1, 2);
            }
        }

        Ok(Tessellation {
            positions: wire.clone(),
            triangles,
        })
    }

    fn discretize(&self, edge: &Edge, count: usize) -> KernelResult<Vec<Vec3>> {
        let points = &edge.points;
        let first = *points.first().ok_or(KernelError::EmptyEdge)?;
        if count < 2 || points.len() == 1 {
            return Ok(vec![first; count.max(1)]);
        }

        // Cumulative arc length at every polyline point
        let mut lengths = Vec::with_capacity(points.len());
        let mut total = 0.0;
        lengths.push(0.0);
        for pair in points.windows(2) {
            total += pair[0].distance(pair[1]);
            lengths.push(total);
        }
        if total <= 0.0 {
            return Ok(vec![first; count]);
        }

        let mut samples = Vec::with_capacity(count);
        let mut segment = 0;
        for k in 0..count {
            let target = total * k as f32 / (count - 1) as f32;
            while segment + 2 < points.len() && lengths[segment + 1] < target {
                segment += 1;
            }
            let span = lengths[segment + 1] - lengths[segment];
            let t = if span > 0.0 {
                ((target - lengths[segment]) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            samples.push(points[segment].lerp(points[segment + 1], t));
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_triangulation_follows_normal() {
        let kernel = StoredKernel;
        let square = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::Y,
        ];

        let up = kernel.tessellate(&Face::polygon(square.clone(), Vec3::Z), 0.1).unwrap();
        assert_eq!(up.triangles, vec![[0, 1, 2], [0, 2, 3]]);

        let down = kernel.tessellate(&Face::polygon(square, Vec3::NEG_Z), 0.1).unwrap();
        assert_eq!(down.triangles, vec![[0, 2, 1], [0, 3, 2]]);
    }

    #[test]
    fn test_stored_tessellation_is_validated() {
        let kernel = StoredKernel;
        let mut face = Face::polygon(Vec::new(), Vec3::Z);
        assert!(matches!(kernel.tessellate(&face, 0.1), Err(KernelError::EmptyFace)));

        face.tessellation = Some(Tessellation {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            triangles: vec![[0, 1, 3]],
        });
        assert!(matches!(
            kernel.tessellate(&face, 0.1),
            Err(KernelError::InvalidTessellation { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_discretize_resamples_by_length() {
        let kernel = StoredKernel;
        let edge = Edge::curve(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 0.0)]);

        let points = kernel.discretize(&edge, 9).unwrap();

        assert_eq!(points.len(), 9);
        assert_eq!(points[0], Vec3::ZERO);
        assert!((points[4] - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        assert!((points[8] - Vec3::new(2.0, 2.0, 0.0)).length() < 1e-5);
        assert!((points[2] - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_discretize_empty_edge() {
        let kernel = StoredKernel;
        let edge = Edge::curve(Vec::new());
        assert!(matches!(kernel.discretize(&edge, 9), Err(KernelError::EmptyEdge)));
    }
}
