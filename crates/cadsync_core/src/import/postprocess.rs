//! Mesh passes run once after a document's traversal.

use std::collections::HashSet;
use std::ops::Add;

use rayon::prelude::*;

use crate::scene::SceneDatabase;

use super::config::ImportConfig;
use super::context::TouchedSet;

/// Normal deviation allowed when merging triangles into quads (radians).
const QUAD_MERGE_ANGLE: f32 = 40.0 * std::f32::consts::PI / 180.0;

/// Normal deviation allowed when dissolving coplanar faces (radians).
const DISSOLVE_ANGLE: f32 = 5.0 * std::f32::consts::PI / 180.0;

/// What the post passes changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PostPassStats {
    pub meshes: usize,
    pub quads: usize,
    pub dissolved: usize,
    pub smoothed: usize,
}

impl Add for PostPassStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            meshes: self.meshes + other.meshes,
            quads: self.quads + other.quads,
            dissolved: self.dissolved + other.dissolved,
            smoothed: self.smoothed + other.smoothed,
        }
    }
}

/// Clean up and auto-smooth every mesh touched this run.
///
/// Cleanup runs first so auto-smooth sees the final polygons. Meshes are
/// independent, so they are processed in parallel.
pub fn run_post_passes(
    scene: &mut SceneDatabase,
    touched: &TouchedSet,
    config: &ImportConfig,
) -> PostPassStats {
    if !config.cleanup_after_import && !config.auto_smooth_use {
        return PostPassStats::default();
    }

    let names: HashSet<&str> = touched.meshes().collect();
    let stats = scene
        .meshes
        .items_mut()
        .par_iter_mut()
        .filter(|mesh| names.contains(mesh.name.as_str()))
        .map(|mesh| {
            let mut stats = PostPassStats {
                meshes: 1,
                ..Default::default()
            };
            if config.cleanup_after_import {
                stats.quads = mesh.tris_to_quads(QUAD_MERGE_ANGLE);
                stats.dissolved = mesh.dissolve_limited(DISSOLVE_ANGLE);
            }
            if config.auto_smooth_use {
                mesh.apply_auto_smooth(config.auto_smooth_angle);
                stats.smoothed = 1;
            }
            stats
        })
        .reduce(PostPassStats::default, |a, b| a + b);

    log::debug!(
        "Post passes: {} meshes, {} quads, {} dissolved, {} smoothed",
        stats.meshes,
        stats.quads,
        stats.dissolved,
        stats.smoothed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TargetMesh;
    use cadsync_math::Vec3;

    fn square_as_triangles(name: &str) -> TargetMesh {
        TargetMesh::new(
            name,
            vec![
                Vec3::ZERO,
                Vec3::X,
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::Y,
            ],
            Vec::new(),
            vec![vec![0, 1, 2], vec![0, 2, 3]],
        )
    }

    #[test]
    fn test_only_touched_meshes() {
        let mut scene = SceneDatabase::new();
        let touched_mesh = scene.add_mesh(square_as_triangles("Touched")).unwrap();
        let other_mesh = scene.add_mesh(square_as_triangles("Other")).unwrap();
        let mut touched = TouchedSet::new();
        touched.touch_mesh("Touched");

        let config = ImportConfig {
            cleanup_after_import: true,
            ..Default::default()
        };
        let stats = run_post_passes(&mut scene, &touched, &config);

        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.quads, 1);
        assert_eq!(stats.smoothed, 1);
        assert_eq!(scene.mesh(touched_mesh).unwrap().faces.len(), 1);
        assert!(scene.mesh(touched_mesh).unwrap().auto_smooth_angle.is_some());
        assert_eq!(scene.mesh(other_mesh).unwrap().faces.len(), 2);
        assert!(scene.mesh(other_mesh).unwrap().auto_smooth_angle.is_none());
    }

    #[test]
    fn test_disabled_passes() {
        let mut scene = SceneDatabase::new();
        let mesh = scene.add_mesh(square_as_triangles("Square")).unwrap();
        let mut touched = TouchedSet::new();
        touched.touch_mesh("Square");

        let config = ImportConfig {
            cleanup_after_import: false,
            auto_smooth_use: false,
            ..Default::default()
        };
        assert_eq!(run_post_passes(&mut scene, &touched, &config), PostPassStats::default());
        assert_eq!(scene.mesh(mesh).unwrap().faces.len(), 2);
    }
}
