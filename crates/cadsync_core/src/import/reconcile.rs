//! Create-or-update of meshes and mesh-bearing objects.
//!
//! Both reconcilers key on identity names. A name in the touched set is
//! always reused as is; otherwise the update flag decides between
//! refreshing the existing node and renaming it aside.

use crate::document::Appearance;
use crate::mesh::TargetMesh;
use crate::scene::{MeshId, ObjectData, ObjectId, SceneDatabase, SceneResult, TargetObject};

use super::config::ImportConfig;
use super::context::TouchedSet;
use super::geometry::MeshBuffers;
use super::materials::MaterialDeduplicator;

/// What happened to a reconciled node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// A new node took the identity name
    Created,
    /// An existing node was refreshed in place
    Updated,
    /// Already reconciled this run, returned unchanged
    Reused,
}

impl Reconciled {
    pub fn is_new(self) -> bool {
        self == Reconciled::Created
    }
}

/// Mesh create-or-get.
#[derive(Clone, Copy, Debug)]
pub struct MeshReconciler<'a> {
    config: &'a ImportConfig,
}

impl<'a> MeshReconciler<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Self { config }
    }

    /// Return the mesh for `name`, creating it from `buffers` when needed.
    ///
    /// With `update_only_modified_meshes`, an existing mesh whose stored
    /// fingerprint matches the new buffers is kept. Any other existing mesh
    /// is renamed aside before the new one takes the name.
    pub fn create_or_get(
        &self,
        scene: &mut SceneDatabase,
        touched: &mut TouchedSet,
        name: &str,
        buffers: &MeshBuffers,
    ) -> SceneResult<(MeshId, Reconciled)> {
        let positions = buffers.scaled_positions(self.config.scale);

        if let Some(existing) = scene.find_mesh(name) {
            if touched.has_mesh(name) {
                return Ok((existing, Reconciled::Reused));
            }

            if self.config.update && self.config.update_only_modified_meshes {
                let fingerprint = TargetMesh::compute_fingerprint(&positions, &buffers.faces);
                if scene.mesh(existing).map(|m| m.fingerprint) == Some(fingerprint) {
                    log::debug!("Mesh '{}' unchanged, keeping it", name);
                    touched.touch_mesh(name);
                    return Ok((existing, Reconciled::Updated));
                }
            }

            if let Some(renamed) = scene.rename_mesh_aside(name) {
                log::debug!("Renamed stale mesh '{}' to '{}'", name, renamed);
            }
        }

        let mesh = TargetMesh::new(name, positions, buffers.edges.clone(), buffers.faces.clone());
        let id = scene.add_mesh(mesh)?;
        touched.touch_mesh(name);
        Ok((id, Reconciled::Created))
    }
}

/// Object create-or-update.
#[derive(Clone, Copy, Debug)]
pub struct ObjectReconciler<'a> {
    config: &'a ImportConfig,
    materials: MaterialDeduplicator,
}

impl<'a> ObjectReconciler<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Self {
            config,
            materials: MaterialDeduplicator::new(config.sharemats),
        }
    }

    /// Bind `mesh` to the object named `name`.
    ///
    /// An existing untouched object is kept (transform included) and gets
    /// the new mesh when updating; the old mesh's materials carry over if
    /// the new mesh has none. New objects get materials from `appearance`
    /// when their mesh has no slots yet.
    pub fn create_or_update(
        &self,
        scene: &mut SceneDatabase,
        touched: &mut TouchedSet,
        name: &str,
        mesh: MeshId,
        appearance: Option<&Appearance>,
        face_groups: &[usize],
    ) -> SceneResult<(ObjectId, Reconciled)> {
        if let Some(existing) = scene.find_object(name) {
            if touched.has_object(name) {
                return Ok((existing, Reconciled::Reused));
            }

            if self.config.update {
                let previous = scene.object(existing).and_then(TargetObject::mesh);
                if let Some(previous) = previous.filter(|p| *p != mesh) {
                    carry_materials(scene, previous, mesh)?;
                }
                scene.object_mut(existing)?.data = ObjectData::Mesh(mesh);
                self.ensure_materials(scene, name, mesh, appearance, face_groups)?;
                touched.touch_object(name);
                log::debug!("Updated object '{}'", name);
                return Ok((existing, Reconciled::Updated));
            }

            scene.rename_object_aside(name);
        }

        let id = scene.add_object(TargetObject::with_mesh(name, mesh))?;
        self.ensure_materials(scene, name, mesh, appearance, face_groups)?;
        touched.touch_object(name);
        log::debug!("Created object '{}'", name);
        Ok((id, Reconciled::Created))
    }

    fn ensure_materials(
        &self,
        scene: &mut SceneDatabase,
        owner: &str,
        mesh: MeshId,
        appearance: Option<&Appearance>,
        face_groups: &[usize],
    ) -> SceneResult<()> {
        if !scene.mesh_mut(mesh)?.materials.is_empty() {
            return Ok(());
        }
        let resolved = self.materials.resolve(scene, owner, appearance, face_groups)?;
        let target = scene.mesh_mut(mesh)?;
        target.materials = resolved.slots;
        if resolved.face_slots.len() == target.faces.len() {
            target.face_materials = resolved.face_slots;
        }
        Ok(())
    }
}

/// Copy material slots from `from` onto `to` if `to` has none. Face slot
/// indices are copied when the face counts agree.
fn carry_materials(scene: &mut SceneDatabase, from: MeshId, to: MeshId) -> SceneResult<()> {
    let Some(source) = scene.mesh(from) else {
        return Ok(());
    };
    let slots = source.materials.clone();
    let face_slots = source.face_materials.clone();

    let target = scene.mesh_mut(to)?;
    if !target.materials.is_empty() || slots.is_empty() {
        return Ok(());
    }
    if face_slots.len() == target.faces.len() {
        target.face_materials = face_slots;
    } else {
        target.face_materials = vec![0; target.faces.len()];
    }
    target.materials = slots;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RawMesh;
    use cadsync_math::Vec3;

    fn triangle(offset: f32) -> MeshBuffers {
        MeshBuffers::from_raw(&RawMesh {
            positions: vec![
                Vec3::new(offset, 0.0, 0.0),
                Vec3::new(offset + 1000.0, 0.0, 0.0),
                Vec3::new(offset, 1000.0, 0.0),
            ],
            faces: vec![vec![0, 1, 2]],
        })
    }

    #[test]
    fn test_mesh_positions_scaled() {
        let config = ImportConfig::default();
        let mut scene = SceneDatabase::new();
        let mut touched = TouchedSet::new();

        let (id, outcome) = MeshReconciler::new(&config)
            .create_or_get(&mut scene, &mut touched, "Tri", &triangle(0.0))
            .unwrap();

        assert_eq!(outcome, Reconciled::Created);
        assert!(touched.has_mesh("Tri"));
        assert!((scene.mesh(id).unwrap().positions[1] - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_mesh_touched_is_reused() {
        let config = ImportConfig::default();
        let reconciler = MeshReconciler::new(&config);
        let mut scene = SceneDatabase::new();
        let mut touched = TouchedSet::new();

        let (first, _) = reconciler
            .create_or_get(&mut scene, &mut touched, "Tri", &triangle(0.0))
            .unwrap();
        let (second, outcome) = reconciler
            .create_or_get(&mut scene, &mut touched, "Tri", &triangle(500.0))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(outcome, Reconciled::Reused);
        assert_eq!(scene.meshes.len(), 1);
    }

    #[test]
    fn test_mesh_next_run() {
        let config = ImportConfig::default();
        let reconciler = MeshReconciler::new(&config);
        let mut scene = SceneDatabase::new();

        let (original, _) = reconciler
            .create_or_get(&mut scene, &mut TouchedSet::new(), "Tri", &triangle(0.0))
            .unwrap();

        // Unchanged content keeps the mesh
        let (same, outcome) = reconciler
            .create_or_get(&mut scene, &mut TouchedSet::new(), "Tri", &triangle(0.0))
            .unwrap();
        assert_eq!(same, original);
        assert_eq!(outcome, Reconciled::Updated);

        // Changed content renames the old mesh aside
        let (changed, outcome) = reconciler
            .create_or_get(&mut scene, &mut TouchedSet::new(), "Tri", &triangle(10.0))
            .unwrap();
        assert_ne!(changed, original);
        assert_eq!(outcome, Reconciled::Created);
        assert_eq!(scene.find_mesh("Tri"), Some(changed));
        assert_eq!(scene.mesh(original).unwrap().name, "Tri.001");
    }

    #[test]
    fn test_mesh_always_replaced_without_fingerprint_check() {
        let config = ImportConfig {
            update_only_modified_meshes: false,
            ..Default::default()
        };
        let reconciler = MeshReconciler::new(&config);
        let mut scene = SceneDatabase::new();

        reconciler
            .create_or_get(&mut scene, &mut TouchedSet::new(), "Tri", &triangle(0.0))
            .unwrap();
        let (_, outcome) = reconciler
            .create_or_get(&mut scene, &mut TouchedSet::new(), "Tri", &triangle(0.0))
            .unwrap();

        assert_eq!(outcome, Reconciled::Created);
        assert!(scene.find_mesh("Tri.001").is_some());
    }

    #[test]
    fn test_object_update_keeps_materials() {
        let config = ImportConfig::default();
        let meshes = MeshReconciler::new(&config);
        let objects = ObjectReconciler::new(&config);
        let mut scene = SceneDatabase::new();
        let red = Appearance::colored([1.0, 0.0, 0.0]);

        let mut touched = TouchedSet::new();
        let buffers = triangle(0.0);
        let (mesh, _) = meshes.create_or_get(&mut scene, &mut touched, "Tri", &buffers).unwrap();
        let (object, outcome) = objects
            .create_or_update(&mut scene, &mut touched, "Tri", mesh, Some(&red), &buffers.face_groups)
            .unwrap();
        assert!(outcome.is_new());
        let slots = scene.mesh(mesh).unwrap().materials.clone();
        assert_eq!(slots.len(), 1);

        // A user moves the object between runs
        scene.object_mut(object).unwrap().transform.location = Vec3::new(5.0, 0.0, 0.0);

        let mut touched = TouchedSet::new();
        let buffers = triangle(10.0);
        let (new_mesh, _) = meshes.create_or_get(&mut scene, &mut touched, "Tri", &buffers).unwrap();
        let (same, outcome) = objects
            .create_or_update(&mut scene, &mut touched, "Tri", new_mesh, None, &buffers.face_groups)
            .unwrap();

        assert_eq!(same, object);
        assert_eq!(outcome, Reconciled::Updated);
        let updated = scene.object(object).unwrap();
        assert_eq!(updated.mesh(), Some(new_mesh));
        assert_eq!(updated.transform.location, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(scene.mesh(new_mesh).unwrap().materials, slots);
    }

    #[test]
    fn test_object_without_update_renames_aside() {
        let config = ImportConfig {
            update: false,
            ..Default::default()
        };
        let meshes = MeshReconciler::new(&config);
        let objects = ObjectReconciler::new(&config);
        let mut scene = SceneDatabase::new();

        for _ in 0..2 {
            let mut touched = TouchedSet::new();
            let buffers = triangle(0.0);
            let (mesh, _) = meshes.create_or_get(&mut scene, &mut touched, "Tri", &buffers).unwrap();
            let (_, outcome) = objects
                .create_or_update(&mut scene, &mut touched, "Tri", mesh, None, &buffers.face_groups)
                .unwrap();
            assert!(outcome.is_new());
        }

        assert!(scene.find_object("Tri").is_some());
        assert!(scene.find_object("Tri.001").is_some());
        assert!(scene.find_mesh("Tri.001").is_some());
        let current = scene.object(scene.find_object("Tri").unwrap()).unwrap();
        assert_eq!(current.mesh(), scene.find_mesh("Tri"));
    }
}
