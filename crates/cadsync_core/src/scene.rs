//! Persistent target scene database.
//!
//! The target scene keeps four name-unique namespaces (meshes, objects,
//! collections, materials). Names are the join key between a source
//! document node and whatever was materialized for it on a previous run,
//! so every namespace supports Blender-style "rename aside" which frees a
//! canonical name by moving the current holder to `<name>.NNN`.

use std::collections::HashMap;
use std::path::Path;

use cadsync_math::{LocalTransform, Mat4, Vec3};
use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mesh::TargetMesh;

/// Errors raised by scene database operations.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Name already in use: {0}")]
    NameTaken(String),

    #[error("Parenting '{child}' to '{parent}' would create a cycle")]
    WouldCreateCycle { child: String, parent: String },

    #[error("Invalid {kind} id: {index}")]
    InvalidId { kind: &'static str, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Anything stored in a name-unique namespace.
pub trait Named {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}

/// A name-unique namespace with stable indices.
///
/// Items are never removed, so an index handed out once stays valid for
/// the lifetime of the registry.
#[derive(Clone, Debug)]
pub struct Registry<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Named> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Mutable access. Callers must not change the item's name here,
    /// use `rename_aside` instead.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items.iter().enumerate()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name())
    }

    pub(crate) fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Insert an item under its own name. Fails if the name is taken.
    pub fn insert(&mut self, item: T) -> SceneResult<usize> {
        if self.index.contains_key(item.name()) {
            return Err(SceneError::NameTaken(item.name().to_string()));
        }
        let index = self.items.len();
        self.index.insert(item.name().to_string(), index);
        self.items.push(item);
        Ok(index)
    }

    /// Smallest free name of the form `base`, `base.001`, `base.002`, ...
    pub fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        let mut counter = 1u32;
        loop {
            let candidate = format!("{}.{:03}", base, counter);
            if !self.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Move the current holder of `name` to a fresh suffixed name.
    ///
    /// Returns the new name, or `None` if nothing held `name`.
    pub fn rename_aside(&mut self, name: &str) -> Option<String> {
        let index = self.find(name)?;
        let renamed = self.unique_name(name);
        self.index.remove(name);
        self.index.insert(renamed.clone(), index);
        self.items[index].set_name(renamed.clone());
        Some(renamed)
    }
}

impl<T: Serialize> Serialize for Registry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de> + Named> Deserialize<'de> for Registry<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        let mut registry = Registry::new();
        for item in items {
            registry.insert(item).map_err(D::Error::custom)?;
        }
        Ok(registry)
    }
}

/// Index of a mesh in the scene database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub usize);

/// Index of an object in the scene database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub usize);

/// Index of a collection in the scene database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub usize);

/// Index of a material in the scene database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub usize);

/// A surface material.
///
/// Only base color and alpha come from the source document; the remaining
/// factors keep their defaults so users can tweak them after import.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material name
    pub name: String,

    /// Diffuse/albedo color (RGB, 0-1)
    pub diffuse_color: Vec3,

    /// Opacity (0=transparent, 1=opaque)
    pub opacity: f32,

    /// Metallic factor (0=dielectric, 1=metal)
    pub metallic: f32,

    /// Roughness factor (0=smooth, 1=rough)
    pub roughness: f32,

    /// True when the material is shared by color fingerprint
    pub shared: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse_color: Vec3::splat(0.8), // CAD default grey
            opacity: 1.0,
            metallic: 0.0,
            roughness: 0.5,
            shared: false,
        }
    }
}

impl Material {
    /// Create a material with a name, color and opacity.
    pub fn new(name: impl Into<String>, diffuse_color: Vec3, opacity: f32) -> Self {
        Self {
            name: name.into(),
            diffuse_color,
            opacity,
            ..Default::default()
        }
    }

    /// Name used for a shared material of the given color, `material_RRGGBBAA`.
    pub fn fingerprint_name(diffuse_color: Vec3, opacity: f32) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "material_{:02X}{:02X}{:02X}{:02X}",
            channel(diffuse_color.x),
            channel(diffuse_color.y),
            channel(diffuse_color.z),
            channel(opacity)
        )
    }
}

impl Named for Material {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Named for TargetMesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// What a target object carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectData {
    /// Transform-only node
    Empty { display_size: f32 },

    /// Mesh-bearing object (meshes may be shared between objects)
    Mesh(MeshId),

    /// Instance of a whole collection
    CollectionInstance {
        collection: CollectionId,
        display_size: f32,
    },
}

/// A scene object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetObject {
    pub name: String,
    pub data: ObjectData,
    pub parent: Option<ObjectId>,
    pub transform: LocalTransform,

    /// Per-object materials that take precedence over the mesh slots
    pub material_overrides: Vec<MaterialId>,
}

impl TargetObject {
    fn with_data(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            data,
            parent: None,
            transform: LocalTransform::default(),
            material_overrides: Vec::new(),
        }
    }

    /// Create a transform-only object.
    pub fn empty(name: impl Into<String>, display_size: f32) -> Self {
        Self::with_data(name, ObjectData::Empty { display_size })
    }

    /// Create an object bound to a mesh.
    pub fn with_mesh(name: impl Into<String>, mesh: MeshId) -> Self {
        Self::with_data(name, ObjectData::Mesh(mesh))
    }

    /// Create an object instancing a collection.
    pub fn collection_instance(
        name: impl Into<String>,
        collection: CollectionId,
        display_size: f32,
    ) -> Self {
        Self::with_data(
            name,
            ObjectData::CollectionInstance {
                collection,
                display_size,
            },
        )
    }

    /// The mesh this object references, if any.
    pub fn mesh(&self) -> Option<MeshId> {
        match self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.data, ObjectData::Empty { .. })
    }
}

impl Named for TargetObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// A collection of objects and child collections.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetCollection {
    pub name: String,
    pub parent: Option<CollectionId>,
    pub objects: Vec<ObjectId>,
    pub children: Vec<CollectionId>,

    /// Excluded from the visible view layer
    pub hidden: bool,
}

impl TargetCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.objects.contains(&object)
    }
}

impl Named for TargetCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// The complete target scene.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneDatabase {
    pub meshes: Registry<TargetMesh>,
    pub objects: Registry<TargetObject>,
    pub collections: Registry<TargetCollection>,
    pub materials: Registry<Material>,
}

impl SceneDatabase {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    // --- meshes ---

    pub fn add_mesh(&mut self, mesh: TargetMesh) -> SceneResult<MeshId> {
        self.meshes.insert(mesh).map(MeshId)
    }

    pub fn find_mesh(&self, name: &str) -> Option<MeshId> {
        self.meshes.find(name).map(MeshId)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&TargetMesh> {
        self.meshes.get(id.0)
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> SceneResult<&mut TargetMesh> {
        self.meshes.get_mut(id.0).ok_or(SceneError::InvalidId {
            kind: "mesh",
            index: id.0,
        })
    }

    pub fn rename_mesh_aside(&mut self, name: &str) -> Option<String> {
        self.meshes.rename_aside(name)
    }

    /// Number of objects referencing a mesh.
    pub fn mesh_users(&self, mesh: MeshId) -> usize {
        self.objects
            .iter()
            .filter(|(_, object)| object.mesh() == Some(mesh))
            .count()
    }

    // --- objects ---

    pub fn add_object(&mut self, object: TargetObject) -> SceneResult<ObjectId> {
        self.objects.insert(object).map(ObjectId)
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects.find(name).map(ObjectId)
    }

    pub fn object(&self, id: ObjectId) -> Option<&TargetObject> {
        self.objects.get(id.0)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> SceneResult<&mut TargetObject> {
        self.objects.get_mut(id.0).ok_or(SceneError::InvalidId {
            kind: "object",
            index: id.0,
        })
    }

    pub fn rename_object_aside(&mut self, name: &str) -> Option<String> {
        self.objects.rename_aside(name)
    }

    /// Objects whose parent is `id`.
    pub fn children_of(&self, id: ObjectId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, object)| object.parent == Some(id))
            .map(|(index, _)| ObjectId(index))
            .collect()
    }

    /// Set or clear the parent of an object.
    ///
    /// Rejects any parent that is the object itself or one of its
    /// descendants, so the parent relation stays a forest.
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> SceneResult<()> {
        if let Some(parent) = parent {
            let mut cursor = Some(parent);
            let mut steps = 0;
            while let Some(current) = cursor {
                if current == child || steps > self.objects.len() {
                    return Err(SceneError::WouldCreateCycle {
                        child: self.object_name(child),
                        parent: self.object_name(parent),
                    });
                }
                cursor = self.object(current).and_then(|object| object.parent);
                steps += 1;
            }
            if self.object(parent).is_none() {
                return Err(SceneError::InvalidId {
                    kind: "object",
                    index: parent.0,
                });
            }
        }
        self.object_mut(child)?.parent = parent;
        Ok(())
    }

    /// World matrix of an object, composed through its parent chain.
    pub fn world_matrix(&self, id: ObjectId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut cursor = Some(id);
        let mut steps = 0;
        while let Some(current) = cursor {
            let Some(object) = self.object(current) else {
                break;
            };
            matrix = object.transform.to_matrix() * matrix;
            cursor = object.parent;
            steps += 1;
            if steps > self.objects.len() {
                break;
            }
        }
        matrix
    }

    fn object_name(&self, id: ObjectId) -> String {
        self.object(id)
            .map(|object| object.name.clone())
            .unwrap_or_else(|| format!("#{}", id.0))
    }

    // --- collections ---

    pub fn add_collection(&mut self, collection: TargetCollection) -> SceneResult<CollectionId> {
        self.collections.insert(collection).map(CollectionId)
    }

    pub fn find_collection(&self, name: &str) -> Option<CollectionId> {
        self.collections.find(name).map(CollectionId)
    }

    pub fn collection(&self, id: CollectionId) -> Option<&TargetCollection> {
        self.collections.get(id.0)
    }

    pub fn collection_mut(&mut self, id: CollectionId) -> SceneResult<&mut TargetCollection> {
        self.collections.get_mut(id.0).ok_or(SceneError::InvalidId {
            kind: "collection",
            index: id.0,
        })
    }

    pub fn rename_collection_aside(&mut self, name: &str) -> Option<String> {
        self.collections.rename_aside(name)
    }

    /// Make `child` a child collection of `parent`. Idempotent.
    pub fn link_collection(&mut self, parent: CollectionId, child: CollectionId) -> SceneResult<()> {
        if parent == child {
            return Ok(());
        }
        let previous = self.collection(child).and_then(|c| c.parent);
        if previous == Some(parent) {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.collection_mut(previous)?.children.retain(|c| *c != child);
        }
        let parent_collection = self.collection_mut(parent)?;
        if !parent_collection.children.contains(&child) {
            parent_collection.children.push(child);
        }
        self.collection_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Link an object into a collection. Returns true if it was not
    /// already a member.
    pub fn link_object(&mut self, collection: CollectionId, object: ObjectId) -> SceneResult<bool> {
        if self.object(object).is_none() {
            return Err(SceneError::InvalidId {
                kind: "object",
                index: object.0,
            });
        }
        let collection = self.collection_mut(collection)?;
        if collection.contains(object) {
            return Ok(false);
        }
        collection.objects.push(object);
        Ok(true)
    }

    /// Collections containing an object.
    pub fn collections_of(&self, object: ObjectId) -> Vec<CollectionId> {
        self.collections
            .iter()
            .filter(|(_, collection)| collection.contains(object))
            .map(|(index, _)| CollectionId(index))
            .collect()
    }

    /// Make `collection` the only collection containing `object`.
    pub fn set_exclusive_collection(
        &mut self,
        object: ObjectId,
        collection: CollectionId,
    ) -> SceneResult<()> {
        for other in self.collections_of(object) {
            if other != collection {
                self.collection_mut(other)?.objects.retain(|o| *o != object);
            }
        }
        self.link_object(collection, object)?;
        Ok(())
    }

    // --- materials ---

    pub fn add_material(&mut self, material: Material) -> SceneResult<MaterialId> {
        self.materials.insert(material).map(MaterialId)
    }

    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.materials.find(name).map(MaterialId)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    // --- persistence ---

    /// Serialize the scene to a JSON string.
    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a scene from JSON, rebuilding the name indices.
    pub fn from_json(content: &str) -> SceneResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a scene state file.
    pub fn load<P: AsRef<Path>>(path: P) -> SceneResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write a scene state file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SceneResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Number of transform-only objects.
    pub fn empty_count(&self) -> usize {
        self.objects.iter().filter(|(_, o)| o.is_empty()).count()
    }

    /// Number of objects carrying a mesh.
    pub fn mesh_object_count(&self) -> usize {
        self.objects.iter().filter(|(_, o)| o.mesh().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    use cadsync_math::{to_wxyz, Quat};

    fn triangle(name: &str) -> TargetMesh {
        TargetMesh::new(
            name,
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            Vec::new(),
            vec![vec![0, 1, 2]],
        )
    }

    #[test]
    fn test_insert_rejects_duplicate_names() {
        let mut scene = SceneDatabase::new();
        scene.add_mesh(triangle("Box")).unwrap();
        let result = scene.add_mesh(triangle("Box"));
        assert!(matches!(result, Err(SceneError::NameTaken(name)) if name == "Box"));
    }

    #[test]
    fn test_rename_aside_uses_smallest_free_suffix() {
        let mut scene = SceneDatabase::new();
        let first = scene.add_mesh(triangle("Box")).unwrap();
        scene.add_mesh(triangle("Box.001")).unwrap();

        let renamed = scene.rename_mesh_aside("Box");
        assert_eq!(renamed.as_deref(), Some("Box.002"));
        assert_eq!(scene.mesh(first).unwrap().name, "Box.002");
        assert!(scene.find_mesh("Box").is_none());

        // Canonical name is free again
        let second = scene.add_mesh(triangle("Box")).unwrap();
        assert_eq!(scene.find_mesh("Box"), Some(second));
        assert_eq!(scene.rename_mesh_aside("Missing"), None);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut scene = SceneDatabase::new();
        let a = scene.add_object(TargetObject::empty("A", 1.0)).unwrap();
        let b = scene.add_object(TargetObject::empty("B", 1.0)).unwrap();
        let c = scene.add_object(TargetObject::empty("C", 1.0)).unwrap();

        scene.set_parent(b, Some(a)).unwrap();
        scene.set_parent(c, Some(b)).unwrap();

        assert!(matches!(
            scene.set_parent(a, Some(c)),
            Err(SceneError::WouldCreateCycle { .. })
        ));
        assert!(matches!(
            scene.set_parent(a, Some(a)),
            Err(SceneError::WouldCreateCycle { .. })
        ));
        assert_eq!(scene.children_of(a), vec![b]);
    }

    #[test]
    fn test_collection_membership() {
        let mut scene = SceneDatabase::new();
        let root = scene.add_collection(TargetCollection::new("Root")).unwrap();
        let hidden = scene.add_collection(TargetCollection::new("Hidden")).unwrap();
        scene.link_collection(root, hidden).unwrap();
        scene.link_collection(root, hidden).unwrap();
        assert_eq!(scene.collection(root).unwrap().children, vec![hidden]);

        let object = scene.add_object(TargetObject::empty("Empty", 1.0)).unwrap();
        assert!(scene.link_object(root, object).unwrap());
        assert!(!scene.link_object(root, object).unwrap());
        assert_eq!(scene.collection(root).unwrap().objects.len(), 1);

        scene.set_exclusive_collection(object, hidden).unwrap();
        assert_eq!(scene.collections_of(object), vec![hidden]);
    }

    #[test]
    fn test_world_matrix_through_parents() {
        let mut scene = SceneDatabase::new();
        let mut parent = TargetObject::empty("Parent", 1.0);
        parent.transform.location = Vec3::new(1.0, 0.0, 0.0);
        parent.transform.rotation_quaternion = to_wxyz(Quat::from_rotation_z(FRAC_PI_2));
        let parent = scene.add_object(parent).unwrap();

        let mut child = TargetObject::empty("Child", 1.0);
        child.transform.location = Vec3::new(1.0, 0.0, 0.0);
        let child = scene.add_object(child).unwrap();
        scene.set_parent(child, Some(parent)).unwrap();

        let origin = scene.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_json_roundtrip_rebuilds_indices() {
        let mut scene = SceneDatabase::new();
        let mesh = scene.add_mesh(triangle("Tri")).unwrap();
        let object = scene.add_object(TargetObject::with_mesh("Tri", mesh)).unwrap();
        let collection = scene.add_collection(TargetCollection::new("Doc")).unwrap();
        scene.link_object(collection, object).unwrap();
        scene
            .add_material(Material::new("material_CCCCCCFF", Vec3::splat(0.8), 1.0))
            .unwrap();

        let json = scene.to_json().unwrap();
        let restored = SceneDatabase::from_json(&json).unwrap();

        assert_eq!(restored.find_mesh("Tri"), Some(mesh));
        assert_eq!(restored.find_object("Tri"), Some(object));
        assert_eq!(restored.object(object).unwrap().mesh(), Some(mesh));
        assert_eq!(restored.collection(collection).unwrap().objects, vec![object]);
        assert!(restored.find_material("material_CCCCCCFF").is_some());
    }

    #[test]
    fn test_material_fingerprint_name() {
        let name = Material::fingerprint_name(Vec3::new(1.0, 0.0, 0.5), 1.0);
        assert_eq!(name, "material_FF0080FF");
    }
}
