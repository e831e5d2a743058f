//! Material creation and sharing.

use cadsync_math::Vec3;

use crate::document::Appearance;
use crate::scene::{Material, MaterialId, SceneDatabase, SceneResult};

/// Material slots for one mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedMaterials {
    pub slots: Vec<MaterialId>,

    /// Slot index per target face
    pub face_slots: Vec<u32>,
}

/// Turns appearance colors into materials, optionally sharing them by
/// (color, alpha) fingerprint.
#[derive(Clone, Copy, Debug)]
pub struct MaterialDeduplicator {
    share: bool,
}

impl MaterialDeduplicator {
    pub fn new(share: bool) -> Self {
        Self { share }
    }

    /// Resolve materials for a mesh whose source faces produced
    /// `face_groups` target faces each.
    ///
    /// One color per source face assigns per-face slots; otherwise the first
    /// color (or the default grey) covers the whole mesh.
    pub fn resolve(
        &self,
        scene: &mut SceneDatabase,
        owner: &str,
        appearance: Option<&Appearance>,
        face_groups: &[usize],
    ) -> SceneResult<ResolvedMaterials> {
        let colors = appearance.map(Appearance::colors).unwrap_or_default();
        let alpha = appearance.map(Appearance::alpha).unwrap_or(1.0);
        let face_count: usize = face_groups.iter().sum();

        let mut resolved = ResolvedMaterials::default();
        let mut slot_colors: Vec<Vec3> = Vec::new();

        if colors.len() > 1 && colors.len() == face_groups.len() {
            for (color, &count) in colors.iter().zip(face_groups) {
                let slot = match slot_colors.iter().position(|c| c == color) {
                    Some(slot) => slot,
                    None => {
                        resolved.slots.push(self.material(scene, owner, *color, alpha)?);
                        slot_colors.push(*color);
                        slot_colors.len() - 1
                    }
                };
                resolved
                    .face_slots
                    .extend(std::iter::repeat(slot as u32).take(count));
            }
        } else {
            let color = colors
                .first()
                .copied()
                .unwrap_or_else(|| Material::default().diffuse_color);
            resolved.slots.push(self.material(scene, owner, color, alpha)?);
            resolved.face_slots = vec![0; face_count];
        }

        log::debug!(
            "Resolved {} material slot(s) for '{}'",
            resolved.slots.len(),
            owner
        );
        Ok(resolved)
    }

    /// Per-object override materials from a node's own appearance, one per
    /// distinct color. Empty when the appearance has no colors.
    pub fn overrides(
        &self,
        scene: &mut SceneDatabase,
        owner: &str,
        appearance: &Appearance,
    ) -> SceneResult<Vec<MaterialId>> {
        let alpha = appearance.alpha();
        let mut seen: Vec<Vec3> = Vec::new();
        let mut materials = Vec::new();
        for color in appearance.colors() {
            if seen.contains(&color) {
                continue;
            }
            seen.push(color);
            materials.push(self.material(scene, owner, color, alpha)?);
        }
        Ok(materials)
    }

    fn material(
        &self,
        scene: &mut SceneDatabase,
        owner: &str,
        color: Vec3,
        alpha: f32,
    ) -> SceneResult<MaterialId> {
        if self.share {
            let name = Material::fingerprint_name(color, alpha);
            if let Some(existing) = scene.find_material(&name) {
                return Ok(existing);
            }
            let mut material = Material::new(name, color, alpha);
            material.shared = true;
            return scene.add_material(material);
        }

        let name = scene.materials.unique_name(&format!("{}_mat", owner));
        scene.add_material(Material::new(name, color, alpha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grey() {
        let mut scene = SceneDatabase::new();
        let resolved = MaterialDeduplicator::new(true)
            .resolve(&mut scene, "Box", None, &[1, 1, 2])
            .unwrap();

        assert_eq!(resolved.slots.len(), 1);
        assert_eq!(resolved.face_slots, vec![0, 0, 0, 0]);
        let material = scene.material(resolved.slots[0]).unwrap();
        assert_eq!(material.name, "material_CCCCCCFF");
        assert!(material.shared);
    }

    #[test]
    fn test_per_face_colors() {
        let mut scene = SceneDatabase::new();
        let appearance = Appearance {
            diffuse_colors: vec![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            ..Default::default()
        };
        let resolved = MaterialDeduplicator::new(true)
            .resolve(&mut scene, "Box", Some(&appearance), &[1, 2, 1])
            .unwrap();

        assert_eq!(resolved.slots.len(), 2);
        assert_eq!(resolved.face_slots, vec![0, 1, 1, 0]);
        assert_eq!(scene.materials.len(), 2);
    }

    #[test]
    fn test_mismatched_color_count_uses_first() {
        let mut scene = SceneDatabase::new();
        let appearance = Appearance {
            diffuse_colors: vec![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            transparency: 50.0,
            ..Default::default()
        };
        let resolved = MaterialDeduplicator::new(true)
            .resolve(&mut scene, "Box", Some(&appearance), &[1, 1, 1])
            .unwrap();

        assert_eq!(resolved.slots.len(), 1);
        assert_eq!(scene.material(resolved.slots[0]).unwrap().name, "material_00FF0080");
    }

    #[test]
    fn test_sharing() {
        let mut scene = SceneDatabase::new();
        let red = Appearance::colored([1.0, 0.0, 0.0]);

        let shared = MaterialDeduplicator::new(true);
        let a = shared.resolve(&mut scene, "A", Some(&red), &[1]).unwrap();
        let b = shared.resolve(&mut scene, "B", Some(&red), &[1]).unwrap();
        assert_eq!(a.slots, b.slots);
        assert_eq!(scene.materials.len(), 1);

        let private = MaterialDeduplicator::new(false);
        let c = private.resolve(&mut scene, "A", Some(&red), &[1]).unwrap();
        let d = private.resolve(&mut scene, "A", Some(&red), &[1]).unwrap();
        assert_ne!(c.slots, d.slots);
        assert_eq!(scene.material(c.slots[0]).unwrap().name, "A_mat");
        assert_eq!(scene.material(d.slots[0]).unwrap().name, "A_mat.001");
        assert!(!scene.material(d.slots[0]).unwrap().shared);
    }

    #[test]
    fn test_overrides() {
        let mut scene = SceneDatabase::new();
        let appearance = Appearance {
            diffuse_colors: vec![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            ..Default::default()
        };
        let overrides = MaterialDeduplicator::new(true)
            .overrides(&mut scene, "Link", &appearance)
            .unwrap();
        assert_eq!(overrides.len(), 2);

        let none = MaterialDeduplicator::new(true)
            .overrides(&mut scene, "Link", &Appearance::default())
            .unwrap();
        assert!(none.is_empty());
    }
}
