//! Import options.

use serde::{Deserialize, Serialize};

/// Options controlling one import run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Reuse and refresh existing same-named nodes instead of recreating
    pub update: bool,

    /// Keep an existing mesh whose content fingerprint is unchanged
    pub update_only_modified_meshes: bool,

    /// Apply source placements to object transforms
    pub placement: bool,

    /// Unit scale applied to every translation and vertex (mm to m)
    pub scale: f32,

    /// Tessellation tolerance passed to the geometry kernel
    pub tessellation: f32,

    /// Tessellate every face instead of keeping planar polygons
    pub triangulate_meshes: bool,

    /// Merge triangles into quads and dissolve coplanar faces after import
    pub cleanup_after_import: bool,

    pub auto_smooth_use: bool,

    /// Auto-smooth angle in radians
    pub auto_smooth_angle: f32,

    /// Skip nodes that are not visible
    pub skiphidden: bool,

    /// Skip sketches at the root level
    pub filter_sketch: bool,

    /// Share materials by color fingerprint
    pub sharemats: bool,

    pub obj_name_prefix: String,

    /// Prefix names with the document name
    pub obj_name_prefix_with_filename: bool,

    /// Instance link targets through collection instances
    pub links_as_collectioninstance: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            update: true,
            update_only_modified_meshes: true,
            placement: true,
            scale: 0.001,
            tessellation: 0.10,
            triangulate_meshes: false,
            cleanup_after_import: false,
            auto_smooth_use: true,
            auto_smooth_angle: 30f32.to_radians(),
            skiphidden: true,
            filter_sketch: true,
            sharemats: true,
            obj_name_prefix: String::new(),
            obj_name_prefix_with_filename: false,
            links_as_collectioninstance: false,
        }
    }
}

impl ImportConfig {
    /// Display size for empties and collection instances.
    pub fn empty_display_size(&self) -> f32 {
        self.scale * 10.0
    }

    /// Load options from a JSON string; missing keys keep their defaults.
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert!(config.update);
        assert!(config.placement);
        assert!(config.skiphidden);
        assert!(!config.links_as_collectioninstance);
        assert!((config.auto_smooth_angle - 0.523_598_8).abs() < 1e-6);
        assert!((config.empty_display_size() - 0.01).abs() < 1e-7);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ImportConfig::from_json(r#"{ "scale": 1.0, "sharemats": false }"#).unwrap();
        assert_eq!(config.scale, 1.0);
        assert!(!config.sharemats);
        assert_eq!(config.tessellation, 0.10);
        assert!(config.update_only_modified_meshes);
    }
}
