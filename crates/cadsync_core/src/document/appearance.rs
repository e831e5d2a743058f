//! View-side data: visibility and colors, keyed by node name.

use std::collections::HashMap;

use cadsync_math::Vec3;
use serde::{Deserialize, Serialize};

/// Appearance of one node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appearance {
    /// Overrides the node's own visibility flag when present
    pub visibility: Option<bool>,

    /// One color per source face, or a single shape color
    pub diffuse_colors: Vec<[f32; 3]>,

    /// Transparency in percent (0 = opaque, 100 = invisible)
    pub transparency: f32,
}

impl Appearance {
    /// A single-colored appearance.
    pub fn colored(color: [f32; 3]) -> Self {
        Self {
            diffuse_colors: vec![color],
            ..Default::default()
        }
    }

    /// Opacity derived from the transparency percentage.
    pub fn alpha(&self) -> f32 {
        (1.0 - self.transparency / 100.0).clamp(0.0, 1.0)
    }

    /// Colors as vectors.
    pub fn colors(&self) -> Vec<Vec3> {
        self.diffuse_colors.iter().map(|c| Vec3::from_array(*c)).collect()
    }
}

/// Appearance entries keyed by node name.
pub type AppearanceData = HashMap<String, Appearance>;
