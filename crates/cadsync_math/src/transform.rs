// Placement composition.
//
// Source documents store a placement as a base point plus a rotation
// quaternion in (x, y, z, w) order. Target objects keep location, a
// (w, x, y, z) quaternion, a rotation mode and a per-axis scale.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rotations with an angle below this are treated as "no rotation".
const ANGLE_EPSILON: f32 = 1e-7;

/// A placement as read from the source document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Translation in document units
    pub base: Vec3,

    /// Unit quaternion, (x, y, z, w) component order
    pub rotation: Quat,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            base: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Placement {
    /// Create a placement from a base point and a rotation.
    pub fn new(base: Vec3, rotation: Quat) -> Self {
        Self { base, rotation }
    }

    /// Create a placement with only a translation.
    pub fn from_translation(base: Vec3) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Rotation angle in radians, in `[0, 2π]`.
    pub fn angle(&self) -> f32 {
        2.0 * self.rotation.w.clamp(-1.0, 1.0).acos()
    }

    /// Placement as a 4x4 matrix (rotate, then translate).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.base)
    }
}

/// How rotations of a target object are presented.
///
/// The quaternion stays authoritative. Composition switches the mode to
/// `Quaternion` whenever it writes a rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationMode {
    Quaternion,
    #[default]
    EulerXyz,
}

/// Local transform of a target scene object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    /// Location relative to the parent object
    pub location: Vec3,

    /// Rotation, (w, x, y, z) component order
    pub rotation_quaternion: [f32; 4],

    /// Representation the rotation is shown in
    pub rotation_mode: RotationMode,

    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            rotation_quaternion: [1.0, 0.0, 0.0, 0.0],
            rotation_mode: RotationMode::default(),
            scale: Vec3::ONE,
        }
    }
}

impl LocalTransform {
    /// Create a transform with only a location.
    pub fn from_location(location: Vec3) -> Self {
        Self {
            location,
            ..Default::default()
        }
    }

    /// Rotation as a glam quaternion.
    pub fn rotation(&self) -> Quat {
        let [w, x, y, z] = self.rotation_quaternion;
        Quat::from_xyzw(x, y, z, w)
    }

    /// Convert to a 4x4 matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.location)
    }
}

/// Reorder an (x, y, z, w) quaternion into (w, x, y, z).
pub fn to_wxyz(rotation: Quat) -> [f32; 4] {
    [rotation.w, rotation.x, rotation.y, rotation.z]
}

/// How the placement translation combines with the existing location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComposeMode {
    /// Replace the location
    #[default]
    Absolute,
    /// Add to the location
    RelativeAdd,
    /// Subtract from the location
    RelativeSubtract,
}

/// Converts source placements into target local transforms.
#[derive(Clone, Copy, Debug)]
pub struct TransformComposer {
    /// Unit scale applied to every translation
    pub global_scale: f32,

    /// When false, `compose` leaves transforms untouched
    pub enabled: bool,
}

impl TransformComposer {
    pub fn new(global_scale: f32, enabled: bool) -> Self {
        Self {
            global_scale,
            enabled,
        }
    }

    /// Compose `placement` into `current` and return the result.
    ///
    /// The rotation is only written when the placement has a non-zero
    /// angle. A per-axis `node_scale` multiplies into the current scale.
    pub fn compose(
        &self,
        placement: &Placement,
        node_scale: Option<Vec3>,
        mode: ComposeMode,
        current: &LocalTransform,
    ) -> LocalTransform {
        let mut result = *current;
        if !self.enabled {
            return result;
        }

        let offset = placement.base * self.global_scale;
        result.location = match mode {
            ComposeMode::Absolute => offset,
            ComposeMode::RelativeAdd => current.location + offset,
            ComposeMode::RelativeSubtract => current.location - offset,
        };

        if placement.angle() > ANGLE_EPSILON {
            result.rotation_quaternion = to_wxyz(placement.rotation);
            result.rotation_mode = RotationMode::Quaternion;
        }

        if let Some(scale) = node_scale {
            result.scale = current.scale * scale;
        }

        result
    }
}
