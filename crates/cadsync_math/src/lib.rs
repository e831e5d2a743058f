// Re-export glam for convenience
pub use glam::*;

// cadsync math types
mod transform;
pub use transform::{
    to_wxyz, ComposeMode, LocalTransform, Placement, RotationMode, TransformComposer,
};
