//! Source document model and the collaborator seams around it.
//!
//! - [`node`]: the node graph (`Document`, `DocumentNode`, `NodeKind`)
//! - [`shape`]: boundary-representation and raw mesh geometry
//! - [`appearance`]: visibility and color side data
//! - [`kernel`]: tessellation backend trait
//! - [`provider`]: document backend trait and the JSON format
//! - [`builder`]: programmatic construction for tests and tools

pub mod appearance;
pub mod builder;
pub mod kernel;
pub mod node;
pub mod provider;
pub mod shape;

pub use appearance::{Appearance, AppearanceData};
pub use builder::DocumentBuilder;
pub use kernel::{GeometryKernel, KernelError, KernelResult, StoredKernel};
pub use node::{Document, DocumentNode, NodeId, NodeKind};
pub use provider::{
    load_appearance_from_str, load_document_from_str, DocumentProvider, JsonDocumentProvider,
    ProviderError, ProviderResult,
};
pub use shape::{Edge, Face, Geometry, GeometryHandle, RawMesh, Shape, Tessellation};
