//! cadsync core - CAD document to scene reconciliation.
//!
//! This crate provides:
//!
//! - **Target scene**: `SceneDatabase`, `TargetObject`, `TargetMesh`, `Material`
//! - **Source documents**: `Document`, `DocumentNode`, providers and kernels
//! - **Import engine**: the graph walk that creates or updates scene nodes
//!   from a document while keeping their names stable across runs
//!
//! # Example
//!
//! ```ignore
//! use cadsync_core::{ImportConfig, Importer, JsonDocumentProvider, LogReport, SceneDatabase, StoredKernel};
//!
//! let mut scene = SceneDatabase::load("scene.json").unwrap_or_default();
//! let mut importer = Importer::new(
//!     JsonDocumentProvider::new(),
//!     StoredKernel,
//!     LogReport::default(),
//!     ImportConfig::default(),
//! );
//! let summary = importer.import_file(&mut scene, "assembly.json")?;
//! println!("Imported {} objects", summary.objects_touched);
//! scene.save("scene.json")?;
//! ```

pub mod document;
pub mod import;
pub mod mesh;
pub mod scene;

// Re-export commonly used types
pub use document::{
    Document, DocumentBuilder, DocumentNode, DocumentProvider, GeometryKernel,
    JsonDocumentProvider, NodeId, NodeKind, StoredKernel,
};
pub use import::{
    import_document, CollectingReport, ImportConfig, ImportError, ImportResult, ImportSummary,
    Importer, LogReport, ReportSink, Severity,
};
pub use mesh::TargetMesh;
pub use scene::{
    CollectionId, Material, MaterialId, MeshId, ObjectData, ObjectId, SceneDatabase, SceneError,
    TargetCollection, TargetObject,
};
