//! Document provider seam and the JSON document format.
//!
//! A provider opens a document file, hands out its node graph and its
//! appearance side data, and is told when the importer is done with it.
//!
//! ## JSON format
//!
//! ```json
//! {
//!   "name": "Assembly",
//!   "nodes": [
//!     { "name": "Box", "kind": "Feature", "geometry": "Box",
//!       "placement": { "base": [10, 0, 0], "rotation": [0, 0, 0, 1] } },
//!     { "name": "Link", "kind": "LinkElement", "link_target": "Box" }
//!   ],
//!   "geometry": { "Box": { "brep": { "faces": [], "edges": [] } } },
//!   "appearance": { "Box": { "diffuse_colors": [[0.8, 0.2, 0.2]] } }
//! }
//! ```
//!
//! Nodes reference each other by internal name.

use std::collections::HashMap;
use std::path::Path;

use cadsync_math::{Placement, Vec3};
use serde::Deserialize;
use thiserror::Error;

use super::appearance::AppearanceData;
use super::node::{Document, DocumentNode, NodeId, NodeKind};
use super::shape::{Geometry, GeometryHandle};

/// Errors raised while opening or reading documents.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Document backend unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Node '{referenced_by}' references unknown node '{name}'")]
    UnknownNode { name: String, referenced_by: String },
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Source of documents.
pub trait DocumentProvider {
    /// Fails when the backend cannot open documents at all.
    fn check_available(&self) -> ProviderResult<()>;

    /// Open a document file.
    fn open(&mut self, path: &Path) -> ProviderResult<Document>;

    /// Appearance side data of an opened document.
    fn appearance(&mut self, document: &Document) -> ProviderResult<AppearanceData>;

    /// Release a document. Called on every exit path of an import, with
    /// `None` when opening failed before a document existed.
    fn close(&mut self, document: Option<&str>);
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct NodeRecord {
    name: String,
    #[serde(default)]
    label: Option<String>,
    kind: NodeKind,
    #[serde(default)]
    type_id: Option<String>,
    #[serde(default)]
    placement: Placement,
    #[serde(default)]
    scale: Option<Vec3>,
    #[serde(default = "default_true")]
    visibility: bool,
    #[serde(default)]
    group: Vec<String>,
    #[serde(default)]
    elements: Vec<String>,
    #[serde(default)]
    element_visibility: Vec<bool>,
    #[serde(default)]
    expand_array: bool,
    #[serde(default)]
    array_type: Option<String>,
    #[serde(default)]
    link_target: Option<String>,
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(default)]
    geometry: Option<String>,
}

#[derive(Deserialize)]
struct DocumentFile {
    #[serde(default)]
    name: Option<String>,
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    geometry: HashMap<String, Geometry>,
}

#[derive(Deserialize)]
struct AppearanceSection {
    #[serde(default)]
    appearance: AppearanceData,
}

/// Parse a JSON document. `file_name` names the root collection; the
/// document name defaults to its stem.
pub fn load_document_from_str(content: &str, file_name: &str) -> ProviderResult<Document> {
    let file: DocumentFile = serde_json::from_str(content)?;
    let name = file.name.unwrap_or_else(|| {
        Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string())
    });
    let mut document = Document::new(name, file_name);

    // First pass: allocate ids so records can reference later nodes
    let mut ids: HashMap<&str, NodeId> = HashMap::new();
    for (index, record) in file.nodes.iter().enumerate() {
        if ids.insert(record.name.as_str(), NodeId(index)).is_some() {
            return Err(ProviderError::DuplicateNode(record.name.clone()));
        }
    }

    let resolve = |name: &str, owner: &str| -> ProviderResult<NodeId> {
        ids.get(name)
            .copied()
            .ok_or_else(|| ProviderError::UnknownNode {
                name: name.to_string(),
                referenced_by: owner.to_string(),
            })
    };
    let resolve_all = |names: &[String], owner: &str| -> ProviderResult<Vec<NodeId>> {
        names.iter().map(|name| resolve(name, owner)).collect()
    };

    for record in &file.nodes {
        let mut node = DocumentNode::new(
            record.name.clone(),
            record.label.clone().unwrap_or_else(|| record.name.clone()),
            record.kind.clone(),
        );
        if let Some(type_id) = &record.type_id {
            node.type_id = type_id.clone();
        }
        node.placement = record.placement;
        node.scale = record.scale;
        node.visibility = record.visibility;
        node.group = resolve_all(&record.group, &record.name)?;
        node.elements = resolve_all(&record.elements, &record.name)?;
        node.element_visibility = record.element_visibility.clone();
        node.expand_array = record.expand_array;
        node.array_type = record.array_type.clone();
        node.link_target = record
            .link_target
            .as_deref()
            .map(|target| resolve(target, &record.name))
            .transpose()?;
        node.hosts = resolve_all(&record.hosts, &record.name)?;
        node.geometry = record.geometry.clone().map(GeometryHandle);

        document
            .add_node(node)
            .ok_or_else(|| ProviderError::DuplicateNode(record.name.clone()))?;
    }

    for (key, geometry) in file.geometry {
        document.set_geometry(GeometryHandle(key), geometry);
    }

    Ok(document)
}

/// Parse the `appearance` section of a JSON document.
pub fn load_appearance_from_str(content: &str) -> ProviderResult<AppearanceData> {
    let section: AppearanceSection = serde_json::from_str(content)?;
    Ok(section.appearance)
}

/// Provider reading the JSON document format from disk.
#[derive(Debug, Default)]
pub struct JsonDocumentProvider {
    open: HashMap<String, AppearanceData>,
}

impl JsonDocumentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently open.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

impl DocumentProvider for JsonDocumentProvider {
    fn check_available(&self) -> ProviderResult<()> {
        Ok(())
    }

    fn open(&mut self, path: &Path) -> ProviderResult<Document> {
        let content = std::fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let document = load_document_from_str(&content, &file_name)?;
        let appearance = load_appearance_from_str(&content)?;
        log::info!(
            "Opened '{}' ({} nodes, {} appearance entries)",
            document.file_name,
            document.len(),
            appearance.len()
        );
        self.open.insert(document.name.clone(), appearance);
        Ok(document)
    }

    fn appearance(&mut self, document: &Document) -> ProviderResult<AppearanceData> {
        Ok(self.open.get(&document.name).cloned().unwrap_or_default())
    }

    fn close(&mut self, document: Option<&str>) {
        if let Some(name) = document {
            if self.open.remove(name).is_some() {
                log::debug!("Closed document '{}'", name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "name": "Assembly",
        "nodes": [
            { "name": "Part", "kind": "GroupingPart", "group": ["Box"] },
            { "name": "Box", "label": "Housing", "kind": "Feature", "geometry": "Box",
              "placement": { "base": [10, 0, 0], "rotation": [0, 0, 0, 1] } },
            { "name": "Link", "kind": "LinkElement", "link_target": "Box", "visibility": false },
            { "name": "Sketch", "kind": { "Other": { "type_id": "Sketcher::SketchObject" } } }
        ],
        "geometry": {
            "Box": { "mesh": { "positions": [[0,0,0],[1,0,0],[0,1,0]], "faces": [[0,1,2]] } }
        },
        "appearance": { "Box": { "diffuse_colors": [[0.8, 0.2, 0.2]], "transparency": 50 } }
    }"#;

    #[test]
    fn test_load_document() {
        let document = load_document_from_str(DOCUMENT, "assembly.json").unwrap();

        assert_eq!(document.name, "Assembly");
        assert_eq!(document.file_name, "assembly.json");
        assert_eq!(document.len(), 4);

        let part = document.find("Part").unwrap();
        let housing = document.find("Box").unwrap();
        assert_eq!(document.node(part).unwrap().group, vec![housing]);

        let node = document.node(housing).unwrap();
        assert_eq!(node.label, "Housing");
        assert_eq!(node.type_id, "Part::Feature");
        assert_eq!(node.placement.base, Vec3::new(10.0, 0.0, 0.0));
        assert!(matches!(
            document.geometry(node.geometry.as_ref().unwrap()),
            Some(Geometry::Mesh(_))
        ));

        let link = document.node(document.find("Link").unwrap()).unwrap();
        assert_eq!(link.link_target, Some(housing));
        assert!(!link.visibility);

        let sketch = document.node(document.find("Sketch").unwrap()).unwrap();
        assert_eq!(sketch.type_id, "Sketcher::SketchObject");
    }

    #[test]
    fn test_document_name_defaults_to_stem() {
        let document = load_document_from_str(r#"{ "nodes": [] }"#, "bracket.json").unwrap();
        assert_eq!(document.name, "bracket");
        assert!(document.is_empty());
    }

    #[test]
    fn test_unknown_reference() {
        let content = r#"{ "nodes": [ { "name": "L", "kind": "Link", "link_target": "Nope" } ] }"#;
        let result = load_document_from_str(content, "x.json");
        assert!(matches!(
            result,
            Err(ProviderError::UnknownNode { name, referenced_by }) if name == "Nope" && referenced_by == "L"
        ));
    }

    #[test]
    fn test_duplicate_node() {
        let content = r#"{ "nodes": [
            { "name": "A", "kind": "Feature" },
            { "name": "A", "kind": "Feature" }
        ] }"#;
        assert!(matches!(
            load_document_from_str(content, "x.json"),
            Err(ProviderError::DuplicateNode(name)) if name == "A"
        ));
    }

    #[test]
    fn test_load_appearance() {
        let appearance = load_appearance_from_str(DOCUMENT).unwrap();
        let entry = &appearance["Box"];
        assert_eq!(entry.diffuse_colors, vec![[0.8, 0.2, 0.2]]);
        assert!((entry.alpha() - 0.5).abs() < 1e-6);
    }
}
