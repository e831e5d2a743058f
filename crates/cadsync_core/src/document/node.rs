//! Source document graph.
//!
//! A document is a flat table of nodes; hierarchy is expressed by id
//! references (group members, array elements, link targets, hosts).
//! Documents are read-only during an import.

use std::collections::{HashMap, HashSet};

use cadsync_math::{Placement, Vec3};
use serde::{Deserialize, Serialize};

use super::shape::{Geometry, GeometryHandle};

/// Index of a node within its document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Closed set of node kinds the importer understands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Solid/shape feature with its own geometry
    Feature,
    /// Parametric array producing element nodes
    FeatureArray,
    /// Container of member nodes without own geometry
    GroupingPart,
    /// Alias of another node
    Link,
    /// Element of a link array
    LinkElement,
    /// Node carrying a raw polygon mesh
    MeshFeature,
    /// Architectural component that may host or be hosted
    ArchHostChild,
    /// Anything else, kept with its type id for reporting
    Other { type_id: String },
}

impl NodeKind {
    /// Shape-bearing kinds (everything derived from a part feature).
    pub fn is_feature(&self) -> bool {
        matches!(
            self,
            NodeKind::Feature | NodeKind::FeatureArray | NodeKind::ArchHostChild
        )
    }

    pub fn is_link(&self) -> bool {
        matches!(self, NodeKind::Link | NodeKind::LinkElement)
    }

    /// Type id a CAD application would report for this kind.
    pub fn default_type_id(&self) -> &str {
        match self {
            NodeKind::Feature => "Part::Feature",
            NodeKind::FeatureArray => "Part::FeaturePython",
            NodeKind::GroupingPart => "App::Part",
            NodeKind::Link => "App::Link",
            NodeKind::LinkElement => "App::LinkElement",
            NodeKind::MeshFeature => "Mesh::Feature",
            NodeKind::ArchHostChild => "Part::FeaturePython",
            NodeKind::Other { type_id } => type_id,
        }
    }
}

/// One node of the source document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentNode {
    /// Internal unique name
    pub name: String,

    /// User-visible label (identity source)
    pub label: String,

    /// Full type id, e.g. `Part::Feature`
    pub type_id: String,

    pub kind: NodeKind,
    pub placement: Placement,

    /// Per-axis scale property, if the node has one
    pub scale: Option<Vec3>,

    pub visibility: bool,

    /// Members of a grouping part
    pub group: Vec<NodeId>,

    /// Array or link-array elements
    pub elements: Vec<NodeId>,

    /// Visibility per element, parallel to `elements`
    pub element_visibility: Vec<bool>,

    /// Array elements are expanded into separate nodes
    pub expand_array: bool,

    /// Array variant marker
    pub array_type: Option<String>,

    pub link_target: Option<NodeId>,

    /// Nodes hosting this one (parent-by-attribute)
    pub hosts: Vec<NodeId>,

    pub geometry: Option<GeometryHandle>,
}

impl DocumentNode {
    /// Create a node with default placement and no relations.
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        let type_id = kind.default_type_id().to_string();
        Self {
            name: name.into(),
            label: label.into(),
            type_id,
            kind,
            placement: Placement::default(),
            scale: None,
            visibility: true,
            group: Vec::new(),
            elements: Vec::new(),
            element_visibility: Vec::new(),
            expand_array: false,
            array_type: None,
            link_target: None,
            hosts: Vec::new(),
            geometry: None,
        }
    }
}

/// An opened source document.
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// Document name (used for prefixes and the link-target collection)
    pub name: String,

    /// File name (used for the root collection and root empty)
    pub file_name: String,

    nodes: Vec<DocumentNode>,
    index: HashMap<String, NodeId>,
    geometry: HashMap<GeometryHandle, Geometry>,
}

impl Document {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// Append a node. Returns `None` if its name is already used.
    pub fn add_node(&mut self, node: DocumentNode) -> Option<NodeId> {
        if self.index.contains_key(&node.name) {
            return None;
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(node.name.clone(), id);
        self.nodes.push(node);
        Some(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DocumentNode> {
        self.nodes.get_mut(id.0)
    }

    /// Look a node up by internal name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DocumentNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_geometry(&mut self, handle: GeometryHandle, geometry: Geometry) {
        self.geometry.insert(handle, geometry);
    }

    pub fn geometry(&self, handle: &GeometryHandle) -> Option<&Geometry> {
        self.geometry.get(handle)
    }

    /// Nodes that declare `host` in their hosts list.
    pub fn host_children(&self, host: NodeId) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.hosts.contains(&host))
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes not contained in any group, element list or host relation,
    /// in document order.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        let mut contained = HashSet::new();
        for node in &self.nodes {
            contained.extend(node.group.iter().copied());
            contained.extend(node.elements.iter().copied());
        }
        self.nodes()
            .filter(|(id, node)| !contained.contains(id) && node.hosts.is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// Resolve the target of a link node.
    ///
    /// Link chains are followed to their end; the end is used only when it
    /// is a shape feature, otherwise the direct target is returned. Returns
    /// `None` for links without a target and for cyclic chains.
    pub fn resolve_link(&self, link: NodeId) -> Option<NodeId> {
        let direct = self.node(link)?.link_target?;

        let mut visited = HashSet::new();
        visited.insert(link);
        let mut current = direct;
        loop {
            if !visited.insert(current) {
                return None;
            }
            let node = self.node(current)?;
            if !node.kind.is_link() {
                break;
            }
            match node.link_target {
                Some(next) => current = next,
                None => break,
            }
        }

        if self.node(current)?.kind.is_feature() {
            Some(current)
        } else {
            Some(direct)
        }
    }
}
