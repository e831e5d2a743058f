//! Per-run and per-call traversal state.

use std::collections::HashSet;

use crate::document::NodeId;
use crate::scene::{CollectionId, ObjectId};

/// Identity names reconciled during the current run.
///
/// A name in this set must be reused, never recreated, for the rest of the
/// run. Meshes, objects and collections live in separate namespaces.
#[derive(Debug, Default)]
pub struct TouchedSet {
    meshes: HashSet<String>,
    objects: HashSet<String>,
    collections: HashSet<String>,
}

impl TouchedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mesh name. Returns true if it was not yet recorded.
    pub fn touch_mesh(&mut self, name: &str) -> bool {
        self.meshes.insert(name.to_string())
    }

    pub fn has_mesh(&self, name: &str) -> bool {
        self.meshes.contains(name)
    }

    /// Record an object name. Returns true if it was not yet recorded.
    pub fn touch_object(&mut self, name: &str) -> bool {
        self.objects.insert(name.to_string())
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains(name)
    }

    /// Record a collection name. Returns true if it was not yet recorded.
    pub fn touch_collection(&mut self, name: &str) -> bool {
        self.collections.insert(name.to_string())
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains(name)
    }

    pub fn meshes(&self) -> impl Iterator<Item = &str> {
        self.meshes.iter().map(String::as_str)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

/// Where a node is being materialized.
///
/// Passed down by value; each recursion level derives its own copy.
#[derive(Clone, Debug)]
pub struct TraversalContext {
    /// Collection new objects are linked into
    pub collection: CollectionId,
    pub parent_collection: Option<CollectionId>,

    /// Target object new objects are parented to
    pub parent_object: Option<ObjectId>,

    /// Source node that led to this one
    pub parent_node: Option<NodeId>,

    /// Reached through a link node
    pub is_link_expansion: bool,

    /// Link or array node qualifying child labels
    pub link_source: Option<NodeId>,

    /// Identity name override for the node being visited
    pub label: Option<String>,

    /// Nesting depth, for report indentation
    pub depth: usize,
}

impl TraversalContext {
    /// Context for a document root.
    pub fn root(collection: CollectionId, parent_object: Option<ObjectId>) -> Self {
        Self {
            collection,
            parent_collection: None,
            parent_object,
            parent_node: None,
            is_link_expansion: false,
            link_source: None,
            label: None,
            depth: 0,
        }
    }

    /// Context one level deeper. The label override is not inherited.
    pub fn child(&self) -> Self {
        Self {
            label: None,
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_parent(mut self, object: Option<ObjectId>, node: Option<NodeId>) -> Self {
        self.parent_object = object;
        self.parent_node = node;
        self
    }

    /// Switch to a sub-collection, remembering the current one as its parent.
    pub fn in_collection(mut self, collection: CollectionId) -> Self {
        self.parent_collection = Some(self.collection);
        self.collection = collection;
        self
    }

    pub fn as_link_expansion(mut self, link_source: Option<NodeId>) -> Self {
        self.is_link_expansion = true;
        self.link_source = link_source;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touched_namespaces_are_separate() {
        let mut touched = TouchedSet::new();
        assert!(touched.touch_mesh("Box"));
        assert!(!touched.touch_mesh("Box"));
        assert!(touched.has_mesh("Box"));
        assert!(!touched.has_object("Box"));
        assert!(touched.touch_object("Box"));
        assert_eq!(touched.mesh_count(), 1);
        assert_eq!(touched.object_count(), 1);
    }

    #[test]
    fn test_child_context() {
        let root = TraversalContext::root(CollectionId(0), Some(ObjectId(0)))
            .with_label("Override");
        let child = root
            .child()
            .in_collection(CollectionId(3))
            .as_link_expansion(Some(NodeId(7)));

        assert_eq!(child.depth, 1);
        assert_eq!(child.label, None);
        assert_eq!(child.collection, CollectionId(3));
        assert_eq!(child.parent_collection, Some(CollectionId(0)));
        assert_eq!(child.parent_object, Some(ObjectId(0)));
        assert!(child.is_link_expansion);
        assert_eq!(child.link_source, Some(NodeId(7)));
        assert_eq!(root.label.as_deref(), Some("Override"));
    }
}
