//! Programmatic document construction.
//!
//! ```ignore
//! let mut builder = DocumentBuilder::new("Assembly");
//! let bolt = builder.feature("Bolt", Shape::cuboid(Vec3::new(5.0, 5.0, 20.0)));
//! let link = builder.link_element("BoltLink", bolt);
//! builder.placement(link, Placement::from_translation(Vec3::new(50.0, 0.0, 0.0)));
//! let document = builder.build();
//! ```

use cadsync_math::Placement;

use super::node::{Document, DocumentNode, NodeId, NodeKind};
use super::shape::{Geometry, GeometryHandle, RawMesh, Shape};

/// Builds a [`Document`] node by node.
///
/// Internal names are derived from labels and made unique with a numeric
/// suffix, so several nodes may share a label.
#[derive(Debug)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Start a document; its file name is `<name>.FCStd`.
    pub fn new(name: &str) -> Self {
        Self {
            document: Document::new(name, format!("{}.FCStd", name)),
        }
    }

    fn unique_node_name(&self, label: &str) -> String {
        if self.document.find(label).is_none() {
            return label.to_string();
        }
        let mut counter = 1u32;
        loop {
            let candidate = format!("{}{:03}", label, counter);
            if self.document.find(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Add a node without relations.
    pub fn add(&mut self, label: &str, kind: NodeKind) -> NodeId {
        let name = self.unique_node_name(label);
        let id = NodeId(self.document.len());
        // Name is unique, so the node always lands at the end
        self.document.add_node(DocumentNode::new(name, label, kind));
        id
    }

    fn attach_geometry(&mut self, id: NodeId, geometry: Geometry) {
        let Some(node) = self.document.node_mut(id) else {
            return;
        };
        let handle = GeometryHandle::new(node.name.clone());
        node.geometry = Some(handle.clone());
        self.document.set_geometry(handle, geometry);
    }

    /// A shape feature.
    pub fn feature(&mut self, label: &str, shape: Shape) -> NodeId {
        let id = self.add(label, NodeKind::Feature);
        self.attach_geometry(id, Geometry::Brep(shape));
        id
    }

    /// A node carrying a raw mesh.
    pub fn mesh_feature(&mut self, label: &str, mesh: RawMesh) -> NodeId {
        let id = self.add(label, NodeKind::MeshFeature);
        self.attach_geometry(id, Geometry::Mesh(mesh));
        id
    }

    /// A grouping part with the given members.
    pub fn part(&mut self, label: &str, members: &[NodeId]) -> NodeId {
        let id = self.add(label, NodeKind::GroupingPart);
        self.update(id, |node| node.group = members.to_vec());
        id
    }

    /// A link to `target`.
    pub fn link(&mut self, label: &str, target: NodeId) -> NodeId {
        let id = self.add(label, NodeKind::Link);
        self.update(id, |node| node.link_target = Some(target));
        id
    }

    /// A link element referencing `target`.
    pub fn link_element(&mut self, label: &str, target: NodeId) -> NodeId {
        let id = self.add(label, NodeKind::LinkElement);
        self.update(id, |node| node.link_target = Some(target));
        id
    }

    /// An expanded feature array over existing element nodes.
    pub fn array(&mut self, label: &str, elements: &[NodeId], visibility: &[bool]) -> NodeId {
        let id = self.add(label, NodeKind::FeatureArray);
        self.update(id, |node| {
            node.elements = elements.to_vec();
            node.element_visibility = visibility.to_vec();
            node.expand_array = true;
            node.array_type = Some("ortho".to_string());
        });
        id
    }

    /// Modify a node in place.
    pub fn update(&mut self, id: NodeId, f: impl FnOnce(&mut DocumentNode)) -> &mut Self {
        if let Some(node) = self.document.node_mut(id) {
            f(node);
        }
        self
    }

    pub fn placement(&mut self, id: NodeId, placement: Placement) -> &mut Self {
        self.update(id, |node| node.placement = placement)
    }

    /// Clear a node's visibility flag.
    pub fn hidden(&mut self, id: NodeId) -> &mut Self {
        self.update(id, |node| node.visibility = false)
    }

    pub fn build(self) -> Document {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadsync_math::Vec3;

    #[test]
    fn test_labels_may_repeat() {
        let mut builder = DocumentBuilder::new("Doc");
        let a = builder.feature("Box", Shape::cuboid(Vec3::ONE));
        let b = builder.feature("Box", Shape::cuboid(Vec3::ONE));
        let document = builder.build();

        assert_eq!(document.file_name, "Doc.FCStd");
        assert_eq!(document.node(a).unwrap().name, "Box");
        assert_eq!(document.node(b).unwrap().name, "Box001");
        assert_eq!(document.node(b).unwrap().label, "Box");
        assert!(document
            .geometry(document.node(b).unwrap().geometry.as_ref().unwrap())
            .is_some());
    }

    #[test]
    fn test_relations() {
        let mut builder = DocumentBuilder::new("Doc");
        let bolt = builder.feature("Bolt", Shape::cuboid(Vec3::ONE));
        let link = builder.link_element("BoltLink", bolt);
        let part = builder.part("Assembly", &[link]);
        builder
            .placement(link, Placement::from_translation(Vec3::X))
            .hidden(part);
        let document = builder.build();

        let link_node = document.node(link).unwrap();
        assert_eq!(link_node.link_target, Some(bolt));
        assert_eq!(link_node.placement.base, Vec3::X);
        assert!(!document.node(part).unwrap().visibility);
        assert_eq!(document.root_nodes(), vec![bolt, part]);
    }
}
