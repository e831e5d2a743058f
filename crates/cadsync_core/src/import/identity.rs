//! Identity names: the join key between source nodes and target nodes.

use crate::document::DocumentNode;

use super::config::ImportConfig;

/// Suffix distinguishing a link target object from a visible object made
/// from the same node.
pub const LINK_TARGET_SUFFIX: &str = "__lt";

/// Derives prefixed identity names.
#[derive(Clone, Debug, Default)]
pub struct IdentityResolver {
    prefix: String,
}

impl IdentityResolver {
    /// Build the prefix from the configured prefix and, optionally, the
    /// document name. Non-empty parts are joined with `__`.
    pub fn new(config: &ImportConfig, document_name: &str) -> Self {
        let mut parts = Vec::new();
        if config.obj_name_prefix_with_filename && !document_name.is_empty() {
            parts.push(document_name);
        }
        if !config.obj_name_prefix.is_empty() {
            parts.push(config.obj_name_prefix.as_str());
        }
        Self {
            prefix: parts.join("__"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix a label. Labels that already carry the prefix are returned
    /// unchanged.
    pub fn apply(&self, label: &str) -> String {
        if self.prefix.is_empty() {
            return label.to_string();
        }
        let full = format!("{}__", self.prefix);
        if label.starts_with(&full) {
            label.to_string()
        } else {
            format!("{}{}", full, label)
        }
    }

    /// Identity name of a node's own object and mesh.
    pub fn object(&self, node: &DocumentNode) -> String {
        self.apply(&node.label)
    }

    /// Identity name of the hidden link target made from a node.
    pub fn link_target(&self, node: &DocumentNode) -> String {
        format!("{}{}", self.object(node), LINK_TARGET_SUFFIX)
    }

    /// Label of a child reached through a link or array, `<source>.<child>`.
    pub fn qualified(&self, source: &str, child: &str) -> String {
        let source = self.apply(source);
        format!("{}.{}", source, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeKind;

    fn config(prefix: &str, with_filename: bool) -> ImportConfig {
        ImportConfig {
            obj_name_prefix: prefix.to_string(),
            obj_name_prefix_with_filename: with_filename,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_prefix() {
        let identity = IdentityResolver::new(&ImportConfig::default(), "Doc");
        let node = DocumentNode::new("Box", "Housing", NodeKind::Feature);
        assert_eq!(identity.object(&node), "Housing");
        assert_eq!(identity.link_target(&node), "Housing__lt");
        assert_eq!(identity.qualified("Array", "Box"), "Array.Box");
    }

    #[test]
    fn test_prefix_parts() {
        assert_eq!(IdentityResolver::new(&config("p", false), "Doc").prefix(), "p");
        assert_eq!(IdentityResolver::new(&config("", true), "Doc").prefix(), "Doc");
        assert_eq!(IdentityResolver::new(&config("p", true), "Doc").prefix(), "Doc__p");
    }

    #[test]
    fn test_prefix_applied_once() {
        let identity = IdentityResolver::new(&config("p", true), "Doc");
        let once = identity.apply("Box");
        assert_eq!(once, "Doc__p__Box");
        assert_eq!(identity.apply(&once), once);
        assert_eq!(identity.qualified("Array", "Box"), "Doc__p__Array.Box");
    }
}
