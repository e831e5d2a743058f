//! Recursive graph walk over a source document.
//!
//! Every node is classified into exactly one [`Dispatch`] arm, in priority
//! order. Arms create or update target objects through the reconcilers and
//! recurse into group members, array elements, host children and link
//! targets.

use std::fmt;

use cadsync_math::{ComposeMode, TransformComposer};

use crate::document::{
    AppearanceData, Document, DocumentNode, Geometry, GeometryKernel, NodeId, NodeKind,
};
use crate::scene::{ObjectId, SceneDatabase, SceneError, TargetObject};

use super::assembler::SceneAssembler;
use super::config::ImportConfig;
use super::context::{TouchedSet, TraversalContext};
use super::geometry::MeshBuffers;
use super::identity::IdentityResolver;
use super::materials::MaterialDeduplicator;
use super::reconcile::{MeshReconciler, ObjectReconciler, Reconciled};
use super::report::{ReportSink, Severity};
use super::{ImportError, ImportResult};

/// Root nodes with these type ids are never imported.
const ROOT_TYPE_FILTER: [&str; 2] = ["App::GeoFeature", "PartDesign::CoordinateSystem"];

/// Skipped at the root level when sketch filtering is enabled.
const SKETCH_TYPE: &str = "Sketcher::SketchObject";

/// How a node is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Expanded array: one child per element
    Array,
    /// Array variant without an element list
    UnsupportedArray,
    /// Feature hosting other nodes
    HostWithChildren,
    /// Feature hosted by another node
    HostChild,
    /// Grouping part: empty plus members
    Group,
    /// Link or link element
    Link,
    Feature,
    MeshFeature,
    Unsupported,
}

/// Scripted feature type without a dedicated importer.
const FEATURE_PYTHON: &str = "FeaturePython";

/// Classify a node. The first matching rule wins.
pub fn classify(document: &Document, id: NodeId, node: &DocumentNode) -> Dispatch {
    match &node.kind {
        kind if kind.is_feature() => {
            if !node.elements.is_empty() && node.expand_array {
                Dispatch::Array
            } else if node.array_type.is_some() {
                Dispatch::UnsupportedArray
            } else if !document.host_children(id).is_empty() {
                Dispatch::HostWithChildren
            } else if !node.hosts.is_empty() {
                Dispatch::HostChild
            } else {
                Dispatch::Feature
            }
        }
        NodeKind::GroupingPart => Dispatch::Group,
        NodeKind::Link | NodeKind::LinkElement => Dispatch::Link,
        NodeKind::MeshFeature => Dispatch::MeshFeature,
        _ => Dispatch::Unsupported,
    }
}

/// Why a node produced no target object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    Filtered,
    UnsupportedNodeKind { type_id: String },
    UnsupportedArray,
    LinkTargetMissing,
    NoGeometry,
}

impl SkipReason {
    pub fn severity(&self) -> Severity {
        match self {
            SkipReason::Hidden | SkipReason::Filtered | SkipReason::NoGeometry => Severity::Info,
            SkipReason::UnsupportedNodeKind { .. }
            | SkipReason::UnsupportedArray
            | SkipReason::LinkTargetMissing => Severity::Warning,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Hidden => write!(f, "skipping - hidden"),
            SkipReason::Filtered => write!(f, "skipping - filtered type"),
            SkipReason::UnsupportedNodeKind { type_id } => {
                write!(f, "unable to load type '{}' (not implemented)", type_id)
            }
            SkipReason::UnsupportedArray => {
                write!(f, "array without element list is not supported")
            }
            SkipReason::LinkTargetMissing => write!(f, "link target not found - skipping"),
            SkipReason::NoGeometry => write!(f, "no geometry"),
        }
    }
}

/// Result of visiting one node.
#[derive(Clone, Debug, PartialEq)]
pub enum WalkOutcome {
    Materialized(ObjectId),
    Skipped(SkipReason),
}

impl WalkOutcome {
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            WalkOutcome::Materialized(object) => Some(*object),
            WalkOutcome::Skipped(_) => None,
        }
    }
}

/// A hosted object waiting for its parent fix-up.
#[derive(Clone, Copy, Debug)]
struct PendingHost {
    object: ObjectId,
    node: NodeId,
    depth: usize,
}

/// Counters of one traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub roots: usize,
    pub skipped: usize,
}

/// State of one document import.
pub(crate) struct ImportSession<'a> {
    pub(super) config: &'a ImportConfig,
    pub(super) kernel: &'a dyn GeometryKernel,
    pub(super) report: &'a mut dyn ReportSink,
    pub(super) scene: &'a mut SceneDatabase,
    pub(super) document: &'a Document,
    pub(super) appearance: &'a AppearanceData,
    pub(super) identity: IdentityResolver,
    pub(super) assembler: SceneAssembler,
    pub(super) materials: MaterialDeduplicator,
    composer: TransformComposer,
    meshes: MeshReconciler<'a>,
    objects: ObjectReconciler<'a>,
    pending_hosts: Vec<PendingHost>,
    stats: WalkStats,
}

impl<'a> ImportSession<'a> {
    pub fn new(
        config: &'a ImportConfig,
        kernel: &'a dyn GeometryKernel,
        report: &'a mut dyn ReportSink,
        scene: &'a mut SceneDatabase,
        document: &'a Document,
        appearance: &'a AppearanceData,
        assembler: SceneAssembler,
    ) -> Self {
        Self {
            config,
            kernel,
            report,
            scene,
            document,
            appearance,
            identity: IdentityResolver::new(config, &document.name),
            assembler,
            materials: MaterialDeduplicator::new(config.sharemats),
            composer: TransformComposer::new(config.scale, config.placement),
            meshes: MeshReconciler::new(config),
            objects: ObjectReconciler::new(config),
            pending_hosts: Vec::new(),
            stats: WalkStats::default(),
        }
    }

    /// Walk every root node, then resolve hosted parents.
    pub fn run(&mut self, touched: &mut TouchedSet) -> ImportResult<WalkStats> {
        let document = self.document;
        let roots = document.root_nodes();
        self.report.report(
            Severity::Info,
            &format!("found {} root objects in '{}'", roots.len(), document.file_name),
            0,
        );

        let ctx = self.assembler.root_context();
        for root in roots {
            let node = self.node(root)?;
            if self.is_filtered_root(node) {
                self.report_skip(node, &SkipReason::Filtered, ctx.depth);
                continue;
            }
            if !self.is_visible(node, None) {
                self.report_skip(node, &SkipReason::Hidden, ctx.depth);
                continue;
            }
            self.stats.roots += 1;
            self.walk(root, &ctx, touched)?;
        }

        self.fix_up_hosts()?;
        Ok(self.stats)
    }

    /// Visit one node.
    pub fn walk(
        &mut self,
        id: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<WalkOutcome> {
        let node = self.node(id)?;
        let dispatch = classify(self.document, id, node);
        log::debug!(
            "{}{:?} '{}' ({})",
            "  ".repeat(ctx.depth),
            dispatch,
            node.label,
            node.type_id
        );

        let outcome = match dispatch {
            Dispatch::Array => self.expand_elements(id, ctx, touched, false)?,
            Dispatch::UnsupportedArray => WalkOutcome::Skipped(SkipReason::UnsupportedArray),
            Dispatch::HostWithChildren => self.import_host(id, ctx, touched)?,
            Dispatch::HostChild => {
                let outcome = self.import_geometry(id, ctx, touched)?;
                if let Some(object) = outcome.object() {
                    self.pending_hosts.push(PendingHost {
                        object,
                        node: id,
                        depth: ctx.depth,
                    });
                }
                outcome
            }
            Dispatch::Group => self.import_group(id, ctx, touched)?,
            Dispatch::Link => self.expand_link(id, ctx, touched)?,
            Dispatch::Feature => {
                if node.type_id.contains(FEATURE_PYTHON) {
                    self.report.report(
                        Severity::Warning,
                        &format!(
                            "'{}': loading '{}' as a plain feature",
                            node.label, node.type_id
                        ),
                        ctx.depth,
                    );
                }
                self.import_geometry(id, ctx, touched)?
            }
            Dispatch::MeshFeature => self.import_geometry(id, ctx, touched)?,
            Dispatch::Unsupported => WalkOutcome::Skipped(SkipReason::UnsupportedNodeKind {
                type_id: node.type_id.clone(),
            }),
        };

        if let WalkOutcome::Skipped(reason) = &outcome {
            self.report_skip(node, reason, ctx.depth);
        }
        Ok(outcome)
    }

    /// Walk child nodes in order. `ctx` is the children's context.
    ///
    /// `visibility` is an explicit per-child list that overrides the nodes'
    /// own visibility. Children of a link or array are labeled
    /// `<source>.<child>`.
    pub(super) fn walk_children(
        &mut self,
        children: &[NodeId],
        visibility: Option<&[bool]>,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<()> {
        if children.is_empty() {
            self.report.report(Severity::Info, "no children", ctx.depth);
            return Ok(());
        }

        for (index, &child) in children.iter().enumerate() {
            let node = self.node(child)?;
            let explicit = visibility.and_then(|list| list.get(index).copied());
            if !self.is_visible(node, explicit) {
                self.report_skip(node, &SkipReason::Hidden, ctx.depth);
                continue;
            }

            let mut child_ctx = ctx.clone();
            if let Some(source) = ctx.link_source {
                let source = self.node(source)?;
                child_ctx.label = Some(self.identity.qualified(&source.label, &node.label));
            }
            self.walk(child, &child_ctx, touched)?;
        }
        Ok(())
    }

    /// Empty for the array (or link array) node, then its elements with the
    /// node as label qualifier.
    pub(super) fn expand_elements(
        &mut self,
        id: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
        as_link: bool,
    ) -> ImportResult<WalkOutcome> {
        let node = self.node(id)?;
        let empty = self.empty_add_or_update(id, ctx, touched)?;

        let mut child_ctx = ctx.child().with_parent(Some(empty), Some(id));
        if as_link {
            child_ctx = child_ctx.as_link_expansion(Some(id));
        } else {
            child_ctx.link_source = Some(id);
        }
        let visibility = node.element_visibility.as_slice();
        self.walk_children(&node.elements, Some(visibility), &child_ctx, touched)?;
        Ok(WalkOutcome::Materialized(empty))
    }

    fn import_group(
        &mut self,
        id: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<WalkOutcome> {
        let node = self.node(id)?;
        let empty = self.empty_add_or_update(id, ctx, touched)?;

        let child_ctx = ctx.child().with_parent(Some(empty), Some(id));
        self.walk_children(&node.group, None, &child_ctx, touched)?;
        Ok(WalkOutcome::Materialized(empty))
    }

    /// Import the host itself, then its hosted nodes below it.
    fn import_host(
        &mut self,
        id: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<WalkOutcome> {
        let holder = match self.import_geometry(id, ctx, touched)?.object() {
            Some(object) => object,
            None => self.empty_add_or_update(id, ctx, touched)?,
        };

        let children = self.document.host_children(id);
        let child_ctx = ctx.child().with_parent(Some(holder), Some(id));
        self.walk_children(&children, None, &child_ctx, touched)?;
        Ok(WalkOutcome::Materialized(holder))
    }

    /// Create or update the mesh and object of a shape or mesh node.
    fn import_geometry(
        &mut self,
        id: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<WalkOutcome> {
        let node = self.node(id)?;
        let document = self.document;
        let Some(geometry) = node.geometry.as_ref().and_then(|h| document.geometry(h)) else {
            return Ok(WalkOutcome::Skipped(SkipReason::NoGeometry));
        };

        let mut buffers = match geometry {
            Geometry::Brep(shape) => MeshBuffers::from_shape(shape, self.kernel, self.config)?,
            Geometry::Mesh(mesh) => MeshBuffers::from_raw(mesh),
        };
        if !self.config.placement {
            buffers.transform(node.placement.to_matrix());
        }
        if buffers.is_empty() {
            return Ok(WalkOutcome::Skipped(SkipReason::NoGeometry));
        }

        let mesh_name = self.identity.object(node);
        let object_name = ctx.label.clone().unwrap_or_else(|| mesh_name.clone());

        let (mesh, _) = self
            .meshes
            .create_or_get(self.scene, touched, &mesh_name, &buffers)?;
        let appearance = self.appearance.get(&node.name);
        let (object, outcome) = self.objects.create_or_update(
            self.scene,
            touched,
            &object_name,
            mesh,
            appearance,
            &buffers.face_groups,
        )?;

        if outcome != Reconciled::Reused && self.placement_applies(node, ctx) {
            self.apply_placement(object, node)?;
        }
        self.attach(object, ctx)?;
        log::debug!("{:?} '{}' (mesh '{}')", outcome, object_name, mesh_name);
        Ok(WalkOutcome::Materialized(object))
    }

    /// Inside a link expansion the link owns placement, except for features
    /// directly inside a grouping part.
    fn placement_applies(&self, node: &DocumentNode, ctx: &TraversalContext) -> bool {
        if !ctx.is_link_expansion {
            return true;
        }
        let parent_is_part = ctx
            .parent_node
            .and_then(|parent| self.document.node(parent))
            .is_some_and(|parent| parent.kind == NodeKind::GroupingPart);
        node.kind.is_feature() && parent_is_part
    }

    /// Compose a node's placement into an object's transform.
    pub(super) fn apply_placement(
        &mut self,
        object: ObjectId,
        node: &DocumentNode,
    ) -> ImportResult<()> {
        let target = self.scene.object_mut(object)?;
        target.transform = self.composer.compose(
            &node.placement,
            node.scale,
            ComposeMode::Absolute,
            &target.transform,
        );
        Ok(())
    }

    /// Create or update the transform-only object standing for a node.
    pub(super) fn empty_add_or_update(
        &mut self,
        id: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<ObjectId> {
        let node = self.node(id)?;
        let name = ctx
            .label
            .clone()
            .unwrap_or_else(|| self.identity.object(node));

        if touched.has_object(&name) {
            if let Some(existing) = self.scene.find_object(&name) {
                self.attach(existing, ctx)?;
                return Ok(existing);
            }
        }

        let object = match self.scene.find_object(&name) {
            Some(existing) if self.config.update => existing,
            existing => {
                if existing.is_some() {
                    self.scene.rename_object_aside(&name);
                }
                let empty = TargetObject::empty(name.as_str(), self.config.empty_display_size());
                self.scene.add_object(empty)?
            }
        };

        self.apply_placement(object, node)?;
        touched.touch_object(&name);
        self.attach(object, ctx)?;
        Ok(object)
    }

    /// Link an object into the context's collection and parent. Cycles are
    /// reported and left unparented.
    pub(super) fn attach(&mut self, object: ObjectId, ctx: &TraversalContext) -> ImportResult<()> {
        match self.assembler.attach(self.scene, object, ctx) {
            Err(SceneError::WouldCreateCycle { child, parent }) => {
                self.report.report(
                    Severity::Warning,
                    &format!("cannot parent '{}' to '{}': would create a cycle", child, parent),
                    ctx.depth,
                );
                Ok(())
            }
            other => Ok(other?),
        }
    }

    /// Give each hosted object the parent of its host's object.
    fn fix_up_hosts(&mut self) -> ImportResult<()> {
        for pending in std::mem::take(&mut self.pending_hosts) {
            let node = self.node(pending.node)?;
            let Some(&host_id) = node.hosts.first() else {
                continue;
            };
            let host = self.node(host_id)?;
            let host_name = self.identity.object(host);

            let Some(host_object) = self.scene.find_object(&host_name) else {
                self.report.report(
                    Severity::Warning,
                    &format!("host '{}' of '{}' was not imported", host_name, node.label),
                    pending.depth,
                );
                continue;
            };

            match self.scene.object(host_object).and_then(|o| o.parent) {
                Some(parent) => match self.scene.set_parent(pending.object, Some(parent)) {
                    Err(SceneError::WouldCreateCycle { child, parent }) => self.report.report(
                        Severity::Warning,
                        &format!("cannot parent '{}' to '{}': would create a cycle", child, parent),
                        pending.depth,
                    ),
                    other => other?,
                },
                None => self.report.report(
                    Severity::Warning,
                    &format!(
                        "host '{}' has no parent, cannot set parent for '{}'",
                        host_name, node.label
                    ),
                    pending.depth,
                ),
            }
        }
        Ok(())
    }

    fn is_filtered_root(&self, node: &DocumentNode) -> bool {
        ROOT_TYPE_FILTER.contains(&node.type_id.as_str())
            || (self.config.filter_sketch && node.type_id == SKETCH_TYPE)
    }

    /// Visibility under `skiphidden`: an explicit entry wins, otherwise the
    /// node's flag and its appearance entry must both allow it.
    pub(super) fn is_visible(&self, node: &DocumentNode, explicit: Option<bool>) -> bool {
        if !self.config.skiphidden {
            return true;
        }
        if let Some(visible) = explicit {
            return visible;
        }
        let hidden_by_appearance = self
            .appearance
            .get(&node.name)
            .and_then(|appearance| appearance.visibility)
            == Some(false);
        node.visibility && !hidden_by_appearance
    }

    pub(super) fn report_skip(&mut self, node: &DocumentNode, reason: &SkipReason, depth: usize) {
        self.stats.skipped += 1;
        let message = format!("'{}' ('{}', {}): {}", node.label, node.name, node.type_id, reason);
        self.report.report(reason.severity(), &message, depth);
    }

    pub(super) fn node(&self, id: NodeId) -> ImportResult<&'a DocumentNode> {
        let document: &'a Document = self.document;
        document.node(id).ok_or(ImportError::InvalidNode(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentBuilder, Shape};
    use cadsync_math::Vec3;

    #[test]
    fn test_classify_priority() {
        let mut builder = DocumentBuilder::new("Doc");
        let element = builder.feature("Element", Shape::cuboid(Vec3::ONE));
        let array = builder.array("Array", &[element], &[true]);
        let variant = builder.feature("Variant", Shape::cuboid(Vec3::ONE));
        builder.update(variant, |n| n.array_type = Some("polar".into()));
        let wall = builder.add("Wall", NodeKind::ArchHostChild);
        let window = builder.add("Window", NodeKind::ArchHostChild);
        builder.update(window, |n| n.hosts = vec![wall]);
        let part = builder.part("Part", &[]);
        let link = builder.link("Link", element);
        let mesh = builder.add("Mesh", NodeKind::MeshFeature);
        let sketch = builder.add(
            "Sketch",
            NodeKind::Other {
                type_id: SKETCH_TYPE.into(),
            },
        );
        let document = builder.build();

        let dispatch = |id: NodeId| classify(&document, id, document.node(id).unwrap());
        assert_eq!(dispatch(element), Dispatch::Feature);
        assert_eq!(dispatch(array), Dispatch::Array);
        assert_eq!(dispatch(variant), Dispatch::UnsupportedArray);
        assert_eq!(dispatch(wall), Dispatch::HostWithChildren);
        assert_eq!(dispatch(window), Dispatch::HostChild);
        assert_eq!(dispatch(part), Dispatch::Group);
        assert_eq!(dispatch(link), Dispatch::Link);
        assert_eq!(dispatch(mesh), Dispatch::MeshFeature);
        assert_eq!(dispatch(sketch), Dispatch::Unsupported);
    }

    #[test]
    fn test_skip_reason_severity() {
        assert_eq!(SkipReason::Hidden.severity(), Severity::Info);
        assert_eq!(SkipReason::LinkTargetMissing.severity(), Severity::Warning);
        assert_eq!(
            SkipReason::UnsupportedNodeKind {
                type_id: "Draft::Text".into()
            }
            .to_string(),
            "unable to load type 'Draft::Text' (not implemented)"
        );
    }
}
