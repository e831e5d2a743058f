//! Link expansion.
//!
//! A link is handled in two phases. The target is first materialized once
//! per run as a hidden object in its own sub-collection under the
//! link-target collection. Then the link becomes an instance: either an
//! object sharing the target's mesh, or an object instancing the target's
//! sub-collection.

use cadsync_math::Vec3;

use crate::document::{NodeId, NodeKind};
use crate::mesh::TargetMesh;
use crate::scene::{MeshId, ObjectData, ObjectId, TargetObject};

use super::context::{TouchedSet, TraversalContext};
use super::report::Severity;
use super::walker::{ImportSession, SkipReason, WalkOutcome};
use super::ImportResult;

/// Suffix of placeholder meshes for instances whose target has no mesh yet.
const PLACEHOLDER_SUFFIX: &str = ".temp";

impl<'a> ImportSession<'a> {
    pub(super) fn expand_link(
        &mut self,
        id: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<WalkOutcome> {
        let node = self.node(id)?;
        if node.link_target.is_none() {
            return Ok(WalkOutcome::Skipped(SkipReason::LinkTargetMissing));
        }
        if !node.elements.is_empty() {
            return self.expand_elements(id, ctx, touched, true);
        }
        let Some(target) = self.document.resolve_link(id) else {
            return Ok(WalkOutcome::Skipped(SkipReason::LinkTargetMissing));
        };

        let target_object = self.materialize_link_target(id, target, ctx, touched)?;

        if self.config.links_as_collectioninstance {
            self.collection_instance(id, target, ctx, touched)
        } else {
            self.link_instance(id, target, target_object, ctx, touched)
        }
    }

    /// Import a link target once per run, detached and hidden.
    ///
    /// The target object is unparented, moved to the origin and linked only
    /// into its own sub-collection.
    fn materialize_link_target(
        &mut self,
        link: NodeId,
        target: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<Option<ObjectId>> {
        let node = self.node(target)?;
        let object_name = self.identity.link_target(node);
        let collection_name = self.identity.object(node);
        let collection = self.assembler.link_target_collection(
            self.scene,
            touched,
            &collection_name,
            self.config.update,
        )?;

        if touched.has_object(&object_name) {
            return Ok(self.scene.find_object(&object_name));
        }

        self.report.report(
            Severity::Info,
            &format!("link target '{}'", node.label),
            ctx.depth + 1,
        );
        let mut target_ctx = TraversalContext::root(self.assembler.link_targets, None)
            .in_collection(collection)
            .with_parent(None, Some(link))
            .with_label(object_name.as_str())
            .as_link_expansion(None);
        target_ctx.depth = ctx.depth + 1;

        let Some(object) = self.walk(target, &target_ctx, touched)?.object() else {
            return Ok(None);
        };
        self.scene.set_parent(object, None)?;
        self.scene.object_mut(object)?.transform.location = Vec3::ZERO;
        self.scene.set_exclusive_collection(object, collection)?;
        Ok(Some(object))
    }

    /// Instance sharing the target's mesh.
    ///
    /// The instance takes the target's scale, then the link's placement.
    /// Children of the target are not instanced.
    fn link_instance(
        &mut self,
        id: NodeId,
        target: NodeId,
        target_object: Option<ObjectId>,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<WalkOutcome> {
        let node = self.node(id)?;
        let target_node = self.node(target)?;
        let name = ctx
            .label
            .clone()
            .unwrap_or_else(|| self.identity.object(node));

        if let Some(existing) = self.reuse_touched(&name, ctx, touched)? {
            return Ok(WalkOutcome::Materialized(existing));
        }

        let target_mesh = target_object
            .and_then(|object| self.scene.object(object))
            .and_then(TargetObject::mesh);
        let shares_mesh =
            target_node.kind.is_feature() || target_node.kind == NodeKind::MeshFeature;

        let object = match self.scene.find_object(&name) {
            Some(existing) if self.config.update => existing,
            existing => {
                if existing.is_some() {
                    self.scene.rename_object_aside(&name);
                }
                let instance = if shares_mesh {
                    let mesh = match target_mesh {
                        Some(mesh) => mesh,
                        None => self.placeholder_mesh(&name)?,
                    };
                    TargetObject::with_mesh(name.as_str(), mesh)
                } else {
                    self.report.report(
                        Severity::Warning,
                        &format!(
                            "'{}': instancing '{}' ({}) is not supported, created an empty",
                            name, target_node.label, target_node.type_id
                        ),
                        ctx.depth,
                    );
                    TargetObject::empty(name.as_str(), self.config.empty_display_size())
                };
                self.scene.add_object(instance)?
            }
        };

        match target_object {
            Some(target_object) => {
                let scale = self
                    .scene
                    .object(target_object)
                    .map_or(Vec3::ONE, |o| o.transform.scale);
                self.scene.object_mut(object)?.transform.scale = scale;
                if !self.scene.children_of(target_object).is_empty() {
                    self.report.report(
                        Severity::Warning,
                        &format!(
                            "'{}': children of link target '{}' are not instanced",
                            name, target_node.label
                        ),
                        ctx.depth,
                    );
                }
            }
            None => self.report.report(
                Severity::Warning,
                &format!("'{}': link target '{}' was not imported", name, target_node.label),
                ctx.depth,
            ),
        }

        self.apply_placement(object, node)?;

        if let Some(mesh) = target_mesh.filter(|_| shares_mesh) {
            let instance = self.scene.object_mut(object)?;
            if instance.mesh() != Some(mesh) {
                instance.data = ObjectData::Mesh(mesh);
                log::debug!("Relinked '{}' to the target mesh", name);
            }
        }

        if let Some(appearance) = self.appearance.get(&node.name) {
            let overrides = self.materials.overrides(self.scene, &name, appearance)?;
            if !overrides.is_empty() {
                self.scene.object_mut(object)?.material_overrides = overrides;
            }
        }

        touched.touch_object(&name);
        self.attach(object, ctx)?;
        Ok(WalkOutcome::Materialized(object))
    }

    /// Instance of the target's sub-collection.
    fn collection_instance(
        &mut self,
        id: NodeId,
        target: NodeId,
        ctx: &TraversalContext,
        touched: &mut TouchedSet,
    ) -> ImportResult<WalkOutcome> {
        let node = self.node(id)?;
        let target_node = self.node(target)?;
        let name = ctx
            .label
            .clone()
            .unwrap_or_else(|| self.identity.object(node));

        let collection_name = self.identity.object(target_node);
        let Some(collection) = self.scene.find_collection(&collection_name) else {
            self.report.report(
                Severity::Warning,
                &format!("collection '{}' for '{}' not found", collection_name, name),
                ctx.depth,
            );
            return Ok(WalkOutcome::Skipped(SkipReason::LinkTargetMissing));
        };

        if let Some(existing) = self.reuse_touched(&name, ctx, touched)? {
            return Ok(WalkOutcome::Materialized(existing));
        }

        let display_size = self.config.empty_display_size();
        let object = match self.scene.find_object(&name) {
            Some(existing) if self.config.update => existing,
            existing => {
                if existing.is_some() {
                    self.scene.rename_object_aside(&name);
                }
                let instance =
                    TargetObject::collection_instance(name.as_str(), collection, display_size);
                self.scene.add_object(instance)?
            }
        };
        self.scene.object_mut(object)?.data = ObjectData::CollectionInstance {
            collection,
            display_size,
        };
        self.apply_placement(object, node)?;

        touched.touch_object(&name);
        self.attach(object, ctx)?;
        Ok(WalkOutcome::Materialized(object))
    }

    fn reuse_touched(
        &mut self,
        name: &str,
        ctx: &TraversalContext,
        touched: &TouchedSet,
    ) -> ImportResult<Option<ObjectId>> {
        if !touched.has_object(name) {
            return Ok(None);
        }
        let existing = self.scene.find_object(name);
        if let Some(object) = existing {
            self.attach(object, ctx)?;
        }
        Ok(existing)
    }

    /// Empty mesh standing in for a target mesh that does not exist yet.
    fn placeholder_mesh(&mut self, name: &str) -> ImportResult<MeshId> {
        let mesh_name = self
            .scene
            .meshes
            .unique_name(&format!("{}{}", name, PLACEHOLDER_SUFFIX));
        log::debug!("Placeholder mesh '{}'", mesh_name);
        Ok(self
            .scene
            .add_mesh(TargetMesh::new(mesh_name, Vec::new(), Vec::new(), Vec::new()))?)
    }
}
