//! Collection tree and root empty of an imported document.

use crate::document::Document;
use crate::scene::{
    CollectionId, ObjectId, SceneDatabase, SceneResult, TargetCollection, TargetObject,
};

use super::config::ImportConfig;
use super::context::{TouchedSet, TraversalContext};

/// Suffix of the hidden collection holding link targets.
const LINK_TARGETS_SUFFIX: &str = "__link_targets";

/// Owns the per-document scene structure: the root collection named after
/// the file, its hidden link-target collection and the root empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneAssembler {
    pub root_collection: CollectionId,
    pub link_targets: CollectionId,
    pub root_empty: ObjectId,
}

impl SceneAssembler {
    /// Create or reuse the document's collections and root empty.
    pub fn prepare(
        scene: &mut SceneDatabase,
        touched: &mut TouchedSet,
        document: &Document,
        config: &ImportConfig,
    ) -> SceneResult<Self> {
        let root_collection =
            collection_add_or_update(scene, touched, &document.file_name, None, config.update)?;

        let link_targets_name = format!("{}{}", document.name, LINK_TARGETS_SUFFIX);
        let link_targets = collection_add_or_update(
            scene,
            touched,
            &link_targets_name,
            Some(root_collection),
            config.update,
        )?;
        scene.collection_mut(link_targets)?.hidden = true;

        let root_empty = match scene.find_object(&document.file_name) {
            Some(existing) if config.update => existing,
            existing => {
                if existing.is_some() {
                    scene.rename_object_aside(&document.file_name);
                }
                let empty =
                    TargetObject::empty(document.file_name.as_str(), config.empty_display_size());
                scene.add_object(empty)?
            }
        };
        scene.link_object(root_collection, root_empty)?;
        touched.touch_object(&document.file_name);

        log::debug!(
            "Prepared collection '{}' with link targets '{}'",
            document.file_name,
            link_targets_name
        );
        Ok(Self {
            root_collection,
            link_targets,
            root_empty,
        })
    }

    /// Context of the document's root nodes.
    pub fn root_context(&self) -> TraversalContext {
        TraversalContext::root(self.root_collection, Some(self.root_empty))
    }

    /// Create or reuse a link target's sub-collection below the link-target
    /// collection.
    pub fn link_target_collection(
        &self,
        scene: &mut SceneDatabase,
        touched: &mut TouchedSet,
        name: &str,
        update: bool,
    ) -> SceneResult<CollectionId> {
        collection_add_or_update(scene, touched, name, Some(self.link_targets), update)
    }

    /// Link an object into the context's collection and, if it has no
    /// parent yet, parent it to the context's parent object.
    pub fn attach(
        &self,
        scene: &mut SceneDatabase,
        object: ObjectId,
        ctx: &TraversalContext,
    ) -> SceneResult<()> {
        scene.link_object(ctx.collection, object)?;

        let has_parent = scene.object(object).is_some_and(|o| o.parent.is_some());
        if let Some(parent) = ctx.parent_object.filter(|p| *p != object) {
            if !has_parent {
                scene.set_parent(object, Some(parent))?;
            }
        }
        Ok(())
    }
}

fn collection_add_or_update(
    scene: &mut SceneDatabase,
    touched: &mut TouchedSet,
    name: &str,
    parent: Option<CollectionId>,
    update: bool,
) -> SceneResult<CollectionId> {
    if touched.has_collection(name) {
        if let Some(existing) = scene.find_collection(name) {
            return Ok(existing);
        }
    }

    let collection = match scene.find_collection(name) {
        Some(existing) if update => existing,
        existing => {
            if existing.is_some() {
                scene.rename_collection_aside(name);
            }
            scene.add_collection(TargetCollection::new(name))?
        }
    };
    if let Some(parent) = parent {
        scene.link_collection(parent, collection)?;
    }
    touched.touch_collection(name);
    Ok(collection)
}
