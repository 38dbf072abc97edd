//! Removal of properties nothing refers to.

use tracing::{debug, info};

use super::Transform;
use crate::document::Document;
use crate::graph::NodeId;
use crate::properties::{Animation, AnimationChannel, Property, PropertyType};
use crate::util::Result;

/// Which property types [`prune`] may dispose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PruneOptions {
    pub property_types: Vec<PropertyType>,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            property_types: vec![
                PropertyType::Node,
                PropertyType::Skin,
                PropertyType::Mesh,
                PropertyType::Primitive,
                PropertyType::PrimitiveTarget,
                PropertyType::Camera,
                PropertyType::AnimationChannel,
                PropertyType::AnimationSampler,
                PropertyType::Animation,
                PropertyType::Material,
                PropertyType::Texture,
                PropertyType::Accessor,
                PropertyType::Buffer,
            ],
        }
    }
}

fn is_unused(doc: &Document, ty: PropertyType, id: NodeId, root: NodeId) -> bool {
    let graph = doc.graph();
    match ty {
        PropertyType::AnimationChannel => {
            let channel = AnimationChannel::from_id(id);
            channel.target_node(doc).is_none() || channel.sampler(doc).is_none()
        }
        PropertyType::AnimationSampler => !graph.parent_links(id).any(|l| l.name() == "sampler"),
        PropertyType::Animation => Animation::from_id(id).list_channels(doc).is_empty(),
        _ => !graph.parent_links(id).any(|l| l.parent() != root),
    }
}

/// Dispose properties whose only parent is the root, repeating until
/// nothing changes. Returns the number disposed.
///
/// Scenes, the root and texture infos are never pruned directly; texture
/// infos go with their material.
pub fn prune(doc: &mut Document, options: &PruneOptions) -> usize {
    let root = doc.root().id();
    let mut total = 0;
    loop {
        let mut disposed = 0;
        for &ty in &options.property_types {
            let candidates: Vec<NodeId> = doc
                .graph()
                .nodes()
                .filter(|(_, n)| n.label() == ty.label())
                .map(|(id, _)| id)
                .collect();
            for id in candidates {
                if !doc.graph().is_disposed(id) && is_unused(doc, ty, id, root) {
                    debug!(property = %ty, %id, "pruned");
                    doc.graph_mut().dispose(id);
                    disposed += 1;
                }
            }
        }
        if disposed == 0 {
            break;
        }
        total += disposed;
    }
    info!(disposed = total, "prune finished");
    total
}

/// [`prune`] as a [`Transform`].
#[derive(Clone, Debug, Default)]
pub struct Prune(pub PruneOptions);

impl Transform for Prune {
    fn name(&self) -> &str {
        "prune"
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        prune(doc, &self.0);
        Ok(())
    }
}
