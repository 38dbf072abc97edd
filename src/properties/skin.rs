//! Skins for vertex skinning.

use super::property::{get_ref, list_refs, set_ref, AttrSpec};
use super::{Accessor, Node, PropertyType};
use crate::document::Document;
use crate::graph::{BufferUsage, LinkMeta};
use crate::util::Result;

property_handle!(
    /// Joint hierarchy and inverse bind matrices.
    Skin => PropertyType::Skin
);

pub(crate) const ATTRS: &[AttrSpec] = &[
    AttrSpec::reference("skeleton"),
    AttrSpec::reference("inverseBindMatrices"),
    AttrSpec::list("joints"),
];

impl Skin {
    pub fn skeleton(self, doc: &Document) -> Option<Node> {
        get_ref(doc, self.0, "skeleton")
    }

    pub fn set_skeleton(self, doc: &mut Document, skeleton: Option<Node>) -> Result<()> {
        set_ref(doc, self.0, "skeleton", skeleton, LinkMeta::default())
    }

    pub fn inverse_bind_matrices(self, doc: &Document) -> Option<Accessor> {
        get_ref(doc, self.0, "inverseBindMatrices")
    }

    pub fn set_inverse_bind_matrices(self, doc: &mut Document, accessor: Option<Accessor>) -> Result<()> {
        set_ref(
            doc,
            self.0,
            "inverseBindMatrices",
            accessor,
            LinkMeta::usage(BufferUsage::InverseBindMatrices),
        )
    }

    pub fn list_joints(self, doc: &Document) -> Vec<Node> {
        list_refs(doc, self.0, "joints")
    }

    pub fn add_joint(self, doc: &mut Document, joint: Node) -> Result<()> {
        doc.graph_mut()
            .push_ref(self.0, "joints", joint.0, LinkMeta::default())?;
        Ok(())
    }

    pub fn remove_joint(self, doc: &mut Document, joint: Node) {
        doc.graph_mut().remove_ref(self.0, "joints", joint.0);
    }
}
