//! Scene-graph nodes.

use super::property::{get_array, get_ref, list_refs, parents_via, set_ref, AttrSpec};
use super::{Camera, Mesh, Property, PropertyType, Scene, Skin};
use crate::document::Document;
use crate::graph::{LinkMeta, Value};
use crate::util::{compose_trs, decompose_trs, Error, Mat4, Result};

property_handle!(
    /// A transform in the hierarchy, optionally instancing a mesh, camera or skin.
    ///
    /// A node has at most one parent node. [`Node::add_child`] moves the child
    /// out of its previous parent and rejects cycles.
    Node => PropertyType::Node
);

pub(crate) const ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("translation", || Value::from([0.0_f32, 0.0, 0.0])),
    AttrSpec::literal("rotation", || Value::from([0.0_f32, 0.0, 0.0, 1.0])),
    AttrSpec::literal("scale", || Value::from([1.0_f32, 1.0, 1.0])),
    AttrSpec::literal("weights", || Value::Floats(Default::default())),
    AttrSpec::reference("camera"),
    AttrSpec::reference("mesh"),
    AttrSpec::reference("skin"),
    AttrSpec::set("children"),
];

impl Node {
    pub fn translation(self, doc: &Document) -> [f32; 3] {
        get_array(doc, self.0, "translation", [0.0; 3])
    }

    pub fn set_translation(self, doc: &mut Document, t: [f32; 3]) {
        doc.graph_mut().set(self.0, "translation", t);
    }

    /// Rotation quaternion as `[x, y, z, w]`.
    pub fn rotation(self, doc: &Document) -> [f32; 4] {
        get_array(doc, self.0, "rotation", [0.0, 0.0, 0.0, 1.0])
    }

    pub fn set_rotation(self, doc: &mut Document, r: [f32; 4]) {
        doc.graph_mut().set(self.0, "rotation", r);
    }

    pub fn scale(self, doc: &Document) -> [f32; 3] {
        get_array(doc, self.0, "scale", [1.0; 3])
    }

    pub fn set_scale(self, doc: &mut Document, s: [f32; 3]) {
        doc.graph_mut().set(self.0, "scale", s);
    }

    /// Default morph target weights.
    pub fn weights(self, doc: &Document) -> Vec<f32> {
        doc.graph()
            .get(self.0, "weights")
            .and_then(Value::as_floats)
            .map(<[f32]>::to_vec)
            .unwrap_or_default()
    }

    pub fn set_weights(self, doc: &mut Document, weights: &[f32]) {
        doc.graph_mut().set(self.0, "weights", weights);
    }

    /// Local matrix composed from translation, rotation and scale.
    pub fn matrix(self, doc: &Document) -> Mat4 {
        compose_trs(self.translation(doc), self.rotation(doc), self.scale(doc))
    }

    /// Set translation, rotation and scale from a local matrix.
    pub fn set_matrix(self, doc: &mut Document, m: &Mat4) {
        let (t, r, s) = decompose_trs(m);
        self.set_translation(doc, t);
        self.set_rotation(doc, r);
        self.set_scale(doc, s);
    }

    /// Matrix from node space to scene space.
    pub fn world_matrix(self, doc: &Document) -> Mat4 {
        let mut m = self.matrix(doc);
        let mut current = self.parent_node(doc);
        while let Some(parent) = current {
            m = parent.matrix(doc) * m;
            current = parent.parent_node(doc);
        }
        m
    }

    pub fn mesh(self, doc: &Document) -> Option<Mesh> {
        get_ref(doc, self.0, "mesh")
    }

    pub fn set_mesh(self, doc: &mut Document, mesh: Option<Mesh>) -> Result<()> {
        set_ref(doc, self.0, "mesh", mesh, LinkMeta::default())
    }

    pub fn camera(self, doc: &Document) -> Option<Camera> {
        get_ref(doc, self.0, "camera")
    }

    pub fn set_camera(self, doc: &mut Document, camera: Option<Camera>) -> Result<()> {
        set_ref(doc, self.0, "camera", camera, LinkMeta::default())
    }

    pub fn skin(self, doc: &Document) -> Option<Skin> {
        get_ref(doc, self.0, "skin")
    }

    pub fn set_skin(self, doc: &mut Document, skin: Option<Skin>) -> Result<()> {
        set_ref(doc, self.0, "skin", skin, LinkMeta::default())
    }

    pub fn list_children(self, doc: &Document) -> Vec<Node> {
        list_refs(doc, self.0, "children")
    }

    /// The node holding this one as a child, if any.
    pub fn parent_node(self, doc: &Document) -> Option<Node> {
        parents_via::<Node>(doc, self.0, "children").into_iter().next()
    }

    /// Scenes listing this node as a root.
    pub fn list_scenes(self, doc: &Document) -> Vec<Scene> {
        parents_via(doc, self.0, "children")
    }

    /// Attach `child`, moving it out of any previous parent node.
    pub fn add_child(self, doc: &mut Document, child: Node) -> Result<()> {
        doc.ensure_owned(child.0)?;
        let mut ancestor = Some(self);
        while let Some(node) = ancestor {
            if node == child {
                return Err(Error::Cycle {
                    parent: self.describe(doc),
                    child: child.describe(doc),
                });
            }
            ancestor = node.parent_node(doc);
        }
        doc.graph_mut().disconnect_parents(child.0, |link, parent| {
            link.name() == "children" && parent.label() == "Node"
        });
        doc.graph_mut()
            .insert_ref(self.0, "children", child.0, LinkMeta::default())?;
        Ok(())
    }

    pub fn remove_child(self, doc: &mut Document, child: Node) {
        doc.graph_mut().remove_ref(self.0, "children", child.0);
    }
}
