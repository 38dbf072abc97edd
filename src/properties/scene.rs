//! Scenes: sets of root nodes.

use super::property::{list_refs, AttrSpec};
use super::{Node, Property, PropertyType};
use crate::document::Document;
use crate::graph::LinkMeta;
use crate::util::{BBox3f, Result, Vec3};

property_handle!(
    /// A set of root nodes to display together.
    ///
    /// Scenes are never copied through [`Property::copy`]: two scenes sharing
    /// node children would break the single-parent rule for nodes.
    Scene => PropertyType::Scene
);

pub(crate) const ATTRS: &[AttrSpec] = &[AttrSpec::set("children")];

impl Scene {
    /// Add a root node. The node leaves any parent node it had.
    pub fn add_child(self, doc: &mut Document, node: Node) -> Result<()> {
        doc.ensure_owned(node.id())?;
        doc.graph_mut().disconnect_parents(node.id(), |link, parent| {
            link.name() == "children" && parent.label() == "Node"
        });
        doc.graph_mut()
            .insert_ref(self.0, "children", node.id(), LinkMeta::default())?;
        Ok(())
    }

    pub fn remove_child(self, doc: &mut Document, node: Node) {
        doc.graph_mut().remove_ref(self.0, "children", node.id());
    }

    pub fn list_children(self, doc: &Document) -> Vec<Node> {
        list_refs(doc, self.0, "children")
    }

    /// Visit every node of the scene depth-first, parents before children.
    pub fn traverse(self, doc: &Document, mut f: impl FnMut(Node)) {
        let mut stack: Vec<Node> = self.list_children(doc);
        stack.reverse();
        while let Some(node) = stack.pop() {
            f(node);
            let mut children = node.list_children(doc);
            children.reverse();
            stack.extend(children);
        }
    }

    /// World-space bounds of every mesh position accessor in the scene.
    pub fn bounds(self, doc: &Document) -> BBox3f {
        let mut bbox = BBox3f::EMPTY;
        self.traverse(doc, |node| {
            let Some(mesh) = node.mesh(doc) else {
                return;
            };
            let world = node.world_matrix(doc);
            for prim in mesh.list_primitives(doc) {
                let Some(position) = prim.attribute(doc, "POSITION") else {
                    continue;
                };
                let (min, max) = position.min_max_normalized(doc);
                if min.len() < 3 || max.len() < 3 {
                    continue;
                }
                let local = BBox3f::new(Vec3::new(min[0], min[1], min[2]), Vec3::new(max[0], max[1], max[2]));
                bbox.expand_by_transformed(&local, &world);
            }
        });
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{ElementType, TypedArray};

    #[test]
    fn test_add_child_reparents_from_node() {
        let mut doc = Document::new();
        let scene = doc.create_scene("s");
        let parent = doc.create_node("parent");
        let child = doc.create_node("child");
        parent.add_child(&mut doc, child).unwrap();
        scene.add_child(&mut doc, child).unwrap();
        assert!(parent.list_children(&doc).is_empty());
        assert_eq!(scene.list_children(&doc), vec![child]);
    }

    #[test]
    fn test_scene_copy_rejected() {
        let mut doc = Document::new();
        let a = doc.create_scene("a");
        let b = doc.create_scene("b");
        assert!(matches!(b.copy(&mut doc, a), Err(crate::Error::NotCopyable("Scene"))));
    }

    #[test]
    fn test_traverse_and_bounds() {
        let mut doc = Document::new();
        let scene = doc.create_scene("s");
        let a = doc.create_node("a");
        let b = doc.create_node("b");
        scene.add_child(&mut doc, a).unwrap();
        a.add_child(&mut doc, b).unwrap();
        b.set_translation(&mut doc, [10.0, 0.0, 0.0]);

        let position = doc.create_accessor("p");
        position.set_element_type(&mut doc, ElementType::Vec3).unwrap();
        position
            .set_array(&mut doc, TypedArray::F32(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let prim = doc.create_primitive();
        prim.set_attribute(&mut doc, "POSITION", Some(position)).unwrap();
        let mesh = doc.create_mesh("m");
        mesh.add_primitive(&mut doc, prim).unwrap();
        b.set_mesh(&mut doc, Some(mesh)).unwrap();

        let mut order = Vec::new();
        scene.traverse(&doc, |n| order.push(n));
        assert_eq!(order, vec![a, b]);

        let bbox = scene.bounds(&doc);
        assert_eq!(bbox.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(bbox.max, Vec3::new(11.0, 1.0, 1.0));
    }
}
