//! Meshes, primitives and morph targets.
//!
//! Vertex counts are checked whenever an attribute or target is attached:
//! every attribute of a primitive and of its targets must have the same
//! count, and all primitives of one mesh must carry the same number of
//! targets. Build a primitive completely before adding it to a mesh that
//! already holds morphed primitives.

use super::property::{get_int, get_ref, list_refs, parents_via, set_ref, AttrSpec};
use super::{Accessor, Material, Property, PropertyType};
use crate::document::Document;
use crate::graph::{BufferUsage, LinkMeta, Value};
use crate::util::{Error, Result};

property_handle!(
    /// A set of primitives drawn together.
    Mesh => PropertyType::Mesh
);

property_handle!(
    /// One draw call: vertex attributes, optional indices and a material.
    Primitive => PropertyType::Primitive
);

property_handle!(
    /// A morph target: per-vertex displacements keyed by semantic.
    PrimitiveTarget => PropertyType::PrimitiveTarget
);

pub(crate) const MESH_ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("weights", || Value::Floats(Default::default())),
    AttrSpec::list("primitives"),
];

pub(crate) const PRIMITIVE_ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("mode", || Value::Int(PrimitiveMode::Triangles as i64)),
    AttrSpec::reference("indices"),
    AttrSpec::reference("material"),
    AttrSpec::map("attributes"),
    AttrSpec::list("targets"),
];

pub(crate) const TARGET_ATTRS: &[AttrSpec] = &[AttrSpec::map("attributes")];

/// Primitive topology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveMode {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    #[default]
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl PrimitiveMode {
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Points),
            1 => Some(Self::Lines),
            2 => Some(Self::LineLoop),
            3 => Some(Self::LineStrip),
            4 => Some(Self::Triangles),
            5 => Some(Self::TriangleStrip),
            6 => Some(Self::TriangleFan),
            _ => None,
        }
    }
}

fn vertex_mismatch(semantic: &str, expected: usize, actual: usize) -> Error {
    Error::VertexCountMismatch {
        semantic: semantic.to_string(),
        expected,
        actual,
    }
}

fn attribute_counts(doc: &Document, id: crate::graph::NodeId) -> Vec<(String, usize)> {
    doc.graph()
        .list_ref_map(id, "attributes")
        .into_iter()
        .map(|(k, acc)| (k, Accessor::from_id(acc).count(doc)))
        .collect()
}

/// Check that `accessor` may hold `count` elements: every primitive using it,
/// directly or through a morph target, must keep one vertex count.
pub(crate) fn check_attribute_resize(doc: &Document, accessor: Accessor, count: usize) -> Result<()> {
    let mut groups: Vec<Vec<(String, Accessor)>> = Vec::new();
    let mut prims: Vec<Primitive> = parents_via(doc, accessor.id(), "attributes");
    for target in parents_via::<PrimitiveTarget>(doc, accessor.id(), "attributes") {
        let holders: Vec<Primitive> = parents_via(doc, target.id(), "targets");
        if holders.is_empty() {
            groups.push(target.list_attributes(doc));
        }
        for p in holders {
            if !prims.contains(&p) {
                prims.push(p);
            }
        }
    }
    for prim in prims {
        let mut group = prim.list_attributes(doc);
        for target in prim.list_targets(doc) {
            group.extend(target.list_attributes(doc));
        }
        groups.push(group);
    }
    for (semantic, other) in groups.into_iter().flatten() {
        if other == accessor {
            continue;
        }
        let expected = other.count(doc);
        if expected != count {
            return Err(vertex_mismatch(&semantic, expected, count));
        }
    }
    Ok(())
}

/// Check that every primitive holding `target` may lose it.
pub(crate) fn check_target_release(doc: &Document, target: PrimitiveTarget) -> Result<()> {
    for prim in parents_via::<Primitive>(doc, target.id(), "targets") {
        prim.check_sibling_targets(doc, prim.list_targets(doc).len() - 1)?;
    }
    Ok(())
}

impl Mesh {
    pub fn list_primitives(self, doc: &Document) -> Vec<Primitive> {
        list_refs(doc, self.0, "primitives")
    }

    /// Append a primitive. Its target count must match the other primitives.
    pub fn add_primitive(self, doc: &mut Document, prim: Primitive) -> Result<()> {
        doc.ensure_owned(prim.0)?;
        let count = prim.list_targets(doc).len();
        if let Some(other) = self
            .list_primitives(doc)
            .into_iter()
            .filter(|p| *p != prim)
            .map(|p| p.list_targets(doc).len())
            .find(|n| *n != count)
        {
            return Err(Error::TargetCountMismatch {
                expected: other,
                actual: count,
            });
        }
        doc.graph_mut()
            .push_ref(self.0, "primitives", prim.0, LinkMeta::default())?;
        Ok(())
    }

    pub fn remove_primitive(self, doc: &mut Document, prim: Primitive) {
        doc.graph_mut().remove_ref(self.0, "primitives", prim.0);
    }

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
}

impl Primitive {
    pub fn mode(self, doc: &Document) -> PrimitiveMode {
        get_int(doc, self.0, "mode")
            .and_then(|v| PrimitiveMode::from_u32(v as u32))
            .unwrap_or_default()
    }

    pub fn set_mode(self, doc: &mut Document, mode: PrimitiveMode) {
        doc.graph_mut().set(self.0, "mode", mode as i64);
    }

    pub fn indices(self, doc: &Document) -> Option<Accessor> {
        get_ref(doc, self.0, "indices")
    }

    pub fn set_indices(self, doc: &mut Document, indices: Option<Accessor>) -> Result<()> {
        set_ref(
            doc,
            self.0,
            "indices",
            indices,
            LinkMeta::usage(BufferUsage::ElementArrayBuffer),
        )
    }

    pub fn material(self, doc: &Document) -> Option<Material> {
        get_ref(doc, self.0, "material")
    }

    pub fn set_material(self, doc: &mut Document, material: Option<Material>) -> Result<()> {
        set_ref(doc, self.0, "material", material, LinkMeta::default())
    }

    pub fn attribute(self, doc: &Document, semantic: &str) -> Option<Accessor> {
        doc.graph()
            .get_ref_map(self.0, "attributes", semantic)
            .map(Accessor::from_id)
    }

    /// Attributes sorted by semantic.
    pub fn list_attributes(self, doc: &Document) -> Vec<(String, Accessor)> {
        doc.graph()
            .list_ref_map(self.0, "attributes")
            .into_iter()
            .map(|(k, id)| (k, Accessor::from_id(id)))
            .collect()
    }

    pub fn list_semantics(self, doc: &Document) -> Vec<String> {
        self.list_attributes(doc).into_iter().map(|(k, _)| k).collect()
    }

    /// Vertex count shared by the attributes, `None` without attributes.
    pub fn vertex_count(self, doc: &Document) -> Option<usize> {
        self.list_attributes(doc)
            .first()
            .map(|(_, acc)| acc.count(doc))
    }

    /// Set or remove a vertex attribute.
    ///
    /// The accessor's count must match the other attributes and the targets.
    pub fn set_attribute(self, doc: &mut Document, semantic: &str, accessor: Option<Accessor>) -> Result<()> {
        if let Some(accessor) = accessor {
            doc.ensure_owned(accessor.id())?;
            let actual = accessor.count(doc);
            let expected = attribute_counts(doc, self.0)
                .into_iter()
                .find(|(k, _)| k != semantic)
                .map(|(_, n)| n)
                .or_else(|| {
                    self.list_targets(doc)
                        .into_iter()
                        .find_map(|t| t.vertex_count(doc))
                });
            if let Some(expected) = expected {
                if expected != actual {
                    return Err(vertex_mismatch(semantic, expected, actual));
                }
            }
        }
        doc.graph_mut().set_ref_map(
            self.0,
            "attributes",
            semantic,
            accessor.map(Accessor::id),
            LinkMeta::usage(BufferUsage::ArrayBuffer),
        )?;
        Ok(())
    }

    pub fn list_targets(self, doc: &Document) -> Vec<PrimitiveTarget> {
        list_refs(doc, self.0, "targets")
    }

    /// Meshes listing this primitive.
    pub fn list_meshes(self, doc: &Document) -> Vec<Mesh> {
        parents_via(doc, self.0, "primitives")
    }

    fn check_sibling_targets(self, doc: &Document, count: usize) -> Result<()> {
        for mesh in self.list_meshes(doc) {
            for sibling in mesh.list_primitives(doc) {
                let n = sibling.list_targets(doc).len();
                if sibling != self && n != count {
                    return Err(Error::TargetCountMismatch {
                        expected: n,
                        actual: count,
                    });
                }
            }
        }
        Ok(())
    }

    /// Append a morph target with the same vertex count as this primitive.
    pub fn add_target(self, doc: &mut Document, target: PrimitiveTarget) -> Result<()> {
        doc.ensure_owned(target.0)?;
        if let (Some(expected), Some(actual)) = (self.vertex_count(doc), target.vertex_count(doc)) {
            if expected != actual {
                return Err(vertex_mismatch("target", expected, actual));
            }
        }
        self.check_sibling_targets(doc, self.list_targets(doc).len() + 1)?;
        doc.graph_mut()
            .push_ref(self.0, "targets", target.0, LinkMeta::default())?;
        Ok(())
    }

    pub fn remove_target(self, doc: &mut Document, target: PrimitiveTarget) -> Result<()> {
        if !self.list_targets(doc).contains(&target) {
            return Ok(());
        }
        self.check_sibling_targets(doc, self.list_targets(doc).len() - 1)?;
        doc.graph_mut().remove_ref(self.0, "targets", target.0);
        Ok(())
    }
}

impl PrimitiveTarget {
    pub fn attribute(self, doc: &Document, semantic: &str) -> Option<Accessor> {
        doc.graph()
            .get_ref_map(self.0, "attributes", semantic)
            .map(Accessor::from_id)
    }

    pub fn list_attributes(self, doc: &Document) -> Vec<(String, Accessor)> {
        doc.graph()
            .list_ref_map(self.0, "attributes")
            .into_iter()
            .map(|(k, id)| (k, Accessor::from_id(id)))
            .collect()
    }

    pub fn vertex_count(self, doc: &Document) -> Option<usize> {
        self.list_attributes(doc)
            .first()
            .map(|(_, acc)| acc.count(doc))
    }

    /// Set or remove a displacement attribute, checked against the target
    /// and the primitives holding it.
    pub fn set_attribute(self, doc: &mut Document, semantic: &str, accessor: Option<Accessor>) -> Result<()> {
        if let Some(accessor) = accessor {
            doc.ensure_owned(accessor.id())?;
            let actual = accessor.count(doc);
            let expected = attribute_counts(doc, self.0)
                .into_iter()
                .find(|(k, _)| k != semantic)
                .map(|(_, n)| n)
                .or_else(|| {
                    parents_via::<Primitive>(doc, self.0, "targets")
                        .into_iter()
                        .find_map(|p| p.vertex_count(doc))
                });
            if let Some(expected) = expected {
                if expected != actual {
                    return Err(vertex_mismatch(semantic, expected, actual));
                }
            }
        }
        doc.graph_mut().set_ref_map(
            self.0,
            "attributes",
            semantic,
            accessor.map(Accessor::id),
            LinkMeta::usage(BufferUsage::ArrayBuffer),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{ElementType, TypedArray};

    fn vec3(doc: &mut Document, count: usize) -> Accessor {
        let acc = doc.create_accessor("");
        acc.set_element_type(doc, ElementType::Vec3).unwrap();
        acc.set_array(doc, TypedArray::F32(vec![0.0; count * 3])).unwrap();
        acc
    }

    #[test]
    fn test_attribute_count_mismatch_rejected() {
        let mut doc = Document::new();
        let prim = doc.create_primitive();
        let a = vec3(&mut doc, 3);
        let b = vec3(&mut doc, 4);
        prim.set_attribute(&mut doc, "POSITION", Some(a)).unwrap();
        let err = prim.set_attribute(&mut doc, "NORMAL", Some(b)).unwrap_err();
        assert!(matches!(err, Error::VertexCountMismatch { expected: 3, actual: 4, .. }));
        assert!(prim.attribute(&doc, "NORMAL").is_none());

        // Replacing the only attribute may change the count.
        prim.set_attribute(&mut doc, "POSITION", Some(b)).unwrap();
        assert_eq!(prim.vertex_count(&doc), Some(4));
    }

    #[test]
    fn test_target_vertex_count() {
        let mut doc = Document::new();
        let prim = doc.create_primitive();
        let position = vec3(&mut doc, 3);
        prim.set_attribute(&mut doc, "POSITION", Some(position)).unwrap();

        let target = doc.create_primitive_target();
        let wrong = vec3(&mut doc, 2);
        target.set_attribute(&mut doc, "POSITION", Some(wrong)).unwrap();
        assert!(prim.add_target(&mut doc, target).is_err());

        let ok = doc.create_primitive_target();
        prim.add_target(&mut doc, ok).unwrap();
        let delta = vec3(&mut doc, 2);
        assert!(ok.set_attribute(&mut doc, "POSITION", Some(delta)).is_err());
    }

    #[test]
    fn test_target_count_equal_across_mesh() {
        let mut doc = Document::new();
        let mesh = doc.create_mesh("m");
        let p1 = doc.create_primitive();
        let p2 = doc.create_primitive();
        let t = doc.create_primitive_target();
        p1.add_target(&mut doc, t).unwrap();
        mesh.add_primitive(&mut doc, p1).unwrap();
        assert!(matches!(
            mesh.add_primitive(&mut doc, p2),
            Err(Error::TargetCountMismatch { expected: 1, actual: 0 })
        ));

        let t2 = doc.create_primitive_target();
        p2.add_target(&mut doc, t2).unwrap();
        mesh.add_primitive(&mut doc, p2).unwrap();
        for p in mesh.list_primitives(&doc) {
            assert_eq!(p.list_targets(&doc).len(), 1);
        }

        let extra = doc.create_primitive_target();
        assert!(p1.add_target(&mut doc, extra).is_err());
    }

    #[test]
    fn test_dispose_removes_from_ref_map() {
        let mut doc = Document::new();
        let prim = doc.create_primitive();
        let acc = vec3(&mut doc, 3);
        prim.set_attribute(&mut doc, "POSITION", Some(acc)).unwrap();
        acc.dispose(&mut doc).unwrap();
        assert!(prim.list_attributes(&doc).is_empty());
        assert!(acc.list_parents(&doc).is_empty());
        assert!(acc.is_disposed(&doc));
    }
}
