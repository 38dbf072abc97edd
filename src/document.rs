//! The document: one property graph, its root, and registered extensions.

use crate::extensions::Extension;
use crate::graph::{Graph, Listener, NodeId};
use crate::properties::*;
use crate::transform::Transform;
use crate::util::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span, warn};

/// An extension registered with a document.
#[derive(Clone)]
pub struct RegisteredExtension {
    pub extension: Arc<dyn Extension>,
    /// Listed in `extensionsRequired` on write
    pub required: bool,
}

/// Container for a glTF asset being edited.
///
/// Every property is created through a `create_*` factory, which adds it to
/// the matching [`Root`] collection. Properties are handles: pass the
/// document to read or modify them.
///
/// # Example
///
/// ```
/// use gltf_graph::prelude::*;
///
/// let mut doc = Document::new();
/// let scene = doc.create_scene("main");
/// let node = doc.create_node("box");
/// scene.add_child(&mut doc, node)?;
/// assert_eq!(doc.root().list_nodes(&doc), vec![node]);
/// # Ok::<(), gltf_graph::Error>(())
/// ```
pub struct Document {
    graph: Graph,
    root: Root,
    extensions: BTreeMap<&'static str, RegisteredExtension>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("graph", &self.graph)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut graph = Graph::new();
        let id = graph.create_node(PropertyType::Root.label());
        init_attrs(&mut graph, id, PropertyType::Root);
        Self {
            graph,
            root: Root(id),
            extensions: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn root(&self) -> Root {
        self.root
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn add_listener(&mut self, listener: Listener) {
        self.graph.add_listener(listener);
    }

    /// Fail unless `id` is a live node of this document.
    pub(crate) fn ensure_owned(&self, id: NodeId) -> Result<()> {
        if id.graph() != self.graph.id() {
            return Err(Error::CrossGraph);
        }
        if !self.graph.owns(id) {
            return Err(Error::invalid(format!("unknown node {id}")));
        }
        if self.graph.is_disposed(id) {
            return Err(Error::Disposed(format!("{} {id}", self.graph.node(id).label())));
        }
        Ok(())
    }

    // ========================================================================
    // Extensions
    // ========================================================================

    /// Register an extension. Re-registering replaces the definition and
    /// keeps the required flag.
    pub fn register_extension(&mut self, extension: Arc<dyn Extension>) {
        let name = extension.name();
        let required = self.extensions.get(name).is_some_and(|e| e.required);
        debug!(extension = name, "registered extension");
        self.extensions
            .insert(name, RegisteredExtension { extension, required });
    }

    pub fn set_extension_required(&mut self, name: &str, required: bool) -> Result<()> {
        let entry = self
            .extensions
            .get_mut(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        entry.required = required;
        Ok(())
    }

    pub fn extension(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.get(name).map(|e| Arc::clone(&e.extension))
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    pub fn is_extension_required(&self, name: &str) -> bool {
        self.extensions.get(name).is_some_and(|e| e.required)
    }

    /// Registered extensions sorted by name.
    pub fn list_extensions(&self) -> impl Iterator<Item = &RegisteredExtension> {
        self.extensions.values()
    }

    /// Unregister an extension and dispose every property it defined.
    pub fn remove_extension(&mut self, name: &str) -> Option<RegisteredExtension> {
        let removed = self.extensions.remove(name)?;
        let props: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|(_, n)| n.label() == name)
            .map(|(id, _)| id)
            .collect();
        for id in props {
            self.graph.dispose(id);
        }
        Some(removed)
    }

    // ========================================================================
    // Factories
    // ========================================================================

    /// New node of `ty` with default attributes, added to its root collection.
    pub(crate) fn create_raw(&mut self, ty: PropertyType) -> NodeId {
        let id = self.create_detached(ty);
        if let Some(collection) = ty.root_collection() {
            if let Err(e) = self
                .graph
                .insert_ref(self.root.id(), collection, id, Default::default())
            {
                warn!(error = %e, "failed to add {ty} to root collection");
            }
        }
        id
    }

    fn create_detached(&mut self, ty: PropertyType) -> NodeId {
        let id = self.graph.create_node(ty.label());
        init_attrs(&mut self.graph, id, ty);
        id
    }

    fn create_named<P: Property>(&mut self, ty: PropertyType, name: &str) -> P {
        let p = P::from_id(self.create_raw(ty));
        if !name.is_empty() {
            p.set_name(self, name);
        }
        p
    }

    pub fn create_scene(&mut self, name: &str) -> Scene {
        self.create_named(PropertyType::Scene, name)
    }

    pub fn create_node(&mut self, name: &str) -> Node {
        self.create_named(PropertyType::Node, name)
    }

    pub fn create_mesh(&mut self, name: &str) -> Mesh {
        self.create_named(PropertyType::Mesh, name)
    }

    pub fn create_primitive(&mut self) -> Primitive {
        self.create_named(PropertyType::Primitive, "")
    }

    pub fn create_primitive_target(&mut self) -> PrimitiveTarget {
        self.create_named(PropertyType::PrimitiveTarget, "")
    }

    pub fn create_material(&mut self, name: &str) -> Material {
        self.create_named(PropertyType::Material, name)
    }

    pub fn create_texture(&mut self, name: &str) -> Texture {
        self.create_named(PropertyType::Texture, name)
    }

    pub fn create_texture_info(&mut self) -> TextureInfo {
        self.create_named(PropertyType::TextureInfo, "")
    }

    pub fn create_accessor(&mut self, name: &str) -> Accessor {
        self.create_named(PropertyType::Accessor, name)
    }

    pub fn create_buffer(&mut self, name: &str) -> Buffer {
        self.create_named(PropertyType::Buffer, name)
    }

    pub fn create_animation(&mut self, name: &str) -> Animation {
        self.create_named(PropertyType::Animation, name)
    }

    pub fn create_animation_channel(&mut self) -> AnimationChannel {
        self.create_named(PropertyType::AnimationChannel, "")
    }

    pub fn create_animation_sampler(&mut self) -> AnimationSampler {
        self.create_named(PropertyType::AnimationSampler, "")
    }

    pub fn create_skin(&mut self, name: &str) -> Skin {
        self.create_named(PropertyType::Skin, name)
    }

    pub fn create_camera(&mut self, name: &str) -> Camera {
        self.create_named(PropertyType::Camera, name)
    }

    /// New property of a registered extension.
    pub fn create_extension_property(&mut self, name: &str) -> Result<ExtensionProperty> {
        let ext = self
            .extensions
            .get(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        let ty = PropertyType::Extension(ext.extension.name());
        Ok(ExtensionProperty(self.create_raw(ty)))
    }

    // ========================================================================
    // Clone / merge
    // ========================================================================

    /// Recreate every live property of `other` in this document.
    ///
    /// Owned children come along with their owners. Returns the mapping from
    /// `other`'s ids to the new ones; `other`'s root maps to this root.
    fn import(&mut self, other: &Document, into_root: bool) -> Result<HashMap<NodeId, NodeId>> {
        let source = other.graph();
        let mut map = HashMap::new();
        map.insert(other.root.id(), self.root.id());
        let mut order = Vec::new();
        for (id, node) in source.nodes() {
            if id == other.root.id() {
                continue;
            }
            let owned = source
                .parent_links(id)
                .any(|l| l.meta().owned);
            if owned {
                continue;
            }
            let ty = PropertyType::from_label(node.label());
            let new_id = if into_root {
                self.create_raw(ty)
            } else {
                self.create_detached(ty)
            };
            map.insert(id, new_id);
            order.push(id);
        }
        for id in order {
            let snapshot = source.snapshot(id);
            let target = map[&id];
            self.graph
                .apply_snapshot(target, &snapshot, &mut |child| map.get(&child).copied())?;
        }
        Ok(map)
    }

    /// Copy all properties of `other` into this document.
    ///
    /// Extensions registered on `other` are registered here too. Scenes stay
    /// separate; the default scene is unchanged.
    pub fn merge(&mut self, other: &Document) -> Result<HashMap<NodeId, NodeId>> {
        let _span = info_span!("merge").entered();
        for ext in other.extensions.values() {
            if !self.has_extension(ext.extension.name()) {
                self.register_extension(Arc::clone(&ext.extension));
            }
            if ext.required {
                self.set_extension_required(ext.extension.name(), true)?;
            }
        }
        let map = self.import(other, true)?;
        debug!(properties = map.len() - 1, "merged document");
        Ok(map)
    }

    /// Independent deep copy with the same root collections and asset.
    ///
    /// Disposed properties are not copied, so the clone's arena holds only
    /// live nodes.
    pub fn try_clone(&self) -> Result<Document> {
        let mut doc = Document::new();
        doc.extensions = self.extensions.clone();
        let map = doc.import(self, false)?;
        let root = self.graph.snapshot(self.root.id());
        let target = doc.root.id();
        doc.graph
            .apply_snapshot(target, &root, &mut |child| map.get(&child).copied())?;
        Ok(doc)
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Run transforms in order. The first failure stops the run; earlier
    /// changes are kept.
    pub fn transform(&mut self, transforms: &[&dyn Transform]) -> Result<()> {
        for t in transforms {
            let name = t.name();
            let _span = info_span!("transform", name).entered();
            debug!("running transform");
            t.apply(self).map_err(|e| Error::Transform {
                name: name.to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::EmissiveStrength;
    use crate::util::{ElementType, TypedArray};

    fn sample(doc: &mut Document) -> (Scene, Node, Material) {
        let scene = doc.create_scene("s");
        let node = doc.create_node("n");
        scene.add_child(doc, node).unwrap();
        let acc = doc.create_accessor("p");
        acc.set_element_type(doc, ElementType::Vec3).unwrap();
        acc.set_array(doc, TypedArray::F32(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]))
            .unwrap();
        let material = doc.create_material("m");
        let tex = doc.create_texture("t");
        material.set_texture(doc, TextureSlot::BaseColor, Some(tex)).unwrap();
        let prim = doc.create_primitive();
        prim.set_attribute(doc, "POSITION", Some(acc)).unwrap();
        prim.set_material(doc, Some(material)).unwrap();
        let mesh = doc.create_mesh("mesh");
        mesh.add_primitive(doc, prim).unwrap();
        node.set_mesh(doc, Some(mesh)).unwrap();
        doc.root().set_default_scene(doc, Some(scene)).unwrap();
        (scene, node, material)
    }

    #[test]
    fn test_cross_document_link_rejected() {
        let mut a = Document::new();
        let mut b = Document::new();
        let node_a = a.create_node("a");
        let node_b = b.create_node("b");
        assert!(matches!(node_a.add_child(&mut a, node_b), Err(Error::CrossGraph)));
    }

    #[test]
    fn test_try_clone_is_equal_and_independent() {
        let mut doc = Document::new();
        let (scene, node, _) = sample(&mut doc);
        let copy = doc.try_clone().unwrap();

        let copy_root = copy.root();
        assert_eq!(copy_root.list_nodes(&copy).len(), 1);
        assert_eq!(copy_root.list_textures(&copy).len(), 1);
        let copy_scene = copy_root.default_scene(&copy).unwrap();
        assert!(scene.equals(&doc, copy_scene, &copy));
        let copy_node = copy_scene.list_children(&copy)[0];
        assert!(node.equals(&doc, copy_node, &copy));

        node.set_translation(&mut doc, [1.0, 2.0, 3.0]);
        assert!(!node.equals(&doc, copy_node, &copy));
    }

    #[test]
    fn test_merge_adds_collections() {
        let mut a = Document::new();
        sample(&mut a);
        let mut b = Document::new();
        sample(&mut b);
        let map = a.merge(&b).unwrap();
        assert_eq!(a.root().list_scenes(&a).len(), 2);
        assert_eq!(a.root().list_materials(&a).len(), 2);
        assert_eq!(a.root().list_meshes(&a).len(), 2);
        // Texture infos are recreated with their owners, not mapped.
        assert!(map.len() > 1);
        for m in a.root().list_materials(&a) {
            assert!(m.texture_info(&a, TextureSlot::BaseColor).is_some());
        }
    }

    #[test]
    fn test_extension_registry() {
        let mut doc = Document::new();
        assert!(doc.create_extension_property(EmissiveStrength::NAME).is_err());
        doc.register_extension(Arc::new(EmissiveStrength));
        assert!(doc.has_extension(EmissiveStrength::NAME));
        let prop = doc.create_extension_property(EmissiveStrength::NAME).unwrap();
        let material = doc.create_material("m");
        material
            .set_extension(&mut doc, EmissiveStrength::NAME, Some(prop))
            .unwrap();

        doc.remove_extension(EmissiveStrength::NAME);
        assert!(prop.is_disposed(&doc));
        assert!(material.list_extensions(&doc).is_empty());
    }

    #[test]
    fn test_clone_reclaims_disposed_slots() {
        let mut doc = Document::new();
        let scene = doc.create_scene("");
        for i in 0..8 {
            let node = doc.create_node(&format!("n{i}"));
            scene.add_child(&mut doc, node).unwrap();
            if i > 0 {
                node.dispose(&mut doc).unwrap();
            }
        }
        let (nodes, links) = doc.graph().allocated();
        assert!(nodes > doc.graph().node_count());
        assert!(links > doc.graph().link_count());

        let clone = doc.try_clone().unwrap();
        let graph = clone.graph();
        assert_eq!(graph.allocated().0, graph.node_count());
        assert_eq!(graph.node_count(), doc.graph().node_count());
        assert!(graph.allocated().1 < links);
    }

    #[test]
    fn test_root_dispose_ignored() {
        let mut doc = Document::new();
        let root = doc.root();
        root.dispose(&mut doc).unwrap();
        assert!(!root.is_disposed(&doc));
    }
}
