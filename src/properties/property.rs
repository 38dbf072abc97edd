//! Shared property behavior: type tags, attribute descriptors, and the
//! [`Property`] / [`Extensible`] traits every handle implements.

use crate::document::Document;
use crate::graph::{Graph, LinkMeta, NodeId, Slot, Value};
use crate::properties::ExtensionProperty;
use crate::util::{Error, Result};
use std::fmt;
use std::hash::Hash;

/// Property type tag, stored as the graph node label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Root,
    Scene,
    Node,
    Mesh,
    Primitive,
    PrimitiveTarget,
    Material,
    Texture,
    TextureInfo,
    Accessor,
    Buffer,
    Animation,
    AnimationChannel,
    AnimationSampler,
    Skin,
    Camera,
    /// Extension property; carries the extension name
    Extension(&'static str),
}

impl PropertyType {
    const CORE: [Self; 16] = [
        Self::Root,
        Self::Scene,
        Self::Node,
        Self::Mesh,
        Self::Primitive,
        Self::PrimitiveTarget,
        Self::Material,
        Self::Texture,
        Self::TextureInfo,
        Self::Accessor,
        Self::Buffer,
        Self::Animation,
        Self::AnimationChannel,
        Self::AnimationSampler,
        Self::Skin,
        Self::Camera,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Scene => "Scene",
            Self::Node => "Node",
            Self::Mesh => "Mesh",
            Self::Primitive => "Primitive",
            Self::PrimitiveTarget => "PrimitiveTarget",
            Self::Material => "Material",
            Self::Texture => "Texture",
            Self::TextureInfo => "TextureInfo",
            Self::Accessor => "Accessor",
            Self::Buffer => "Buffer",
            Self::Animation => "Animation",
            Self::AnimationChannel => "AnimationChannel",
            Self::AnimationSampler => "AnimationSampler",
            Self::Skin => "Skin",
            Self::Camera => "Camera",
            Self::Extension(name) => name,
        }
    }

    /// Map a node label back to its type; unknown labels are extension names.
    pub fn from_label(label: &'static str) -> Self {
        Self::CORE
            .into_iter()
            .find(|t| t.label() == label)
            .unwrap_or(Self::Extension(label))
    }

    /// Root and Scene are only cloned as part of a whole document.
    pub const fn is_copyable(self) -> bool {
        !matches!(self, Self::Root | Self::Scene)
    }

    /// Root collection that tracks properties of this type.
    pub const fn root_collection(self) -> Option<&'static str> {
        match self {
            Self::Scene => Some("scenes"),
            Self::Node => Some("nodes"),
            Self::Mesh => Some("meshes"),
            Self::Material => Some("materials"),
            Self::Texture => Some("textures"),
            Self::Accessor => Some("accessors"),
            Self::Buffer => Some("buffers"),
            Self::Animation => Some("animations"),
            Self::Skin => Some("skins"),
            Self::Camera => Some("cameras"),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An untyped property handle, as returned by parent queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub ty: PropertyType,
    pub id: NodeId,
}

impl PropertyRef {
    pub(crate) fn of(graph: &Graph, id: NodeId) -> Self {
        Self {
            ty: PropertyType::from_label(graph.node(id).label()),
            id,
        }
    }

    /// View as a typed handle, if the type matches.
    pub fn cast<P: Property>(self) -> Option<P> {
        P::accepts(self.ty).then(|| P::from_id(self.id))
    }
}

// ============================================================================
// Attribute descriptors
// ============================================================================

#[derive(Clone, Copy)]
pub(crate) enum AttrKind {
    Literal(fn() -> Value),
    Ref,
    RefList,
    RefSet,
    RefMap,
}

/// One declared attribute of a property type.
#[derive(Clone, Copy)]
pub(crate) struct AttrSpec {
    pub name: &'static str,
    pub kind: AttrKind,
}

impl AttrSpec {
    pub const fn literal(name: &'static str, default: fn() -> Value) -> Self {
        Self {
            name,
            kind: AttrKind::Literal(default),
        }
    }

    pub const fn reference(name: &'static str) -> Self {
        Self {
            name,
            kind: AttrKind::Ref,
        }
    }

    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            kind: AttrKind::RefList,
        }
    }

    pub const fn set(name: &'static str) -> Self {
        Self {
            name,
            kind: AttrKind::RefSet,
        }
    }

    pub const fn map(name: &'static str) -> Self {
        Self {
            name,
            kind: AttrKind::RefMap,
        }
    }
}

const COMMON_ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("name", || Value::Str(String::new())),
    AttrSpec::literal("extras", || Value::Null),
    AttrSpec::map("extensions"),
];

fn type_attrs(ty: PropertyType) -> &'static [AttrSpec] {
    use super::*;
    match ty {
        PropertyType::Root => root::ATTRS,
        PropertyType::Scene => scene::ATTRS,
        PropertyType::Node => node::ATTRS,
        PropertyType::Mesh => mesh::MESH_ATTRS,
        PropertyType::Primitive => mesh::PRIMITIVE_ATTRS,
        PropertyType::PrimitiveTarget => mesh::TARGET_ATTRS,
        PropertyType::Material => material::ATTRS,
        PropertyType::Texture => texture::TEXTURE_ATTRS,
        PropertyType::TextureInfo => texture::INFO_ATTRS,
        PropertyType::Accessor => accessor::ATTRS,
        PropertyType::Buffer => buffer::ATTRS,
        PropertyType::Animation => animation::ANIMATION_ATTRS,
        PropertyType::AnimationChannel => animation::CHANNEL_ATTRS,
        PropertyType::AnimationSampler => animation::SAMPLER_ATTRS,
        PropertyType::Skin => skin::ATTRS,
        PropertyType::Camera => camera::ATTRS,
        PropertyType::Extension(_) => &[],
    }
}

/// Create every declared attribute of `ty` on a fresh node.
pub(crate) fn init_attrs(graph: &mut Graph, id: NodeId, ty: PropertyType) {
    for spec in COMMON_ATTRS.iter().chain(type_attrs(ty)) {
        let slot = match spec.kind {
            AttrKind::Literal(default) => Slot::Value(default()),
            AttrKind::Ref => Slot::Ref(None),
            AttrKind::RefList => Slot::RefList(Vec::new()),
            AttrKind::RefSet => Slot::RefSet(Vec::new()),
            AttrKind::RefMap => Slot::RefMap(Default::default()),
        };
        graph.init_slot(id, spec.name, slot);
    }
}

// ============================================================================
// Traits
// ============================================================================

static NULL_JSON: serde_json::Value = serde_json::Value::Null;

/// A typed handle onto a property node of a [`Document`].
///
/// Handles are plain ids: getters borrow the document, setters take it
/// mutably. Using a handle with a document that did not create it is a
/// programming error; linking fails with [`Error::CrossGraph`].
pub trait Property: Copy + Eq + Hash + fmt::Debug {
    fn id(self) -> NodeId;

    #[doc(hidden)]
    fn from_id(id: NodeId) -> Self;

    /// True if nodes of type `ty` can be viewed through this handle.
    fn accepts(ty: PropertyType) -> bool;

    fn property_type(self, doc: &Document) -> PropertyType {
        PropertyType::from_label(doc.graph().node(self.id()).label())
    }

    fn name(self, doc: &Document) -> &str {
        doc.graph()
            .get(self.id(), "name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    fn set_name(self, doc: &mut Document, name: impl Into<String>) {
        doc.graph_mut().set(self.id(), "name", name.into());
    }

    /// Opaque user payload; `Null` when unset.
    fn extras(self, doc: &Document) -> &serde_json::Value {
        doc.graph()
            .get(self.id(), "extras")
            .and_then(Value::as_json)
            .unwrap_or(&NULL_JSON)
    }

    fn set_extras(self, doc: &mut Document, extras: serde_json::Value) {
        let value = if extras.is_null() {
            Value::Null
        } else {
            Value::Json(extras)
        };
        doc.graph_mut().set(self.id(), "extras", value);
    }

    fn is_disposed(self, doc: &Document) -> bool {
        doc.graph().is_disposed(self.id())
    }

    /// Release all inbound and outbound links. The root cannot be disposed.
    ///
    /// A morph target still held by a primitive is only released when the
    /// primitives of its mesh keep equal target counts.
    fn dispose(self, doc: &mut Document) -> Result<()> {
        if self.id() == doc.root().id() {
            tracing::warn!("ignoring attempt to dispose the document root");
            return Ok(());
        }
        check_release(doc, self.id())?;
        doc.graph_mut().dispose(self.id());
        Ok(())
    }

    /// Remove this property from every parent except the root.
    fn detach(self, doc: &mut Document) -> Result<()> {
        check_release(doc, self.id())?;
        doc.graph_mut()
            .disconnect_parents(self.id(), |_, parent| parent.label() != "Root");
        Ok(())
    }

    /// Distinct parents, the root included.
    fn list_parents(self, doc: &Document) -> Vec<PropertyRef> {
        let graph = doc.graph();
        graph
            .list_parents(self.id())
            .into_iter()
            .map(|id| PropertyRef::of(graph, id))
            .collect()
    }

    /// Short human-readable identity for messages.
    fn describe(self, doc: &Document) -> String {
        let label = doc.graph().node(self.id()).label();
        match self.name(doc) {
            "" => format!("{label} {}", self.id()),
            name => format!("{label} '{name}'"),
        }
    }

    /// Structural equality, possibly across documents.
    fn equals(self, doc: &Document, other: Self, other_doc: &Document) -> bool {
        self.equals_skipping(doc, other, other_doc, &[])
    }

    fn equals_skipping(self, doc: &Document, other: Self, other_doc: &Document, skip: &[&str]) -> bool {
        doc.graph()
            .deep_equals(self.id(), other_doc.graph(), other.id(), skip)
    }

    /// Overwrite this property with `other`'s content, sharing its children.
    fn copy(self, doc: &mut Document, other: Self) -> Result<()> {
        check_copyable(doc, other.id())?;
        let snapshot = doc.graph().snapshot(other.id());
        doc.graph_mut()
            .apply_snapshot(self.id(), &snapshot, &mut |id| Some(id))
    }

    /// Overwrite with `other` from another document, linking each referenced
    /// child to `resolve(child)`. Unresolved children are an error.
    fn copy_from(
        self,
        doc: &mut Document,
        source: &Document,
        other: Self,
        resolve: &mut dyn FnMut(NodeId) -> Option<NodeId>,
    ) -> Result<()> {
        check_copyable(source, other.id())?;
        let snapshot = source.graph().snapshot(other.id());
        doc.graph_mut().apply_snapshot(self.id(), &snapshot, resolve)
    }

    /// New property of the same type sharing this one's children.
    fn clone_property(self, doc: &mut Document) -> Result<Self> {
        check_copyable(doc, self.id())?;
        let ty = self.property_type(doc);
        let id = doc.create_raw(ty);
        let copy = Self::from_id(id);
        copy.copy(doc, self)?;
        Ok(copy)
    }
}

fn check_copyable(doc: &Document, id: NodeId) -> Result<()> {
    let ty = PropertyType::from_label(doc.graph().node(id).label());
    if ty.is_copyable() {
        Ok(())
    } else {
        Err(Error::NotCopyable(ty.label()))
    }
}

/// Properties that accept extension properties, keyed by extension name.
pub trait Extensible: Property {
    fn get_extension(self, doc: &Document, name: &str) -> Option<ExtensionProperty> {
        doc.graph()
            .get_ref_map(self.id(), "extensions", name)
            .map(ExtensionProperty::from_id)
    }

    /// Attach or remove an extension property.
    ///
    /// The extension must be registered with the document and must allow
    /// this property's type as a parent; otherwise nothing is changed. A
    /// replaced extension property is detached, not disposed.
    fn set_extension(self, doc: &mut Document, name: &str, ext: Option<ExtensionProperty>) -> Result<()> {
        if let Some(ext) = ext {
            doc.ensure_owned(ext.id())?;
            let ext_name = ext.extension_name(doc);
            if ext_name != name {
                return Err(Error::TypeMismatch {
                    expected: name.to_string(),
                    actual: ext_name.to_string(),
                });
            }
            let extension = doc
                .extension(name)
                .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
            let parent = self.property_type(doc);
            if !extension.parent_types().contains(&parent) {
                return Err(Error::InvalidParentType {
                    extension: name.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        doc.graph_mut().set_ref_map(
            self.id(),
            "extensions",
            name,
            ext.map(ExtensionProperty::id),
            LinkMeta::default(),
        )?;
        Ok(())
    }

    fn list_extensions(self, doc: &Document) -> Vec<ExtensionProperty> {
        doc.graph()
            .list_ref_map(self.id(), "extensions")
            .into_iter()
            .map(|(_, id)| ExtensionProperty::from_id(id))
            .collect()
    }
}

// ============================================================================
// Typed attribute helpers
// ============================================================================

pub(crate) fn get_f32(doc: &Document, id: NodeId, attr: &str, default: f32) -> f32 {
    doc.graph()
        .get(id, attr)
        .and_then(Value::as_float)
        .unwrap_or(default)
}

pub(crate) fn get_opt_f32(doc: &Document, id: NodeId, attr: &str) -> Option<f32> {
    doc.graph().get(id, attr).and_then(Value::as_float)
}

pub(crate) fn get_array<const N: usize>(doc: &Document, id: NodeId, attr: &str, default: [f32; N]) -> [f32; N] {
    doc.graph()
        .get(id, attr)
        .and_then(Value::as_floats)
        .and_then(|v| v.try_into().ok())
        .unwrap_or(default)
}

pub(crate) fn get_str<'a>(doc: &'a Document, id: NodeId, attr: &str) -> Option<&'a str> {
    doc.graph().get(id, attr).and_then(Value::as_str)
}

pub(crate) fn get_int(doc: &Document, id: NodeId, attr: &str) -> Option<i64> {
    doc.graph().get(id, attr).and_then(Value::as_int)
}

pub(crate) fn get_ref<P: Property>(doc: &Document, id: NodeId, attr: &str) -> Option<P> {
    doc.graph().get_ref(id, attr).map(P::from_id)
}

pub(crate) fn set_ref<P: Property>(
    doc: &mut Document,
    id: NodeId,
    attr: &'static str,
    child: Option<P>,
    meta: LinkMeta,
) -> Result<()> {
    doc.graph_mut()
        .set_ref(id, attr, child.map(Property::id), meta)?;
    Ok(())
}

pub(crate) fn list_refs<P: Property>(doc: &Document, id: NodeId, attr: &str) -> Vec<P> {
    doc.graph()
        .list_refs(id, attr)
        .into_iter()
        .map(P::from_id)
        .collect()
}

/// Parents of `id` reached through links named `attr` from nodes of type `P`.
/// Fails when unlinking `id` from its parents would break a mesh invariant.
fn check_release(doc: &Document, id: NodeId) -> Result<()> {
    if doc.graph().node(id).label() == PropertyType::PrimitiveTarget.label() {
        super::mesh::check_target_release(doc, super::PrimitiveTarget::from_id(id))?;
    }
    Ok(())
}

pub(crate) fn parents_via<P: Property>(doc: &Document, id: NodeId, attr: &str) -> Vec<P> {
    let graph = doc.graph();
    let mut out: Vec<P> = Vec::new();
    for link in graph.parent_links(id) {
        let ty = PropertyType::from_label(graph.node(link.parent()).label());
        if link.name() == attr && P::accepts(ty) {
            let p = P::from_id(link.parent());
            if !out.contains(&p) {
                out.push(p);
            }
        }
    }
    out
}
