//! Document root: top-level collections and asset metadata.

use super::property::{get_ref, get_str, list_refs, set_ref, AttrSpec};
use super::{
    Accessor, Animation, Buffer, Camera, Material, Mesh, Node, PropertyType, Scene, Skin, Texture,
};
use crate::document::Document;
use crate::graph::{LinkMeta, Value};
use crate::util::Result;

property_handle!(
    /// The single entry point of a document.
    ///
    /// Every written property is reachable from here; properties created by
    /// the document factories are added to the matching collection.
    Root => PropertyType::Root
);

pub(crate) const ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("version", || Value::from("2.0")),
    AttrSpec::literal("generator", || Value::from(default_generator())),
    AttrSpec::literal("copyright", || Value::Null),
    AttrSpec::literal("minVersion", || Value::Null),
    AttrSpec::reference("scene"),
    AttrSpec::set("scenes"),
    AttrSpec::set("nodes"),
    AttrSpec::set("meshes"),
    AttrSpec::set("materials"),
    AttrSpec::set("textures"),
    AttrSpec::set("accessors"),
    AttrSpec::set("buffers"),
    AttrSpec::set("animations"),
    AttrSpec::set("skins"),
    AttrSpec::set("cameras"),
];

/// Root collections, in manifest order.
pub(crate) const COLLECTIONS: [&str; 10] = [
    "scenes",
    "nodes",
    "meshes",
    "materials",
    "textures",
    "accessors",
    "buffers",
    "animations",
    "skins",
    "cameras",
];

/// Generator string stamped on new documents.
pub fn default_generator() -> String {
    format!(
        "gltf-graph v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GLTF_GRAPH_BUILD_DATE")
    )
}

/// Asset record of the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub version: String,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub min_version: Option<String>,
}

impl Root {
    pub fn asset(self, doc: &Document) -> Asset {
        let s = |attr: &str| get_str(doc, self.0, attr).map(str::to_string);
        Asset {
            version: s("version").unwrap_or_else(|| "2.0".to_string()),
            generator: s("generator"),
            copyright: s("copyright"),
            min_version: s("minVersion"),
        }
    }

    pub fn set_asset(self, doc: &mut Document, asset: &Asset) {
        let g = doc.graph_mut();
        g.set(self.0, "version", asset.version.as_str());
        g.set(self.0, "generator", asset.generator.clone());
        g.set(self.0, "copyright", asset.copyright.clone());
        g.set(self.0, "minVersion", asset.min_version.clone());
    }

    pub fn set_generator(self, doc: &mut Document, generator: impl Into<String>) {
        doc.graph_mut().set(self.0, "generator", generator.into());
    }

    pub fn set_copyright(self, doc: &mut Document, copyright: Option<String>) {
        doc.graph_mut().set(self.0, "copyright", copyright);
    }

    /// Scene shown when the asset is opened.
    pub fn default_scene(self, doc: &Document) -> Option<Scene> {
        get_ref(doc, self.0, "scene")
    }

    pub fn set_default_scene(self, doc: &mut Document, scene: Option<Scene>) -> Result<()> {
        set_ref(doc, self.0, "scene", scene, LinkMeta::default())
    }

    pub fn list_scenes(self, doc: &Document) -> Vec<Scene> {
        list_refs(doc, self.0, "scenes")
    }

    pub fn list_nodes(self, doc: &Document) -> Vec<Node> {
        list_refs(doc, self.0, "nodes")
    }

    pub fn list_meshes(self, doc: &Document) -> Vec<Mesh> {
        list_refs(doc, self.0, "meshes")
    }

    pub fn list_materials(self, doc: &Document) -> Vec<Material> {
        list_refs(doc, self.0, "materials")
    }

    pub fn list_textures(self, doc: &Document) -> Vec<Texture> {
        list_refs(doc, self.0, "textures")
    }

    pub fn list_accessors(self, doc: &Document) -> Vec<Accessor> {
        list_refs(doc, self.0, "accessors")
    }

    pub fn list_buffers(self, doc: &Document) -> Vec<Buffer> {
        list_refs(doc, self.0, "buffers")
    }

    pub fn list_animations(self, doc: &Document) -> Vec<Animation> {
        list_refs(doc, self.0, "animations")
    }

    pub fn list_skins(self, doc: &Document) -> Vec<Skin> {
        list_refs(doc, self.0, "skins")
    }

    pub fn list_cameras(self, doc: &Document) -> Vec<Camera> {
        list_refs(doc, self.0, "cameras")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Property;

    #[test]
    fn test_default_asset() {
        let doc = Document::new();
        let asset = doc.root().asset(&doc);
        assert_eq!(asset.version, "2.0");
        assert!(asset.generator.unwrap().starts_with("gltf-graph"));
        assert!(asset.copyright.is_none());
    }

    #[test]
    fn test_factories_populate_collections() {
        let mut doc = Document::new();
        let scene = doc.create_scene("main");
        let mesh = doc.create_mesh("m");
        let root = doc.root();
        assert_eq!(root.list_scenes(&doc), vec![scene]);
        assert_eq!(root.list_meshes(&doc), vec![mesh]);

        root.set_default_scene(&mut doc, Some(scene)).unwrap();
        assert_eq!(root.default_scene(&doc), Some(scene));
    }

    #[test]
    fn test_root_is_not_copyable() {
        let mut doc = Document::new();
        let root = doc.root();
        let err = root.clone_property(&mut doc).unwrap_err();
        assert!(matches!(err, crate::Error::NotCopyable("Root")));
    }
}
