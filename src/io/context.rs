//! Index tables shared with extensions while reading and writing.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::schema;
use crate::document::Document;
use crate::graph::NodeId;
use crate::properties::*;
use crate::util::{Error, Result};

/// External modules handed to extensions (encoders, decoders), by name.
pub type Dependencies = HashMap<String, Arc<dyn Any + Send + Sync>>;

fn lookup<T: Copy>(items: &[T], index: usize, kind: &'static str) -> Result<T> {
    items
        .get(index)
        .copied()
        .ok_or_else(|| Error::out_of_range(kind, index, items.len()))
}

/// Manifest index to property tables built while reading.
#[derive(Default)]
pub struct ReaderContext {
    pub(crate) accessors: Vec<Accessor>,
    pub(crate) buffers: Vec<Buffer>,
    /// Manifest texture index to image-backed texture
    pub(crate) textures: Vec<Option<Texture>>,
    pub(crate) images: Vec<Texture>,
    pub(crate) samplers: Vec<schema::Sampler>,
    pub(crate) texture_samplers: Vec<Option<usize>>,
    pub(crate) materials: Vec<Material>,
    pub(crate) meshes: Vec<Mesh>,
    pub(crate) primitives: Vec<Vec<Primitive>>,
    pub(crate) cameras: Vec<Camera>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) skins: Vec<Skin>,
    pub(crate) animations: Vec<Animation>,
    pub(crate) scenes: Vec<Scene>,
    pub(crate) texture_infos: Vec<(TextureInfo, schema::Extensions)>,
    pub(crate) dependencies: Arc<Dependencies>,
}

impl ReaderContext {
    pub(crate) fn new(dependencies: Arc<Dependencies>) -> Self {
        Self {
            dependencies,
            ..Default::default()
        }
    }

    pub fn accessor(&self, index: usize) -> Result<Accessor> {
        lookup(&self.accessors, index, "accessor")
    }

    pub fn node(&self, index: usize) -> Result<Node> {
        lookup(&self.nodes, index, "node")
    }

    pub fn material(&self, index: usize) -> Result<Material> {
        lookup(&self.materials, index, "material")
    }

    /// Texture behind a manifest texture index; `None` when it has no
    /// image source.
    pub fn texture(&self, index: usize) -> Result<Option<Texture>> {
        lookup(&self.textures, index, "texture")
    }

    /// Copy texCoord and the texture's sampler settings onto `info`.
    pub fn apply_texture_info(&self, doc: &mut Document, info: TextureInfo, json: &schema::TextureInfo) -> Result<()> {
        info.set_tex_coord(doc, json.tex_coord);
        let sampler = lookup(&self.texture_samplers, json.index, "texture")?;
        if let Some(index) = sampler {
            let sampler = self
                .samplers
                .get(index)
                .ok_or_else(|| Error::out_of_range("sampler", index, self.samplers.len()))?;
            info.set_mag_filter(doc, sampler.mag_filter);
            info.set_min_filter(doc, sampler.min_filter);
            if let Some(mode) = sampler.wrap_s.and_then(WrapMode::from_gl_enum) {
                info.set_wrap_s(doc, mode);
            }
            if let Some(mode) = sampler.wrap_t.and_then(WrapMode::from_gl_enum) {
                info.set_wrap_t(doc, mode);
            }
        }
        Ok(())
    }

    /// Registered dependency downcast to `T`.
    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.dependencies.get(name)?.downcast_ref()
    }
}

/// Property to manifest index tables used while writing.
#[derive(Default)]
pub struct WriterContext {
    pub(crate) accessors: HashMap<NodeId, usize>,
    pub(crate) images: HashMap<NodeId, usize>,
    pub(crate) materials: HashMap<NodeId, usize>,
    pub(crate) meshes: HashMap<NodeId, usize>,
    pub(crate) cameras: HashMap<NodeId, usize>,
    pub(crate) nodes: HashMap<NodeId, usize>,
    pub(crate) skins: HashMap<NodeId, usize>,
    /// Deduplicated samplers
    pub(crate) samplers: Vec<schema::Sampler>,
    /// One manifest texture per (image, sampler) pair
    pub(crate) textures: Vec<schema::Texture>,
    pub(crate) texture_keys: HashMap<(usize, Option<usize>), usize>,
    /// Extension names written at least once
    pub(crate) used: Vec<String>,
    pub(crate) dependencies: Arc<Dependencies>,
}

impl WriterContext {
    pub(crate) fn new(dependencies: Arc<Dependencies>) -> Self {
        Self {
            dependencies,
            ..Default::default()
        }
    }

    pub fn accessor_index(&self, accessor: Accessor) -> Option<usize> {
        self.accessors.get(&accessor.id()).copied()
    }

    pub fn node_index(&self, node: Node) -> Option<usize> {
        self.nodes.get(&node.id()).copied()
    }

    pub fn material_index(&self, material: Material) -> Option<usize> {
        self.materials.get(&material.id()).copied()
    }

    fn sampler_index(&mut self, doc: &Document, info: TextureInfo) -> Option<usize> {
        let wrap = |m: WrapMode| (m != WrapMode::Repeat).then_some(m as u32);
        let sampler = schema::Sampler {
            mag_filter: info.mag_filter(doc),
            min_filter: info.min_filter(doc),
            wrap_s: wrap(info.wrap_s(doc)),
            wrap_t: wrap(info.wrap_t(doc)),
        };
        if sampler == schema::Sampler::default() {
            return None;
        }
        if let Some(i) = self.samplers.iter().position(|s| *s == sampler) {
            return Some(i);
        }
        self.samplers.push(sampler);
        Some(self.samplers.len() - 1)
    }

    /// Manifest texture reference for `texture` sampled through `info`.
    ///
    /// Textures and samplers are shared between use sites with equal
    /// settings.
    pub fn texture_info(&mut self, doc: &Document, texture: Texture, info: Option<TextureInfo>) -> Result<schema::TextureInfo> {
        let image = *self
            .images
            .get(&texture.id())
            .ok_or_else(|| Error::invalid(format!("{} was not written", texture.describe(doc))))?;
        let sampler = info.and_then(|i| self.sampler_index(doc, i));
        let index = match self.texture_keys.get(&(image, sampler)) {
            Some(i) => *i,
            None => {
                self.textures.push(schema::Texture {
                    sampler,
                    source: Some(image),
                    ..Default::default()
                });
                let i = self.textures.len() - 1;
                self.texture_keys.insert((image, sampler), i);
                i
            }
        };
        Ok(schema::TextureInfo {
            index,
            tex_coord: info.map_or(0, |i| i.tex_coord(doc)),
            ..Default::default()
        })
    }

    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.dependencies.get(name)?.downcast_ref()
    }
}
