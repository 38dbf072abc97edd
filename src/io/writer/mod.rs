//! Container writer: [`Document`] into a manifest plus resources, or GLB bytes.
//!
//! Writing runs `PlanLayout -> Materialize -> BuildManifest -> [Assemble]`.
//! Only properties reachable from the root are written.

mod materialize;
mod plan;

pub use materialize::{materialize, Materialized};
pub use plan::{plan_layout, AccessorPlan, BufferPlan, LayoutPlan, SparsePlan, ViewContent, ViewPlan};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use self::materialize::extras_of;
use super::context::{Dependencies, WriterContext};
use super::format::*;
use super::reader::{JsonDocument, GLB_BUFFER};
use super::schema::{self, Gltf};
use super::stream::ByteWriter;
use super::uri::{encode_data_uri, is_data_uri};
use crate::document::Document;
use crate::properties::*;
use crate::util::image::extension_for_mime;
use crate::util::{Error, Result};

/// MIME type of re-embedded `data:` buffers.
const BUFFER_MIME: &str = "application/octet-stream";

/// Writer settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterOptions {
    pub format: Format,
    pub vertex_layout: VertexLayout,
    /// Stem for generated resource names (`<basename>.bin`, `<basename>_1.png`)
    pub basename: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            format: Format::Glb,
            vertex_layout: VertexLayout::Interleaved,
            basename: "scene".to_string(),
        }
    }
}

impl WriterOptions {
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = layout;
        self
    }

    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = basename.into();
        self
    }
}

/// Writer phases, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritePhase {
    PlanLayout,
    Materialize,
    BuildManifest,
    Assemble,
}

fn enter(phase: WritePhase) {
    debug!(?phase, "write phase");
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Serialize `doc` into a manifest plus resources.
///
/// For [`Format::Glb`] the binary payload is stored under [`GLB_BUFFER`] and
/// the first buffer carries no URI.
pub fn write_document(doc: &Document, options: &WriterOptions, dependencies: Arc<Dependencies>) -> Result<JsonDocument> {
    enter(WritePhase::PlanLayout);
    let plan = plan_layout(doc, options)?;

    enter(WritePhase::Materialize);
    let bytes = materialize(doc, &plan)?;

    enter(WritePhase::BuildManifest);
    let mut manifest = Manifest {
        doc,
        options,
        plan: &plan,
        ctx: WriterContext::new(dependencies),
        gltf: Gltf::default(),
        resources: BTreeMap::new(),
        uris: HashSet::new(),
    };
    manifest.build(bytes)?;
    Ok(JsonDocument {
        json: manifest.gltf,
        resources: manifest.resources,
    })
}

/// Frame a manifest and binary payload as GLB.
pub fn assemble_glb(json: &Gltf, bin: Option<&[u8]>) -> Result<Vec<u8>> {
    enter(WritePhase::Assemble);
    let json = serde_json::to_vec(json)?;
    let json_len = pad4(json.len());
    let bin_len = bin.map_or(0, |b| pad4(b.len()));
    let mut total = HEADER_SIZE + CHUNK_HEADER_SIZE + json_len;
    if bin.is_some() {
        total += CHUNK_HEADER_SIZE + bin_len;
    }
    let length = u32::try_from(total).map_err(|_| Error::other(format!("GLB of {total} bytes exceeds 4 GiB")))?;

    let mut w = ByteWriter::with_capacity(total);
    w.write_u32(GLB_MAGIC);
    w.write_u32(GLB_VERSION);
    w.write_u32(length);

    w.write_u32(json_len as u32);
    w.write_u32(CHUNK_JSON);
    w.write_bytes(&json);
    w.align4(b' ');

    if let Some(bin) = bin {
        w.write_u32(bin_len as u32);
        w.write_u32(CHUNK_BIN);
        w.write_bytes(bin);
        w.align4(0);
    }
    Ok(w.into_inner())
}

/// Serialize `doc` as GLB bytes.
pub fn write_glb(doc: &Document, options: &WriterOptions, dependencies: Arc<Dependencies>) -> Result<Vec<u8>> {
    let options = WriterOptions {
        format: Format::Glb,
        ..options.clone()
    };
    let out = write_document(doc, &options, dependencies)?;
    assemble_glb(&out.json, out.resources.get(GLB_BUFFER).map(Vec::as_slice))
}

/// Manifest builder state.
struct Manifest<'a> {
    doc: &'a Document,
    options: &'a WriterOptions,
    plan: &'a LayoutPlan,
    ctx: WriterContext,
    gltf: Gltf,
    resources: BTreeMap<String, Vec<u8>>,
    uris: HashSet<String>,
}

impl Manifest<'_> {
    fn live<P: Property>(&self, list: Vec<P>) -> Vec<P> {
        list.into_iter().filter(|p| self.plan.is_reachable(*p)).collect()
    }

    /// A resource name not taken yet, preferring `preferred`.
    fn claim_uri(&mut self, preferred: Option<String>, fallback: impl Fn(usize) -> String) -> String {
        if let Some(uri) = preferred.filter(|u| !self.uris.contains(u)) {
            self.uris.insert(uri.clone());
            return uri;
        }
        let mut n = 0;
        loop {
            let uri = fallback(n);
            if self.uris.insert(uri.clone()) {
                return uri;
            }
            n += 1;
        }
    }

    fn extensions_of<P: Extensible>(&mut self, prop: P) -> Result<schema::Extensions> {
        let doc = self.doc;
        let mut out = schema::Extensions::new();
        for ext_prop in prop.list_extensions(doc) {
            let name = ext_prop.extension_name(doc);
            let Some(ext) = doc.extension(name) else {
                warn!(extension = name, "extension is not registered; not written");
                continue;
            };
            let json = ext.write(&mut self.ctx, doc, ext_prop)?;
            out.insert(name.to_string(), json);
            if !self.ctx.used.iter().any(|n| n == name) {
                self.ctx.used.push(name.to_string());
            }
        }
        Ok(out)
    }

    fn build(&mut self, bytes: Materialized) -> Result<()> {
        let doc = self.doc;
        let root = doc.root();

        let asset = root.asset(doc);
        self.gltf.asset = schema::Asset {
            version: asset.version,
            generator: asset.generator,
            copyright: asset.copyright,
            min_version: asset.min_version,
            extras: None,
        };

        self.write_buffers(bytes.buffers)?;
        self.gltf.buffer_views = bytes.views;
        self.gltf.accessors = bytes.accessors;
        let plan = self.plan;
        for (i, p) in plan.accessors.iter().enumerate() {
            self.ctx.accessors.insert(p.accessor.id(), i);
            self.gltf.accessors[i].extensions = self.extensions_of(p.accessor)?;
        }

        self.write_images()?;

        // Index tables first; properties refer to each other in every direction.
        let materials = self.live(root.list_materials(doc));
        let meshes = self.live(root.list_meshes(doc));
        let cameras = self.live(root.list_cameras(doc));
        let nodes = self.live(root.list_nodes(doc));
        let skins = self.live(root.list_skins(doc));
        for (i, m) in materials.iter().enumerate() {
            self.ctx.materials.insert(m.id(), i);
        }
        for (i, m) in meshes.iter().enumerate() {
            self.ctx.meshes.insert(m.id(), i);
        }
        for (i, c) in cameras.iter().enumerate() {
            self.ctx.cameras.insert(c.id(), i);
        }
        for (i, n) in nodes.iter().enumerate() {
            self.ctx.nodes.insert(n.id(), i);
        }
        for (i, s) in skins.iter().enumerate() {
            self.ctx.skins.insert(s.id(), i);
        }

        for m in materials {
            let material = self.write_material(m)?;
            self.gltf.materials.push(material);
        }
        for m in meshes {
            let mesh = self.write_mesh(m)?;
            self.gltf.meshes.push(mesh);
        }
        for c in cameras {
            let camera = self.write_camera(c)?;
            self.gltf.cameras.push(camera);
        }
        for n in nodes {
            let node = self.write_node(n)?;
            self.gltf.nodes.push(node);
        }
        for s in skins {
            let skin = self.write_skin(s)?;
            self.gltf.skins.push(skin);
        }
        for a in self.live(root.list_animations(doc)) {
            let animation = self.write_animation(a)?;
            self.gltf.animations.push(animation);
        }
        let scenes = self.live(root.list_scenes(doc));
        for &s in &scenes {
            let scene = schema::Scene {
                name: non_empty(s.name(doc)),
                nodes: s
                    .list_children(doc)
                    .into_iter()
                    .filter_map(|n| self.ctx.node_index(n))
                    .collect(),
                extensions: self.extensions_of(s)?,
                extras: extras_of(doc, s),
            };
            self.gltf.scenes.push(scene);
        }
        self.gltf.scene = root
            .default_scene(doc)
            .and_then(|d| scenes.iter().position(|s| *s == d));

        self.write_textures()?;
        self.gltf.extensions = self.extensions_of(root)?;
        self.gltf.extras = extras_of(doc, root);

        let mut used = self.ctx.used.clone();
        used.sort();
        self.gltf.extensions_required = used
            .iter()
            .filter(|n| doc.is_extension_required(n))
            .cloned()
            .collect();
        self.gltf.extensions_used = used;
        debug!(
            nodes = self.gltf.nodes.len(),
            meshes = self.gltf.meshes.len(),
            accessors = self.gltf.accessors.len(),
            resources = self.resources.len(),
            "manifest built"
        );
        Ok(())
    }

    fn write_buffers(&mut self, data: Vec<Vec<u8>>) -> Result<()> {
        let doc = self.doc;
        let basename = self.options.basename.clone();
        let plans = self.plan;
        for (i, (plan, bytes)) in plans.buffers.iter().zip(data).enumerate() {
            let mut buffer = schema::Buffer {
                byte_length: bytes.len(),
                ..Default::default()
            };
            if let Some(b) = plan.buffer {
                buffer.name = non_empty(b.name(doc));
                buffer.extensions = self.extensions_of(b)?;
                buffer.extras = extras_of(doc, b);
            }
            let embedded = plan.buffer.and_then(|b| b.uri(doc)).is_some_and(is_data_uri);
            if self.options.format == Format::Glb && i == 0 {
                self.resources.insert(GLB_BUFFER.to_string(), bytes);
            } else if embedded {
                buffer.uri = Some(encode_data_uri(BUFFER_MIME, &bytes));
            } else {
                let preferred = plan
                    .buffer
                    .and_then(|b| b.uri(doc).filter(|u| !is_data_uri(u)).map(str::to_string))
                    .or_else(|| buffer.name.as_ref().map(|n| format!("{n}.bin")));
                let uri = self.claim_uri(preferred, |n| match n {
                    0 => format!("{basename}.bin"),
                    n => format!("{basename}_{n}.bin"),
                });
                self.resources.insert(uri.clone(), bytes);
                buffer.uri = Some(uri);
            }
            self.gltf.buffers.push(buffer);
        }
        Ok(())
    }

    fn write_images(&mut self) -> Result<()> {
        let doc = self.doc;
        let basename = self.options.basename.clone();
        let plan = self.plan;
        for (i, &(texture, view)) in plan.images.iter().enumerate() {
            let mime = texture.mime_type(doc).to_string();
            let mut image = schema::Image {
                name: non_empty(texture.name(doc)),
                buffer_view: view,
                extras: extras_of(doc, texture),
                ..Default::default()
            };
            if view.is_none() {
                let ext = extension_for_mime(&mime);
                let preferred = texture
                    .uri(doc)
                    .filter(|u| !is_data_uri(u))
                    .map(str::to_string)
                    .or_else(|| image.name.as_ref().map(|n| format!("{n}.{ext}")));
                let uri = self.claim_uri(preferred, |n| format!("{basename}_{}.{ext}", i + n));
                self.resources.insert(uri.clone(), texture.image(doc).to_vec());
                image.uri = Some(uri);
            }
            image.mime_type = non_empty(&mime);
            self.ctx.images.insert(texture.id(), i);
            self.gltf.images.push(image);
        }
        Ok(())
    }

    /// Manifest textures are created on demand by material slots; attach the
    /// image-level extensions once they all exist.
    fn write_textures(&mut self) -> Result<()> {
        let sources: Vec<Option<usize>> = self.ctx.textures.iter().map(|t| t.source).collect();
        for (i, source) in sources.into_iter().enumerate() {
            let Some(&(texture, _)) = source.and_then(|s| self.plan.images.get(s)) else {
                continue;
            };
            self.ctx.textures[i].extensions = self.extensions_of(texture)?;
        }
        self.gltf.samplers = self.ctx.samplers.clone();
        self.gltf.textures = self.ctx.textures.clone();
        Ok(())
    }

    fn texture_ref(&mut self, material: Material, slot: TextureSlot) -> Result<Option<schema::TextureInfo>> {
        let doc = self.doc;
        let Some(texture) = material.texture(doc, slot) else {
            return Ok(None);
        };
        if !self.plan.is_reachable(texture) {
            return Ok(None);
        }
        let info = material.texture_info(doc, slot);
        let mut out = self.ctx.texture_info(doc, texture, info)?;
        if let Some(info) = info {
            out.extensions = self.extensions_of(info)?;
            out.extras = extras_of(doc, info);
        }
        Ok(Some(out))
    }

    fn write_material(&mut self, m: Material) -> Result<schema::Material> {
        let doc = self.doc;
        let base_color = m.base_color_factor(doc);
        let metallic = m.metallic_factor(doc);
        let roughness = m.roughness_factor(doc);
        let pbr = schema::PbrMetallicRoughness {
            base_color_factor: (base_color != [1.0; 4]).then_some(base_color),
            base_color_texture: self.texture_ref(m, TextureSlot::BaseColor)?,
            metallic_factor: (metallic != 1.0).then_some(metallic),
            roughness_factor: (roughness != 1.0).then_some(roughness),
            metallic_roughness_texture: self.texture_ref(m, TextureSlot::MetallicRoughness)?,
        };

        let mut normal = self.texture_ref(m, TextureSlot::Normal)?;
        if let Some(info) = normal.as_mut() {
            let scale = m.normal_scale(doc);
            info.scale = (scale != 1.0).then_some(scale);
        }
        let mut occlusion = self.texture_ref(m, TextureSlot::Occlusion)?;
        if let Some(info) = occlusion.as_mut() {
            let strength = m.occlusion_strength(doc);
            info.strength = (strength != 1.0).then_some(strength);
        }
        let emissive = m.emissive_factor(doc);
        let alpha_mode = m.alpha_mode(doc);

        Ok(schema::Material {
            name: non_empty(m.name(doc)),
            pbr_metallic_roughness: Some(pbr),
            normal_texture: normal,
            occlusion_texture: occlusion,
            emissive_texture: self.texture_ref(m, TextureSlot::Emissive)?,
            emissive_factor: (emissive != [0.0; 3]).then_some(emissive),
            alpha_mode: (alpha_mode != AlphaMode::Opaque).then(|| alpha_mode.name().to_string()),
            alpha_cutoff: (alpha_mode == AlphaMode::Mask).then(|| m.alpha_cutoff(doc)),
            double_sided: m.double_sided(doc),
            extensions: self.extensions_of(m)?,
            extras: extras_of(doc, m),
        })
    }

    fn accessor_index(&self, accessor: Accessor) -> Result<usize> {
        self.ctx
            .accessor_index(accessor)
            .ok_or_else(|| Error::invalid(format!("{} is not in the document root", accessor.describe(self.doc))))
    }

    fn attribute_map(&self, attributes: Vec<(String, Accessor)>) -> Result<BTreeMap<String, usize>> {
        attributes
            .into_iter()
            .map(|(semantic, a)| Ok((semantic, self.accessor_index(a)?)))
            .collect()
    }

    fn write_mesh(&mut self, mesh: Mesh) -> Result<schema::Mesh> {
        let doc = self.doc;
        let mut primitives = Vec::new();
        for prim in mesh.list_primitives(doc) {
            let mode = prim.mode(doc);
            let mut targets = Vec::new();
            for target in prim.list_targets(doc) {
                targets.push(self.attribute_map(target.list_attributes(doc))?);
            }
            primitives.push(schema::Primitive {
                attributes: self.attribute_map(prim.list_attributes(doc))?,
                indices: prim.indices(doc).map(|a| self.accessor_index(a)).transpose()?,
                material: prim.material(doc).and_then(|m| self.ctx.material_index(m)),
                mode: (mode != PrimitiveMode::Triangles).then_some(mode as u32),
                targets,
                extensions: self.extensions_of(prim)?,
                extras: extras_of(doc, prim),
            });
        }
        let weights = mesh.weights(doc);
        Ok(schema::Mesh {
            name: non_empty(mesh.name(doc)),
            primitives,
            weights: (!weights.is_empty()).then_some(weights),
            extensions: self.extensions_of(mesh)?,
            extras: extras_of(doc, mesh),
        })
    }

    fn write_camera(&mut self, camera: Camera) -> Result<schema::Camera> {
        let doc = self.doc;
        let ty = camera.camera_type(doc);
        let mut out = schema::Camera {
            name: non_empty(camera.name(doc)),
            camera_type: ty.name().to_string(),
            extensions: self.extensions_of(camera)?,
            extras: extras_of(doc, camera),
            ..Default::default()
        };
        match ty {
            CameraType::Perspective => {
                out.perspective = Some(schema::Perspective {
                    aspect_ratio: camera.aspect_ratio(doc),
                    yfov: camera.yfov(doc),
                    zfar: camera.zfar(doc),
                    znear: camera.znear(doc),
                })
            }
            CameraType::Orthographic => {
                let zfar = camera
                    .zfar(doc)
                    .ok_or_else(|| Error::invalid(format!("{}: orthographic camera needs zfar", camera.describe(doc))))?;
                out.orthographic = Some(schema::Orthographic {
                    xmag: camera.xmag(doc),
                    ymag: camera.ymag(doc),
                    zfar,
                    znear: camera.znear(doc),
                })
            }
        }
        Ok(out)
    }

    fn write_node(&mut self, node: Node) -> Result<schema::Node> {
        let doc = self.doc;
        let t = node.translation(doc);
        let r = node.rotation(doc);
        let s = node.scale(doc);
        let weights = node.weights(doc);
        Ok(schema::Node {
            name: non_empty(node.name(doc)),
            children: node
                .list_children(doc)
                .into_iter()
                .filter_map(|c| self.ctx.node_index(c))
                .collect(),
            mesh: node.mesh(doc).and_then(|m| self.ctx.meshes.get(&m.id()).copied()),
            camera: node.camera(doc).and_then(|c| self.ctx.cameras.get(&c.id()).copied()),
            skin: node.skin(doc).and_then(|s| self.ctx.skins.get(&s.id()).copied()),
            matrix: None,
            translation: (t != [0.0; 3]).then_some(t),
            rotation: (r != [0.0, 0.0, 0.0, 1.0]).then_some(r),
            scale: (s != [1.0; 3]).then_some(s),
            weights: (!weights.is_empty()).then_some(weights),
            extensions: self.extensions_of(node)?,
            extras: extras_of(doc, node),
        })
    }

    fn write_skin(&mut self, skin: Skin) -> Result<schema::Skin> {
        let doc = self.doc;
        let joints = skin
            .list_joints(doc)
            .into_iter()
            .map(|j| {
                self.ctx
                    .node_index(j)
                    .ok_or_else(|| Error::invalid(format!("skin joint {} is not written", j.describe(doc))))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(schema::Skin {
            name: non_empty(skin.name(doc)),
            inverse_bind_matrices: skin
                .inverse_bind_matrices(doc)
                .map(|a| self.accessor_index(a))
                .transpose()?,
            skeleton: skin.skeleton(doc).and_then(|n| self.ctx.node_index(n)),
            joints,
            extensions: self.extensions_of(skin)?,
            extras: extras_of(doc, skin),
        })
    }

    fn write_animation(&mut self, animation: Animation) -> Result<schema::Animation> {
        let doc = self.doc;
        let samplers = animation.list_samplers(doc);
        let mut out = schema::Animation {
            name: non_empty(animation.name(doc)),
            extras: extras_of(doc, animation),
            ..Default::default()
        };
        for &sampler in &samplers {
            let (Some(input), Some(output)) = (sampler.input(doc), sampler.output(doc)) else {
                return Err(Error::invalid(format!("{} lacks input or output", sampler.describe(doc))));
            };
            out.samplers.push(schema::AnimationSampler {
                input: self.accessor_index(input)?,
                output: self.accessor_index(output)?,
                interpolation: Some(sampler.interpolation(doc))
                    .filter(|i| *i != Interpolation::Linear)
                    .map(|i| i.name().to_string()),
                extensions: self.extensions_of(sampler)?,
                extras: extras_of(doc, sampler),
            });
        }
        for channel in animation.list_channels(doc) {
            let Some(path) = channel.target_path(doc) else {
                warn!(channel = %channel.describe(doc), "channel without target path skipped");
                continue;
            };
            let sampler = channel
                .sampler(doc)
                .and_then(|s| samplers.iter().position(|x| *x == s))
                .ok_or_else(|| Error::invalid(format!("{} has no sampler in its animation", channel.describe(doc))))?;
            out.channels.push(schema::AnimationChannel {
                sampler,
                target: schema::AnimationTarget {
                    node: channel.target_node(doc).and_then(|n| self.ctx.node_index(n)),
                    path: path.name().to_string(),
                },
                extensions: self.extensions_of(channel)?,
                extras: extras_of(doc, channel),
            });
        }
        out.extensions = self.extensions_of(animation)?;
        Ok(out)
    }
}
