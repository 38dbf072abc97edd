//! Container reader: GLB bytes or a JSON manifest with resources into a
//! [`Document`].
//!
//! Reading runs in phases, each logged at `debug` level:
//!
//! ```text
//! ReadHeader -> ReadJsonChunk -> [ReadBinChunk] -> ResolveBuffers
//!            -> ReconstructGraph -> ResolveExtensions -> Done
//! ```
//!
//! Malformed input fails with a structural [`Error`] (see
//! [`Error::is_structural`]); nothing is partially returned.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value as Json;
use tracing::{debug, warn};

use super::context::{Dependencies, ReaderContext};
use super::format::*;
use super::schema::{self, Gltf};
use super::stream::ByteReader;
use super::uri::{decode_data_uri, decode_uri_path, is_data_uri};
use crate::document::Document;
use crate::extensions::Extension;
use crate::properties::*;
use crate::util::{ComponentType, ElementType, Error, Mat4, Result, TypedArray};

/// Resource key of the GLB binary chunk.
pub const GLB_BUFFER: &str = "@glb.bin";

/// A parsed manifest plus the external resources it refers to, keyed by URI.
///
/// The GLB binary chunk is stored under [`GLB_BUFFER`].
#[derive(Clone, Debug, Default)]
pub struct JsonDocument {
    pub json: Gltf,
    pub resources: BTreeMap<String, Vec<u8>>,
}

impl JsonDocument {
    /// Resource for `uri`, trying the percent-decoded form as well.
    pub fn resource(&self, uri: &str) -> Option<&[u8]> {
        self.resources
            .get(uri)
            .or_else(|| self.resources.get(&decode_uri_path(uri)))
            .map(Vec::as_slice)
    }
}

/// Reader phases, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadPhase {
    ReadHeader,
    ReadJsonChunk,
    ReadBinChunk,
    ResolveBuffers,
    ReconstructGraph,
    ResolveExtensions,
    Done,
}

fn enter(phase: ReadPhase) {
    debug!(?phase, "read phase");
}

/// Split a GLB container into its manifest and binary chunk.
pub fn parse_glb(data: &[u8]) -> Result<JsonDocument> {
    enter(ReadPhase::ReadHeader);
    if data.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    let mut header = ByteReader::new(data);
    if header.read_u32()? != GLB_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = header.read_u32()?;
    if version != GLB_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let length = header.read_u32()? as usize;
    if length > data.len() {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    if length < HEADER_SIZE {
        return Err(Error::invalid(format!("GLB length {length} is shorter than its header")));
    }

    let mut r = ByteReader::new(&data[HEADER_SIZE..length]);
    enter(ReadPhase::ReadJsonChunk);
    if r.remaining() < CHUNK_HEADER_SIZE {
        return Err(Error::MissingChunk("JSON"));
    }
    let json_len = r.read_u32()? as usize;
    if r.read_u32()? != CHUNK_JSON {
        return Err(Error::MissingChunk("JSON"));
    }
    let json: Gltf = serde_json::from_slice(r.read_bytes(json_len)?)?;
    r.align4();

    let mut resources = BTreeMap::new();
    while r.remaining() >= CHUNK_HEADER_SIZE {
        let chunk_len = r.read_u32()? as usize;
        let chunk_type = r.read_u32()?;
        let chunk = r.read_bytes(chunk_len)?;
        r.align4();
        match chunk_type {
            CHUNK_BIN => {
                enter(ReadPhase::ReadBinChunk);
                if resources.contains_key(GLB_BUFFER) {
                    return Err(Error::invalid("GLB has more than one BIN chunk"));
                }
                resources.insert(GLB_BUFFER.to_string(), chunk.to_vec());
            }
            CHUNK_JSON => return Err(Error::invalid("GLB has more than one JSON chunk")),
            other => debug!(chunk_type = other, len = chunk_len, "skipping unknown GLB chunk"),
        }
    }
    Ok(JsonDocument { json, resources })
}

/// Rebuild a document from a manifest and its resources.
pub fn read_document(
    input: &JsonDocument,
    extensions: &[Arc<dyn Extension>],
    dependencies: Arc<Dependencies>,
) -> Result<Document> {
    let json = &input.json;
    let mut doc = Document::new();
    let mut ctx = ReaderContext::new(dependencies);

    register_extensions(&mut doc, json, extensions)?;

    enter(ReadPhase::ResolveBuffers);
    let source = Source::new(input)?;

    enter(ReadPhase::ReconstructGraph);
    let root = doc.root();
    root.set_asset(
        &mut doc,
        &Asset {
            version: json.asset.version.clone(),
            generator: json.asset.generator.clone(),
            copyright: json.asset.copyright.clone(),
            min_version: json.asset.min_version.clone(),
        },
    );
    set_extras(&mut doc, root, &json.extras);

    source.read_buffers(&mut doc, &mut ctx)?;
    source.read_accessors(&mut doc, &mut ctx)?;
    source.read_textures(&mut doc, &mut ctx)?;
    source.read_materials(&mut doc, &mut ctx)?;
    source.read_meshes(&mut doc, &mut ctx)?;
    source.read_cameras(&mut doc, &mut ctx)?;
    source.read_nodes(&mut doc, &mut ctx)?;
    source.read_skins(&mut doc, &mut ctx)?;
    source.read_animations(&mut doc, &mut ctx)?;
    source.read_scenes(&mut doc, &mut ctx)?;

    enter(ReadPhase::ResolveExtensions);
    source.read_extensions(&mut doc, &ctx)?;

    enter(ReadPhase::Done);
    debug!(
        nodes = ctx.nodes.len(),
        meshes = ctx.meshes.len(),
        accessors = ctx.accessors.len(),
        textures = ctx.images.len(),
        "read complete"
    );
    Ok(doc)
}

/// Check required extensions and register the used ones with `doc`.
fn register_extensions(doc: &mut Document, json: &Gltf, extensions: &[Arc<dyn Extension>]) -> Result<()> {
    let known: HashMap<&str, &Arc<dyn Extension>> = extensions.iter().map(|e| (e.name(), e)).collect();
    for name in &json.extensions_required {
        if !known.contains_key(name.as_str()) {
            return Err(Error::UnsupportedExtension(name.clone()));
        }
    }
    for name in &json.extensions_used {
        match known.get(name.as_str()) {
            Some(ext) => {
                doc.register_extension(Arc::clone(ext));
                if json.extensions_required.contains(name) {
                    doc.set_extension_required(name, true)?;
                }
            }
            None => warn!(extension = %name, "unsupported extension; its data is dropped"),
        }
    }
    Ok(())
}

fn set_extras<P: Property>(doc: &mut Document, prop: P, extras: &Option<Json>) {
    if let Some(extras) = extras {
        prop.set_extras(doc, extras.clone());
    }
}

fn name_of(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or("")
}

fn lookup<T: Copy>(items: &[T], index: usize, kind: &'static str) -> Result<T> {
    items
        .get(index)
        .copied()
        .ok_or_else(|| Error::out_of_range(kind, index, items.len()))
}

/// Largest zero-filled array an accessor without a buffer view may declare.
const MAX_IMPLICIT_BYTES: usize = 1 << 30;

fn overflow(what: &str, count: usize) -> Error {
    Error::invalid(format!("{what} with {count} elements overflows its byte range"))
}

/// Copy `count` elements out of a (possibly strided) view into a dense array.
fn gather(
    bytes: &[u8],
    offset: usize,
    stride: Option<usize>,
    count: usize,
    component: ComponentType,
    ty: ElementType,
) -> Result<TypedArray> {
    let size = ty.num_components();
    if count == 0 {
        return Ok(TypedArray::zeros(component, 0));
    }
    let element = ty.padded_num_bytes(component);
    let stride = stride.unwrap_or(element);
    let needed = stride
        .checked_mul(count - 1)
        .and_then(|n| n.checked_add(offset))
        .and_then(|n| n.checked_add(element))
        .ok_or_else(|| overflow("accessor", count))?;
    if needed > bytes.len() {
        return Err(Error::invalid(format!(
            "accessor needs {needed} bytes but its view holds {}",
            bytes.len()
        )));
    }
    let tight = ty.num_bytes(component);
    if stride == tight && element == tight {
        return TypedArray::from_le_bytes(component, &bytes[offset..], count * size);
    }
    let cb = component.num_bytes();
    let mut packed = Vec::with_capacity(count * tight);
    for i in 0..count {
        let base = offset + i * stride;
        for j in 0..size {
            let at = base + ty.component_offset(component, j);
            packed.extend_from_slice(&bytes[at..at + cb]);
        }
    }
    TypedArray::from_le_bytes(component, &packed, count * size)
}

/// Manifest plus resolved buffer bytes.
struct Source<'a> {
    input: &'a JsonDocument,
    json: &'a Gltf,
    buffers: Vec<Cow<'a, [u8]>>,
}

impl<'a> Source<'a> {
    fn new(input: &'a JsonDocument) -> Result<Self> {
        let json = &input.json;
        let mut buffers = Vec::with_capacity(json.buffers.len());
        for (i, buffer) in json.buffers.iter().enumerate() {
            let data: Cow<'a, [u8]> = match &buffer.uri {
                None => Cow::Borrowed(input.resource(GLB_BUFFER).ok_or(Error::MissingChunk("BIN"))?),
                Some(uri) if is_data_uri(uri) => Cow::Owned(decode_data_uri(uri)?.1),
                Some(uri) => Cow::Borrowed(
                    input
                        .resource(uri)
                        .ok_or_else(|| Error::invalid(format!("buffer {i}: missing resource '{uri}'")))?,
                ),
            };
            if data.len() < buffer.byte_length {
                return Err(Error::UnexpectedEof(data.len() as u64));
            }
            buffers.push(data);
        }
        Ok(Self { input, json, buffers })
    }

    /// Bytes and record of buffer view `index`.
    fn view(&self, index: usize) -> Result<(&[u8], &'a schema::BufferView)> {
        let views = &self.json.buffer_views;
        let view = views
            .get(index)
            .ok_or_else(|| Error::out_of_range("bufferView", index, views.len()))?;
        let data = self
            .buffers
            .get(view.buffer)
            .ok_or_else(|| Error::out_of_range("buffer", view.buffer, self.buffers.len()))?;
        let end = view
            .byte_offset
            .checked_add(view.byte_length)
            .ok_or_else(|| Error::invalid(format!("bufferView {index}: byte range overflows")))?;
        if end > data.len() {
            return Err(Error::invalid(format!(
                "bufferView {index} ends at {end}, past buffer {} ({} bytes)",
                view.buffer,
                data.len()
            )));
        }
        Ok((&data[view.byte_offset..end], view))
    }

    fn read_buffers(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for b in &self.json.buffers {
            let buffer = doc.create_buffer(name_of(&b.name));
            if let Some(uri) = &b.uri {
                buffer.set_uri(doc, Some(uri.clone()));
            }
            set_extras(doc, buffer, &b.extras);
            ctx.buffers.push(buffer);
        }
        Ok(())
    }

    fn read_accessors(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for (i, a) in self.json.accessors.iter().enumerate() {
            let ty = ElementType::from_name(&a.element_type)
                .ok_or_else(|| Error::invalid(format!("accessor {i}: unknown type '{}'", a.element_type)))?;
            let component = ComponentType::from_gl_enum(a.component_type)
                .ok_or_else(|| Error::invalid(format!("accessor {i}: unknown componentType {}", a.component_type)))?;
            let size = ty.num_components();

            let mut buffer = None;
            let mut array = match a.buffer_view {
                Some(v) => {
                    let (bytes, view) = self.view(v)?;
                    buffer = Some(view.buffer);
                    gather(bytes, a.byte_offset, view.byte_stride, a.count, component, ty)?
                }
                None => {
                    let len = a
                        .count
                        .checked_mul(size)
                        .filter(|len| {
                            len.checked_mul(component.num_bytes())
                                .is_some_and(|bytes| bytes <= MAX_IMPLICIT_BYTES)
                        })
                        .ok_or_else(|| overflow("accessor without bufferView", a.count))?;
                    TypedArray::zeros(component, len)
                }
            };
            if let Some(sparse) = &a.sparse {
                let (index_bytes, index_view) = self.view(sparse.indices.buffer_view)?;
                let index_type = ComponentType::from_gl_enum(sparse.indices.component_type)
                    .filter(|c| matches!(c, ComponentType::Uint8 | ComponentType::Uint16 | ComponentType::Uint32))
                    .ok_or_else(|| Error::invalid(format!("accessor {i}: bad sparse index type")))?;
                let indices = gather(
                    index_bytes,
                    sparse.indices.byte_offset,
                    None,
                    sparse.count,
                    index_type,
                    ElementType::Scalar,
                )?;
                let (value_bytes, value_view) = self.view(sparse.values.buffer_view)?;
                let values = gather(value_bytes, sparse.values.byte_offset, None, sparse.count, component, ty)?;
                for k in 0..sparse.count {
                    let target = indices.get(k) as usize;
                    if target >= a.count {
                        return Err(Error::out_of_range("sparse index", target, a.count));
                    }
                    for c in 0..size {
                        array.set(target * size + c, values.get(k * size + c));
                    }
                }
                buffer = buffer.or(Some(value_view.buffer)).or(Some(index_view.buffer));
            }

            let accessor = doc.create_accessor(name_of(&a.name));
            accessor.set_data(doc, ty, array)?;
            accessor.set_normalized(doc, a.normalized);
            accessor.set_sparse(doc, a.sparse.is_some());
            if let Some(b) = buffer {
                accessor.set_buffer(doc, Some(lookup(&ctx.buffers, b, "buffer")?))?;
            }
            set_extras(doc, accessor, &a.extras);
            ctx.accessors.push(accessor);
        }
        Ok(())
    }

    fn read_textures(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for (i, img) in self.json.images.iter().enumerate() {
            let mut mime = img.mime_type.clone();
            let data = match (&img.buffer_view, &img.uri) {
                (Some(v), _) => self.view(*v)?.0.to_vec(),
                (None, Some(uri)) if is_data_uri(uri) => {
                    let (m, data) = decode_data_uri(uri)?;
                    mime = mime.or(Some(m));
                    data
                }
                (None, Some(uri)) => self
                    .input
                    .resource(uri)
                    .ok_or_else(|| Error::invalid(format!("image {i}: missing resource '{uri}'")))?
                    .to_vec(),
                (None, None) => return Err(Error::invalid(format!("image {i} has neither uri nor bufferView"))),
            };
            let texture = doc.create_texture(name_of(&img.name));
            texture.set_image(doc, data);
            if let Some(mime) = mime {
                texture.set_mime_type(doc, mime);
            }
            if let Some(uri) = img.uri.as_ref().filter(|u| !is_data_uri(u)) {
                texture.set_uri(doc, Some(uri.clone()));
            }
            set_extras(doc, texture, &img.extras);
            ctx.images.push(texture);
        }

        ctx.samplers = self.json.samplers.clone();
        for (i, t) in self.json.textures.iter().enumerate() {
            let texture = match t.source {
                Some(s) => Some(lookup(&ctx.images, s, "image")?),
                None => {
                    debug!(texture = i, "texture without image source");
                    None
                }
            };
            if let Some(s) = t.sampler {
                if s >= ctx.samplers.len() {
                    return Err(Error::out_of_range("sampler", s, ctx.samplers.len()));
                }
            }
            ctx.textures.push(texture);
            ctx.texture_samplers.push(t.sampler);
        }
        Ok(())
    }

    fn read_slot(
        &self,
        doc: &mut Document,
        ctx: &mut ReaderContext,
        material: Material,
        slot: TextureSlot,
        info: &schema::TextureInfo,
    ) -> Result<()> {
        let Some(texture) = ctx.texture(info.index)? else {
            warn!(texture = info.index, "texture has no image; slot dropped");
            return Ok(());
        };
        material.set_texture(doc, slot, Some(texture))?;
        if let Some(ti) = material.texture_info(doc, slot) {
            ctx.apply_texture_info(doc, ti, info)?;
            set_extras(doc, ti, &info.extras);
            if !info.extensions.is_empty() {
                ctx.texture_infos.push((ti, info.extensions.clone()));
            }
        }
        Ok(())
    }

    fn read_materials(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for m in &self.json.materials {
            let material = doc.create_material(name_of(&m.name));
            if let Some(pbr) = &m.pbr_metallic_roughness {
                if let Some(f) = pbr.base_color_factor {
                    material.set_base_color_factor(doc, f);
                }
                if let Some(f) = pbr.metallic_factor {
                    material.set_metallic_factor(doc, f);
                }
                if let Some(f) = pbr.roughness_factor {
                    material.set_roughness_factor(doc, f);
                }
                if let Some(info) = &pbr.base_color_texture {
                    self.read_slot(doc, ctx, material, TextureSlot::BaseColor, info)?;
                }
                if let Some(info) = &pbr.metallic_roughness_texture {
                    self.read_slot(doc, ctx, material, TextureSlot::MetallicRoughness, info)?;
                }
            }
            if let Some(info) = &m.normal_texture {
                self.read_slot(doc, ctx, material, TextureSlot::Normal, info)?;
                material.set_normal_scale(doc, info.scale.unwrap_or(1.0));
            }
            if let Some(info) = &m.occlusion_texture {
                self.read_slot(doc, ctx, material, TextureSlot::Occlusion, info)?;
                material.set_occlusion_strength(doc, info.strength.unwrap_or(1.0));
            }
            if let Some(info) = &m.emissive_texture {
                self.read_slot(doc, ctx, material, TextureSlot::Emissive, info)?;
            }
            if let Some(f) = m.emissive_factor {
                material.set_emissive_factor(doc, f);
            }
            if let Some(mode) = &m.alpha_mode {
                match AlphaMode::from_name(mode) {
                    Some(mode) => material.set_alpha_mode(doc, mode),
                    None => warn!(alpha_mode = %mode, "unknown alphaMode; using OPAQUE"),
                }
            }
            if let Some(cutoff) = m.alpha_cutoff {
                material.set_alpha_cutoff(doc, cutoff);
            }
            material.set_double_sided(doc, m.double_sided);
            set_extras(doc, material, &m.extras);
            ctx.materials.push(material);
        }
        Ok(())
    }

    fn read_meshes(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for m in &self.json.meshes {
            let mesh = doc.create_mesh(name_of(&m.name));
            let mut prims = Vec::with_capacity(m.primitives.len());
            for p in &m.primitives {
                let prim = doc.create_primitive();
                if let Some(mode) = p.mode {
                    let mode = PrimitiveMode::from_u32(mode)
                        .ok_or_else(|| Error::invalid(format!("unknown primitive mode {mode}")))?;
                    prim.set_mode(doc, mode);
                }
                for (semantic, index) in &p.attributes {
                    prim.set_attribute(doc, semantic, Some(ctx.accessor(*index)?))?;
                }
                if let Some(index) = p.indices {
                    prim.set_indices(doc, Some(ctx.accessor(index)?))?;
                }
                if let Some(index) = p.material {
                    prim.set_material(doc, Some(ctx.material(index)?))?;
                }
                for t in &p.targets {
                    let target = doc.create_primitive_target();
                    for (semantic, index) in t {
                        target.set_attribute(doc, semantic, Some(ctx.accessor(*index)?))?;
                    }
                    prim.add_target(doc, target)?;
                }
                set_extras(doc, prim, &p.extras);
                mesh.add_primitive(doc, prim)?;
                prims.push(prim);
            }
            if let Some(w) = &m.weights {
                mesh.set_weights(doc, w);
            }
            set_extras(doc, mesh, &m.extras);
            ctx.meshes.push(mesh);
            ctx.primitives.push(prims);
        }
        Ok(())
    }

    fn read_cameras(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for c in &self.json.cameras {
            let camera = doc.create_camera(name_of(&c.name));
            match CameraType::from_name(&c.camera_type) {
                Some(CameraType::Perspective) => {
                    let p = c
                        .perspective
                        .as_ref()
                        .ok_or_else(|| Error::invalid("perspective camera without parameters"))?;
                    camera.set_camera_type(doc, CameraType::Perspective);
                    camera.set_yfov(doc, p.yfov);
                    camera.set_znear(doc, p.znear);
                    camera.set_zfar(doc, p.zfar);
                    camera.set_aspect_ratio(doc, p.aspect_ratio);
                }
                Some(CameraType::Orthographic) => {
                    let o = c
                        .orthographic
                        .as_ref()
                        .ok_or_else(|| Error::invalid("orthographic camera without parameters"))?;
                    camera.set_camera_type(doc, CameraType::Orthographic);
                    camera.set_xmag(doc, o.xmag);
                    camera.set_ymag(doc, o.ymag);
                    camera.set_znear(doc, o.znear);
                    camera.set_zfar(doc, Some(o.zfar));
                }
                None => return Err(Error::invalid(format!("unknown camera type '{}'", c.camera_type))),
            }
            set_extras(doc, camera, &c.extras);
            ctx.cameras.push(camera);
        }
        Ok(())
    }

    fn read_nodes(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        // Placeholders first so children can point forward.
        for n in &self.json.nodes {
            let node = doc.create_node(name_of(&n.name));
            ctx.nodes.push(node);
        }
        for (n, node) in self.json.nodes.iter().zip(ctx.nodes.clone()) {
            if let Some(m) = &n.matrix {
                node.set_matrix(doc, &Mat4::from_cols_array(m));
            }
            if let Some(t) = n.translation {
                node.set_translation(doc, t);
            }
            if let Some(r) = n.rotation {
                node.set_rotation(doc, r);
            }
            if let Some(s) = n.scale {
                node.set_scale(doc, s);
            }
            if let Some(w) = &n.weights {
                node.set_weights(doc, w);
            }
            if let Some(m) = n.mesh {
                node.set_mesh(doc, Some(lookup(&ctx.meshes, m, "mesh")?))?;
            }
            if let Some(c) = n.camera {
                node.set_camera(doc, Some(lookup(&ctx.cameras, c, "camera")?))?;
            }
            for child in &n.children {
                let child = ctx.node(*child)?;
                if child.parent_node(doc).is_some() {
                    return Err(Error::invalid(format!("{} has more than one parent", child.describe(doc))));
                }
                node.add_child(doc, child)?;
            }
            set_extras(doc, node, &n.extras);
        }
        Ok(())
    }

    fn read_skins(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for s in &self.json.skins {
            let skin = doc.create_skin(name_of(&s.name));
            if let Some(ibm) = s.inverse_bind_matrices {
                skin.set_inverse_bind_matrices(doc, Some(ctx.accessor(ibm)?))?;
            }
            if let Some(skeleton) = s.skeleton {
                skin.set_skeleton(doc, Some(ctx.node(skeleton)?))?;
            }
            for joint in &s.joints {
                skin.add_joint(doc, ctx.node(*joint)?)?;
            }
            set_extras(doc, skin, &s.extras);
            ctx.skins.push(skin);
        }
        for (n, node) in self.json.nodes.iter().zip(ctx.nodes.clone()) {
            if let Some(s) = n.skin {
                node.set_skin(doc, Some(lookup(&ctx.skins, s, "skin")?))?;
            }
        }
        Ok(())
    }

    fn read_animations(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for a in &self.json.animations {
            let animation = doc.create_animation(name_of(&a.name));
            let mut samplers = Vec::with_capacity(a.samplers.len());
            for s in &a.samplers {
                let sampler = doc.create_animation_sampler();
                sampler.set_input(doc, Some(ctx.accessor(s.input)?))?;
                sampler.set_output(doc, Some(ctx.accessor(s.output)?))?;
                if let Some(name) = &s.interpolation {
                    let interpolation = Interpolation::from_name(name)
                        .ok_or_else(|| Error::invalid(format!("unknown interpolation '{name}'")))?;
                    sampler.set_interpolation(doc, interpolation);
                }
                set_extras(doc, sampler, &s.extras);
                animation.add_sampler(doc, sampler)?;
                samplers.push(sampler);
            }
            for c in &a.channels {
                let channel = doc.create_animation_channel();
                channel.set_sampler(doc, Some(lookup(&samplers, c.sampler, "animation sampler")?))?;
                if let Some(node) = c.target.node {
                    channel.set_target_node(doc, Some(ctx.node(node)?))?;
                }
                match TargetPath::from_name(&c.target.path) {
                    Some(path) => channel.set_target_path(doc, Some(path)),
                    None => warn!(path = %c.target.path, "unknown animation target path"),
                }
                set_extras(doc, channel, &c.extras);
                animation.add_channel(doc, channel)?;
            }
            set_extras(doc, animation, &a.extras);
            ctx.animations.push(animation);
        }
        Ok(())
    }

    fn read_scenes(&self, doc: &mut Document, ctx: &mut ReaderContext) -> Result<()> {
        for s in &self.json.scenes {
            let scene = doc.create_scene(name_of(&s.name));
            for n in &s.nodes {
                scene.add_child(doc, ctx.node(*n)?)?;
            }
            set_extras(doc, scene, &s.extras);
            ctx.scenes.push(scene);
        }
        if let Some(index) = self.json.scene {
            let scene = lookup(&ctx.scenes, index, "scene")?;
            doc.root().set_default_scene(doc, Some(scene))?;
        }
        Ok(())
    }

    fn read_extensions(&self, doc: &mut Document, ctx: &ReaderContext) -> Result<()> {
        let json = self.json;
        let root = doc.root();
        attach(doc, ctx, root, &json.extensions)?;
        for (s, scene) in json.scenes.iter().zip(&ctx.scenes) {
            attach(doc, ctx, *scene, &s.extensions)?;
        }
        for (n, node) in json.nodes.iter().zip(&ctx.nodes) {
            attach(doc, ctx, *node, &n.extensions)?;
        }
        for ((m, mesh), prims) in json.meshes.iter().zip(&ctx.meshes).zip(&ctx.primitives) {
            attach(doc, ctx, *mesh, &m.extensions)?;
            for (p, prim) in m.primitives.iter().zip(prims) {
                attach(doc, ctx, *prim, &p.extensions)?;
            }
        }
        for (m, material) in json.materials.iter().zip(&ctx.materials) {
            attach(doc, ctx, *material, &m.extensions)?;
        }
        for (info, extensions) in &ctx.texture_infos {
            attach(doc, ctx, *info, extensions)?;
        }
        for (t, texture) in json.textures.iter().zip(&ctx.textures) {
            if let Some(texture) = texture {
                attach(doc, ctx, *texture, &t.extensions)?;
            }
        }
        for (a, accessor) in json.accessors.iter().zip(&ctx.accessors) {
            attach(doc, ctx, *accessor, &a.extensions)?;
        }
        for (b, buffer) in json.buffers.iter().zip(&ctx.buffers) {
            attach(doc, ctx, *buffer, &b.extensions)?;
        }
        for (c, camera) in json.cameras.iter().zip(&ctx.cameras) {
            attach(doc, ctx, *camera, &c.extensions)?;
        }
        for (s, skin) in json.skins.iter().zip(&ctx.skins) {
            attach(doc, ctx, *skin, &s.extensions)?;
        }
        for (a, animation) in json.animations.iter().zip(&ctx.animations) {
            attach(doc, ctx, *animation, &a.extensions)?;
        }
        Ok(())
    }
}

/// Read and attach every registered extension found on one property.
fn attach<P: Extensible>(doc: &mut Document, ctx: &ReaderContext, parent: P, extensions: &schema::Extensions) -> Result<()> {
    for (name, value) in extensions {
        let Some(ext) = doc.extension(name) else {
            continue;
        };
        let ty = parent.property_type(doc);
        if !ext.parent_types().contains(&ty) {
            warn!(extension = %name, parent = %ty, "extension not allowed here; skipped");
            continue;
        }
        let prop = ext.read(ctx, doc, value)?;
        parent.set_extension(doc, name, Some(prop))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glb(json: &str, bin: Option<&[u8]>) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut out = Vec::new();
        let bin_len = bin.map_or(0, |b| 8 + pad4(b.len()));
        let total = 12 + 8 + json.len() + bin_len;
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&json);
        if let Some(bin) = bin {
            out.extend_from_slice(&(pad4(bin.len()) as u32).to_le_bytes());
            out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            out.extend_from_slice(bin);
            out.resize(total, 0);
        }
        out
    }

    fn read(data: &[u8]) -> Result<Document> {
        read_document(&parse_glb(data)?, &[], Arc::default())
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(read(&[0; 4]), Err(Error::UnexpectedEof(4))));
        let mut bad = glb(r#"{"asset":{"version":"2.0"}}"#, None);
        bad[0] = b'x';
        assert!(matches!(read(&bad), Err(Error::InvalidMagic)));
        let mut v1 = glb(r#"{"asset":{"version":"2.0"}}"#, None);
        v1[4] = 1;
        assert!(matches!(read(&v1), Err(Error::UnsupportedVersion(1))));
    }

    #[test]
    fn test_missing_json_chunk() {
        let mut data = Vec::new();
        data.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&20u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        let err = read(&data).unwrap_err();
        assert!(matches!(err, Error::MissingChunk("JSON")));
        assert!(err.is_structural());
    }

    #[test]
    fn test_strided_view() {
        // Two VEC2 u16 elements with a 8-byte stride.
        let bin: Vec<u8> = [1u16, 2, 0xFFFF, 0xFFFF, 3, 4, 0, 0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let json = r#"{"asset":{"version":"2.0"},
            "buffers":[{"byteLength":16}],
            "bufferViews":[{"buffer":0,"byteLength":16,"byteStride":8}],
            "accessors":[{"bufferView":0,"componentType":5123,"count":2,"type":"VEC2"}]}"#;
        let doc = read(&glb(json, Some(&bin))).unwrap();
        let acc = doc.root().list_accessors(&doc)[0];
        assert_eq!(acc.array(&doc), &TypedArray::U16(vec![1, 2, 3, 4]));
        assert_eq!(acc.buffer(&doc), Some(doc.root().list_buffers(&doc)[0]));
    }

    #[test]
    fn test_sparse_over_zeros() {
        let mut bin = Vec::new();
        bin.extend_from_slice(&1u16.to_le_bytes());
        bin.extend_from_slice(&[0, 0]);
        bin.extend_from_slice(&5.0f32.to_le_bytes());
        let json = r#"{"asset":{"version":"2.0"},
            "buffers":[{"byteLength":8}],
            "bufferViews":[{"buffer":0,"byteLength":2},{"buffer":0,"byteOffset":4,"byteLength":4}],
            "accessors":[{"componentType":5126,"count":3,"type":"SCALAR",
                "sparse":{"count":1,"indices":{"bufferView":0,"componentType":5123},"values":{"bufferView":1}}}]}"#;
        let doc = read(&glb(json, Some(&bin))).unwrap();
        let acc = doc.root().list_accessors(&doc)[0];
        assert!(acc.sparse(&doc));
        assert_eq!(acc.array(&doc), &TypedArray::F32(vec![0.0, 5.0, 0.0]));
    }

    #[test]
    fn test_required_extension_rejected() {
        let json = r#"{"asset":{"version":"2.0"},
            "extensionsUsed":["EXT_unknown"],"extensionsRequired":["EXT_unknown"]}"#;
        assert!(matches!(read(&glb(json, None)), Err(Error::UnsupportedExtension(n)) if n == "EXT_unknown"));

        let used_only = r#"{"asset":{"version":"2.0"},"extensionsUsed":["EXT_unknown"]}"#;
        assert!(read(&glb(used_only, None)).is_ok());
    }

    #[test]
    fn test_node_with_two_parents_rejected() {
        let json = r#"{"asset":{"version":"2.0"},
            "nodes":[{"children":[2]},{"children":[2]},{}]}"#;
        assert!(matches!(read(&glb(json, None)), Err(Error::InvalidStructure(_))));
    }
}
