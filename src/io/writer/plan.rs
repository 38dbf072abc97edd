//! Buffer-view planning.
//!
//! [`plan_layout`] decides, without touching any bytes, which buffer every
//! accessor and embedded image goes to, how accessors are grouped into
//! buffer views, and at which offset each one starts inside its view.
//! Byte offsets of the views themselves are assigned while materializing.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::WriterOptions;
use crate::document::Document;
use crate::graph::{BufferUsage, NodeId};
use crate::io::format::{pad4, Format, VertexLayout};
use crate::properties::*;
use crate::util::{ComponentType, Error, Result};

/// Largest `byteStride` a vertex buffer view may declare.
pub const MAX_BYTE_STRIDE: usize = 252;

/// A buffer in the output; `buffer` is `None` for the implicit one.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferPlan {
    pub buffer: Option<Buffer>,
}

/// Contents of one planned buffer view.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewContent {
    /// Accessors sharing a stride, each at an offset inside the element.
    Interleaved { accessors: Vec<(Accessor, usize)>, count: usize },
    /// Accessors laid end to end, each at an offset from the view start.
    Packed(Vec<(Accessor, usize)>),
    /// Element indices of a sparse accessor.
    SparseIndices {
        accessor: Accessor,
        component: ComponentType,
        indices: Vec<u32>,
    },
    /// Values of the listed elements of a sparse accessor.
    SparseValues { accessor: Accessor, indices: Vec<u32> },
    /// Encoded image bytes.
    Image(Texture),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewPlan {
    pub buffer: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<u32>,
    pub content: ViewContent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SparsePlan {
    pub count: usize,
    pub index_component: ComponentType,
    pub indices_view: usize,
    pub values_view: usize,
}

/// Where one accessor ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessorPlan {
    pub accessor: Accessor,
    pub view: Option<usize>,
    pub byte_offset: usize,
    pub sparse: Option<SparsePlan>,
}

/// Complete layout of the binary payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutPlan {
    pub buffers: Vec<BufferPlan>,
    pub views: Vec<ViewPlan>,
    /// In manifest order
    pub accessors: Vec<AccessorPlan>,
    /// Textures in manifest order with their view, when embedded
    pub images: Vec<(Texture, Option<usize>)>,
    pub(crate) reachable: HashSet<NodeId>,
}

impl LayoutPlan {
    pub fn is_reachable<P: Property>(&self, prop: P) -> bool {
        self.reachable.contains(&prop.id())
    }

    pub fn accessor_plan(&self, accessor: Accessor) -> Option<&AccessorPlan> {
        self.accessors.iter().find(|a| a.accessor == accessor)
    }

    pub fn views_in(&self, buffer: usize) -> impl Iterator<Item = (usize, &ViewPlan)> + '_ {
        self.views.iter().enumerate().filter(move |(_, v)| v.buffer == buffer)
    }
}

/// Usage class of an accessor from its live use sites.
fn usage_of(doc: &Document, reachable: &HashSet<NodeId>, accessor: Accessor) -> Result<BufferUsage> {
    let mut usage: Option<BufferUsage> = None;
    for link in doc.graph().parent_links(accessor.id()) {
        if !reachable.contains(&link.parent()) {
            continue;
        }
        let Some(u) = link.meta().usage else {
            continue;
        };
        match usage {
            Some(prev) if prev != u => {
                return Err(Error::UsageConflict {
                    accessor: accessor.describe(doc),
                    first: prev.name(),
                    second: u.name(),
                })
            }
            _ => usage = Some(u),
        }
    }
    Ok(usage.unwrap_or(BufferUsage::Other))
}

/// Nonzero elements of an accessor, for sparse encoding.
fn nonzero_elements(doc: &Document, accessor: Accessor) -> Vec<u32> {
    let array = accessor.array(doc);
    let size = accessor.element_type(doc).num_components();
    (0..accessor.count(doc))
        .filter(|i| (0..size).any(|c| array.get(i * size + c) != 0.0))
        .map(|i| i as u32)
        .collect()
}

fn index_component(max: u32) -> ComponentType {
    if max < 1 << 8 {
        ComponentType::Uint8
    } else if max < 1 << 16 {
        ComponentType::Uint16
    } else {
        ComponentType::Uint32
    }
}

/// Builder state shared by the planning passes.
struct Planner<'a> {
    doc: &'a Document,
    plan: LayoutPlan,
    slots: HashMap<NodeId, usize>,
    assigned: HashMap<NodeId, (usize, usize)>,
}

impl Planner<'_> {
    fn stored_size(&self, accessor: Accessor) -> usize {
        let ty = accessor.element_type(self.doc);
        ty.padded_num_bytes(accessor.component_type(self.doc))
    }

    fn push_view(&mut self, view: ViewPlan) -> usize {
        self.plan.views.push(view);
        self.plan.views.len() - 1
    }

    /// One strided view per accessor.
    fn separate(&mut self, buffer: usize, accessor: Accessor) {
        let stride = pad4(self.stored_size(accessor));
        let count = accessor.count(self.doc);
        let view = self.push_view(ViewPlan {
            buffer,
            byte_length: stride * count,
            byte_stride: Some(stride),
            target: BufferUsage::ArrayBuffer.target(),
            content: ViewContent::Interleaved {
                accessors: vec![(accessor, 0)],
                count,
            },
        });
        self.assigned.insert(accessor.id(), (view, 0));
    }

    /// One view shared by a primitive's vertex attributes.
    fn interleave(&mut self, buffer: usize, accessors: &[Accessor]) {
        let mut by_count: Vec<(usize, Vec<Accessor>)> = Vec::new();
        for &a in accessors {
            let count = a.count(self.doc);
            match by_count.iter_mut().find(|(c, _)| *c == count) {
                Some((_, group)) => group.push(a),
                None => by_count.push((count, vec![a])),
            }
        }
        for (count, group) in by_count {
            let mut offset = 0;
            let mut members = Vec::with_capacity(group.len());
            for a in group {
                let size = pad4(self.stored_size(a));
                if offset + size > MAX_BYTE_STRIDE && !members.is_empty() {
                    self.push_interleaved(buffer, count, offset, std::mem::take(&mut members));
                    offset = 0;
                }
                members.push((a, offset));
                offset += size;
            }
            self.push_interleaved(buffer, count, offset, members);
        }
    }

    fn push_interleaved(&mut self, buffer: usize, count: usize, stride: usize, members: Vec<(Accessor, usize)>) {
        let view = self.push_view(ViewPlan {
            buffer,
            byte_length: stride * count,
            byte_stride: Some(stride),
            target: BufferUsage::ArrayBuffer.target(),
            content: ViewContent::Interleaved {
                accessors: members.clone(),
                count,
            },
        });
        for (a, offset) in members {
            self.assigned.insert(a.id(), (view, offset));
        }
    }

    /// Accessors laid end to end in one view.
    fn packed(&mut self, buffer: usize, usage: BufferUsage, accessors: &[Accessor]) {
        if accessors.is_empty() {
            return;
        }
        let mut offset = 0;
        let mut members = Vec::with_capacity(accessors.len());
        for &a in accessors {
            offset = pad4(offset);
            members.push((a, offset));
            offset += self.stored_size(a) * a.count(self.doc);
        }
        let view = self.push_view(ViewPlan {
            buffer,
            byte_length: offset,
            byte_stride: None,
            target: usage.target(),
            content: ViewContent::Packed(members.clone()),
        });
        for (a, offset) in members {
            self.assigned.insert(a.id(), (view, offset));
        }
    }

    fn sparse(&mut self, buffer: usize, accessor: Accessor) -> Option<SparsePlan> {
        let indices = nonzero_elements(self.doc, accessor);
        let max = *indices.last()?;
        let component = index_component(max);
        let count = indices.len();
        let indices_view = self.push_view(ViewPlan {
            buffer,
            byte_length: count * component.num_bytes(),
            byte_stride: None,
            target: None,
            content: ViewContent::SparseIndices {
                accessor,
                component,
                indices: indices.clone(),
            },
        });
        let values_view = self.push_view(ViewPlan {
            buffer,
            byte_length: count * self.stored_size(accessor),
            byte_stride: None,
            target: None,
            content: ViewContent::SparseValues { accessor, indices },
        });
        Some(SparsePlan {
            count,
            index_component: component,
            indices_view,
            values_view,
        })
    }
}

/// Plan the binary layout of `doc`. Pure: the document is not modified.
pub fn plan_layout(doc: &Document, options: &WriterOptions) -> Result<LayoutPlan> {
    let root = doc.root();
    let reachable = doc.graph().reachable_from(root.id());
    let live = |id: NodeId| reachable.contains(&id);

    let accessors: Vec<Accessor> = root.list_accessors(doc).into_iter().filter(|a| live(a.id())).collect();
    let textures: Vec<Texture> = root.list_textures(doc).into_iter().filter(|t| live(t.id())).collect();
    let mut buffers: Vec<Buffer> = root.list_buffers(doc).into_iter().filter(|b| live(b.id())).collect();

    if options.format == Format::Glb && buffers.len() > 1 {
        warn!(buffers = buffers.len(), "GLB holds one binary chunk; buffers are merged");
        buffers.truncate(1);
    }
    let needs_buffer = !accessors.is_empty() || (options.format == Format::Glb && !textures.is_empty());
    let mut plan = LayoutPlan {
        buffers: buffers.iter().map(|b| BufferPlan { buffer: Some(*b) }).collect(),
        ..Default::default()
    };
    if plan.buffers.is_empty() && needs_buffer {
        debug!("no buffers; writing into an implicit one");
        plan.buffers.push(BufferPlan { buffer: None });
    }
    let slots: HashMap<NodeId, usize> = buffers.iter().enumerate().map(|(i, b)| (b.id(), i)).collect();

    let mut planner = Planner {
        doc,
        plan,
        slots,
        assigned: HashMap::new(),
    };

    // Bucket accessors by buffer and usage class.
    let mut usages = HashMap::with_capacity(accessors.len());
    for &a in &accessors {
        usages.insert(a.id(), usage_of(doc, &reachable, a)?);
    }
    let slot_of = |planner: &Planner<'_>, a: Accessor| {
        a.buffer(doc)
            .and_then(|b| planner.slots.get(&b.id()).copied())
            .unwrap_or(0)
    };

    let mut sparse_plans = HashMap::new();
    for buffer in 0..planner.plan.buffers.len() {
        let in_buffer: Vec<Accessor> = accessors
            .iter()
            .copied()
            .filter(|a| slot_of(&planner, *a) == buffer)
            .collect();
        // Empty accessors get no view; a view must hold at least one byte.
        let dense = |planner: &Planner<'_>, a: &Accessor| {
            !a.sparse(doc) && a.count(doc) > 0 && !planner.assigned.contains_key(&a.id())
        };

        // Vertex attributes.
        if options.vertex_layout == VertexLayout::Interleaved {
            for mesh in root.list_meshes(doc) {
                for prim in mesh.list_primitives(doc) {
                    let group: Vec<Accessor> = prim
                        .list_attributes(doc)
                        .into_iter()
                        .map(|(_, a)| a)
                        .filter(|a| in_buffer.contains(a) && dense(&planner, a))
                        .filter(|a| usages.get(&a.id()) == Some(&BufferUsage::ArrayBuffer))
                        .collect();
                    if !group.is_empty() {
                        planner.interleave(buffer, &group);
                    }
                }
            }
        }
        for &a in &in_buffer {
            if usages.get(&a.id()) == Some(&BufferUsage::ArrayBuffer) && dense(&planner, &a) {
                planner.separate(buffer, a);
            }
        }

        for usage in [
            BufferUsage::ElementArrayBuffer,
            BufferUsage::Other,
            BufferUsage::InverseBindMatrices,
        ] {
            let group: Vec<Accessor> = in_buffer
                .iter()
                .copied()
                .filter(|a| usages.get(&a.id()) == Some(&usage) && dense(&planner, a))
                .collect();
            planner.packed(buffer, usage, &group);
        }

        for &a in in_buffer.iter().filter(|a| a.sparse(doc)) {
            if let Some(sparse) = planner.sparse(buffer, a) {
                sparse_plans.insert(a.id(), sparse);
            }
        }

        if buffer == 0 && options.format == Format::Glb {
            for &t in &textures {
                if t.image(doc).is_empty() {
                    planner.plan.images.push((t, None));
                    continue;
                }
                let view = planner.push_view(ViewPlan {
                    buffer,
                    byte_length: t.image(doc).len(),
                    byte_stride: None,
                    target: None,
                    content: ViewContent::Image(t),
                });
                planner.plan.images.push((t, Some(view)));
            }
        }
    }
    if options.format == Format::Json {
        planner.plan.images = textures.iter().map(|t| (*t, None)).collect();
    }

    planner.plan.accessors = accessors
        .iter()
        .map(|&a| {
            let (view, byte_offset) = match planner.assigned.get(&a.id()) {
                Some(&(view, offset)) => (Some(view), offset),
                None => (None, 0),
            };
            AccessorPlan {
                accessor: a,
                view,
                byte_offset,
                sparse: sparse_plans.get(&a.id()).copied(),
            }
        })
        .collect();

    // Buffers that received nothing are dropped.
    let used: Vec<usize> = (0..planner.plan.buffers.len())
        .filter(|b| planner.plan.views.iter().any(|v| v.buffer == *b))
        .collect();
    if used.len() != planner.plan.buffers.len() {
        let remap: HashMap<usize, usize> = used.iter().enumerate().map(|(new, old)| (*old, new)).collect();
        planner.plan.buffers = used.iter().map(|b| planner.plan.buffers[*b].clone()).collect();
        for view in &mut planner.plan.views {
            view.buffer = remap[&view.buffer];
        }
    }

    let mut plan = planner.plan;
    plan.reachable = reachable;
    debug!(
        buffers = plan.buffers.len(),
        views = plan.views.len(),
        accessors = plan.accessors.len(),
        "layout planned"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{ElementType, TypedArray};

    fn triangle(doc: &mut Document) -> Primitive {
        let pos = doc.create_accessor("pos");
        pos.set_element_type(doc, ElementType::Vec3).unwrap();
        pos.set_array(doc, TypedArray::F32(vec![0.0; 9])).unwrap();
        let uv = doc.create_accessor("uv");
        uv.set_element_type(doc, ElementType::Vec2).unwrap();
        uv.set_array(doc, TypedArray::U8(vec![0; 6])).unwrap();
        let idx = doc.create_accessor("idx");
        idx.set_array(doc, TypedArray::U16(vec![0, 1, 2])).unwrap();
        let prim = doc.create_primitive();
        prim.set_attribute(doc, "POSITION", Some(pos)).unwrap();
        prim.set_attribute(doc, "TEXCOORD_0", Some(uv)).unwrap();
        prim.set_indices(doc, Some(idx)).unwrap();
        let mesh = doc.create_mesh("");
        mesh.add_primitive(doc, prim).unwrap();
        prim
    }

    #[test]
    fn test_interleaved_stride() {
        let mut doc = Document::new();
        triangle(&mut doc);
        let plan = plan_layout(&doc, &WriterOptions::default()).unwrap();
        assert_eq!(plan.buffers, vec![BufferPlan { buffer: None }]);
        // 12 bytes of VEC3 f32 plus VEC2 u8 padded to 4.
        let vertex = &plan.views[0];
        assert_eq!(vertex.byte_stride, Some(16));
        assert_eq!(vertex.byte_length, 48);
        assert_eq!(vertex.target, Some(34962));
        let indices = &plan.views[1];
        assert_eq!(indices.target, Some(34963));
        assert_eq!(indices.byte_stride, None);
        assert_eq!(plan.views.len(), 2);
    }

    #[test]
    fn test_separate_layout() {
        let mut doc = Document::new();
        triangle(&mut doc);
        let options = WriterOptions {
            vertex_layout: VertexLayout::Separate,
            ..Default::default()
        };
        let plan = plan_layout(&doc, &options).unwrap();
        let strides: Vec<_> = plan.views.iter().map(|v| v.byte_stride).collect();
        assert_eq!(strides, vec![Some(12), Some(4), None]);
    }

    #[test]
    fn test_interleaved_stride_capped() {
        let mut doc = Document::new();
        let prim = doc.create_primitive();
        for i in 0..17 {
            let acc = doc.create_accessor("");
            acc.set_data(&mut doc, ElementType::Vec4, TypedArray::F32(vec![1.0; 8]))
                .unwrap();
            prim.set_attribute(&mut doc, &format!("_ATTR{i:02}"), Some(acc)).unwrap();
        }
        let mesh = doc.create_mesh("");
        mesh.add_primitive(&mut doc, prim).unwrap();

        let plan = plan_layout(&doc, &WriterOptions::default()).unwrap();
        let strides: Vec<_> = plan.views.iter().map(|v| v.byte_stride).collect();
        assert_eq!(strides, vec![Some(240), Some(32)]);
        assert!(plan.views.iter().all(|v| v.byte_stride.unwrap() <= MAX_BYTE_STRIDE));
        assert!(plan.accessors.iter().all(|a| a.view.is_some()));
    }

    #[test]
    fn test_empty_accessor_has_no_view() {
        let mut doc = Document::new();
        let empty = doc.create_accessor("empty");
        let full = doc.create_accessor("full");
        full.set_array(&mut doc, TypedArray::F32(vec![1.0, 2.0])).unwrap();
        let plan = plan_layout(&doc, &WriterOptions::default()).unwrap();
        assert_eq!(plan.accessor_plan(empty).unwrap().view, None);
        assert!(plan.accessor_plan(full).unwrap().view.is_some());
        assert!(plan.views.iter().all(|v| v.byte_length > 0));
    }

    #[test]
    fn test_usage_conflict() {
        let mut doc = Document::new();
        let prim = triangle(&mut doc);
        let pos = prim.attribute(&doc, "POSITION").unwrap();
        let skin = doc.create_skin("");
        // Same accessor as vertex data and as bind matrices.
        skin.set_inverse_bind_matrices(&mut doc, Some(pos)).unwrap();
        let err = plan_layout(&doc, &WriterOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UsageConflict { .. }));
    }

    #[test]
    fn test_sparse_index_width() {
        let mut doc = Document::new();
        let acc = doc.create_accessor("");
        let mut values = vec![0.0f32; 300];
        values[3] = 1.0;
        values[299] = 2.0;
        acc.set_array(&mut doc, TypedArray::F32(values)).unwrap();
        acc.set_sparse(&mut doc, true);
        let plan = plan_layout(&doc, &WriterOptions::default()).unwrap();
        let sparse = plan.accessors[0].sparse.unwrap();
        assert_eq!(sparse.count, 2);
        assert_eq!(sparse.index_component, ComponentType::Uint16);
        assert_eq!(plan.accessors[0].view, None);
    }

    #[test]
    fn test_unused_buffer_dropped() {
        let mut doc = Document::new();
        let first = doc.create_buffer("a");
        let second = doc.create_buffer("b");
        let acc = doc.create_accessor("");
        acc.set_array(&mut doc, TypedArray::F32(vec![1.0])).unwrap();
        acc.set_buffer(&mut doc, Some(second)).unwrap();
        let options = WriterOptions {
            format: Format::Json,
            ..Default::default()
        };
        let plan = plan_layout(&doc, &options).unwrap();
        assert_eq!(plan.buffers, vec![BufferPlan { buffer: Some(second) }]);
        assert!(plan.is_reachable(first));
    }
}
