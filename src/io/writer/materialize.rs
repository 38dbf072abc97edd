//! Byte materialization of a [`LayoutPlan`].

use super::plan::{LayoutPlan, ViewContent};
use crate::document::Document;
use crate::io::schema;
use crate::io::stream::ByteWriter;
use crate::properties::{Accessor, Property};
use crate::util::{Result, TypedArray};

/// Buffer bytes plus the manifest records describing them.
#[derive(Debug, Default)]
pub struct Materialized {
    pub buffers: Vec<Vec<u8>>,
    pub views: Vec<schema::BufferView>,
    pub accessors: Vec<schema::Accessor>,
}

/// Write element `i` of `accessor` at `base` inside `out`.
fn write_element(out: &mut [u8], base: usize, doc: &Document, accessor: Accessor, i: usize) -> Result<()> {
    let array = accessor.array(doc);
    let ty = accessor.element_type(doc);
    let component = array.component_type();
    let size = ty.num_components();
    for j in 0..size {
        let mut dst = &mut out[base + ty.component_offset(component, j)..];
        array.write_component(i * size + j, &mut dst)?;
    }
    Ok(())
}

fn stored_size(doc: &Document, accessor: Accessor) -> usize {
    accessor
        .element_type(doc)
        .padded_num_bytes(accessor.component_type(doc))
}

fn view_bytes(doc: &Document, content: &ViewContent, length: usize, stride: Option<usize>) -> Result<Vec<u8>> {
    let mut out = vec![0u8; length];
    match content {
        ViewContent::Interleaved { accessors, count } => {
            let stride = stride.unwrap_or(0);
            for &(accessor, offset) in accessors {
                for i in 0..*count {
                    write_element(&mut out, i * stride + offset, doc, accessor, i)?;
                }
            }
        }
        ViewContent::Packed(accessors) => {
            for &(accessor, offset) in accessors {
                let element = stored_size(doc, accessor);
                for i in 0..accessor.count(doc) {
                    write_element(&mut out, offset + i * element, doc, accessor, i)?;
                }
            }
        }
        ViewContent::SparseIndices { component, indices, .. } => {
            let values: Vec<f32> = indices.iter().map(|&i| i as f32).collect();
            let array = TypedArray::from_f32s(*component, &values);
            let mut dst = out.as_mut_slice();
            for k in 0..array.len() {
                array.write_component(k, &mut dst)?;
            }
        }
        ViewContent::SparseValues { accessor, indices } => {
            let element = stored_size(doc, *accessor);
            for (k, &i) in indices.iter().enumerate() {
                write_element(&mut out, k * element, doc, *accessor, i as usize)?;
            }
        }
        ViewContent::Image(texture) => out.copy_from_slice(texture.image(doc)),
    }
    Ok(out)
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

pub(crate) fn extras_of<P: Property>(doc: &Document, prop: P) -> Option<serde_json::Value> {
    let extras = prop.extras(doc);
    (!extras.is_null()).then(|| extras.clone())
}

/// Produce buffer bytes, buffer views and accessor records.
pub fn materialize(doc: &Document, plan: &LayoutPlan) -> Result<Materialized> {
    let mut views: Vec<Option<schema::BufferView>> = vec![None; plan.views.len()];
    let mut buffers = Vec::with_capacity(plan.buffers.len());

    for b in 0..plan.buffers.len() {
        let mut w = ByteWriter::new();
        for (index, view) in plan.views_in(b) {
            w.align4(0);
            let byte_offset = w.pos();
            let bytes = view_bytes(doc, &view.content, view.byte_length, view.byte_stride)?;
            w.write_bytes(&bytes);
            views[index] = Some(schema::BufferView {
                buffer: b,
                byte_offset,
                byte_length: view.byte_length,
                byte_stride: view.byte_stride,
                target: view.target,
                ..Default::default()
            });
        }
        w.align4(0);
        buffers.push(w.into_inner());
    }

    let accessors = plan
        .accessors
        .iter()
        .map(|p| {
            let a = p.accessor;
            let (min, max) = a.min_max(doc);
            let has_bounds = !min.is_empty();
            schema::Accessor {
                name: non_empty(a.name(doc)),
                buffer_view: p.view,
                byte_offset: p.byte_offset,
                component_type: a.component_type(doc).gl_enum(),
                normalized: a.normalized(doc),
                count: a.count(doc),
                element_type: a.element_type(doc).name().to_string(),
                min: has_bounds.then_some(min),
                max: has_bounds.then_some(max),
                sparse: p.sparse.map(|s| schema::Sparse {
                    count: s.count,
                    indices: schema::SparseIndices {
                        buffer_view: s.indices_view,
                        byte_offset: 0,
                        component_type: s.index_component.gl_enum(),
                    },
                    values: schema::SparseValues {
                        buffer_view: s.values_view,
                        byte_offset: 0,
                    },
                }),
                extras: extras_of(doc, a),
                ..Default::default()
            }
        })
        .collect();

    Ok(Materialized {
        buffers,
        views: views.into_iter().flatten().collect(),
        accessors,
    })
}

#[cfg(test)]
mod tests {
    use super::super::plan::plan_layout;
    use super::super::WriterOptions;
    use super::*;
    use crate::io::format::VertexLayout;
    use crate::util::{ComponentType, ElementType};

    #[test]
    fn test_interleaved_bytes() {
        let mut doc = Document::new();
        let pos = doc.create_accessor("");
        pos.set_element_type(&mut doc, ElementType::Vec2).unwrap();
        pos.set_array(&mut doc, TypedArray::F32(vec![1.0, 2.0, 3.0, 4.0])).unwrap();
        let color = doc.create_accessor("");
        color.set_array(&mut doc, TypedArray::U8(vec![7, 9])).unwrap();
        let prim = doc.create_primitive();
        prim.set_attribute(&mut doc, "POSITION", Some(pos)).unwrap();
        prim.set_attribute(&mut doc, "_FLAG", Some(color)).unwrap();
        let mesh = doc.create_mesh("");
        mesh.add_primitive(&mut doc, prim).unwrap();

        let plan = plan_layout(&doc, &WriterOptions::default()).unwrap();
        let out = materialize(&doc, &plan).unwrap();
        assert_eq!(out.views[0].byte_stride, Some(12));
        let bin = &out.buffers[0];
        assert_eq!(bin.len(), 24);
        assert_eq!(&bin[0..4], &1.0f32.to_le_bytes());
        assert_eq!(bin[8], 7);
        assert_eq!(&bin[9..12], &[0, 0, 0]);
        assert_eq!(bin[20], 9);
        assert_eq!(out.accessors[1].byte_offset, 8);
    }

    #[test]
    fn test_separate_views_aligned() {
        let mut doc = Document::new();
        let a = doc.create_accessor("");
        a.set_array(&mut doc, TypedArray::U8(vec![1, 2, 3])).unwrap();
        let b = doc.create_accessor("");
        b.set_array(&mut doc, TypedArray::U16(vec![5])).unwrap();
        let options = WriterOptions {
            vertex_layout: VertexLayout::Separate,
            ..Default::default()
        };
        let plan = plan_layout(&doc, &options).unwrap();
        let out = materialize(&doc, &plan).unwrap();
        // Both land in one OTHER view; the second starts on a 4-byte boundary.
        assert_eq!(out.views.len(), 1);
        assert_eq!(out.accessors[1].byte_offset, 4);
        assert_eq!(out.buffers[0], vec![1, 2, 3, 0, 5, 0, 0, 0]);
        assert_eq!(out.accessors[0].min, Some(vec![1.0]));
        assert_eq!(out.accessors[0].max, Some(vec![3.0]));
    }

    #[test]
    fn test_mat3_column_padding() {
        let mut doc = Document::new();
        let m = doc.create_accessor("");
        m.set_element_type(&mut doc, ElementType::Mat3).unwrap();
        m.set_array(&mut doc, TypedArray::U8((1..=9).collect())).unwrap();
        let plan = plan_layout(&doc, &WriterOptions::default()).unwrap();
        let out = materialize(&doc, &plan).unwrap();
        assert_eq!(out.buffers[0], vec![1, 2, 3, 0, 4, 5, 6, 0, 7, 8, 9, 0]);
        assert_eq!(ComponentType::Uint8.gl_enum(), out.accessors[0].component_type);
    }
}
