//! Accessors: typed arrays of vertex, index or animation data.

use super::mesh::check_attribute_resize;
use super::property::{get_ref, get_str, set_ref, AttrSpec};
use super::{Buffer, PropertyType};
use crate::document::Document;
use crate::graph::{LinkMeta, Value};
use crate::util::{ComponentType, ElementType, Error, Result, TypedArray};

property_handle!(
    /// A flat [`TypedArray`] viewed as `count` elements of an [`ElementType`].
    ///
    /// The array length is always a multiple of the element size. When
    /// `normalized` is set, integer components map to `[0, 1]` or `[-1, 1]`
    /// through [`Accessor::element`] and [`Accessor::set_element`].
    Accessor => PropertyType::Accessor
);

pub(crate) const ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("type", || Value::from(ElementType::Scalar.name())),
    AttrSpec::literal("array", || Value::Array(TypedArray::default())),
    AttrSpec::literal("normalized", || Value::Bool(false)),
    AttrSpec::literal("sparse", || Value::Bool(false)),
    AttrSpec::reference("buffer"),
];

static EMPTY: TypedArray = TypedArray::F32(Vec::new());

impl Accessor {
    pub fn element_type(self, doc: &Document) -> ElementType {
        get_str(doc, self.0, "type")
            .and_then(ElementType::from_name)
            .unwrap_or_default()
    }

    /// Change the element type. The current array must divide evenly, and
    /// the resulting count must still fit the primitives using the accessor.
    pub fn set_element_type(self, doc: &mut Document, ty: ElementType) -> Result<()> {
        let len = self.array(doc).len();
        let element_size = ty.num_components();
        if len % element_size != 0 {
            return Err(Error::InvalidArrayLength { len, element_size });
        }
        check_attribute_resize(doc, self, len / element_size)?;
        doc.graph_mut().set(self.0, "type", ty.name());
        Ok(())
    }

    pub fn component_type(self, doc: &Document) -> ComponentType {
        self.array(doc).component_type()
    }

    pub fn array(self, doc: &Document) -> &TypedArray {
        doc.graph()
            .get(self.0, "array")
            .and_then(Value::as_array)
            .unwrap_or(&EMPTY)
    }

    /// Replace the data. Its length must be a multiple of the element size.
    ///
    /// An accessor used as a vertex attribute keeps its count unless it is
    /// the only attribute of every primitive holding it.
    pub fn set_array(self, doc: &mut Document, array: TypedArray) -> Result<()> {
        let ty = self.element_type(doc);
        self.set_data(doc, ty, array)
    }

    /// Replace element type and data together, checked as one change.
    pub fn set_data(self, doc: &mut Document, ty: ElementType, array: TypedArray) -> Result<()> {
        let element_size = ty.num_components();
        if array.len() % element_size != 0 {
            return Err(Error::InvalidArrayLength {
                len: array.len(),
                element_size,
            });
        }
        check_attribute_resize(doc, self, array.len() / element_size)?;
        doc.graph_mut().set(self.0, "type", ty.name());
        doc.graph_mut().set(self.0, "array", array);
        Ok(())
    }

    /// Components per element.
    pub fn element_size(self, doc: &Document) -> usize {
        self.element_type(doc).num_components()
    }

    /// Number of elements.
    pub fn count(self, doc: &Document) -> usize {
        self.array(doc).len() / self.element_size(doc)
    }

    /// Unpadded byte size of the data.
    pub fn byte_length(self, doc: &Document) -> usize {
        self.array(doc).len() * self.component_type(doc).num_bytes()
    }

    pub fn normalized(self, doc: &Document) -> bool {
        doc.graph()
            .get(self.0, "normalized")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_normalized(self, doc: &mut Document, normalized: bool) {
        doc.graph_mut().set(self.0, "normalized", normalized);
    }

    /// Written with sparse storage when set.
    pub fn sparse(self, doc: &Document) -> bool {
        doc.graph()
            .get(self.0, "sparse")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_sparse(self, doc: &mut Document, sparse: bool) {
        doc.graph_mut().set(self.0, "sparse", sparse);
    }

    pub fn buffer(self, doc: &Document) -> Option<Buffer> {
        get_ref(doc, self.0, "buffer")
    }

    pub fn set_buffer(self, doc: &mut Document, buffer: Option<Buffer>) -> Result<()> {
        set_ref(doc, self.0, "buffer", buffer, LinkMeta::default())
    }

    fn decode(self, doc: &Document, raw: f32) -> f32 {
        if self.normalized(doc) {
            self.component_type(doc).decode_normalized(raw)
        } else {
            raw
        }
    }

    /// Element `index`, denormalized when the accessor is normalized.
    pub fn element(self, doc: &Document, index: usize) -> Result<Vec<f32>> {
        let count = self.count(doc);
        if index >= count {
            return Err(Error::out_of_range("element", index, count));
        }
        let size = self.element_size(doc);
        let array = self.array(doc);
        Ok((0..size)
            .map(|c| self.decode(doc, array.get(index * size + c)))
            .collect())
    }

    /// Overwrite element `index`, normalizing when the accessor is normalized.
    pub fn set_element(self, doc: &mut Document, index: usize, value: &[f32]) -> Result<()> {
        let count = self.count(doc);
        if index >= count {
            return Err(Error::out_of_range("element", index, count));
        }
        let size = self.element_size(doc);
        if value.len() != size {
            return Err(Error::InvalidArrayLength {
                len: value.len(),
                element_size: size,
            });
        }
        let normalized = self.normalized(doc);
        let component = self.component_type(doc);
        let Some(array) = doc.graph_mut().get_mut(self.0, "array").and_then(Value::as_array_mut) else {
            return Err(Error::invalid("accessor has no array"));
        };
        for (c, v) in value.iter().enumerate() {
            let stored = if normalized {
                component.encode_normalized(*v)
            } else {
                *v
            };
            array.set(index * size + c, stored);
        }
        Ok(())
    }

    /// First component of element `index`.
    pub fn scalar(self, doc: &Document, index: usize) -> Result<f32> {
        Ok(self.element(doc, index)?[0])
    }

    /// Per-component bounds of the stored values, as written to `min`/`max`.
    pub fn min_max(self, doc: &Document) -> (Vec<f32>, Vec<f32>) {
        self.array(doc).min_max(self.element_size(doc))
    }

    /// Per-component bounds in the logical (denormalized) domain.
    pub fn min_max_normalized(self, doc: &Document) -> (Vec<f32>, Vec<f32>) {
        let (min, max) = self.min_max(doc);
        if !self.normalized(doc) {
            return (min, max);
        }
        let component = self.component_type(doc);
        let decode = |v: Vec<f32>| v.into_iter().map(|c| component.decode_normalized(c)).collect();
        (decode(min), decode(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_length_check() {
        let mut doc = Document::new();
        let acc = doc.create_accessor("a");
        acc.set_element_type(&mut doc, ElementType::Vec3).unwrap();
        acc.set_array(&mut doc, TypedArray::F32(vec![0.0; 9])).unwrap();
        assert_eq!(acc.count(&doc), 3);
        assert_eq!(acc.byte_length(&doc), 36);

        let err = acc.set_array(&mut doc, TypedArray::F32(vec![0.0; 8])).unwrap_err();
        assert!(matches!(err, Error::InvalidArrayLength { len: 8, element_size: 3 }));
        assert_eq!(acc.count(&doc), 3);

        assert!(acc.set_element_type(&mut doc, ElementType::Vec2).is_err());
        acc.set_element_type(&mut doc, ElementType::Scalar).unwrap();
        assert_eq!(acc.count(&doc), 9);
    }

    #[test]
    fn test_normalized_u8_round_trip() {
        let mut doc = Document::new();
        let acc = doc.create_accessor("colors");
        acc.set_element_type(&mut doc, ElementType::Vec4).unwrap();
        acc.set_array(&mut doc, TypedArray::U8(vec![0, 0, 0, 0])).unwrap();
        acc.set_normalized(&mut doc, true);

        acc.set_element(&mut doc, 0, &[1.0, 0.0, 0.5, 2.0]).unwrap();
        assert_eq!(acc.array(&doc), &TypedArray::U8(vec![255, 0, 128, 255]));
        let e = acc.element(&doc, 0).unwrap();
        assert_eq!(e[0], 1.0);
        assert_eq!(e[1], 0.0);
        assert_eq!(e[3], 1.0);
    }

    #[test]
    fn test_normalized_i8_clamps() {
        let mut doc = Document::new();
        let acc = doc.create_accessor("n");
        acc.set_array(&mut doc, TypedArray::I8(vec![-128, 127, 0])).unwrap();
        acc.set_normalized(&mut doc, true);
        assert_eq!(acc.scalar(&doc, 0).unwrap(), -1.0);
        assert_eq!(acc.scalar(&doc, 1).unwrap(), 1.0);
        let (min, max) = acc.min_max_normalized(&doc);
        assert_eq!((min[0], max[0]), (-1.0, 1.0));
        let (raw_min, _) = acc.min_max(&doc);
        assert_eq!(raw_min[0], -128.0);
    }

    #[test]
    fn test_element_out_of_range() {
        let mut doc = Document::new();
        let acc = doc.create_accessor("");
        acc.set_array(&mut doc, TypedArray::U16(vec![1, 2, 3])).unwrap();
        assert!(matches!(
            acc.element(&doc, 3),
            Err(Error::IndexOutOfRange { index: 3, count: 3, .. })
        ));
    }
}
