//! Typed numeric arrays backing accessors.

use super::{ComponentType, Error, GltfPod, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

/// A flat array of one component type.
///
/// Elements are not grouped here; an accessor's [`ElementType`](super::ElementType)
/// decides how many consecutive components form one element.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

macro_rules! dispatch {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            TypedArray::I8($v) => $body,
            TypedArray::U8($v) => $body,
            TypedArray::I16($v) => $body,
            TypedArray::U16($v) => $body,
            TypedArray::U32($v) => $body,
            TypedArray::F32($v) => $body,
        }
    };
}

impl Default for TypedArray {
    fn default() -> Self {
        Self::F32(Vec::new())
    }
}

impl TypedArray {
    /// Zero-filled array of `len` components.
    pub fn zeros(component: ComponentType, len: usize) -> Self {
        match component {
            ComponentType::Int8 => Self::I8(vec![0; len]),
            ComponentType::Uint8 => Self::U8(vec![0; len]),
            ComponentType::Int16 => Self::I16(vec![0; len]),
            ComponentType::Uint16 => Self::U16(vec![0; len]),
            ComponentType::Uint32 => Self::U32(vec![0; len]),
            ComponentType::Float32 => Self::F32(vec![0.0; len]),
        }
    }

    /// Build from raw (unnormalized) float values, rounding for integer types.
    pub fn from_f32s(component: ComponentType, values: &[f32]) -> Self {
        fn conv<T: GltfPod>(values: &[f32]) -> Vec<T> {
            values.iter().map(|&v| T::from_f32(v)).collect()
        }
        match component {
            ComponentType::Int8 => Self::I8(conv(values)),
            ComponentType::Uint8 => Self::U8(conv(values)),
            ComponentType::Int16 => Self::I16(conv(values)),
            ComponentType::Uint16 => Self::U16(conv(values)),
            ComponentType::Uint32 => Self::U32(conv(values)),
            ComponentType::Float32 => Self::F32(values.to_vec()),
        }
    }

    /// Decode `count` little-endian components of `component` from `bytes`.
    pub fn from_le_bytes(component: ComponentType, bytes: &[u8], count: usize) -> Result<Self> {
        let needed = count
            .checked_mul(component.num_bytes())
            .ok_or_else(|| Error::invalid(format!("{count} components overflow the address space")))?;
        let src = bytes
            .get(..needed)
            .ok_or(Error::UnexpectedEof(needed as u64))?;
        let mut out = Self::zeros(component, count);
        match &mut out {
            Self::I8(v) => v.iter_mut().zip(src).for_each(|(d, s)| *d = *s as i8),
            Self::U8(v) => v.copy_from_slice(src),
            Self::I16(v) => LittleEndian::read_i16_into(src, v),
            Self::U16(v) => LittleEndian::read_u16_into(src, v),
            Self::U32(v) => LittleEndian::read_u32_into(src, v),
            Self::F32(v) => LittleEndian::read_f32_into(src, v),
        }
        Ok(out)
    }

    /// Component type of the stored values.
    #[inline]
    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::I8(_) => ComponentType::Int8,
            Self::U8(_) => ComponentType::Uint8,
            Self::I16(_) => ComponentType::Int16,
            Self::U16(_) => ComponentType::Uint16,
            Self::U32(_) => ComponentType::Uint32,
            Self::F32(_) => ComponentType::Float32,
        }
    }

    /// Number of components.
    #[inline]
    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw component `i` widened to f32.
    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        dispatch!(self, v => v[i].to_f32())
    }

    /// Store raw component `i`, saturating for integer types.
    #[inline]
    pub fn set(&mut self, i: usize, value: f32) {
        dispatch!(self, v => v[i] = GltfPod::from_f32(value))
    }

    /// All components widened to f32.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        dispatch!(self, v => v.iter().map(|c| c.to_f32()).collect())
    }

    /// Same values converted to another component type.
    pub fn convert(&self, component: ComponentType) -> Self {
        if component == self.component_type() {
            return self.clone();
        }
        Self::from_f32s(component, &self.to_f32_vec())
    }

    /// Native byte view of the whole array.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        dispatch!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Append component `i` to `out` in little-endian order.
    pub fn write_component<W: WriteBytesExt>(&self, i: usize, out: &mut W) -> std::io::Result<()> {
        match self {
            Self::I8(v) => out.write_i8(v[i]),
            Self::U8(v) => out.write_u8(v[i]),
            Self::I16(v) => out.write_i16::<LittleEndian>(v[i]),
            Self::U16(v) => out.write_u16::<LittleEndian>(v[i]),
            Self::U32(v) => out.write_u32::<LittleEndian>(v[i]),
            Self::F32(v) => out.write_f32::<LittleEndian>(v[i]),
        }
    }

    /// Per-component minimum and maximum over elements of `element_size`
    /// components. Empty arrays yield empty vectors.
    pub fn min_max(&self, element_size: usize) -> (Vec<f32>, Vec<f32>) {
        if self.is_empty() || element_size == 0 {
            return (Vec::new(), Vec::new());
        }
        let mut min = vec![f32::INFINITY; element_size];
        let mut max = vec![f32::NEG_INFINITY; element_size];
        for i in 0..self.len() {
            let c = i % element_size;
            let v = self.get(i);
            if v.is_nan() {
                continue;
            }
            min[c] = min[c].min(v);
            max[c] = max[c].max(v);
        }
        (min, max)
    }
}

impl From<Vec<f32>> for TypedArray {
    fn from(v: Vec<f32>) -> Self {
        Self::F32(v)
    }
}

impl From<Vec<u32>> for TypedArray {
    fn from(v: Vec<u32>) -> Self {
        Self::U32(v)
    }
}

impl From<Vec<u16>> for TypedArray {
    fn from(v: Vec<u16>) -> Self {
        Self::U16(v)
    }
}

impl From<Vec<u8>> for TypedArray {
    fn from(v: Vec<u8>) -> Self {
        Self::U8(v)
    }
}

impl From<Vec<i16>> for TypedArray {
    fn from(v: Vec<i16>) -> Self {
        Self::I16(v)
    }
}

impl From<Vec<i8>> for TypedArray {
    fn from(v: Vec<i8>) -> Self {
        Self::I8(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_bytes_roundtrip() {
        let arr = TypedArray::U16(vec![1, 513, 65535]);
        let mut bytes = Vec::new();
        for i in 0..arr.len() {
            arr.write_component(i, &mut bytes).unwrap();
        }
        assert_eq!(bytes, [1, 0, 1, 2, 255, 255]);
        let back = TypedArray::from_le_bytes(ComponentType::Uint16, &bytes, 3).unwrap();
        assert_eq!(back, arr);
    }

    #[test]
    fn test_from_le_bytes_short_input() {
        let err = TypedArray::from_le_bytes(ComponentType::Float32, &[0u8; 7], 2).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(8)));
    }

    #[test]
    fn test_min_max_per_component() {
        let arr = TypedArray::F32(vec![0.0, 5.0, -1.0, 2.0]);
        let (min, max) = arr.min_max(2);
        assert_eq!(min, vec![-1.0, 2.0]);
        assert_eq!(max, vec![0.0, 5.0]);
    }

    #[test]
    fn test_convert_rounds() {
        let arr = TypedArray::F32(vec![0.4, 1.6, 300.0]);
        assert_eq!(arr.convert(ComponentType::Uint8), TypedArray::U8(vec![0, 2, 255]));
    }
}
