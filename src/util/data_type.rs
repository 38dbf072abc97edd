//! Element types - how many components make up one accessor element.

use super::ComponentType;
use std::fmt;

/// Accessor element type (`SCALAR`, `VEC2`..`VEC4`, `MAT2`..`MAT4`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    #[default]
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    /// All element types in manifest order.
    pub const ALL: [Self; 7] = [
        Self::Scalar,
        Self::Vec2,
        Self::Vec3,
        Self::Vec4,
        Self::Mat2,
        Self::Mat3,
        Self::Mat4,
    ];

    /// Number of components in one element.
    #[inline]
    pub const fn num_components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    /// Manifest name of this element type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }

    /// Parse from the manifest name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Byte size of one element stored with `component`, without the column
    /// padding matrices need inside buffer views.
    #[inline]
    pub const fn num_bytes(self, component: ComponentType) -> usize {
        self.num_components() * component.num_bytes()
    }

    /// Column count and rows for matrix types, `None` otherwise.
    #[inline]
    pub const fn matrix_dims(self) -> Option<usize> {
        match self {
            Self::Mat2 => Some(2),
            Self::Mat3 => Some(3),
            Self::Mat4 => Some(4),
            _ => None,
        }
    }

    /// Stored byte size of one element inside a buffer view.
    ///
    /// Matrix columns start on 4-byte boundaries, so `MAT2`/`MAT3` of 1-byte
    /// and `MAT3` of 2-byte components carry per-column padding.
    pub const fn padded_num_bytes(self, component: ComponentType) -> usize {
        match self.matrix_dims() {
            Some(n) => {
                let column = n * component.num_bytes();
                let padded = (column + 3) & !3;
                padded * n
            }
            None => self.num_bytes(component),
        }
    }

    /// Byte offset of component `j` inside one stored element.
    #[inline]
    pub const fn component_offset(self, component: ComponentType, j: usize) -> usize {
        let size = component.num_bytes();
        match self.matrix_dims() {
            Some(n) => {
                let column = (n * size + 3) & !3;
                (j / n) * column + (j % n) * size
            }
            None => j * size,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_components() {
        assert_eq!(ElementType::Scalar.num_components(), 1);
        assert_eq!(ElementType::Vec3.num_components(), 3);
        assert_eq!(ElementType::Mat4.num_components(), 16);
    }

    #[test]
    fn test_element_names() {
        for t in ElementType::ALL {
            assert_eq!(ElementType::from_name(t.name()), Some(t));
        }
        assert_eq!(ElementType::from_name("VEC5"), None);
    }

    #[test]
    fn test_matrix_column_padding() {
        assert_eq!(ElementType::Mat2.padded_num_bytes(ComponentType::Uint8), 8);
        assert_eq!(ElementType::Mat3.padded_num_bytes(ComponentType::Uint8), 12);
        assert_eq!(ElementType::Mat3.padded_num_bytes(ComponentType::Int16), 24);
        assert_eq!(ElementType::Mat4.padded_num_bytes(ComponentType::Float32), 64);
        assert_eq!(ElementType::Vec3.padded_num_bytes(ComponentType::Uint8), 3);
    }

    #[test]
    fn test_component_offset() {
        assert_eq!(ElementType::Vec3.component_offset(ComponentType::Float32, 2), 8);
        // MAT3 of u8: columns of 3 bytes padded to 4.
        assert_eq!(ElementType::Mat3.component_offset(ComponentType::Uint8, 3), 4);
        assert_eq!(ElementType::Mat3.component_offset(ComponentType::Uint8, 8), 10);
    }
}
