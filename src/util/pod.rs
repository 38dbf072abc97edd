//! Component types - the numeric storage types an accessor may hold.

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Accessor component type.
///
/// The discriminants are the GL enum values stored in the manifest
/// (`componentType`). Each type has a fixed byte width and little-endian layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ComponentType {
    /// Signed 8-bit integer
    Int8 = 5120,
    /// Unsigned 8-bit integer
    Uint8 = 5121,
    /// Signed 16-bit integer
    Int16 = 5122,
    /// Unsigned 16-bit integer
    Uint16 = 5123,
    /// Unsigned 32-bit integer
    Uint32 = 5125,
    /// 32-bit floating point
    #[default]
    Float32 = 5126,
}

impl ComponentType {
    /// Returns the size in bytes of a single component.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Uint32 | Self::Float32 => 4,
        }
    }

    /// Returns the GL enum value.
    #[inline]
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }

    /// Parse from the GL enum value.
    pub const fn from_gl_enum(v: u32) -> Option<Self> {
        match v {
            5120 => Some(Self::Int8),
            5121 => Some(Self::Uint8),
            5122 => Some(Self::Int16),
            5123 => Some(Self::Uint16),
            5125 => Some(Self::Uint32),
            5126 => Some(Self::Float32),
            _ => None,
        }
    }

    /// Returns the name of this type as a string.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "BYTE",
            Self::Uint8 => "UNSIGNED_BYTE",
            Self::Int16 => "SHORT",
            Self::Uint16 => "UNSIGNED_SHORT",
            Self::Uint32 => "UNSIGNED_INT",
            Self::Float32 => "FLOAT",
        }
    }

    /// Returns true if this is an integer type.
    #[inline]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::Float32)
    }

    /// Returns true for signed integer types.
    #[inline]
    pub const fn is_signed_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16)
    }

    /// Decode a stored normalized integer into its logical float.
    ///
    /// Signed types clamp at -1.0, so the most negative code (e.g. -128 for
    /// `Int8`) maps to exactly -1.0 rather than -1.0078.
    #[inline]
    pub fn decode_normalized(self, c: f32) -> f32 {
        match self {
            Self::Float32 => c,
            Self::Uint32 => c,
            Self::Uint16 => c / 65535.0,
            Self::Uint8 => c / 255.0,
            Self::Int16 => (c / 32767.0).max(-1.0),
            Self::Int8 => (c / 127.0).max(-1.0),
        }
    }

    /// Encode a logical float into the stored normalized integer domain.
    #[inline]
    pub fn encode_normalized(self, f: f32) -> f32 {
        match self {
            Self::Float32 => f,
            Self::Uint32 => f,
            Self::Uint16 => (f.clamp(0.0, 1.0) * 65535.0).round(),
            Self::Uint8 => (f.clamp(0.0, 1.0) * 255.0).round(),
            Self::Int16 => (f.clamp(-1.0, 1.0) * 32767.0).round(),
            Self::Int8 => (f.clamp(-1.0, 1.0) * 127.0).round(),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// === POD trait for type-safe conversions ===

/// Trait for numeric types that can back an accessor array.
pub trait GltfPod: Pod + Zeroable + Copy + Default + PartialEq {
    /// The corresponding component type.
    const COMPONENT_TYPE: ComponentType;

    /// Size of this type in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();

    /// Widen to f32 without normalization.
    fn to_f32(self) -> f32;

    /// Narrow from f32; integers are rounded and saturated.
    fn from_f32(v: f32) -> Self;
}

macro_rules! impl_int_pod {
    ($t:ty, $ct:expr) => {
        impl GltfPod for $t {
            const COMPONENT_TYPE: ComponentType = $ct;

            #[inline]
            fn to_f32(self) -> f32 {
                self as f32
            }

            #[inline]
            fn from_f32(v: f32) -> Self {
                // `as` saturates and maps NaN to zero.
                v.round() as $t
            }
        }
    };
}

impl_int_pod!(i8, ComponentType::Int8);
impl_int_pod!(u8, ComponentType::Uint8);
impl_int_pod!(i16, ComponentType::Int16);
impl_int_pod!(u16, ComponentType::Uint16);
impl_int_pod!(u32, ComponentType::Uint32);

impl GltfPod for f32 {
    const COMPONENT_TYPE: ComponentType = ComponentType::Float32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}
