//! Typed glTF properties over the generic graph.
//!
//! Each property is a `Copy` handle holding a [`NodeId`](crate::graph::NodeId).
//! Attributes are declared per type (see the `ATTRS` tables) and created when
//! the [`Document`](crate::Document) factory builds the node.

macro_rules! property_handle {
    ($(#[$meta:meta])* $name:ident => $ty:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) $crate::graph::NodeId);

        impl $crate::properties::Property for $name {
            #[inline]
            fn id(self) -> $crate::graph::NodeId {
                self.0
            }

            #[inline]
            fn from_id(id: $crate::graph::NodeId) -> Self {
                Self(id)
            }

            #[inline]
            fn accepts(ty: $crate::properties::PropertyType) -> bool {
                ty == $ty
            }
        }

        impl $crate::properties::Extensible for $name {}
    };
}

mod property;
pub(crate) mod root;
pub(crate) mod scene;
pub(crate) mod node;
pub(crate) mod mesh;
pub(crate) mod accessor;
pub(crate) mod buffer;
pub(crate) mod material;
pub(crate) mod texture;
pub(crate) mod animation;
pub(crate) mod skin;
pub(crate) mod camera;
mod extension;

pub use property::{Extensible, Property, PropertyRef, PropertyType};
pub(crate) use property::init_attrs;

pub use root::{default_generator, Asset, Root};
pub use scene::Scene;
pub use node::Node;
pub use mesh::{Mesh, Primitive, PrimitiveMode, PrimitiveTarget};
pub use accessor::Accessor;
pub use buffer::Buffer;
pub use material::{AlphaMode, Material, TextureSlot};
pub use texture::{Texture, TextureInfo, WrapMode};
pub use animation::{Animation, AnimationChannel, AnimationSampler, Interpolation, TargetPath};
pub use skin::Skin;
pub use camera::{Camera, CameraType};
pub use extension::ExtensionProperty;
