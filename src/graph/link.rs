//! Links - named, directed edges between graph nodes.

use super::NodeId;

/// Stable link identity, assigned monotonically per graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub(crate) u32);

/// Buffer usage class implied by the site that references an accessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferUsage {
    /// Vertex attributes
    ArrayBuffer,
    /// Primitive indices
    ElementArrayBuffer,
    /// Animation samplers and anything else
    Other,
    /// Skin inverse bind matrices
    InverseBindMatrices,
}

impl BufferUsage {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ArrayBuffer => "ARRAY_BUFFER",
            Self::ElementArrayBuffer => "ELEMENT_ARRAY_BUFFER",
            Self::Other => "OTHER",
            Self::InverseBindMatrices => "INVERSE_BIND_MATRICES",
        }
    }

    /// GL buffer view target, where the manifest records one.
    pub const fn target(self) -> Option<u32> {
        match self {
            Self::ArrayBuffer => Some(34962),
            Self::ElementArrayBuffer => Some(34963),
            _ => None,
        }
    }
}

/// Color channel bits carried by texture links.
pub mod channels {
    pub const R: u8 = 0x1;
    pub const G: u8 = 0x2;
    pub const B: u8 = 0x4;
    pub const A: u8 = 0x8;
    pub const RGB: u8 = R | G | B;
    pub const RGBA: u8 = RGB | A;
}

/// Use-site metadata attached to a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LinkMeta {
    /// Texture channels sampled through this link
    pub channels: Option<u8>,
    /// Buffer usage class for accessor links
    pub usage: Option<BufferUsage>,
    /// Child lives and dies with this link
    pub owned: bool,
}

impl LinkMeta {
    pub const fn channels(mask: u8) -> Self {
        Self {
            channels: Some(mask),
            usage: None,
            owned: false,
        }
    }

    pub const fn usage(usage: BufferUsage) -> Self {
        Self {
            channels: None,
            usage: Some(usage),
            owned: false,
        }
    }

    pub const fn owned() -> Self {
        Self {
            channels: None,
            usage: None,
            owned: true,
        }
    }
}

/// A directed edge `parent --name[key]--> child`.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub(crate) name: &'static str,
    pub(crate) parent: NodeId,
    pub(crate) child: NodeId,
    pub(crate) key: Option<String>,
    pub(crate) meta: LinkMeta,
}

impl Link {
    /// Attribute name on the parent holding this link.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    #[inline]
    pub fn child(&self) -> NodeId {
        self.child
    }

    /// Map key, for links stored in a keyed reference map.
    #[inline]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    #[inline]
    pub fn meta(&self) -> &LinkMeta {
        &self.meta
    }
}
