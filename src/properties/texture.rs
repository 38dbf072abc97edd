//! Textures and texture sampling parameters.

use super::property::{get_int, get_str, AttrSpec};
use super::{Material, PropertyType};
use crate::document::Document;
use crate::graph::Value;
use crate::util::image;

property_handle!(
    /// An encoded image (PNG, JPEG, WebP, KTX2...) with its MIME type.
    Texture => PropertyType::Texture
);

property_handle!(
    /// Sampling parameters for one texture use site.
    ///
    /// Owned by the material or extension property that created it and
    /// disposed together with the link to it.
    TextureInfo => PropertyType::TextureInfo
);

pub(crate) const TEXTURE_ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("image", || Value::Bytes(Vec::new())),
    AttrSpec::literal("mimeType", || Value::Str(String::new())),
    AttrSpec::literal("uri", || Value::Null),
];

pub(crate) const INFO_ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("texCoord", || Value::Int(0)),
    AttrSpec::literal("magFilter", || Value::Null),
    AttrSpec::literal("minFilter", || Value::Null),
    AttrSpec::literal("wrapS", || Value::Int(WrapMode::Repeat as i64)),
    AttrSpec::literal("wrapT", || Value::Int(WrapMode::Repeat as i64)),
];

/// Sampler wrap mode (GL enum values).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum WrapMode {
    ClampToEdge = 33071,
    MirroredRepeat = 33648,
    #[default]
    Repeat = 10497,
}

impl WrapMode {
    pub const fn from_gl_enum(v: u32) -> Option<Self> {
        match v {
            33071 => Some(Self::ClampToEdge),
            33648 => Some(Self::MirroredRepeat),
            10497 => Some(Self::Repeat),
            _ => None,
        }
    }
}

impl Texture {
    pub fn image(self, doc: &Document) -> &[u8] {
        doc.graph()
            .get(self.0, "image")
            .and_then(Value::as_bytes)
            .unwrap_or(&[])
    }

    pub fn set_image(self, doc: &mut Document, data: Vec<u8>) {
        doc.graph_mut().set(self.0, "image", Value::Bytes(data));
    }

    /// MIME type, sniffed from the image header when unset.
    pub fn mime_type(self, doc: &Document) -> &str {
        match get_str(doc, self.0, "mimeType") {
            Some(m) if !m.is_empty() => m,
            _ => image::sniff_mime_type(self.image(doc)).unwrap_or(""),
        }
    }

    pub fn set_mime_type(self, doc: &mut Document, mime_type: impl Into<String>) {
        doc.graph_mut().set(self.0, "mimeType", mime_type.into());
    }

    pub fn uri(self, doc: &Document) -> Option<&str> {
        get_str(doc, self.0, "uri").filter(|s| !s.is_empty())
    }

    pub fn set_uri(self, doc: &mut Document, uri: Option<String>) {
        doc.graph_mut().set(self.0, "uri", uri);
    }

    /// Pixel dimensions read from the image header.
    pub fn size(self, doc: &Document) -> Option<(u32, u32)> {
        image::image_size(self.image(doc), self.mime_type(doc))
    }

    /// Materials sampling this texture.
    pub fn list_materials(self, doc: &Document) -> Vec<Material> {
        let graph = doc.graph();
        let mut out: Vec<Material> = Vec::new();
        for link in graph.parent_links(self.0) {
            if graph.node(link.parent()).label() == "Material" {
                let m = Material(link.parent());
                if !out.contains(&m) {
                    out.push(m);
                }
            }
        }
        out
    }
}

impl TextureInfo {
    pub fn tex_coord(self, doc: &Document) -> u32 {
        get_int(doc, self.0, "texCoord").unwrap_or(0) as u32
    }

    pub fn set_tex_coord(self, doc: &mut Document, tex_coord: u32) {
        doc.graph_mut().set(self.0, "texCoord", tex_coord as i64);
    }

    pub fn mag_filter(self, doc: &Document) -> Option<u32> {
        get_int(doc, self.0, "magFilter").map(|v| v as u32)
    }

    pub fn set_mag_filter(self, doc: &mut Document, filter: Option<u32>) {
        doc.graph_mut().set(self.0, "magFilter", filter.map(i64::from));
    }

    pub fn min_filter(self, doc: &Document) -> Option<u32> {
        get_int(doc, self.0, "minFilter").map(|v| v as u32)
    }

    pub fn set_min_filter(self, doc: &mut Document, filter: Option<u32>) {
        doc.graph_mut().set(self.0, "minFilter", filter.map(i64::from));
    }

    pub fn wrap_s(self, doc: &Document) -> WrapMode {
        get_int(doc, self.0, "wrapS")
            .and_then(|v| WrapMode::from_gl_enum(v as u32))
            .unwrap_or_default()
    }

    pub fn set_wrap_s(self, doc: &mut Document, mode: WrapMode) {
        doc.graph_mut().set(self.0, "wrapS", mode as i64);
    }

    pub fn wrap_t(self, doc: &Document) -> WrapMode {
        get_int(doc, self.0, "wrapT")
            .and_then(|v| WrapMode::from_gl_enum(v as u32))
            .unwrap_or_default()
    }

    pub fn set_wrap_t(self, doc: &mut Document, mode: WrapMode) {
        doc.graph_mut().set(self.0, "wrapT", mode as i64);
    }

    /// Materials owning this info.
    pub fn list_materials(self, doc: &Document) -> Vec<Material> {
        doc.graph()
            .parent_links(self.0)
            .filter(|l| doc.graph().node(l.parent()).label() == "Material")
            .map(|l| Material(l.parent()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X2: [u8; 24] = [
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R', 0, 0,
        0, 1, 0, 0, 0, 2,
    ];

    #[test]
    fn test_mime_sniff_and_size() {
        let mut doc = Document::new();
        let tex = doc.create_texture("t");
        tex.set_image(&mut doc, PNG_1X2.to_vec());
        assert_eq!(tex.mime_type(&doc), "image/png");
        assert_eq!(tex.size(&doc), Some((1, 2)));
    }

    #[test]
    fn test_info_defaults() {
        let mut doc = Document::new();
        let info = doc.create_texture_info();
        assert_eq!(info.tex_coord(&doc), 0);
        assert_eq!(info.wrap_s(&doc), WrapMode::Repeat);
        assert_eq!(info.mag_filter(&doc), None);
        info.set_wrap_t(&mut doc, WrapMode::ClampToEdge);
        info.set_mag_filter(&mut doc, Some(9729));
        assert_eq!(info.wrap_t(&doc), WrapMode::ClampToEdge);
        assert_eq!(info.mag_filter(&doc), Some(9729));
    }
}
