//! Metallic-roughness materials.

use super::property::{get_array, get_f32, get_ref, get_str, AttrSpec};
use super::{PropertyType, Texture, TextureInfo};
use crate::document::Document;
use crate::graph::{channels, LinkMeta, Value};
use crate::util::Result;

property_handle!(
    /// PBR metallic-roughness material.
    ///
    /// Each texture slot pairs a shared [`Texture`] reference with an owned
    /// [`TextureInfo`] holding the sampling parameters of that slot.
    Material => PropertyType::Material
);

pub(crate) const ATTRS: &[AttrSpec] = &[
    AttrSpec::literal("alphaMode", || Value::from(AlphaMode::Opaque.name())),
    AttrSpec::literal("alphaCutoff", || Value::Float(0.5)),
    AttrSpec::literal("doubleSided", || Value::Bool(false)),
    AttrSpec::literal("baseColorFactor", || Value::from([1.0_f32, 1.0, 1.0, 1.0])),
    AttrSpec::literal("emissiveFactor", || Value::from([0.0_f32, 0.0, 0.0])),
    AttrSpec::literal("metallicFactor", || Value::Float(1.0)),
    AttrSpec::literal("roughnessFactor", || Value::Float(1.0)),
    AttrSpec::literal("normalScale", || Value::Float(1.0)),
    AttrSpec::literal("occlusionStrength", || Value::Float(1.0)),
    AttrSpec::reference("baseColorTexture"),
    AttrSpec::reference("baseColorTextureInfo"),
    AttrSpec::reference("emissiveTexture"),
    AttrSpec::reference("emissiveTextureInfo"),
    AttrSpec::reference("normalTexture"),
    AttrSpec::reference("normalTextureInfo"),
    AttrSpec::reference("occlusionTexture"),
    AttrSpec::reference("occlusionTextureInfo"),
    AttrSpec::reference("metallicRoughnessTexture"),
    AttrSpec::reference("metallicRoughnessTextureInfo"),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Opaque => "OPAQUE",
            Self::Mask => "MASK",
            Self::Blend => "BLEND",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Opaque, Self::Mask, Self::Blend]
            .into_iter()
            .find(|m| m.name() == name)
    }
}

/// Texture use sites of a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    Emissive,
    Normal,
    Occlusion,
    MetallicRoughness,
}

impl TextureSlot {
    pub const ALL: [Self; 5] = [
        Self::BaseColor,
        Self::Emissive,
        Self::Normal,
        Self::Occlusion,
        Self::MetallicRoughness,
    ];

    /// Channels sampled from the texture in this slot.
    pub const fn channels(self) -> u8 {
        match self {
            Self::BaseColor => channels::RGBA,
            Self::Emissive | Self::Normal => channels::RGB,
            Self::Occlusion => channels::R,
            Self::MetallicRoughness => channels::G | channels::B,
        }
    }

    /// Attribute holding the texture reference; also the manifest key.
    pub const fn texture_attr(self) -> &'static str {
        match self {
            Self::BaseColor => "baseColorTexture",
            Self::Emissive => "emissiveTexture",
            Self::Normal => "normalTexture",
            Self::Occlusion => "occlusionTexture",
            Self::MetallicRoughness => "metallicRoughnessTexture",
        }
    }

    pub(crate) const fn info_attr(self) -> &'static str {
        match self {
            Self::BaseColor => "baseColorTextureInfo",
            Self::Emissive => "emissiveTextureInfo",
            Self::Normal => "normalTextureInfo",
            Self::Occlusion => "occlusionTextureInfo",
            Self::MetallicRoughness => "metallicRoughnessTextureInfo",
        }
    }
}

impl Material {
    pub fn alpha_mode(self, doc: &Document) -> AlphaMode {
        get_str(doc, self.0, "alphaMode")
            .and_then(AlphaMode::from_name)
            .unwrap_or_default()
    }

    pub fn set_alpha_mode(self, doc: &mut Document, mode: AlphaMode) {
        doc.graph_mut().set(self.0, "alphaMode", mode.name());
    }

    pub fn alpha_cutoff(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "alphaCutoff", 0.5)
    }

    pub fn set_alpha_cutoff(self, doc: &mut Document, cutoff: f32) {
        doc.graph_mut().set(self.0, "alphaCutoff", cutoff);
    }

    pub fn double_sided(self, doc: &Document) -> bool {
        doc.graph()
            .get(self.0, "doubleSided")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_double_sided(self, doc: &mut Document, double_sided: bool) {
        doc.graph_mut().set(self.0, "doubleSided", double_sided);
    }

    pub fn base_color_factor(self, doc: &Document) -> [f32; 4] {
        get_array(doc, self.0, "baseColorFactor", [1.0; 4])
    }

    pub fn set_base_color_factor(self, doc: &mut Document, factor: [f32; 4]) {
        doc.graph_mut().set(self.0, "baseColorFactor", factor);
    }

    pub fn emissive_factor(self, doc: &Document) -> [f32; 3] {
        get_array(doc, self.0, "emissiveFactor", [0.0; 3])
    }

    pub fn set_emissive_factor(self, doc: &mut Document, factor: [f32; 3]) {
        doc.graph_mut().set(self.0, "emissiveFactor", factor);
    }

    pub fn metallic_factor(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "metallicFactor", 1.0)
    }

    pub fn set_metallic_factor(self, doc: &mut Document, factor: f32) {
        doc.graph_mut().set(self.0, "metallicFactor", factor);
    }

    pub fn roughness_factor(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "roughnessFactor", 1.0)
    }

    pub fn set_roughness_factor(self, doc: &mut Document, factor: f32) {
        doc.graph_mut().set(self.0, "roughnessFactor", factor);
    }

    pub fn normal_scale(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "normalScale", 1.0)
    }

    pub fn set_normal_scale(self, doc: &mut Document, scale: f32) {
        doc.graph_mut().set(self.0, "normalScale", scale);
    }

    pub fn occlusion_strength(self, doc: &Document) -> f32 {
        get_f32(doc, self.0, "occlusionStrength", 1.0)
    }

    pub fn set_occlusion_strength(self, doc: &mut Document, strength: f32) {
        doc.graph_mut().set(self.0, "occlusionStrength", strength);
    }

    pub fn texture(self, doc: &Document, slot: TextureSlot) -> Option<Texture> {
        get_ref(doc, self.0, slot.texture_attr())
    }

    /// Sampling parameters of a slot; present while the slot has a texture.
    pub fn texture_info(self, doc: &Document, slot: TextureSlot) -> Option<TextureInfo> {
        get_ref(doc, self.0, slot.info_attr())
    }

    /// Assign or clear the texture of a slot.
    ///
    /// The slot's [`TextureInfo`] is created on first assignment and kept
    /// when the texture is replaced. Clearing the slot disposes it.
    pub fn set_texture(self, doc: &mut Document, slot: TextureSlot, texture: Option<Texture>) -> Result<()> {
        let Some(texture) = texture else {
            let g = doc.graph_mut();
            g.set_ref(self.0, slot.texture_attr(), None, LinkMeta::default())?;
            g.set_ref(self.0, slot.info_attr(), None, LinkMeta::owned())?;
            return Ok(());
        };
        doc.ensure_owned(texture.0)?;
        doc.graph_mut().set_ref(
            self.0,
            slot.texture_attr(),
            Some(texture.0),
            LinkMeta::channels(slot.channels()),
        )?;
        if self.texture_info(doc, slot).is_none() {
            let info = doc.create_texture_info();
            doc.graph_mut()
                .set_ref(self.0, slot.info_attr(), Some(info.0), LinkMeta::owned())?;
        }
        Ok(())
    }

    /// Slots with a texture assigned.
    pub fn list_texture_slots(self, doc: &Document) -> Vec<(TextureSlot, Texture)> {
        TextureSlot::ALL
            .into_iter()
            .filter_map(|slot| Some((slot, self.texture(doc, slot)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Property;

    #[test]
    fn test_factor_defaults() {
        let mut doc = Document::new();
        let m = doc.create_material("m");
        assert_eq!(m.base_color_factor(&doc), [1.0; 4]);
        assert_eq!(m.alpha_mode(&doc), AlphaMode::Opaque);
        assert_eq!(m.alpha_cutoff(&doc), 0.5);
        m.set_alpha_mode(&mut doc, AlphaMode::Mask);
        m.set_roughness_factor(&mut doc, 0.25);
        assert_eq!(m.alpha_mode(&doc), AlphaMode::Mask);
        assert_eq!(m.roughness_factor(&doc), 0.25);
    }

    #[test]
    fn test_texture_slot_owns_info() {
        let mut doc = Document::new();
        let m = doc.create_material("m");
        let tex = doc.create_texture("t");
        m.set_texture(&mut doc, TextureSlot::Occlusion, Some(tex)).unwrap();
        let info = m.texture_info(&doc, TextureSlot::Occlusion).unwrap();
        info.set_tex_coord(&mut doc, 1);

        let link = doc.graph().get_ref_link(m.id(), "occlusionTexture").unwrap();
        assert_eq!(link.meta().channels, Some(channels::R));

        // Replacing the texture keeps the sampling parameters.
        let other = doc.create_texture("u");
        m.set_texture(&mut doc, TextureSlot::Occlusion, Some(other)).unwrap();
        assert_eq!(m.texture_info(&doc, TextureSlot::Occlusion), Some(info));

        m.set_texture(&mut doc, TextureSlot::Occlusion, None).unwrap();
        assert!(info.is_disposed(&doc));
        assert!(!tex.is_disposed(&doc));
    }

    #[test]
    fn test_clone_deep_copies_info() {
        let mut doc = Document::new();
        let m = doc.create_material("m");
        let tex = doc.create_texture("t");
        m.set_texture(&mut doc, TextureSlot::BaseColor, Some(tex)).unwrap();
        let copy = m.clone_property(&mut doc).unwrap();

        assert_eq!(copy.texture(&doc, TextureSlot::BaseColor), Some(tex));
        let a = m.texture_info(&doc, TextureSlot::BaseColor).unwrap();
        let b = copy.texture_info(&doc, TextureSlot::BaseColor).unwrap();
        assert_ne!(a, b);
        assert!(m.equals(&doc, copy, &doc));
    }
}
