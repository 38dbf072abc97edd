use serde_json::{json, Value as Json};

use super::Extension;
use crate::document::Document;
use crate::io::{ReaderContext, WriterContext};
use crate::properties::{ExtensionProperty, PropertyType};
use crate::util::{Error, Result};

/// `KHR_materials_emissive_strength`: scalar multiplier on emission.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmissiveStrength;

impl EmissiveStrength {
    pub const NAME: &'static str = "KHR_materials_emissive_strength";

    pub fn strength(doc: &Document, prop: ExtensionProperty) -> f32 {
        prop.get_f32(doc, "emissiveStrength").unwrap_or(1.0)
    }

    pub fn set_strength(doc: &mut Document, prop: ExtensionProperty, strength: f32) {
        prop.set(doc, "emissiveStrength", strength);
    }
}

impl Extension for EmissiveStrength {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parent_types(&self) -> &'static [PropertyType] {
        &[PropertyType::Material]
    }

    fn read(&self, _ctx: &ReaderContext, doc: &mut Document, json: &Json) -> Result<ExtensionProperty> {
        let strength = match json.get("emissiveStrength") {
            None => 1.0,
            Some(v) => v
                .as_f64()
                .ok_or_else(|| Error::invalid(format!("{}: emissiveStrength is not a number", Self::NAME)))?
                as f32,
        };
        let prop = doc.create_extension_property(Self::NAME)?;
        Self::set_strength(doc, prop, strength);
        Ok(prop)
    }

    fn write(&self, _ctx: &mut WriterContext, doc: &Document, prop: ExtensionProperty) -> Result<Json> {
        let strength = Self::strength(doc, prop);
        if strength == 1.0 {
            return Ok(json!({}));
        }
        Ok(json!({ "emissiveStrength": strength }))
    }
}
