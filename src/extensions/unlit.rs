use serde_json::{json, Value as Json};

use super::Extension;
use crate::document::Document;
use crate::io::{ReaderContext, WriterContext};
use crate::properties::{ExtensionProperty, PropertyType};
use crate::util::Result;

/// `KHR_materials_unlit`: marker for constant shading. Carries no data.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unlit;

impl Unlit {
    pub const NAME: &'static str = "KHR_materials_unlit";
}

impl Extension for Unlit {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parent_types(&self) -> &'static [PropertyType] {
        &[PropertyType::Material]
    }

    fn read(&self, _ctx: &ReaderContext, doc: &mut Document, _json: &Json) -> Result<ExtensionProperty> {
        doc.create_extension_property(Self::NAME)
    }

    fn write(&self, _ctx: &mut WriterContext, _doc: &Document, _prop: ExtensionProperty) -> Result<Json> {
        Ok(json!({}))
    }
}
