//! Extension definitions.
//!
//! An [`Extension`] names the properties it can attach to and converts its
//! [`ExtensionProperty`] to and from the manifest JSON. Register it with
//! [`Document::register_extension`] or [`Io::register_extensions`](crate::io::Io::register_extensions).

mod emissive_strength;
mod unlit;

pub use emissive_strength::EmissiveStrength;
pub use unlit::Unlit;

use crate::document::Document;
use crate::io::{ReaderContext, WriterContext};
use crate::properties::{ExtensionProperty, PropertyType};
use crate::util::Result;
use std::sync::Arc;

/// A glTF extension: reader, writer and attachment rules.
pub trait Extension: Send + Sync {
    /// Registered name, e.g. `KHR_materials_unlit`.
    fn name(&self) -> &'static str;

    /// Property types this extension may be attached to.
    fn parent_types(&self) -> &'static [PropertyType];

    /// Build a property from the JSON found under the extension's name.
    fn read(&self, ctx: &ReaderContext, doc: &mut Document, json: &serde_json::Value) -> Result<ExtensionProperty>;

    /// Serialize a property for the manifest.
    fn write(&self, ctx: &mut WriterContext, doc: &Document, prop: ExtensionProperty) -> Result<serde_json::Value>;
}

/// Every extension shipped with the crate.
pub fn builtin() -> Vec<Arc<dyn Extension>> {
    vec![Arc::new(EmissiveStrength), Arc::new(Unlit)]
}
