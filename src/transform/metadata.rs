//! Asset metadata stamping.

use tracing::debug;

use super::Transform;
use crate::document::Document;
use crate::properties::default_generator;
use crate::util::Result;

/// Values written into the asset record. `None` leaves a field untouched,
/// except the generator, which falls back to this library's own string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub generator: Option<String>,
    pub copyright: Option<String>,
}

/// Stamp generator and copyright on the document root.
pub fn metadata(doc: &mut Document, options: &Metadata) {
    let root = doc.root();
    let generator = options.generator.clone().unwrap_or_else(default_generator);
    debug!(%generator, "stamping asset metadata");
    root.set_generator(doc, generator);
    if let Some(copyright) = &options.copyright {
        root.set_copyright(doc, Some(copyright.clone()));
    }
}

impl Transform for Metadata {
    fn name(&self) -> &str {
        "metadata"
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        metadata(doc, self);
        Ok(())
    }
}
