//! Buffers: named buckets that accessors are packed into on write.

use super::property::{get_str, parents_via, AttrSpec};
use super::{Accessor, PropertyType};
use crate::document::Document;
use crate::graph::Value;

property_handle!(
    /// Output bucket for accessor data.
    ///
    /// A buffer holds no bytes in memory. The writer lays out every accessor
    /// that references it into views at write time.
    Buffer => PropertyType::Buffer
);

pub(crate) const ATTRS: &[AttrSpec] = &[AttrSpec::literal("uri", || Value::Null)];

impl Buffer {
    /// Target URI for the JSON form; `None` lets the writer pick a name.
    /// A `data:` URI keeps the buffer embedded in the manifest.
    pub fn uri(self, doc: &Document) -> Option<&str> {
        get_str(doc, self.0, "uri").filter(|s| !s.is_empty())
    }

    pub fn set_uri(self, doc: &mut Document, uri: Option<String>) {
        doc.graph_mut().set(self.0, "uri", uri);
    }

    /// Accessors stored in this buffer.
    pub fn list_accessors(self, doc: &Document) -> Vec<Accessor> {
        parents_via(doc, self.0, "buffer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_and_accessors() {
        let mut doc = Document::new();
        let buffer = doc.create_buffer("main");
        assert_eq!(buffer.uri(&doc), None);
        buffer.set_uri(&mut doc, Some("main.bin".into()));
        assert_eq!(buffer.uri(&doc), Some("main.bin"));

        let acc = doc.create_accessor("");
        acc.set_buffer(&mut doc, Some(buffer)).unwrap();
        assert_eq!(buffer.list_accessors(&doc), vec![acc]);
    }
}
