//! Consolidation of accessor data into a single buffer.

use tracing::{debug, info};

use super::Transform;
use crate::document::Document;
use crate::properties::Property;
use crate::util::Result;

/// Move every accessor into the first buffer, creating one if the document
/// has none, and dispose the other buffers.
pub fn unpartition(doc: &mut Document) -> Result<()> {
    let root = doc.root();
    let buffers = root.list_buffers(doc);
    let accessors = root.list_accessors(doc);
    let target = match buffers.first() {
        Some(first) => *first,
        None if accessors.is_empty() => return Ok(()),
        None => doc.create_buffer(""),
    };
    for accessor in accessors {
        if accessor.buffer(doc) != Some(target) {
            accessor.set_buffer(doc, Some(target))?;
        }
    }
    for buffer in buffers.iter().skip(1) {
        debug!(buffer = %buffer.describe(doc), "disposing merged buffer");
        buffer.dispose(doc)?;
    }
    info!(removed = buffers.len().saturating_sub(1), "unpartition finished");
    Ok(())
}

/// [`unpartition`] as a [`Transform`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Unpartition;

impl Transform for Unpartition {
    fn name(&self) -> &str {
        "unpartition"
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        unpartition(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_buffer() {
        let mut doc = Document::new();
        let b1 = doc.create_buffer("one");
        let b2 = doc.create_buffer("two");
        let a1 = doc.create_accessor("");
        a1.set_buffer(&mut doc, Some(b1)).unwrap();
        let a2 = doc.create_accessor("");
        a2.set_buffer(&mut doc, Some(b2)).unwrap();
        let a3 = doc.create_accessor("");

        unpartition(&mut doc).unwrap();
        assert_eq!(doc.root().list_buffers(&doc), vec![b1]);
        assert!(b2.is_disposed(&doc));
        for a in [a1, a2, a3] {
            assert_eq!(a.buffer(&doc), Some(b1));
        }
    }

    #[test]
    fn test_creates_buffer_when_missing() {
        let mut doc = Document::new();
        let a = doc.create_accessor("");
        unpartition(&mut doc).unwrap();
        let buffers = doc.root().list_buffers(&doc);
        assert_eq!(buffers.len(), 1);
        assert_eq!(a.buffer(&doc), Some(buffers[0]));
    }
}
