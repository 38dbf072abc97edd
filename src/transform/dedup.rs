//! Merging of duplicate accessors, textures and materials.
//!
//! Candidates are bucketed by an MD5 content digest and confirmed by exact
//! comparison; every non-root reference to a duplicate is moved onto the
//! first equal property, then the duplicate is disposed.

use std::collections::HashMap;

use md5::{Digest, Md5};
use tracing::{debug, info};

use super::Transform;
use crate::document::Document;
use crate::graph::NodeId;
use crate::properties::{Accessor, Material, Property, Texture};
use crate::util::Result;

/// Property kinds [`dedup`] merges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedupOptions {
    pub accessors: bool,
    pub textures: bool,
    pub materials: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            accessors: true,
            textures: true,
            materials: true,
        }
    }
}

type ContentDigest = [u8; 16];

fn accessor_digest(doc: &Document, accessor: Accessor) -> ContentDigest {
    let mut hasher = Md5::new();
    hasher.update(accessor.element_type(doc).name().as_bytes());
    hasher.update(accessor.component_type(doc).gl_enum().to_le_bytes());
    hasher.update([accessor.normalized(doc) as u8]);
    // Index and vertex data never share an accessor in the output.
    let usage = doc
        .graph()
        .parent_links(accessor.id())
        .find_map(|l| l.meta().usage);
    hasher.update(usage.map_or("", |u| u.name()).as_bytes());
    hasher.update(accessor.array(doc).as_bytes());
    hasher.finalize().into()
}

fn accessors_equal(doc: &Document, a: Accessor, b: Accessor) -> bool {
    a.element_type(doc) == b.element_type(doc)
        && a.normalized(doc) == b.normalized(doc)
        && a.sparse(doc) == b.sparse(doc)
        && a.array(doc) == b.array(doc)
}

fn texture_digest(doc: &Document, texture: Texture) -> ContentDigest {
    let mut hasher = Md5::new();
    hasher.update(texture.mime_type(doc).as_bytes());
    hasher.update([0]);
    hasher.update(texture.image(doc));
    hasher.finalize().into()
}

fn textures_equal(doc: &Document, a: Texture, b: Texture) -> bool {
    a.mime_type(doc) == b.mime_type(doc) && a.image(doc) == b.image(doc)
}

/// Point every non-root parent of `duplicate` at `keep`, then dispose it.
fn replace(doc: &mut Document, duplicate: NodeId, keep: NodeId) -> Result<()> {
    let root = doc.root().id();
    let parents: Vec<NodeId> = doc
        .graph()
        .list_parents(duplicate)
        .into_iter()
        .filter(|p| *p != root)
        .collect();
    for parent in parents {
        doc.graph_mut().swap(parent, duplicate, keep)?;
    }
    doc.graph_mut().dispose(duplicate);
    Ok(())
}

/// Merge by digest buckets; `equal` confirms a digest hit.
fn dedup_by_digest<P: Property>(
    doc: &mut Document,
    items: Vec<P>,
    digest: impl Fn(&Document, P) -> ContentDigest,
    equal: impl Fn(&Document, P, P) -> bool,
) -> Result<usize> {
    let mut buckets: HashMap<ContentDigest, Vec<P>> = HashMap::new();
    let mut merged = 0;
    for item in items {
        let key = digest(doc, item);
        let bucket = buckets.entry(key).or_default();
        match bucket.iter().copied().find(|kept| equal(doc, *kept, item)) {
            Some(kept) => {
                replace(doc, item.id(), kept.id())?;
                merged += 1;
            }
            None => bucket.push(item),
        }
    }
    Ok(merged)
}

fn dedup_materials(doc: &mut Document) -> Result<usize> {
    let mut unique: Vec<Material> = Vec::new();
    let mut merged = 0;
    for material in doc.root().list_materials(doc) {
        let found = unique
            .iter()
            .copied()
            .find(|kept| kept.equals_skipping(doc, material, doc, &["name"]));
        match found {
            Some(kept) => {
                replace(doc, material.id(), kept.id())?;
                merged += 1;
            }
            None => unique.push(material),
        }
    }
    Ok(merged)
}

/// Merge duplicates of the enabled kinds. Textures go before materials so
/// materials that differ only by a duplicate texture collapse too.
/// Returns the number of properties removed.
pub fn dedup(doc: &mut Document, options: &DedupOptions) -> Result<usize> {
    let mut total = 0;
    if options.accessors {
        let accessors = doc.root().list_accessors(doc);
        let n = dedup_by_digest(doc, accessors, accessor_digest, accessors_equal)?;
        debug!(merged = n, "deduplicated accessors");
        total += n;
    }
    if options.textures {
        let textures = doc.root().list_textures(doc);
        let n = dedup_by_digest(doc, textures, texture_digest, textures_equal)?;
        debug!(merged = n, "deduplicated textures");
        total += n;
    }
    if options.materials {
        let n = dedup_materials(doc)?;
        debug!(merged = n, "deduplicated materials");
        total += n;
    }
    info!(merged = total, "dedup finished");
    Ok(total)
}

/// [`dedup`] as a [`Transform`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Dedup(pub DedupOptions);

impl Transform for Dedup {
    fn name(&self) -> &str {
        "dedup"
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        dedup(doc, &self.0).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::TextureSlot;
    use crate::util::TypedArray;

    fn accessor(doc: &mut Document, values: Vec<f32>) -> Accessor {
        let a = doc.create_accessor("");
        a.set_array(doc, TypedArray::F32(values)).unwrap();
        a
    }

    #[test]
    fn test_dedup_accessors() {
        let mut doc = Document::new();
        let a = accessor(&mut doc, vec![1.0, 2.0, 3.0]);
        let b = accessor(&mut doc, vec![1.0, 2.0, 3.0]);
        let c = accessor(&mut doc, vec![1.0, 2.0, 4.0]);
        let prim = doc.create_primitive();
        prim.set_attribute(&mut doc, "_A", Some(a)).unwrap();
        prim.set_attribute(&mut doc, "_B", Some(b)).unwrap();
        prim.set_attribute(&mut doc, "_C", Some(c)).unwrap();

        let merged = dedup(&mut doc, &DedupOptions::default()).unwrap();
        assert_eq!(merged, 1);
        assert!(b.is_disposed(&doc));
        assert!(!c.is_disposed(&doc));
        assert_eq!(prim.attribute(&doc, "_B"), Some(a));
    }

    #[test]
    fn test_dedup_textures_then_materials() {
        let mut doc = Document::new();
        let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3];
        let t1 = doc.create_texture("a");
        t1.set_image(&mut doc, png.clone());
        t1.set_mime_type(&mut doc, "image/png");
        let t2 = doc.create_texture("b");
        t2.set_image(&mut doc, png);
        t2.set_mime_type(&mut doc, "image/png");

        let m1 = doc.create_material("first");
        m1.set_texture(&mut doc, TextureSlot::BaseColor, Some(t1)).unwrap();
        let m2 = doc.create_material("second");
        m2.set_texture(&mut doc, TextureSlot::BaseColor, Some(t2)).unwrap();
        let prim = doc.create_primitive();
        prim.set_material(&mut doc, Some(m2)).unwrap();

        let merged = dedup(&mut doc, &DedupOptions::default()).unwrap();
        assert_eq!(merged, 2);
        assert_eq!(doc.root().list_textures(&doc), vec![t1]);
        assert_eq!(doc.root().list_materials(&doc), vec![m1]);
        assert_eq!(prim.material(&doc), Some(m1));
    }

    #[test]
    fn test_dedup_disabled_kinds() {
        let mut doc = Document::new();
        accessor(&mut doc, vec![1.0]);
        accessor(&mut doc, vec![1.0]);
        let options = DedupOptions {
            accessors: false,
            ..DedupOptions::default()
        };
        assert_eq!(dedup(&mut doc, &options).unwrap(), 0);
        assert_eq!(doc.root().list_accessors(&doc).len(), 2);
    }
}
