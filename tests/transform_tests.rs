//! Integration tests for the built-in transforms on documents read from disk.

use std::sync::Arc;

use gltf_graph::io::{parse_glb, Io};
use gltf_graph::prelude::*;
use gltf_graph::transform::{
    compress_textures, CompressTextures, Dedup, Metadata, Prune, TextureCompressOptions, Unpartition,
};

use tempfile::tempdir;

/// A scene with one used mesh plus unreferenced leftovers.
fn cluttered() -> Document {
    let mut doc = Document::new();
    let scene = doc.create_scene("main");
    let node = doc.create_node("used");
    scene.add_child(&mut doc, node).unwrap();

    let mesh = doc.create_mesh("used");
    let positions = doc.create_accessor("");
    positions.set_element_type(&mut doc, ElementType::Vec3).unwrap();
    positions.set_array(&mut doc, TypedArray::F32(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0])).unwrap();
    let prim = doc.create_primitive();
    prim.set_attribute(&mut doc, "POSITION", Some(positions)).unwrap();
    mesh.add_primitive(&mut doc, prim).unwrap();
    node.set_mesh(&mut doc, Some(mesh)).unwrap();

    let unused_mesh = doc.create_mesh("unused");
    let unused_prim = doc.create_primitive();
    let unused_acc = doc.create_accessor("");
    unused_acc.set_array(&mut doc, TypedArray::F32(vec![1.0, 2.0])).unwrap();
    unused_prim.set_attribute(&mut doc, "POSITION", Some(unused_acc)).unwrap();
    unused_mesh.add_primitive(&mut doc, unused_prim).unwrap();
    doc.create_material("unused");
    doc.create_node("orphan");
    doc
}

#[test]
fn test_prune_idempotent_after_roundtrip() {
    let io = Io::new();
    let mut doc = io.read_binary(&io.write_binary(&cluttered()).unwrap()).unwrap();
    assert_eq!(doc.root().list_meshes(&doc).len(), 2);

    let first = prune(&mut doc, &PruneOptions::default());
    assert!(first > 0);
    let root = doc.root();
    assert_eq!(root.list_meshes(&doc).len(), 1);
    assert_eq!(root.list_accessors(&doc).len(), 1);
    assert!(root.list_materials(&doc).is_empty());
    assert_eq!(root.list_nodes(&doc).len(), 1);

    let glb = io.write_binary(&doc).unwrap();
    assert_eq!(prune(&mut doc, &PruneOptions::default()), 0);
    assert_eq!(io.write_binary(&doc).unwrap(), glb);
}

#[test]
fn test_pipeline_to_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clean.glb");

    let mut doc = cluttered();
    let extra = doc.create_buffer("second");
    let acc = doc.root().list_accessors(&doc)[0];
    acc.set_buffer(&mut doc, Some(extra)).unwrap();

    let pipeline = Pipeline::new()
        .then(Dedup::default())
        .then(Prune::default())
        .then(Unpartition)
        .then(Metadata {
            generator: Some("cleanup".into()),
            copyright: Some("CC0".into()),
        });
    pipeline.run(&mut doc).unwrap();

    let io = Io::new();
    io.write(&path, &doc).unwrap();
    let data = std::fs::read(&path).unwrap();
    let parsed = parse_glb(&data).unwrap();
    assert_eq!(parsed.json.buffers.len(), 1);
    assert_eq!(parsed.json.meshes.len(), 1);
    assert_eq!(parsed.json.asset.generator.as_deref(), Some("cleanup"));
    assert_eq!(parsed.json.asset.copyright.as_deref(), Some("CC0"));
}

#[test]
fn test_dedup_shared_accessors_survive_write() {
    let mut doc = Document::new();
    let scene = doc.create_scene("");
    let mesh = doc.create_mesh("");
    for _ in 0..2 {
        let node = doc.create_node("");
        node.set_mesh(&mut doc, Some(mesh)).unwrap();
        scene.add_child(&mut doc, node).unwrap();
        let acc = doc.create_accessor("");
        acc.set_array(&mut doc, TypedArray::U16(vec![0, 1, 2])).unwrap();
        let prim = doc.create_primitive();
        prim.set_indices(&mut doc, Some(acc)).unwrap();
        mesh.add_primitive(&mut doc, prim).unwrap();
    }
    assert_eq!(dedup(&mut doc, &DedupOptions::default()).unwrap(), 1);

    let out = Io::new().write_json(&doc, "shared").unwrap();
    assert_eq!(out.json.accessors.len(), 1);
    let prims = &out.json.meshes[0].primitives;
    assert_eq!(prims[0].indices, Some(0));
    assert_eq!(prims[1].indices, Some(0));
}

#[test]
fn test_texture_compression_in_pipeline() {
    let mut doc = Document::new();
    for i in 0..3u8 {
        let tex = doc.create_texture("");
        tex.set_image(&mut doc, vec![0x89, b'P', b'N', b'G', i]);
    }
    let encoder = |data: &[u8], _mime: &str| -> Result<(Vec<u8>, String)> {
        Ok((data[4..].to_vec(), "image/ktx2".to_string()))
    };
    let step = CompressTextures::new(Arc::new(encoder)).with_options(TextureCompressOptions {
        concurrency: 2,
        ..Default::default()
    });
    doc.transform(&[&step]).unwrap();
    let textures = doc.root().list_textures(&doc);
    assert!(textures.iter().all(|t| t.mime_type(&doc) == "image/ktx2"));
    assert_eq!(textures[2].image(&doc), &[2]);

    // Nothing left to match the filter.
    let options = TextureCompressOptions {
        filter: Some("image/png".into()),
        ..Default::default()
    };
    assert_eq!(compress_textures(&mut doc, &encoder, &options).unwrap(), 0);
}

#[test]
fn test_transform_errors_name_the_step() {
    let mut doc = Document::new();
    let tex = doc.create_texture("");
    tex.set_image(&mut doc, vec![1, 2, 3]);
    let failing = CompressTextures::new(Arc::new(|_: &[u8], _: &str| -> Result<(Vec<u8>, String)> {
        Err(Error::other("no encoder installed"))
    }));
    let err = doc.transform(&[&failing]).unwrap_err();
    match err {
        Error::Transform { name, source } => {
            assert_eq!(name, "compress_textures");
            assert!(matches!(*source, Error::ExternalTool { ref entity, .. } if entity == "texture 0"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(tex.image(&doc), &[1, 2, 3]);
}
