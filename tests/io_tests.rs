//! Integration tests for the container codec: framing, layout and errors.

use std::collections::BTreeMap;

use gltf_graph::io::schema::Gltf;
use gltf_graph::io::{assemble_glb, encode_data_uri, parse_glb, Io, JsonDocument, ReaderOptions};
use gltf_graph::prelude::*;

use tempfile::tempdir;

fn manifest(json: &str) -> Gltf {
    serde_json::from_str(json).expect("valid manifest")
}

fn two_attribute_mesh(doc: &mut Document) -> Primitive {
    let position = doc.create_accessor("position");
    position.set_element_type(doc, ElementType::Vec3).unwrap();
    position.set_array(doc, TypedArray::F32(vec![0.5; 9])).unwrap();
    let uv = doc.create_accessor("uv");
    uv.set_element_type(doc, ElementType::Vec2).unwrap();
    uv.set_array(doc, TypedArray::F32(vec![0.25; 6])).unwrap();
    let prim = doc.create_primitive();
    prim.set_attribute(doc, "POSITION", Some(position)).unwrap();
    prim.set_attribute(doc, "TEXCOORD_0", Some(uv)).unwrap();
    let mesh = doc.create_mesh("quad");
    mesh.add_primitive(doc, prim).unwrap();
    prim
}

#[test]
fn test_dangling_accessor_index() {
    let bin = vec![0u8; 36];
    let gltf = manifest(
        r#"{"asset":{"version":"2.0"},
            "buffers":[{"byteLength":36}],
            "bufferViews":[{"buffer":0,"byteLength":36}],
            "accessors":[
                {"bufferView":0,"componentType":5126,"count":1,"type":"VEC3"},
                {"bufferView":0,"byteOffset":12,"componentType":5126,"count":1,"type":"VEC3"},
                {"bufferView":0,"byteOffset":24,"componentType":5126,"count":1,"type":"VEC3"}],
            "meshes":[{"primitives":[{"attributes":{"POSITION":5}}]}]}"#,
    );
    let glb = assemble_glb(&gltf, Some(&bin)).unwrap();
    let err = Io::new().read_binary(&glb).unwrap_err();
    match err {
        Error::IndexOutOfRange { kind, index, count } => {
            assert_eq!(kind, "accessor");
            assert_eq!(index, 5);
            assert_eq!(count, 3);
        }
        other => panic!("expected IndexOutOfRange, got {other}"),
    }
}

#[test]
fn test_view_past_buffer_end() {
    let gltf = manifest(
        r#"{"asset":{"version":"2.0"},
            "buffers":[{"byteLength":4}],
            "bufferViews":[{"buffer":0,"byteOffset":4,"byteLength":8}],
            "accessors":[{"bufferView":0,"componentType":5126,"count":2,"type":"SCALAR"}]}"#,
    );
    let glb = assemble_glb(&gltf, Some(&[0, 0, 0, 0])).unwrap();
    let err = Io::new().read_binary(&glb).unwrap_err();
    assert!(err.is_structural(), "unexpected error: {err}");
}

fn read_manifest(json: &str, resources: BTreeMap<String, Vec<u8>>) -> Result<Document> {
    let input = JsonDocument {
        json: manifest(json),
        resources,
    };
    Io::new().read_json(&input)
}

#[test]
fn test_huge_count_without_view() {
    let err = read_manifest(
        r#"{"asset":{"version":"2.0"},
            "accessors":[{"componentType":5126,"count":6148914691236517206,"type":"VEC3"}]}"#,
        BTreeMap::new(),
    )
    .unwrap_err();
    assert!(err.is_structural(), "unexpected error: {err}");

    // No overflow, but far more zeros than any real asset declares.
    let err = read_manifest(
        r#"{"asset":{"version":"2.0"},
            "accessors":[{"componentType":5126,"count":4000000000,"type":"MAT4"}]}"#,
        BTreeMap::new(),
    )
    .unwrap_err();
    assert!(err.is_structural(), "unexpected error: {err}");
}

#[test]
fn test_huge_count_with_view() {
    let mut resources = BTreeMap::new();
    resources.insert("data.bin".to_string(), vec![0u8; 12]);
    let err = read_manifest(
        r#"{"asset":{"version":"2.0"},
            "buffers":[{"byteLength":12,"uri":"data.bin"}],
            "bufferViews":[{"buffer":0,"byteLength":12}],
            "accessors":[{"bufferView":0,"componentType":5126,"count":6148914691236517206,"type":"VEC3"}]}"#,
        resources,
    )
    .unwrap_err();
    assert!(err.is_structural(), "unexpected error: {err}");
}

#[test]
fn test_view_range_overflow() {
    let mut resources = BTreeMap::new();
    resources.insert("data.bin".to_string(), vec![0u8; 4]);
    let err = read_manifest(
        r#"{"asset":{"version":"2.0"},
            "buffers":[{"byteLength":4,"uri":"data.bin"}],
            "bufferViews":[{"buffer":0,"byteOffset":18446744073709551615,"byteLength":4}],
            "accessors":[{"bufferView":0,"componentType":5126,"count":1,"type":"SCALAR"}]}"#,
        resources,
    )
    .unwrap_err();
    assert!(err.is_structural(), "unexpected error: {err}");
}

#[test]
fn test_interleaved_layout() {
    let mut doc = Document::new();
    two_attribute_mesh(&mut doc);
    let io = Io::new();
    let out = io.write_json(&doc, "quad").unwrap();

    assert_eq!(out.json.buffer_views.len(), 1);
    let view = &out.json.buffer_views[0];
    assert_eq!(view.byte_stride, Some(20));
    assert_eq!(view.byte_length, 60);
    assert_eq!(view.target, Some(34962));
    let offsets: Vec<usize> = out.json.accessors.iter().map(|a| a.byte_offset).collect();
    assert_eq!(offsets, vec![0, 12]);
    assert_eq!(out.resources["quad.bin"].len(), 60);
}

#[test]
fn test_separate_layout() {
    let mut doc = Document::new();
    two_attribute_mesh(&mut doc);
    let options = WriterOptions::default().with_vertex_layout(VertexLayout::Separate);
    let io = Io::new().with_writer_options(options);
    let out = io.write_json(&doc, "quad").unwrap();

    let strides: Vec<Option<usize>> = out.json.buffer_views.iter().map(|v| v.byte_stride).collect();
    assert_eq!(strides, vec![Some(12), Some(8)]);
    let lengths: Vec<usize> = out.json.buffer_views.iter().map(|v| v.byte_length).collect();
    assert_eq!(lengths, vec![36, 24]);
    assert!(out.json.buffer_views.iter().all(|v| v.byte_offset % 4 == 0));

    // Both layouts decode to the same data.
    let back = io.read_json(&out).unwrap();
    let uv = back.root().list_accessors(&back)[1];
    assert_eq!(uv.array(&back), &TypedArray::F32(vec![0.25; 6]));
}

#[test]
fn test_glb_json_chunk_padding() {
    let mut doc = Document::new();
    doc.create_node("n");
    let glb = Io::new().write_binary(&doc).unwrap();
    let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
    assert_eq!(json_len % 4, 0);
    assert_eq!(&glb[16..20], b"JSON");
    let chunk = &glb[20..20 + json_len];
    let text = std::str::from_utf8(chunk).unwrap();
    let body = text.trim_end_matches(' ');
    assert!(body.ends_with('}'));
    assert!(chunk[body.len()..].iter().all(|b| *b == b' '));
    assert!(parse_glb(&glb).is_ok());
}

#[test]
fn test_glb_bin_chunk_zero_padding() {
    let mut doc = Document::new();
    let a = doc.create_accessor("");
    a.set_array(&mut doc, TypedArray::U8(vec![7, 7, 7])).unwrap();
    let glb = Io::new().write_binary(&doc).unwrap();
    let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
    let bin_start = 20 + json_len;
    let bin_len = u32::from_le_bytes(glb[bin_start..bin_start + 4].try_into().unwrap()) as usize;
    assert_eq!(&glb[bin_start + 4..bin_start + 8], b"BIN\0");
    assert_eq!(bin_len, 4);
    assert_eq!(&glb[bin_start + 8..], &[7, 7, 7, 0]);
}

#[test]
fn test_data_uri_buffer() {
    let bytes: Vec<u8> = [1.0f32, 2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let uri = encode_data_uri("application/octet-stream", &bytes);
    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},
            "buffers":[{{"byteLength":8,"uri":"{uri}"}}],
            "bufferViews":[{{"buffer":0,"byteLength":8}}],
            "accessors":[{{"bufferView":0,"componentType":5126,"count":2,"type":"SCALAR"}}]}}"#
    );
    let input = JsonDocument {
        json: manifest(&json),
        resources: BTreeMap::new(),
    };
    let doc = Io::new().read_json(&input).unwrap();
    let acc = doc.root().list_accessors(&doc)[0];
    assert_eq!(acc.array(&doc), &TypedArray::F32(vec![1.0, 2.0]));
}

#[test]
fn test_data_uri_buffer_stays_embedded() {
    let bytes: Vec<u8> = [1.0f32, 2.0, 3.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let uri = encode_data_uri("application/octet-stream", &bytes);
    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},
            "buffers":[{{"byteLength":12,"uri":"{uri}"}}],
            "bufferViews":[{{"buffer":0,"byteLength":12}}],
            "accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"SCALAR"}}]}}"#
    );
    let doc = read_manifest(&json, BTreeMap::new()).unwrap();
    let buffer = doc.root().list_buffers(&doc)[0];
    assert!(buffer.uri(&doc).is_some_and(|u| u.starts_with("data:")));

    let io = Io::new();
    let out = io.write_json(&doc, "inline").unwrap();
    assert!(out.resources.is_empty(), "unexpected resources: {:?}", out.resources.keys());
    let written = out.json.buffers[0].uri.as_deref().unwrap();
    assert!(written.starts_with("data:application/octet-stream;base64,"));

    let back = io.read_json(&out).unwrap();
    let acc = back.root().list_accessors(&back)[0];
    assert_eq!(acc.array(&back), &TypedArray::F32(vec![1.0, 2.0, 3.0]));
}

#[test]
fn test_missing_resource_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.gltf");
    std::fs::write(
        &path,
        r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":4,"uri":"gone.bin"}]}"#,
    )
    .unwrap();
    let err = Io::new().read(&path).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(p) if p.ends_with("gone.bin")));
}

#[test]
fn test_read_without_mmap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tri.glb");
    let mut doc = Document::new();
    two_attribute_mesh(&mut doc);
    let io = Io::new().with_reader_options(ReaderOptions { use_mmap: false });
    io.write(&path, &doc).unwrap();
    let back = io.read(&path).unwrap();
    assert_eq!(back.root().list_accessors(&back).len(), 2);
    let mapped = Io::new().read(&path).unwrap();
    assert_eq!(mapped.root().list_meshes(&mapped).len(), 1);
}
