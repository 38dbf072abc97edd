//! Integration tests for writing documents and reading them back.

use gltf_graph::extensions::{self, EmissiveStrength};
use gltf_graph::io::{parse_glb, Io, GLB_BUFFER};
use gltf_graph::prelude::*;

use tempfile::tempdir;

fn triangle(doc: &mut Document) -> (Scene, Node, Primitive) {
    let scene = doc.create_scene("main");
    let node = doc.create_node("tri");
    scene.add_child(doc, node).expect("add node");
    doc.root().set_default_scene(doc, Some(scene)).expect("default scene");

    let mesh = doc.create_mesh("tri");
    let positions = doc.create_accessor("positions");
    positions.set_element_type(doc, ElementType::Vec3).expect("element type");
    positions
        .set_array(doc, TypedArray::F32(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]))
        .expect("array");
    let prim = doc.create_primitive();
    prim.set_attribute(doc, "POSITION", Some(positions)).expect("attribute");
    mesh.add_primitive(doc, prim).expect("primitive");
    node.set_mesh(doc, Some(mesh)).expect("mesh");
    (scene, node, prim)
}

#[test]
fn test_minimal_glb_roundtrip() {
    let mut doc = Document::new();
    triangle(&mut doc);

    let glb = Io::new().write_binary(&doc).expect("write");
    assert_eq!(glb.len() % 4, 0);

    let parsed = parse_glb(&glb).expect("parse");
    assert_eq!(parsed.json.buffer_views.len(), 1);
    assert_eq!(parsed.json.buffers[0].byte_length, 36);
    assert_eq!(parsed.json.accessors[0].min, Some(vec![0.0, 0.0, 0.0]));
    assert_eq!(parsed.json.accessors[0].max, Some(vec![1.0, 1.0, 0.0]));
    assert_eq!(parsed.resources[GLB_BUFFER].len(), 36);

    let back = Io::new().read_binary(&glb).expect("read");
    let root = back.root();
    assert_eq!(root.list_scenes(&back).len(), 1);
    assert_eq!(root.list_nodes(&back).len(), 1);
    assert_eq!(root.list_accessors(&back).len(), 1);

    let scene = root.default_scene(&back).expect("default scene");
    assert_eq!(scene.name(&back), "main");
    let node = scene.list_children(&back)[0];
    let prim = node.mesh(&back).expect("mesh").list_primitives(&back)[0];
    let positions = prim.attribute(&back, "POSITION").expect("POSITION");
    assert_eq!(positions.element_type(&back), ElementType::Vec3);
    assert_eq!(positions.count(&back), 3);
    assert_eq!(positions.element(&back, 1).unwrap(), vec![1.0, 0.0, 0.0]);
    assert_eq!(positions.element(&back, 2).unwrap(), vec![0.0, 1.0, 0.0]);
}

#[test]
fn test_roundtrip_through_json_files() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("scene.gltf");

    let mut doc = Document::new();
    let (_, _, prim) = triangle(&mut doc);
    let indices = doc.create_accessor("indices");
    indices.set_array(&mut doc, TypedArray::U16(vec![0, 1, 2])).unwrap();
    prim.set_indices(&mut doc, Some(indices)).unwrap();
    let material = doc.create_material("red");
    material.set_base_color_factor(&mut doc, [1.0, 0.0, 0.0, 1.0]);
    let texture = doc.create_texture("albedo");
    texture.set_image(&mut doc, vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    material.set_texture(&mut doc, TextureSlot::BaseColor, Some(texture)).unwrap();
    prim.set_material(&mut doc, Some(material)).unwrap();

    let io = Io::new();
    io.write(&path, &doc).expect("write");
    assert!(dir.path().join("scene.bin").exists());
    assert!(dir.path().join("scene_0.png").exists());

    let back = io.read(&path).expect("read");
    let root = back.root();
    let prim = root.list_meshes(&back)[0].list_primitives(&back)[0];
    let indices = prim.indices(&back).expect("indices");
    assert_eq!(indices.array(&back), &TypedArray::U16(vec![0, 1, 2]));
    let material = prim.material(&back).expect("material");
    assert_eq!(material.name(&back), "red");
    assert_eq!(material.base_color_factor(&back), [1.0, 0.0, 0.0, 1.0]);
    let texture = material.texture(&back, TextureSlot::BaseColor).expect("texture");
    assert_eq!(texture.mime_type(&back), "image/png");
    assert_eq!(texture.image(&back).len(), 8);
}

#[test]
fn test_normalized_u8_roundtrip() {
    let mut doc = Document::new();
    let colors = doc.create_accessor("colors");
    colors.set_element_type(&mut doc, ElementType::Vec4).unwrap();
    colors.set_array(&mut doc, TypedArray::U8(vec![0; 8])).unwrap();
    colors.set_normalized(&mut doc, true);
    colors.set_element(&mut doc, 0, &[1.0, 0.0, 0.5, 1.0]).unwrap();
    assert_eq!(colors.array(&doc).get(0), 255.0);
    assert_eq!(colors.array(&doc).get(2), 128.0);

    let back = Io::new().read_binary(&Io::new().write_binary(&doc).unwrap()).unwrap();
    let colors = back.root().list_accessors(&back)[0];
    assert!(colors.normalized(&back));
    let first = colors.element(&back, 0).unwrap();
    assert_eq!(first[0], 1.0);
    assert_eq!(first[1], 0.0);
    assert!((first[2] - 128.0 / 255.0).abs() < 1e-6);
}

#[test]
fn test_extension_roundtrip() {
    let mut doc = Document::new();
    for ext in extensions::builtin() {
        doc.register_extension(ext);
    }
    let material = doc.create_material("glow");
    let prop = doc.create_extension_property(EmissiveStrength::NAME).unwrap();
    EmissiveStrength::set_strength(&mut doc, prop, 4.0);
    material.set_extension(&mut doc, EmissiveStrength::NAME, Some(prop)).unwrap();

    let io = Io::new().register_extensions(extensions::builtin());
    let glb = io.write_binary(&doc).unwrap();
    let parsed = parse_glb(&glb).unwrap();
    assert_eq!(parsed.json.extensions_used, vec![EmissiveStrength::NAME.to_string()]);

    let back = io.read_binary(&glb).unwrap();
    let material = back.root().list_materials(&back)[0];
    let prop = material.get_extension(&back, EmissiveStrength::NAME).expect("extension");
    assert_eq!(EmissiveStrength::strength(&back, prop), 4.0);

    // Without the extension registered the payload is dropped, not fatal.
    let plain = Io::new().read_binary(&glb).unwrap();
    let material = plain.root().list_materials(&plain)[0];
    assert!(material.list_extensions(&plain).is_empty());
}

#[test]
fn test_animation_skin_camera_roundtrip() {
    let mut doc = Document::new();
    let (_, node, _) = triangle(&mut doc);

    let times = doc.create_accessor("times");
    times.set_array(&mut doc, TypedArray::F32(vec![0.0, 1.0])).unwrap();
    let values = doc.create_accessor("values");
    values.set_element_type(&mut doc, ElementType::Vec3).unwrap();
    values.set_array(&mut doc, TypedArray::F32(vec![0.0, 0.0, 0.0, 0.0, 2.0, 0.0])).unwrap();
    let anim = doc.create_animation("move");
    let sampler = doc.create_animation_sampler();
    sampler.set_input(&mut doc, Some(times)).unwrap();
    sampler.set_output(&mut doc, Some(values)).unwrap();
    anim.add_sampler(&mut doc, sampler).unwrap();
    let channel = doc.create_animation_channel();
    channel.set_sampler(&mut doc, Some(sampler)).unwrap();
    channel.set_target_node(&mut doc, Some(node)).unwrap();
    channel.set_target_path(&mut doc, Some(TargetPath::Translation));
    anim.add_channel(&mut doc, channel).unwrap();

    let camera = doc.create_camera("cam");
    camera.set_yfov(&mut doc, 0.8);
    camera.set_zfar(&mut doc, Some(100.0));
    node.set_camera(&mut doc, Some(camera)).unwrap();

    let skin = doc.create_skin("rig");
    skin.add_joint(&mut doc, node).unwrap();
    node.set_skin(&mut doc, Some(skin)).unwrap();

    let back = Io::new().read_binary(&Io::new().write_binary(&doc).unwrap()).unwrap();
    let root = back.root();
    let anim = root.list_animations(&back)[0];
    let channel = anim.list_channels(&back)[0];
    assert_eq!(channel.target_path(&back), Some(TargetPath::Translation));
    let node = channel.target_node(&back).expect("target");
    assert_eq!(node.name(&back), "tri");
    let output = channel.sampler(&back).and_then(|s| s.output(&back)).expect("output");
    assert_eq!(output.element(&back, 1).unwrap(), vec![0.0, 2.0, 0.0]);

    let camera = node.camera(&back).expect("camera");
    assert_eq!(camera.yfov(&back), 0.8);
    assert_eq!(camera.zfar(&back), Some(100.0));
    assert_eq!(node.skin(&back).expect("skin").list_joints(&back), vec![node]);
}

#[test]
fn test_double_roundtrip_is_stable() {
    let mut doc = Document::new();
    triangle(&mut doc);
    let io = Io::new();
    let first = io.write_binary(&doc).unwrap();
    let second = io.write_binary(&io.read_binary(&first).unwrap()).unwrap();
    assert_eq!(first, second);
}
