//! gltf-graph CLI - inspect and convert glTF assets.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use gltf_graph::extensions;
use gltf_graph::prelude::*;
use gltf_graph::transform::{Dedup, Metadata, Prune};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "GLTF_GRAPH_LOG";

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("gltf-graph");

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    let Some(&command) = filtered_args.first() else {
        print_usage(prog);
        return ExitCode::SUCCESS;
    };

    let result = match command {
        "info" | "i" => match filtered_args.get(1) {
            Some(path) => cmd_info(path),
            None => {
                eprintln!("Usage: {prog} info <file>");
                return ExitCode::FAILURE;
            }
        },
        "convert" | "c" => match (filtered_args.get(1), filtered_args.get(2)) {
            (Some(input), Some(output)) => cmd_convert(input, output, &filtered_args[3..]),
            _ => {
                eprintln!("Usage: {prog} convert <input> <output> [--separate] [--prune] [--dedup]");
                return ExitCode::FAILURE;
            }
        },
        "help" | "h" | "-h" | "--help" => {
            print_usage(prog);
            Ok(())
        }
        other if Path::new(other).exists() => cmd_info(other),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage(prog);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage(prog: &str) {
    println!("gltf-graph - inspect and convert glTF 2.0 assets");
    println!();
    println!("Usage: {prog} [options] <command> <file>");
    println!();
    println!("Commands:");
    println!("  i, info <file>             Show asset summary");
    println!("  c, convert <in> <out>      Rewrite as .glb or .gltf (by extension)");
    println!("       --separate            One buffer view per vertex attribute");
    println!("       --prune               Drop unused properties first");
    println!("       --dedup               Merge duplicate data first");
    println!("  h, help                    Show this help");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Errors only");
    println!();
    println!("{LOG_ENV} overrides the log filter, e.g. {LOG_ENV}=gltf_graph=debug");
}

fn io() -> Io {
    Io::new().register_extensions(extensions::builtin())
}

fn cmd_info(path: &str) -> Result<()> {
    info!("Opening {path}");
    let doc = io().read(path)?;
    let root = doc.root();
    let asset = root.asset(&doc);

    println!("File: {path}");
    println!("Version: {}", asset.version);
    if let Some(generator) = &asset.generator {
        println!("Generator: {generator}");
    }
    if let Some(copyright) = &asset.copyright {
        println!("Copyright: {copyright}");
    }
    println!();

    let meshes = root.list_meshes(&doc);
    let primitives: usize = meshes.iter().map(|m| m.list_primitives(&doc).len()).sum();
    let vertices: usize = meshes
        .iter()
        .flat_map(|m| m.list_primitives(&doc))
        .filter_map(|p| p.vertex_count(&doc))
        .sum();
    let image_bytes: usize = root
        .list_textures(&doc)
        .iter()
        .map(|t| t.image(&doc).len())
        .sum();

    println!("Properties:");
    println!("  Scenes:     {}", root.list_scenes(&doc).len());
    println!("  Nodes:      {}", root.list_nodes(&doc).len());
    println!("  Meshes:     {} ({primitives} primitives, {vertices} vertices)", meshes.len());
    println!("  Materials:  {}", root.list_materials(&doc).len());
    println!("  Textures:   {} ({image_bytes} bytes)", root.list_textures(&doc).len());
    println!("  Accessors:  {}", root.list_accessors(&doc).len());
    println!("  Buffers:    {}", root.list_buffers(&doc).len());
    println!("  Animations: {}", root.list_animations(&doc).len());
    println!("  Skins:      {}", root.list_skins(&doc).len());
    println!("  Cameras:    {}", root.list_cameras(&doc).len());

    let extensions: Vec<String> = doc
        .list_extensions()
        .map(|e| {
            let name = e.extension.name();
            if e.required {
                format!("{name} (required)")
            } else {
                name.to_string()
            }
        })
        .collect();
    if !extensions.is_empty() {
        println!();
        println!("Extensions:");
        for ext in extensions {
            println!("  {ext}");
        }
    }

    if let Some(scene) = root.default_scene(&doc) {
        let bounds = scene.bounds(&doc);
        println!();
        println!("Default scene: {}", scene.describe(&doc));
        println!("  Bounds: {:?} .. {:?}", bounds.min, bounds.max);
    }
    Ok(())
}

fn cmd_convert(input: &str, output: &str, flags: &[&str]) -> Result<()> {
    let mut layout = VertexLayout::Interleaved;
    let mut pipeline = Pipeline::new();
    for flag in flags {
        match *flag {
            "--separate" => layout = VertexLayout::Separate,
            "--prune" => pipeline = pipeline.then(Prune::default()),
            "--dedup" => pipeline = pipeline.then(Dedup::default()),
            other => return Err(Error::other(format!("unknown convert flag: {other}"))),
        }
    }
    pipeline = pipeline.then(Metadata::default());

    let base = io();
    let options = base.writer_options().clone().with_vertex_layout(layout);
    let io = base.with_writer_options(options);

    info!("Reading {input}");
    let mut doc = io.read(input)?;
    let steps = pipeline.len();
    pipeline
        .before(|name, _| debug!("running {name}"))
        .run(&mut doc)?;
    debug!(steps, "transforms applied");
    info!("Writing {output}");
    io.write(output, &doc)?;
    Ok(())
}
