//! # gltf-graph
//!
//! In-memory editing of glTF 2.0 assets.
//!
//! A [`Document`] holds every scene entity as a node of a property graph, so
//! references stay consistent while properties are created, relinked and
//! disposed. The [`io`] module reads and writes the binary (`.glb`) and JSON
//! (`.gltf` + resources) container forms; [`transform`] holds document-level
//! processing steps.
//!
//! ## Modules
//!
//! - [`util`] - Errors, component/element types, typed arrays, math helpers
//! - [`graph`] - Generic node/link graph with lifecycle events
//! - [`properties`] - Typed property handles (Scene, Node, Mesh, Accessor, ...)
//! - [`document`] - Document: factories, clone, merge, transforms
//! - [`io`] - GLB and JSON codec
//! - [`transform`] - Transform trait, pipeline and built-in transforms
//! - [`extensions`] - Extension trait and reference extensions
//!
//! ## Example
//!
//! ```no_run
//! use gltf_graph::prelude::*;
//!
//! let io = Io::new().register_extensions(gltf_graph::extensions::builtin());
//! let mut doc = io.read("scene.gltf")?;
//! prune(&mut doc, &PruneOptions::default());
//! io.write("scene.glb", &doc)?;
//! # Ok::<(), gltf_graph::Error>(())
//! ```

pub mod util;
pub mod graph;
pub mod properties;
pub mod document;
pub mod extensions;
pub mod io;
pub mod transform;

// Re-export commonly used types
pub use document::Document;
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::document::Document;
    pub use crate::io::{Format, Io, VertexLayout, WriterOptions};
    pub use crate::properties::*;
    pub use crate::transform::{dedup, prune, DedupOptions, Pipeline, PruneOptions, Transform};
    pub use crate::util::{ComponentType, ElementType, Error, Result, TypedArray};
}
