//! Container codec: GLB and JSON (`.gltf` + resources) forms.
//!
//! [`Io`] is the entry point for files and byte slices. The lower layers are
//! public for callers that manage resources themselves: [`parse_glb`] and
//! [`read_document`] on the way in, [`plan_layout`], [`materialize`] and
//! [`write_document`] on the way out.

pub mod format;
pub mod schema;
mod context;
mod platform;
mod reader;
mod stream;
mod uri;
mod writer;

pub use context::{Dependencies, ReaderContext, WriterContext};
pub use format::{Format, VertexLayout};
pub use platform::{Io, ReaderOptions};
pub use reader::{parse_glb, read_document, JsonDocument, ReadPhase, GLB_BUFFER};
pub use stream::{ByteReader, ByteWriter};
pub use uri::{decode_data_uri, encode_data_uri, is_data_uri};
pub use writer::{
    assemble_glb, materialize, plan_layout, write_document, write_glb, AccessorPlan, BufferPlan, LayoutPlan,
    Materialized, SparsePlan, ViewContent, ViewPlan, WritePhase, WriterOptions,
};
