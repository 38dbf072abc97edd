//! Generic property graph.
//!
//! Nodes live in an arena owned by [`Graph`] and are addressed by [`NodeId`].
//! Every reference between nodes is a [`Link`] registered with the graph, so
//! parent lookup, disposal and retargeting ([`Graph::swap`]) stay consistent.
//! Nothing here knows about glTF; the property layer gives labels and
//! attribute names their meaning.

mod arena;
mod events;
mod link;
mod node;
mod snapshot;
mod value;

pub use arena::Graph;
pub use events::{GraphEvent, Listener};
pub use link::{channels, BufferUsage, Link, LinkId, LinkMeta};
pub use node::{GraphNode, NodeId, Slot};
pub use snapshot::{NodeSnapshot, SnapshotRef, SnapshotSlot};
pub use value::Value;
