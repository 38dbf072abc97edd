//! Graph lifecycle events.

use super::{LinkId, NodeId};

/// Emitted by [`Graph`](super::Graph) on every structural change.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphEvent {
    NodeCreated {
        node: NodeId,
        label: &'static str,
    },
    NodeDisposed {
        node: NodeId,
        label: &'static str,
    },
    LinkCreated {
        link: LinkId,
        name: &'static str,
        parent: NodeId,
        child: NodeId,
    },
    LinkDisposed {
        link: LinkId,
        name: &'static str,
        parent: NodeId,
        child: NodeId,
    },
    LinkSwapped {
        link: LinkId,
        old: NodeId,
        new: NodeId,
    },
}

/// Event subscriber. Must be `Send` so graphs can move between threads.
pub type Listener = Box<dyn FnMut(&GraphEvent) + Send>;
