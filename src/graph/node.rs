//! Graph nodes and their attribute tables.

use super::{LinkId, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Node identity: owning graph plus arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) graph: u32,
    pub(crate) index: u32,
}

impl NodeId {
    /// Arena index, unique within the owning graph.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Identity of the owning graph.
    #[inline]
    pub fn graph(self) -> u32 {
        self.graph
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.graph, self.index)
    }
}

/// One attribute slot.
///
/// Reference slots hold link ids only; the link carries the child.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Value(Value),
    Ref(Option<LinkId>),
    RefList(Vec<LinkId>),
    RefSet(Vec<LinkId>),
    RefMap(BTreeMap<String, LinkId>),
}

impl Slot {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Ref(_) => "ref",
            Self::RefList(_) => "ref-list",
            Self::RefSet(_) => "ref-set",
            Self::RefMap(_) => "ref-map",
        }
    }

    /// True for null literals and reference slots without links.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Value(v) => v.is_null(),
            Self::Ref(r) => r.is_none(),
            Self::RefList(v) | Self::RefSet(v) => v.is_empty(),
            Self::RefMap(m) => m.is_empty(),
        }
    }

    /// Link ids in slot order.
    pub fn link_ids(&self) -> Vec<LinkId> {
        match self {
            Self::Value(_) => Vec::new(),
            Self::Ref(r) => r.iter().copied().collect(),
            Self::RefList(v) | Self::RefSet(v) => v.clone(),
            Self::RefMap(m) => m.values().copied().collect(),
        }
    }

    /// Drop `link` from the slot, if present.
    pub(crate) fn forget(&mut self, link: LinkId) {
        match self {
            Self::Value(_) => {}
            Self::Ref(r) => {
                if *r == Some(link) {
                    *r = None;
                }
            }
            Self::RefList(v) | Self::RefSet(v) => v.retain(|l| *l != link),
            Self::RefMap(m) => m.retain(|_, l| *l != link),
        }
    }
}

/// An arena entry: type label, attributes, and inbound/outbound link lists.
#[derive(Clone, Debug)]
pub struct GraphNode {
    pub(crate) label: &'static str,
    pub(crate) attrs: SmallVec<[(&'static str, Slot); 8]>,
    pub(crate) inbound: Vec<LinkId>,
    pub(crate) outbound: Vec<LinkId>,
    pub(crate) disposed: bool,
}

impl GraphNode {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            attrs: SmallVec::new(),
            inbound: Vec::new(),
            outbound: Vec::new(),
            disposed: false,
        }
    }

    /// Type label given at creation.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn attr(&self, name: &str) -> Option<&Slot> {
        self.attrs.iter().find(|(n, _)| *n == name).map(|(_, s)| s)
    }

    pub(crate) fn attr_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.attrs.iter_mut().find(|(n, _)| *n == name).map(|(_, s)| s)
    }

    /// Slot `name`, created with `init` when missing.
    pub(crate) fn slot_or_insert(&mut self, name: &'static str, init: impl FnOnce() -> Slot) -> &mut Slot {
        let pos = match self.attrs.iter().position(|(n, _)| *n == name) {
            Some(pos) => pos,
            None => {
                self.attrs.push((name, init()));
                self.attrs.len() - 1
            }
        };
        &mut self.attrs[pos].1
    }

    /// Attributes in declaration order.
    pub fn attrs(&self) -> impl Iterator<Item = (&'static str, &Slot)> {
        self.attrs.iter().map(|(n, s)| (*n, s))
    }

    /// Links pointing at this node.
    #[inline]
    pub fn inbound(&self) -> &[LinkId] {
        &self.inbound
    }

    /// Links leaving this node.
    #[inline]
    pub fn outbound(&self) -> &[LinkId] {
        &self.outbound
    }
}
