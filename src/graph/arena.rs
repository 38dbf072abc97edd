//! The node arena and link registry.

use super::{GraphEvent, GraphNode, Link, LinkId, LinkMeta, Listener, NodeId, Slot, Value};
use crate::util::{Error, Result};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// Directed graph of typed nodes joined by named links.
///
/// Nodes are never removed from the arena; disposal releases their links and
/// flags them, so stale ids stay safe to query. Link slots are not reused
/// either. Both grow with every create/dispose cycle; a long edit session
/// reclaims them by cloning the document, which copies live nodes only.
pub struct Graph {
    id: u32,
    nodes: Vec<GraphNode>,
    links: Vec<Option<Link>>,
    listeners: Vec<Listener>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("nodes", &self.node_count())
            .field("links", &self.link_count())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn slot_mismatch(attr: &str, expected: &str, actual: &Slot) -> Error {
    Error::TypeMismatch {
        expected: format!("{expected} attribute '{attr}'"),
        actual: actual.kind().to_string(),
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            links: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Process-unique graph identity.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Register a listener for every subsequent event.
    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    fn emit(&mut self, event: GraphEvent) {
        trace!(graph = self.id, ?event, "graph event");
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub fn create_node(&mut self, label: &'static str) -> NodeId {
        let id = NodeId {
            graph: self.id,
            index: self.nodes.len() as u32,
        };
        self.nodes.push(GraphNode::new(label));
        self.emit(GraphEvent::NodeCreated { node: id, label });
        id
    }

    /// True if `id` was issued by this graph.
    #[inline]
    pub fn owns(&self, id: NodeId) -> bool {
        id.graph == self.id && id.index() < self.nodes.len()
    }

    /// Node record. Panics for ids issued by another graph.
    pub fn node(&self, id: NodeId) -> &GraphNode {
        assert!(self.owns(id), "node {id} does not belong to graph {}", self.id);
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        assert!(self.owns(id), "node {id} does not belong to graph {}", self.id);
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn is_disposed(&self, id: NodeId) -> bool {
        self.node(id).disposed
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> + '_ {
        let graph = self.id;
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.disposed)
            .map(move |(i, n)| (NodeId { graph, index: i as u32 }, n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.disposed).count()
    }

    pub fn link_count(&self) -> usize {
        self.links.iter().flatten().count()
    }

    /// Node and link slots held, disposed ones included.
    pub fn allocated(&self) -> (usize, usize) {
        (self.nodes.len(), self.links.len())
    }

    fn check_live(&self, id: NodeId) -> Result<()> {
        if id.graph != self.id {
            return Err(Error::CrossGraph);
        }
        let node = self
            .nodes
            .get(id.index())
            .ok_or_else(|| Error::invalid(format!("unknown node {id}")))?;
        if node.disposed {
            return Err(Error::Disposed(format!("{} {id}", node.label)));
        }
        Ok(())
    }

    /// Release every link of `id` (disposing owned children) and flag it.
    pub fn dispose(&mut self, id: NodeId) {
        if !self.owns(id) || self.nodes[id.index()].disposed {
            return;
        }
        self.nodes[id.index()].disposed = true;
        let outbound = self.nodes[id.index()].outbound.clone();
        for link in outbound {
            self.unlink(link);
        }
        let inbound = self.nodes[id.index()].inbound.clone();
        for link in inbound {
            self.unlink(link);
        }
        let label = self.nodes[id.index()].label;
        self.emit(GraphEvent::NodeDisposed { node: id, label });
    }

    pub(crate) fn clear_attrs(&mut self, id: NodeId) {
        self.node_mut(id).attrs.clear();
    }

    pub(crate) fn init_slot(&mut self, id: NodeId, attr: &'static str, slot: Slot) {
        self.node_mut(id).slot_or_insert(attr, || slot);
    }

    // ========================================================================
    // Literals
    // ========================================================================

    pub fn get(&self, id: NodeId, attr: &str) -> Option<&Value> {
        match self.node(id).attr(attr)? {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: NodeId, attr: &str) -> Option<&mut Value> {
        match self.node_mut(id).attr_mut(attr)? {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn set(&mut self, id: NodeId, attr: &'static str, value: impl Into<Value>) {
        let slot = self.node_mut(id).slot_or_insert(attr, || Slot::Value(Value::Null));
        match slot {
            Slot::Value(v) => *v = value.into(),
            other => debug_assert!(false, "attribute '{attr}' is a {}", other.kind()),
        }
    }

    // ========================================================================
    // Links
    // ========================================================================

    #[inline]
    pub fn get_link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn create_link(
        &mut self,
        name: &'static str,
        parent: NodeId,
        child: NodeId,
        key: Option<String>,
        meta: LinkMeta,
    ) -> Result<LinkId> {
        self.check_live(parent)?;
        self.check_live(child)?;
        let id = LinkId(self.links.len() as u32);
        self.links.push(Some(Link {
            name,
            parent,
            child,
            key,
            meta,
        }));
        self.nodes[parent.index()].outbound.push(id);
        self.nodes[child.index()].inbound.push(id);
        self.emit(GraphEvent::LinkCreated {
            link: id,
            name,
            parent,
            child,
        });
        Ok(id)
    }

    /// Register an edge that no attribute slot holds. A `None` child yields
    /// no link. Slot-backed references go through `set_ref` and friends.
    pub fn link(
        &mut self,
        name: &'static str,
        parent: NodeId,
        child: Option<NodeId>,
        meta: LinkMeta,
    ) -> Result<Option<LinkId>> {
        match child {
            Some(child) => self.create_link(name, parent, child, None, meta).map(Some),
            None => Ok(None),
        }
    }

    /// Dispose a link. The child survives unless the link owns it.
    pub fn unlink(&mut self, id: LinkId) {
        let Some(link) = self.links.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        let parent = &mut self.nodes[link.parent.index()];
        if let Some(slot) = parent.attr_mut(link.name) {
            slot.forget(id);
        }
        parent.outbound.retain(|l| *l != id);
        self.nodes[link.child.index()].inbound.retain(|l| *l != id);
        self.emit(GraphEvent::LinkDisposed {
            link: id,
            name: link.name,
            parent: link.parent,
            child: link.child,
        });
        if link.meta.owned {
            self.dispose(link.child);
        }
    }

    fn child_of(&self, link: Option<LinkId>) -> Option<NodeId> {
        link.and_then(|l| self.get_link(l)).map(Link::child)
    }

    // ---- Ref ----

    pub fn get_ref(&self, id: NodeId, attr: &str) -> Option<NodeId> {
        match self.node(id).attr(attr)? {
            Slot::Ref(r) => self.child_of(*r),
            _ => None,
        }
    }

    pub fn get_ref_link(&self, id: NodeId, attr: &str) -> Option<&Link> {
        match self.node(id).attr(attr)? {
            Slot::Ref(Some(l)) => self.get_link(*l),
            _ => None,
        }
    }

    /// Replace the single reference `attr`. `None` only disposes the old link.
    pub fn set_ref(
        &mut self,
        id: NodeId,
        attr: &'static str,
        child: Option<NodeId>,
        meta: LinkMeta,
    ) -> Result<Option<LinkId>> {
        self.check_live(id)?;
        if let Some(child) = child {
            self.check_live(child)?;
        }
        let old = match self.node_mut(id).slot_or_insert(attr, || Slot::Ref(None)) {
            Slot::Ref(r) => *r,
            other => return Err(slot_mismatch(attr, "ref", other)),
        };
        if let Some(old) = old {
            self.unlink(old);
        }
        let Some(child) = child else {
            return Ok(None);
        };
        let link = self.create_link(attr, id, child, None, meta)?;
        if let Some(Slot::Ref(r)) = self.node_mut(id).attr_mut(attr) {
            *r = Some(link);
        }
        Ok(Some(link))
    }

    // ---- RefList / RefSet ----

    /// Children of a list or set attribute, in slot order.
    pub fn list_refs(&self, id: NodeId, attr: &str) -> Vec<NodeId> {
        self.list_ref_links(id, attr).into_iter().map(Link::child).collect()
    }

    pub fn list_ref_links(&self, id: NodeId, attr: &str) -> Vec<&Link> {
        match self.node(id).attr(attr) {
            Some(Slot::RefList(v) | Slot::RefSet(v)) => {
                v.iter().filter_map(|l| self.get_link(*l)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Append to an ordered list attribute.
    pub fn push_ref(
        &mut self,
        id: NodeId,
        attr: &'static str,
        child: NodeId,
        meta: LinkMeta,
    ) -> Result<LinkId> {
        self.check_live(id)?;
        self.check_live(child)?;
        match self.node_mut(id).slot_or_insert(attr, || Slot::RefList(Vec::new())) {
            Slot::RefList(_) => {}
            other => return Err(slot_mismatch(attr, "ref-list", other)),
        }
        let link = self.create_link(attr, id, child, None, meta)?;
        if let Some(Slot::RefList(v)) = self.node_mut(id).attr_mut(attr) {
            v.push(link);
        }
        Ok(link)
    }

    /// Add to a set attribute. Adding a present child returns its link.
    pub fn insert_ref(
        &mut self,
        id: NodeId,
        attr: &'static str,
        child: NodeId,
        meta: LinkMeta,
    ) -> Result<LinkId> {
        self.check_live(id)?;
        self.check_live(child)?;
        let existing = match self.node_mut(id).slot_or_insert(attr, || Slot::RefSet(Vec::new())) {
            Slot::RefSet(v) => v.clone(),
            other => return Err(slot_mismatch(attr, "ref-set", other)),
        };
        if let Some(link) = existing
            .into_iter()
            .find(|l| self.get_link(*l).is_some_and(|l| l.child == child))
        {
            return Ok(link);
        }
        let link = self.create_link(attr, id, child, None, meta)?;
        if let Some(Slot::RefSet(v)) = self.node_mut(id).attr_mut(attr) {
            v.push(link);
        }
        Ok(link)
    }

    /// Dispose every link in `attr` pointing at `child`. Returns the count.
    pub fn remove_ref(&mut self, id: NodeId, attr: &str, child: NodeId) -> usize {
        let links: Vec<LinkId> = match self.node(id).attr(attr) {
            Some(slot) => slot
                .link_ids()
                .into_iter()
                .filter(|l| self.get_link(*l).is_some_and(|l| l.child == child))
                .collect(),
            None => Vec::new(),
        };
        let count = links.len();
        for link in links {
            self.unlink(link);
        }
        count
    }

    // ---- RefMap ----

    pub fn get_ref_map(&self, id: NodeId, attr: &str, key: &str) -> Option<NodeId> {
        match self.node(id).attr(attr)? {
            Slot::RefMap(m) => self.child_of(m.get(key).copied()),
            _ => None,
        }
    }

    /// Set or clear one key. Re-setting replaces the link, taking the new
    /// metadata.
    pub fn set_ref_map(
        &mut self,
        id: NodeId,
        attr: &'static str,
        key: &str,
        child: Option<NodeId>,
        meta: LinkMeta,
    ) -> Result<Option<LinkId>> {
        self.check_live(id)?;
        if let Some(child) = child {
            self.check_live(child)?;
        }
        let old = match self.node_mut(id).slot_or_insert(attr, || Slot::RefMap(Default::default())) {
            Slot::RefMap(m) => m.get(key).copied(),
            other => return Err(slot_mismatch(attr, "ref-map", other)),
        };
        if let Some(old) = old {
            self.unlink(old);
        }
        let Some(child) = child else {
            return Ok(None);
        };
        let link = self.create_link(attr, id, child, Some(key.to_string()), meta)?;
        if let Some(Slot::RefMap(m)) = self.node_mut(id).attr_mut(attr) {
            m.insert(key.to_string(), link);
        }
        Ok(Some(link))
    }

    /// Entries of a map attribute, sorted by key.
    pub fn list_ref_map(&self, id: NodeId, attr: &str) -> Vec<(String, NodeId)> {
        match self.node(id).attr(attr) {
            Some(Slot::RefMap(m)) => m
                .iter()
                .filter_map(|(k, l)| Some((k.clone(), self.get_link(*l)?.child)))
                .collect(),
            _ => Vec::new(),
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    pub fn parent_links(&self, id: NodeId) -> impl Iterator<Item = &Link> + '_ {
        self.node(id).inbound.iter().filter_map(|l| self.get_link(*l))
    }

    pub fn child_links(&self, id: NodeId) -> impl Iterator<Item = &Link> + '_ {
        self.node(id).outbound.iter().filter_map(|l| self.get_link(*l))
    }

    /// Distinct parents, in link order.
    pub fn list_parents(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.parent_links(id)
            .map(Link::parent)
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Distinct children, in link order.
    pub fn list_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.child_links(id)
            .map(Link::child)
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Retarget every `parent -> old` link onto `new`, keeping link identity,
    /// name, key and metadata. Set entries that become duplicates collapse.
    pub fn swap(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<usize> {
        self.check_live(parent)?;
        self.check_live(new)?;
        if old.graph != self.id {
            return Err(Error::CrossGraph);
        }
        if old == new {
            return Ok(0);
        }
        let swapped: Vec<LinkId> = self
            .node(parent)
            .outbound
            .iter()
            .copied()
            .filter(|l| self.get_link(*l).is_some_and(|l| l.child == old))
            .collect();

        for &id in &swapped {
            if let Some(link) = self.links[id.0 as usize].as_mut() {
                link.child = new;
            }
            self.nodes[old.index()].inbound.retain(|l| *l != id);
            self.nodes[new.index()].inbound.push(id);
            self.emit(GraphEvent::LinkSwapped { link: id, old, new });
        }

        for &id in &swapped {
            let Some(name) = self.get_link(id).map(Link::name) else {
                continue;
            };
            let duplicate = match self.node(parent).attr(name) {
                Some(Slot::RefSet(v)) => v.iter().any(|other| {
                    *other != id && self.get_link(*other).is_some_and(|l| l.child == new)
                }),
                _ => false,
            };
            if duplicate {
                self.unlink(id);
            }
        }
        Ok(swapped.len())
    }

    /// Dispose inbound links of `id` accepted by `predicate`, which sees each
    /// link and its parent node. Returns the count.
    pub fn disconnect_parents(
        &mut self,
        id: NodeId,
        mut predicate: impl FnMut(&Link, &GraphNode) -> bool,
    ) -> usize {
        let links: Vec<LinkId> = self
            .node(id)
            .inbound
            .iter()
            .copied()
            .filter(|l| {
                self.get_link(*l)
                    .is_some_and(|link| predicate(link, &self.nodes[link.parent.index()]))
            })
            .collect();
        let count = links.len();
        for link in links {
            self.unlink(link);
        }
        count
    }

    /// Every node reachable from `root` through outbound links, `root` included.
    pub fn reachable_from(&self, root: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if self.owns(root) && !self.is_disposed(root) {
            seen.insert(root);
            queue.push_back(root);
        }
        while let Some(id) = queue.pop_front() {
            for child in self.child_links(id).map(Link::child) {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn pair() -> (Graph, NodeId, NodeId) {
        let mut g = Graph::new();
        let a = g.create_node("A");
        let b = g.create_node("B");
        (g, a, b)
    }

    #[test]
    fn test_set_ref_none_keeps_child() {
        let (mut g, a, b) = pair();
        assert!(g.set_ref(a, "target", None, LinkMeta::default()).unwrap().is_none());
        g.set_ref(a, "target", Some(b), LinkMeta::default()).unwrap();
        assert_eq!(g.get_ref(a, "target"), Some(b));
        assert_eq!(g.list_parents(b), vec![a]);

        g.set_ref(a, "target", None, LinkMeta::default()).unwrap();
        assert_eq!(g.get_ref(a, "target"), None);
        assert!(g.list_parents(b).is_empty());
        assert!(!g.is_disposed(b));
        assert_eq!(g.link_count(), 0);
    }

    #[test]
    fn test_cross_graph_link_fails() {
        let (mut g, a, _) = pair();
        let mut other = Graph::new();
        let foreign = other.create_node("B");
        let err = g.set_ref(a, "target", Some(foreign), LinkMeta::default()).unwrap_err();
        assert!(matches!(err, Error::CrossGraph));
        assert_eq!(g.link_count(), 0);
    }

    #[test]
    fn test_free_link() {
        let (mut g, a, b) = pair();
        assert!(g.link("uses", a, None, LinkMeta::default()).unwrap().is_none());
        assert_eq!(g.link_count(), 0);
        let l = g.link("uses", a, Some(b), LinkMeta::default()).unwrap().unwrap();
        assert_eq!(g.list_children(a), vec![b]);
        g.unlink(l);
        assert!(g.list_parents(b).is_empty());
    }

    #[test]
    fn test_ref_set_ignores_duplicates() {
        let (mut g, a, b) = pair();
        let l1 = g.insert_ref(a, "items", b, LinkMeta::default()).unwrap();
        let l2 = g.insert_ref(a, "items", b, LinkMeta::default()).unwrap();
        assert_eq!(l1, l2);
        assert_eq!(g.list_refs(a, "items"), vec![b]);
    }

    #[test]
    fn test_ref_map_replace_takes_new_meta() {
        let (mut g, a, b) = pair();
        g.set_ref_map(a, "map", "k", Some(b), LinkMeta::channels(1)).unwrap();
        g.set_ref_map(a, "map", "k", Some(b), LinkMeta::channels(4)).unwrap();
        let links: Vec<_> = g.child_links(a).collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].meta().channels, Some(4));
        assert_eq!(links[0].key(), Some("k"));

        g.set_ref_map(a, "map", "k", None, LinkMeta::default()).unwrap();
        assert!(g.list_ref_map(a, "map").is_empty());
    }

    #[test]
    fn test_dispose_releases_links() {
        let (mut g, a, b) = pair();
        let c = g.create_node("C");
        g.push_ref(a, "list", b, LinkMeta::default()).unwrap();
        g.set_ref(b, "next", Some(c), LinkMeta::default()).unwrap();
        g.dispose(b);
        assert!(g.is_disposed(b));
        assert!(g.list_refs(a, "list").is_empty());
        assert!(g.list_parents(c).is_empty());
        assert!(!g.is_disposed(c));
        assert!(matches!(
            g.push_ref(a, "list", b, LinkMeta::default()),
            Err(Error::Disposed(_))
        ));
    }

    #[test]
    fn test_owned_child_disposed_with_link() {
        let (mut g, a, b) = pair();
        g.set_ref(a, "info", Some(b), LinkMeta::owned()).unwrap();
        g.dispose(a);
        assert!(g.is_disposed(b));
    }

    #[test]
    fn test_swap_preserves_link_and_collapses_sets() {
        let (mut g, a, b) = pair();
        let c = g.create_node("B");
        let link = g.set_ref(a, "one", Some(b), LinkMeta::channels(2)).unwrap().unwrap();
        g.insert_ref(a, "set", b, LinkMeta::default()).unwrap();
        g.insert_ref(a, "set", c, LinkMeta::default()).unwrap();

        let n = g.swap(a, b, c).unwrap();
        assert_eq!(n, 2);
        assert_eq!(g.get_ref(a, "one"), Some(c));
        assert_eq!(g.get_ref_link(a, "one").unwrap().meta().channels, Some(2));
        assert_eq!(g.get_link(link).unwrap().child(), c);
        assert_eq!(g.list_refs(a, "set"), vec![c]);
        assert!(g.list_parents(b).is_empty());
    }

    #[test]
    fn test_disconnect_parents_predicate() {
        let (mut g, a, b) = pair();
        let keep = g.create_node("Keep");
        g.insert_ref(keep, "all", b, LinkMeta::default()).unwrap();
        g.set_ref(a, "x", Some(b), LinkMeta::default()).unwrap();
        let n = g.disconnect_parents(b, |_, parent| parent.label() != "Keep");
        assert_eq!(n, 1);
        assert_eq!(g.list_parents(b), vec![keep]);
    }

    #[test]
    fn test_reachability() {
        let (mut g, a, b) = pair();
        let orphan = g.create_node("C");
        g.set_ref(a, "x", Some(b), LinkMeta::default()).unwrap();
        let live = g.reachable_from(a);
        assert!(live.contains(&a) && live.contains(&b));
        assert!(!live.contains(&orphan));
    }

    #[test]
    fn test_events_delivered() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut g = Graph::new();
        g.add_listener(Box::new(move |e| sink.lock().unwrap().push(e.clone())));
        let a = g.create_node("A");
        let b = g.create_node("B");
        g.set_ref(a, "x", Some(b), LinkMeta::default()).unwrap();
        g.dispose(b);
        let events = seen.lock().unwrap();
        assert!(matches!(events[0], GraphEvent::NodeCreated { label: "A", .. }));
        assert!(matches!(events[2], GraphEvent::LinkCreated { name: "x", .. }));
        assert!(matches!(events[3], GraphEvent::LinkDisposed { .. }));
        assert!(matches!(events[4], GraphEvent::NodeDisposed { label: "B", .. }));
    }
}
