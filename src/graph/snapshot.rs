//! Node snapshots for copy-with-resolve, and structural equality.
//!
//! A snapshot captures a node's literals and the children of its reference
//! slots. Applying it to another node (possibly in another graph) recreates
//! the literals and links each reference to `resolve(child)`. Owned children
//! are captured recursively and recreated rather than resolved.

use super::{Graph, LinkId, LinkMeta, NodeId, Slot, Value};
use crate::util::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Detached copy of one node's attribute table.
#[derive(Clone, Debug)]
pub struct NodeSnapshot {
    pub label: &'static str,
    pub attrs: Vec<(&'static str, SnapshotSlot)>,
}

#[derive(Clone, Debug)]
pub enum SnapshotSlot {
    Value(Value),
    Ref(Option<SnapshotRef>),
    RefList(Vec<SnapshotRef>),
    RefSet(Vec<SnapshotRef>),
    RefMap(Vec<(String, SnapshotRef)>),
}

#[derive(Clone, Debug)]
pub struct SnapshotRef {
    pub child: NodeId,
    pub label: &'static str,
    pub meta: LinkMeta,
    /// Present for owned children, which are recreated instead of resolved
    pub owned: Option<Box<NodeSnapshot>>,
}

impl NodeSnapshot {
    /// All references of this snapshot, without descending into owned ones.
    pub fn refs(&self) -> Vec<&SnapshotRef> {
        let mut out = Vec::new();
        for (_, slot) in &self.attrs {
            match slot {
                SnapshotSlot::Value(_) => {}
                SnapshotSlot::Ref(r) => out.extend(r.iter()),
                SnapshotSlot::RefList(v) | SnapshotSlot::RefSet(v) => out.extend(v.iter()),
                SnapshotSlot::RefMap(m) => out.extend(m.iter().map(|(_, r)| r)),
            }
        }
        out
    }
}

fn unresolved(r: &SnapshotRef) -> Error {
    Error::UnresolvedReference(format!("{} {}", r.label, r.child))
}

impl Graph {
    pub fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = self.node(id);
        NodeSnapshot {
            label: node.label(),
            attrs: node
                .attrs()
                .map(|(name, slot)| (name, self.snapshot_slot(slot)))
                .collect(),
        }
    }

    fn snapshot_ref(&self, link: LinkId) -> Option<SnapshotRef> {
        let link = self.get_link(link)?;
        Some(SnapshotRef {
            child: link.child(),
            label: self.node(link.child()).label(),
            meta: *link.meta(),
            owned: link
                .meta()
                .owned
                .then(|| Box::new(self.snapshot(link.child()))),
        })
    }

    fn snapshot_slot(&self, slot: &Slot) -> SnapshotSlot {
        match slot {
            Slot::Value(v) => SnapshotSlot::Value(v.clone()),
            Slot::Ref(r) => SnapshotSlot::Ref(r.and_then(|l| self.snapshot_ref(l))),
            Slot::RefList(v) => {
                SnapshotSlot::RefList(v.iter().filter_map(|l| self.snapshot_ref(*l)).collect())
            }
            Slot::RefSet(v) => {
                SnapshotSlot::RefSet(v.iter().filter_map(|l| self.snapshot_ref(*l)).collect())
            }
            Slot::RefMap(m) => SnapshotSlot::RefMap(
                m.iter()
                    .filter_map(|(k, l)| Some((k.clone(), self.snapshot_ref(*l)?)))
                    .collect(),
            ),
        }
    }

    /// Overwrite `target` with `snapshot`, linking references to `resolve(child)`.
    ///
    /// Every reference is resolved before anything is mutated, so an unresolved
    /// child leaves `target` untouched.
    pub fn apply_snapshot(
        &mut self,
        target: NodeId,
        snapshot: &NodeSnapshot,
        resolve: &mut dyn FnMut(NodeId) -> Option<NodeId>,
    ) -> Result<()> {
        let label = self.node(target).label();
        if self.is_disposed(target) {
            return Err(Error::Disposed(format!("{label} {target}")));
        }
        if label != snapshot.label {
            return Err(Error::TypeMismatch {
                expected: label.to_string(),
                actual: snapshot.label.to_string(),
            });
        }
        let mut resolved = HashMap::new();
        self.resolve_refs(snapshot, resolve, &mut resolved)?;
        self.write_snapshot(target, snapshot, &resolved)
    }

    fn resolve_refs(
        &self,
        snapshot: &NodeSnapshot,
        resolve: &mut dyn FnMut(NodeId) -> Option<NodeId>,
        out: &mut HashMap<NodeId, NodeId>,
    ) -> Result<()> {
        for r in snapshot.refs() {
            if let Some(owned) = &r.owned {
                self.resolve_refs(owned, resolve, out)?;
                continue;
            }
            if out.contains_key(&r.child) {
                continue;
            }
            let mapped = resolve(r.child).ok_or_else(|| unresolved(r))?;
            if mapped.graph() != self.id() {
                return Err(Error::CrossGraph);
            }
            if !self.owns(mapped) || self.is_disposed(mapped) {
                return Err(unresolved(r));
            }
            out.insert(r.child, mapped);
        }
        Ok(())
    }

    fn materialize_ref(&mut self, r: &SnapshotRef, resolved: &HashMap<NodeId, NodeId>) -> Result<NodeId> {
        match &r.owned {
            Some(snapshot) => {
                let child = self.create_node(snapshot.label);
                self.write_snapshot(child, snapshot, resolved)?;
                Ok(child)
            }
            None => resolved.get(&r.child).copied().ok_or_else(|| unresolved(r)),
        }
    }

    fn write_snapshot(
        &mut self,
        target: NodeId,
        snapshot: &NodeSnapshot,
        resolved: &HashMap<NodeId, NodeId>,
    ) -> Result<()> {
        let outbound = self.node(target).outbound().to_vec();
        for link in outbound {
            self.unlink(link);
        }
        self.clear_attrs(target);

        for (name, slot) in &snapshot.attrs {
            let name = *name;
            match slot {
                SnapshotSlot::Value(v) => self.set(target, name, v.clone()),
                SnapshotSlot::Ref(r) => {
                    self.set_ref(target, name, None, LinkMeta::default())?;
                    if let Some(r) = r {
                        let child = self.materialize_ref(r, resolved)?;
                        self.set_ref(target, name, Some(child), r.meta)?;
                    }
                }
                SnapshotSlot::RefList(v) => {
                    self.init_slot(target, name, Slot::RefList(Vec::new()));
                    for r in v {
                        let child = self.materialize_ref(r, resolved)?;
                        self.push_ref(target, name, child, r.meta)?;
                    }
                }
                SnapshotSlot::RefSet(v) => {
                    self.init_slot(target, name, Slot::RefSet(Vec::new()));
                    for r in v {
                        let child = self.materialize_ref(r, resolved)?;
                        self.insert_ref(target, name, child, r.meta)?;
                    }
                }
                SnapshotSlot::RefMap(m) => {
                    self.init_slot(target, name, Slot::RefMap(Default::default()));
                    for (key, r) in m {
                        let child = self.materialize_ref(r, resolved)?;
                        self.set_ref_map(target, name, key, Some(child), r.meta)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Structural equality of `a` in `self` and `b` in `other`.
    ///
    /// Literals must match; references compare their children recursively.
    /// List order matters, set and map order does not. Attributes named in
    /// `skip` are ignored on the top-level pair only.
    pub fn deep_equals(&self, a: NodeId, other: &Graph, b: NodeId, skip: &[&str]) -> bool {
        let mut visited = HashSet::new();
        self.equals_inner(a, other, b, skip, &mut visited)
    }

    fn equals_inner(
        &self,
        a: NodeId,
        other: &Graph,
        b: NodeId,
        skip: &[&str],
        visited: &mut HashSet<(NodeId, NodeId)>,
    ) -> bool {
        // Pairs under comparison are assumed equal; this terminates cycles.
        if !visited.insert((a, b)) {
            return true;
        }
        let (na, nb) = (self.node(a), other.node(b));
        if na.label() != nb.label() {
            return false;
        }
        let names: Vec<&str> = na
            .attrs()
            .map(|(n, _)| n)
            .chain(nb.attrs().map(|(n, _)| n).filter(|n| na.attr(n).is_none()))
            .collect();
        names
            .into_iter()
            .filter(|n| !skip.contains(n))
            .all(|n| self.slots_equal(na.attr(n), other, nb.attr(n), visited))
    }

    fn child_equals(
        &self,
        la: LinkId,
        other: &Graph,
        lb: LinkId,
        visited: &mut HashSet<(NodeId, NodeId)>,
    ) -> bool {
        match (self.get_link(la), other.get_link(lb)) {
            (Some(x), Some(y)) => self.equals_inner(x.child(), other, y.child(), &[], visited),
            (None, None) => true,
            _ => false,
        }
    }

    fn slots_equal(
        &self,
        sa: Option<&Slot>,
        other: &Graph,
        sb: Option<&Slot>,
        visited: &mut HashSet<(NodeId, NodeId)>,
    ) -> bool {
        match (sa, sb) {
            (None, None) => true,
            (Some(s), None) | (None, Some(s)) => s.is_empty(),
            (Some(Slot::Value(x)), Some(Slot::Value(y))) => x == y,
            (Some(Slot::Ref(x)), Some(Slot::Ref(y))) => match (x, y) {
                (Some(x), Some(y)) => self.child_equals(*x, other, *y, visited),
                (None, None) => true,
                _ => false,
            },
            (Some(Slot::RefList(x)), Some(Slot::RefList(y))) => {
                x.len() == y.len()
                    && x.iter()
                        .zip(y)
                        .all(|(la, lb)| self.child_equals(*la, other, *lb, visited))
            }
            (Some(Slot::RefSet(x)), Some(Slot::RefSet(y))) => {
                if x.len() != y.len() {
                    return false;
                }
                let mut unmatched: Vec<LinkId> = y.clone();
                for la in x {
                    let found = unmatched.iter().position(|lb| {
                        let mut trial = visited.clone();
                        let ok = self.child_equals(*la, other, *lb, &mut trial);
                        if ok {
                            *visited = trial;
                        }
                        ok
                    });
                    match found {
                        Some(i) => {
                            unmatched.swap_remove(i);
                        }
                        None => return false,
                    }
                }
                true
            }
            (Some(Slot::RefMap(x)), Some(Slot::RefMap(y))) => {
                x.len() == y.len()
                    && x.iter().all(|(k, la)| {
                        y.get(k)
                            .is_some_and(|lb| self.child_equals(*la, other, *lb, visited))
                    })
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_identity_resolve_aliases_children() {
        let mut g = Graph::new();
        let a = g.create_node("T");
        let child = g.create_node("C");
        g.set(a, "value", 3i64);
        g.push_ref(a, "items", child, LinkMeta::default()).unwrap();

        let b = g.create_node("T");
        let snap = g.snapshot(a);
        g.apply_snapshot(b, &snap, &mut |id| Some(id)).unwrap();
        assert_eq!(g.get(b, "value"), Some(&Value::Int(3)));
        assert_eq!(g.list_refs(b, "items"), vec![child]);
        assert_eq!(g.list_parents(child).len(), 2);
        assert!(g.deep_equals(a, &g, b, &[]));
    }

    #[test]
    fn test_copy_unresolved_leaves_target_untouched() {
        let mut src = Graph::new();
        let a = src.create_node("T");
        let child = src.create_node("C");
        src.set_ref(a, "r", Some(child), LinkMeta::default()).unwrap();

        let mut dst = Graph::new();
        let b = dst.create_node("T");
        dst.set(b, "value", true);
        let err = dst
            .apply_snapshot(b, &src.snapshot(a), &mut |_| None)
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(_)));
        assert_eq!(dst.get(b, "value"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_owned_children_are_recreated() {
        let mut g = Graph::new();
        let a = g.create_node("T");
        let info = g.create_node("Info");
        g.set(info, "texCoord", 1i64);
        g.set_ref(a, "info", Some(info), LinkMeta::owned()).unwrap();

        let b = g.create_node("T");
        let snap = g.snapshot(a);
        g.apply_snapshot(b, &snap, &mut |id| Some(id)).unwrap();
        let copied = g.get_ref(b, "info").unwrap();
        assert_ne!(copied, info);
        assert_eq!(g.get(copied, "texCoord"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let mut g = Graph::new();
        let (a, b) = (g.create_node("T"), g.create_node("T"));
        let (x, y) = (g.create_node("C"), g.create_node("C"));
        g.set(x, "v", 1i64);
        g.set(y, "v", 2i64);
        g.insert_ref(a, "s", x, LinkMeta::default()).unwrap();
        g.insert_ref(a, "s", y, LinkMeta::default()).unwrap();
        g.insert_ref(b, "s", y, LinkMeta::default()).unwrap();
        g.insert_ref(b, "s", x, LinkMeta::default()).unwrap();
        assert!(g.deep_equals(a, &g, b, &[]));

        g.push_ref(a, "l", x, LinkMeta::default()).unwrap();
        g.push_ref(a, "l", y, LinkMeta::default()).unwrap();
        g.push_ref(b, "l", y, LinkMeta::default()).unwrap();
        g.push_ref(b, "l", x, LinkMeta::default()).unwrap();
        assert!(!g.deep_equals(a, &g, b, &[]));
    }

    #[test]
    fn test_equality_survives_cycles() {
        let mut g = Graph::new();
        let (a, b) = (g.create_node("N"), g.create_node("N"));
        g.set_ref(a, "next", Some(b), LinkMeta::default()).unwrap();
        g.set_ref(b, "next", Some(a), LinkMeta::default()).unwrap();
        assert!(g.deep_equals(a, &g, b, &[]));
    }
}
