//! Persistent hash map and union-find.
//!
//! The map follows Conchon and Filliatre's persistent-array scheme: every
//! version is a handle into a version tree whose root holds the real hash
//! table and whose other nodes hold inverse diffs. Reading any version
//! reroots the tree at that version, so repeated reads at one version are
//! as fast as a plain map while older versions stay valid.
//!
//! The union-find layers parent/next/rank nodes over such a map; the
//! `next` field threads each class into a circular list so whole classes
//! can be enumerated.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use weft_ast::ty::PolyVar;

enum Node<K, V> {
    Base(FxHashMap<K, V>),
    /// Inverse diff: applying `kind` to the version this node's `base`
    /// points at reproduces this version.
    Diff { base: PMap<K, V>, kind: Diff<K, V> },
}

enum Diff<K, V> {
    Ins { key: K, val: V },
    Upd { key: K, val: V },
    Rem { key: K },
}

/// One version of a persistent hash map.
pub struct PMap<K, V>(Rc<RefCell<Node<K, V>>>);

impl<K, V> Clone for PMap<K, V> {
    fn clone(&self) -> Self {
        PMap(Rc::clone(&self.0))
    }
}

impl<K, V> Default for PMap<K, V> {
    fn default() -> Self {
        PMap(Rc::new(RefCell::new(Node::Base(FxHashMap::default()))))
    }
}

impl<K: Eq + Hash + Clone, V: Clone> PMap<K, V> {
    pub fn new() -> Self {
        PMap::default()
    }

    /// Rewrites the version tree so this version holds the base table.
    fn reroot(&self) {
        if matches!(&*self.0.borrow(), Node::Base(_)) {
            return;
        }

        // collect the chain from this version up to the current base
        let mut path = vec![self.clone()];
        loop {
            let next = match &*path[path.len() - 1].0.borrow() {
                Node::Diff { base, .. } => Some(base.clone()),
                Node::Base(_) => None,
            };
            match next {
                Some(b) => path.push(b),
                None => break,
            }
        }

        // walk back down, swapping the table one step at a time
        for i in (0..path.len() - 1).rev() {
            let child = &path[i];
            let parent = &path[i + 1];

            let mut table = {
                let mut p = parent.0.borrow_mut();
                match std::mem::replace(&mut *p, Node::Base(FxHashMap::default())) {
                    Node::Base(t) => t,
                    Node::Diff { .. } => unreachable!("parent must hold the base"),
                }
            };

            let kind = {
                let mut c = child.0.borrow_mut();
                match std::mem::replace(&mut *c, Node::Base(FxHashMap::default())) {
                    Node::Diff { kind, .. } => kind,
                    Node::Base(_) => unreachable!("child must hold a diff"),
                }
            };

            // apply the child's diff to the table; the parent becomes the
            // inverse diff against the child
            let inverse = match kind {
                Diff::Ins { key, val } => {
                    table.insert(key.clone(), val);
                    Diff::Rem { key }
                }
                Diff::Upd { key, val } => match table.insert(key.clone(), val) {
                    Some(old) => Diff::Upd { key, val: old },
                    None => Diff::Rem { key },
                },
                Diff::Rem { key } => match table.remove(&key) {
                    Some(old) => Diff::Ins { key, val: old },
                    None => Diff::Rem { key },
                },
            };

            *parent.0.borrow_mut() = Node::Diff { base: child.clone(), kind: inverse };
            *child.0.borrow_mut() = Node::Base(table);
        }
    }

    fn with_table<R>(&self, f: impl FnOnce(&FxHashMap<K, V>) -> R) -> R {
        self.reroot();
        match &*self.0.borrow() {
            Node::Base(t) => f(t),
            Node::Diff { .. } => unreachable!("reroot leaves a base node"),
        }
    }

    pub fn get(&self, k: &K) -> Option<V> {
        self.with_table(|t| t.get(k).cloned())
    }

    pub fn contains(&self, k: &K) -> bool {
        self.with_table(|t| t.contains_key(k))
    }

    pub fn len(&self) -> usize {
        self.with_table(|t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        self.with_table(|t| {
            for (k, v) in t {
                f(k, v);
            }
        })
    }

    pub fn keys(&self) -> Vec<K> {
        self.with_table(|t| t.keys().cloned().collect())
    }

    /// Returns the version with `k` set to `v`; this version remains
    /// readable as it was.
    pub fn set(&self, k: K, v: V) -> PMap<K, V> {
        self.reroot();
        let mut node = self.0.borrow_mut();
        let mut table = match std::mem::replace(&mut *node, Node::Base(FxHashMap::default())) {
            Node::Base(t) => t,
            Node::Diff { .. } => unreachable!("reroot leaves a base node"),
        };

        let inverse = match table.insert(k.clone(), v) {
            Some(old) => Diff::Upd { key: k, val: old },
            None => Diff::Rem { key: k },
        };

        let new = PMap(Rc::new(RefCell::new(Node::Base(table))));
        *node = Node::Diff { base: new.clone(), kind: inverse };
        new
    }
}

/// A union-find node: parent link, circular class list, union rank.
#[derive(Clone, Debug)]
struct UfNode {
    parent: PolyVar,
    next: PolyVar,
    rank: u8,
}

/// Persistent union-find over type variables.
#[derive(Clone, Default)]
pub struct PUnionFind {
    map: PMap<PolyVar, UfNode>,
}

impl PUnionFind {
    pub fn new() -> Self {
        PUnionFind::default()
    }

    pub fn contains(&self, v: &PolyVar) -> bool {
        self.map.contains(v)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Adds a singleton class for `v` if absent.
    pub fn insert(&mut self, v: &PolyVar) {
        if !self.map.contains(v) {
            self.map = self
                .map
                .set(v.clone(), UfNode { parent: v.clone(), next: v.clone(), rank: 0 });
        }
    }

    /// The representative of `v`'s class, without modifying the
    /// structure; `None` if `v` is not present.
    pub fn root(&self, v: &PolyVar) -> Option<PolyVar> {
        let mut crnt = v.clone();
        loop {
            let node = self.map.get(&crnt)?;
            if node.parent == crnt {
                return Some(crnt);
            }
            crnt = node.parent;
        }
    }

    /// Representative lookup with path compression; inserts `v` if
    /// absent.
    pub fn find(&mut self, v: &PolyVar) -> PolyVar {
        self.insert(v);
        let root = match self.root(v) {
            Some(r) => r,
            None => v.clone(),
        };
        // compress the path up to the root
        let mut crnt = v.clone();
        while let Some(node) = self.map.get(&crnt) {
            if node.parent == crnt {
                break;
            }
            let next = node.parent.clone();
            if node.parent != root {
                self.map = self.map.set(
                    crnt,
                    UfNode { parent: root.clone(), next: node.next, rank: node.rank },
                );
            }
            crnt = next;
        }
        root
    }

    /// Unions the classes of `a` and `b`, splicing their class lists;
    /// returns the new representative.
    pub fn union(&mut self, a: &PolyVar, b: &PolyVar) -> PolyVar {
        let x = self.find(a);
        let y = self.find(b);
        if x == y {
            return x;
        }

        let xn = match self.map.get(&x) {
            Some(n) => n,
            None => return x,
        };
        let yn = match self.map.get(&y) {
            Some(n) => n,
            None => return x,
        };

        if xn.rank < yn.rank {
            // place x under y, splicing the circular lists
            self.map = self
                .map
                .set(x.clone(), UfNode { parent: y.clone(), next: yn.next.clone(), rank: xn.rank });
            self.map = self
                .map
                .set(y.clone(), UfNode { parent: y.clone(), next: xn.next, rank: yn.rank });
            y
        } else {
            let bump = u8::from(xn.rank == yn.rank);
            self.map = self
                .map
                .set(y.clone(), UfNode { parent: x.clone(), next: xn.next.clone(), rank: yn.rank });
            self.map = self.map.set(
                x.clone(),
                UfNode { parent: x.clone(), next: yn.next, rank: xn.rank + bump },
            );
            x
        }
    }

    /// All members of `v`'s class, starting at `v`; empty if absent.
    pub fn class_of(&self, v: &PolyVar) -> Vec<PolyVar> {
        let mut out = Vec::new();
        if !self.map.contains(v) {
            return out;
        }
        let mut crnt = v.clone();
        loop {
            out.push(crnt.clone());
            crnt = match self.map.get(&crnt) {
                Some(n) => n.next,
                None => break,
            };
            if crnt == *v {
                break;
            }
        }
        out
    }

    /// Every class, as (representative, members) pairs.
    pub fn classes(&self) -> Vec<(PolyVar, Vec<PolyVar>)> {
        let mut by_root: FxHashMap<PolyVar, Vec<PolyVar>> = FxHashMap::default();
        for k in self.map.keys() {
            if let Some(r) = self.root(&k) {
                by_root.entry(r).or_default().push(k);
            }
        }
        by_root.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str, id: u32) -> PolyVar {
        PolyVar::with_id(name, id)
    }

    #[test]
    fn older_versions_stay_readable() {
        let m0: PMap<i32, &str> = PMap::new();
        let m1 = m0.set(1, "one");
        let m2 = m1.set(2, "two");
        let m3 = m2.set(1, "uno");

        // reads at the newest version
        assert_eq!(m3.get(&1), Some("uno"));
        assert_eq!(m3.get(&2), Some("two"));

        // rolling back: every older version still answers as it did
        assert_eq!(m1.get(&1), Some("one"));
        assert_eq!(m1.get(&2), None);
        assert_eq!(m0.get(&1), None);

        // and the newest still works after the older reads rerooted
        assert_eq!(m3.get(&1), Some("uno"));
        assert_eq!(m2.get(&1), Some("one"));
    }

    #[test]
    fn sibling_versions_diverge() {
        let base: PMap<i32, i32> = PMap::new().set(1, 10);
        let a = base.set(2, 20);
        let b = base.set(2, 99);

        assert_eq!(a.get(&2), Some(20));
        assert_eq!(b.get(&2), Some(99));
        assert_eq!(base.get(&2), None);
        assert_eq!(a.get(&1), Some(10));
        assert_eq!(b.get(&1), Some(10));
    }

    #[test]
    fn union_find_merges_classes() {
        let mut uf = PUnionFind::new();
        let (t, u, w) = (v("T", 1), v("U", 2), v("W", 3));
        uf.insert(&t);
        uf.insert(&u);
        uf.insert(&w);

        uf.union(&t, &u);
        assert_eq!(uf.find(&t), uf.find(&u));
        assert_ne!(uf.find(&t), uf.find(&w));

        let mut class: Vec<u32> = uf.class_of(&t).into_iter().map(|x| x.id).collect();
        class.sort_unstable();
        assert_eq!(class, vec![1, 2]);
    }

    #[test]
    fn union_preserves_old_versions() {
        let mut uf = PUnionFind::new();
        let (t, u) = (v("T", 1), v("U", 2));
        uf.insert(&t);
        uf.insert(&u);

        let snapshot = uf.clone();
        uf.union(&t, &u);

        assert_eq!(uf.find(&t), uf.find(&u));
        // the snapshot taken before the union still sees them disjoint
        assert_ne!(snapshot.root(&t), snapshot.root(&u));
    }

    #[test]
    fn classes_enumerates_every_member() {
        let mut uf = PUnionFind::new();
        for i in 1..=4 {
            uf.insert(&v("X", i));
        }
        uf.union(&v("X", 1), &v("X", 2));
        uf.union(&v("X", 3), &v("X", 4));

        let classes = uf.classes();
        assert_eq!(classes.len(), 2);
        for (_, members) in classes {
            assert_eq!(members.len(), 2);
        }
    }
}
