//! The conversion graph: which concrete types convert to which, at what
//! cost.
//!
//! Nodes are types, indexed through a `TypeMap`; edges carry a direction
//! and a cost. Every pair of distinct primitive types gets a conversion
//! both ways, unsafe when narrowing and safe when widening; per-node edge
//! lists stay sorted by cost.

use std::fmt;

use weft_ast::ty::Ty;

use crate::cost::Cost;
use crate::type_map::TypeMap;

pub type NodeId = usize;
pub type EdgeId = usize;

/// A directed conversion edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversion {
    pub from: NodeId,
    pub to: NodeId,
    pub cost: Cost,
}

/// A node in the conversion graph; edge lists are sorted by cost
/// ascending.
#[derive(Clone, Debug)]
pub struct ConversionNode {
    pub ty: Ty,
    out: Vec<EdgeId>,
    inc: Vec<EdgeId>,
}

/// Graph of conversions among the known concrete types.
#[derive(Clone, Debug, Default)]
pub struct ConversionGraph {
    nodes: Vec<ConversionNode>,
    edges: Vec<Conversion>,
    index: TypeMap<NodeId>,
}

impl ConversionGraph {
    pub fn new() -> Self {
        ConversionGraph::default()
    }

    /// Builds the all-pairs graph over the primitive types in `tys`.
    pub fn make_conversions<'a>(tys: impl IntoIterator<Item = &'a Ty>) -> Self {
        let mut g = ConversionGraph::new();
        for ty in tys {
            g.add_type(ty);
        }
        g
    }

    pub fn node(&self, id: NodeId) -> &ConversionNode {
        &self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Conversion {
        &self.edges[id]
    }

    /// The type an edge converts to.
    pub fn target(&self, e: &Conversion) -> &Ty {
        &self.nodes[e.to].ty
    }

    /// The type an edge converts from.
    pub fn source(&self, e: &Conversion) -> &Ty {
        &self.nodes[e.from].ty
    }

    fn node_id(&self, ty: &Ty) -> Option<NodeId> {
        self.index.find(ty).copied()
    }

    fn node_for(&mut self, ty: &Ty) -> NodeId {
        if let Some(id) = self.node_id(ty) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(ConversionNode { ty: ty.clone(), out: Vec::new(), inc: Vec::new() });
        self.index.insert(ty.clone(), id);
        id
    }

    fn sorted_insert(edges: &mut Vec<EdgeId>, all: &[Conversion], e: EdgeId) {
        let pos = edges.partition_point(|x| all[*x].cost <= all[e].cost);
        edges.insert(pos, e);
    }

    /// Extends the graph with a type. Primitive types get conversion
    /// edges both ways against every existing primitive node; other types
    /// become isolated nodes.
    pub fn add_type(&mut self, ty: &Ty) {
        if self.node_id(ty).is_some() {
            return;
        }
        let from = self.node_for(ty);
        let Ty::Conc(f) = *ty else { return };

        for to in 0..self.nodes.len() {
            if to == from {
                continue;
            }
            let Ty::Conc(t) = self.nodes[to].ty else { continue };

            let out = self.edges.len();
            let inc = out + 1;
            self.edges.push(Conversion { from, to, cost: Cost::from_diff(t - f) });
            self.edges.push(Conversion { from: to, to: from, cost: Cost::from_diff(f - t) });

            let (a, b) = (&mut self.nodes, &self.edges);
            Self::sorted_insert(&mut a[from].out, b, out);
            Self::sorted_insert(&mut a[from].inc, b, inc);
            Self::sorted_insert(&mut a[to].out, b, inc);
            Self::sorted_insert(&mut a[to].inc, b, out);
        }
    }

    /// All conversions from a type, cheapest first.
    pub fn find_from(&self, ty: &Ty) -> impl Iterator<Item = &Conversion> {
        self.edge_range(ty, false)
    }

    /// All conversions to a type, cheapest first.
    pub fn find_to(&self, ty: &Ty) -> impl Iterator<Item = &Conversion> {
        self.edge_range(ty, true)
    }

    fn edge_range(&self, ty: &Ty, incoming: bool) -> impl Iterator<Item = &Conversion> {
        let list: &[EdgeId] = match self.node_id(ty) {
            Some(id) => {
                let n = &self.nodes[id];
                if incoming {
                    &n.inc
                } else {
                    &n.out
                }
            }
            None => &[],
        };
        list.iter().map(|e| &self.edges[*e])
    }

    /// The direct conversion between two types, if one exists.
    pub fn find_between(&self, from: &Ty, to: &Ty) -> Option<&Conversion> {
        let from_id = self.node_id(from)?;
        let to_id = self.node_id(to)?;
        let (scan, other, by_target) = if self.nodes[to_id].inc.len() < self.nodes[from_id].out.len()
        {
            (&self.nodes[to_id].inc, from_id, false)
        } else {
            (&self.nodes[from_id].out, to_id, true)
        };
        scan.iter().map(|e| &self.edges[*e]).find(|c| {
            if by_target {
                c.to == other
            } else {
                c.from == other
            }
        })
    }

    /// Node ids whose type pattern-matches `ty` (either side may hold a
    /// type variable).
    pub fn find_matching(&self, ty: &Ty) -> Vec<NodeId> {
        self.index
            .matches(ty)
            .into_iter()
            .filter_map(|m| m.value().copied())
            .collect()
    }

    /// Conversions into the given node, cheapest first.
    pub fn into_node(&self, id: NodeId) -> impl Iterator<Item = &Conversion> {
        self.nodes[id].inc.iter().map(|e| &self.edges[*e])
    }
}

impl fmt::Display for ConversionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.edges {
            writeln!(f, "{} => {} {}", self.source(c), self.target(c), c.cost)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_123() -> ConversionGraph {
        ConversionGraph::make_conversions(&[Ty::Conc(1), Ty::Conc(2), Ty::Conc(3)])
    }

    #[test]
    fn all_pairs_both_directions() {
        let g = graph_123();
        // 3 types -> 3 unordered pairs -> 6 directed edges
        assert_eq!(g.edges.len(), 6);

        let widen = g.find_between(&Ty::Conc(1), &Ty::Conc(3)).unwrap();
        assert_eq!(widen.cost, Cost::from_safe(2));
        let narrow = g.find_between(&Ty::Conc(3), &Ty::Conc(1)).unwrap();
        assert_eq!(narrow.cost, Cost::from_unsafe(2));
        assert!(g.find_between(&Ty::Conc(1), &Ty::Conc(9)).is_none());
    }

    #[test]
    fn edge_lists_sorted_by_cost() {
        let g = graph_123();
        let outgoing: Vec<Cost> = g.find_from(&Ty::Conc(2)).map(|c| c.cost).collect();
        let mut sorted = outgoing.clone();
        sorted.sort();
        assert_eq!(outgoing, sorted);

        // cheapest conversion from 2 is the safe widening to 3
        assert_eq!(outgoing[0], Cost::from_safe(1));
    }

    #[test]
    fn add_type_extends_incrementally() {
        let mut g = graph_123();
        g.add_type(&Ty::Conc(5));
        assert_eq!(
            g.find_between(&Ty::Conc(1), &Ty::Conc(5)).map(|c| c.cost),
            Some(Cost::from_safe(4))
        );
        // re-adding is a no-op
        let edges = g.edges.len();
        g.add_type(&Ty::Conc(5));
        assert_eq!(g.edges.len(), edges);
    }

    #[test]
    fn named_types_are_isolated_nodes() {
        let mut g = graph_123();
        g.add_type(&Ty::named("box"));
        assert_eq!(g.find_from(&Ty::named("box")).count(), 0);
        assert_eq!(g.find_to(&Ty::named("box")).count(), 0);
    }

    #[test]
    fn matching_finds_poly_targets() {
        let g = graph_123();
        let ids = g.find_matching(&Ty::poly_id("T", 1));
        assert_eq!(ids.len(), 3);
    }
}
