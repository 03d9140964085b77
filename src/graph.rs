//! Graph Model: undirected topology with a mutable orientation per edge.
//!
//! Nodes live in an ordered map and edges in an arena keyed by [`EdgeId`].
//! Identifiers are never reused, so an `EdgeId` stays valid across any number
//! of reversals and only dies when the edge itself is removed. Every node keeps
//! ordered index sets of the edges it is currently tail (`outgoing`) or head
//! (`incoming`) of; an edge is always in exactly one of `tail.outgoing` and
//! `head.incoming`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Node identifier, assigned by [`Graph::add_node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Edge identifier, stable across reversals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Errors raised by graph mutation, orientation and the simulation facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Invalid endpoint: cannot join {a} and {b}")]
    InvalidEndpoint { a: NodeId, b: NodeId },

    #[error("Duplicate edge: {a} and {b} are already joined by {existing}")]
    DuplicateEdge {
        a: NodeId,
        b: NodeId,
        existing: EdgeId,
    },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown edge: {0}")]
    UnknownEdge(EdgeId),

    #[error("Disconnected component: {node} cannot reach destination {destination}")]
    DisconnectedComponent { node: NodeId, destination: NodeId },

    #[error("No destination has been set")]
    NoDestination,
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// A vertex together with its orientation bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    outgoing: BTreeSet<EdgeId>,
    incoming: BTreeSet<EdgeId>,
    /// BFS discovery index from the destination; `None` until first numbered
    height: Option<u64>,
    /// Incoming edges flipped into this node while it was last a sink (Partial only)
    recent_inbound_flips: BTreeSet<EdgeId>,
}

impl Node {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            outgoing: BTreeSet::new(),
            incoming: BTreeSet::new(),
            height: None,
            recent_inbound_flips: BTreeSet::new(),
        }
    }

    pub fn outgoing(&self) -> &BTreeSet<EdgeId> {
        &self.outgoing
    }

    pub fn incoming(&self) -> &BTreeSet<EdgeId> {
        &self.incoming
    }

    pub fn height(&self) -> Option<u64> {
        self.height
    }

    pub fn recent_inbound_flips(&self) -> &BTreeSet<EdgeId> {
        &self.recent_inbound_flips
    }

    pub fn out_degree(&self) -> usize {
        self.outgoing.len()
    }

    pub fn in_degree(&self) -> usize {
        self.incoming.len()
    }
}

/// An undirected link with its current orientation `tail -> head`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub tail: NodeId,
    pub head: NodeId,
}

impl Edge {
    /// The endpoint opposite `node`, if `node` is an endpoint at all
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.tail {
            Some(self.head)
        } else if node == self.head {
            Some(self.tail)
        } else {
            None
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.tail == node || self.head == node
    }
}

/// Undirected graph with per-edge orientation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    next_node: u64,
    next_edge: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an isolated node
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, Node::new(id));
        id
    }

    /// Join `a` and `b` with a new edge oriented `a -> b`
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<EdgeId> {
        if a == b || !self.nodes.contains_key(&a) || !self.nodes.contains_key(&b) {
            return Err(GraphError::InvalidEndpoint { a, b });
        }
        if let Some(existing) = self.edge_between(a, b) {
            return Err(GraphError::DuplicateEdge { a, b, existing });
        }

        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(id, Edge { id, tail: a, head: b });
        if let Some(tail) = self.nodes.get_mut(&a) {
            tail.outgoing.insert(id);
        }
        if let Some(head) = self.nodes.get_mut(&b) {
            head.incoming.insert(id);
        }
        Ok(id)
    }

    /// Reverse an edge in place. Returns the new `(tail, head)`.
    pub fn flip(&mut self, id: EdgeId) -> Result<(NodeId, NodeId)> {
        let edge = self.edges.get_mut(&id).ok_or(GraphError::UnknownEdge(id))?;
        let (old_tail, old_head) = (edge.tail, edge.head);
        edge.tail = old_head;
        edge.head = old_tail;

        if let Some(n) = self.nodes.get_mut(&old_tail) {
            n.outgoing.remove(&id);
            n.incoming.insert(id);
        }
        if let Some(n) = self.nodes.get_mut(&old_head) {
            n.incoming.remove(&id);
            n.outgoing.insert(id);
        }
        Ok((old_head, old_tail))
    }

    /// Remove a node and every incident edge. Returns the removed edges.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Vec<EdgeId>> {
        let node = self.nodes.remove(&id).ok_or(GraphError::UnknownNode(id))?;
        let incident: Vec<EdgeId> = node.outgoing.union(&node.incoming).copied().collect();

        for edge_id in &incident {
            if let Some(edge) = self.edges.remove(edge_id) {
                if let Some(other) = edge.other(id).and_then(|o| self.nodes.get_mut(&o)) {
                    other.outgoing.remove(edge_id);
                    other.incoming.remove(edge_id);
                }
            }
        }
        for n in self.nodes.values_mut() {
            for edge_id in &incident {
                n.recent_inbound_flips.remove(edge_id);
            }
        }
        Ok(incident)
    }

    /// Remove a single edge. Returns its `(tail, head)` at removal time.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<(NodeId, NodeId)> {
        let edge = self.edges.remove(&id).ok_or(GraphError::UnknownEdge(id))?;
        if let Some(tail) = self.nodes.get_mut(&edge.tail) {
            tail.outgoing.remove(&id);
        }
        if let Some(head) = self.nodes.get_mut(&edge.head) {
            head.incoming.remove(&id);
        }
        for n in self.nodes.values_mut() {
            n.recent_inbound_flips.remove(&id);
        }
        Ok((edge.tail, edge.head))
    }

    pub(crate) fn set_height(&mut self, id: NodeId, height: u64) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.height = Some(height);
        Ok(())
    }

    pub(crate) fn record_inbound_flip(&mut self, id: NodeId, edge: EdgeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.recent_inbound_flips.insert(edge);
        }
    }

    pub(crate) fn clear_inbound_flips(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.recent_inbound_flips.clear();
        }
    }

    pub(crate) fn clear_all_inbound_flips(&mut self) {
        for node in self.nodes.values_mut() {
            node.recent_inbound_flips.clear();
        }
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get an edge by ID
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All node IDs in ascending order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// All edge IDs in ascending order
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.keys().copied().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Current `(tail, head)` of an edge
    pub fn orientation(&self, id: EdgeId) -> Option<(NodeId, NodeId)> {
        self.edges.get(&id).map(|e| (e.tail, e.head))
    }

    pub fn height(&self, id: NodeId) -> Option<u64> {
        self.nodes.get(&id).and_then(|n| n.height)
    }

    pub fn max_height(&self) -> Option<u64> {
        self.nodes.values().filter_map(|n| n.height).max()
    }

    pub fn outgoing(&self, id: NodeId) -> BTreeSet<EdgeId> {
        self.nodes
            .get(&id)
            .map(|n| n.outgoing.clone())
            .unwrap_or_default()
    }

    pub fn incoming(&self, id: NodeId) -> BTreeSet<EdgeId> {
        self.nodes
            .get(&id)
            .map(|n| n.incoming.clone())
            .unwrap_or_default()
    }

    pub fn recent_inbound_flips(&self, id: NodeId) -> BTreeSet<EdgeId> {
        self.nodes
            .get(&id)
            .map(|n| n.recent_inbound_flips.clone())
            .unwrap_or_default()
    }

    /// Incident edges regardless of orientation, ascending by ID
    pub fn incident_edges(&self, id: NodeId) -> Vec<EdgeId> {
        match self.nodes.get(&id) {
            Some(n) => n.outgoing.union(&n.incoming).copied().collect(),
            None => Vec::new(),
        }
    }

    /// Neighbors in ascending order of the connecting edge's ID
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.incident_edges(id)
            .into_iter()
            .filter_map(|e| self.edges.get(&e).and_then(|edge| edge.other(id)))
            .collect()
    }

    /// The edge joining `a` and `b`, in either orientation
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        let node = self.nodes.get(&a)?;
        node.outgoing
            .union(&node.incoming)
            .copied()
            .find(|e| self.edges.get(e).is_some_and(|edge| edge.touches(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Graph, Vec<NodeId>, Vec<EdgeId>) {
        let mut g = Graph::new();
        let n: Vec<NodeId> = (0..3).map(|_| g.add_node()).collect();
        let e = vec![
            g.add_edge(n[0], n[1]).unwrap(),
            g.add_edge(n[1], n[2]).unwrap(),
            g.add_edge(n[2], n[0]).unwrap(),
        ];
        (g, n, e)
    }

    #[test]
    fn test_add_edge_orients_first_to_second() {
        let (g, n, e) = triangle();
        assert_eq!(g.orientation(e[0]), Some((n[0], n[1])));
        assert!(g.outgoing(n[0]).contains(&e[0]));
        assert!(g.incoming(n[1]).contains(&e[0]));
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn test_add_edge_rejects_bad_endpoints() {
        let (mut g, n, e) = triangle();
        assert_eq!(
            g.add_edge(n[0], n[0]),
            Err(GraphError::InvalidEndpoint { a: n[0], b: n[0] })
        );
        assert!(matches!(
            g.add_edge(n[0], NodeId(99)),
            Err(GraphError::InvalidEndpoint { .. })
        ));
        assert_eq!(
            g.add_edge(n[1], n[0]),
            Err(GraphError::DuplicateEdge {
                a: n[1],
                b: n[0],
                existing: e[0]
            })
        );
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn test_flip_twice_restores_orientation() {
        let (mut g, n, e) = triangle();
        assert_eq!(g.flip(e[1]).unwrap(), (n[2], n[1]));
        assert!(g.outgoing(n[2]).contains(&e[1]));
        assert!(g.incoming(n[1]).contains(&e[1]));
        assert!(!g.outgoing(n[1]).contains(&e[1]));

        g.flip(e[1]).unwrap();
        assert_eq!(g.orientation(e[1]), Some((n[1], n[2])));
        assert_eq!(g.flip(EdgeId(42)), Err(GraphError::UnknownEdge(EdgeId(42))));
    }

    #[test]
    fn test_flip_keeps_recent_inbound_flips_reference() {
        let (mut g, n, e) = triangle();
        g.record_inbound_flip(n[1], e[0]);
        g.flip(e[0]).unwrap();
        assert!(g.recent_inbound_flips(n[1]).contains(&e[0]));
    }

    #[test]
    fn test_remove_node_purges_edges_and_history() {
        let (mut g, n, e) = triangle();
        g.record_inbound_flip(n[1], e[0]);
        g.record_inbound_flip(n[1], e[1]);

        let removed = g.remove_node(n[0]).unwrap();
        assert_eq!(removed, vec![e[0], e[2]]);
        assert!(!g.contains_node(n[0]));
        assert_eq!(g.edge_ids(), vec![e[1]]);
        assert!(g.incoming(n[1]).is_empty());
        assert!(g.outgoing(n[2]).is_empty());
        assert_eq!(g.incoming(n[2]), BTreeSet::from([e[1]]));
        assert_eq!(g.recent_inbound_flips(n[1]), BTreeSet::from([e[1]]));
        assert_eq!(g.remove_node(n[0]), Err(GraphError::UnknownNode(n[0])));
    }

    #[test]
    fn test_remove_edge_unlinks_both_sides() {
        let (mut g, n, e) = triangle();
        assert_eq!(g.remove_edge(e[2]).unwrap(), (n[2], n[0]));
        assert!(g.outgoing(n[2]).is_empty());
        assert!(g.incoming(n[0]).is_empty());
        assert_eq!(g.edge_between(n[0], n[2]), None);
        assert_eq!(g.remove_edge(e[2]), Err(GraphError::UnknownEdge(e[2])));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut g = Graph::new();
        let a = g.add_node();
        g.remove_node(a).unwrap();
        let b = g.add_node();
        assert_ne!(a, b);
    }

    #[test]
    fn test_neighbors_follow_edge_order() {
        let (g, n, _) = triangle();
        assert_eq!(g.neighbors(n[0]), vec![n[1], n[2]]);
        assert_eq!(g.neighbors(n[2]), vec![n[1], n[0]]);
    }
}
