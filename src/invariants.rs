//! Destination-oriented acyclicity (DOA) checks
//!
//! Used by tests, the simulator binary and debug logging to verify that the
//! oriented edge set is a DAG in which every node reaches the destination.

use crate::graph::{Graph, NodeId};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Why a graph is not destination-oriented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoaViolation {
    /// No destination has been chosen
    NoDestination,
    /// The destination is not a node of the graph
    UnknownDestination(NodeId),
    /// The directed edge set contains a cycle through this node
    Cycle(NodeId),
    /// This node has no directed path to the destination
    Unreachable(NodeId),
}

/// Check the DOA invariant, reporting the first violation found.
///
/// Acyclicity is checked with Kahn's algorithm; reachability with a reverse
/// BFS from the destination along incoming edges.
pub fn check_destination_oriented(
    graph: &Graph,
    destination: NodeId,
) -> Result<(), DoaViolation> {
    if !graph.contains_node(destination) {
        return Err(DoaViolation::UnknownDestination(destination));
    }

    let mut in_degree: BTreeMap<NodeId, usize> =
        graph.nodes().map(|n| (n.id, n.in_degree())).collect();
    let mut ready: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&n, _)| n)
        .collect();
    let mut removed = 0usize;
    while let Some(node) = ready.pop_front() {
        removed += 1;
        for edge in graph.outgoing(node) {
            if let Some(head) = graph.edge(edge).map(|e| e.head) {
                if let Some(d) = in_degree.get_mut(&head) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(head);
                    }
                }
            }
        }
    }
    if removed < graph.node_count() {
        if let Some((&node, _)) = in_degree.iter().find(|(_, &d)| d > 0) {
            return Err(DoaViolation::Cycle(node));
        }
    }

    let mut reached: HashSet<NodeId> = HashSet::new();
    let mut queue = VecDeque::new();
    reached.insert(destination);
    queue.push_back(destination);
    while let Some(node) = queue.pop_front() {
        for edge in graph.incoming(node) {
            if let Some(tail) = graph.edge(edge).map(|e| e.tail) {
                if reached.insert(tail) {
                    queue.push_back(tail);
                }
            }
        }
    }
    match graph.node_ids().into_iter().find(|n| !reached.contains(n)) {
        Some(node) => Err(DoaViolation::Unreachable(node)),
        None => Ok(()),
    }
}

pub fn is_destination_oriented(graph: &Graph, destination: NodeId) -> bool {
    check_destination_oriented(graph, destination).is_ok()
}

/// Whether a directed path leads from `from` to `to`
pub fn has_directed_path(graph: &Graph, from: NodeId, to: NodeId) -> bool {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut queue = VecDeque::from([from]);
    seen.insert(from);
    while let Some(node) = queue.pop_front() {
        if node == to {
            return true;
        }
        for edge in graph.outgoing(node) {
            if let Some(head) = graph.edge(edge).map(|e| e.head) {
                if seen.insert(head) {
                    queue.push_back(head);
                }
            }
        }
    }
    false
}

/// Non-destination nodes without outgoing edges, ascending
pub fn sinks(graph: &Graph, destination: Option<NodeId>) -> Vec<NodeId> {
    graph
        .nodes()
        .filter(|n| Some(n.id) != destination && n.out_degree() == 0)
        .map(|n| n.id)
        .collect()
}
