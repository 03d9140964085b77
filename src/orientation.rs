//! Orientation Initializer
//!
//! Numbers every node by breadth-first discovery order from the destination
//! and then orients each edge from the higher number to the lower one. Since
//! heights strictly decrease along every directed edge the result is acyclic,
//! and since every non-destination node was discovered through a neighbor with
//! a smaller number, every node has a directed path to the destination.

use crate::graph::{EdgeId, Graph, GraphError, NodeId, Result};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Outcome of an orientation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientationReport {
    pub destination: NodeId,
    /// Nodes in BFS discovery order; position equals assigned height
    pub visit_order: Vec<NodeId>,
    /// Edges that had to be reversed to point toward the destination
    pub flipped: Vec<EdgeId>,
}

/// Compute BFS heights from `destination` without touching the graph.
///
/// Neighbors are enqueued in ascending edge-ID order, which makes the
/// numbering reproducible for a given graph. Fails with
/// [`GraphError::DisconnectedComponent`] naming the lowest unreachable node.
pub fn bfs_heights(graph: &Graph, destination: NodeId) -> Result<BTreeMap<NodeId, u64>> {
    if !graph.contains_node(destination) {
        return Err(GraphError::UnknownNode(destination));
    }

    let mut heights: BTreeMap<NodeId, u64> = BTreeMap::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(destination);
    visited.insert(destination);

    let mut next_height = 0u64;
    while let Some(current) = queue.pop_front() {
        heights.insert(current, next_height);
        next_height += 1;

        for neighbor in graph.neighbors(current) {
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    if let Some(node) = graph.node_ids().into_iter().find(|n| !heights.contains_key(n)) {
        return Err(GraphError::DisconnectedComponent { node, destination });
    }

    Ok(heights)
}

/// Number every node from `destination` and orient all edges toward it.
///
/// All-or-nothing: on error the graph is unchanged. On success every node's
/// partial-reversal history is cleared, since the fresh orientation has none.
pub fn orient_towards(graph: &mut Graph, destination: NodeId) -> Result<OrientationReport> {
    let heights = bfs_heights(graph, destination)?;

    let mut visit_order: Vec<(u64, NodeId)> = heights.iter().map(|(&n, &h)| (h, n)).collect();
    visit_order.sort_unstable();
    for (&node, &height) in &heights {
        graph.set_height(node, height)?;
    }

    let to_flip: Vec<EdgeId> = graph
        .edges()
        .filter(|e| heights[&e.tail] < heights[&e.head])
        .map(|e| e.id)
        .collect();
    for &edge in &to_flip {
        graph.flip(edge)?;
    }
    graph.clear_all_inbound_flips();

    tracing::debug!(
        destination = %destination,
        nodes = heights.len(),
        flipped = to_flip.len(),
        "oriented graph toward destination"
    );

    Ok(OrientationReport {
        destination,
        visit_order: visit_order.into_iter().map(|(_, n)| n).collect(),
        flipped: to_flip,
    })
}
