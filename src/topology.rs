//! Topology builders
//!
//! Small deterministic generators used by the simulator, benches and tests.
//! They build the undirected structure only; orientation is left to
//! [`crate::orientation`].

use crate::graph::{Graph, NodeId};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Shape of a generated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyKind {
    /// n0 - n1 - ... - n(k-1)
    #[default]
    Path,
    /// n0 joined to every other node
    Star,
    /// A path closed into a cycle
    Ring,
    /// Row-major square grid, last row possibly partial
    Grid,
    /// Random spanning tree plus extra edges with `edge_probability`
    Random,
}

impl std::fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TopologyKind::Path => "path",
            TopologyKind::Star => "star",
            TopologyKind::Ring => "ring",
            TopologyKind::Grid => "grid",
            TopologyKind::Random => "random",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for TopologyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" | "line" => Ok(TopologyKind::Path),
            "star" => Ok(TopologyKind::Star),
            "ring" | "cycle" => Ok(TopologyKind::Ring),
            "grid" => Ok(TopologyKind::Grid),
            "random" => Ok(TopologyKind::Random),
            other => Err(format!("Unknown topology: {}", other)),
        }
    }
}

/// Build a connected graph of `num_nodes` nodes.
///
/// Returns the graph and its nodes in creation order. `edge_probability` and
/// `seed` only matter for [`TopologyKind::Random`].
pub fn build(
    kind: TopologyKind,
    num_nodes: usize,
    edge_probability: f64,
    seed: u64,
) -> (Graph, Vec<NodeId>) {
    let mut graph = Graph::new();
    let nodes: Vec<NodeId> = (0..num_nodes).map(|_| graph.add_node()).collect();
    let mut join = |a: usize, b: usize| {
        // random extras may land on a tree edge; the duplicate is skipped
        let _ = graph.add_edge(nodes[a], nodes[b]);
    };

    match kind {
        TopologyKind::Path => {
            for i in 1..num_nodes {
                join(i - 1, i);
            }
        }
        TopologyKind::Star => {
            for i in 1..num_nodes {
                join(0, i);
            }
        }
        TopologyKind::Ring => {
            for i in 1..num_nodes {
                join(i - 1, i);
            }
            if num_nodes > 2 {
                join(num_nodes - 1, 0);
            }
        }
        TopologyKind::Grid => {
            let side = (num_nodes as f64).sqrt().ceil().max(1.0) as usize;
            for i in 0..num_nodes {
                if (i + 1) % side != 0 && i + 1 < num_nodes {
                    join(i, i + 1);
                }
                if i + side < num_nodes {
                    join(i, i + side);
                }
            }
        }
        TopologyKind::Random => {
            let mut rng = StdRng::seed_from_u64(seed);
            // spanning tree first so the graph is always connected
            for i in 1..num_nodes {
                let parent = rng.gen_range(0..i);
                join(parent, i);
            }
            for i in 0..num_nodes {
                for j in (i + 1)..num_nodes {
                    if rng.gen::<f64>() < edge_probability {
                        join(i, j);
                    }
                }
            }
        }
    }

    (graph, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::bfs_heights;

    #[test]
    fn test_edge_counts() {
        assert_eq!(build(TopologyKind::Path, 5, 0.0, 0).0.edge_count(), 4);
        assert_eq!(build(TopologyKind::Star, 5, 0.0, 0).0.edge_count(), 4);
        assert_eq!(build(TopologyKind::Ring, 5, 0.0, 0).0.edge_count(), 5);
        // 3x3 grid: 6 horizontal + 6 vertical
        assert_eq!(build(TopologyKind::Grid, 9, 0.0, 0).0.edge_count(), 12);
    }

    #[test]
    fn test_all_topologies_are_connected() {
        for kind in [
            TopologyKind::Path,
            TopologyKind::Star,
            TopologyKind::Ring,
            TopologyKind::Grid,
            TopologyKind::Random,
        ] {
            for n in [1, 2, 7, 10] {
                let (g, nodes) = build(kind, n, 0.2, 7);
                assert_eq!(g.node_count(), n);
                assert!(bfs_heights(&g, nodes[0]).is_ok(), "{} with {} nodes", kind, n);
            }
        }
    }

    #[test]
    fn test_random_is_reproducible() {
        let (a, _) = build(TopologyKind::Random, 30, 0.1, 42);
        let (b, _) = build(TopologyKind::Random, 30, 0.1, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("grid".parse::<TopologyKind>(), Ok(TopologyKind::Grid));
        assert_eq!("line".parse::<TopologyKind>(), Ok(TopologyKind::Path));
        assert!("torus".parse::<TopologyKind>().is_err());
    }
}
