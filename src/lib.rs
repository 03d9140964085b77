//! Link Reversal: destination-oriented DAG maintenance by local edge reversal
//!
//! Core library simulating the Full and Partial link reversal algorithms
//! (Gafni–Bertsekas). A graph is first oriented toward a destination; after the
//! destination changes or the topology mutates, nodes that become sinks reverse
//! incoming edges round by round until every node again has a directed path to
//! the destination.
//!
//! ```
//! use link_reversal::{Phase, Simulation};
//!
//! let mut sim = Simulation::default();
//! let a = sim.add_node();
//! let b = sim.add_node();
//! let ab = sim.add_edge(a, b).unwrap();
//! sim.set_destination(a).unwrap();
//! assert_eq!(sim.orientation(ab), Some((b, a)));
//! assert_eq!(sim.step().unwrap(), Phase::Select);
//! assert!(sim.pending_flip_set().is_empty());
//! ```

pub mod config;
pub mod graph;
pub mod invariants;
pub mod orientation;
pub mod reversal;
pub mod simulation;
pub mod snapshot;
pub mod telemetry;
pub mod topology;

pub use config::{MutationPolicy, SimConfig};
pub use graph::{Edge, EdgeId, Graph, GraphError, Node, NodeId};
pub use reversal::{Phase, Policy, ReversalEngine};
pub use simulation::{ConvergenceReport, Simulation};
pub use snapshot::SimulationSnapshot;

/// Build the configured topology and orient it toward its first node
pub fn build_simulation(config: &SimConfig) -> Result<(Simulation, Vec<NodeId>), GraphError> {
    let (graph, nodes) = topology::build(
        config.topology,
        config.num_nodes,
        config.edge_probability,
        config.seed,
    );
    let mut sim = Simulation::from_graph(graph, config.policy, config.mutation_policy);
    if let Some(&first) = nodes.first() {
        sim.set_destination(first)?;
    }
    Ok((sim, nodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simulation_from_config() {
        let config = SimConfig {
            topology: topology::TopologyKind::Grid,
            num_nodes: 12,
            ..SimConfig::default()
        };
        let (sim, nodes) = build_simulation(&config).unwrap();
        assert_eq!(nodes.len(), 12);
        assert_eq!(sim.destination(), Some(nodes[0]));
        assert!(sim.is_destination_oriented());
    }

    #[test]
    fn test_default_config_measures_repair() {
        let config = SimConfig {
            topology: topology::TopologyKind::Ring,
            num_nodes: 4,
            ..SimConfig::default()
        };
        let (mut sim, nodes) = build_simulation(&config).unwrap();
        let lost = sim.graph().edge_between(nodes[0], nodes[1]).unwrap();
        sim.remove_edge(lost).unwrap();
        assert!(sim.is_sink(nodes[1]));

        let report = sim.run_until_stable(config.max_rounds).unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(report.flips, 1);
        assert!(report.converged);
        assert!(sim.is_destination_oriented());
    }

    #[test]
    fn test_empty_config_has_no_destination() {
        let config = SimConfig {
            num_nodes: 0,
            ..SimConfig::default()
        };
        let (sim, nodes) = build_simulation(&config).unwrap();
        assert!(nodes.is_empty());
        assert_eq!(sim.destination(), None);
    }
}
