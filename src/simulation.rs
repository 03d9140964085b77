//! Simulation facade and Topology Mutator
//!
//! [`Simulation`] owns the graph, the destination and the reversal engine, and
//! is the only surface a presentation layer talks to. Every structural
//! mutation resets the engine so that a pending selection can never be
//! applied to edges that changed underneath it. Mutations are all-or-nothing:
//! an operation that returns an error leaves graph and engine untouched.

use crate::config::MutationPolicy;
use crate::graph::{EdgeId, Graph, GraphError, NodeId, Result};
use crate::invariants::{check_destination_oriented, has_directed_path, sinks, DoaViolation};
use crate::orientation::{orient_towards, OrientationReport};
use crate::reversal::{Phase, Policy, ReversalEngine, ReversalStats, SelectionReport};
use crate::snapshot::SimulationSnapshot;
use std::collections::BTreeSet;

/// Outcome of driving rounds until no edge is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Rounds that reversed at least one edge
    pub rounds: usize,
    pub flips: u64,
    /// False if `max_rounds` ran out first, or if the quiet round left a
    /// node other than the destination with no outgoing edge (an isolated
    /// node has nothing to reverse)
    pub converged: bool,
}

/// A link reversal simulation over one graph
#[derive(Debug, Clone)]
pub struct Simulation {
    graph: Graph,
    destination: Option<NodeId>,
    engine: ReversalEngine,
    mutation_policy: MutationPolicy,
}

impl Simulation {
    /// An empty simulation
    pub fn new(policy: Policy, mutation_policy: MutationPolicy) -> Self {
        Self::from_graph(Graph::new(), policy, mutation_policy)
    }

    /// Wrap an existing graph; no destination is set yet
    pub fn from_graph(graph: Graph, policy: Policy, mutation_policy: MutationPolicy) -> Self {
        Self {
            graph,
            destination: None,
            engine: ReversalEngine::new(policy),
            mutation_policy,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.destination
    }

    pub fn policy(&self) -> Policy {
        self.engine.policy()
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.engine.set_policy(policy);
    }

    pub fn mutation_policy(&self) -> MutationPolicy {
        self.mutation_policy
    }

    /// The phase the next `step` will run
    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    // ---- build -------------------------------------------------------------

    pub fn add_node(&mut self) -> NodeId {
        let id = self.graph.add_node();
        self.engine.reset();
        id
    }

    /// Join two nodes.
    ///
    /// A node that has never been numbered becomes the tail and is numbered
    /// above every other node, so it drains toward the existing orientation.
    /// Otherwise the edge is oriented `a -> b` unless that would close a
    /// directed cycle. Under [`MutationPolicy::Reorient`] the whole graph is
    /// then re-oriented if it is connected.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<EdgeId> {
        let edge = self.graph.add_edge(a, b)?;

        match (self.graph.height(a), self.graph.height(b)) {
            (Some(_), None) => {
                self.graph.flip(edge)?;
                self.number_above_all(b)?;
            }
            (None, Some(_)) => self.number_above_all(a)?,
            _ => {
                if has_directed_path(&self.graph, b, a) {
                    self.graph.flip(edge)?;
                }
            }
        }

        if self.mutation_policy == MutationPolicy::Reorient {
            if let Some(destination) = self.destination {
                // an unfinished build is not an error; the new edge cannot disconnect anything
                if let Err(err) = orient_towards(&mut self.graph, destination) {
                    tracing::debug!(%err, "graph not yet connected, keeping local orientation");
                }
            }
        }
        self.engine.reset();
        Ok(edge)
    }

    fn number_above_all(&mut self, node: NodeId) -> Result<()> {
        let height = self.graph.max_height().map_or(0, |h| h + 1);
        self.graph.set_height(node, height)
    }

    /// Remove a node and its edges.
    ///
    /// Removing the destination leaves the simulation without one. Under
    /// [`MutationPolicy::Reorient`] any other removal that would strand a
    /// node fails with [`GraphError::DisconnectedComponent`].
    pub fn remove_node(&mut self, node: NodeId) -> Result<Vec<EdgeId>> {
        if !self.graph.contains_node(node) {
            return Err(GraphError::UnknownNode(node));
        }
        let removed = self.mutate(|g| g.remove_node(node), self.destination != Some(node))?;
        self.engine.forget_node(node);
        if self.destination == Some(node) {
            tracing::info!(%node, "destination removed");
            self.destination = None;
        }
        Ok(removed)
    }

    /// Remove a single edge, with the same rules as [`Simulation::remove_node`]
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<(NodeId, NodeId)> {
        if !self.graph.contains_edge(edge) {
            return Err(GraphError::UnknownEdge(edge));
        }
        self.mutate(|g| g.remove_edge(edge), true)
    }

    /// Apply a destructive mutation, re-orienting afterwards if configured
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut Graph) -> Result<T>,
        reorient: bool,
    ) -> Result<T> {
        let target = match self.destination {
            Some(destination) if reorient && self.mutation_policy == MutationPolicy::Reorient => {
                destination
            }
            _ => {
                let out = op(&mut self.graph)?;
                self.engine.reset();
                return Ok(out);
            }
        };

        let mut candidate = self.graph.clone();
        let out = op(&mut candidate)?;
        if let Err(err) = orient_towards(&mut candidate, target) {
            tracing::warn!(%err, "rejected mutation");
            return Err(err);
        }
        self.graph = candidate;
        self.engine.reset();
        Ok(out)
    }

    // ---- configure ---------------------------------------------------------

    /// Make `node` the destination and orient the whole graph toward it
    pub fn set_destination(&mut self, node: NodeId) -> Result<OrientationReport> {
        let report = orient_towards(&mut self.graph, node)?;
        self.destination = Some(node);
        self.engine.reset();
        tracing::info!(
            destination = %node,
            flipped = report.flipped.len(),
            "destination set"
        );
        Ok(report)
    }

    /// Re-run the orientation initializer against the current destination
    pub fn reorient(&mut self) -> Result<OrientationReport> {
        let destination = self.destination.ok_or(GraphError::NoDestination)?;
        self.set_destination(destination)
    }

    // ---- drive -------------------------------------------------------------

    /// Run one phase; two calls make one round
    pub fn step(&mut self) -> Result<Phase> {
        let destination = self.destination.ok_or(GraphError::NoDestination)?;
        self.engine.step(&mut self.graph, destination)
    }

    /// Finish the current round, or run a whole one if none is in progress.
    /// Returns the edges reversed.
    pub fn run_round(&mut self) -> Result<Vec<EdgeId>> {
        if self.step()? == Phase::Select {
            self.step()?;
        }
        Ok(self.engine.last_flipped().to_vec())
    }

    /// Drive whole rounds until a `Select` finds nothing to reverse
    pub fn run_until_stable(&mut self, max_rounds: usize) -> Result<ConvergenceReport> {
        if self.phase() == Phase::Apply {
            self.step()?;
        }

        let mut rounds = 0;
        let mut flips = 0u64;
        loop {
            self.step()?;
            let quiet = self.engine.pending().is_empty();
            self.step()?;
            if quiet {
                let stranded = sinks(&self.graph, self.destination);
                if !stranded.is_empty() {
                    tracing::warn!(?stranded, "quiet round left isolated nodes");
                }
                return Ok(ConvergenceReport {
                    rounds,
                    flips,
                    converged: stranded.is_empty(),
                });
            }
            rounds += 1;
            flips += self.engine.last_flipped().len() as u64;
            if rounds >= max_rounds {
                tracing::warn!(rounds, "no stable orientation reached");
                return Ok(ConvergenceReport {
                    rounds,
                    flips,
                    converged: false,
                });
            }
        }
    }

    // ---- inspect -----------------------------------------------------------

    pub fn orientation(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.graph.orientation(edge)
    }

    /// Edges the next `Apply` will reverse; empty unless the last phase was `Select`
    pub fn pending_flip_set(&self) -> BTreeSet<EdgeId> {
        self.engine.pending().clone()
    }

    /// A node other than the destination with no outgoing edge
    pub fn is_sink(&self, node: NodeId) -> bool {
        self.destination != Some(node)
            && self.graph.node(node).is_some_and(|n| n.out_degree() == 0)
    }

    pub fn height(&self, node: NodeId) -> Option<u64> {
        self.graph.height(node)
    }

    pub fn last_selection(&self) -> &SelectionReport {
        self.engine.last_selection()
    }

    pub fn last_flipped(&self) -> &[EdgeId] {
        self.engine.last_flipped()
    }

    pub fn stats(&self) -> &ReversalStats {
        self.engine.stats()
    }

    pub fn check_destination_oriented(&self) -> std::result::Result<(), DoaViolation> {
        match self.destination {
            Some(destination) => check_destination_oriented(&self.graph, destination),
            None => Err(DoaViolation::NoDestination),
        }
    }

    pub fn is_destination_oriented(&self) -> bool {
        self.check_destination_oriented().is_ok()
    }

    /// Copy of the full state for a renderer or exporter
    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot::capture(self)
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(Policy::Full, MutationPolicy::Reorient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(sim: &mut Simulation, len: usize) -> (Vec<NodeId>, Vec<EdgeId>) {
        let nodes: Vec<NodeId> = (0..len).map(|_| sim.add_node()).collect();
        let edges = nodes
            .windows(2)
            .map(|w| sim.add_edge(w[0], w[1]).unwrap())
            .collect();
        (nodes, edges)
    }

    #[test]
    fn test_step_without_destination() {
        let mut sim = Simulation::default();
        path(&mut sim, 3);
        assert_eq!(sim.step(), Err(GraphError::NoDestination));
        assert_eq!(sim.reorient().unwrap_err(), GraphError::NoDestination);
    }

    #[test]
    fn test_set_destination_resets_engine() {
        let mut sim = Simulation::default();
        let (n, e) = path(&mut sim, 3);
        sim.set_destination(n[2]).unwrap();
        sim.graph.flip(e[1]).unwrap();
        sim.step().unwrap();
        assert!(!sim.pending_flip_set().is_empty());

        sim.set_destination(n[0]).unwrap();
        assert_eq!(sim.phase(), Phase::Select);
        assert!(sim.pending_flip_set().is_empty());
        assert!(sim.is_destination_oriented());
        assert_eq!(sim.height(n[0]), Some(0));
    }

    #[test]
    fn test_unknown_destination_changes_nothing() {
        let mut sim = Simulation::default();
        let (n, _) = path(&mut sim, 2);
        sim.set_destination(n[1]).unwrap();
        assert_eq!(
            sim.set_destination(NodeId(50)).unwrap_err(),
            GraphError::UnknownNode(NodeId(50))
        );
        assert_eq!(sim.destination(), Some(n[1]));
    }

    #[test]
    fn test_new_leaf_drains_toward_graph() {
        let mut sim = Simulation::new(Policy::Full, MutationPolicy::Repair);
        let (n, _) = path(&mut sim, 3);
        sim.set_destination(n[0]).unwrap();

        let leaf = sim.add_node();
        let e = sim.add_edge(n[1], leaf).unwrap();
        assert_eq!(sim.orientation(e), Some((leaf, n[1])));
        assert_eq!(sim.height(leaf), Some(3));
        assert!(sim.is_destination_oriented());
    }

    #[test]
    fn test_chord_never_closes_a_cycle() {
        let mut sim = Simulation::new(Policy::Full, MutationPolicy::Repair);
        let (n, _) = path(&mut sim, 4);
        sim.set_destination(n[3]).unwrap();
        // n0 reaches n3, so joining n3 -> n0 would close a cycle
        let chord = sim.add_edge(n[3], n[0]).unwrap();
        assert_eq!(sim.orientation(chord), Some((n[0], n[3])));
        assert!(sim.is_destination_oriented());
    }

    #[test]
    fn test_remove_node_resets_pending_selection() {
        let mut sim = Simulation::new(Policy::Full, MutationPolicy::Repair);
        let (n, e) = path(&mut sim, 4);
        sim.set_destination(n[3]).unwrap();
        sim.graph.flip(e[0]).unwrap();
        sim.step().unwrap();
        assert_eq!(sim.pending_flip_set(), BTreeSet::from([e[0]]));

        sim.remove_node(n[0]).unwrap();
        assert_eq!(sim.phase(), Phase::Select);
        assert!(sim.pending_flip_set().is_empty());
        assert!(sim.is_destination_oriented());
    }

    #[test]
    fn test_reorient_rejects_disconnecting_removal() {
        let mut sim = Simulation::default();
        let (n, _) = path(&mut sim, 3);
        sim.set_destination(n[2]).unwrap();
        let before = sim.graph().clone();

        assert_eq!(
            sim.remove_node(n[1]).unwrap_err(),
            GraphError::DisconnectedComponent {
                node: n[0],
                destination: n[2]
            }
        );
        assert_eq!(sim.graph(), &before);
        assert_eq!(sim.remove_node(NodeId(77)), Err(GraphError::UnknownNode(NodeId(77))));
    }

    #[test]
    fn test_removing_destination_clears_it() {
        let mut sim = Simulation::default();
        let (n, _) = path(&mut sim, 3);
        sim.set_destination(n[1]).unwrap();
        let removed = sim.remove_node(n[1]).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(sim.destination(), None);
        assert!(sim.is_sink(n[0]));
        assert_eq!(sim.step(), Err(GraphError::NoDestination));
    }

    #[test]
    fn test_repair_mode_converges_after_removal() {
        let mut sim = Simulation::new(Policy::Partial, MutationPolicy::Repair);
        let n: Vec<NodeId> = (0..5).map(|_| sim.add_node()).collect();
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (1, 3)] {
            sim.add_edge(n[a], n[b]).unwrap();
        }
        sim.set_destination(n[0]).unwrap();
        sim.remove_edge(sim.graph().edge_between(n[0], n[1]).unwrap())
            .unwrap();

        let report = sim.run_until_stable(100).unwrap();
        assert!(report.converged);
        assert!(sim.is_destination_oriented());
        assert_eq!(sim.phase(), Phase::Select);
    }

    #[test]
    fn test_isolated_node_is_not_converged() {
        let mut sim = Simulation::new(Policy::Full, MutationPolicy::Repair);
        let (n, _) = path(&mut sim, 3);
        sim.set_destination(n[0]).unwrap();
        sim.remove_node(n[1]).unwrap();

        let report = sim.run_until_stable(10).unwrap();
        assert_eq!(report.rounds, 0);
        assert!(!report.converged);
        assert!(sim.is_sink(n[2]));
        assert!(!sim.is_destination_oriented());
    }

    #[test]
    fn test_removed_node_leaves_reversal_counts() {
        let mut sim = Simulation::new(Policy::Full, MutationPolicy::Repair);
        let (n, e) = path(&mut sim, 4);
        sim.set_destination(n[3]).unwrap();
        sim.remove_edge(e[2]).unwrap();
        sim.run_until_stable(4).unwrap();
        assert!(sim.stats().reversals_per_node.contains_key(&n[2]));
        let rounds = sim.stats().rounds;

        sim.remove_node(n[2]).unwrap();
        assert!(!sim.stats().reversals_per_node.contains_key(&n[2]));
        assert_eq!(sim.stats().rounds, rounds);
    }

    #[test]
    fn test_run_round_finishes_open_round() {
        let mut sim = Simulation::new(Policy::Full, MutationPolicy::Repair);
        let (n, e) = path(&mut sim, 3);
        sim.set_destination(n[2]).unwrap();
        sim.graph.flip(e[1]).unwrap();

        sim.step().unwrap();
        let flipped = sim.run_round().unwrap();
        assert_eq!(flipped, vec![e[0], e[1]]);
        assert_eq!(sim.phase(), Phase::Select);
        assert_eq!(sim.stats().rounds, 1);
    }
}
