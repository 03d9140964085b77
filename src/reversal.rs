//! Reversal Engine: Full and Partial link reversal
//!
//! Implements the Gafni–Bertsekas round as an explicit two-phase state
//! machine. A `Select` phase decides which edges every sink reverses; the
//! following `Apply` phase reverses exactly those edges. Keeping the two apart
//! gives a driver a checkpoint where the pending set can be inspected before
//! anything changes.
//!
//! Reference: Gafni–Bertsekas (1981)

use crate::graph::{EdgeId, Graph, GraphError, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Edge selection policy for sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// A sink reverses all of its incoming edges
    #[default]
    Full,
    /// A sink skips edges reversed into it since it last reversed,
    /// unless that would leave nothing to reverse
    Partial,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Full => write!(f, "full"),
            Policy::Partial => write!(f, "partial"),
        }
    }
}

impl std::str::FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Policy::Full),
            "partial" => Ok(Policy::Partial),
            other => Err(format!("Unknown policy: {}", other)),
        }
    }
}

/// The half of a round that a call to `step` runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Decide which edges to reverse
    Select,
    /// Reverse the edges chosen by the preceding `Select`
    Apply,
}

impl Phase {
    fn next(self) -> Self {
        match self {
            Phase::Select => Phase::Apply,
            Phase::Apply => Phase::Select,
        }
    }
}

/// What a sink contributes to the pending set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSelection {
    pub edges: BTreeSet<EdgeId>,
    /// Partial only: every incoming edge was recently reversed, so all are taken
    pub exhausted: bool,
}

/// Edges that `node` would reverse as a sink under `policy`.
///
/// Does not check that `node` is actually a sink.
pub fn sink_selection(graph: &Graph, node: NodeId, policy: Policy) -> SinkSelection {
    let Some(n) = graph.node(node) else {
        return SinkSelection {
            edges: BTreeSet::new(),
            exhausted: false,
        };
    };

    match policy {
        Policy::Full => SinkSelection {
            edges: n.incoming().clone(),
            exhausted: false,
        },
        Policy::Partial => {
            let fresh: BTreeSet<EdgeId> = n
                .incoming()
                .difference(n.recent_inbound_flips())
                .copied()
                .collect();
            if fresh.is_empty() {
                SinkSelection {
                    edges: n.incoming().clone(),
                    exhausted: true,
                }
            } else {
                SinkSelection {
                    edges: fresh,
                    exhausted: false,
                }
            }
        }
    }
}

/// Summary of the most recent `Select` phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionReport {
    /// Non-destination nodes that had no outgoing edge
    pub sinks: Vec<NodeId>,
    /// Sinks that fell back to full reversal under Partial
    pub exhausted: Vec<NodeId>,
    /// Outgoing edges of the destination, forced back toward it
    pub destination_edges: Vec<EdgeId>,
    /// The deduplicated pending set
    pub selected: BTreeSet<EdgeId>,
}

/// Cumulative counters since the engine was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReversalStats {
    /// Completed `Apply` phases
    pub rounds: u64,
    /// Total edge reversals
    pub flips: u64,
    /// Partial-policy fallbacks to full reversal
    pub fallbacks: u64,
    /// How often each node acted as a reversing sink; dropped when the node is removed
    pub reversals_per_node: BTreeMap<NodeId, u64>,
}

/// Two-phase link reversal state machine
#[derive(Debug, Clone)]
pub struct ReversalEngine {
    policy: Policy,
    phase: Phase,
    pending: BTreeSet<EdgeId>,
    last_selection: SelectionReport,
    last_flipped: Vec<EdgeId>,
    stats: ReversalStats,
}

impl ReversalEngine {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            phase: Phase::Select,
            pending: BTreeSet::new(),
            last_selection: SelectionReport::default(),
            last_flipped: Vec::new(),
            stats: ReversalStats::default(),
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Takes effect from the next phase; a pending selection is kept
    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    /// The phase the next `step` will run
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Edges chosen by the last `Select`; empty unless an `Apply` is due
    pub fn pending(&self) -> &BTreeSet<EdgeId> {
        &self.pending
    }

    pub fn last_selection(&self) -> &SelectionReport {
        &self.last_selection
    }

    /// Edges reversed by the last `Apply`; empty right after a `Select`
    pub fn last_flipped(&self) -> &[EdgeId] {
        &self.last_flipped
    }

    pub fn stats(&self) -> &ReversalStats {
        &self.stats
    }

    /// Forget the per-node counters of a node that left the graph
    pub fn forget_node(&mut self, node: NodeId) {
        self.stats.reversals_per_node.remove(&node);
    }

    /// Drop any pending selection and return to `Select`
    pub fn reset(&mut self) {
        self.phase = Phase::Select;
        self.pending.clear();
        self.last_selection = SelectionReport::default();
        self.last_flipped.clear();
    }

    /// Run one phase and report which one ran
    pub fn step(&mut self, graph: &mut Graph, destination: NodeId) -> Result<Phase> {
        if !graph.contains_node(destination) {
            return Err(GraphError::UnknownNode(destination));
        }

        let ran = self.phase;
        match ran {
            Phase::Select => self.select(graph, destination),
            Phase::Apply => self.apply(graph)?,
        }
        self.phase = ran.next();
        Ok(ran)
    }

    fn select(&mut self, graph: &Graph, destination: NodeId) {
        let mut report = SelectionReport::default();

        for node in graph.nodes() {
            if node.id == destination || node.out_degree() > 0 {
                continue;
            }
            report.sinks.push(node.id);

            let choice = sink_selection(graph, node.id, self.policy);
            if choice.exhausted {
                report.exhausted.push(node.id);
                self.stats.fallbacks += 1;
            }
            if !choice.edges.is_empty() {
                *self.stats.reversals_per_node.entry(node.id).or_insert(0) += 1;
            }
            report.selected.extend(choice.edges);
        }

        report.destination_edges = graph.outgoing(destination).into_iter().collect();
        report
            .selected
            .extend(report.destination_edges.iter().copied());

        tracing::debug!(
            policy = %self.policy,
            sinks = report.sinks.len(),
            exhausted = report.exhausted.len(),
            selected = report.selected.len(),
            "select phase"
        );

        self.pending = report.selected.clone();
        self.last_selection = report;
        self.last_flipped.clear();
    }

    fn apply(&mut self, graph: &mut Graph) -> Result<()> {
        // all-or-nothing: a selection that went stale is left pending
        if let Some(&missing) = self.pending.iter().find(|&&e| !graph.contains_edge(e)) {
            return Err(GraphError::UnknownEdge(missing));
        }
        let pending = std::mem::take(&mut self.pending);
        let mut flipped = Vec::with_capacity(pending.len());

        for edge in pending {
            let (new_tail, new_head) = graph.flip(edge)?;
            if self.policy == Policy::Partial {
                graph.record_inbound_flip(new_head, edge);
                // new_tail is the node that just reversed (the edge's former head)
                graph.clear_inbound_flips(new_tail);
            }
            flipped.push(edge);
        }

        self.stats.rounds += 1;
        self.stats.flips += flipped.len() as u64;
        tracing::debug!(
            round = self.stats.rounds,
            flipped = flipped.len(),
            "apply phase"
        );
        self.last_flipped = flipped;
        Ok(())
    }
}

impl Default for ReversalEngine {
    fn default() -> Self {
        Self::new(Policy::Full)
    }
}
