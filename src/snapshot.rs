//! Copy-on-read export of simulation state
//!
//! A presentation layer that runs on another thread (or another process)
//! reads a [`SimulationSnapshot`] instead of the live graph. The snapshot
//! carries everything needed for colour coding: pending edges between a
//! `Select` and its `Apply`, edges reversed by the last `Apply`, and sinks.

use crate::graph::{EdgeId, NodeId};
use crate::reversal::{Phase, Policy};
use crate::simulation::Simulation;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub height: Option<u64>,
    pub is_destination: bool,
    pub is_sink: bool,
    pub out_degree: usize,
    pub in_degree: usize,
    pub recent_inbound_flips: Vec<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub tail: NodeId,
    pub head: NodeId,
    /// Selected by the last `Select`, not yet reversed
    pub pending: bool,
    /// Reversed by the last `Apply`
    pub last_flipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub destination: Option<NodeId>,
    pub policy: Policy,
    pub next_phase: Phase,
    pub destination_oriented: bool,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl SimulationSnapshot {
    pub fn capture(sim: &Simulation) -> Self {
        let graph = sim.graph();
        let pending = sim.pending_flip_set();
        let flipped = sim.last_flipped();

        let nodes = graph
            .nodes()
            .map(|n| NodeSnapshot {
                id: n.id,
                height: n.height(),
                is_destination: sim.destination() == Some(n.id),
                is_sink: sim.is_sink(n.id),
                out_degree: n.out_degree(),
                in_degree: n.in_degree(),
                recent_inbound_flips: n.recent_inbound_flips().iter().copied().collect(),
            })
            .collect();

        let edges = graph
            .edges()
            .map(|e| EdgeSnapshot {
                id: e.id,
                tail: e.tail,
                head: e.head,
                pending: pending.contains(&e.id),
                last_flipped: flipped.contains(&e.id),
            })
            .collect();

        Self {
            destination: sim.destination(),
            policy: sim.policy(),
            next_phase: sim.phase(),
            destination_oriented: sim.is_destination_oriented(),
            nodes,
            edges,
        }
    }

    pub fn sinks(&self) -> Vec<NodeId> {
        self.nodes.iter().filter(|n| n.is_sink).map(|n| n.id).collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json_pretty()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())
    }
}
