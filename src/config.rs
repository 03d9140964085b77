//! Simulation configuration
//!
//! Defaults describe a removal experiment: removed nodes are repaired by link
//! reversal rather than by re-running the initializer, so every run measures
//! re-convergence. The simulator binary loads a JSON file and then lets
//! command-line flags override individual fields.

use crate::reversal::Policy;
use crate::topology::TopologyKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// What happens to the orientation after a node or edge is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationPolicy {
    /// Re-run the orientation initializer; reject removals that disconnect the graph
    #[default]
    Reorient,
    /// Keep the orientation and let link reversal restore it over later rounds
    Repair,
}

impl std::fmt::Display for MutationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationPolicy::Reorient => write!(f, "reorient"),
            MutationPolicy::Repair => write!(f, "repair"),
        }
    }
}

impl std::str::FromStr for MutationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reorient" => Ok(MutationPolicy::Reorient),
            "repair" => Ok(MutationPolicy::Repair),
            other => Err(format!("Unknown mutation policy: {}", other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub policy: Policy,
    pub mutation_policy: MutationPolicy,
    /// Upper bound on rounds when driving to a stable state
    pub max_rounds: usize,
    pub topology: TopologyKind,
    pub num_nodes: usize,
    /// Extra-edge probability for random topologies
    pub edge_probability: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            policy: Policy::Full,
            mutation_policy: MutationPolicy::Repair,
            max_rounds: 1000,
            topology: TopologyKind::Path,
            num_nodes: 16,
            edge_probability: 0.1,
            seed: 42,
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
