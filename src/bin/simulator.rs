//! Link Reversal Simulator
//!
//! Builds a topology, orients it toward a destination and then removes nodes
//! one at a time, measuring how many rounds and reversals each policy needs
//! to restore a destination-oriented DAG.

use link_reversal::config::{MutationPolicy, SimConfig};
use link_reversal::invariants::sinks;
use link_reversal::telemetry::{init_logging, LogFormat};
use link_reversal::topology::TopologyKind;
use link_reversal::{build_simulation, GraphError, NodeId, Policy, Simulation};
use rand::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

/// Outcome of one removal followed by re-convergence
#[derive(Debug, Clone, Serialize)]
struct RemovalRecord {
    event: usize,
    removed: NodeId,
    rejected: bool,
    rounds: usize,
    flips: u64,
    converged: bool,
    destination_oriented: bool,
    remaining_nodes: usize,
    remaining_edges: usize,
}

/// Results of one run
#[derive(Debug, Clone, Serialize)]
struct SimResults {
    policy: Policy,
    mutation_policy: MutationPolicy,
    initial_height: u64,
    removals: usize,
    rejected_removals: usize,
    total_rounds: usize,
    total_flips: u64,
    max_rounds_single_event: usize,
    fallbacks: u64,
    unconverged_events: usize,
    final_destination_oriented: bool,
    elapsed_ms: u128,
    events: Vec<RemovalRecord>,
}

impl std::fmt::Display for SimResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Simulation Results ({} / {}) ===", self.policy, self.mutation_policy)?;
        writeln!(f, "Initial max height:   {}", self.initial_height)?;
        writeln!(f, "Removals:             {}", self.removals)?;
        writeln!(f, "Rejected removals:    {}", self.rejected_removals)?;
        writeln!(f, "Total rounds:         {}", self.total_rounds)?;
        writeln!(f, "Total flips:          {}", self.total_flips)?;
        writeln!(f, "Worst event rounds:   {}", self.max_rounds_single_event)?;
        writeln!(f, "Partial fallbacks:    {}", self.fallbacks)?;
        writeln!(f, "Unconverged events:   {}", self.unconverged_events)?;
        writeln!(f, "Final DOA holds:      {}", self.final_destination_oriented)?;
        writeln!(f, "Elapsed time:         {} ms", self.elapsed_ms)?;
        Ok(())
    }
}

/// Pick a random node other than the destination
fn pick_victim(sim: &Simulation, rng: &mut StdRng) -> Option<NodeId> {
    let candidates: Vec<NodeId> = sim
        .graph()
        .node_ids()
        .into_iter()
        .filter(|&n| Some(n) != sim.destination())
        .collect();
    candidates.choose(rng).copied()
}

fn run(
    config: &SimConfig,
    removals: usize,
    trace: bool,
) -> Result<(SimResults, Simulation), GraphError> {
    let start = Instant::now();
    let (mut sim, _) = build_simulation(config)?;
    let initial_height = sim.graph().max_height().unwrap_or(0);

    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1000));
    let mut events = Vec::new();

    for event in 0..removals {
        let Some(victim) = pick_victim(&sim, &mut rng) else {
            break;
        };

        let rejected = match sim.remove_node(victim) {
            Ok(_) => false,
            Err(GraphError::DisconnectedComponent { node, .. }) => {
                tracing::info!(%victim, stranded = %node, "removal rejected");
                true
            }
            Err(err) => return Err(err),
        };

        let report = sim.run_until_stable(config.max_rounds)?;
        if trace {
            println!(
                "event {:>3}: removed {:<6} rounds={:<4} flips={:<6} sinks={:?}",
                event,
                victim.to_string(),
                report.rounds,
                report.flips,
                sinks(sim.graph(), sim.destination())
            );
        }

        events.push(RemovalRecord {
            event,
            removed: victim,
            rejected,
            rounds: report.rounds,
            flips: report.flips,
            converged: report.converged,
            destination_oriented: sim.is_destination_oriented(),
            remaining_nodes: sim.graph().node_count(),
            remaining_edges: sim.graph().edge_count(),
        });
    }

    let results = SimResults {
        policy: config.policy,
        mutation_policy: config.mutation_policy,
        initial_height,
        removals: events.iter().filter(|e| !e.rejected).count(),
        rejected_removals: events.iter().filter(|e| e.rejected).count(),
        total_rounds: events.iter().map(|e| e.rounds).sum(),
        total_flips: events.iter().map(|e| e.flips).sum(),
        max_rounds_single_event: events.iter().map(|e| e.rounds).max().unwrap_or(0),
        fallbacks: sim.stats().fallbacks,
        unconverged_events: events.iter().filter(|e| !e.converged).count(),
        final_destination_oriented: sim.is_destination_oriented(),
        elapsed_ms: start.elapsed().as_millis(),
        events,
    };
    Ok((results, sim))
}

fn print_usage() {
    println!("Usage: simulator [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config FILE      JSON config file (flags below override it)");
    println!("  -n, --nodes NUM        Number of nodes (default: 16)");
    println!("  -t, --topology TYPE    path, star, ring, grid, random (default: path)");
    println!("  -p, --policy POLICY    full, partial, both (default: full)");
    println!("  -m, --mutation MODE    repair, reorient (default: repair)");
    println!("      --edge-prob P      Extra edge probability for random (default: 0.1)");
    println!("      --remove NUM       Nodes to remove one by one (default: 0)");
    println!("      --rounds NUM       Max rounds per re-convergence (default: 1000)");
    println!("      --seed NUM         Random seed (default: 42)");
    println!("      --trace            Print one line per removal");
    println!("  -o, --output FILE      Write results as JSON");
    println!("  -e, --export FILE      Write final state snapshot as JSON");
    println!("      --json-logs        Emit logs as JSON");
    println!("  -h, --help             Show this help");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // config file first so that flags can override it
    let mut config = SimConfig::default();
    if let Some(pos) = args.iter().position(|a| a == "-c" || a == "--config") {
        match args.get(pos + 1).map(SimConfig::from_json_file) {
            Some(Ok(loaded)) => config = loaded,
            Some(Err(e)) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
            None => {
                eprintln!("--config needs a file path");
                std::process::exit(1);
            }
        }
    }

    let mut removals = 0usize;
    let mut compare = false;
    let mut trace = false;
    let mut log_format = LogFormat::Plain;
    let mut output_file: Option<String> = None;
    let mut export_file: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).map(String::as_str);
        match args[i].as_str() {
            "-c" | "--config" => i += 1,
            "-n" | "--nodes" => {
                config.num_nodes = value.and_then(|v| v.parse().ok()).unwrap_or(16);
                i += 1;
            }
            "-t" | "--topology" => {
                config.topology = value
                    .and_then(|v| v.parse::<TopologyKind>().ok())
                    .unwrap_or_default();
                i += 1;
            }
            "-p" | "--policy" => {
                match value {
                    Some("both") => compare = true,
                    Some(v) => config.policy = v.parse().unwrap_or_default(),
                    None => {}
                }
                i += 1;
            }
            "-m" | "--mutation" => {
                config.mutation_policy = value
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(MutationPolicy::Repair);
                i += 1;
            }
            "--edge-prob" => {
                config.edge_probability = value.and_then(|v| v.parse().ok()).unwrap_or(0.1);
                i += 1;
            }
            "--remove" => {
                removals = value.and_then(|v| v.parse().ok()).unwrap_or(0);
                i += 1;
            }
            "--rounds" => {
                config.max_rounds = value.and_then(|v| v.parse().ok()).unwrap_or(1000);
                i += 1;
            }
            "--seed" => {
                config.seed = value.and_then(|v| v.parse().ok()).unwrap_or(42);
                i += 1;
            }
            "--trace" => trace = true,
            "-o" | "--output" => {
                output_file = value.map(str::to_string);
                i += 1;
            }
            "-e" | "--export" => {
                export_file = value.map(str::to_string);
                i += 1;
            }
            "--json-logs" => log_format = LogFormat::Json,
            "-h" | "--help" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                std::process::exit(2);
            }
        }
        i += 1;
    }

    init_logging(log_format);

    println!("Link Reversal Simulator");
    println!("=======================\n");
    println!("Configuration:");
    println!("  Nodes:     {}", config.num_nodes);
    println!("  Topology:  {}", config.topology);
    println!("  Policy:    {}", if compare { "both".to_string() } else { config.policy.to_string() });
    println!("  Mutation:  {}", config.mutation_policy);
    println!("  Removals:  {}", removals);
    println!("  Seed:      {}", config.seed);
    println!();

    let policies = if compare {
        vec![Policy::Full, Policy::Partial]
    } else {
        vec![config.policy]
    };

    let mut all_results = Vec::new();
    let mut final_state = None;
    for policy in policies {
        let run_config = SimConfig { policy, ..config.clone() };
        match run(&run_config, removals, trace) {
            Ok((results, sim)) => {
                println!("{}", results);
                all_results.push(results);
                final_state = Some(sim);
            }
            Err(e) => {
                eprintln!("Simulation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Some(path) = output_file {
        match serde_json::to_string_pretty(&all_results) {
            Ok(json) => {
                if let Err(e) = File::create(&path).and_then(|mut f| f.write_all(json.as_bytes())) {
                    eprintln!("Failed to write {}: {}", path, e);
                } else {
                    println!("Results written to {}", path);
                }
            }
            Err(e) => eprintln!("Failed to serialize results: {}", e),
        }
    }

    if let (Some(path), Some(sim)) = (export_file, final_state) {
        match sim.snapshot().write_json(&path) {
            Ok(()) => println!("Snapshot written to {}", path),
            Err(e) => eprintln!("Failed to write {}: {}", path, e),
        }
    }
}
