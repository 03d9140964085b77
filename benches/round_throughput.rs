//! Benchmark for link reversal rounds
//!
//! Measures orientation of a fresh graph and the cost of restoring a
//! destination-oriented DAG after a destination change, for both policies
//! and several network sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use link_reversal::config::MutationPolicy;
use link_reversal::orientation::orient_towards;
use link_reversal::topology::{self, TopologyKind};
use link_reversal::{Policy, Simulation};

fn bench_orientation(c: &mut Criterion) {
    let mut group = c.benchmark_group("orientation");

    for size in [100, 500, 2000] {
        let (graph, nodes) = topology::build(TopologyKind::Random, size, 4.0 / size as f64, 42);
        group.throughput(Throughput::Elements(graph.edge_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut g = graph.clone();
                black_box(orient_towards(&mut g, nodes[0]).ok());
            })
        });
    }

    group.finish();
}

/// Orient a grid toward a corner, drop one of the corner's two links and
/// let reversal restore the orientation
fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair_after_edge_loss");

    for policy in [Policy::Full, Policy::Partial] {
        for size in [64, 256, 1024] {
            let (graph, nodes) = topology::build(TopologyKind::Grid, size, 0.0, 42);
            let mut base = Simulation::from_graph(graph, policy, MutationPolicy::Repair);
            if base.set_destination(nodes[0]).is_err() {
                continue;
            }
            if let Some(edge) = base.graph().edge_between(nodes[0], nodes[1]) {
                let _ = base.remove_edge(edge);
            }

            group.bench_with_input(
                BenchmarkId::new(policy.to_string(), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        let mut sim = base.clone();
                        black_box(sim.run_until_stable(10_000).ok());
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_single_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("stable_round");

    for size in [100, 1000] {
        let (graph, nodes) = topology::build(TopologyKind::Random, size, 4.0 / size as f64, 7);
        let mut sim = Simulation::from_graph(graph, Policy::Full, MutationPolicy::Repair);
        if sim.set_destination(nodes[0]).is_err() {
            continue;
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                black_box(sim.run_round().ok());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_orientation, bench_repair, bench_single_round);
criterion_main!(benches);
