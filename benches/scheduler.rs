// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Round scheduling benchmarks over synthetic ticket graphs

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tickwheel::graph::TicketGraph;

/// A single chain: each ticket blocks the next
fn chain(n: usize) -> TicketGraph {
    let mut graph = TicketGraph::new();
    for i in 0..n {
        graph.add_ticket(&format!("CHAIN-{i}"));
    }
    for i in 1..n {
        graph.add_dependency(&format!("CHAIN-{}", i - 1), &format!("CHAIN-{i}"));
    }
    graph
}

/// `layers` rounds of `width` tickets, every ticket blocking the whole
/// next layer
fn mesh(layers: usize, width: usize) -> TicketGraph {
    let mut graph = TicketGraph::new();
    for layer in 0..layers {
        for slot in 0..width {
            graph.add_ticket(&format!("MESH-{layer}-{slot}"));
        }
    }
    for layer in 1..layers {
        for from in 0..width {
            for to in 0..width {
                graph.add_dependency(
                    &format!("MESH-{}-{from}", layer - 1),
                    &format!("MESH-{layer}-{to}"),
                );
            }
        }
    }
    graph
}

fn bench_rounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("rounds");
    for size in [100_usize, 1_000, 4_000] {
        let graph = chain(size);
        group.bench_with_input(BenchmarkId::new("chain", size), &graph, |b, graph| {
            b.iter(|| black_box(graph).rounds());
        });
    }
    for (layers, width) in [(10_usize, 10_usize), (20, 25)] {
        let graph = mesh(layers, width);
        let label = format!("{layers}x{width}");
        group.bench_with_input(BenchmarkId::new("mesh", label), &graph, |b, graph| {
            b.iter(|| black_box(graph).rounds());
        });
    }
    group.finish();
}

fn bench_transitive(c: &mut Criterion) {
    let graph = chain(1_000);
    c.bench_function("transitive_predecessors/chain-1000", |b| {
        b.iter(|| black_box(&graph).transitive_predecessors(black_box("CHAIN-999")));
    });
}

criterion_group!(benches, bench_rounds, bench_transitive);
criterion_main!(benches);
