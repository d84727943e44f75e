use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use hookline_core::{DepValue, EffectSpec, NodeSpec, SimConfig, Simulator};

/// A root with `width` children, each with `width` leaves, all watching `x`.
fn wide_tree(width: usize) -> NodeSpec {
    let mut root = NodeSpec::new("root").value("x", 0);
    for i in 0..width {
        let mut branch = NodeSpec::new(format!("b{i}"))
            .effect(EffectSpec::on(format!("e{i}"), ["x"]).cleanup(|_| Ok(())));
        for j in 0..width {
            branch = branch.child(
                NodeSpec::new(format!("l{i}_{j}"))
                    .effect(EffectSpec::on(format!("e{i}_{j}"), ["x"]).cleanup(|_| Ok(()))),
            );
        }
        root = root.child(branch);
    }
    root
}

fn mount_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("mount_pass");
    for width in [4, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let mut sim = Simulator::new(wide_tree(width), SimConfig::default());
                black_box(sim.pass());
            });
        });
    }
    group.finish();
}

fn update_benchmark(c: &mut Criterion) {
    let mut sim = Simulator::new(wide_tree(16), SimConfig::default());
    sim.pass();
    let root = sim.tree().root();

    c.bench_function("update_pass", |b| {
        let mut x = 0_i64;
        b.iter(|| {
            x += 1;
            sim.tree_mut()
                .request_update(root, [("x", DepValue::from(x))])
                .unwrap();
            black_box(sim.pass());
        });
    });
}

fn idle_benchmark(c: &mut Criterion) {
    let mut sim = Simulator::new(wide_tree(16), SimConfig::default());
    sim.pass();

    c.bench_function("idle_pass", |b| {
        b.iter(|| {
            black_box(sim.pass());
        });
    });
}

criterion_group!(benches, mount_benchmark, update_benchmark, idle_benchmark);
criterion_main!(benches);
