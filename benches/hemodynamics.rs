//! Hemodynamics benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vessel_simulator_x::config::{LayoutKind, Parameters};
use vessel_simulator_x::geometry::{adapter_for, build_network};
use vessel_simulator_x::hemodynamics::{GraphMaintenance, OxygenTransport, PressureFlowSolver};
use vessel_simulator_x::state::{AgentGrid, LatticeField, TissueEnvironment};
use vessel_simulator_x::VascularSystem;

fn bench_params(kind: LayoutKind) -> Parameters {
    let mut params = Parameters::default();
    params.layout.kind = kind;
    params
}

fn bench_layout_build(c: &mut Criterion) {
    let params = bench_params(LayoutKind::Roots);
    let adapter = adapter_for(&params.layout);

    c.bench_function("roots_layout_build", |b| {
        b.iter(|| build_network(black_box(adapter.as_ref()), black_box(&params)))
    });
}

fn bench_pressure_solve(c: &mut Criterion) {
    let params = bench_params(LayoutKind::Pattern);
    let adapter = adapter_for(&params.layout);
    let mut graph = build_network(adapter.as_ref(), &params).graph;
    let solver = PressureFlowSolver::new(params.hemodynamics.clone());

    c.bench_function("pressure_solve_pattern", |b| {
        b.iter(|| solver.solve(black_box(&mut graph)))
    });
}

fn bench_oxygen_propagation(c: &mut Criterion) {
    let params = bench_params(LayoutKind::Pattern);
    let adapter = adapter_for(&params.layout);
    let mut graph = build_network(adapter.as_ref(), &params).graph;
    let maintenance = GraphMaintenance::new(params.hemodynamics.clone());
    let transport = OxygenTransport::new(params.transport.clone());
    let layout = &params.layout;
    let tissue = LatticeField::uniform(layout.depth, layout.width, layout.length, 20.0);

    c.bench_function("oxygen_propagation_pattern", |b| {
        b.iter(|| transport.propagate(black_box(&mut graph), black_box(&tissue), &maintenance))
    });
}

fn bench_system_step(c: &mut Criterion) {
    let params = bench_params(LayoutKind::Roots);
    let layout = params.layout.clone();
    let oxygen = LatticeField::uniform(layout.depth, layout.width, layout.length, 20.0);
    let vegf = LatticeField::from_fn(layout.depth, layout.width, layout.length, |_, x, _| x as f64 * 0.1);
    let agents = AgentGrid::new();
    let environment = TissueEnvironment {
        oxygen_mmHg: &oxygen,
        vegf: &vegf,
        agents: &agents,
    };

    c.bench_function("system_step_roots", |b| {
        b.iter_batched(
            || VascularSystem::new(params.clone()).expect("default parameters are valid"),
            |mut system| {
                system.step(black_box(&environment));
                system
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_layout_build,
    bench_pressure_solve,
    bench_oxygen_propagation,
    bench_system_step
);
criterion_main!(benches);
