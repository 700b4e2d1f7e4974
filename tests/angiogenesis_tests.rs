//! Validation tests for sprouting angiogenesis
//!
//! Key validation targets:
//! - The directed network stays acyclic through growth
//! - Flow still runs downhill after anastomoses are rebalanced
//! - Growth is reproducible for a fixed seed

use std::collections::VecDeque;

use vessel_simulator_x::config::{DirectionPolicy, LayoutKind, Parameters};
use vessel_simulator_x::state::{AgentGrid, LatticeField, TissueEnvironment};
use vessel_simulator_x::{VascularSystem, VesselGraph};

fn growth_params(seed: u64) -> Parameters {
    let mut params = Parameters::default();
    params.seed = seed;
    params.layout.kind = LayoutKind::Roots;
    params.layout.width = 16;
    params.layout.length = 12;
    params.angiogenesis.maturation_delay_ticks = 0;
    params.angiogenesis.migration_rate_um_per_tick = 30.0;
    params.angiogenesis.direction_policy = DirectionPolicy::Biased;
    params
}

struct Tissue {
    oxygen: LatticeField,
    vegf: LatticeField,
    agents: AgentGrid,
}

impl Tissue {
    /// VEGF rising toward the middle of the domain, well above threshold
    fn new(params: &Parameters) -> Self {
        let l = &params.layout;
        let cy = l.length as f64 / 2.0;
        Self {
            oxygen: LatticeField::uniform(l.depth, l.width, l.length, 15.0),
            vegf: LatticeField::from_fn(l.depth, l.width, l.length, |_, _, y| 2.0 + 3.0 / (1.0 + (y as f64 - cy).abs())),
            agents: AgentGrid::new(),
        }
    }

    fn environment(&self) -> TissueEnvironment<'_> {
        TissueEnvironment {
            oxygen_mmHg: &self.oxygen,
            vegf: &self.vegf,
            agents: &self.agents,
        }
    }
}

/// Kahn's algorithm over active edges
fn is_acyclic(g: &VesselGraph) -> bool {
    let nodes: Vec<_> = g.node_ids().collect();
    let mut in_degree: Vec<usize> = vec![0; nodes.iter().map(|n| n.index() + 1).max().unwrap_or(0)];
    for &n in &nodes {
        in_degree[n.index()] = g.in_degree(n);
    }
    let mut queue: VecDeque<_> = nodes.iter().copied().filter(|&n| in_degree[n.index()] == 0).collect();
    let mut visited = 0;
    while let Some(n) = queue.pop_front() {
        visited += 1;
        for e in g.out_edges(n) {
            let to = g[e].to;
            in_degree[to.index()] -= 1;
            if in_degree[to.index()] == 0 {
                queue.push_back(to);
            }
        }
    }
    visited == nodes.len()
}

// ============================================================================
// Topology Tests
// ============================================================================

#[test]
fn test_sprouts_start_under_vegf() {
    let params = growth_params(1);
    let tissue = Tissue::new(&params);
    let mut system = VascularSystem::new(params).expect("valid parameters");
    system.step(&tissue.environment());
    assert!(system.pending_sprouts() > 0, "no sprout triggered above threshold");
}

#[test]
fn test_growth_stays_acyclic() {
    let params = growth_params(7);
    let tissue = Tissue::new(&params);
    let env = tissue.environment();
    let mut system = VascularSystem::new(params).expect("valid parameters");
    let initial_edges = system.graph().edge_count();

    for tick in 0..40 {
        system.step(&env);
        assert!(is_acyclic(system.graph()), "cycle after tick {}", tick);
    }

    let g = system.graph();
    let metrics = system.metrics();
    assert!(
        metrics.anastomoses > 0,
        "40 ticks of growth connected nothing: {} edges before, {} after, skips {:?}",
        initial_edges,
        g.edge_count(),
        metrics.skips
    );
}

#[test]
fn test_flow_downhill_after_growth() {
    let params = growth_params(5);
    let tissue = Tissue::new(&params);
    let env = tissue.environment();
    let mut system = VascularSystem::new(params).expect("valid parameters");
    system.run(&env, 30);

    let g = system.graph();
    assert!(!g.is_dirty());
    for e in g.active_edge_ids() {
        let edge = &g[e];
        if edge.is_perfused {
            assert!(edge.flow_um3_per_sec >= 0.0, "negative flow on {:?}", e);
            assert!(
                g[edge.from].pressure_mmHg >= g[edge.to].pressure_mmHg - 1e-6,
                "edge {:?} runs uphill",
                e
            );
        }
    }
}

// ============================================================================
// Reproducibility Tests
// ============================================================================

fn fingerprint(system: &VascularSystem) -> (usize, usize, u64, usize, Vec<(u32, u32, u64)>) {
    let g = system.graph();
    let m = system.metrics();
    let edges = g
        .active_edge_ids()
        .map(|e| (g[e].from.0, g[e].to.0, g[e].radius_um.to_bits()))
        .collect();
    (m.node_count, m.active_edge_count, m.anastomoses, m.pending_sprouts, edges)
}

#[test]
fn test_same_seed_same_network() {
    let run = |seed: u64| {
        let params = growth_params(seed);
        let tissue = Tissue::new(&params);
        let mut system = VascularSystem::new(params).expect("valid parameters");
        system.run(&tissue.environment(), 25);
        fingerprint(&system)
    };
    assert_eq!(run(42), run(42));
}
