//! Top-level orchestration of the vascular network.
//!
//! One [`VascularSystem::step`] runs every due structural component in a
//! fixed order (degradation, remodeling, angiogenesis) and then refreshes
//! oxygen transport so the tissue coupling sees the final topology.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::components::{
    AngiogenesisComponent, Component, ComponentReport, DegradationComponent, RemodelingComponent, StepContext,
};
use crate::config::Parameters;
use crate::error::VascularResult;
use crate::geometry::{adapter_for, build_network, GeometryAdapter};
use crate::graph::{NodeId, VesselGraph};
use crate::hemodynamics::{GraphMaintenance, OxygenTransport, TransportDiagnostics};
use crate::state::{LatticeCell, NetworkMetrics, TissueEnvironment};

/// What one call to [`VascularSystem::step`] did
#[derive(Debug, Clone, Default)]
pub struct StepDiagnostics {
    pub tick: u64,
    /// Components that ran, with their reports
    pub components: Vec<(&'static str, ComponentReport)>,
    pub transport: TransportDiagnostics,
}

impl StepDiagnostics {
    pub fn added_edges(&self) -> usize {
        self.components.iter().map(|(_, r)| r.added_edges).sum()
    }

    pub fn removed_edges(&self) -> usize {
        self.components.iter().map(|(_, r)| r.removed_edges).sum::<usize>() + self.transport.removed_edges
    }
}

/// Vessel network plus the processes acting on it
pub struct VascularSystem {
    graph: VesselGraph,
    geometry: Box<dyn GeometryAdapter>,
    params: Parameters,
    maintenance: GraphMaintenance,
    transport: OxygenTransport,
    degradation: DegradationComponent,
    remodeling: RemodelingComponent,
    angiogenesis: AngiogenesisComponent,
    rng: StdRng,
    tick: u64,
    arterial_roots: Vec<NodeId>,
    venous_roots: Vec<NodeId>,
    // Only the running counters of this are kept; graph fields are re-read
    counters: NetworkMetrics,
}

impl VascularSystem {
    /// Validate parameters and build the initial network
    pub fn new(params: Parameters) -> VascularResult<Self> {
        params.validate()?;
        let geometry = adapter_for(&params.layout);
        let layout = build_network(geometry.as_ref(), &params);
        let mut system = Self::from_graph(layout.graph, geometry, params);
        system.arterial_roots = layout.arterial_roots;
        system.venous_roots = layout.venous_roots;
        Ok(system)
    }

    /// Wrap an existing graph. Parameters are taken as already validated.
    pub fn from_graph(mut graph: VesselGraph, geometry: Box<dyn GeometryAdapter>, params: Parameters) -> Self {
        let maintenance = GraphMaintenance::new(params.hemodynamics.clone());
        maintenance.update_graph(&mut graph);

        let arterial_roots = graph
            .root_ids()
            .into_iter()
            .filter(|&n| graph.in_degree(n) == 0 && graph.out_degree(n) > 0)
            .collect();
        let venous_roots = graph
            .root_ids()
            .into_iter()
            .filter(|&n| graph.out_degree(n) == 0 && graph.in_degree(n) > 0)
            .collect();

        Self {
            graph,
            geometry,
            maintenance,
            transport: OxygenTransport::new(params.transport.clone()),
            degradation: DegradationComponent::new(params.degradation.clone()),
            remodeling: RemodelingComponent::new(params.remodeling.clone(), params.hemodynamics.clone()),
            angiogenesis: AngiogenesisComponent::new(params.angiogenesis.clone(), params.hemodynamics.clone()),
            rng: StdRng::seed_from_u64(params.seed),
            tick: 0,
            arterial_roots,
            venous_roots,
            counters: NetworkMetrics::default(),
            params,
        }
    }

    pub fn graph(&self) -> &VesselGraph {
        &self.graph
    }

    pub fn geometry(&self) -> &dyn GeometryAdapter {
        self.geometry.as_ref()
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn arterial_roots(&self) -> &[NodeId] {
        &self.arterial_roots
    }

    pub fn venous_roots(&self) -> &[NodeId] {
        &self.venous_roots
    }

    pub fn pending_sprouts(&self) -> usize {
        self.angiogenesis.pending().len()
    }

    /// Current snapshot: graph-derived values plus running counters
    pub fn metrics(&self) -> NetworkMetrics {
        let mut metrics = NetworkMetrics::from_graph(&self.graph, self.tick);
        metrics.pending_sprouts = self.pending_sprouts();
        metrics.removed_edges = self.counters.removed_edges;
        metrics.anastomoses = self.counters.anastomoses;
        metrics.skips = self.counters.skips;
        metrics
    }

    /// Per-cell oxygen delivered by the vessels (mM/s)
    pub fn concentration_deltas(&self) -> BTreeMap<LatticeCell, f64> {
        self.transport.concentration_deltas(&self.graph)
    }

    /// Advance one tick
    pub fn step(&mut self, environment: &TissueEnvironment<'_>) -> StepDiagnostics {
        let tick = self.tick;
        let mut diagnostics = StepDiagnostics {
            tick,
            ..Default::default()
        };

        // Anything changed from outside since the last step
        self.maintenance.update_graph(&mut self.graph);

        let components: [&mut dyn Component; 3] =
            [&mut self.degradation, &mut self.remodeling, &mut self.angiogenesis];
        for component in components {
            if !component.is_due(tick) {
                continue;
            }
            let mut ctx = StepContext {
                graph: &mut self.graph,
                geometry: self.geometry.as_ref(),
                environment,
                maintenance: &self.maintenance,
                rng: &mut self.rng,
                metrics: &mut self.counters,
                tick,
            };
            let report = component.step(&mut ctx);
            log::debug!(
                "tick {} {}: +{} -{} ~{}",
                tick,
                component.name(),
                report.added_edges,
                report.removed_edges,
                report.modified_edges
            );
            diagnostics.components.push((component.name(), report));
        }

        let transport = self
            .transport
            .propagate(&mut self.graph, environment.oxygen_mmHg, &self.maintenance);
        self.counters.skips.transport_removals += transport.removed_edges as u64;
        self.counters.removed_edges += transport.removed_edges as u64;
        if transport.unresolved_nodes > 0 {
            log::debug!("tick {}: {} nodes without oxygen", tick, transport.unresolved_nodes);
        }
        diagnostics.transport = transport;

        self.tick += 1;
        diagnostics
    }

    /// Advance `steps` ticks in a constant environment
    pub fn run(&mut self, environment: &TissueEnvironment<'_>, steps: usize) -> Vec<StepDiagnostics> {
        (0..steps).map(|_| self.step(environment)).collect()
    }
}
