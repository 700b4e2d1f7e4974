//! Sprouting angiogenesis with anastomosis.
//!
//! Sprouts live outside the graph as pending coordinate paths until they
//! connect. Each step:
//!
//! 1. Pending sprouts migrate along their direction. A sprout is discarded
//!    when it leaves the lattice, grows too long, or runs into a node that
//!    already has three vessels. Running into any other node, or into
//!    another sprout, is an anastomosis.
//! 2. Anastomoses are oriented from high to low pressure and committed as
//!    angiogenic edges, unless an endpoint has no usable pressure or no free
//!    vessel slot, the chain crosses vessels committed in the meantime, or
//!    the new vessel would close a directed cycle. Pending sprouts running
//!    over a committed chain are discarded.
//! 3. The flow drawn by each new vessel is rebalanced: taken from a sibling
//!    at the upstream junction when one can spare it, otherwise supplied by
//!    widening the paths to the nearest arterial and venous roots.
//! 4. Mature nodes with fewer than three vessels sample VEGF along their
//!    free directions and may start a new sprout.
//!
//! Reference: Owen et al., Cancer Res 2009; Perfahl et al., PLoS ONE 2011

use std::collections::{BTreeMap, HashSet};

use glam::IVec3;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::{AngiogenesisParameters, DirectionPolicy, HemodynamicParameters};
use crate::error::{VascularError, VascularResult};
use crate::geometry::{add_segment, GeometryAdapter};
use crate::graph::{EdgeId, EdgeKind, NodeId, Strategy, VesselGraph};
use crate::hemodynamics::RadiusAssignmentEngine;
use crate::state::LatticeField;

use super::{Component, ComponentReport, StepContext};

/// Vessels a node may carry before it stops sprouting or accepting sprouts
const MAX_NODE_DEGREE: usize = 3;

/// A growing sprout not yet part of the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Sprout {
    pub origin: NodeId,
    /// Direction index into the geometry's direction table
    pub direction: usize,
    /// Lattice coordinates beyond the origin, tip last
    pub path: Vec<IVec3>,
    pub length_um: f64,
    /// Migration not yet turned into a lattice step (μm)
    pub progress_um: f64,
    pub started_tick: u64,
}

impl Sprout {
    fn tip(&self, origin_coord: IVec3) -> IVec3 {
        self.path.last().copied().unwrap_or(origin_coord)
    }
}

/// A sprout that reached the network
#[derive(Debug, Clone)]
struct Join {
    start: NodeId,
    end: NodeId,
    /// Coordinates from `start` to `end`, both included
    chain: Vec<IVec3>,
}

/// Outcome of moving one sprout
enum Extension {
    Growing(Sprout),
    Rejected,
    Joined(Join),
}

#[derive(Debug, Clone)]
pub struct AngiogenesisComponent {
    pub params: AngiogenesisParameters,
    engine: RadiusAssignmentEngine,
    pending: BTreeMap<NodeId, Sprout>,
}

impl AngiogenesisComponent {
    pub fn new(params: AngiogenesisParameters, hemodynamics: HemodynamicParameters) -> Self {
        Self {
            params,
            engine: RadiusAssignmentEngine::new(hemodynamics),
            pending: BTreeMap::new(),
        }
    }

    /// Sprouts growing but not yet connected, keyed by origin node
    pub fn pending(&self) -> &BTreeMap<NodeId, Sprout> {
        &self.pending
    }

    // === Trigger ===

    /// Mean VEGF over the first `sample_depth` lattice steps along a direction
    fn sample_direction(&self, geometry: &dyn GeometryAdapter, vegf: &LatticeField, coord: IVec3, direction: usize) -> f64 {
        let mut cells = Vec::with_capacity(self.params.sample_depth);
        let mut probe = coord;
        for _ in 0..self.params.sample_depth.max(1) {
            probe = geometry.apply_offset(probe, direction);
            match geometry.lattice_cell(probe) {
                Some(cell) => cells.push(cell),
                None => break,
            }
        }
        vegf.mean_over(&cells)
    }

    /// Direction indices already taken by a vessel at `node`
    fn occupied_directions(graph: &VesselGraph, geometry: &dyn GeometryAdapter, node: NodeId) -> Vec<usize> {
        let coord = graph[node].coord;
        graph
            .incident_edges(node)
            .into_iter()
            .filter_map(|e| geometry.direction_between(coord, graph[graph[e].other(node)].coord))
            .collect()
    }

    fn choose_direction(&self, samples: &[(usize, f64)], rng: &mut StdRng) -> Option<usize> {
        match self.params.direction_policy {
            DirectionPolicy::Random => samples.choose(rng).map(|s| s.0),
            DirectionPolicy::Biased => {
                let weights: Vec<f64> = samples.iter().map(|s| s.1.max(0.0)).collect();
                match WeightedIndex::new(&weights) {
                    Ok(dist) => Some(samples[dist.sample(rng)].0),
                    Err(_) => samples.choose(rng).map(|s| s.0),
                }
            }
            // Highest concentration, lowest index on ties
            DirectionPolicy::Deterministic => samples.iter().min_by(|a, b| b.1.total_cmp(&a.1)).map(|s| s.0),
        }
    }

    /// Start sprouts at mature nodes facing enough VEGF. Returns the number started.
    fn trigger_sprouts(&mut self, ctx: &mut StepContext<'_, '_>) -> usize {
        let vegf = ctx.environment.vegf;
        let graph: &VesselGraph = ctx.graph;
        let mut candidates: Vec<NodeId> = graph
            .node_ids()
            .filter(|&n| {
                let node = &graph[n];
                let degree = graph.degree(n);
                !node.is_root
                    && !self.pending.contains_key(&n)
                    && degree > 0
                    && degree < MAX_NODE_DEGREE
                    && node.has_defined_pressure()
                    && ctx.tick.saturating_sub(node.add_tick) >= self.params.maturation_delay_ticks
            })
            .collect();
        candidates.shuffle(&mut *ctx.rng);

        let mut started = 0;
        for node in candidates {
            let coord = ctx.graph[node].coord;
            let occupied = Self::occupied_directions(ctx.graph, ctx.geometry, node);
            let samples: Vec<(usize, f64)> = (0..ctx.geometry.directions().len())
                .filter(|d| !occupied.contains(d))
                .filter(|&d| ctx.geometry.in_bounds(ctx.geometry.apply_offset(coord, d)))
                .map(|d| (d, self.sample_direction(ctx.geometry, vegf, coord, d)))
                .filter(|s| s.1.is_finite())
                .collect();
            if samples.is_empty() {
                continue;
            }
            let mean = samples.iter().map(|s| s.1).sum::<f64>() / samples.len() as f64;
            if mean <= self.params.vegf_threshold {
                continue;
            }
            let Some(direction) = self.choose_direction(&samples, ctx.rng) else {
                continue;
            };

            self.pending.insert(
                node,
                Sprout {
                    origin: node,
                    direction,
                    path: Vec::new(),
                    length_um: 0.0,
                    progress_um: 0.0,
                    started_tick: ctx.tick,
                },
            );
            if let Some(n) = ctx.graph.node_untracked(node) {
                n.sprout_direction = Some(direction);
            }
            started += 1;
        }
        if started > 0 {
            log::debug!("Tick {}: started {} sprouts", ctx.tick, started);
        }
        started
    }

    // === Migration ===

    /// Move one sprout as far as its accumulated migration allows
    fn extend(&mut self, ctx: &mut StepContext<'_, '_>, mut sprout: Sprout) -> Extension {
        let graph: &VesselGraph = ctx.graph;
        let geometry = ctx.geometry;
        let origin_coord = graph[sprout.origin].coord;
        sprout.progress_um += self.params.migration_rate_um_per_tick * self.params.interval_ticks.max(1) as f64;

        loop {
            let tip = sprout.tip(origin_coord);
            let next = geometry.apply_offset(tip, sprout.direction);
            let step = geometry.length_um(tip, next);
            if sprout.progress_um < step {
                return Extension::Growing(sprout);
            }
            if !geometry.in_bounds(next) {
                let err = VascularError::OutOfBounds {
                    x: next.x,
                    y: next.y,
                    z: next.z,
                };
                log::debug!("Sprout from {:?} abandoned: {}", sprout.origin, err);
                ctx.metrics.skips.rejected_bounds += 1;
                return Extension::Rejected;
            }
            if sprout.length_um + step > self.params.max_sprout_length_um {
                ctx.metrics.skips.rejected_length += 1;
                return Extension::Rejected;
            }

            let mut chain = Vec::with_capacity(sprout.path.len() + 2);
            chain.push(origin_coord);
            chain.extend(sprout.path.iter().copied());
            chain.push(next);

            let hit = graph
                .find_node(next)
                .filter(|&n| graph[n].is_root || graph.degree(n) > 0);
            if let Some(target) = hit {
                if graph.degree(target) >= MAX_NODE_DEGREE {
                    ctx.metrics.skips.rejected_degree += 1;
                    return Extension::Rejected;
                }
                return Extension::Joined(Join {
                    start: sprout.origin,
                    end: target,
                    chain,
                });
            }

            let crossing = self
                .pending
                .iter()
                .find_map(|(&key, other)| other.path.iter().position(|&c| c == next).map(|i| (key, i)));
            if let Some((key, index)) = crossing {
                if let Some(other) = self.pending.remove(&key) {
                    chain.extend(other.path[..index].iter().rev().copied());
                    chain.push(graph[other.origin].coord);
                    return Extension::Joined(Join {
                        start: sprout.origin,
                        end: other.origin,
                        chain,
                    });
                }
            }

            sprout.path.push(next);
            sprout.length_um += step;
            sprout.progress_um -= step;
        }
    }

    // === Anastomosis ===

    /// Commit a join as angiogenic edges running from high to low pressure
    fn anastomose(&self, ctx: &mut StepContext<'_, '_>, join: Join) -> VascularResult<Vec<EdgeId>> {
        let Join {
            mut start,
            mut end,
            mut chain,
        } = join;
        if start == end {
            return Err(VascularError::CycleDetected { from: start, to: end });
        }
        // Earlier commits may have filled the endpoints or built on the chain
        for node in [start, end] {
            if ctx.graph.degree(node) >= MAX_NODE_DEGREE {
                return Err(VascularError::NodeSaturated(node));
            }
        }
        for &coord in chain.iter().skip(1).take(chain.len().saturating_sub(2)) {
            if let Some(node) = ctx.graph.find_node(coord) {
                if ctx.graph[node].is_root || ctx.graph.degree(node) > 0 {
                    return Err(VascularError::ChainOccupied(node));
                }
            }
        }
        for node in [start, end] {
            if !ctx.graph[node].has_defined_pressure() {
                return Err(VascularError::UndefinedPressure(node));
            }
        }
        if ctx.graph[start].pressure_mmHg < ctx.graph[end].pressure_mmHg {
            std::mem::swap(&mut start, &mut end);
            chain.reverse();
        }
        if ctx.graph.path_exists(end, start) {
            return Err(VascularError::CycleDetected { from: start, to: end });
        }

        let mut edges = Vec::with_capacity(chain.len().saturating_sub(1));
        for pair in chain.windows(2) {
            let fresh = ctx.graph.find_node(pair[1]).is_none();
            let id = add_segment(
                ctx.graph,
                ctx.geometry,
                pair[0],
                pair[1],
                EdgeKind::Angiogenic,
                self.params.sprout_radius_um,
            );
            let to = ctx.graph[id].to;
            let node = &mut ctx.graph[to];
            if fresh {
                node.add_tick = ctx.tick;
            }
            node.last_update_tick = ctx.tick;
            edges.push(id);
        }

        if let Some(&last) = edges.last() {
            ctx.graph[last].is_anastomotic = true;
        }
        for node in [start, end] {
            let node = &mut ctx.graph[node];
            node.sprout_direction = None;
            node.last_update_tick = ctx.tick;
        }
        ctx.graph[end].anastomosis = true;
        Ok(edges)
    }

    /// Commit joins in order, counting each rejection by cause. Returns the
    /// edges of every committed join.
    fn commit_joins(
        &mut self,
        ctx: &mut StepContext<'_, '_>,
        joins: Vec<Join>,
        report: &mut ComponentReport,
    ) -> Vec<Vec<EdgeId>> {
        let mut committed: Vec<Vec<EdgeId>> = Vec::new();
        for join in joins {
            let (start, end) = (join.start, join.end);
            match self.anastomose(ctx, join) {
                Ok(edges) => {
                    report.added_edges += edges.len();
                    ctx.metrics.anastomoses += 1;
                    self.drop_crossed_sprouts(ctx.graph, &edges);
                    committed.push(edges);
                }
                Err(err) => {
                    let skips = &mut ctx.metrics.skips;
                    match err {
                        VascularError::CycleDetected { .. } => skips.rejected_cycles += 1,
                        VascularError::ChainOccupied(_) => skips.rejected_overlap += 1,
                        VascularError::NodeSaturated(_) => skips.rejected_degree += 1,
                        _ => skips.rejected_pressure += 1,
                    }
                    log::debug!("Anastomosis {:?} -> {:?} rejected: {}", start, end, err);
                    if let Some(n) = ctx.graph.node_untracked(start) {
                        n.sprout_direction = None;
                    }
                }
            }
        }
        committed
    }

    /// Discard pending sprouts whose path runs over newly committed vessels
    fn drop_crossed_sprouts(&mut self, graph: &mut VesselGraph, edges: &[EdgeId]) {
        let taken: HashSet<IVec3> = edges
            .iter()
            .flat_map(|&e| [graph[graph[e].from].coord, graph[graph[e].to].coord])
            .collect();
        let crossed: Vec<NodeId> = self
            .pending
            .iter()
            .filter(|(_, sprout)| sprout.path.iter().any(|c| taken.contains(c)))
            .map(|(&origin, _)| origin)
            .collect();
        for origin in crossed {
            self.pending.remove(&origin);
            if let Some(n) = graph.node_untracked(origin) {
                n.sprout_direction = None;
            }
        }
    }

    // === Rebalancing ===

    /// Hop-shortest path from `start` to any root reachable in `strategy`
    /// direction
    fn nearest_root_path(graph: &mut VesselGraph, start: NodeId, strategy: Strategy) -> Option<Vec<EdgeId>> {
        let roots: Vec<NodeId> = graph
            .root_ids()
            .into_iter()
            .filter(|&r| match strategy {
                Strategy::Upstream => graph.in_degree(r) == 0 && graph.out_degree(r) > 0,
                Strategy::Downstream => graph.out_degree(r) == 0 && graph.in_degree(r) > 0,
            })
            .collect();
        let mut best: Option<Vec<EdgeId>> = None;
        for root in roots {
            if let Some(path) = graph.shortest_path(start, root, strategy) {
                if best.as_ref().map_or(true, |b| path.len() < b.len()) {
                    best = Some(path);
                }
            }
        }
        best
    }

    /// Supply the flow a new vessel draws at its upstream junction
    fn rebalance(&self, ctx: &mut StepContext<'_, '_>, new_edges: &[EdgeId]) {
        let (Some(&first), Some(&last)) = (new_edges.first(), new_edges.last()) else {
            return;
        };
        if ctx.graph.get_edge(first).is_none() || ctx.graph.get_edge(last).is_none() {
            return;
        }
        let (junction, outlet) = (ctx.graph[first].from, ctx.graph[last].to);
        let delta = ctx.graph[first].flow_um3_per_sec;
        if !(delta.is_finite() && delta > 0.0) {
            return;
        }

        let sibling = ctx
            .graph
            .out_edges(junction)
            .into_iter()
            .filter(|&e| e != first && ctx.graph[e].flow_um3_per_sec > delta)
            .max_by(|&a, &b| ctx.graph[a].flow_um3_per_sec.total_cmp(&ctx.graph[b].flow_um3_per_sec));
        if let Some(sibling) = sibling {
            if self.engine.adjust_path_flow(ctx.graph, &[sibling], -delta).is_ok() {
                ctx.metrics.skips.sibling_diversions += 1;
                return;
            }
        }

        let arterial = Self::nearest_root_path(ctx.graph, junction, Strategy::Upstream);
        let venous = Self::nearest_root_path(ctx.graph, outlet, Strategy::Downstream);
        let (arterial, venous) = match (arterial, venous) {
            (Some(a), Some(v)) => (a, v),
            (a, v) => {
                if a.is_none() {
                    ctx.metrics.skips.no_arterial_root += 1;
                    log::warn!("{}", VascularError::NoArterialRoot(junction));
                }
                if v.is_none() {
                    ctx.metrics.skips.no_venous_root += 1;
                    log::warn!("{}", VascularError::NoVenousRoot(outlet));
                }
                return;
            }
        };

        for path in [arterial, venous] {
            if let Err(err) = self.engine.adjust_path_flow(ctx.graph, &path, delta) {
                ctx.metrics.skips.rebalance_rollbacks += 1;
                log::debug!("Rebalancing rolled back {} edges: {}", path.len(), err);
            }
        }
    }
}

impl Component for AngiogenesisComponent {
    fn name(&self) -> &'static str {
        "angiogenesis"
    }

    fn interval_ticks(&self) -> u64 {
        self.params.interval_ticks
    }

    fn step(&mut self, ctx: &mut StepContext<'_, '_>) -> ComponentReport {
        let mut report = ComponentReport::default();

        // Sprouts whose origin vanished or lost all its vessels
        let graph: &VesselGraph = ctx.graph;
        self.pending
            .retain(|&origin, _| graph.get_node(origin).is_some_and(|n| n.is_root || graph.degree(origin) > 0));

        let mut joins = Vec::new();
        let keys: Vec<NodeId> = self.pending.keys().copied().collect();
        for key in keys {
            let Some(sprout) = self.pending.remove(&key) else {
                continue;
            };
            match self.extend(ctx, sprout) {
                Extension::Growing(sprout) => {
                    self.pending.insert(key, sprout);
                }
                Extension::Rejected => {
                    if let Some(n) = ctx.graph.node_untracked(key) {
                        n.sprout_direction = None;
                    }
                }
                Extension::Joined(join) => joins.push(join),
            }
        }

        let committed = self.commit_joins(ctx, joins, &mut report);
        if !committed.is_empty() {
            ctx.maintenance.update_graph(ctx.graph);
            for edges in &committed {
                self.rebalance(ctx, edges);
            }
            report.maintenance = Some(ctx.maintenance.update_graph(ctx.graph));
            log::info!(
                "Tick {}: {} anastomoses added {} edges",
                ctx.tick,
                committed.len(),
                report.added_edges
            );
        }

        self.trigger_sprouts(ctx);
        report
    }
}
