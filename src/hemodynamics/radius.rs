//! Vessel radius assignment.
//!
//! Two modes:
//! - Murray's-law propagation from seed edges, breadth-first, with the
//!   edge `is_visited` flag preventing loops. At each junction the radii on
//!   the known side combine as (Σ rᵏ)^(1/k) and are split over the unknown
//!   side.
//! - Flow matching: bisection for the radius whose Poiseuille flow under
//!   the current pressure drop equals a target. A result pinned at a search
//!   bound means no physical radius exists; the caller rolls back the whole
//!   batch using the recorded before/after radii.
//!
//! Reference: Murray, PNAS 1926; Sherman, J Gen Physiol 1981

use std::collections::VecDeque;

use crate::config::HemodynamicParameters;
use crate::error::{VascularError, VascularResult};
use crate::graph::{EdgeId, Strategy, VesselGraph};

use super::physics::{
    bisect, clamp_wall_um, initial_wall_thickness_um, murray_child_radius, murray_split_radius, poiseuille_flow,
    MURRAY_EXPONENT, RADIUS_SEARCH_LOWER_UM, RADIUS_SEARCH_UPPER_FACTOR,
};

/// Distance from a search bound at which a bisection result counts as pinned (μm)
const BOUND_TOLERANCE_UM: f64 = 1e-6;

/// Radius changes applied as one unit, with enough history to undo them
#[derive(Debug, Clone, Default)]
pub struct RadiusBatch {
    pub edges: Vec<EdgeId>,
    pub before_um: Vec<f64>,
    pub after_um: Vec<f64>,
    wall_before_um: Vec<f64>,
}

impl RadiusBatch {
    fn record(&mut self, edge: EdgeId, before_um: f64, after_um: f64, wall_before_um: f64) {
        self.edges.push(edge);
        self.before_um.push(before_um);
        self.after_um.push(after_um);
        self.wall_before_um.push(wall_before_um);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Restore every recorded edge to its radius and wall before the batch.
    /// Edges removed since are skipped.
    pub fn rollback(&self, graph: &mut VesselGraph) {
        for i in (0..self.edges.len()).rev() {
            if graph.get_edge(self.edges[i]).is_none() {
                continue;
            }
            let edge = &mut graph[self.edges[i]];
            edge.radius_um = self.before_um[i];
            edge.wall_um = self.wall_before_um[i];
        }
    }
}

/// Murray propagation and flow-matching radius solver
#[derive(Debug, Clone)]
pub struct RadiusAssignmentEngine {
    pub params: HemodynamicParameters,
}

impl RadiusAssignmentEngine {
    pub fn new(params: HemodynamicParameters) -> Self {
        Self { params }
    }

    fn upper_bound_um(&self) -> f64 {
        RADIUS_SEARCH_UPPER_FACTOR * self.params.maximum_radius_um
    }

    /// Propagate radii from `seeds` in the `strategy` direction.
    ///
    /// Seeds keep their radius. Each junction reached combines the radii of
    /// the edges on the seed side by Murray's law and assigns the result to
    /// the not-yet-visited edges beyond it. Returns the number of edges
    /// assigned. Resets traversal scratch first.
    pub fn propagate_murray(&self, graph: &mut VesselGraph, seeds: &[EdgeId], strategy: Strategy) -> usize {
        graph.reset_traversal();
        let mut queue: VecDeque<EdgeId> = VecDeque::new();
        for &seed in seeds {
            if graph.get_edge(seed).is_some() && !graph[seed].is_visited {
                graph[seed].is_visited = true;
                queue.push_back(seed);
            }
        }

        let mut assigned = 0;
        while let Some(current) = queue.pop_front() {
            let junction = strategy.head(&graph[current]);
            if graph[junction].is_root {
                continue;
            }

            let beyond = graph.edges_along(junction, strategy);
            let (known, unknown): (Vec<EdgeId>, Vec<EdgeId>) =
                beyond.into_iter().partition(|&e| graph[e].is_visited);
            if unknown.is_empty() {
                continue;
            }

            // Σ rᵏ on the seed side must equal Σ rᵏ beyond the junction
            let near_side = graph.edges_along(junction, strategy.reverse());
            let near_total: f64 = near_side
                .iter()
                .map(|&e| graph[e].radius_um.powf(MURRAY_EXPONENT))
                .sum();
            let known_total: f64 = known.iter().map(|&e| graph[e].radius_um.powf(MURRAY_EXPONENT)).sum();
            let combined = near_total.powf(1.0 / MURRAY_EXPONENT);
            let remaining = if known.is_empty() {
                combined
            } else {
                murray_child_radius(combined, known_total.powf(1.0 / MURRAY_EXPONENT))
            };
            if !remaining.is_finite() {
                log::debug!("Murray propagation: no radius left at junction {:?}", junction);
                continue;
            }

            let radius = murray_split_radius(remaining, unknown.len()).min(self.params.maximum_radius_um);
            for e in unknown {
                let edge = &mut graph[e];
                edge.radius_um = radius;
                edge.wall_um = initial_wall_thickness_um(radius);
                edge.is_visited = true;
                assigned += 1;
                queue.push_back(e);
            }
        }
        assigned
    }

    /// Radius whose Poiseuille flow through `length_um` under
    /// `delta_pressure_mmHg` equals `target_flow`.
    pub fn solve_radius_for_flow(&self, length_um: f64, delta_pressure_mmHg: f64, target_flow: f64) -> VascularResult<f64> {
        let lower = RADIUS_SEARCH_LOWER_UM;
        let upper = self.upper_bound_um();
        let failure = VascularError::RootNotBracketed {
            lower_um: lower,
            upper_um: upper,
            target_flow,
        };
        if !(target_flow.is_finite() && target_flow > 0.0 && delta_pressure_mmHg > 0.0 && length_um > 0.0) {
            return Err(failure);
        }

        let mu = self.params.plasma_viscosity_mmHg_s;
        let radius = bisect(
            |r| poiseuille_flow(r, length_um, delta_pressure_mmHg, mu) - target_flow,
            lower,
            upper,
            1e-10,
            200,
        );
        if radius - lower < BOUND_TOLERANCE_UM || upper - radius < BOUND_TOLERANCE_UM {
            return Err(failure);
        }
        Ok(radius)
    }

    /// Change the flow through every edge of `path` by `delta_flow` by
    /// adjusting radii under the current pressure drops.
    ///
    /// On the first failing edge all changes already applied are rolled
    /// back and the error is returned.
    pub fn adjust_path_flow(&self, graph: &mut VesselGraph, path: &[EdgeId], delta_flow: f64) -> VascularResult<RadiusBatch> {
        let mut batch = RadiusBatch::default();
        for &id in path {
            let Some(edge) = graph.get_edge(id) else {
                batch.rollback(graph);
                return Err(VascularError::MissingEdge(id));
            };
            let dp = graph[edge.from].pressure_mmHg - graph[edge.to].pressure_mmHg;
            let target = edge.flow_um3_per_sec + delta_flow;
            let (before, wall_before, length) = (edge.radius_um, edge.wall_um, edge.length_um);

            match self.solve_radius_for_flow(length, dp, target) {
                Ok(radius) => {
                    batch.record(id, before, radius, wall_before);
                    let edge = &mut graph[id];
                    edge.radius_um = radius;
                    edge.wall_um = clamp_wall_um(edge.wall_um, radius);
                }
                Err(err) => {
                    log::debug!("Flow matching failed on {:?}: {}", id, err);
                    batch.rollback(graph);
                    return Err(err);
                }
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind};
    use crate::hemodynamics::physics::murray_parent_radius;
    use crate::hemodynamics::PressureFlowSolver;
    use glam::IVec3;

    fn engine() -> RadiusAssignmentEngine {
        RadiusAssignmentEngine::new(HemodynamicParameters::default())
    }

    #[test]
    fn test_downstream_split_into_two() {
        // a -> b, b -> c, b -> d
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let b = g.add_node(IVec3::new(1, 0, 0));
        let c = g.add_node(IVec3::new(2, 0, 0));
        let d = g.add_node(IVec3::new(2, 1, 0));
        let parent = g.add_edge(Edge::new(a, b, EdgeKind::Artery, 10.0, 2.0, 30.0));
        let left = g.add_edge(Edge::new(b, c, EdgeKind::Capillary, 4.0, 1.0, 30.0));
        let right = g.add_edge(Edge::new(b, d, EdgeKind::Capillary, 4.0, 1.0, 30.0));

        let assigned = engine().propagate_murray(&mut g, &[parent], Strategy::Downstream);
        assert_eq!(assigned, 2);
        let expected = 10.0 * 2.0_f64.powf(-1.0 / MURRAY_EXPONENT);
        assert!((g[left].radius_um - expected).abs() < 1e-9);
        assert!((g[right].radius_um - expected).abs() < 1e-9);
        assert!((murray_parent_radius(g[left].radius_um, g[right].radius_um) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_known_sibling_gets_remainder() {
        // a -> b, b -> c (seeded), b -> d (unknown): upstream then downstream
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let b = g.add_node(IVec3::new(1, 0, 0));
        let c = g.add_node(IVec3::new(2, 0, 0));
        let d = g.add_node(IVec3::new(2, 1, 0));
        let parent = g.add_edge(Edge::new(a, b, EdgeKind::Artery, 8.0, 2.0, 30.0));
        let known = g.add_edge(Edge::new(b, c, EdgeKind::Capillary, 5.0, 1.0, 30.0));
        let unknown = g.add_edge(Edge::new(b, d, EdgeKind::Capillary, 4.0, 1.0, 30.0));

        engine().propagate_murray(&mut g, &[parent, known], Strategy::Downstream);
        let expected = murray_child_radius(8.0, 5.0);
        assert!((g[unknown].radius_um - expected).abs() < 1e-9);
    }

    #[test]
    fn test_solve_radius_round_trip() {
        let engine = engine();
        let mu = engine.params.plasma_viscosity_mmHg_s;
        let flow = poiseuille_flow(6.0, 40.0, 3.0, mu);
        let radius = engine.solve_radius_for_flow(40.0, 3.0, flow).unwrap();
        assert!((radius - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_solve_radius_rejects_unreachable_flow() {
        let engine = engine();
        let err = engine.solve_radius_for_flow(40.0, 3.0, 1e30).unwrap_err();
        assert!(matches!(err, VascularError::RootNotBracketed { .. }));
        assert!(engine.solve_radius_for_flow(40.0, 3.0, -5.0).is_err());
        assert!(engine.solve_radius_for_flow(40.0, 0.0, 5.0).is_err());
    }

    #[test]
    fn test_adjust_path_flow_rolls_back() {
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let b = g.add_node(IVec3::new(1, 0, 0));
        let c = g.add_root(IVec3::new(2, 0, 0), 18.0);
        let first = g.add_edge(Edge::new(a, b, EdgeKind::Capillary, 4.0, 1.0, 30.0));
        let second = g.add_edge(Edge::new(b, c, EdgeKind::Capillary, 4.0, 1.0, 30.0));
        PressureFlowSolver::new(HemodynamicParameters::default()).solve(&mut g);

        let engine = engine();
        let extra = 0.1 * g[first].flow_um3_per_sec;
        let batch = engine.adjust_path_flow(&mut g, &[first, second], extra).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(g[first].radius_um > 4.0);
        batch.rollback(&mut g);
        assert_eq!(g[first].radius_um, 4.0);
        assert_eq!(g[second].radius_um, 4.0);

        // Removing more flow than the edge carries fails and leaves radii intact
        let drain = -2.0 * g[first].flow_um3_per_sec;
        assert!(engine.adjust_path_flow(&mut g, &[first, second], drain).is_err());
        assert_eq!(g[first].radius_um, 4.0);
        assert_eq!(g[second].radius_um, 4.0);

        // A failure after a successful edge undoes the earlier change
        let err = engine.adjust_path_flow(&mut g, &[first, EdgeId(99)], extra).unwrap_err();
        assert_eq!(err, VascularError::MissingEdge(EdgeId(99)));
        assert_eq!(g[first].radius_um, 4.0);
    }
}
