//! Structural adaptation of vessel radius and wall.
//!
//! Each vessel responds to four stimuli, each a log-ratio against a
//! reference taken as the mean over root-adjacent vessels:
//! - wall shear stress (lumen widens under high shear)
//! - flow (lumen widens under high flow)
//! - metabolic demand, the oxygen gradient across the wall (lumen widens
//!   where tissue is starved)
//! - circumferential stress (wall thickens under high hoop stress)
//!
//! The update works on the mid-wall radius Rm = r + w/2 and the wall
//! cross-section A = π·w·2Rm, then backs out w = A/(2π·Rm) and
//! r = Rm − w/2.
//!
//! Reference: Pries, Secomb & Gaehtgens, Am J Physiol 1998 (structural
//! adaptation); Pries et al., Am J Physiol 2001 (wall adaptation)

use std::f64::consts::PI;

use crate::config::{HemodynamicParameters, RemodelingParameters};
use crate::graph::{EdgeId, VesselGraph};
use crate::hemodynamics::physics::{clamp_wall_um, is_viable};
use crate::state::LatticeField;

use super::{Component, ComponentReport, StepContext};

/// Stimulus references averaged over root-adjacent edges
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RemodelingReferences {
    pub shear_mmHg: f64,
    pub circumferential_stress_mmHg: f64,
    pub flow_um3_per_sec: f64,
    pub oxygen_gradient_mmHg: f64,
}

#[derive(Debug, Clone)]
pub struct RemodelingComponent {
    pub params: RemodelingParameters,
    pub hemodynamics: HemodynamicParameters,
}

/// w·ln(value/reference), or 0 when either side is not a positive number
fn log_ratio(weight: f64, value: f64, reference: f64) -> f64 {
    if value > 0.0 && reference > 0.0 && value.is_finite() && reference.is_finite() {
        weight * (value / reference).ln()
    } else {
        0.0
    }
}

/// Mean of the finite, positive values, or NaN
fn positive_mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

impl RemodelingComponent {
    pub fn new(params: RemodelingParameters, hemodynamics: HemodynamicParameters) -> Self {
        Self { params, hemodynamics }
    }

    /// Blood-to-tissue pO2 difference across an edge wall
    fn oxygen_gradient(graph: &VesselGraph, id: EdgeId, tissue_oxygen: &LatticeField) -> f64 {
        let edge = &graph[id];
        let blood = 0.5 * (edge.transport.inlet_po2_mmHg + edge.transport.outlet_po2_mmHg);
        let tissue = tissue_oxygen.mean_over(&edge.spanned_cells);
        blood - tissue
    }

    pub fn references(graph: &VesselGraph, tissue_oxygen: &LatticeField) -> RemodelingReferences {
        let root_adjacent: Vec<EdgeId> = graph
            .active_edge_ids()
            .filter(|&e| graph[graph[e].from].is_root || graph[graph[e].to].is_root)
            .collect();
        RemodelingReferences {
            shear_mmHg: positive_mean(root_adjacent.iter().map(|&e| graph[e].shear_mmHg)),
            circumferential_stress_mmHg: positive_mean(
                root_adjacent.iter().map(|&e| graph[e].circumferential_stress_mmHg),
            ),
            flow_um3_per_sec: positive_mean(root_adjacent.iter().map(|&e| graph[e].flow_um3_per_sec)),
            oxygen_gradient_mmHg: positive_mean(
                root_adjacent
                    .iter()
                    .map(|&e| Self::oxygen_gradient(graph, e, tissue_oxygen)),
            ),
        }
    }

    /// New (radius, wall) for an edge under the given references
    pub fn adapted_dimensions(
        &self,
        graph: &VesselGraph,
        id: EdgeId,
        refs: &RemodelingReferences,
        tissue_oxygen: &LatticeField,
    ) -> (f64, f64) {
        let p = &self.params;
        let edge = &graph[id];

        let lumen_stimulus = log_ratio(p.shear_weight, edge.shear_mmHg, refs.shear_mmHg)
            + log_ratio(p.flow_weight, edge.flow_um3_per_sec, refs.flow_um3_per_sec)
            + log_ratio(
                p.metabolic_weight,
                Self::oxygen_gradient(graph, id, tissue_oxygen),
                refs.oxygen_gradient_mmHg,
            );
        let wall_stimulus = log_ratio(
            p.circumferential_weight,
            edge.circumferential_stress_mmHg,
            refs.circumferential_stress_mmHg,
        );

        let mid_wall = edge.radius_um + 0.5 * edge.wall_um;
        let wall_area = PI * edge.wall_um * 2.0 * mid_wall;

        let new_mid_wall = mid_wall * (p.radius_scale * lumen_stimulus).exp();
        let new_area = wall_area * (p.wall_scale * wall_stimulus).exp();
        let wall = new_area / (2.0 * PI * new_mid_wall);
        let radius = (new_mid_wall - 0.5 * wall).min(self.hemodynamics.maximum_radius_um);
        (radius, clamp_wall_um(wall, radius))
    }
}

impl Component for RemodelingComponent {
    fn name(&self) -> &'static str {
        "remodeling"
    }

    fn interval_ticks(&self) -> u64 {
        self.params.interval_ticks
    }

    fn step(&mut self, ctx: &mut StepContext<'_, '_>) -> ComponentReport {
        let mut report = ComponentReport::default();
        let tissue_oxygen = ctx.environment.oxygen_mmHg;
        let refs = Self::references(ctx.graph, tissue_oxygen);
        if !refs.shear_mmHg.is_finite() {
            log::debug!("Remodeling skipped: no perfused root-adjacent edges");
            return report;
        }

        // Stimuli come from the state before this step
        let graph: &VesselGraph = ctx.graph;
        let updates: Vec<(EdgeId, f64, f64)> = graph
            .shuffled_active_edges(&mut *ctx.rng)
            .into_iter()
            .filter(|&e| graph[e].is_perfused)
            .map(|e| {
                let (radius, wall) = self.adapted_dimensions(graph, e, &refs, tissue_oxygen);
                (e, radius, wall)
            })
            .collect();

        let mut non_viable = Vec::new();
        for (id, radius, wall) in updates {
            let edge = &mut ctx.graph[id];
            edge.radius_um = radius;
            edge.wall_um = wall;
            report.modified_edges += 1;
            if !(radius.is_finite() && wall.is_finite() && is_viable(radius, wall)) {
                non_viable.push(id);
            }
        }

        for id in non_viable {
            if ctx.remove_edge(id) {
                report.removed_edges += 1;
            }
        }

        if report.removed_edges > 0 {
            log::debug!("Remodeling removed {} non-viable edges", report.removed_edges);
            report.maintenance = Some(ctx.maintenance.update_graph(ctx.graph));
        } else if report.modified_edges > 0 {
            ctx.maintenance.solver().solve(ctx.graph);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind};
    use glam::IVec3;

    #[test]
    fn test_log_ratio_guards() {
        assert_eq!(log_ratio(1.0, 2.0, 2.0), 0.0);
        assert!((log_ratio(0.5, std::f64::consts::E, 1.0) - 0.5).abs() < 1e-12);
        assert_eq!(log_ratio(1.0, f64::NAN, 1.0), 0.0);
        assert_eq!(log_ratio(1.0, 1.0, 0.0), 0.0);
    }

    #[test]
    fn test_reference_edge_is_unchanged() {
        // Single root-to-root edge is its own reference: every stimulus is zero
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let v = g.add_root(IVec3::new(1, 0, 0), 18.0);
        let id = g.add_edge(Edge::new(a, v, EdgeKind::Capillary, 5.0, 1.0, 30.0));
        crate::hemodynamics::PressureFlowSolver::new(HemodynamicParameters::default()).solve(&mut g);

        let field = LatticeField::uniform(1, 1, 1, 20.0);
        let component = RemodelingComponent::new(RemodelingParameters::default(), HemodynamicParameters::default());
        let refs = RemodelingComponent::references(&g, &field);
        let (radius, wall) = component.adapted_dimensions(&g, id, &refs, &field);
        assert!((radius - 5.0).abs() < 1e-9);
        assert!((wall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_shear_widens_lumen() {
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let v = g.add_root(IVec3::new(1, 0, 0), 18.0);
        let id = g.add_edge(Edge::new(a, v, EdgeKind::Capillary, 5.0, 1.0, 30.0));
        crate::hemodynamics::PressureFlowSolver::new(HemodynamicParameters::default()).solve(&mut g);

        let field = LatticeField::uniform(1, 1, 1, 20.0);
        let component = RemodelingComponent::new(RemodelingParameters::default(), HemodynamicParameters::default());
        let mut refs = RemodelingComponent::references(&g, &field);
        refs.shear_mmHg *= 0.5;
        refs.flow_um3_per_sec *= 0.5;
        let (radius, _) = component.adapted_dimensions(&g, id, &refs, &field);
        assert!(radius > 5.0);
    }
}
