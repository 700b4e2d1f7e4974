//! Wall degradation by malignant cells.
//!
//! Vessels running through a lattice cell occupied by a malignant agent
//! lose wall thickness at a fixed rate. A vessel already at the minimum
//! wall that no longer carries meaningful shear is removed.
//!
//! Reference: Welter & Rieger, PLoS ONE 2013 (tumor-induced vessel collapse)

use crate::config::DegradationParameters;
use crate::graph::EdgeId;
use crate::hemodynamics::physics::MINIMUM_WALL_THICKNESS_UM;
use crate::hemodynamics::PressureFlowSolver;

use super::{Component, ComponentReport, StepContext};

#[derive(Debug, Clone)]
pub struct DegradationComponent {
    pub params: DegradationParameters,
}

impl DegradationComponent {
    pub fn new(params: DegradationParameters) -> Self {
        Self { params }
    }
}

impl Component for DegradationComponent {
    fn name(&self) -> &'static str {
        "degradation"
    }

    fn interval_ticks(&self) -> u64 {
        self.params.interval_ticks
    }

    fn step(&mut self, ctx: &mut StepContext<'_, '_>) -> ComponentReport {
        let mut report = ComponentReport::default();
        let was_dirty = ctx.graph.is_dirty();
        let agents = ctx.environment.agents;

        let exposed: Vec<EdgeId> = ctx
            .graph
            .active_edge_ids()
            .filter(|&e| ctx.graph[e].spanned_cells.iter().any(|&c| agents.has_malignant(c)))
            .collect();

        let mut doomed = Vec::new();
        for id in exposed {
            let edge = &mut ctx.graph[id];
            edge.wall_um = (edge.wall_um - self.params.wall_loss_um).max(MINIMUM_WALL_THICKNESS_UM);
            report.modified_edges += 1;

            let at_minimum = edge.wall_um <= MINIMUM_WALL_THICKNESS_UM;
            let weak_shear = edge.shear_mmHg.is_nan() || edge.shear_mmHg < self.params.shear_threshold_mmHg;
            if at_minimum && weak_shear {
                doomed.push(id);
            }
        }

        for id in doomed {
            if ctx.remove_edge(id) {
                report.removed_edges += 1;
            }
        }

        if report.removed_edges > 0 {
            log::debug!("Degradation removed {} edges", report.removed_edges);
            report.maintenance = Some(ctx.maintenance.update_graph(ctx.graph));
        } else if report.modified_edges > 0 {
            // Wall thickness does not enter conductance; only stresses move
            PressureFlowSolver::calculate_stresses(ctx.graph);
            if !was_dirty {
                ctx.graph.mark_clean();
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HemodynamicParameters;
    use crate::geometry::RectGeometry;
    use crate::graph::{Edge, EdgeKind, VesselGraph};
    use crate::hemodynamics::GraphMaintenance;
    use crate::state::{AgentGrid, AgentKind, LatticeCell, LatticeField, NetworkMetrics, TissueEnvironment};
    use glam::IVec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_wall_thins_but_never_below_minimum() {
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let v = g.add_root(IVec3::new(1, 0, 0), 18.0);
        let mut edge = Edge::new(a, v, EdgeKind::Capillary, 4.0, 0.8, 30.0);
        edge.spanned_cells = vec![LatticeCell::new(0, 0, 0)];
        let id = g.add_edge(edge);
        let maintenance = GraphMaintenance::new(HemodynamicParameters::default());
        maintenance.update_graph(&mut g);

        let mut agents = AgentGrid::new();
        agents.insert(LatticeCell::new(0, 0, 0), AgentKind::Malignant);
        let field = LatticeField::uniform(1, 2, 1, 0.0);
        let env = TissueEnvironment {
            oxygen_mmHg: &field,
            vegf: &field,
            agents: &agents,
        };
        let geometry = RectGeometry::new(2, 1, 1, 30.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut metrics = NetworkMetrics::default();
        let mut component = DegradationComponent::new(DegradationParameters {
            wall_loss_um: 0.2,
            shear_threshold_mmHg: 0.0,
            ..DegradationParameters::default()
        });

        let mut last = g[id].wall_um;
        for tick in 0..5 {
            let mut ctx = StepContext {
                graph: &mut g,
                geometry: &geometry,
                environment: &env,
                maintenance: &maintenance,
                rng: &mut rng,
                metrics: &mut metrics,
                tick,
            };
            let report = component.step(&mut ctx);
            assert_eq!(report.removed_edges, 0, "strong shear keeps the vessel");
            assert!(g[id].wall_um <= last);
            assert!(g[id].wall_um >= MINIMUM_WALL_THICKNESS_UM);
            last = g[id].wall_um;
        }
        assert_eq!(g[id].wall_um, MINIMUM_WALL_THICKNESS_UM);
        assert!(!g.is_dirty());
    }
}
