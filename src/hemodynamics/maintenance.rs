//! Topology maintenance: leaf pruning, disconnection handling, re-solve.
//!
//! Blood can only pass through a vessel that has somewhere to come from and
//! somewhere to go. Leaf pruning ignores edges ending in a non-root node
//! without outflow or starting at a non-root node without inflow, repeated
//! to a fixed point so dead-end chains collapse back to the nearest branch
//! point. The solve then reveals segments cut off from every root (NaN
//! pressure); those are ignored too and the loop repeats until stable.

use crate::config::HemodynamicParameters;
use crate::graph::{EdgeId, VesselGraph};

use super::pressure::{PressureFlowSolver, SolveDiagnostics};

/// Result of one maintenance pass
#[derive(Debug, Clone, Default)]
pub struct MaintenanceDiagnostics {
    /// Graph was clean, nothing done
    pub skipped: bool,
    /// Prune → solve rounds run
    pub rounds: usize,
    /// Edges ignored as leaves
    pub pruned_edges: usize,
    /// Edges ignored for lack of a defined pressure
    pub disconnected_edges: usize,
    /// Last hemodynamic solve
    pub solve: Option<SolveDiagnostics>,
}

impl MaintenanceDiagnostics {
    pub fn changed_topology(&self) -> bool {
        self.pruned_edges + self.disconnected_edges > 0
    }
}

/// Fixed-point pruning followed by a hemodynamic solve
#[derive(Debug, Clone)]
pub struct GraphMaintenance {
    solver: PressureFlowSolver,
    max_rounds: usize,
}

impl GraphMaintenance {
    pub fn new(params: HemodynamicParameters) -> Self {
        let max_rounds = params.max_maintenance_rounds.max(1);
        Self {
            solver: PressureFlowSolver::new(params),
            max_rounds,
        }
    }

    pub fn solver(&self) -> &PressureFlowSolver {
        &self.solver
    }

    /// Ignore leaf edges until none remain. Returns the number ignored.
    pub fn prune_leaves(graph: &mut VesselGraph) -> usize {
        let mut total = 0;
        loop {
            let leaves: Vec<EdgeId> = graph
                .active_edge_ids()
                .filter(|&e| {
                    let edge = &graph[e];
                    let dead_end = !graph[edge.to].is_root && graph.out_degree(edge.to) == 0;
                    let dry_start = !graph[edge.from].is_root && graph.in_degree(edge.from) == 0;
                    dead_end || dry_start
                })
                .collect();
            if leaves.is_empty() {
                break;
            }
            for &e in &leaves {
                graph[e].is_ignored = true;
                graph.invalidate_endpoints(e);
            }
            total += leaves.len();
        }
        total
    }

    /// Ignore active edges touching a node without a finite pressure.
    /// Returns the number ignored.
    pub fn ignore_disconnected(graph: &mut VesselGraph) -> usize {
        let disconnected: Vec<EdgeId> = graph
            .active_edge_ids()
            .filter(|&e| {
                let edge = &graph[e];
                !graph[edge.from].pressure_mmHg.is_finite() || !graph[edge.to].pressure_mmHg.is_finite()
            })
            .collect();
        for &e in &disconnected {
            graph[e].is_ignored = true;
        }
        disconnected.len()
    }

    /// Bring pressures, flows and stresses up to date with the topology.
    ///
    /// A clean graph (nothing changed since the last solve) is left alone,
    /// so a second call in a row is a no-op.
    pub fn update_graph(&self, graph: &mut VesselGraph) -> MaintenanceDiagnostics {
        let mut diagnostics = MaintenanceDiagnostics::default();
        if !graph.is_dirty() {
            diagnostics.skipped = true;
            return diagnostics;
        }

        for round in 1..=self.max_rounds {
            diagnostics.rounds = round;
            diagnostics.pruned_edges += Self::prune_leaves(graph);
            diagnostics.solve = Some(self.solver.solve(graph));

            let disconnected = Self::ignore_disconnected(graph);
            diagnostics.disconnected_edges += disconnected;
            if disconnected == 0 {
                break;
            }
            log::debug!("Maintenance round {}: ignored {} disconnected edges", round, disconnected);
        }

        if graph.is_dirty() {
            log::warn!(
                "Maintenance did not settle after {} rounds ({} pruned, {} disconnected)",
                diagnostics.rounds,
                diagnostics.pruned_edges,
                diagnostics.disconnected_edges
            );
        }
        diagnostics
    }
}
