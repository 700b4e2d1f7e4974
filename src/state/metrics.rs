//! Network metrics for logging and export.
//!
//! A snapshot of the graph's hemodynamic state plus running counters of
//! every recovered-failure path (rejected sprouts, rollbacks, heuristic
//! removals), so skipped work is visible rather than silent.

use serde::{Deserialize, Serialize};

use crate::graph::VesselGraph;

/// Running counts of skipped or rolled-back structural work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SkipCounters {
    // === Rebalancing ===
    /// Rebalancing found no arterial root upstream of the junction
    pub no_arterial_root: u64,
    /// Rebalancing found no venous root downstream of the junction
    pub no_venous_root: u64,
    /// Root-to-junction radius batches undone after a failed radius search
    pub rebalance_rollbacks: u64,
    /// Rebalances absorbed by diverting flow from a sibling edge
    pub sibling_diversions: u64,

    // === Sprouts ===
    /// Anastomoses rejected because they would close a directed cycle
    pub rejected_cycles: u64,
    /// Anastomoses rejected for zero or undefined endpoint pressure
    pub rejected_pressure: u64,
    /// Sprouts discarded at the lattice boundary
    pub rejected_bounds: u64,
    /// Sprouts discarded on reaching a saturated node
    pub rejected_degree: u64,
    /// Sprouts discarded for exceeding the maximum length
    pub rejected_length: u64,
    /// Anastomoses rejected because the chain crossed vessels committed meanwhile
    pub rejected_overlap: u64,

    // === Transport ===
    /// Edges removed to unblock oxygen propagation
    pub transport_removals: u64,
}

impl SkipCounters {
    /// Every rejected or undone operation
    pub fn total(&self) -> u64 {
        self.no_arterial_root
            + self.no_venous_root
            + self.rebalance_rollbacks
            + self.rejected_cycles
            + self.rejected_pressure
            + self.rejected_bounds
            + self.rejected_degree
            + self.rejected_length
            + self.rejected_overlap
            + self.transport_removals
    }
}

/// Snapshot of the vessel network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkMetrics {
    /// Simulation tick of the snapshot
    pub tick: u64,

    // === Topology ===
    pub node_count: usize,
    pub root_count: usize,
    pub active_edge_count: usize,
    /// Edges kept in the graph but excluded from flow
    pub ignored_edge_count: usize,
    /// Active edges with positive flow
    pub perfused_edge_count: usize,
    /// Sprouts growing but not yet connected
    pub pending_sprouts: usize,

    // === Hemodynamics ===
    /// Total flow leaving arterial roots (μm³/s)
    pub arterial_inflow_um3_per_sec: f64,
    /// Total flow entering venous roots (μm³/s)
    pub venous_outflow_um3_per_sec: f64,
    /// Mean radius over active edges (μm)
    pub mean_radius_um: f64,
    /// Mean wall thickness over active edges (μm)
    pub mean_wall_um: f64,
    /// Mean wall shear stress over perfused edges (mmHg)
    pub mean_shear_mmHg: f64,

    // === Oxygen ===
    /// Mean blood pO2 over nodes with a resolved value (mmHg)
    pub mean_blood_po2_mmHg: f64,
    /// Oxygen delivered to tissue by all edges (amol/s)
    pub oxygen_delivery_amol_per_sec: f64,

    // === Structural history ===
    /// Edges removed by degradation and remodeling
    pub removed_edges: u64,
    /// Sprouts connected to the network
    pub anastomoses: u64,
    pub skips: SkipCounters,
}

impl NetworkMetrics {
    /// Read the graph-derived fields. Counters are left at zero.
    pub fn from_graph(graph: &VesselGraph, tick: u64) -> Self {
        let mut metrics = NetworkMetrics {
            tick,
            node_count: graph.node_count(),
            root_count: graph.root_ids().len(),
            active_edge_count: graph.active_edge_count(),
            ignored_edge_count: graph.edge_count() - graph.active_edge_count(),
            ..Default::default()
        };

        let (mut radius_sum, mut wall_sum, mut shear_sum) = (0.0, 0.0, 0.0);
        for e in graph.active_edge_ids() {
            let edge = &graph[e];
            radius_sum += edge.radius_um;
            wall_sum += edge.wall_um;
            metrics.oxygen_delivery_amol_per_sec += edge.transport.delivered_o2_amol_per_sec;
            if edge.is_perfused {
                metrics.perfused_edge_count += 1;
                shear_sum += edge.shear_mmHg;
            }
            let flow = if edge.flow_um3_per_sec.is_finite() { edge.flow_um3_per_sec } else { 0.0 };
            if graph[edge.from].is_root {
                metrics.arterial_inflow_um3_per_sec += flow;
            }
            if graph[edge.to].is_root {
                metrics.venous_outflow_um3_per_sec += flow;
            }
        }

        if metrics.active_edge_count > 0 {
            metrics.mean_radius_um = radius_sum / metrics.active_edge_count as f64;
            metrics.mean_wall_um = wall_sum / metrics.active_edge_count as f64;
        }
        if metrics.perfused_edge_count > 0 {
            metrics.mean_shear_mmHg = shear_sum / metrics.perfused_edge_count as f64;
        }

        let po2: Vec<f64> = graph
            .node_ids()
            .map(|n| graph[n].oxygen_mmHg)
            .filter(|p| p.is_finite())
            .collect();
        if !po2.is_empty() {
            metrics.mean_blood_po2_mmHg = po2.iter().sum::<f64>() / po2.len() as f64;
        }
        metrics
    }

    /// Fraction of active edges carrying flow
    pub fn perfused_fraction(&self) -> f64 {
        if self.active_edge_count == 0 {
            0.0
        } else {
            self.perfused_edge_count as f64 / self.active_edge_count as f64
        }
    }

    /// Relative mismatch between arterial inflow and venous outflow
    pub fn mass_balance_error(&self) -> f64 {
        let scale = self.arterial_inflow_um3_per_sec.abs().max(f64::MIN_POSITIVE);
        (self.arterial_inflow_um3_per_sec - self.venous_outflow_um3_per_sec).abs() / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind};
    use crate::hemodynamics::GraphMaintenance;
    use crate::config::HemodynamicParameters;
    use glam::IVec3;

    #[test]
    fn test_metrics_of_solved_chain() {
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let b = g.add_node(IVec3::new(1, 0, 0));
        let v = g.add_root(IVec3::new(2, 0, 0), 18.0);
        g.add_edge(Edge::new(a, b, EdgeKind::Capillary, 4.0, 1.0, 30.0));
        g.add_edge(Edge::new(b, v, EdgeKind::Capillary, 6.0, 1.0, 30.0));
        GraphMaintenance::new(HemodynamicParameters::default()).update_graph(&mut g);

        let metrics = NetworkMetrics::from_graph(&g, 7);
        assert_eq!(metrics.tick, 7);
        assert_eq!(metrics.root_count, 2);
        assert_eq!(metrics.perfused_edge_count, 2);
        assert!((metrics.mean_radius_um - 5.0).abs() < 1e-12);
        assert!((metrics.perfused_fraction() - 1.0).abs() < 1e-12);
        assert!(metrics.arterial_inflow_um3_per_sec > 0.0);
        assert!(metrics.mass_balance_error() < 1e-6);
    }

    #[test]
    fn test_skip_total() {
        let skips = SkipCounters {
            no_arterial_root: 1,
            rejected_cycles: 2,
            sibling_diversions: 5,
            ..Default::default()
        };
        assert_eq!(skips.total(), 3);
    }
}
