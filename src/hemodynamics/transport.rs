//! Convective oxygen transport along the vessel network.
//!
//! Blood oxygen content is dissolved plus hemoglobin-bound oxygen:
//!
//!   C(p) = α·p + Hct·[Hb]·S(p),   S(p) = pⁿ / (pⁿ + P50ⁿ)
//!
//! Oxygen is propagated breadth-first from the arterial roots. A node is
//! resolved once every active edge entering it is resolved; its content is
//! the flow-weighted mix of the inlet contents. Each edge loses oxygen to
//! the surrounding tissue across its wall,
//!
//!   J = k · 2πrL · α · max(p_in − p_tissue, 0)
//!
//! bounded by what the blood carries, and the outlet pO2 follows from the
//! remaining content by bisection.
//!
//! Units: content mM, flow μm³/s, so flow·content is amol/s.
//!
//! References:
//! - Hill saturation: Severinghaus, J Appl Physiol 1979 (P50 26.8 mmHg, n 2.7)
//! - Hemoglobin capacity: Secomb et al., Ann Biomed Eng 2004

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::f64::consts::PI;

use crate::config::TransportParameters;
use crate::graph::{EdgeId, EdgeTransport, NodeId, VesselGraph};
use crate::state::{LatticeCell, LatticeField};

use super::maintenance::GraphMaintenance;
use super::physics::bisect;

/// Upper bound of the pO2 search when inverting content (mmHg)
const MAX_PO2_MMHG: f64 = 1000.0;

/// Diagnostics from one propagation
#[derive(Debug, Clone, Default)]
pub struct TransportDiagnostics {
    /// Edges that received inlet/outlet values
    pub resolved_edges: usize,
    /// Nodes left without a resolved oxygen level
    pub unresolved_nodes: usize,
    /// Propagations restarted after a stall
    pub restarts: usize,
    /// Edges removed to break stalls
    pub removed_edges: usize,
    /// Oxygen delivered to tissue by all edges (amol/s)
    pub total_delivered_amol_per_sec: f64,
}

/// Outcome of a single propagation attempt
enum Propagation {
    Complete,
    /// Nodes waiting on unresolved inflow
    Stalled(Vec<NodeId>),
}

/// Oxygen transport solver
#[derive(Debug, Clone)]
pub struct OxygenTransport {
    pub params: TransportParameters,
}

impl OxygenTransport {
    pub fn new(params: TransportParameters) -> Self {
        Self { params }
    }

    /// Hemoglobin saturation at the given pO2
    pub fn saturation(&self, po2_mmHg: f64) -> f64 {
        if po2_mmHg <= 0.0 {
            return 0.0;
        }
        let n = self.params.hill_coefficient;
        let pn = po2_mmHg.powf(n);
        pn / (pn + self.params.p50_mmHg.powf(n))
    }

    /// Total blood oxygen content (mM)
    pub fn content_mM(&self, po2_mmHg: f64) -> f64 {
        let p = po2_mmHg.max(0.0);
        self.params.oxygen_solubility_mM_per_mmHg * p
            + self.params.hematocrit * self.params.hemoglobin_capacity_mM * self.saturation(p)
    }

    /// Inverse of [`content_mM`](Self::content_mM)
    pub fn po2_from_content(&self, content_mM: f64) -> f64 {
        if content_mM.is_nan() || content_mM <= 0.0 {
            return 0.0;
        }
        bisect(|p| self.content_mM(p) - content_mM, 0.0, MAX_PO2_MMHG, 1e-9, 200)
    }

    /// Propagate oxygen from the arterial roots through the whole network.
    ///
    /// Writes node `oxygen_mmHg` and edge transport values. When propagation
    /// stalls, the lowest-flow (or NaN-flow) edge blocking the frontier is
    /// removed, the network re-solved through `maintenance`, and propagation
    /// restarted; past `max_propagation_restarts` the lowest-flow edge of the
    /// whole network is removed instead.
    pub fn propagate(
        &self,
        graph: &mut VesselGraph,
        tissue_oxygen: &LatticeField,
        maintenance: &GraphMaintenance,
    ) -> TransportDiagnostics {
        let mut diagnostics = TransportDiagnostics::default();
        let max_restarts = self.params.max_propagation_restarts;
        let attempts = 2 * max_restarts + 1;

        for attempt in 0..attempts {
            match self.propagate_once(graph, tissue_oxygen, &mut diagnostics) {
                Propagation::Complete => return diagnostics,
                Propagation::Stalled(waiting) => {
                    if attempt + 1 == attempts {
                        break;
                    }
                    let Some(victim) = self.choose_victim(graph, &waiting, attempt) else {
                        break;
                    };
                    log::warn!(
                        "Oxygen propagation stalled at {} nodes, removing {:?} (flow {:.3e})",
                        waiting.len(),
                        victim,
                        graph[victim].flow_um3_per_sec
                    );
                    graph.invalidate_endpoints(victim);
                    graph.remove_edge(victim);
                    diagnostics.removed_edges += 1;
                    diagnostics.restarts += 1;
                    maintenance.update_graph(graph);
                }
            }
        }

        log::warn!(
            "Oxygen propagation gave up with {} unresolved nodes",
            diagnostics.unresolved_nodes
        );
        diagnostics
    }

    fn propagate_once(
        &self,
        graph: &mut VesselGraph,
        tissue_oxygen: &LatticeField,
        diagnostics: &mut TransportDiagnostics,
    ) -> Propagation {
        let arterial_content = self.content_mM(self.params.arterial_po2_mmHg);
        let mut content: HashMap<NodeId, f64> = HashMap::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        let node_ids: Vec<NodeId> = graph.node_ids().collect();
        for &id in &node_ids {
            let is_source = graph[id].is_root && graph.in_degree(id) == 0 && graph.out_degree(id) > 0;
            if let Some(node) = graph.node_untracked(id) {
                node.oxygen_mmHg = if is_source { self.params.arterial_po2_mmHg } else { f64::NAN };
            }
            if is_source {
                content.insert(id, arterial_content);
                queue.push_back(id);
            }
        }

        // Outlet content and flow of resolved edges
        let mut outlets: HashMap<EdgeId, (f64, f64)> = HashMap::new();
        diagnostics.resolved_edges = 0;
        diagnostics.total_delivered_amol_per_sec = 0.0;

        while let Some(node) = queue.pop_front() {
            let inlet = content[&node];
            for e in graph.out_edges(node) {
                let (outlet, flow) = self.transport_edge(graph, e, inlet, tissue_oxygen, diagnostics);
                outlets.insert(e, (outlet, flow));

                let head = graph[e].to;
                if content.contains_key(&head) {
                    continue;
                }
                let inflow = graph.in_edges(head);
                if !inflow.iter().all(|i| outlets.contains_key(i)) {
                    continue;
                }
                let mixed = Self::mix(inflow.iter().map(|i| outlets[i]));
                content.insert(head, mixed);
                let po2 = self.po2_from_content(mixed);
                if let Some(n) = graph.node_untracked(head) {
                    n.oxygen_mmHg = po2;
                }
                queue.push_back(head);
            }
        }

        // Nodes with some resolved inflow still waiting on the rest
        let waiting: Vec<NodeId> = node_ids
            .iter()
            .copied()
            .filter(|id| !content.contains_key(id) && graph.in_edges(*id).iter().any(|e| outlets.contains_key(e)))
            .collect();
        diagnostics.unresolved_nodes = node_ids
            .iter()
            .filter(|id| !content.contains_key(id) && graph.degree(**id) > 0)
            .count();

        if waiting.is_empty() {
            Propagation::Complete
        } else {
            Propagation::Stalled(waiting)
        }
    }

    /// Flow-weighted mean of (content, flow) pairs; plain mean without flow
    fn mix<I: Iterator<Item = (f64, f64)>>(inlets: I) -> f64 {
        let (mut weighted, mut total_flow, mut plain, mut count) = (0.0, 0.0, 0.0, 0usize);
        for (c, q) in inlets {
            plain += c;
            count += 1;
            if q.is_finite() && q > 0.0 {
                weighted += c * q;
                total_flow += q;
            }
        }
        if total_flow > 0.0 {
            weighted / total_flow
        } else if count > 0 {
            plain / count as f64
        } else {
            0.0
        }
    }

    /// Apply wall loss along one edge. Returns (outlet content, flow).
    fn transport_edge(
        &self,
        graph: &mut VesselGraph,
        id: EdgeId,
        inlet_content: f64,
        tissue_oxygen: &LatticeField,
        diagnostics: &mut TransportDiagnostics,
    ) -> (f64, f64) {
        let edge = &graph[id];
        let flow = edge.flow_um3_per_sec;
        let inlet_po2 = self.po2_from_content(inlet_content);
        let tissue_po2 = {
            let mean = tissue_oxygen.mean_over(&edge.spanned_cells);
            if mean.is_finite() { mean } else { 0.0 }
        };

        let carried = if flow.is_finite() && flow > 0.0 { flow * inlet_content } else { 0.0 };
        let wall_area = 2.0 * PI * edge.radius_um * edge.length_um;
        let loss = (self.params.wall_permeability_um_per_sec
            * wall_area
            * self.params.oxygen_solubility_mM_per_mmHg
            * (inlet_po2 - tissue_po2).max(0.0))
        .min(carried);

        let outlet_content = if carried > 0.0 { (carried - loss) / flow } else { inlet_content };
        let transport = EdgeTransport {
            inlet_po2_mmHg: inlet_po2,
            outlet_po2_mmHg: self.po2_from_content(outlet_content),
            extraction_fraction: if carried > 0.0 { loss / carried } else { 0.0 },
            delivered_o2_amol_per_sec: loss,
        };
        if let Some(edge) = graph.edge_untracked(id) {
            edge.transport = transport;
        }
        diagnostics.resolved_edges += 1;
        diagnostics.total_delivered_amol_per_sec += loss;
        (outlet_content, flow)
    }

    /// Edge removed after stalled attempt `attempt`: blocking the frontier
    /// while restarts remain, anywhere in the network after that
    fn choose_victim(&self, graph: &VesselGraph, waiting: &[NodeId], attempt: usize) -> Option<EdgeId> {
        if attempt < self.params.max_propagation_restarts {
            Self::frontier_victim(graph, waiting)
        } else {
            Self::global_victim(graph)
        }
    }

    /// Lowest-flow edge entering a waiting node; NaN flow first
    fn frontier_victim(graph: &VesselGraph, waiting: &[NodeId]) -> Option<EdgeId> {
        let candidates: Vec<EdgeId> = waiting.iter().flat_map(|&n| graph.in_edges(n)).collect();
        Self::min_flow(graph, candidates.into_iter())
    }

    fn global_victim(graph: &VesselGraph) -> Option<EdgeId> {
        Self::min_flow(graph, graph.active_edge_ids())
    }

    fn min_flow<I: Iterator<Item = EdgeId>>(graph: &VesselGraph, edges: I) -> Option<EdgeId> {
        let key = |e: EdgeId| {
            let q = graph[e].flow_um3_per_sec;
            if q.is_finite() { q.abs() } else { f64::NEG_INFINITY }
        };
        edges.min_by(|&a, &b| key(a).total_cmp(&key(b)))
    }

    /// Per-cell oxygen source (mM/s): each edge's delivery split equally
    /// over the cells it spans, divided by the cell volume
    pub fn concentration_deltas(&self, graph: &VesselGraph) -> BTreeMap<LatticeCell, f64> {
        let mut deltas: BTreeMap<LatticeCell, f64> = BTreeMap::new();
        let volume = self.params.lattice_cell_volume_um3;
        for id in graph.active_edge_ids() {
            let edge = &graph[id];
            let delivered = edge.transport.delivered_o2_amol_per_sec;
            if delivered.is_nan() || delivered <= 0.0 || edge.spanned_cells.is_empty() {
                continue;
            }
            let unique: HashSet<LatticeCell> = edge.spanned_cells.iter().copied().collect();
            let share = delivered / unique.len() as f64 / volume;
            for cell in unique {
                *deltas.entry(cell).or_insert(0.0) += share;
            }
        }
        deltas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HemodynamicParameters;
    use crate::graph::{Edge, EdgeKind};
    use glam::IVec3;

    fn transport() -> OxygenTransport {
        OxygenTransport::new(TransportParameters::default())
    }

    #[test]
    fn test_saturation_at_p50_is_half() {
        let t = transport();
        assert!((t.saturation(26.8) - 0.5).abs() < 1e-12);
        assert!(t.saturation(100.0) > 0.95);
        assert_eq!(t.saturation(0.0), 0.0);
    }

    #[test]
    fn test_content_inverts() {
        let t = transport();
        for p in [5.0, 26.8, 60.0, 100.0] {
            assert!((t.po2_from_content(t.content_mM(p)) - p).abs() < 1e-6, "p={}", p);
        }
    }

    fn chain_with_cells() -> (VesselGraph, Vec<EdgeId>) {
        let mut g = VesselGraph::new();
        let mut nodes = vec![g.add_root(IVec3::new(0, 0, 0), 89.0)];
        for x in 1..4 {
            nodes.push(g.add_node(IVec3::new(x, 0, 0)));
        }
        nodes.push(g.add_root(IVec3::new(4, 0, 0), 18.0));
        let mut edges = Vec::new();
        for (i, w) in nodes.windows(2).enumerate() {
            let mut edge = Edge::new(w[0], w[1], EdgeKind::Capillary, 4.0, 1.0, 30.0);
            edge.spanned_cells = vec![LatticeCell::new(0, i, 0), LatticeCell::new(0, i + 1, 0)];
            edges.push(g.add_edge(edge));
        }
        (g, edges)
    }

    #[test]
    fn test_po2_falls_along_chain() {
        let (mut g, edges) = chain_with_cells();
        let maintenance = GraphMaintenance::new(HemodynamicParameters::default());
        maintenance.update_graph(&mut g);
        let tissue = LatticeField::uniform(1, 5, 1, 10.0);

        let t = transport();
        let diagnostics = t.propagate(&mut g, &tissue, &maintenance);
        assert_eq!(diagnostics.restarts, 0);
        assert_eq!(diagnostics.unresolved_nodes, 0);
        assert_eq!(diagnostics.resolved_edges, 4);
        assert!(!g.is_dirty(), "oxygen writes must not invalidate the pressure solve");

        let mut last = f64::INFINITY;
        for &e in &edges {
            let tr = &g[e].transport;
            assert!(tr.outlet_po2_mmHg <= tr.inlet_po2_mmHg);
            assert!(tr.inlet_po2_mmHg <= last + 1e-9);
            assert!(tr.delivered_o2_amol_per_sec >= 0.0);
            last = tr.outlet_po2_mmHg;
        }

        let deltas = t.concentration_deltas(&g);
        let total: f64 = deltas.values().sum::<f64>() * t.params.lattice_cell_volume_um3;
        assert!((total - diagnostics.total_delivered_amol_per_sec).abs() < 1e-6 * total.max(1.0));
    }

    #[test]
    fn test_hypoxic_tissue_draws_more() {
        let t = transport();
        let maintenance = GraphMaintenance::new(HemodynamicParameters::default());

        let (mut rich, _) = chain_with_cells();
        maintenance.update_graph(&mut rich);
        let high = t.propagate(&mut rich, &LatticeField::uniform(1, 5, 1, 60.0), &maintenance);

        let (mut poor, _) = chain_with_cells();
        maintenance.update_graph(&mut poor);
        let low = t.propagate(&mut poor, &LatticeField::uniform(1, 5, 1, 0.0), &maintenance);

        assert!(low.total_delivered_amol_per_sec > high.total_delivered_amol_per_sec);
    }

    /// a -> b -> v solved, then c -> b added with NaN flow: b can never
    /// collect all of its inflow
    fn stalled_junction() -> (VesselGraph, EdgeId, GraphMaintenance) {
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let b = g.add_node(IVec3::new(1, 0, 0));
        let v = g.add_root(IVec3::new(2, 0, 0), 18.0);
        g.add_edge(Edge::new(a, b, EdgeKind::Capillary, 4.0, 1.0, 30.0));
        g.add_edge(Edge::new(b, v, EdgeKind::Capillary, 4.0, 1.0, 30.0));
        let maintenance = GraphMaintenance::new(HemodynamicParameters::default());
        maintenance.update_graph(&mut g);

        let c = g.add_node(IVec3::new(1, 1, 0));
        let dangling = g.add_edge(Edge::new(c, b, EdgeKind::Capillary, 4.0, 1.0, 30.0));
        (g, dangling, maintenance)
    }

    #[test]
    fn test_stall_removes_blocking_inflow() {
        let (mut g, dangling, maintenance) = stalled_junction();
        let diagnostics = transport().propagate(&mut g, &LatticeField::uniform(1, 3, 2, 10.0), &maintenance);

        assert_eq!(diagnostics.restarts, 1);
        assert_eq!(diagnostics.removed_edges, 1);
        assert_eq!(diagnostics.unresolved_nodes, 0);
        assert_eq!(diagnostics.resolved_edges, 2);
        assert!(g.get_edge(dangling).is_none());
        assert!(g.find_node(IVec3::new(1, 1, 0)).is_none());
        assert!(!g.is_dirty());
    }

    #[test]
    fn test_stall_gives_up_at_attempt_cap() {
        let (mut g, dangling, maintenance) = stalled_junction();
        let t = OxygenTransport::new(TransportParameters {
            max_propagation_restarts: 0,
            ..TransportParameters::default()
        });
        let diagnostics = t.propagate(&mut g, &LatticeField::uniform(1, 3, 2, 10.0), &maintenance);

        assert_eq!(diagnostics.restarts, 0);
        assert_eq!(diagnostics.removed_edges, 0);
        // b, v and c never received oxygen
        assert_eq!(diagnostics.unresolved_nodes, 3);
        assert!(g.get_edge(dangling).is_some());
    }

    #[test]
    fn test_victim_escalates_past_restart_budget() {
        let (mut g, edges) = chain_with_cells();
        for (&e, q) in edges.iter().zip([40.0, 7.0, -3.0, 12.0]) {
            g[e].flow_um3_per_sec = q;
        }
        let t = OxygenTransport::new(TransportParameters {
            max_propagation_restarts: 2,
            ..TransportParameters::default()
        });
        let waiting = [g[edges[0]].to];

        assert_eq!(t.choose_victim(&g, &waiting, 0), Some(edges[0]));
        assert_eq!(t.choose_victim(&g, &waiting, 1), Some(edges[0]));
        // Smallest |flow| anywhere
        assert_eq!(t.choose_victim(&g, &waiting, 2), Some(edges[2]));

        g[edges[3]].flow_um3_per_sec = f64::NAN;
        assert_eq!(t.choose_victim(&g, &waiting, 2), Some(edges[3]));
    }
}
