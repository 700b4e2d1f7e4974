//! Nodal pressure solve and derived flow/stress quantities.
//!
//! Each non-root node satisfies flow conservation over its active edges:
//!
//!   Σ_e g_e · (P_i − P_j) = 0,   g_e = π r⁴ / (8 μ(r) L)
//!
//! Roots carry fixed pressures and move to the right-hand side. The system
//! is assembled densely (one row per unknown) and solved by successive
//! over-relaxation, warm-started from the previous solution or from the
//! mean of neighbouring pressures.
//!
//! Nodes not connected to any root through active edges have no defined
//! pressure and are set to NaN.
//!
//! Reference: Pries et al., Am J Physiol 1990 (network flow model)

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::HemodynamicParameters;
use crate::graph::{EdgeId, NodeId, VesselGraph};

use super::physics::{circumferential_stress_mmHg, conductance, lumen_area_um2, shear_stress_mmHg};

/// Diagnostics from one full solve cycle
#[derive(Debug, Clone, Default)]
pub struct SolveDiagnostics {
    /// Unknown node pressures in the last system
    pub unknowns: usize,
    /// SOR sweeps in the last pressure solve
    pub sor_iterations: usize,
    /// Largest pressure update of the final sweep (mmHg)
    pub final_update_mmHg: f64,
    /// Edges reversed to restore pressure monotonicity
    pub reversed_edges: usize,
    /// Solve → reverse → flow cycles run
    pub cycles: usize,
    /// Edges still carrying negative flow at exit
    pub negative_flow_edges: usize,
    /// SOR reached tolerance and no negative flow remains
    pub converged: bool,
}

/// Dense linear system A·x = b with per-row non-zero column lists
#[derive(Debug, Clone)]
pub struct DenseSystem {
    n: usize,
    matrix: Vec<f64>,
    rhs: Vec<f64>,
    nonzero: Vec<Vec<usize>>,
}

impl DenseSystem {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            matrix: vec![0.0; n * n],
            rhs: vec![0.0; n],
            nonzero: vec![Vec::new(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Accumulate into A[row][col]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if col != row && !self.nonzero[row].contains(&col) {
            self.nonzero[row].push(col);
        }
        self.matrix[row * self.n + col] += value;
    }

    pub fn add_rhs(&mut self, row: usize, value: f64) {
        self.rhs[row] += value;
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[row * self.n + col]
    }

    /// Successive over-relaxation. Returns (sweeps, largest update of the
    /// final sweep).
    pub fn solve_sor(&self, x: &mut [f64], omega: f64, tolerance: f64, max_iterations: usize) -> (usize, f64) {
        let mut last_update = f64::INFINITY;
        for iteration in 1..=max_iterations {
            last_update = 0.0;
            for i in 0..self.n {
                let diagonal = self.get(i, i);
                if diagonal == 0.0 {
                    continue;
                }
                let sigma: f64 = self.nonzero[i].iter().map(|&j| self.get(i, j) * x[j]).sum();
                let gauss_seidel = (self.rhs[i] - sigma) / diagonal;
                let update = omega * (gauss_seidel - x[i]);
                x[i] += update;
                last_update = last_update.max(update.abs());
            }
            if last_update < tolerance {
                return (iteration, last_update);
            }
        }
        (max_iterations, last_update)
    }
}

/// Pressure/flow solver for the vessel network
#[derive(Debug, Clone)]
pub struct PressureFlowSolver {
    pub params: HemodynamicParameters,
}

impl PressureFlowSolver {
    pub fn new(params: HemodynamicParameters) -> Self {
        Self { params }
    }

    /// Conductance of an edge, or 0 when its geometry is degenerate
    pub fn edge_conductance(&self, graph: &VesselGraph, id: EdgeId) -> f64 {
        let edge = &graph[id];
        let g = conductance(edge.radius_um, edge.length_um, self.params.plasma_viscosity_mmHg_s);
        if g.is_finite() && g > 0.0 {
            g
        } else {
            0.0
        }
    }

    /// Full hemodynamic update: pressures, reversal, flows, stresses.
    ///
    /// Retries the whole cycle while any edge carries negative flow, up to
    /// `max_solve_cycles`.
    pub fn solve(&self, graph: &mut VesselGraph) -> SolveDiagnostics {
        let mut diagnostics = SolveDiagnostics::default();
        let mut sor_converged = false;

        for cycle in 1..=self.params.max_solve_cycles.max(1) {
            diagnostics.cycles = cycle;

            let (unknowns, iterations, update) = self.calculate_pressures(graph);
            let reversed = Self::reverse_pressures(graph);
            diagnostics.reversed_edges += reversed;

            let (unknowns, iterations, update) = if reversed > 0 {
                self.calculate_pressures(graph)
            } else {
                (unknowns, iterations, update)
            };
            diagnostics.unknowns = unknowns;
            diagnostics.sor_iterations = iterations;
            diagnostics.final_update_mmHg = update;
            sor_converged = update < self.params.sor_tolerance_mmHg || unknowns == 0;

            self.calculate_flows(graph);
            Self::calculate_stresses(graph);

            let negative = graph
                .active_edge_ids()
                .filter(|&e| graph[e].flow_um3_per_sec < 0.0)
                .count();
            diagnostics.negative_flow_edges = negative;
            if negative == 0 {
                break;
            }
            log::warn!(
                "Pressure solve cycle {}: {} edges with negative flow, retrying",
                cycle,
                negative
            );
        }

        diagnostics.converged = sor_converged && diagnostics.negative_flow_edges == 0;
        if !sor_converged {
            log::warn!(
                "SOR stopped after {} sweeps with update {:.3e} mmHg",
                diagnostics.sor_iterations,
                diagnostics.final_update_mmHg
            );
        }
        graph.mark_clean();
        diagnostics
    }

    /// Nodes reachable from a root through active edges, ignoring direction
    fn root_connected(graph: &VesselGraph) -> HashSet<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        for root in graph.root_ids() {
            if seen.insert(root) {
                queue.push_back(root);
            }
        }
        while let Some(node) = queue.pop_front() {
            for e in graph.incident_edges(node) {
                let other = graph[e].other(node);
                if seen.insert(other) {
                    queue.push_back(other);
                }
            }
        }
        seen
    }

    /// Solve node pressures. Returns (unknowns, SOR sweeps, final update).
    pub fn calculate_pressures(&self, graph: &mut VesselGraph) -> (usize, usize, f64) {
        let connected = Self::root_connected(graph);
        let conductances: HashMap<EdgeId, f64> = graph
            .active_edge_ids()
            .map(|e| (e, self.edge_conductance(graph, e)))
            .collect();

        // Assign rows to connected, non-degenerate interior nodes
        let node_ids: Vec<NodeId> = graph.node_ids().collect();
        let mut unknowns: Vec<NodeId> = Vec::new();
        for &id in &node_ids {
            graph[id].solve_index = None;
            if graph[id].is_root {
                continue;
            }
            let total: f64 = graph.incident_edges(id).iter().map(|e| conductances[e]).sum();
            if connected.contains(&id) && total > 0.0 {
                graph[id].solve_index = Some(unknowns.len());
                unknowns.push(id);
            } else {
                graph[id].pressure_mmHg = f64::NAN;
            }
        }

        let n = unknowns.len();
        if n == 0 {
            return (0, 0, 0.0);
        }

        let mut system = DenseSystem::new(n);
        for (row, &id) in unknowns.iter().enumerate() {
            for e in graph.incident_edges(id) {
                let g = conductances[&e];
                if g == 0.0 {
                    continue;
                }
                let other = graph[e].other(id);
                let neighbor = &graph[other];
                system.add(row, row, g);
                match neighbor.solve_index {
                    Some(col) => system.add(row, col, -g),
                    None if neighbor.is_root => system.add_rhs(row, g * neighbor.pressure_mmHg),
                    // Degenerate neighbour behaves as a sealed end
                    None => system.add(row, row, -g),
                }
            }
        }

        let mean_root = {
            let roots: Vec<f64> = graph
                .root_ids()
                .into_iter()
                .map(|r| graph[r].pressure_mmHg)
                .filter(|p| p.is_finite())
                .collect();
            if roots.is_empty() {
                0.0
            } else {
                roots.iter().sum::<f64>() / roots.len() as f64
            }
        };

        let mut x: Vec<f64> = unknowns
            .iter()
            .map(|&id| self.initial_guess(graph, id, mean_root))
            .collect();

        let (iterations, update) = system.solve_sor(
            &mut x,
            self.params.sor_omega,
            self.params.sor_tolerance_mmHg,
            self.params.sor_max_iterations,
        );

        for (&id, &p) in unknowns.iter().zip(x.iter()) {
            graph[id].pressure_mmHg = p;
        }
        (n, iterations, update)
    }

    /// Previous pressure if defined, else the mean of defined neighbour
    /// pressures, else the mean root pressure
    fn initial_guess(&self, graph: &VesselGraph, id: NodeId, fallback: f64) -> f64 {
        let current = graph[id].pressure_mmHg;
        if current.is_finite() {
            return current;
        }
        let neighbors: Vec<f64> = graph
            .incident_edges(id)
            .into_iter()
            .map(|e| graph[graph[e].other(id)].pressure_mmHg)
            .filter(|p| p.is_finite())
            .collect();
        if neighbors.is_empty() {
            fallback
        } else {
            neighbors.iter().sum::<f64>() / neighbors.len() as f64
        }
    }

    /// Reverse every active edge whose downstream pressure exceeds its
    /// upstream pressure. Returns the number reversed.
    pub fn reverse_pressures(graph: &mut VesselGraph) -> usize {
        let to_reverse: Vec<EdgeId> = graph
            .active_edge_ids()
            .filter(|&e| {
                let edge = &graph[e];
                let (p_from, p_to) = (graph[edge.from].pressure_mmHg, graph[edge.to].pressure_mmHg);
                p_from.is_finite() && p_to.is_finite() && p_from < p_to
            })
            .collect();
        for &e in &to_reverse {
            graph.reverse_edge(e);
        }
        if !to_reverse.is_empty() {
            log::debug!("Reversed {} edges against the pressure gradient", to_reverse.len());
        }
        to_reverse.len()
    }

    /// flow = g·ΔP and lumen area for every active edge
    pub fn calculate_flows(&self, graph: &mut VesselGraph) {
        let ids: Vec<EdgeId> = graph.active_edge_ids().collect();
        for id in ids {
            let g = self.edge_conductance(graph, id);
            let edge = &graph[id];
            let dp = graph[edge.from].pressure_mmHg - graph[edge.to].pressure_mmHg;
            let flow = g * dp;
            let edge = &mut graph[id];
            edge.flow_um3_per_sec = flow;
            edge.area_um2 = lumen_area_um2(edge.radius_um);
            edge.is_perfused = flow.is_finite() && flow > 0.0;
        }
    }

    /// Shear and circumferential stress for every active edge
    pub fn calculate_stresses(graph: &mut VesselGraph) {
        let ids: Vec<EdgeId> = graph.active_edge_ids().collect();
        for id in ids {
            let edge = &graph[id];
            let (p_from, p_to) = (graph[edge.from].pressure_mmHg, graph[edge.to].pressure_mmHg);
            let shear = shear_stress_mmHg(edge.radius_um, p_from - p_to, edge.length_um);
            let circumferential = circumferential_stress_mmHg(0.5 * (p_from + p_to), edge.radius_um, edge.wall_um);
            let edge = &mut graph[id];
            edge.shear_mmHg = shear;
            edge.circumferential_stress_mmHg = circumferential;
        }
    }
}
