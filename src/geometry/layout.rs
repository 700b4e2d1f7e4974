//! Initial network construction.
//!
//! Two layouts:
//! - `Pattern`: the adapter's unit cell tiled across the lattice; the
//!   leftmost nodes become arterial roots and the rightmost venous roots.
//! - `Roots`: arterial tripods on the left border and venous tripods on the
//!   right, each arterial tip joined to a venous tip by a straight capillary
//!   path. Root edges get radii from Murray's law applied to the tripod
//!   branches.
//!
//! Both finish with a maintenance pass, so dead ends are pruned and
//! pressures and flows are defined on return.

use glam::IVec3;

use crate::config::{LayoutKind, Parameters};
use crate::graph::{Edge, EdgeId, EdgeKind, NodeId, Strategy, VesselGraph};
use crate::hemodynamics::physics::{initial_wall_thickness_um, root_pressure_mmHg};
use crate::hemodynamics::{GraphMaintenance, MaintenanceDiagnostics, RadiusAssignmentEngine};

use super::{Border, GeometryAdapter, Motif};

/// A freshly built network
#[derive(Debug, Clone)]
pub struct NetworkLayout {
    pub graph: VesselGraph,
    pub arterial_roots: Vec<NodeId>,
    pub venous_roots: Vec<NodeId>,
    pub maintenance: MaintenanceDiagnostics,
}

/// Add (or find) the segment between two lattice nodes.
///
/// Creates missing endpoint nodes. An existing active edge between the two
/// nodes, in either direction, is returned instead of a parallel one.
pub fn add_segment(
    graph: &mut VesselGraph,
    adapter: &dyn GeometryAdapter,
    from: IVec3,
    to: IVec3,
    kind: EdgeKind,
    radius_um: f64,
) -> EdgeId {
    let a = graph.add_node(from);
    let b = graph.add_node(to);
    if let Some(existing) = graph.find_connection(a, b) {
        return existing;
    }
    let mut edge = Edge::new(
        a,
        b,
        kind,
        radius_um,
        initial_wall_thickness_um(radius_um),
        adapter.length_um(from, to),
    );
    edge.spanned_cells = adapter.spanned_cells(from, to);
    graph.add_edge(edge)
}

/// Insert a motif at `origin`. `Downstream` orients edges away from the
/// origin, `Upstream` toward it. The first edge gets `trunk`, the rest
/// `branch`.
#[allow(clippy::too_many_arguments)]
pub fn insert_motif(
    graph: &mut VesselGraph,
    adapter: &dyn GeometryAdapter,
    origin: IVec3,
    border: Border,
    motif: Motif,
    orientation: Strategy,
    trunk: EdgeKind,
    branch: EdgeKind,
    radius_um: f64,
) -> Vec<EdgeId> {
    adapter
        .motif(motif, origin, border)
        .into_iter()
        .enumerate()
        .filter(|(_, (a, b))| adapter.in_bounds(*a) && adapter.in_bounds(*b))
        .map(|(i, (a, b))| {
            let kind = if i == 0 { trunk } else { branch };
            match orientation {
                Strategy::Downstream => add_segment(graph, adapter, a, b, kind, radius_um),
                Strategy::Upstream => add_segment(graph, adapter, b, a, kind, radius_um),
            }
        })
        .collect()
}

/// Greedy lattice walk from `from` toward `to`, adding a segment per step.
/// Stops early when no neighbour gets closer.
pub fn connect_path(
    graph: &mut VesselGraph,
    adapter: &dyn GeometryAdapter,
    from: IVec3,
    to: IVec3,
    kind: EdgeKind,
    radius_um: f64,
) -> Vec<EdgeId> {
    let target = adapter.to_cartesian_um(to);
    let mut current = from;
    let mut edges = Vec::new();

    while current != to {
        let here = adapter.to_cartesian_um(current).distance(target);
        let next = (0..adapter.directions().len())
            .map(|d| adapter.apply_offset(current, d))
            .filter(|&c| adapter.in_bounds(c))
            .map(|c| (c, adapter.to_cartesian_um(c).distance(target)))
            .filter(|&(_, dist)| dist < here)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((next, _)) = next else {
            log::debug!("Path from {:?} stuck at {:?} short of {:?}", from, current, to);
            break;
        };
        edges.push(add_segment(graph, adapter, current, next, kind, radius_um));
        current = next;
    }
    edges
}

/// Build the initial network described by `params.layout`
pub fn build_network(adapter: &dyn GeometryAdapter, params: &Parameters) -> NetworkLayout {
    let mut layout = match params.layout.kind {
        LayoutKind::Pattern => build_pattern(adapter, params),
        LayoutKind::Roots => build_roots(adapter, params),
    };

    let maintenance = GraphMaintenance::new(params.hemodynamics.clone());
    layout.maintenance = maintenance.update_graph(&mut layout.graph);
    log::info!(
        "Built {:?} layout: {} nodes, {} active edges ({} pruned), {} arterial / {} venous roots",
        params.layout.kind,
        layout.graph.node_count(),
        layout.graph.active_edge_count(),
        layout.maintenance.pruned_edges,
        layout.arterial_roots.len(),
        layout.venous_roots.len()
    );
    layout
}

fn build_pattern(adapter: &dyn GeometryAdapter, params: &Parameters) -> NetworkLayout {
    let hemo = &params.hemodynamics;
    let mut graph = VesselGraph::new();
    let (tile, cell_edges) = adapter.unit_cell();
    let extent = adapter.node_extent();

    for ty in (0..extent.y).step_by(tile.y.max(1) as usize) {
        for tx in (0..extent.x).step_by(tile.x.max(1) as usize) {
            let offset = IVec3::new(tx, ty, 0);
            for &(a, b) in &cell_edges {
                let (a, b) = (a + offset, b + offset);
                if adapter.in_bounds(a) && adapter.in_bounds(b) {
                    add_segment(&mut graph, adapter, a, b, EdgeKind::Capillary, hemo.capillary_radius_um);
                }
            }
        }
    }

    let nodes: Vec<NodeId> = graph.node_ids().collect();
    let min_x = nodes.iter().map(|&n| graph[n].coord.x).min().unwrap_or(0);
    let max_x = nodes.iter().map(|&n| graph[n].coord.x).max().unwrap_or(0);
    let arterial_roots: Vec<NodeId> = nodes.iter().copied().filter(|&n| graph[n].coord.x == min_x).collect();
    let venous_roots: Vec<NodeId> = nodes.iter().copied().filter(|&n| graph[n].coord.x == max_x).collect();

    for &root in &arterial_roots {
        make_root(&mut graph, root, EdgeKind::Artery, hemo.capillary_radius_um, params);
    }
    for &root in &venous_roots {
        make_root(&mut graph, root, EdgeKind::Vein, hemo.capillary_radius_um, params);
    }

    NetworkLayout {
        graph,
        arterial_roots,
        venous_roots,
        maintenance: MaintenanceDiagnostics::default(),
    }
}

/// Turn a node into a root, relabel its edges and set its boundary pressure
fn make_root(graph: &mut VesselGraph, node: NodeId, kind: EdgeKind, radius_um: f64, params: &Parameters) {
    for e in graph.incident_edges(node) {
        graph[e].kind = kind;
    }
    let root = &mut graph[node];
    root.is_root = true;
    root.pressure_mmHg = root_pressure_mmHg(kind, radius_um, &params.hemodynamics);
}

fn build_roots(adapter: &dyn GeometryAdapter, params: &Parameters) -> NetworkLayout {
    let hemo = &params.hemodynamics;
    let capillary = hemo.capillary_radius_um;
    let mut graph = VesselGraph::new();

    let mut arterial_roots = Vec::new();
    let mut arterial_branches: Vec<EdgeId> = Vec::new();
    let mut arterial_tips: Vec<IVec3> = Vec::new();
    for coord in adapter.border_roots(Border::Left, params.layout.artery_roots) {
        arterial_roots.push(graph.add_root(coord, hemo.artery_pressure_mmHg));
        let edges = insert_motif(
            &mut graph,
            adapter,
            coord,
            Border::Left,
            Motif::Tripod,
            Strategy::Downstream,
            EdgeKind::Artery,
            EdgeKind::Arteriole,
            capillary,
        );
        for &e in edges.iter().skip(1) {
            arterial_branches.push(e);
            arterial_tips.push(graph[graph[e].to].coord);
        }
    }

    let mut venous_roots = Vec::new();
    let mut venous_branches: Vec<EdgeId> = Vec::new();
    let mut venous_tips: Vec<IVec3> = Vec::new();
    for coord in adapter.border_roots(Border::Right, params.layout.vein_roots) {
        venous_roots.push(graph.add_root(coord, hemo.vein_pressure_mmHg));
        let edges = insert_motif(
            &mut graph,
            adapter,
            coord,
            Border::Right,
            Motif::Tripod,
            Strategy::Upstream,
            EdgeKind::Vein,
            EdgeKind::Venule,
            capillary,
        );
        for &e in edges.iter().skip(1) {
            venous_branches.push(e);
            venous_tips.push(graph[graph[e].from].coord);
        }
    }

    connect_tips(&mut graph, adapter, &arterial_tips, &venous_tips, capillary);

    // Root edges take the Murray combination of their tripod branches
    let engine = RadiusAssignmentEngine::new(hemo.clone());
    engine.propagate_murray(&mut graph, &arterial_branches, Strategy::Upstream);
    engine.propagate_murray(&mut graph, &venous_branches, Strategy::Downstream);

    for &root in &arterial_roots {
        if let Some(&e) = graph.out_edges(root).first() {
            let radius = graph[e].radius_um;
            graph[root].pressure_mmHg = root_pressure_mmHg(EdgeKind::Artery, radius, hemo);
        }
    }
    for &root in &venous_roots {
        if let Some(&e) = graph.in_edges(root).first() {
            let radius = graph[e].radius_um;
            graph[root].pressure_mmHg = root_pressure_mmHg(EdgeKind::Vein, radius, hemo);
        }
    }

    NetworkLayout {
        graph,
        arterial_roots,
        venous_roots,
        maintenance: MaintenanceDiagnostics::default(),
    }
}

/// Join every arterial tip to a venous tip at the matching relative
/// position, then make sure every venous tip receives at least one path
fn connect_tips(
    graph: &mut VesselGraph,
    adapter: &dyn GeometryAdapter,
    arterial: &[IVec3],
    venous: &[IVec3],
    radius_um: f64,
) {
    if arterial.is_empty() || venous.is_empty() {
        log::warn!(
            "Roots layout with {} arterial and {} venous tips, nothing to connect",
            arterial.len(),
            venous.len()
        );
        return;
    }
    let mut arterial = arterial.to_vec();
    let mut venous = venous.to_vec();
    arterial.sort_by_key(|c| (c.y, c.x));
    venous.sort_by_key(|c| (c.y, c.x));

    let mut reached = vec![false; venous.len()];
    for (i, &a) in arterial.iter().enumerate() {
        let j = i * venous.len() / arterial.len();
        connect_path(graph, adapter, a, venous[j], EdgeKind::Capillary, radius_um);
        reached[j] = true;
    }
    for (j, &v) in venous.iter().enumerate() {
        if !reached[j] {
            let i = j * arterial.len() / venous.len();
            connect_path(graph, adapter, arterial[i], v, EdgeKind::Capillary, radius_um);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryKind, LayoutParameters};
    use crate::geometry::{adapter_for, RectGeometry};
    use crate::hemodynamics::physics::murray_parent_radius;

    fn params(kind: LayoutKind, geometry: GeometryKind) -> Parameters {
        Parameters {
            layout: LayoutParameters {
                kind,
                geometry,
                width: 16,
                length: 12,
                ..LayoutParameters::default()
            },
            ..Parameters::default()
        }
    }

    #[test]
    fn test_connect_path_reaches_target() {
        let geom = RectGeometry::new(10, 10, 1, 30.0);
        let mut g = VesselGraph::new();
        let edges = connect_path(&mut g, &geom, IVec3::new(0, 0, 0), IVec3::new(6, 3, 0), EdgeKind::Capillary, 4.0);
        assert_eq!(edges.len(), 6);
        let last = *edges.last().unwrap();
        assert_eq!(g[g[last].to].coord, IVec3::new(6, 3, 0));
    }

    #[test]
    fn test_upstream_motif_points_at_origin() {
        let geom = RectGeometry::new(10, 10, 1, 30.0);
        let mut g = VesselGraph::new();
        let origin = IVec3::new(9, 5, 0);
        let root = g.add_root(origin, 18.0);
        let edges = insert_motif(
            &mut g,
            &geom,
            origin,
            Border::Right,
            Motif::Tripod,
            Strategy::Upstream,
            EdgeKind::Vein,
            EdgeKind::Venule,
            4.0,
        );
        assert_eq!(edges.len(), 3);
        assert_eq!(g[edges[0]].to, root);
        assert_eq!(g[edges[0]].kind, EdgeKind::Vein);
        assert_eq!(g.in_degree(root), 1);
    }

    #[test]
    fn test_roots_layout_is_perfused() {
        for geometry in [GeometryKind::Rectangular, GeometryKind::Triangular] {
            let p = params(LayoutKind::Roots, geometry);
            let adapter = adapter_for(&p.layout);
            let layout = build_network(adapter.as_ref(), &p);
            let g = &layout.graph;
            assert_eq!(layout.arterial_roots.len(), 2);
            assert_eq!(layout.venous_roots.len(), 2);
            assert!(g.active_edge_count() > 0, "{:?}", geometry);
            for e in g.active_edge_ids() {
                let edge = &g[e];
                assert!(g[edge.from].pressure_mmHg >= g[edge.to].pressure_mmHg - 1e-6, "{:?}", geometry);
            }
            for &root in &layout.arterial_roots {
                assert!(g[root].pressure_mmHg >= p.hemodynamics.artery_pressure_mmHg);
            }
        }
    }

    #[test]
    fn test_root_edge_follows_murray() {
        let p = params(LayoutKind::Roots, GeometryKind::Rectangular);
        let adapter = adapter_for(&p.layout);
        let layout = build_network(adapter.as_ref(), &p);
        let g = &layout.graph;
        let root = layout.arterial_roots[0];
        let trunk = g.out_edges(root)[0];
        let junction = g[trunk].to;
        let branches: Vec<f64> = g.out_edges(junction).iter().map(|&e| g[e].radius_um).collect();
        assert_eq!(branches.len(), 2);
        let expected = murray_parent_radius(branches[0], branches[1]);
        assert!((g[trunk].radius_um - expected).abs() < 1e-9);
    }

    #[test]
    fn test_pattern_layout_roots_on_borders() {
        let p = params(LayoutKind::Pattern, GeometryKind::Rectangular);
        let adapter = adapter_for(&p.layout);
        let layout = build_network(adapter.as_ref(), &p);
        let g = &layout.graph;
        assert!(!layout.arterial_roots.is_empty());
        assert!(layout.arterial_roots.iter().all(|&r| g[r].coord.x == 0));
        assert!(layout.venous_roots.iter().all(|&r| g[r].coord.x == 15));
        assert!(g.active_edge_ids().all(|e| g[e].flow_um3_per_sec >= 0.0));
        assert!(!g.is_dirty());
    }
}
