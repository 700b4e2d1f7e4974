//! Vessel network graph.
//!
//! Nodes and edges live in arenas owned by [`VesselGraph`] and are addressed
//! by stable integer handles. Edges refer to their endpoints by handle and
//! the graph keeps per-node in/out adjacency lists, so there are no
//! reference cycles between nodes and edges.
//!
//! Degree queries and traversals only see *active* edges (not ignored).
//! Ignored edges stay in the arena until they are physically removed.

mod edge;
mod node;

pub use edge::{Edge, EdgeId, EdgeKind, EdgeTransport};
pub use node::{Node, NodeId};

use std::collections::{HashMap, VecDeque};
use std::ops::{Index, IndexMut};

use glam::IVec3;
use rand::seq::SliceRandom;
use rand::Rng;

/// Traversal direction relative to blood flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Against flow: from an edge to the edges feeding it
    Upstream,
    /// With flow: from an edge to the edges it feeds
    Downstream,
}

impl Strategy {
    /// Opposite direction
    pub fn reverse(self) -> Self {
        match self {
            Strategy::Upstream => Strategy::Downstream,
            Strategy::Downstream => Strategy::Upstream,
        }
    }

    /// Node reached by walking `edge` in this direction
    pub fn head(self, edge: &Edge) -> NodeId {
        match self {
            Strategy::Upstream => edge.from,
            Strategy::Downstream => edge.to,
        }
    }

    /// Node the walk along `edge` starts from
    pub fn tail(self, edge: &Edge) -> NodeId {
        self.reverse().head(edge)
    }
}

/// Directed multigraph of vessel segments.
#[derive(Debug, Clone, Default)]
pub struct VesselGraph {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    out_edges: Vec<Vec<EdgeId>>,
    in_edges: Vec<Vec<EdgeId>>,
    coord_index: HashMap<IVec3, NodeId>,
    /// Set by every mutation; cleared after a hemodynamic solve
    dirty: bool,
}

impl VesselGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // === Nodes ===

    /// Add an interior node, or return the node already at `coord`
    pub fn add_node(&mut self, coord: IVec3) -> NodeId {
        if let Some(&id) = self.coord_index.get(&coord) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node::new(coord)));
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        self.coord_index.insert(coord, id);
        self.dirty = true;
        id
    }

    /// Add a root node (or promote the node at `coord`) with a fixed pressure
    pub fn add_root(&mut self, coord: IVec3, pressure_mmHg: f64) -> NodeId {
        let id = self.add_node(coord);
        let node = &mut self[id];
        node.is_root = true;
        node.pressure_mmHg = pressure_mmHg;
        id
    }

    /// Node at a lattice coordinate
    pub fn find_node(&self, coord: IVec3) -> Option<NodeId> {
        self.coord_index.get(&coord).copied()
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    /// Live node handles in arena order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Root node handles
    pub fn root_ids(&self) -> Vec<NodeId> {
        self.node_ids().filter(|&id| self[id].is_root).collect()
    }

    fn remove_node_if_orphaned(&mut self, id: NodeId) {
        let orphaned = self.out_edges[id.index()].is_empty() && self.in_edges[id.index()].is_empty();
        if !orphaned {
            return;
        }
        if let Some(node) = self.nodes[id.index()].take() {
            self.coord_index.remove(&node.coord);
        }
    }

    // === Edges ===

    /// Insert an edge and register it in both endpoints' adjacency
    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.out_edges[edge.from.index()].push(id);
        self.in_edges[edge.to.index()].push(id);
        self.edges.push(Some(edge));
        self.dirty = true;
        id
    }

    /// Detach an edge from the graph and return it.
    ///
    /// Endpoints left without any edge are dropped unless they are roots.
    /// Hemodynamics are not recomputed here.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.get_mut(id.index())?.take()?;
        self.out_edges[edge.from.index()].retain(|&e| e != id);
        self.in_edges[edge.to.index()].retain(|&e| e != id);
        for end in [edge.from, edge.to] {
            if self.get_node(end).is_some_and(|n| !n.is_root) {
                self.remove_node_if_orphaned(end);
            }
        }
        self.dirty = true;
        Some(edge)
    }

    /// Reverse an edge in place, swapping its endpoints and flow sign
    pub fn reverse_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.get_mut(id.index()).and_then(|e| e.as_mut()) else {
            return;
        };
        let (from, to) = (edge.from, edge.to);
        edge.flip();
        self.out_edges[from.index()].retain(|&e| e != id);
        self.in_edges[to.index()].retain(|&e| e != id);
        self.out_edges[to.index()].push(id);
        self.in_edges[from.index()].push(id);
        self.dirty = true;
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index()).and_then(|e| e.as_ref())
    }

    /// Live edge handles, including ignored ones
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| EdgeId(i as u32))
    }

    /// Edge handles that are not ignored
    pub fn active_edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.as_ref().is_some_and(|e| !e.is_ignored))
            .map(|(i, _)| EdgeId(i as u32))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    pub fn active_edge_count(&self) -> usize {
        self.active_edge_ids().count()
    }

    /// Active edges in a freshly shuffled order
    pub fn shuffled_active_edges<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self.active_edge_ids().collect();
        ids.shuffle(rng);
        ids
    }

    // === Adjacency ===

    /// Active edges leaving `node`
    pub fn out_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.filter_active(&self.out_edges[node.index()])
    }

    /// Active edges entering `node`
    pub fn in_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.filter_active(&self.in_edges[node.index()])
    }

    /// Active edges touching `node` in either direction
    pub fn incident_edges(&self, node: NodeId) -> Vec<EdgeId> {
        let mut edges = self.in_edges(node);
        edges.extend(self.out_edges(node));
        edges
    }

    /// Active edges to follow from `node` when walking in `strategy`
    pub fn edges_along(&self, node: NodeId, strategy: Strategy) -> Vec<EdgeId> {
        match strategy {
            Strategy::Downstream => self.out_edges(node),
            Strategy::Upstream => self.in_edges(node),
        }
    }

    fn filter_active(&self, ids: &[EdgeId]) -> Vec<EdgeId> {
        ids.iter()
            .copied()
            .filter(|&e| self.get_edge(e).is_some_and(|e| !e.is_ignored))
            .collect()
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.out_edges(node).len()
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.in_edges(node).len()
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.in_degree(node) + self.out_degree(node)
    }

    /// An active edge runs `from -> to`
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.find_edge(from, to).is_some()
    }

    /// Active edge running `from -> to`
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.out_edges(from).into_iter().find(|&e| self[e].to == to)
    }

    /// Active edge between two nodes in either direction
    pub fn find_connection(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.find_edge(a, b).or_else(|| self.find_edge(b, a))
    }

    /// Set both endpoint pressures (and oxygen) to NaN
    pub fn invalidate_endpoints(&mut self, id: EdgeId) {
        let (from, to) = (self[id].from, self[id].to);
        self[from].invalidate();
        self[to].invalidate();
    }

    // === Traversal ===

    /// Reset node `distance`/`prev` and edge `is_visited` scratch fields.
    ///
    /// Required before [`shortest_path`](Self::shortest_path) and before any
    /// radius propagation that relies on `is_visited`.
    pub fn reset_traversal(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.reset_scratch();
        }
        for edge in self.edges.iter_mut().flatten() {
            edge.is_visited = false;
        }
    }

    /// Hop-count shortest path from `start` to `end` following active edges
    /// in `strategy` direction. Returns edges in walk order.
    pub fn shortest_path(&mut self, start: NodeId, end: NodeId, strategy: Strategy) -> Option<Vec<EdgeId>> {
        self.reset_traversal();
        if let Some(node) = self.node_untracked(start) {
            node.distance = 0;
        }
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == end {
                break;
            }
            let next_distance = self[current].distance + 1;
            for e in self.edges_along(current, strategy) {
                let head = strategy.head(&self[e]);
                if self[head].distance == u32::MAX {
                    if let Some(node) = self.node_untracked(head) {
                        node.distance = next_distance;
                        node.prev = Some(e);
                    }
                    queue.push_back(head);
                }
            }
        }

        if self[end].distance == u32::MAX {
            return None;
        }

        let mut path = Vec::new();
        let mut current = end;
        while current != start {
            let e = self[current].prev?;
            path.push(e);
            current = strategy.tail(&self[e]);
        }
        path.reverse();
        Some(path)
    }

    /// Node access for scratch and derived fields; does not mark the graph dirty
    pub(crate) fn node_untracked(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|n| n.as_mut())
    }

    /// Edge access for derived fields; does not mark the graph dirty
    pub(crate) fn edge_untracked(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id.index()).and_then(|e| e.as_mut())
    }

    /// A directed path exists from `start` to `end` along flow
    pub fn path_exists(&mut self, start: NodeId, end: NodeId) -> bool {
        start == end || self.shortest_path(start, end, Strategy::Downstream).is_some()
    }

    // === Bookkeeping ===

    /// Mutated since the last hemodynamic solve
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Flag the graph for re-solving
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Index<NodeId> for VesselGraph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.get_node(id)
            .unwrap_or_else(|| panic!("stale node handle {:?}", id))
    }
}

impl IndexMut<NodeId> for VesselGraph {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        self.dirty = true;
        self.nodes
            .get_mut(id.index())
            .and_then(|n| n.as_mut())
            .unwrap_or_else(|| panic!("stale node handle {:?}", id))
    }
}

impl Index<EdgeId> for VesselGraph {
    type Output = Edge;

    fn index(&self, id: EdgeId) -> &Edge {
        self.get_edge(id)
            .unwrap_or_else(|| panic!("stale edge handle {:?}", id))
    }
}

impl IndexMut<EdgeId> for VesselGraph {
    fn index_mut(&mut self, id: EdgeId) -> &mut Edge {
        self.dirty = true;
        self.edges
            .get_mut(id.index())
            .and_then(|e| e.as_mut())
            .unwrap_or_else(|| panic!("stale edge handle {:?}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn capillary(from: NodeId, to: NodeId) -> Edge {
        Edge::new(from, to, EdgeKind::Capillary, 4.0, 1.0, 30.0)
    }

    /// a -> b -> c, b -> d
    fn small_graph() -> (VesselGraph, [NodeId; 4], [EdgeId; 3]) {
        let mut g = VesselGraph::new();
        let a = g.add_root(IVec3::new(0, 0, 0), 89.0);
        let b = g.add_node(IVec3::new(1, 0, 0));
        let c = g.add_node(IVec3::new(2, 0, 0));
        let d = g.add_node(IVec3::new(1, 1, 0));
        let ab = g.add_edge(capillary(a, b));
        let bc = g.add_edge(capillary(b, c));
        let bd = g.add_edge(capillary(b, d));
        (g, [a, b, c, d], [ab, bc, bd])
    }

    #[test]
    fn test_add_node_reuses_coordinate() {
        let mut g = VesselGraph::new();
        let a = g.add_node(IVec3::new(3, 4, 0));
        let b = g.add_node(IVec3::new(3, 4, 0));
        assert_eq!(a, b);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_degrees() {
        let (g, [a, b, c, _], _) = small_graph();
        assert_eq!(g.out_degree(a), 1);
        assert_eq!(g.in_degree(b), 1);
        assert_eq!(g.out_degree(b), 2);
        assert_eq!(g.degree(b), 3);
        assert_eq!(g.degree(c), 1);
        assert!(g.has_edge(a, b));
        assert!(!g.has_edge(b, a));
    }

    #[test]
    fn test_ignored_edges_do_not_count() {
        let (mut g, [_, b, _, _], [_, bc, _]) = small_graph();
        g[bc].is_ignored = true;
        assert_eq!(g.out_degree(b), 1);
        assert_eq!(g.active_edge_count(), 2);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn test_remove_edge_drops_orphans() {
        let (mut g, [_, _, c, _], [_, bc, _]) = small_graph();
        let removed = g.remove_edge(bc).expect("edge present");
        assert_eq!(removed.to, c);
        assert!(g.get_node(c).is_none());
        assert!(g.find_node(IVec3::new(2, 0, 0)).is_none());
        assert!(g.remove_edge(bc).is_none());
    }

    #[test]
    fn test_reverse_edge_updates_adjacency() {
        let (mut g, [_, b, c, _], [_, bc, _]) = small_graph();
        g.reverse_edge(bc);
        assert!(g.has_edge(c, b));
        assert!(!g.has_edge(b, c));
        assert_eq!(g.out_degree(c), 1);
        assert_eq!(g.in_degree(b), 2);
    }

    #[test]
    fn test_shortest_path_directions() {
        let (mut g, [a, _, c, d], [ab, bc, _]) = small_graph();
        assert_eq!(g.shortest_path(a, c, Strategy::Downstream), Some(vec![ab, bc]));
        assert_eq!(g.shortest_path(c, a, Strategy::Upstream), Some(vec![bc, ab]));
        assert!(g.shortest_path(c, a, Strategy::Downstream).is_none());
        assert!(g.shortest_path(c, d, Strategy::Downstream).is_none());
        assert!(g.path_exists(a, d));
    }

    #[test]
    fn test_shuffle_is_reproducible() {
        let (g, _, _) = small_graph();
        let first = g.shuffled_active_edges(&mut StdRng::seed_from_u64(7));
        let second = g.shuffled_active_edges(&mut StdRng::seed_from_u64(7));
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_mutation_marks_dirty() {
        let (mut g, _, [ab, _, _]) = small_graph();
        g.mark_clean();
        assert!(!g.is_dirty());
        let _ = g[ab].radius_um;
        assert!(!g.is_dirty());
        g[ab].radius_um = 5.0;
        assert!(g.is_dirty());
    }
}
