//! Lattice geometry for the vessel network.
//!
//! The network lives on a node lattice laid over the tissue lattice. The
//! [`GeometryAdapter`] trait hides the tessellation: direction vectors,
//! offsets, bounds, the mapping to tissue cells, border root placement and
//! the motifs used to seed the network. Everything else in the crate only
//! talks to the trait.

mod layout;
mod rect;
mod tri;

pub use layout::{add_segment, build_network, connect_path, insert_motif, NetworkLayout};
pub use rect::RectGeometry;
pub use tri::TriGeometry;

use glam::{DVec3, IVec3};

use crate::config::{GeometryKind, LayoutParameters};
use crate::state::LatticeCell;

/// Lattice border used for root placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Border {
    Left,
    Right,
    Bottom,
    Top,
}

/// Small edge patterns inserted at roots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motif {
    /// One edge pointing inward
    Single,
    /// Two collinear edges pointing inward
    Double,
    /// One inward edge splitting into two branches
    Tripod,
}

/// Tessellation-specific lattice arithmetic
pub trait GeometryAdapter {
    /// Offsets to neighbouring nodes, indexed by direction
    fn directions(&self) -> &[IVec3];

    /// Node is inside the lattice
    fn in_bounds(&self, coord: IVec3) -> bool;

    /// Physical position of a node (μm)
    fn to_cartesian_um(&self, coord: IVec3) -> DVec3;

    /// Tissue cell containing a node
    fn lattice_cell(&self, coord: IVec3) -> Option<LatticeCell>;

    /// Evenly spaced root coordinates along a border
    fn border_roots(&self, border: Border, count: usize) -> Vec<IVec3>;

    /// Direction pointing from a border into the lattice
    fn inward_direction(&self, border: Border) -> usize;

    /// The two directions a tripod branches into from a border
    fn branch_directions(&self, border: Border) -> [usize; 2];

    /// Unit-cell edges tiled by the pattern layout, and the tile size in
    /// node coordinates
    fn unit_cell(&self) -> (IVec3, Vec<(IVec3, IVec3)>);

    /// Exclusive upper corner of node coordinates
    fn node_extent(&self) -> IVec3;

    /// Neighbour of `coord` along `direction`
    fn apply_offset(&self, coord: IVec3, direction: usize) -> IVec3 {
        coord + self.directions()[direction % self.directions().len()]
    }

    /// Direction index leading from `from` to the adjacent node `to`
    fn direction_between(&self, from: IVec3, to: IVec3) -> Option<usize> {
        self.directions().iter().position(|&d| from + d == to)
    }

    /// Segment length between two nodes (μm)
    fn length_um(&self, from: IVec3, to: IVec3) -> f64 {
        self.to_cartesian_um(from).distance(self.to_cartesian_um(to))
    }

    /// Tissue cells a segment passes through
    fn spanned_cells(&self, from: IVec3, to: IVec3) -> Vec<LatticeCell> {
        let mut cells: Vec<LatticeCell> = Vec::with_capacity(2);
        for coord in [from, to] {
            if let Some(cell) = self.lattice_cell(coord) {
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Edge coordinates of a motif rooted at `origin`, oriented away from it
    fn motif(&self, motif: Motif, origin: IVec3, border: Border) -> Vec<(IVec3, IVec3)> {
        let inward = self.inward_direction(border);
        let first = self.apply_offset(origin, inward);
        match motif {
            Motif::Single => vec![(origin, first)],
            Motif::Double => vec![(origin, first), (first, self.apply_offset(first, inward))],
            Motif::Tripod => {
                let [left, right] = self.branch_directions(border);
                vec![
                    (origin, first),
                    (first, self.apply_offset(first, left)),
                    (first, self.apply_offset(first, right)),
                ]
            }
        }
    }
}

/// Build the adapter named in the layout parameters
pub fn adapter_for(layout: &LayoutParameters) -> Box<dyn GeometryAdapter> {
    match layout.geometry {
        GeometryKind::Rectangular => Box::new(RectGeometry::new(layout.width, layout.length, layout.depth, layout.spacing_um)),
        GeometryKind::Triangular => Box::new(TriGeometry::new(layout.width, layout.length, layout.depth, layout.spacing_um)),
    }
}

/// Points evenly spaced strictly inside `0..extent`
pub(crate) fn even_positions(extent: i32, count: usize) -> Vec<i32> {
    (1..=count)
        .map(|i| (i as i64 * extent as i64 / (count as i64 + 1)) as i32)
        .collect()
}
