//! Rectangular lattice: one node per tissue cell, eight in-plane neighbours.

use glam::{DVec3, IVec3};

use super::{even_positions, Border, GeometryAdapter};
use crate::state::LatticeCell;

const RECT_DIRECTIONS: [IVec3; 8] = [
    IVec3::new(1, 0, 0),
    IVec3::new(1, 1, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(-1, 1, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(-1, -1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(1, -1, 0),
];

const EAST: usize = 0;
const NORTH_EAST: usize = 1;
const NORTH: usize = 2;
const NORTH_WEST: usize = 3;
const WEST: usize = 4;
const SOUTH_WEST: usize = 5;
const SOUTH: usize = 6;
const SOUTH_EAST: usize = 7;

/// Rectangular tessellation
#[derive(Debug, Clone)]
pub struct RectGeometry {
    pub width: usize,
    pub length: usize,
    pub depth: usize,
    /// Node spacing (μm)
    pub spacing_um: f64,
}

impl RectGeometry {
    pub fn new(width: usize, length: usize, depth: usize, spacing_um: f64) -> Self {
        Self {
            width,
            length,
            depth: depth.max(1),
            spacing_um,
        }
    }

    fn plane(&self) -> i32 {
        (self.depth / 2) as i32
    }
}

impl GeometryAdapter for RectGeometry {
    fn directions(&self) -> &[IVec3] {
        &RECT_DIRECTIONS
    }

    fn in_bounds(&self, coord: IVec3) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.length
            && (coord.z as usize) < self.depth
    }

    fn to_cartesian_um(&self, coord: IVec3) -> DVec3 {
        coord.as_dvec3() * self.spacing_um
    }

    fn lattice_cell(&self, coord: IVec3) -> Option<LatticeCell> {
        self.in_bounds(coord)
            .then(|| LatticeCell::new(coord.z as usize, coord.x as usize, coord.y as usize))
    }

    fn border_roots(&self, border: Border, count: usize) -> Vec<IVec3> {
        let z = self.plane();
        let (w, l) = (self.width as i32, self.length as i32);
        match border {
            Border::Left => even_positions(l, count).into_iter().map(|y| IVec3::new(0, y, z)).collect(),
            Border::Right => even_positions(l, count).into_iter().map(|y| IVec3::new(w - 1, y, z)).collect(),
            Border::Bottom => even_positions(w, count).into_iter().map(|x| IVec3::new(x, 0, z)).collect(),
            Border::Top => even_positions(w, count).into_iter().map(|x| IVec3::new(x, l - 1, z)).collect(),
        }
    }

    fn inward_direction(&self, border: Border) -> usize {
        match border {
            Border::Left => EAST,
            Border::Right => WEST,
            Border::Bottom => NORTH,
            Border::Top => SOUTH,
        }
    }

    fn branch_directions(&self, border: Border) -> [usize; 2] {
        match border {
            Border::Left => [NORTH_EAST, SOUTH_EAST],
            Border::Right => [NORTH_WEST, SOUTH_WEST],
            Border::Bottom => [NORTH_EAST, NORTH_WEST],
            Border::Top => [SOUTH_EAST, SOUTH_WEST],
        }
    }

    fn unit_cell(&self) -> (IVec3, Vec<(IVec3, IVec3)>) {
        let z = self.plane();
        let p = |x: i32, y: i32| IVec3::new(x, y, z);
        let edges = vec![
            (p(0, 0), p(1, 0)),
            (p(1, 0), p(2, 0)),
            (p(2, 0), p(3, 0)),
            (p(3, 0), p(4, 0)),
            (p(1, 0), p(2, 1)),
            (p(2, 1), p(3, 2)),
        ];
        (IVec3::new(4, 2, 0), edges)
    }

    fn node_extent(&self) -> IVec3 {
        IVec3::new(self.width as i32, self.length as i32, self.depth as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Motif;

    #[test]
    fn test_bounds_and_cells() {
        let geom = RectGeometry::new(10, 8, 1, 30.0);
        assert!(geom.in_bounds(IVec3::new(9, 7, 0)));
        assert!(!geom.in_bounds(IVec3::new(10, 0, 0)));
        assert!(!geom.in_bounds(IVec3::new(0, -1, 0)));
        assert_eq!(geom.lattice_cell(IVec3::new(3, 4, 0)), Some(LatticeCell::new(0, 3, 4)));
    }

    #[test]
    fn test_diagonal_length() {
        let geom = RectGeometry::new(10, 10, 1, 30.0);
        let straight = geom.length_um(IVec3::ZERO, IVec3::new(1, 0, 0));
        let diagonal = geom.length_um(IVec3::ZERO, IVec3::new(1, 1, 0));
        assert!((straight - 30.0).abs() < 1e-12);
        assert!((diagonal - 30.0 * 2.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_border_roots_and_tripod() {
        let geom = RectGeometry::new(12, 12, 1, 30.0);
        let roots = geom.border_roots(Border::Left, 2);
        assert_eq!(roots, vec![IVec3::new(0, 4, 0), IVec3::new(0, 8, 0)]);

        let edges = geom.motif(Motif::Tripod, roots[0], Border::Left);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0], (IVec3::new(0, 4, 0), IVec3::new(1, 4, 0)));
        assert_eq!(edges[1].1, IVec3::new(2, 5, 0));
        assert_eq!(edges[2].1, IVec3::new(2, 3, 0));
        assert!(edges.iter().all(|&(a, b)| geom.in_bounds(a) && geom.in_bounds(b)));
    }

    #[test]
    fn test_direction_between() {
        let geom = RectGeometry::new(5, 5, 1, 30.0);
        assert_eq!(geom.direction_between(IVec3::new(2, 2, 0), IVec3::new(1, 3, 0)), Some(NORTH_WEST));
        assert_eq!(geom.direction_between(IVec3::new(2, 2, 0), IVec3::new(4, 2, 0)), None);
    }
}
