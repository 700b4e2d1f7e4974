//! Triangular lattice in doubled-x coordinates.
//!
//! Node (x, y) exists when x + y is even; its six neighbours sit at
//! (±2, 0) and (±1, ±1). Tissue cell (x/2, y) holds the node.

use glam::{DVec3, IVec3};

use super::{even_positions, Border, GeometryAdapter};
use crate::state::LatticeCell;

const TRI_DIRECTIONS: [IVec3; 6] = [
    IVec3::new(2, 0, 0),
    IVec3::new(1, 1, 0),
    IVec3::new(-1, 1, 0),
    IVec3::new(-2, 0, 0),
    IVec3::new(-1, -1, 0),
    IVec3::new(1, -1, 0),
];

/// Triangular tessellation
#[derive(Debug, Clone)]
pub struct TriGeometry {
    pub width: usize,
    pub length: usize,
    pub depth: usize,
    /// Distance between neighbouring nodes (μm)
    pub spacing_um: f64,
}

impl TriGeometry {
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

    /// Snap x onto the node parity of row y
    fn on_row(x: i32, y: i32) -> i32 {
        if (x + y).rem_euclid(2) == 0 {
            x
        } else {
            x + 1
        }
    }
}

impl GeometryAdapter for TriGeometry {
    fn directions(&self) -> &[IVec3] {
        &TRI_DIRECTIONS
    }

    fn in_bounds(&self, coord: IVec3) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && (coord.x as usize) < 2 * self.width
            && (coord.y as usize) < self.length
            && (coord.z as usize) < self.depth
            && (coord.x + coord.y) % 2 == 0
    }

    fn to_cartesian_um(&self, coord: IVec3) -> DVec3 {
        DVec3::new(
            0.5 * coord.x as f64 * self.spacing_um,
            0.5 * 3.0_f64.sqrt() * coord.y as f64 * self.spacing_um,
            coord.z as f64 * self.spacing_um,
        )
    }

    fn lattice_cell(&self, coord: IVec3) -> Option<LatticeCell> {
        self.in_bounds(coord)
            .then(|| LatticeCell::new(coord.z as usize, (coord.x / 2) as usize, coord.y as usize))
    }

    fn border_roots(&self, border: Border, count: usize) -> Vec<IVec3> {
        let z = self.plane();
        let (w, l) = (2 * self.width as i32, self.length as i32);
        match border {
            Border::Left => even_positions(l, count)
                .into_iter()
                .map(|y| IVec3::new(Self::on_row(0, y), y, z))
                .collect(),
            Border::Right => even_positions(l, count)
                .into_iter()
                .map(|y| IVec3::new(Self::on_row(w - 2, y), y, z))
                .collect(),
            Border::Bottom => even_positions(w, count)
                .into_iter()
                .map(|x| IVec3::new(Self::on_row(x, 0), 0, z))
                .collect(),
            Border::Top => even_positions(w, count)
                .into_iter()
                .map(|x| IVec3::new(Self::on_row(x, l - 1).min(w - 1), l - 1, z))
                .collect(),
        }
    }

    fn inward_direction(&self, border: Border) -> usize {
        match border {
            Border::Left => 0,
            Border::Right => 3,
            Border::Bottom => 1,
            Border::Top => 4,
        }
    }

    fn branch_directions(&self, border: Border) -> [usize; 2] {
        match border {
            Border::Left => [1, 5],
            Border::Right => [2, 4],
            Border::Bottom => [0, 2],
            Border::Top => [3, 5],
        }
    }

    fn unit_cell(&self) -> (IVec3, Vec<(IVec3, IVec3)>) {
        let z = self.plane();
        let p = |x: i32, y: i32| IVec3::new(x, y, z);
        let edges = vec![
            (p(0, 0), p(2, 0)),
            (p(2, 0), p(4, 0)),
            (p(2, 0), p(3, 1)),
            (p(3, 1), p(4, 2)),
        ];
        (IVec3::new(4, 2, 0), edges)
    }

    fn node_extent(&self) -> IVec3 {
        IVec3::new(2 * self.width as i32, self.length as i32, self.depth as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Motif;

    #[test]
    fn test_parity_bounds() {
        let geom = TriGeometry::new(6, 6, 1, 30.0);
        assert!(geom.in_bounds(IVec3::new(2, 0, 0)));
        assert!(geom.in_bounds(IVec3::new(3, 1, 0)));
        assert!(!geom.in_bounds(IVec3::new(3, 0, 0)));
        assert!(!geom.in_bounds(IVec3::new(12, 0, 0)));
    }

    #[test]
    fn test_all_neighbours_equidistant() {
        let geom = TriGeometry::new(6, 6, 1, 30.0);
        let origin = IVec3::new(4, 2, 0);
        for d in 0..geom.directions().len() {
            let length = geom.length_um(origin, geom.apply_offset(origin, d));
            assert!((length - 30.0).abs() < 1e-9, "direction {} length {}", d, length);
        }
    }

    #[test]
    fn test_roots_land_on_nodes() {
        let geom = TriGeometry::new(8, 9, 1, 30.0);
        for border in [Border::Left, Border::Right, Border::Bottom, Border::Top] {
            for root in geom.border_roots(border, 3) {
                assert!(geom.in_bounds(root), "{:?} root {:?}", border, root);
                for (a, b) in geom.motif(Motif::Tripod, root, border) {
                    assert!(geom.in_bounds(a) && geom.in_bounds(b), "{:?} motif edge {:?}->{:?}", border, a, b);
                }
            }
        }
    }

    #[test]
    fn test_lattice_cell_halves_x() {
        let geom = TriGeometry::new(6, 6, 1, 30.0);
        assert_eq!(geom.lattice_cell(IVec3::new(5, 1, 0)), Some(LatticeCell::new(0, 2, 1)));
    }
}
