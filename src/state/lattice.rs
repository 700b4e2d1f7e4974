//! Tissue lattice fields sampled by the vessel network.
//!
//! Fields are indexed `[z][x][y]`, matching the diffusion solver that owns
//! them. This subsystem only reads them.

use serde::{Deserialize, Serialize};

/// Index of one lattice cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LatticeCell {
    pub z: usize,
    pub x: usize,
    pub y: usize,
}

impl LatticeCell {
    pub fn new(z: usize, x: usize, y: usize) -> Self {
        Self { z, x, y }
    }
}

/// Scalar field over the tissue lattice (concentration or partial pressure)
#[derive(Debug, Clone)]
pub struct LatticeField {
    /// Number of planes
    pub depth: usize,
    /// Cells along x
    pub width: usize,
    /// Cells along y
    pub length: usize,
    values: Vec<Vec<Vec<f64>>>,
}

impl LatticeField {
    /// Field filled with a constant value
    pub fn uniform(depth: usize, width: usize, length: usize, value: f64) -> Self {
        Self {
            depth,
            width,
            length,
            values: vec![vec![vec![value; length]; width]; depth],
        }
    }

    /// Field initialised from a function of `(z, x, y)`
    pub fn from_fn<F: Fn(usize, usize, usize) -> f64>(depth: usize, width: usize, length: usize, f: F) -> Self {
        let values = (0..depth)
            .map(|z| (0..width).map(|x| (0..length).map(|y| f(z, x, y)).collect()).collect())
            .collect();
        Self {
            depth,
            width,
            length,
            values,
        }
    }

    pub fn contains(&self, cell: LatticeCell) -> bool {
        cell.z < self.depth && cell.x < self.width && cell.y < self.length
    }

    /// Value at a cell, or `None` outside the lattice
    pub fn get(&self, cell: LatticeCell) -> Option<f64> {
        self.values.get(cell.z)?.get(cell.x)?.get(cell.y).copied()
    }

    pub fn set(&mut self, cell: LatticeCell, value: f64) {
        if let Some(v) = self
            .values
            .get_mut(cell.z)
            .and_then(|plane| plane.get_mut(cell.x))
            .and_then(|row| row.get_mut(cell.y))
        {
            *v = value;
        }
    }

    /// Mean over the given cells, skipping any outside the lattice.
    /// NaN when none are inside.
    pub fn mean_over(&self, cells: &[LatticeCell]) -> f64 {
        let (sum, count) = cells
            .iter()
            .filter_map(|&c| self.get(c))
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }
}
