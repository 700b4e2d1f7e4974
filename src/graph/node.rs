//! Vessel network nodes (branch points and segment joints).

use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Stable handle to a node in the [`VesselGraph`](super::VesselGraph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Arena slot index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the vessel network.
///
/// Pressure and oxygen are NaN while undefined (disconnected, freshly
/// invalidated, or not yet solved).
#[derive(Debug, Clone)]
pub struct Node {
    /// Position on the node lattice
    pub coord: IVec3,
    /// Boundary node with externally fixed pressure
    pub is_root: bool,
    /// Blood pressure (mmHg)
    pub pressure_mmHg: f64,
    /// Blood oxygen partial pressure (mmHg)
    pub oxygen_mmHg: f64,

    // Traversal scratch. Every traversal that reads these resets them first.
    /// Hop distance from the traversal start
    pub distance: u32,
    /// Edge used to reach this node during path search
    pub prev: Option<super::EdgeId>,
    /// Row of this node in the pressure system
    pub solve_index: Option<usize>,

    // Growth bookkeeping
    /// Direction index chosen for a sprout rooted here
    pub sprout_direction: Option<usize>,
    /// Node created or joined by anastomosis
    pub anastomosis: bool,
    /// Tick at which the node was added
    pub add_tick: u64,
    /// Tick of the last structural update touching this node
    pub last_update_tick: u64,
}

impl Node {
    /// Create an interior node at the given lattice coordinate
    pub fn new(coord: IVec3) -> Self {
        Self {
            coord,
            is_root: false,
            pressure_mmHg: f64::NAN,
            oxygen_mmHg: f64::NAN,
            distance: u32::MAX,
            prev: None,
            solve_index: None,
            sprout_direction: None,
            anastomosis: false,
            add_tick: 0,
            last_update_tick: 0,
        }
    }

    /// Pressure is a usable number (finite and non-zero)
    pub fn has_defined_pressure(&self) -> bool {
        self.pressure_mmHg.is_finite() && self.pressure_mmHg != 0.0
    }

    /// Mark pressure and oxygen undefined so the next solve recomputes them.
    /// Root pressures are boundary conditions and are left alone.
    pub fn invalidate(&mut self) {
        if !self.is_root {
            self.pressure_mmHg = f64::NAN;
        }
        self.oxygen_mmHg = f64::NAN;
    }

    pub(crate) fn reset_scratch(&mut self) {
        self.distance = u32::MAX;
        self.prev = None;
    }
}
