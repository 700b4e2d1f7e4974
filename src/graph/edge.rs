//! Vessel segments.
//!
//! Each edge is a cylindrical segment between two nodes. Units follow the
//! project convention of suffixing fields: μm for lengths, mmHg for pressure
//! and stress, μm³/s for flow.

use serde::{Deserialize, Serialize};

use super::NodeId;
use crate::state::LatticeCell;

/// Stable handle to an edge in the [`VesselGraph`](super::VesselGraph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Arena slot index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Vessel type.
///
/// The sign gives the direction of the pressure-vs-radius correlation:
/// arterial pressure rises with radius, venous pressure falls with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Artery,
    Arteriole,
    Capillary,
    Venule,
    Vein,
    Angiogenic,
}

impl EdgeKind {
    /// +1 for arterial types, -1 for venous types, 0 otherwise
    pub fn pressure_sign(self) -> f64 {
        match self {
            EdgeKind::Artery | EdgeKind::Arteriole => 1.0,
            EdgeKind::Vein | EdgeKind::Venule => -1.0,
            EdgeKind::Capillary | EdgeKind::Angiogenic => 0.0,
        }
    }

    pub fn is_arterial(self) -> bool {
        self.pressure_sign() > 0.0
    }

    pub fn is_venous(self) -> bool {
        self.pressure_sign() < 0.0
    }
}

/// Oxygen transport bookkeeping, consumed by the lattice coupling step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EdgeTransport {
    /// pO2 entering the segment (mmHg)
    pub inlet_po2_mmHg: f64,
    /// pO2 leaving the segment (mmHg)
    pub outlet_po2_mmHg: f64,
    /// Fraction of carried oxygen extracted along the segment
    pub extraction_fraction: f64,
    /// Oxygen delivered to tissue (amol/s)
    pub delivered_o2_amol_per_sec: f64,
}

/// A directed vessel segment.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Upstream node
    pub from: NodeId,
    /// Downstream node
    pub to: NodeId,
    /// Vessel type
    pub kind: EdgeKind,
    /// Spatial resolution level (0 = finest)
    pub level: u8,
    /// Lumen radius (μm)
    pub radius_um: f64,
    /// Segment length (μm)
    pub length_um: f64,
    /// Wall thickness (μm)
    pub wall_um: f64,
    /// Wall shear stress (mmHg)
    pub shear_mmHg: f64,
    /// Circumferential wall stress (mmHg)
    pub circumferential_stress_mmHg: f64,
    /// Volumetric flow (μm³/s)
    pub flow_um3_per_sec: f64,
    /// Lumen cross-sectional area (μm²)
    pub area_um2: f64,

    /// Logically pruned; kept in the arena for bookkeeping
    pub is_ignored: bool,
    /// Carries flow from a root
    pub is_perfused: bool,
    /// Traversal scratch
    pub is_visited: bool,
    /// Created by anastomosis
    pub is_anastomotic: bool,

    /// Lattice cells the segment passes through
    pub spanned_cells: Vec<LatticeCell>,
    /// Oxygen transport scalars
    pub transport: EdgeTransport,
}

impl Edge {
    /// Create a segment with undefined hemodynamics
    pub fn new(from: NodeId, to: NodeId, kind: EdgeKind, radius_um: f64, wall_um: f64, length_um: f64) -> Self {
        Self {
            from,
            to,
            kind,
            level: 0,
            radius_um,
            length_um,
            wall_um,
            shear_mmHg: f64::NAN,
            circumferential_stress_mmHg: f64::NAN,
            flow_um3_per_sec: f64::NAN,
            area_um2: std::f64::consts::PI * radius_um * radius_um,
            is_ignored: false,
            is_perfused: false,
            is_visited: false,
            is_anastomotic: false,
            spanned_cells: Vec::new(),
            transport: EdgeTransport::default(),
        }
    }

    /// Swap endpoints and flip direction-dependent quantities
    pub(crate) fn flip(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
        self.flow_um3_per_sec = -self.flow_um3_per_sec;
        std::mem::swap(&mut self.transport.inlet_po2_mmHg, &mut self.transport.outlet_po2_mmHg);
    }

    /// Endpoint opposite to `node`
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.from == node {
            self.to
        } else {
            self.from
        }
    }
}
