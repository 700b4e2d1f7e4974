//! Tissue environment surrounding the vessel network.
//!
//! Represents the external collaborators the vascular subsystem reads each
//! tick: lattice fields for oxygen and VEGF, and the cell agents occupying
//! lattice locations.

use std::collections::HashMap;

use super::lattice::{LatticeCell, LatticeField};

/// Cell agent type, as far as the vasculature cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    /// Normal tissue cell
    Healthy,
    /// Cancerous cell; degrades nearby vessel walls
    Malignant,
    /// Any other agent (immune cells, debris, ...)
    Other,
}

/// Read access to agents at lattice locations.
pub trait AgentLocator {
    /// Agent types present at a lattice cell
    fn agents_at(&self, cell: LatticeCell) -> &[AgentKind];

    /// At least one malignant agent sits in the cell
    fn has_malignant(&self, cell: LatticeCell) -> bool {
        self.agents_at(cell).contains(&AgentKind::Malignant)
    }
}

/// Sparse agent occupancy map
#[derive(Debug, Clone, Default)]
pub struct AgentGrid {
    cells: HashMap<LatticeCell, Vec<AgentKind>>,
}

impl AgentGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an agent in a cell
    pub fn insert(&mut self, cell: LatticeCell, kind: AgentKind) {
        self.cells.entry(cell).or_default().push(kind);
    }

    /// Remove all agents from a cell
    pub fn clear_cell(&mut self, cell: LatticeCell) {
        self.cells.remove(&cell);
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AgentLocator for AgentGrid {
    fn agents_at(&self, cell: LatticeCell) -> &[AgentKind] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Everything outside the graph that a vascular step reads
pub struct TissueEnvironment<'a> {
    /// Tissue oxygen partial pressure (mmHg)
    /// Reference: 20-40 mmHg in perfused tissue, <10 mmHg hypoxic
    /// Source: Vaupel et al., Cancer Res 1989
    pub oxygen_mmHg: &'a LatticeField,
    /// VEGF concentration (ng/mL)
    pub vegf: &'a LatticeField,
    /// Cell agents
    pub agents: &'a dyn AgentLocator,
}
