//! Periodic structural updates of the vessel network.
//!
//! Each component runs on its own tick interval against the shared graph
//! and leaves it with up-to-date hemodynamics: maintenance when topology
//! changed, a plain re-solve otherwise.

mod angiogenesis;
mod degradation;
mod remodeling;

pub use angiogenesis::{AngiogenesisComponent, Sprout};
pub use degradation::DegradationComponent;
pub use remodeling::RemodelingComponent;

use rand::rngs::StdRng;

use crate::geometry::GeometryAdapter;
use crate::graph::{EdgeId, VesselGraph};
use crate::hemodynamics::{GraphMaintenance, MaintenanceDiagnostics};
use crate::state::{NetworkMetrics, TissueEnvironment};

/// Everything a component may read or change during one step
pub struct StepContext<'a, 'e> {
    pub graph: &'a mut VesselGraph,
    pub geometry: &'a dyn GeometryAdapter,
    pub environment: &'a TissueEnvironment<'e>,
    pub maintenance: &'a GraphMaintenance,
    pub rng: &'a mut StdRng,
    pub metrics: &'a mut NetworkMetrics,
    pub tick: u64,
}

impl StepContext<'_, '_> {
    /// Remove an edge, leaving both endpoint pressures undefined
    pub fn remove_edge(&mut self, id: EdgeId) -> bool {
        if self.graph.get_edge(id).is_none() {
            return false;
        }
        self.graph.invalidate_endpoints(id);
        self.graph.remove_edge(id);
        self.metrics.removed_edges += 1;
        true
    }
}

/// What one component step did
#[derive(Debug, Clone, Default)]
pub struct ComponentReport {
    pub added_edges: usize,
    pub removed_edges: usize,
    pub modified_edges: usize,
    pub maintenance: Option<MaintenanceDiagnostics>,
}

impl ComponentReport {
    pub fn changed_topology(&self) -> bool {
        self.added_edges + self.removed_edges > 0
    }
}

/// A structural process acting on the network at a fixed interval
pub trait Component {
    fn name(&self) -> &'static str;

    /// Ticks between steps; 0 disables the component
    fn interval_ticks(&self) -> u64;

    fn is_due(&self, tick: u64) -> bool {
        let interval = self.interval_ticks();
        interval > 0 && tick % interval == 0
    }

    fn step(&mut self, ctx: &mut StepContext<'_, '_>) -> ComponentReport;
}
