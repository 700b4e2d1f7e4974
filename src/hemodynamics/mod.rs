//! Network hemodynamics: pressure/flow solve, radius assignment,
//! topology maintenance and oxygen transport.

pub mod physics;

mod maintenance;
mod pressure;
mod radius;
mod transport;

pub use maintenance::{GraphMaintenance, MaintenanceDiagnostics};
pub use pressure::{DenseSystem, PressureFlowSolver, SolveDiagnostics};
pub use radius::{RadiusAssignmentEngine, RadiusBatch};
pub use transport::{OxygenTransport, TransportDiagnostics};
