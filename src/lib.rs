//! Vessel Simulator X - vascular network hemodynamics on a tissue lattice
//!
//! This library couples a directed vessel graph (pressure, flow, wall
//! stress, oxygen) with the structural processes that reshape it:
//! remodeling, tumour-driven degradation and sprouting angiogenesis.

// Allow non-snake-case for unit suffixes in field names (mM, mmHg, μm, etc.)
// This follows the project convention of including units in names.
#![allow(non_snake_case)]

pub mod components;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod graph;
pub mod hemodynamics;
pub mod simulation;
pub mod state;

pub use components::{AngiogenesisComponent, Component, DegradationComponent, RemodelingComponent};
pub use config::Parameters;
pub use error::{VascularError, VascularResult};
pub use geometry::{GeometryAdapter, RectGeometry, TriGeometry};
pub use graph::{Edge, EdgeId, EdgeKind, Node, NodeId, Strategy, VesselGraph};
pub use hemodynamics::{GraphMaintenance, OxygenTransport, PressureFlowSolver, RadiusAssignmentEngine};
pub use simulation::{StepDiagnostics, VascularSystem};
pub use state::{AgentGrid, LatticeField, NetworkMetrics, TissueEnvironment};
