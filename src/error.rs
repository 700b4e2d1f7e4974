//! Recoverable failure modes of the vascular subsystem.
//!
//! None of these are fatal to a simulation step. Callers catch them, log,
//! bump a skip counter and roll back whatever partial work they applied.

use thiserror::Error;

use crate::graph::{EdgeId, NodeId};

/// Errors raised inside structural and hemodynamic updates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VascularError {
    /// Bisection converged onto one of its search bounds, so no physical radius
    /// carries the requested flow.
    #[error("no radius in [{lower_um:.2e}, {upper_um:.2e}] μm carries target flow {target_flow:.4e} μm³/s")]
    RootNotBracketed {
        /// Lower search bound (μm)
        lower_um: f64,
        /// Upper search bound (μm)
        upper_um: f64,
        /// Flow the solver was asked to match (μm³/s)
        target_flow: f64,
    },

    /// No arterial root is reachable upstream of the node.
    #[error("no arterial root reachable upstream of node {0:?}")]
    NoArterialRoot(NodeId),

    /// No venous root is reachable downstream of the node.
    #[error("no venous root reachable downstream of node {0:?}")]
    NoVenousRoot(NodeId),

    /// Committing the connection would close a directed cycle.
    #[error("connecting {from:?} -> {to:?} would close a cycle")]
    CycleDetected {
        /// Proposed upstream end
        from: NodeId,
        /// Proposed downstream end
        to: NodeId,
    },

    /// A sprout chain runs through a node already carrying vessels.
    #[error("sprout chain passes through connected node {0:?}")]
    ChainOccupied(NodeId),

    /// Node already carries the maximum number of vessels.
    #[error("node {0:?} has no free vessel slot")]
    NodeSaturated(NodeId),

    /// One of the nodes involved has zero or NaN pressure.
    #[error("pressure undefined at node {0:?}")]
    UndefinedPressure(NodeId),

    /// Edge handle no longer refers to a live edge.
    #[error("edge {0:?} is not present in the graph")]
    MissingEdge(EdgeId),

    /// Lattice coordinate outside the geometry bounds.
    #[error("coordinate ({x}, {y}, {z}) is outside the lattice")]
    OutOfBounds {
        /// x coordinate
        x: i32,
        /// y coordinate
        y: i32,
        /// z coordinate
        z: i32,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used by fallible vascular operations.
pub type VascularResult<T> = Result<T, VascularError>;
