//! State surrounding the vessel network.
//!
//! The tissue lattice fields and agents the network reads each tick, and
//! the metrics it reports.

mod environment;
mod lattice;
mod metrics;

pub use environment::{AgentGrid, AgentKind, AgentLocator, TissueEnvironment};
pub use lattice::{LatticeCell, LatticeField};
pub use metrics::{NetworkMetrics, SkipCounters};
