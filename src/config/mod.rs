//! Configuration module for loading simulation parameters.
//!
//! Biological parameters include citations to their source publications.

mod parameters;

pub use parameters::{
    AngiogenesisParameters, DegradationParameters, DirectionPolicy, GeometryKind, HemodynamicParameters,
    LayoutKind, LayoutParameters, Parameters, RemodelingParameters, TransportParameters,
};
