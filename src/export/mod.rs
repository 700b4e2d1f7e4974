//! Export functionality for network snapshots.

mod json_export;

pub use json_export::{export_network_json, export_network_json_to, EdgeRecord, NetworkSnapshot, NodeRecord};
