//! JSON snapshot of the vessel network for external visualisation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use crate::graph::{EdgeKind, VesselGraph};
use crate::simulation::VascularSystem;
use crate::state::NetworkMetrics;

/// Non-finite values are written as `null`
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub id: u32,
    pub coord: [i32; 3],
    /// Cartesian position (μm)
    pub position_um: [f64; 3],
    pub is_root: bool,
    pub pressure_mmHg: Option<f64>,
    pub oxygen_mmHg: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeRecord {
    pub id: u32,
    pub from: u32,
    pub to: u32,
    pub kind: EdgeKind,
    pub radius_um: f64,
    pub wall_um: f64,
    pub length_um: f64,
    pub flow_um3_per_sec: Option<f64>,
    pub shear_mmHg: Option<f64>,
    pub is_perfused: bool,
    pub is_anastomotic: bool,
    pub delivered_o2_amol_per_sec: f64,
}

/// Full network export structure
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    /// Export timestamp
    pub exported_at: String,
    /// Export version for compatibility
    pub version: &'static str,
    pub tick: u64,
    pub metrics: NetworkMetrics,
    pub nodes: Vec<NodeRecord>,
    /// Active edges only
    pub edges: Vec<EdgeRecord>,
}

impl NetworkSnapshot {
    pub fn capture(system: &VascularSystem) -> Self {
        let graph = system.graph();
        let geometry = system.geometry();
        let nodes = graph
            .node_ids()
            .map(|id| {
                let node = &graph[id];
                let p = geometry.to_cartesian_um(node.coord);
                NodeRecord {
                    id: id.0,
                    coord: node.coord.to_array(),
                    position_um: p.to_array(),
                    is_root: node.is_root,
                    pressure_mmHg: finite(node.pressure_mmHg),
                    oxygen_mmHg: finite(node.oxygen_mmHg),
                }
            })
            .collect();

        Self {
            exported_at: Local::now().to_rfc3339(),
            version: "1.0.0",
            tick: system.tick(),
            metrics: system.metrics(),
            nodes,
            edges: edge_records(graph),
        }
    }
}

fn edge_records(graph: &VesselGraph) -> Vec<EdgeRecord> {
    graph
        .active_edge_ids()
        .map(|id| {
            let edge = &graph[id];
            EdgeRecord {
                id: id.0,
                from: edge.from.0,
                to: edge.to.0,
                kind: edge.kind,
                radius_um: edge.radius_um,
                wall_um: edge.wall_um,
                length_um: edge.length_um,
                flow_um3_per_sec: finite(edge.flow_um3_per_sec),
                shear_mmHg: finite(edge.shear_mmHg),
                is_perfused: edge.is_perfused,
                is_anastomotic: edge.is_anastomotic,
                delivered_o2_amol_per_sec: edge.transport.delivered_o2_amol_per_sec,
            }
        })
        .collect()
}

/// Export the current network to JSON
///
/// Creates the exports directory if it doesn't exist.
/// Filename is auto-generated with timestamp: `network_YYYYMMDD_HHMMSS.json`
pub fn export_network_json(system: &VascularSystem) -> Result<PathBuf> {
    let dir = PathBuf::from("exports");
    std::fs::create_dir_all(&dir)?;

    let filename = format!("network_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(filename);
    export_network_json_to(system, &path)?;
    Ok(path)
}

/// Export the current network to a specific file
pub fn export_network_json_to(system: &VascularSystem, path: &Path) -> Result<()> {
    let snapshot = NetworkSnapshot::capture(system);
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;

    log::info!(
        "Network exported: {} ({} nodes, {} edges)",
        path.display(),
        snapshot.nodes.len(),
        snapshot.edges.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameters;

    #[test]
    fn test_snapshot_lists_active_edges() {
        let mut params = Parameters::default();
        params.layout.width = 16;
        params.layout.length = 12;
        let system = VascularSystem::new(params).expect("valid parameters");
        let snapshot = NetworkSnapshot::capture(&system);

        assert_eq!(snapshot.nodes.len(), system.graph().node_count());
        assert_eq!(snapshot.edges.len(), system.graph().active_edge_count());

        let json = serde_json::to_value(&snapshot).expect("snapshot serializes");
        assert!(json["edges"].as_array().is_some_and(|e| !e.is_empty()));
        assert!(json["exported_at"].is_string());
    }
}
