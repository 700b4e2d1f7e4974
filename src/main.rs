//! Vessel Simulator X - Entry point
//!
//! Grows a vessel network in a synthetic tumour environment and reports
//! hemodynamic diagnostics.
//!
//! CLI Usage:
//!   cargo run                                   # Default roots layout, 100 steps
//!   cargo run -- --layout pattern --geometry tri
//!   cargo run -- --diagnose -n 20 --seed 7      # Per-step diagnostics

use std::time::Instant;

use anyhow::Result;
use vessel_simulator_x::{
    config::{GeometryKind, LayoutKind, Parameters},
    export::export_network_json,
    state::{AgentGrid, AgentKind, LatticeCell, LatticeField, TissueEnvironment},
    VascularSystem,
};

/// Command line options
struct Options {
    steps: usize,
    seed: Option<u64>,
    layout: Option<LayoutKind>,
    geometry: Option<GeometryKind>,
    export: bool,
    diagnose: bool,
}

/// Parse CLI arguments
fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        steps: 100,
        seed: None,
        layout: None,
        geometry: None,
        export: false,
        diagnose: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--diagnose" | "-d" => options.diagnose = true,
            "--export" | "-e" => options.export = true,
            "-n" | "--steps" => {
                i += 1;
                if i < args.len() {
                    options.steps = args[i].parse().unwrap_or(100);
                }
            }
            "-s" | "--seed" => {
                i += 1;
                if i < args.len() {
                    options.seed = args[i].parse().ok();
                }
            }
            "--layout" => {
                i += 1;
                options.layout = match args.get(i).map(String::as_str) {
                    Some("pattern") => Some(LayoutKind::Pattern),
                    Some("roots") => Some(LayoutKind::Roots),
                    other => {
                        eprintln!("Unknown layout {:?}, using configured layout", other);
                        None
                    }
                };
            }
            "--geometry" => {
                i += 1;
                options.geometry = match args.get(i).map(String::as_str) {
                    Some("rect") => Some(GeometryKind::Rectangular),
                    Some("tri") => Some(GeometryKind::Triangular),
                    other => {
                        eprintln!("Unknown geometry {:?}, using configured geometry", other);
                        None
                    }
                };
            }
            "--help" | "-h" => {
                println!("Vessel Simulator X");
                println!();
                println!("Usage: vessel-simulator-x [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --steps N              Number of ticks (default: 100)");
                println!("  -s, --seed S               Random seed (default: from parameters)");
                println!("  --layout pattern|roots     Initial network layout");
                println!("  --geometry rect|tri        Lattice tessellation");
                println!("  --export, -e               Write a JSON snapshot when done");
                println!("  --diagnose, -d             Print diagnostics every tick");
                println!("  --help, -h                 Show this help");
                std::process::exit(0);
            }
            other => eprintln!("Ignoring unknown argument {}", other),
        }
        i += 1;
    }

    options
}

/// Synthetic tumour: a malignant disc in the middle of the domain that is
/// hypoxic and secretes VEGF
struct Tissue {
    oxygen: LatticeField,
    vegf: LatticeField,
    agents: AgentGrid,
}

impl Tissue {
    fn new(params: &Parameters) -> Self {
        let layout = &params.layout;
        let (depth, width, length) = (layout.depth.max(1), layout.width, layout.length);
        let cx = width as f64 / 2.0;
        let cy = length as f64 / 2.0;
        let tumour_radius = (width.min(length) as f64 / 6.0).max(1.0);
        let distance = move |x: usize, y: usize| ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt();

        let vegf = LatticeField::from_fn(depth, width, length, |_, x, y| {
            (1.0 - distance(x, y) / (2.0 * tumour_radius + cx)).max(0.0)
        });
        let oxygen = LatticeField::from_fn(depth, width, length, |_, x, y| {
            if distance(x, y) <= tumour_radius {
                5.0
            } else {
                25.0
            }
        });

        let mut agents = AgentGrid::new();
        for z in 0..depth {
            for x in 0..width {
                for y in 0..length {
                    if distance(x, y) <= tumour_radius {
                        agents.insert(LatticeCell::new(z, x, y), AgentKind::Malignant);
                    }
                }
            }
        }

        Self { oxygen, vegf, agents }
    }

    fn environment(&self) -> TissueEnvironment<'_> {
        TissueEnvironment {
            oxygen_mmHg: &self.oxygen,
            vegf: &self.vegf,
            agents: &self.agents,
        }
    }
}

fn print_metrics(system: &VascularSystem) {
    let m = system.metrics();
    println!(
        "tick {:>4} | nodes {:>5} | edges {:>5} (+{} ignored) | perfused {:>5.1}% | inflow {:>10.3e} μm³/s | balance err {:.2e}",
        m.tick,
        m.node_count,
        m.active_edge_count,
        m.ignored_edge_count,
        100.0 * m.perfused_fraction(),
        m.arterial_inflow_um3_per_sec,
        m.mass_balance_error()
    );
    println!(
        "          | r̄ {:.2} μm | w̄ {:.2} μm | τ̄ {:.3e} mmHg | pO2 {:.1} mmHg | O2 {:.3e} amol/s | sprouts {} | anastomoses {} | removed {}",
        m.mean_radius_um,
        m.mean_wall_um,
        m.mean_shear_mmHg,
        m.mean_blood_po2_mmHg,
        m.oxygen_delivery_amol_per_sec,
        m.pending_sprouts,
        m.anastomoses,
        m.removed_edges
    );
}

fn main() -> Result<()> {
    env_logger::init();

    let options = parse_args();

    let mut params = Parameters::load_or_default();
    if let Some(seed) = options.seed {
        params.seed = seed;
    }
    if let Some(layout) = options.layout {
        params.layout.kind = layout;
    }
    if let Some(geometry) = options.geometry {
        params.layout.geometry = geometry;
    }

    println!("=== Vessel Simulator X ===\n");
    println!(
        "Lattice {}×{}×{} at {} μm, {:?} geometry, {:?} layout, seed {}",
        params.layout.width,
        params.layout.length,
        params.layout.depth,
        params.layout.spacing_um,
        params.layout.geometry,
        params.layout.kind,
        params.seed
    );

    let tissue = Tissue::new(&params);
    let mut system = VascularSystem::new(params)?;
    print_metrics(&system);

    let environment = tissue.environment();
    let start = Instant::now();
    for _ in 0..options.steps {
        let diagnostics = system.step(&environment);
        if options.diagnose {
            for (name, report) in &diagnostics.components {
                println!(
                    "  {:<12} +{} -{} ~{}",
                    name, report.added_edges, report.removed_edges, report.modified_edges
                );
            }
            println!(
                "  transport    resolved {} unresolved {} restarts {}",
                diagnostics.transport.resolved_edges,
                diagnostics.transport.unresolved_nodes,
                diagnostics.transport.restarts
            );
            print_metrics(&system);
        }
    }
    let elapsed = start.elapsed();

    println!("\n--- After {} ticks ({:.2?}) ---\n", options.steps, elapsed);
    print_metrics(&system);

    let skips = system.metrics().skips;
    println!("\nSkipped or rolled back: {}", skips.total());
    println!("  no arterial root   {}", skips.no_arterial_root);
    println!("  no venous root     {}", skips.no_venous_root);
    println!("  rebalance rollback {}", skips.rebalance_rollbacks);
    println!("  rejected cycles    {}", skips.rejected_cycles);
    println!("  rejected pressure  {}", skips.rejected_pressure);
    println!("  rejected overlap   {}", skips.rejected_overlap);
    println!("  transport removals {}", skips.transport_removals);

    let delivered: f64 = system.concentration_deltas().values().sum();
    println!("\nOxygen source into tissue: {:.3e} mM/s summed over cells", delivered);

    if options.export {
        let path = export_network_json(&system)?;
        println!("Snapshot written to {}", path.display());
    }

    Ok(())
}
