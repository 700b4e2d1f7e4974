//! Parameter structures with citation metadata.
//!
//! Biological parameters carry their source citation. Empirical tuning
//! constants (scales, weights, intervals) are marked as such.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{VascularError, VascularResult};
use crate::hemodynamics::physics::MINIMUM_CAPILLARY_RADIUS_UM;

/// Top-level parameters container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    /// Seed for the shared random number generator
    #[serde(default)]
    pub seed: u64,
    /// Network layout and lattice geometry
    #[serde(default)]
    pub layout: LayoutParameters,
    /// Pressure/flow solve parameters
    #[serde(default)]
    pub hemodynamics: HemodynamicParameters,
    /// Blood oxygen transport
    #[serde(default)]
    pub transport: TransportParameters,
    /// Structural adaptation
    #[serde(default)]
    pub remodeling: RemodelingParameters,
    /// Tumour-driven wall degradation
    #[serde(default)]
    pub degradation: DegradationParameters,
    /// Sprouting angiogenesis
    #[serde(default)]
    pub angiogenesis: AngiogenesisParameters,
}

impl Parameters {
    /// Load parameters from `data/parameters/`, or use defaults if files don't exist
    pub fn load_or_default() -> Self {
        Self::load_from_dir("data/parameters")
    }

    /// Load parameters from a specific directory
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            seed: 0,
            layout: load_json_or_default(dir.join("layout.json"), "layout"),
            hemodynamics: load_json_or_default(dir.join("hemodynamics.json"), "hemodynamic"),
            transport: load_json_or_default(dir.join("transport.json"), "transport"),
            remodeling: load_json_or_default(dir.join("remodeling.json"), "remodeling"),
            degradation: load_json_or_default(dir.join("degradation.json"), "degradation"),
            angiogenesis: load_json_or_default(dir.join("angiogenesis.json"), "angiogenesis"),
        }
    }

    /// Reject values that would break the invariants of the network
    pub fn validate(&self) -> VascularResult<()> {
        let h = &self.hemodynamics;
        if h.capillary_radius_um < MINIMUM_CAPILLARY_RADIUS_UM {
            return Err(VascularError::Config(format!(
                "capillary radius {} μm is below the minimum {} μm",
                h.capillary_radius_um, MINIMUM_CAPILLARY_RADIUS_UM
            )));
        }
        if self.angiogenesis.sprout_radius_um < MINIMUM_CAPILLARY_RADIUS_UM {
            return Err(VascularError::Config(format!(
                "sprout radius {} μm is below the minimum {} μm",
                self.angiogenesis.sprout_radius_um, MINIMUM_CAPILLARY_RADIUS_UM
            )));
        }
        if h.artery_pressure_mmHg <= h.vein_pressure_mmHg {
            return Err(VascularError::Config(
                "arterial root pressure must exceed venous root pressure".into(),
            ));
        }
        if h.sor_omega <= 0.0 || h.sor_omega >= 2.0 {
            return Err(VascularError::Config(format!(
                "SOR relaxation factor {} outside (0, 2)",
                h.sor_omega
            )));
        }
        if self.layout.spacing_um <= 0.0 {
            return Err(VascularError::Config("lattice spacing must be positive".into()));
        }
        if self.remodeling.interval_ticks == 0
            || self.degradation.interval_ticks == 0
            || self.angiogenesis.interval_ticks == 0
        {
            return Err(VascularError::Config("component intervals must be at least one tick".into()));
        }
        Ok(())
    }
}

/// Load a parameter block from JSON, falling back to defaults
fn load_json_or_default<T, P>(path: P, label: &str) -> T
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    match std::fs::read_to_string(path.as_ref()) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(params) => {
                log::info!("Loaded {} parameters from {:?}", label, path.as_ref());
                params
            }
            Err(e) => {
                log::warn!("Failed to parse {} parameters: {}, using defaults", label, e);
                T::default()
            }
        },
        Err(_) => {
            log::info!("{} parameters file not found, using defaults", label);
            T::default()
        }
    }
}

/// Lattice tessellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Rectangular,
    Triangular,
}

/// How the initial network is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// Tiled unit-cell pattern spanning the domain
    Pattern,
    /// Tripod roots on opposite borders joined by capillaries
    Roots,
}

/// Network layout and lattice geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParameters {
    pub geometry: GeometryKind,
    pub kind: LayoutKind,
    /// Lattice cells along x
    pub width: usize,
    /// Lattice cells along y
    pub length: usize,
    /// Lattice planes along z
    pub depth: usize,
    /// Lattice spacing (μm)
    /// Reference: ~30 μm, roughly one tissue cell diameter
    pub spacing_um: f64,
    /// Arterial roots placed on the left border (roots layout)
    pub artery_roots: usize,
    /// Venous roots placed on the right border (roots layout)
    pub vein_roots: usize,
}

impl Default for LayoutParameters {
    fn default() -> Self {
        Self {
            geometry: GeometryKind::Rectangular,
            kind: LayoutKind::Roots,
            width: 24,
            length: 24,
            depth: 1,
            spacing_um: 30.0,
            artery_roots: 2,
            vein_roots: 2,
        }
    }
}

/// Pressure/flow solve parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HemodynamicParameters {
    /// Initial capillary radius (μm)
    /// Reference: capillary diameter 5-10 μm
    /// Source: Pries & Secomb, Am J Physiol 2005
    pub capillary_radius_um: f64,
    /// Largest radius an edge may reach (μm); bisection searches up to 5x this
    pub maximum_radius_um: f64,
    /// Arterial root pressure at capillary radius (mmHg)
    /// Source: Lipowsky, Microcirculation 2005 (mesentery pressure-diameter data)
    pub artery_pressure_mmHg: f64,
    /// Venous root pressure at capillary radius (mmHg)
    /// Source: Lipowsky, Microcirculation 2005
    pub vein_pressure_mmHg: f64,
    /// Root pressure change per e-fold of radius (mmHg), empirical
    pub root_pressure_slope_mmHg: f64,
    /// Plasma viscosity (mmHg·s)
    /// Reference: 1.3 mPa·s at 37°C
    /// Source: Késmárky et al., Clin Hemorheol Microcirc 2008
    pub plasma_viscosity_mmHg_s: f64,
    /// SOR relaxation factor, in (0, 2)
    pub sor_omega: f64,
    /// SOR convergence threshold on the largest pressure update (mmHg)
    pub sor_tolerance_mmHg: f64,
    /// Hard cap on SOR sweeps
    pub sor_max_iterations: usize,
    /// Cap on solve → reverse → flow cycles when negative flow persists
    pub max_solve_cycles: usize,
    /// Cap on prune/solve rounds inside graph maintenance
    pub max_maintenance_rounds: usize,
}

impl Default for HemodynamicParameters {
    fn default() -> Self {
        Self {
            // Pries & Secomb 2005
            capillary_radius_um: 4.0,
            maximum_radius_um: 30.0,

            // Lipowsky 2005
            artery_pressure_mmHg: 89.0,
            vein_pressure_mmHg: 18.0,
            root_pressure_slope_mmHg: 8.0,

            // Késmárky et al. 2008: 1.3e-3 Pa·s × 7.5006e-3 mmHg/Pa
            plasma_viscosity_mmHg_s: 9.75e-6,

            // Solver settings
            sor_omega: 1.5,
            sor_tolerance_mmHg: 1e-9,
            sor_max_iterations: 200_000,
            max_solve_cycles: 10,
            max_maintenance_rounds: 50,
        }
    }
}

/// Blood oxygen transport parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportParameters {
    /// Inlet pO2 at arterial roots (mmHg)
    /// Reference: 95-100 mmHg arterial
    /// Source: West, Respiratory Physiology, 2012
    pub arterial_po2_mmHg: f64,
    /// Plasma oxygen solubility (mM/mmHg)
    /// Source: Christoforides et al., J Appl Physiol 1969
    pub oxygen_solubility_mM_per_mmHg: f64,
    /// Haematocrit (volume fraction)
    /// Reference: 0.40-0.45
    pub hematocrit: f64,
    /// O2 binding capacity of packed red cells (mM)
    /// Reference: 4 sites × ~5 mM haemoglobin tetramer
    pub hemoglobin_capacity_mM: f64,
    /// Half-saturation pO2 (mmHg)
    /// Source: Roughton & Severinghaus, J Appl Physiol 1973
    pub p50_mmHg: f64,
    /// Hill coefficient
    /// Source: Imai, Allosteric Effects in Haemoglobin, 1982
    pub hill_coefficient: f64,
    /// Effective wall permeability to dissolved O2 (μm/s), empirical
    pub wall_permeability_um_per_sec: f64,
    /// Volume of one lattice cell (μm³)
    pub lattice_cell_volume_um3: f64,
    /// Restart attempts when propagation stalls
    pub max_propagation_restarts: usize,
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            // West 2012
            arterial_po2_mmHg: 100.0,
            // Christoforides et al. 1969
            oxygen_solubility_mM_per_mmHg: 1.35e-3,
            hematocrit: 0.45,
            hemoglobin_capacity_mM: 20.0,
            // Roughton & Severinghaus 1973; Imai 1982
            p50_mmHg: 26.8,
            hill_coefficient: 2.7,
            wall_permeability_um_per_sec: 3.0,
            lattice_cell_volume_um3: 27_000.0,
            max_propagation_restarts: 10,
        }
    }
}

/// Structural adaptation (remodeling) parameters, empirical
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemodelingParameters {
    pub interval_ticks: u64,
    /// Relative mid-wall radius change per unit stimulus
    pub radius_scale: f64,
    /// Relative wall area change per unit stimulus
    pub wall_scale: f64,
    /// Weight of the shear stimulus
    pub shear_weight: f64,
    /// Weight of the circumferential stress stimulus
    pub circumferential_weight: f64,
    /// Weight of the flow stimulus
    pub flow_weight: f64,
    /// Weight of the metabolic (oxygen gradient) stimulus
    pub metabolic_weight: f64,
}

impl Default for RemodelingParameters {
    fn default() -> Self {
        Self {
            interval_ticks: 60,
            radius_scale: 0.05,
            wall_scale: 0.05,
            shear_weight: 1.0,
            circumferential_weight: 0.5,
            flow_weight: 0.5,
            metabolic_weight: 0.5,
        }
    }
}

/// Tumour-driven degradation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationParameters {
    pub interval_ticks: u64,
    /// Wall thickness lost per interval next to malignant cells (μm)
    /// Reference: MMP-mediated basement membrane breakdown, empirical rate
    pub wall_loss_um: f64,
    /// Shear stress below which a thinned vessel collapses (mmHg)
    pub shear_threshold_mmHg: f64,
}

impl Default for DegradationParameters {
    fn default() -> Self {
        Self {
            interval_ticks: 60,
            wall_loss_um: 0.1,
            shear_threshold_mmHg: 0.05,
        }
    }
}

/// How a sprout picks its growth direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionPolicy {
    /// Uniformly among open directions
    Random,
    /// Weighted by normalised VEGF
    Biased,
    /// Strictly the highest-VEGF direction
    Deterministic,
}

/// Sprouting angiogenesis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AngiogenesisParameters {
    pub interval_ticks: u64,
    /// Node age before it may sprout (ticks)
    pub maturation_delay_ticks: u64,
    /// Mean VEGF over open directions that activates a sprout
    /// Reference: ~0.5 ng/mL bioactive VEGF-A threshold, empirical
    pub vegf_threshold: f64,
    /// Lattice steps sampled along each direction
    pub sample_depth: usize,
    /// Tip migration speed (μm/tick)
    /// Reference: ~10-50 μm/h endothelial tip migration
    /// Source: Gerhardt et al., J Cell Biol 2003
    pub migration_rate_um_per_tick: f64,
    /// Sprouts longer than this are abandoned (μm)
    pub max_sprout_length_um: f64,
    /// Radius of newly formed vessels (μm)
    pub sprout_radius_um: f64,
    pub direction_policy: DirectionPolicy,
}

impl Default for AngiogenesisParameters {
    fn default() -> Self {
        Self {
            interval_ticks: 1,
            maturation_delay_ticks: 120,
            vegf_threshold: 0.5,
            sample_depth: 3,
            migration_rate_um_per_tick: 5.0,
            max_sprout_length_um: 150.0,
            sprout_radius_um: 3.5,
            direction_policy: DirectionPolicy::Biased,
        }
    }
}
