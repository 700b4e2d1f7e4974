//! Vessel physics correlations.
//!
//! Poiseuille-type conductance with radius-dependent apparent viscosity,
//! wall stresses, and empirical wall-thickness and root-pressure
//! correlations.
//!
//! Units: μm, mmHg, s. Flow is μm³/s.
//!
//! References:
//! - Viscosity: Pries et al., Circ Res 1992 (in vitro, Hct 0.45)
//! - Murray's law: Murray, PNAS 1926; exponent 2.7 after Sherman, J Gen Physiol 1981
//! - Wall thickness: Pries et al., Am J Physiol 1998

use std::f64::consts::PI;

use crate::config::HemodynamicParameters;
use crate::graph::EdgeKind;

/// Smallest radius a vessel may have before it is removed (μm)
pub const MINIMUM_CAPILLARY_RADIUS_UM: f64 = 2.0;

/// Thinnest wall a vessel may have before it is removed (μm)
pub const MINIMUM_WALL_THICKNESS_UM: f64 = 0.5;

/// Wall thickness is clamped to this fraction of the radius
pub const MAXIMUM_WALL_RADIUS_FRACTION: f64 = 0.5;

/// Murray's law exponent, empirical
pub const MURRAY_EXPONENT: f64 = 2.7;

/// Lower bound of radius searches (μm)
pub const RADIUS_SEARCH_LOWER_UM: f64 = 1e-6;

/// Upper bound of radius searches as a multiple of the maximum radius
pub const RADIUS_SEARCH_UPPER_FACTOR: f64 = 5.0;

/// Relative apparent viscosity of blood in a tube of the given radius.
///
/// μ_rel = 220·e^(−1.3D) + 3.2 − 2.44·e^(−0.06·D^0.645), D in μm
pub fn relative_viscosity(radius_um: f64) -> f64 {
    let d = 2.0 * radius_um;
    220.0 * (-1.3 * d).exp() + 3.2 - 2.44 * (-0.06 * d.powf(0.645)).exp()
}

/// Apparent blood viscosity (mmHg·s)
pub fn viscosity_mmHg_s(radius_um: f64, plasma_viscosity_mmHg_s: f64) -> f64 {
    plasma_viscosity_mmHg_s * relative_viscosity(radius_um)
}

/// Hydraulic conductance π r⁴ / (8 μ(r) L) in μm³/(s·mmHg)
pub fn conductance(radius_um: f64, length_um: f64, plasma_viscosity_mmHg_s: f64) -> f64 {
    let mu = viscosity_mmHg_s(radius_um, plasma_viscosity_mmHg_s);
    PI * radius_um.powi(4) / (8.0 * mu * length_um)
}

/// Poiseuille flow for a pressure drop (μm³/s)
pub fn poiseuille_flow(radius_um: f64, length_um: f64, delta_pressure_mmHg: f64, plasma_viscosity_mmHg_s: f64) -> f64 {
    conductance(radius_um, length_um, plasma_viscosity_mmHg_s) * delta_pressure_mmHg
}

/// Wall shear stress r·|ΔP| / (2L) (mmHg)
pub fn shear_stress_mmHg(radius_um: f64, delta_pressure_mmHg: f64, length_um: f64) -> f64 {
    radius_um * delta_pressure_mmHg.abs() / (2.0 * length_um)
}

/// Laplace circumferential stress P·r / w (mmHg)
pub fn circumferential_stress_mmHg(mean_pressure_mmHg: f64, radius_um: f64, wall_um: f64) -> f64 {
    mean_pressure_mmHg * radius_um / wall_um
}

/// Lumen cross-sectional area (μm²)
pub fn lumen_area_um2(radius_um: f64) -> f64 {
    PI * radius_um * radius_um
}

/// Parent radius from two daughter radii: r_p^k = r_1^k + r_2^k
pub fn murray_parent_radius(r1_um: f64, r2_um: f64) -> f64 {
    (r1_um.powf(MURRAY_EXPONENT) + r2_um.powf(MURRAY_EXPONENT)).powf(1.0 / MURRAY_EXPONENT)
}

/// Daughter radius from the parent and its sibling. NaN when the sibling
/// already exceeds the parent.
pub fn murray_child_radius(parent_um: f64, sibling_um: f64) -> f64 {
    let remainder = parent_um.powf(MURRAY_EXPONENT) - sibling_um.powf(MURRAY_EXPONENT);
    if remainder <= 0.0 {
        return f64::NAN;
    }
    remainder.powf(1.0 / MURRAY_EXPONENT)
}

/// Radius of each of `n` equal daughters of a parent
pub fn murray_split_radius(parent_um: f64, n: usize) -> f64 {
    parent_um * (n.max(1) as f64).powf(-1.0 / MURRAY_EXPONENT)
}

/// Clamp wall thickness to the maximum wall/radius fraction
pub fn clamp_wall_um(wall_um: f64, radius_um: f64) -> f64 {
    wall_um.min(MAXIMUM_WALL_RADIUS_FRACTION * radius_um)
}

/// Initial wall thickness from diameter: w = D·(0.267 − 0.084·log₁₀ D)
pub fn initial_wall_thickness_um(radius_um: f64) -> f64 {
    let d = 2.0 * radius_um;
    let wall = d * (0.267 - 0.084 * d.log10());
    clamp_wall_um(wall.max(MINIMUM_WALL_THICKNESS_UM), radius_um)
}

/// Edge dimensions satisfy the removal thresholds
pub fn is_viable(radius_um: f64, wall_um: f64) -> bool {
    radius_um >= MINIMUM_CAPILLARY_RADIUS_UM && wall_um >= MINIMUM_WALL_THICKNESS_UM
}

/// Boundary pressure for a root whose feeding vessel has the given kind and
/// radius. Arterial pressure rises with radius, venous pressure falls.
pub fn root_pressure_mmHg(kind: EdgeKind, radius_um: f64, params: &HemodynamicParameters) -> f64 {
    let base = if kind.is_venous() {
        params.vein_pressure_mmHg
    } else {
        params.artery_pressure_mmHg
    };
    let ratio = (radius_um / params.capillary_radius_um).max(f64::MIN_POSITIVE);
    base + kind.pressure_sign() * params.root_pressure_slope_mmHg * ratio.ln()
}

/// Bisection for a root of `f` on `[lower, upper]`.
///
/// Returns the midpoint after the bracket shrinks below `tolerance` or
/// `max_iterations` halvings. When `f` has no sign change the result drifts
/// to whichever bound is closer to the root; callers detect failure by
/// comparing the result against the bounds.
pub fn bisect<F: Fn(f64) -> f64>(f: F, lower: f64, upper: f64, tolerance: f64, max_iterations: usize) -> f64 {
    let mut lo = lower;
    let mut hi = upper;
    let f_lo = f(lo);
    let increasing = f(hi) >= f_lo;

    for _ in 0..max_iterations {
        let mid = 0.5 * (lo + hi);
        let value = f(mid);
        if value == 0.0 {
            return mid;
        }
        if (value < 0.0) == increasing {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < tolerance {
            break;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viscosity_fahraeus_lindqvist() {
        // Apparent viscosity falls from large tubes toward ~7 μm, then rises again
        let large = relative_viscosity(100.0);
        let mid = relative_viscosity(3.5);
        let tiny = relative_viscosity(1.0);
        assert!(mid < large);
        assert!(tiny > mid);
        assert!(mid > 1.0);
    }

    #[test]
    fn test_conductance_scales_with_fourth_power() {
        let mu = 9.75e-6;
        let g1 = conductance(10.0, 100.0, mu);
        let g2 = conductance(20.0, 100.0, mu);
        let ratio = g2 / g1;
        // r⁴ gives 16; viscosity changes a little between the two sizes
        assert!(ratio > 12.0 && ratio < 20.0, "ratio {}", ratio);
        assert!((conductance(10.0, 50.0, mu) / g1 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_murray_parent_radius() {
        let parent = murray_parent_radius(4.0, 4.0);
        let expected = 4.0 * 2.0_f64.powf(1.0 / 2.7);
        assert!((parent - expected).abs() < 1e-6);
    }

    #[test]
    fn test_murray_child_inverts_parent() {
        let parent = murray_parent_radius(3.0, 5.0);
        assert!((murray_child_radius(parent, 5.0) - 3.0).abs() < 1e-9);
        assert!(murray_child_radius(4.0, 5.0).is_nan());
        assert!((murray_split_radius(parent_for_equal(4.0), 2) - 4.0).abs() < 1e-9);
    }

    fn parent_for_equal(r: f64) -> f64 {
        murray_parent_radius(r, r)
    }

    #[test]
    fn test_wall_thickness_within_limits() {
        for r in [2.0, 4.0, 10.0, 30.0, 100.0] {
            let w = initial_wall_thickness_um(r);
            assert!(w >= MINIMUM_WALL_THICKNESS_UM, "r={} w={}", r, w);
            assert!(w <= MAXIMUM_WALL_RADIUS_FRACTION * r + 1e-12, "r={} w={}", r, w);
        }
    }

    #[test]
    fn test_root_pressure_sign_convention() {
        let params = HemodynamicParameters::default();
        let a_small = root_pressure_mmHg(EdgeKind::Artery, 4.0, &params);
        let a_large = root_pressure_mmHg(EdgeKind::Artery, 8.0, &params);
        let v_small = root_pressure_mmHg(EdgeKind::Vein, 4.0, &params);
        let v_large = root_pressure_mmHg(EdgeKind::Vein, 8.0, &params);
        assert!((a_small - 89.0).abs() < 1e-12);
        assert!(a_large > a_small);
        assert!(v_large < v_small);
    }

    #[test]
    fn test_bisect_finds_root_and_pins_on_failure() {
        let root = bisect(|x| x * x - 2.0, 0.0, 4.0, 1e-12, 200);
        assert!((root - 2.0_f64.sqrt()).abs() < 1e-9);

        // No root in range: converges onto the upper bound
        let pinned = bisect(|x| x - 10.0, 0.0, 4.0, 1e-12, 200);
        assert!((pinned - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_stresses() {
        assert!((shear_stress_mmHg(4.0, -3.0, 30.0) - 0.2).abs() < 1e-12);
        assert!((circumferential_stress_mmHg(50.0, 4.0, 1.0) - 200.0).abs() < 1e-12);
    }
}
