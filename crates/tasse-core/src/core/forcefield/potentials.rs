/// Empirical screening applied to the reaction-field electrostatic term.
pub const ELECTROSTATIC_SCREENING: f64 = 1.0 / 3.3;

/// Width of the angular Gaussian, `σ²` in `exp(-(1 + cosθ)² / σ²)`.
pub const HBOND_ANGULAR_SIGMA_SQ: f64 = 0.018;

/// Generalized reaction-field correction for the electrostatic term.
///
/// The constants are derived once from the dielectric constant and the
/// cutoff radius; `cutoff_sq` is the tighter of the electrostatic and the
/// hydrogen-bond length cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionField {
    pub crf_a: f64,
    pub crf_b: f64,
    pub cutoff_sq: f64,
}

impl ReactionField {
    pub fn new(dielectric: f64, radius: f64, hbond_max_length: f64) -> Self {
        let ce = (1.0 - dielectric) / (1.0 + 2.0 * dielectric);
        Self {
            crf_a: -ce / (radius * radius * radius),
            crf_b: (ce - 1.0) / radius,
            cutoff_sq: (radius * radius).min(hbond_max_length * hbond_max_length),
        }
    }

    /// Charge-charge term at distance `dist`. Not clamped near zero.
    #[inline]
    pub fn pair_energy(&self, q1: f64, q2: f64, dist: f64) -> f64 {
        let inv = 1.0 / dist;
        inv * q1 * q2 * (inv + self.crf_a * dist * dist + self.crf_b)
    }
}

/// Precomputed 12-6 coefficients for one (donor hydrogen, acceptor) code pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HBondPotential {
    pub r_min: f64,
    /// `Em * Rmin^12`
    pub a: f64,
    /// `2 * Em * Rmin^6`
    pub b: f64,
    /// Energy at and below `Rmin`, i.e. `-Em`.
    pub e: f64,
}

impl HBondPotential {
    pub fn new(r_min: f64, well_depth: f64) -> Self {
        let r6 = r_min.powi(6);
        Self {
            r_min,
            a: well_depth * r6 * r6,
            b: 2.0 * well_depth * r6,
            e: -well_depth,
        }
    }
}

/// Flat-bottomed 12-6 hydrogen bond potential.
#[inline]
pub fn hbond_12_6(dist: f64, params: &HBondPotential) -> f64 {
    if dist <= params.r_min {
        return params.e;
    }
    let ir6 = 1.0 / dist.powi(6);
    ir6 * (params.a * ir6 - params.b)
}

/// Angular modulation from the cosine of the Y···H-X angle.
///
/// A linear arrangement (`cos = -1`) yields 1.
#[inline]
pub fn angular_factor(cos_theta: f64) -> f64 {
    let shifted = 1.0 + cos_theta;
    (shifted * shifted / -HBOND_ANGULAR_SIGMA_SQ).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn hbond_12_6_is_flat_at_and_below_minimum() {
        let params = HBondPotential::new(2.0, 5.0);
        assert!(f64_approx_equal(hbond_12_6(2.0, &params), -5.0));
        assert!(f64_approx_equal(hbond_12_6(1.0, &params), -5.0));
    }

    #[test]
    fn hbond_12_6_decays_towards_zero_beyond_minimum() {
        let params = HBondPotential::new(2.0, 5.0);
        let near = hbond_12_6(2.2, &params);
        let far = hbond_12_6(4.0, &params);
        assert!(near < 0.0 && near > -5.0);
        assert!(far < 0.0 && far > near);
    }

    #[test]
    fn hbond_12_6_matches_closed_form() {
        let params = HBondPotential::new(2.0, 5.0);
        let rho6 = (2.0f64 / 3.0).powi(6);
        let expected = 5.0 * (rho6 * rho6 - 2.0 * rho6);
        assert!(f64_approx_equal(hbond_12_6(3.0, &params), expected));
    }

    #[test]
    fn zero_parameters_yield_zero_energy() {
        let params = HBondPotential::default();
        assert!(f64_approx_equal(hbond_12_6(2.5, &params), 0.0));
    }

    #[test]
    fn angular_factor_peaks_for_linear_geometry() {
        assert!(f64_approx_equal(angular_factor(-1.0), 1.0));
        assert!(angular_factor(0.0) < 1e-20);
        assert!(angular_factor(-0.9) < 1.0);
    }

    #[test]
    fn reaction_field_uses_tighter_cutoff() {
        let rf = ReactionField::new(80.0, 15.0, 4.5);
        assert!(f64_approx_equal(rf.cutoff_sq, 20.25));
        let rf = ReactionField::new(80.0, 3.0, 4.5);
        assert!(f64_approx_equal(rf.cutoff_sq, 9.0));
    }

    #[test]
    fn reaction_field_vanishes_at_cutoff_in_vacuum() {
        let rf = ReactionField::new(1.0, 10.0, 20.0);
        assert!(f64_approx_equal(rf.crf_a, 0.0));
        assert!(f64_approx_equal(rf.crf_b, -0.1));
        assert!(f64_approx_equal(rf.pair_energy(1.0, 1.0, 10.0), 0.0));
        assert!(f64_approx_equal(rf.pair_energy(1.0, -1.0, 2.0), -0.2));
    }
}
