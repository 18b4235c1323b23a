//! # Model Parameters
//!
//! ## Role
//! Hyperparameters of the recombination model that drives path switches
//! between neighbouring variants.
//!
//! ## Per-haplotype switch model
//! ```text
//! g = (pos_next - pos) * recomb_rate * 1e-6       genetic distance in cM
//! λ = 4 * recombination_scale * g / Ne            switch intensity
//! x = exp(-λ / n)                                  n = paths at the next variant
//!
//! P(stay on path)          = x + (1 - x) / n
//! P(switch to other path)  = (1 - x) / n
//! ```
//! Staying is never less likely than any single switch, and the switch
//! probability grows with distance and shrinks with `Ne`. A path that does not
//! continue at the next variant moves to every next path with `1 / n`.

use crate::error::{Result, TyperError};

/// Default recombination rate (cM per Mb)
pub const DEFAULT_RECOMB_RATE: f64 = 1.26;

/// Default (relative) effective population size
pub const DEFAULT_EFFECTIVE_POPULATION_SIZE: f64 = 1.0;

/// Default scaling of the switch intensity
pub const DEFAULT_RECOMBINATION_SCALE: f64 = 1.0;

/// Recombination model hyperparameters
#[derive(Clone, Debug, PartialEq)]
pub struct ModelParams {
    /// Recombination rate in cM per Mb
    pub recomb_rate: f64,
    /// Effective population size; smaller values favour switches
    pub effective_population_size: f64,
    /// Global factor on the switch intensity
    pub recombination_scale: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            recomb_rate: DEFAULT_RECOMB_RATE,
            effective_population_size: DEFAULT_EFFECTIVE_POPULATION_SIZE,
            recombination_scale: DEFAULT_RECOMBINATION_SCALE,
        }
    }
}

/// Switch probabilities of a single haplotype between two variants
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HaplotypeTransition {
    /// Probability of continuing on the same path
    pub stay: f64,
    /// Probability of switching to one specific other path
    pub switch: f64,
}

impl ModelParams {
    pub fn new(
        recomb_rate: f64,
        effective_population_size: f64,
        recombination_scale: f64,
    ) -> Result<Self> {
        if !(recomb_rate.is_finite() && recomb_rate >= 0.0) {
            return Err(TyperError::config(format!(
                "recombination rate must be finite and non-negative, got {recomb_rate}"
            )));
        }
        if !(effective_population_size.is_finite() && effective_population_size > 0.0) {
            return Err(TyperError::config(format!(
                "effective population size must be positive, got {effective_population_size}"
            )));
        }
        if !(recombination_scale.is_finite() && recombination_scale >= 0.0) {
            return Err(TyperError::config(format!(
                "recombination scale must be finite and non-negative, got {recombination_scale}"
            )));
        }
        Ok(Self {
            recomb_rate,
            effective_population_size,
            recombination_scale,
        })
    }

    /// Genetic distance in cM between two positions
    pub fn genetic_distance(&self, from_pos: usize, to_pos: usize) -> f64 {
        to_pos.abs_diff(from_pos) as f64 * self.recomb_rate * 1e-6
    }

    /// Expected number of path switches of one haplotype between the positions
    pub fn switch_intensity(&self, from_pos: usize, to_pos: usize) -> f64 {
        4.0 * self.recombination_scale * self.genetic_distance(from_pos, to_pos)
            / self.effective_population_size
    }

    /// Transition of one haplotype from `from_pos` onto one of `n_next` paths
    pub fn haplotype_transition(
        &self,
        from_pos: usize,
        to_pos: usize,
        n_next: usize,
    ) -> HaplotypeTransition {
        let n = n_next.max(1) as f64;
        let x = (-self.switch_intensity(from_pos, to_pos) / n).exp();
        let switch = (1.0 - x) / n;
        HaplotypeTransition {
            stay: x + switch,
            switch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_sum_to_one() {
        let params = ModelParams::default();
        for n in 1..6 {
            let t = params.haplotype_transition(1_000, 250_000, n);
            let row = t.stay + (n as f64 - 1.0) * t.switch;
            assert!((row - 1.0).abs() < 1e-12);
            assert!(t.stay >= t.switch);
        }
    }

    #[test]
    fn test_zero_distance_never_switches() {
        let t = ModelParams::default().haplotype_transition(500, 500, 3);
        assert_eq!(t.stay, 1.0);
        assert_eq!(t.switch, 0.0);
    }

    #[test]
    fn test_monotonic_in_distance_and_population_size() {
        let params = ModelParams::default();
        let near = params.haplotype_transition(0, 1_000, 4);
        let far = params.haplotype_transition(0, 1_000_000, 4);
        assert!(far.switch > near.switch);

        let small_ne = ModelParams::new(DEFAULT_RECOMB_RATE, 0.5, 1.0).unwrap();
        let large_ne = ModelParams::new(DEFAULT_RECOMB_RATE, 2.0, 1.0).unwrap();
        assert!(
            small_ne.haplotype_transition(0, 10_000, 4).switch
                > large_ne.haplotype_transition(0, 10_000, 4).switch
        );
    }

    #[test]
    fn test_validation() {
        assert!(ModelParams::new(-1.0, 1.0, 1.0).is_err());
        assert!(ModelParams::new(1.0, 0.0, 1.0).is_err());
        assert!(ModelParams::new(1.0, 1.0, f64::NAN).is_err());
    }
}
