//! # Copy Number Model
//!
//! Turns an observed read k-mer count into a [`CopyNumber`] distribution:
//!
//! ```text
//! cn 0: geometric error tail  (1 - q) * q^count
//! cn 1: Poisson(count; c)
//! cn 2: Poisson(count; 2c)       c = expected count of a single-copy k-mer
//! ```
//! The three terms are combined in log space so very large counts cannot
//! underflow into an all-zero distribution.
//!
//! Counts above `2c + 3·sqrt(2c)` are evaluated at that bound. The geometric
//! tail decays more slowly than Poisson(2c), so without the bound a k-mer seen
//! far more often than two copies explain would look absent.

use statrs::distribution::{Discrete, Poisson};

use crate::data::CopyNumber;
use crate::error::{Result, TyperError};

/// Decay of the sequencing-error count distribution
pub const DEFAULT_ERROR_DECAY: f64 = 0.1;

/// Standard deviations of Poisson(2c) above its mean where counts are clamped
const MAX_COUNT_SD: f64 = 3.0;

#[derive(Clone, Debug)]
pub struct CopyNumberModel {
    single_copy_coverage: f64,
    error_decay: f64,
    max_count: u64,
    single_copy: Poisson,
    double_copy: Poisson,
}

impl CopyNumberModel {
    pub fn new(single_copy_coverage: f64) -> Result<Self> {
        Self::with_error_decay(single_copy_coverage, DEFAULT_ERROR_DECAY)
    }

    pub fn with_error_decay(single_copy_coverage: f64, error_decay: f64) -> Result<Self> {
        if !(single_copy_coverage.is_finite() && single_copy_coverage > 0.0) {
            return Err(TyperError::invalid_count(format!(
                "single copy coverage must be positive and finite, got {single_copy_coverage}"
            )));
        }
        if !(error_decay > 0.0 && error_decay < 1.0) {
            return Err(TyperError::invalid_count(format!(
                "error decay must be in (0, 1), got {error_decay}"
            )));
        }
        let poisson = |lambda: f64| {
            Poisson::new(lambda).map_err(|e| TyperError::invalid_count(e.to_string()))
        };
        let double = 2.0 * single_copy_coverage;
        Ok(Self {
            single_copy_coverage,
            error_decay,
            max_count: (double + MAX_COUNT_SD * double.sqrt()).ceil() as u64,
            single_copy: poisson(single_copy_coverage)?,
            double_copy: poisson(2.0 * single_copy_coverage)?,
        })
    }

    pub fn single_copy_coverage(&self) -> f64 {
        self.single_copy_coverage
    }

    /// Copy-number distribution of a k-mer observed `count` times
    pub fn copy_number(&self, count: u64) -> Result<CopyNumber> {
        let count = count.min(self.max_count);
        let q = self.error_decay;
        let error = (1.0 - q).ln() + count as f64 * q.ln();
        CopyNumber::from_log_weights([
            error,
            self.single_copy.ln_pmf(count),
            self.double_copy.ln_pmf(count),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distributions_sum_to_one() {
        let model = CopyNumberModel::new(15.0).unwrap();
        for count in [0u64, 1, 5, 15, 30, 45, 200, 100_000] {
            let cn = model.copy_number(count).unwrap();
            let sum: f64 = (0..=2).map(|c| cn.get_probability_of(c)).sum();
            assert!((sum - 1.0).abs() < 1e-6, "count {count}: sum {sum}");
            assert!((0..=2).all(|c| cn.get_probability_of(c) >= 0.0));
        }
    }

    #[test]
    fn test_most_likely_copy_number_follows_count() {
        let model = CopyNumberModel::new(20.0).unwrap();
        assert_eq!(model.copy_number(0).unwrap().most_likely(), 0);
        assert_eq!(model.copy_number(20).unwrap().most_likely(), 1);
        assert_eq!(model.copy_number(40).unwrap().most_likely(), 2);
    }

    #[test]
    fn test_counts_above_two_copies_stay_two_copies() {
        for coverage in [0.5, 1.0, 5.0, 10.0, 20.0, 37.5] {
            let model = CopyNumberModel::new(coverage).unwrap();
            let start = (2.0 * coverage).ceil() as u64;
            for count in (start..=2_000).chain([10_000, 1_000_000]) {
                let cn = model.copy_number(count).unwrap();
                assert_eq!(cn.most_likely(), 2, "coverage {coverage}, count {count}");
            }
        }
    }

    #[test]
    fn test_rejects_degenerate_coverage() {
        assert!(CopyNumberModel::new(0.0).is_err());
        assert!(CopyNumberModel::new(f64::NAN).is_err());
        assert!(CopyNumberModel::new(-3.0).is_err());
        assert!(CopyNumberModel::with_error_decay(10.0, 1.0).is_err());
    }
}
