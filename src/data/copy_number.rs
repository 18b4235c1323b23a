//! # Copy Number Distributions
//!
//! Per-k-mer probability distribution over the true copy number {0, 1, 2}.

use std::fmt;

use crate::error::{Result, TyperError};

/// Highest copy number modelled for a single k-mer in a diploid genome
pub const MAX_COPY_NUMBER: u8 = 2;

/// Immutable probabilities for copy numbers 0, 1 and 2, summing to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CopyNumber {
    probs: [f64; 3],
}

impl CopyNumber {
    /// Create a distribution from unnormalized, non-negative weights.
    pub fn new(p0: f64, p1: f64, p2: f64) -> Result<Self> {
        let probs = [p0, p1, p2];
        if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(TyperError::invalid_count(format!(
                "copy number probabilities must be finite and non-negative, got {p0} {p1} {p2}"
            )));
        }
        let sum: f64 = probs.iter().sum();
        if sum <= 0.0 {
            return Err(TyperError::invalid_count(
                "copy number probabilities are all zero",
            ));
        }
        Ok(Self {
            probs: probs.map(|p| p / sum),
        })
    }

    /// Create a distribution from log-weights, normalized with log-sum-exp.
    pub fn from_log_weights(log_weights: [f64; 3]) -> Result<Self> {
        if log_weights.iter().any(|w| w.is_nan() || *w == f64::INFINITY) {
            return Err(TyperError::invalid_count(format!(
                "copy number log-weights are not usable: {:?}",
                log_weights
            )));
        }
        let max = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return Err(TyperError::invalid_count(
                "copy number log-weights are all -inf",
            ));
        }
        let weights = log_weights.map(|w| (w - max).exp());
        Self::new(weights[0], weights[1], weights[2])
    }

    /// Probability of the given copy number; 0 for copy numbers above 2.
    #[inline]
    pub fn get_probability_of(&self, copy_number: u8) -> f64 {
        self.probs
            .get(copy_number as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Copy number with the highest probability (lowest on ties).
    pub fn most_likely(&self) -> u8 {
        let mut best = 0;
        for cn in 1..=MAX_COPY_NUMBER {
            if self.probs[cn as usize] > self.probs[best as usize] {
                best = cn;
            }
        }
        best
    }
}

impl fmt::Display for CopyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.probs[0], self.probs[1], self.probs[2])
    }
}
