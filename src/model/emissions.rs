//! # Emission Probabilities
//!
//! Likelihood of the unique k-mer evidence at a variant under every pair of
//! haplotype paths. Path pairs carrying the same alleles share one genotype
//! likelihood, so values are computed once per allele pair:
//!
//! ```text
//! P(evidence | a1/a2) = Π_k  CopyNumber_k( copies of k on a1 + copies on a2 )
//! ```
//!
//! The matrix is rescaled so its best entry is 1; entries are floored to keep
//! every column able to carry probability mass.

use std::collections::HashMap;

use crate::data::UniqueKmers;
use crate::error::{Result, TyperError};

/// Smallest emission relative to the best pair of a variant
pub const EMISSION_FLOOR: f64 = 1e-250;

/// States and emissions of one variant
#[derive(Clone, Debug)]
pub struct ColumnEmissions {
    position: usize,
    paths: Vec<usize>,
    alleles: Vec<u8>,
    /// Row-major `n x n` over path indices
    probs: Vec<f64>,
}

impl ColumnEmissions {
    /// Emissions at one variant, optionally restricted to `only_paths`.
    pub fn new(unique_kmers: &UniqueKmers, only_paths: Option<&[usize]>) -> Result<Self> {
        let position = unique_kmers.get_variant_position();
        let mut paths = Vec::new();
        let mut alleles = Vec::new();
        unique_kmers.get_path_ids(&mut paths, &mut alleles, only_paths);
        if paths.is_empty() {
            return Err(TyperError::NoPaths { position });
        }

        let mut cache: HashMap<(u8, u8), f64> = HashMap::new();
        let n = paths.len();
        let mut log_probs = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                let key = (alleles[i].min(alleles[j]), alleles[i].max(alleles[j]));
                let value = match cache.get(&key) {
                    Some(&v) => v,
                    None => {
                        let v = genotype_log_likelihood(unique_kmers, key.0, key.1)?;
                        cache.insert(key, v);
                        v
                    }
                };
                log_probs[i * n + j] = value;
            }
        }

        let max = log_probs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let probs = log_probs
            .iter()
            .map(|&lp| {
                if max == f64::NEG_INFINITY {
                    1.0
                } else {
                    (lp - max).exp().max(EMISSION_FLOOR)
                }
            })
            .collect();

        Ok(Self {
            position,
            paths,
            alleles,
            probs,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Path ids of the states, in state order
    pub fn paths(&self) -> &[usize] {
        &self.paths
    }

    /// Allele carried by the path at state index `i`
    #[inline]
    pub fn allele(&self, i: usize) -> u8 {
        self.alleles[i]
    }

    pub fn n_paths(&self) -> usize {
        self.paths.len()
    }

    /// Emission of the ordered path pair `(i, j)`
    #[inline]
    pub fn prob(&self, i: usize, j: usize) -> f64 {
        self.probs[i * self.paths.len() + j]
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }
}

/// Log-likelihood of the k-mer evidence under genotype `a1/a2`. Variants
/// without local coverage carry no evidence.
pub fn genotype_log_likelihood(unique_kmers: &UniqueKmers, a1: u8, a2: u8) -> Result<f64> {
    if unique_kmers.get_coverage() <= 0.0 {
        return Ok(0.0);
    }
    let assignment = unique_kmers.combine_paths(a1, a2)?;
    Ok(unique_kmers
        .copynumbers()
        .iter()
        .zip(assignment.iter())
        .map(|(cn, copies)| cn.get_probability_of(copies).ln())
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CopyNumber;

    fn variant(coverage: f64) -> UniqueKmers {
        let mut uk = UniqueKmers::new(10);
        uk.insert_empty_allele(0);
        uk.insert_empty_allele(1);
        uk.insert_path(0, 0);
        uk.insert_path(1, 1);
        uk.insert_path(2, 1);
        uk.insert_kmer(CopyNumber::new(0.05, 0.9, 0.05).unwrap(), &[0]);
        uk.insert_kmer(CopyNumber::new(0.05, 0.9, 0.05).unwrap(), &[1]);
        uk.set_coverage(coverage);
        uk
    }

    #[test]
    fn test_heterozygous_pair_is_best() {
        let col = ColumnEmissions::new(&variant(10.0), None).unwrap();
        assert_eq!(col.n_paths(), 3);
        assert_eq!(col.prob(0, 1), 1.0);
        assert_eq!(col.prob(0, 1), col.prob(2, 0));
        assert!(col.prob(1, 2) < 0.1);
        assert!(col.prob(0, 0) < 0.1);
    }

    #[test]
    fn test_symmetric() {
        let col = ColumnEmissions::new(&variant(10.0), None).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(col.prob(i, j), col.prob(j, i));
            }
        }
    }

    #[test]
    fn test_uncovered_variant_is_uninformative() {
        let col = ColumnEmissions::new(&variant(0.0), None).unwrap();
        assert!(col.probs().iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_filter_and_missing_paths() {
        let col = ColumnEmissions::new(&variant(10.0), Some(&[2, 7])).unwrap();
        assert_eq!(col.paths(), &[2]);
        assert_eq!(col.allele(0), 1);
        assert!(matches!(
            ColumnEmissions::new(&variant(10.0), Some(&[7])),
            Err(TyperError::NoPaths { position: 10 })
        ));
        assert!(matches!(
            ColumnEmissions::new(&UniqueKmers::new(3), None),
            Err(TyperError::NoPaths { position: 3 })
        ));
    }
}
