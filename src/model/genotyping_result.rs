//! # Genotyping Results
//!
//! Per-variant output of the HMM: posterior probability of every unordered
//! allele pair and, when phasing ran, the phased allele and path pair.

use std::collections::BTreeMap;

/// Unordered allele pair, stored with the smaller allele first
pub type Genotype = (u8, u8);

/// Highest reported genotype quality (phred)
pub const MAX_GENOTYPE_QUALITY: f64 = 10_000.0;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenotypingResult {
    position: usize,
    genotype_likelihoods: BTreeMap<Genotype, f64>,
    haplotypes: Option<(u8, u8)>,
    haplotype_paths: Option<(usize, usize)>,
    nr_unique_kmers: usize,
    local_coverage: f64,
}

fn genotype(a1: u8, a2: u8) -> Genotype {
    (a1.min(a2), a1.max(a2))
}

impl GenotypingResult {
    pub fn new(position: usize, nr_unique_kmers: usize, local_coverage: f64) -> Self {
        Self {
            position,
            nr_unique_kmers,
            local_coverage,
            ..Default::default()
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn nr_unique_kmers(&self) -> usize {
        self.nr_unique_kmers
    }

    pub fn local_coverage(&self) -> f64 {
        self.local_coverage
    }

    /// Add probability mass to genotype `a1/a2` (order does not matter).
    pub fn add_to_likelihood(&mut self, a1: u8, a2: u8, value: f64) {
        *self.genotype_likelihoods.entry(genotype(a1, a2)).or_insert(0.0) += value;
    }

    /// Rescale the genotype likelihoods to sum to 1.
    pub fn normalize(&mut self) {
        let sum: f64 = self.genotype_likelihoods.values().sum();
        if sum > 0.0 {
            for v in self.genotype_likelihoods.values_mut() {
                *v /= sum;
            }
        }
    }

    pub fn get_genotype_likelihood(&self, a1: u8, a2: u8) -> f64 {
        self.genotype_likelihoods
            .get(&genotype(a1, a2))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn genotype_likelihoods(&self) -> &BTreeMap<Genotype, f64> {
        &self.genotype_likelihoods
    }

    /// Most probable genotype; the smallest allele pair wins ties.
    pub fn likeliest_genotype(&self) -> Option<Genotype> {
        let mut best: Option<(Genotype, f64)> = None;
        for (&gt, &p) in &self.genotype_likelihoods {
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((gt, p));
            }
        }
        best.map(|(gt, _)| gt)
    }

    /// Phred-scaled probability that `genotype` is wrong
    pub fn genotype_quality(&self, a1: u8, a2: u8) -> f64 {
        let error = 1.0 - self.get_genotype_likelihood(a1, a2);
        if error <= 0.0 {
            return MAX_GENOTYPE_QUALITY;
        }
        (-10.0 * error.log10()).clamp(0.0, MAX_GENOTYPE_QUALITY)
    }

    pub fn set_haplotypes(&mut self, alleles: (u8, u8), paths: (usize, usize)) {
        self.haplotypes = Some(alleles);
        self.haplotype_paths = Some(paths);
    }

    /// Phased alleles (first haplotype, second haplotype)
    pub fn get_haplotype(&self) -> Option<(u8, u8)> {
        self.haplotypes
    }

    /// Path ids chosen for the two haplotypes
    pub fn get_haplotype_paths(&self) -> Option<(usize, usize)> {
        self.haplotype_paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unordered_accumulation() {
        let mut r = GenotypingResult::new(5, 2, 10.0);
        r.add_to_likelihood(1, 0, 0.3);
        r.add_to_likelihood(0, 1, 0.3);
        r.add_to_likelihood(1, 1, 0.4);
        r.normalize();
        assert!((r.get_genotype_likelihood(0, 1) - 0.6).abs() < 1e-12);
        assert_eq!(r.likeliest_genotype(), Some((0, 1)));
        let sum: f64 = r.genotype_likelihoods().values().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_genotype_quality() {
        let mut r = GenotypingResult::new(5, 2, 10.0);
        r.add_to_likelihood(0, 0, 0.99);
        r.add_to_likelihood(0, 1, 0.01);
        assert!((r.genotype_quality(0, 0) - 20.0).abs() < 1e-6);
        assert_eq!(r.genotype_quality(2, 2), 0.0);
    }

    #[test]
    fn test_empty_result() {
        let r = GenotypingResult::new(5, 0, 0.0);
        assert_eq!(r.likeliest_genotype(), None);
        assert_eq!(r.get_haplotype(), None);
    }
}
