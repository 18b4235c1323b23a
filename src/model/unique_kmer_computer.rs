//! # Unique K-mer Selection
//!
//! ## Role
//! Builds the ordered [`UniqueKmers`] sequence of one chromosome from the
//! genomic and read k-mer counts. This is the only producer of `UniqueKmers`.
//!
//! ## Selection
//! For every variant, the k-mers overlapping each allele (allele plus `k - 1`
//! flank bases on both sides) are collected. A k-mer is kept when
//! - its genomic count equals its number of occurrences over the variant's
//!   alleles, i.e. it occurs nowhere else in the genome,
//! - it occurs at most once per allele, and
//! - it lies on some, but not all, of the alleles carried by paths.
//!
//! ## Local coverage
//! Half the mean read count of the genome-unique k-mers inside the flanks
//! (flanks are present on both haplotypes). Without flank k-mers, half the
//! global abundance peak is used instead: the peak is the count of k-mers
//! shared by both haplotypes.

use std::collections::BTreeMap;

use tracing::{debug, instrument, warn};

use crate::data::kmer::{canonical_kmers, CanonicalKmer};
use crate::data::{UniqueKmers, Variant};
use crate::error::{Result, TyperError};
use crate::io::kmer_counts::KmerCounts;
use crate::io::variants::VariantSource;
use crate::model::copy_number::CopyNumberModel;

pub struct UniqueKmerComputer<'a> {
    genomic_kmers: &'a dyn KmerCounts,
    read_kmers: &'a dyn KmerCounts,
    variants: &'a dyn VariantSource,
    chromosome: String,
    kmer_abundance_peak: f64,
    kmer_size: usize,
}

impl<'a> UniqueKmerComputer<'a> {
    pub fn new(
        genomic_kmers: &'a dyn KmerCounts,
        read_kmers: &'a dyn KmerCounts,
        variants: &'a dyn VariantSource,
        chromosome: impl Into<String>,
        kmer_abundance_peak: f64,
    ) -> Result<Self> {
        let kmer_size = genomic_kmers.kmer_size();
        if read_kmers.kmer_size() != kmer_size {
            return Err(TyperError::config(format!(
                "k-mer sizes differ: genome {} vs reads {}",
                kmer_size,
                read_kmers.kmer_size()
            )));
        }
        if !(kmer_abundance_peak.is_finite() && kmer_abundance_peak > 0.0) {
            return Err(TyperError::invalid_count(format!(
                "k-mer abundance peak must be positive, got {kmer_abundance_peak}"
            )));
        }
        Ok(Self {
            genomic_kmers,
            read_kmers,
            variants,
            chromosome: chromosome.into(),
            kmer_abundance_peak,
            kmer_size,
        })
    }

    /// Unique k-mers of every variant on the chromosome, in position order.
    #[instrument(skip_all, fields(chrom = %self.chromosome))]
    pub fn compute_unique_kmers(&self) -> Result<Vec<UniqueKmers>> {
        let variants = self.variants.variants_of(&self.chromosome)?;
        let unique_kmers = variants
            .iter()
            .map(|v| self.unique_kmers_of(v))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            n_variants = unique_kmers.len(),
            n_kmers = unique_kmers.iter().map(UniqueKmers::size).sum::<usize>(),
            "computed unique k-mers"
        );
        Ok(unique_kmers)
    }

    fn unique_kmers_of(&self, variant: &Variant) -> Result<UniqueKmers> {
        let mut uk = UniqueKmers::new(variant.position);
        let covered = variant.covered_alleles();
        for &allele in &covered {
            uk.insert_empty_allele(allele);
        }
        for (path, allele) in variant.paths() {
            uk.insert_path(path, allele);
        }

        let coverage = self.local_coverage(variant);
        uk.set_coverage(coverage);
        let model = CopyNumberModel::new(if coverage > 0.0 {
            coverage
        } else {
            self.single_copy_peak()
        })?;

        // occurrences[kmer][allele] over all alleles of the variant
        let mut occurrences: BTreeMap<CanonicalKmer, BTreeMap<u8, u32>> = BTreeMap::new();
        for allele in 0..variant.n_alleles() {
            let window = variant.allele_window(allele as u8, self.kmer_size);
            for kmer in canonical_kmers(&window, self.kmer_size) {
                *occurrences
                    .entry(kmer)
                    .or_default()
                    .entry(allele as u8)
                    .or_insert(0) += 1;
            }
        }

        for (&kmer, per_allele) in &occurrences {
            if per_allele.values().any(|&n| n > 1) {
                continue;
            }
            let total: u64 = per_allele.values().map(|&n| n as u64).sum();
            if self.genomic_kmers.count(kmer) != total {
                continue;
            }
            let carriers: Vec<u8> = per_allele
                .keys()
                .copied()
                .filter(|a| covered.binary_search(a).is_ok())
                .collect();
            if carriers.is_empty() || carriers.len() == covered.len() {
                continue;
            }
            let copy_number = model.copy_number(self.read_kmers.count(kmer))?;
            uk.insert_kmer(copy_number, &carriers);
        }

        if uk.size() == 0 && covered.len() > 1 {
            debug!(position = variant.position, "no unique k-mers for variant");
        }
        Ok(uk)
    }

    /// Expected read count of a k-mer present on one haplotype, from the global peak
    fn single_copy_peak(&self) -> f64 {
        self.kmer_abundance_peak / 2.0
    }

    fn local_coverage(&self, variant: &Variant) -> f64 {
        let mut sum = 0u64;
        let mut n = 0u64;
        for flank in [&variant.left_flank, &variant.right_flank] {
            for kmer in canonical_kmers(flank, self.kmer_size) {
                if self.genomic_kmers.count(kmer) == 1 {
                    sum += self.read_kmers.count(kmer);
                    n += 1;
                }
            }
        }
        if n == 0 {
            return self.single_copy_peak();
        }
        let coverage = sum as f64 / n as f64 / 2.0;
        if coverage == 0.0 {
            warn!(position = variant.position, "no read k-mers in variant flanks");
        }
        coverage
    }
}
