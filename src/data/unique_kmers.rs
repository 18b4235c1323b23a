//! # Unique K-mers per Variant
//!
//! ## Role
//! Evidence container for a single variant: the k-mers that discriminate
//! between its alleles, their copy-number distributions, which haplotype path
//! carries which allele, and the local sequencing coverage.
//!
//! ## Lifecycle
//! Built by the `UniqueKmerComputer` through a burst of `insert_empty_allele`,
//! `insert_path` and `insert_kmer` calls, then read-only while the HMM borrows it.
//!
//! ## Invariants
//! - `kmer_to_copynumber.len()` is the number of unique k-mers; every index
//!   at or beyond it is rejected.
//! - Every allele referenced by a path must be registered before it is queried.

use std::collections::BTreeMap;
use std::fmt;

use crate::data::copy_number::CopyNumber;
use crate::data::kmer_path::{CopyNumberAssignment, KmerPath};
use crate::error::{Result, TyperError};

/// Unique k-mer evidence at one variant
#[derive(Clone, Debug)]
pub struct UniqueKmers {
    variant_pos: usize,
    alleles: BTreeMap<u8, KmerPath>,
    path_to_allele: BTreeMap<usize, u8>,
    kmer_to_copynumber: Vec<CopyNumber>,
    local_coverage: f64,
}

impl UniqueKmers {
    pub fn new(variant_pos: usize) -> Self {
        Self {
            variant_pos,
            alleles: BTreeMap::new(),
            path_to_allele: BTreeMap::new(),
            kmer_to_copynumber: Vec::new(),
            local_coverage: 0.0,
        }
    }

    pub fn get_variant_position(&self) -> usize {
        self.variant_pos
    }

    /// Register an allele without k-mers. Idempotent: an allele that already
    /// carries k-mers keeps them.
    pub fn insert_empty_allele(&mut self, allele_id: u8) {
        self.alleles.entry(allele_id).or_default();
    }

    /// Record the allele carried by a haplotype path.
    pub fn insert_path(&mut self, path_id: usize, allele_id: u8) {
        self.path_to_allele.insert(path_id, allele_id);
    }

    /// Append a unique k-mer present on every allele in `allele_ids`.
    pub fn insert_kmer(&mut self, copy_number: CopyNumber, allele_ids: &[u8]) {
        let index = self.kmer_to_copynumber.len();
        self.kmer_to_copynumber.push(copy_number);
        for &allele in allele_ids {
            self.alleles.entry(allele).or_default().set_position(index);
        }
    }

    fn allele_of(&self, path_id: usize) -> Result<u8> {
        self.path_to_allele
            .get(&path_id)
            .copied()
            .ok_or(TyperError::UnknownPath { path_id })
    }

    fn kmer_path(&self, allele_id: u8) -> Result<&KmerPath> {
        self.alleles
            .get(&allele_id)
            .ok_or(TyperError::UnknownAllele { allele_id })
    }

    fn check_index(&self, kmer_index: usize) -> Result<()> {
        if kmer_index < self.size() {
            Ok(())
        } else {
            Err(TyperError::KmerIndexOutOfRange {
                index: kmer_index,
                size: self.size(),
            })
        }
    }

    /// Whether the k-mer at `kmer_index` lies on the allele carried by `path_id`.
    pub fn kmer_on_path(&self, kmer_index: usize, path_id: usize) -> Result<bool> {
        let allele_id = self.allele_of(path_id)?;
        self.check_index(kmer_index)?;
        Ok(self.kmer_path(allele_id)?.get_position(kmer_index) > 0)
    }

    /// Expected copy numbers of all k-mers under the genotype `allele_id1/allele_id2`.
    pub fn combine_paths(&self, allele_id1: u8, allele_id2: u8) -> Result<CopyNumberAssignment> {
        let first = self.kmer_path(allele_id1)?;
        let second = self.kmer_path(allele_id2)?;
        Ok(first.combine(second, self.size()))
    }

    pub fn get_copynumber_of(&self, kmer_index: usize) -> Result<CopyNumber> {
        self.check_index(kmer_index)?;
        Ok(self.kmer_to_copynumber[kmer_index])
    }

    /// All copy-number distributions in k-mer index order
    pub fn copynumbers(&self) -> &[CopyNumber] {
        &self.kmer_to_copynumber
    }

    /// Number of unique k-mers at this variant
    pub fn size(&self) -> usize {
        self.kmer_to_copynumber.len()
    }

    /// Number of haplotype paths known here
    pub fn get_nr_paths(&self) -> usize {
        self.path_to_allele.len()
    }

    /// Append all (path, allele) pairs to `paths`/`alleles`.
    ///
    /// With `only_include`, pairs follow the order of the filter and path ids
    /// unknown at this variant are skipped.
    pub fn get_path_ids(
        &self,
        paths: &mut Vec<usize>,
        alleles: &mut Vec<u8>,
        only_include: Option<&[usize]>,
    ) {
        match only_include {
            Some(filter) => {
                for &path in filter {
                    if let Some(&allele) = self.path_to_allele.get(&path) {
                        paths.push(path);
                        alleles.push(allele);
                    }
                }
            }
            None => {
                for (&path, &allele) in &self.path_to_allele {
                    paths.push(path);
                    alleles.push(allele);
                }
            }
        }
    }

    /// Append every registered allele id, in ascending order.
    pub fn get_allele_ids(&self, alleles: &mut Vec<u8>) {
        alleles.extend(self.alleles.keys().copied());
    }

    /// Number of k-mers on each registered allele
    pub fn kmers_on_alleles(&self) -> BTreeMap<u8, usize> {
        self.alleles
            .iter()
            .map(|(&allele, path)| (allele, path.nr_kmers()))
            .collect()
    }

    pub fn set_coverage(&mut self, local_coverage: f64) {
        self.local_coverage = local_coverage;
    }

    pub fn get_coverage(&self) -> f64 {
        self.local_coverage
    }
}

impl fmt::Display for UniqueKmers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "UniqueKmers for variant: {}", self.variant_pos)?;
        for (i, cn) in self.kmer_to_copynumber.iter().enumerate() {
            writeln!(f, "{}: {}", i, cn)?;
        }
        writeln!(f, "alleles:")?;
        for (allele, path) in &self.alleles {
            writeln!(f, "{}\t{}", allele, path.convert_to_string(self.size()))?;
        }
        writeln!(f, "paths:")?;
        for (path, allele) in &self.path_to_allele {
            writeln!(f, "{} covers allele {}", path, allele)?;
        }
        Ok(())
    }
}
