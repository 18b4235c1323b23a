//! # Variant Definitions
//!
//! A bubble in the pangenome graph: allele sequences, the reference flanks on
//! both sides, and the allele each haplotype path carries.

use crate::error::{Result, TyperError};

/// One variant site with its haplotype path assignment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    /// Genomic coordinate; variants of one chromosome are strictly increasing
    pub position: usize,
    /// Allele sequences, indexed by allele id
    pub alleles: Vec<Vec<u8>>,
    pub left_flank: Vec<u8>,
    pub right_flank: Vec<u8>,
    /// Allele carried by each haplotype path, indexed by path id; `None`
    /// when the path does not traverse this variant
    pub path_alleles: Vec<Option<u8>>,
}

impl Variant {
    pub fn new(
        position: usize,
        alleles: Vec<Vec<u8>>,
        left_flank: Vec<u8>,
        right_flank: Vec<u8>,
        path_alleles: Vec<Option<u8>>,
    ) -> Result<Self> {
        if alleles.is_empty() {
            return Err(TyperError::invalid_data(format!(
                "variant at position {position} has no alleles"
            )));
        }
        if alleles.len() > u8::MAX as usize + 1 {
            return Err(TyperError::invalid_data(format!(
                "variant at position {position} has {} alleles, at most 256 are supported",
                alleles.len()
            )));
        }
        if let Some(bad) = path_alleles
            .iter()
            .flatten()
            .copied()
            .find(|&a| a as usize >= alleles.len())
        {
            return Err(TyperError::UnknownAllele { allele_id: bad });
        }
        Ok(Self {
            position,
            alleles,
            left_flank,
            right_flank,
            path_alleles,
        })
    }

    pub fn n_alleles(&self) -> usize {
        self.alleles.len()
    }

    /// Number of path slots, including paths absent at this variant
    pub fn n_paths(&self) -> usize {
        self.path_alleles.len()
    }

    /// (path id, allele) for every path traversing this variant
    pub fn paths(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.path_alleles
            .iter()
            .enumerate()
            .filter_map(|(path, allele)| allele.map(|a| (path, a)))
    }

    /// Allele sequence padded with `k - 1` flank bases on each side, so that
    /// its k-mers are exactly those overlapping the allele.
    pub fn allele_window(&self, allele: u8, k: usize) -> Vec<u8> {
        let overlap = k.saturating_sub(1);
        let left = &self.left_flank[self.left_flank.len().saturating_sub(overlap)..];
        let right = &self.right_flank[..overlap.min(self.right_flank.len())];
        let seq = &self.alleles[allele as usize];
        let mut out = Vec::with_capacity(left.len() + seq.len() + right.len());
        out.extend_from_slice(left);
        out.extend_from_slice(seq);
        out.extend_from_slice(right);
        out
    }

    /// Allele ids carried by at least one path, ascending
    pub fn covered_alleles(&self) -> Vec<u8> {
        let mut covered: Vec<u8> = self.path_alleles.iter().flatten().copied().collect();
        covered.sort_unstable();
        covered.dedup();
        covered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_path_allele() {
        let err = Variant::new(
            10,
            vec![b"A".to_vec(), b"C".to_vec()],
            vec![],
            vec![],
            vec![Some(0), Some(2)],
        );
        assert!(matches!(err, Err(TyperError::UnknownAllele { allele_id: 2 })));
    }

    #[test]
    fn test_allele_window_and_coverage() {
        let v = Variant::new(
            10,
            vec![b"A".to_vec(), b"C".to_vec(), b"G".to_vec()],
            b"AATT".to_vec(),
            b"GGCC".to_vec(),
            vec![Some(2), Some(0), None, Some(2)],
        )
        .unwrap();
        assert_eq!(v.allele_window(1, 3), b"TTCGG".to_vec());
        assert_eq!(v.allele_window(1, 10), b"AATTCGGCC".to_vec());
        assert_eq!(v.covered_alleles(), vec![0, 2]);
        assert_eq!(v.n_paths(), 4);
        assert_eq!(v.paths().collect::<Vec<_>>(), vec![(0, 2), (1, 0), (3, 2)]);
    }
}
