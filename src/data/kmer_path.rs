//! # K-mer Paths
//!
//! Per-allele membership of the unique k-mers at a variant, stored as a growable
//! bit vector. Two paths combine into a [`CopyNumberAssignment`], the expected
//! copy number of every k-mer under the diploid genotype formed by both alleles.

use std::ops::Add;

use bitvec::prelude::*;

/// Membership of unique k-mers on one allele
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KmerPath {
    kmers: BitVec<u64, Lsb0>,
}

impl KmerPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the k-mer at `index` as present on this allele.
    pub fn set_position(&mut self, index: usize) {
        if index >= self.kmers.len() {
            self.kmers.resize(index + 1, false);
        }
        self.kmers.set(index, true);
    }

    /// 1 if the k-mer at `index` lies on this allele, 0 otherwise.
    #[inline]
    pub fn get_position(&self, index: usize) -> u8 {
        self.kmers.get(index).map(|b| *b as u8).unwrap_or(0)
    }

    /// Number of k-mers marked on this allele
    pub fn nr_kmers(&self) -> usize {
        self.kmers.count_ones()
    }

    /// Membership rendered as a 0/1 string over `len` k-mers.
    pub fn convert_to_string(&self, len: usize) -> String {
        (0..len.max(self.kmers.len()))
            .map(|i| if self.get_position(i) > 0 { '1' } else { '0' })
            .collect()
    }

    /// Combine two alleles over the first `len` k-mers.
    pub fn combine(&self, other: &KmerPath, len: usize) -> CopyNumberAssignment {
        let copies = (0..len)
            .map(|i| self.get_position(i) + other.get_position(i))
            .collect();
        CopyNumberAssignment { copies }
    }
}

impl Add for &KmerPath {
    type Output = CopyNumberAssignment;

    fn add(self, other: &KmerPath) -> CopyNumberAssignment {
        let len = self.kmers.len().max(other.kmers.len());
        self.combine(other, len)
    }
}

/// Expected copy number (0, 1 or 2) of each unique k-mer under one genotype
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyNumberAssignment {
    copies: Vec<u8>,
}

impl CopyNumberAssignment {
    /// Expected copy number of the k-mer at `index`
    #[inline]
    pub fn get_position(&self, index: usize) -> u8 {
        self.copies.get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.copies.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_position_grows() {
        let mut path = KmerPath::new();
        path.set_position(4);
        assert_eq!(path.get_position(4), 1);
        assert_eq!(path.get_position(3), 0);
        assert_eq!(path.get_position(100), 0);
        assert_eq!(path.nr_kmers(), 1);
        assert_eq!(path.convert_to_string(6), "000010");
    }

    #[test]
    fn test_addition_counts_both_alleles() {
        let mut a = KmerPath::new();
        let mut b = KmerPath::new();
        a.set_position(0);
        a.set_position(1);
        b.set_position(1);
        b.set_position(2);

        let cn = &a + &b;
        assert_eq!(cn.iter().collect::<Vec<_>>(), vec![1, 2, 1]);
        assert_eq!(&a + &b, &b + &a);
    }

    #[test]
    fn test_combine_pads_to_len() {
        let mut a = KmerPath::new();
        a.set_position(0);
        let cn = a.combine(&KmerPath::new(), 3);
        assert_eq!(cn.len(), 3);
        assert_eq!(cn.get_position(2), 0);
        assert_eq!(cn.get_position(0), 1);
    }
}
