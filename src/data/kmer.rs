//! # K-mer Helpers
//!
//! Canonical k-mers packed two bits per base into a `u64` (A=0, C=1, G=2,
//! T=3, first base in the highest bits), so k is limited to 32. The packed
//! order equals the lexicographic order of the bases, and the canonical value
//! is the smaller of the forward and reverse-complement encodings.
//!
//! K-mers containing anything other than A/C/G/T are skipped.

#[inline]
fn base_to_bits(b: u8) -> Option<u64> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline]
fn complement_bits(bits: u64) -> u64 {
    3 - bits
}

#[inline]
fn mask_of(k: usize) -> u64 {
    if k >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * k)) - 1
    }
}

/// Reverse complement of a packed k-mer of length `k`
fn reverse_complement_bits(mut fw: u64, k: usize) -> u64 {
    let mut rc = 0u64;
    for _ in 0..k {
        rc = (rc << 2) | complement_bits(fw & 3);
        fw >>= 2;
    }
    rc
}

/// A canonical k-mer packed into a `u64`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKmer(u64);

impl CanonicalKmer {
    /// Canonical form of a packed k-mer of length `k`.
    #[inline]
    pub fn from_packed(fw: u64, k: usize) -> Self {
        let fw = fw & mask_of(k);
        Self(fw.min(reverse_complement_bits(fw, k)))
    }

    /// Canonical k-mer of `bases`; `None` for non-ACGT bases or more than 32 bases.
    pub fn from_bases(bases: &[u8]) -> Option<Self> {
        if bases.is_empty() || bases.len() > 32 {
            return None;
        }
        let mut fw = 0u64;
        for &b in bases {
            fw = (fw << 2) | base_to_bits(b)?;
        }
        Some(Self::from_packed(fw, bases.len()))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Canonical form of the `len` bases starting at `start`, for a k-mer of length `k`.
    pub fn infix(self, k: usize, start: usize, len: usize) -> Self {
        let shift = 2 * (k - start - len);
        Self::from_packed(self.0 >> shift, len)
    }

    /// Uppercase bases of the k-mer
    pub fn to_bases(self, k: usize) -> Vec<u8> {
        (0..k)
            .rev()
            .map(|i| b"ACGT"[((self.0 >> (2 * i)) & 3) as usize])
            .collect()
    }
}

impl std::fmt::Debug for CanonicalKmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanonicalKmer(0x{:016x})", self.0)
    }
}

/// Rolling iterator over the canonical k-mers of a sequence, in sequence order.
pub struct CanonicalKmerIter<'a> {
    seq: &'a [u8],
    k: usize,
    pos: usize,
    fw_kmer: u64,
    rc_kmer: u64,
    mask: u64,
    valid_bases: usize,
}

impl<'a> CanonicalKmerIter<'a> {
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        // no k-mers for k outside 1..=32
        let pos = if k == 0 || k > 32 { seq.len() } else { 0 };
        Self {
            seq,
            k,
            pos,
            fw_kmer: 0,
            rc_kmer: 0,
            mask: mask_of(k),
            valid_bases: 0,
        }
    }
}

impl Iterator for CanonicalKmerIter<'_> {
    type Item = CanonicalKmer;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.seq.len() {
            let b = self.seq[self.pos];
            self.pos += 1;

            if let Some(bits) = base_to_bits(b) {
                self.fw_kmer = ((self.fw_kmer << 2) | bits) & self.mask;
                self.rc_kmer = (self.rc_kmer >> 2) | (complement_bits(bits) << (2 * (self.k - 1)));
                self.valid_bases += 1;

                if self.valid_bases >= self.k {
                    return Some(CanonicalKmer(self.fw_kmer.min(self.rc_kmer)));
                }
            } else {
                self.valid_bases = 0;
                self.fw_kmer = 0;
                self.rc_kmer = 0;
            }
        }
        None
    }
}

/// All canonical k-mers of `seq`, in sequence order.
pub fn canonical_kmers(seq: &[u8], k: usize) -> CanonicalKmerIter<'_> {
    CanonicalKmerIter::new(seq, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kmer(bases: &[u8]) -> CanonicalKmer {
        CanonicalKmer::from_bases(bases).unwrap()
    }

    #[test]
    fn test_canonical_is_strand_independent() {
        assert_eq!(kmer(b"TTT"), kmer(b"AAA"));
        assert_eq!(kmer(b"TTT").to_bases(3), b"AAA".to_vec());
        assert_eq!(kmer(b"acg"), kmer(b"CGT"));
        assert_eq!(kmer(b"ACGTT"), kmer(b"AACGT"));
        assert_eq!(kmer(b"GGTAC").to_bases(5), b"GGTAC".to_vec());
        assert!(CanonicalKmer::from_bases(b"ACNT").is_none());
        assert!(CanonicalKmer::from_bases(&[b'A'; 33]).is_none());
    }

    #[test]
    fn test_packed_order_is_lexicographic() {
        assert!(kmer(b"AAC") < kmer(b"ACA"));
        assert!(kmer(b"ACA") < kmer(b"CAA"));
    }

    #[test]
    fn test_rolling_matches_direct_encoding() {
        let seq = b"ACGGTTCAGGATTACAGCTTAGCCATG";
        for k in [1, 3, 7, 11] {
            let rolled: Vec<CanonicalKmer> = canonical_kmers(seq, k).collect();
            let direct: Vec<CanonicalKmer> = seq.windows(k).map(kmer).collect();
            assert_eq!(rolled, direct, "k = {k}");
        }
        let long: Vec<u8> = b"ACGT".iter().cycle().take(40).copied().collect();
        let rolled: Vec<CanonicalKmer> = canonical_kmers(&long, 32).collect();
        assert_eq!(rolled.len(), 9);
        assert_eq!(rolled[0], kmer(&long[..32]));
    }

    #[test]
    fn test_kmers_skip_ambiguous_bases() {
        let kmers: Vec<CanonicalKmer> = canonical_kmers(b"ACGNTAC", 3).collect();
        assert_eq!(kmers, vec![kmer(b"ACG"), kmer(b"TAC")]);
        assert_eq!(canonical_kmers(b"AC", 3).count(), 0);
        assert_eq!(canonical_kmers(b"ACGT", 0).count(), 0);
    }

    #[test]
    fn test_infix_is_canonical() {
        // middle 3 bases of GGTACCA are TAC, canonical GTA
        let km = kmer(b"GGTACCA");
        assert_eq!(km.infix(7, 2, 3), kmer(b"TAC"));
        assert_eq!(km.infix(7, 2, 3).to_bases(3), b"GTA".to_vec());
    }
}
