//! # Data Module
//!
//! In-memory representations of the genotyping evidence.
//!
//! ## Key Types
//! - [`CopyNumber`]: probability that a k-mer is present 0, 1 or 2 times
//! - [`KmerPath`]: per-allele bitvector over the unique k-mers of a variant
//! - [`UniqueKmers`]: all evidence of one variant (k-mers, alleles, paths, coverage)
//! - [`CanonicalKmer`]: 2-bit packed canonical k-mer
//! - [`Variant`]: allele sequences, flanks and path assignments of one site

pub mod copy_number;
pub mod kmer;
pub mod kmer_path;
pub mod unique_kmers;
pub mod variant;

pub use copy_number::CopyNumber;
pub use kmer::CanonicalKmer;
pub use kmer_path::{CopyNumberAssignment, KmerPath};
pub use unique_kmers::UniqueKmers;
pub use variant::Variant;
