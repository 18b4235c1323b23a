//! # I/O Module
//!
//! File reading/writing boundaries: k-mer count backends, the variant table
//! reader and the genotype writers.

pub mod kmer_counts;
pub mod results;
pub mod variants;

pub use kmer_counts::{KmerCountDump, KmerCounter, KmerCounts};
pub use results::{GenotypeWriter, TsvGenotypeWriter};
pub use variants::{VariantSource, VariantTable};
