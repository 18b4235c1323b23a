//! # Model Module
//!
//! Statistical model of the genotyper.
//!
//! ## Core Algorithms
//! - `UniqueKmerComputer`: selects variant-specific k-mers and their copy numbers
//! - `HMM`: diploid pair HMM over haplotype paths (forward-backward and Viterbi)
//! - `Transitions` / `Emissions`: the factorised pair transition and the
//!   k-mer copy-number likelihoods feeding the HMM
//! - `Parameters`: recombination hyperparameters
//!
//! ## State Space
//! One state per ordered pair of paths at each variant. Genotyping treats the
//! pair as unordered, phasing keeps the order; both share the same column
//! structure, so a chromosome with `n` paths costs `O(n³)` per variant.

pub mod copy_number;
pub mod emissions;
pub mod genotyping_result;
pub mod hmm;
pub mod parameters;
pub mod transitions;
pub mod unique_kmer_computer;

pub use genotyping_result::GenotypingResult;
pub use hmm::{Hmm, HmmOptions};
pub use parameters::ModelParams;
pub use unique_kmer_computer::UniqueKmerComputer;
