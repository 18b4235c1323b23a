//! # pggtyper Library Root
//!
//! ## Role
//! Genotyping and phasing of known variants from sequencing-read k-mer counts
//! and a pangenome of haplotype paths. The crate root declares all public
//! modules and re-exports common types.
//!
//! ## Module Structure
//! ```text
//! pggtyper
//! ├── config      # CLI configuration and validation
//! ├── data        # Copy numbers, k-mer paths, unique k-mers, variants
//! ├── io          # K-mer count backends, variant tables, genotype writers
//! ├── model       # Unique k-mer selection, copy-number model, HMM
//! ├── pipelines   # Parallel per-chromosome driver
//! └── utils       # Thread pool helpers
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

pub use data::{CopyNumber, CopyNumberAssignment, KmerPath, UniqueKmers, Variant};
pub use error::{Result, TyperError};
pub use model::{GenotypingResult, Hmm, HmmOptions, ModelParams, UniqueKmerComputer};
