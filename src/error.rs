//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pggtyper operations
#[derive(Error, Debug)]
pub enum TyperError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A haplotype path id that was never registered at a variant
    #[error("path {path_id} does not exist")]
    UnknownPath { path_id: usize },

    /// An allele id that was referenced before it was registered
    #[error("allele {allele_id} does not exist")]
    UnknownAllele { allele_id: u8 },

    /// K-mer index at or beyond the number of unique k-mers of a variant
    #[error("requested k-mer index {index} does not exist (size {size})")]
    KmerIndexOutOfRange { index: usize, size: usize },

    /// A variant with no haplotype paths; the HMM cannot define states there
    #[error("variant at position {position} has no haplotype paths")]
    NoPaths { position: usize },

    /// Degenerate count or probability input to the copy-number model
    #[error("invalid count data: {message}")]
    InvalidCount { message: String },

    /// Invalid data errors (unsorted variants, unknown alleles in path tables)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Worker pool could not be created
    #[error("thread pool error: {message}")]
    ThreadPool { message: String },

    /// Failure of a single chromosome's computation
    #[error("chromosome {chrom} failed: {source}")]
    Chromosome {
        chrom: String,
        #[source]
        source: Box<TyperError>,
    },
}

/// Type alias for Results using TyperError
pub type Result<T> = std::result::Result<T, TyperError>;

impl TyperError {
    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an invalid count error
    pub fn invalid_count(message: impl Into<String>) -> Self {
        Self::InvalidCount {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Attach the chromosome name to a per-chromosome failure
    pub fn in_chromosome(self, chrom: impl Into<String>) -> Self {
        Self::Chromosome {
            chrom: chrom.into(),
            source: Box::new(self),
        }
    }
}
