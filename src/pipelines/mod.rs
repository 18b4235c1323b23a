//! # Pipeline Module
//!
//! High-level orchestration of the genotyping workflow.
//! Coordinates I/O, the per-chromosome tasks and result aggregation.

pub mod genotyping;

pub use genotyping::{ChromosomeDriver, GenotypingPipeline, RunSummary};
