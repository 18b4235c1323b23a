//! # Configuration Logic
//!
//! ## Role
//! CLI argument parsing and validation.
//!
//! ## Validation
//! - k-mer size in `1..=32`, small k-mer size below it
//! - recombination rate and scale finite and non-negative (0 disables path switches)
//! - effective population size finite and positive
//! - error rate in `(0, 1)`
//! - `--only-genotyping` and `--only-phasing` are mutually exclusive
//! - input files exist
//!
//! ## Example CLI
//! ```bash
//! pggtyper --variants variants.tsv --reads reads.kmers --out sample -k 31 --threads 8
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::error::{Result, TyperError};
use crate::model::parameters::{
    ModelParams, DEFAULT_EFFECTIVE_POPULATION_SIZE, DEFAULT_RECOMBINATION_SCALE,
    DEFAULT_RECOMB_RATE,
};

/// Largest k-mer length accepted
pub const MAX_KMER_SIZE: usize = 32;

#[derive(Parser, Debug, Clone)]
#[command(name = "pggtyper")]
#[command(about = "Genotype and phase known variants from k-mer counts and pangenome haplotype paths")]
#[command(version)]
pub struct Config {
    /// Variant table (chrom, pos, flanks, alleles, path alleles)
    #[arg(long)]
    pub variants: PathBuf,

    /// Read k-mer counts (`kmer<TAB>count` per line)
    #[arg(long)]
    pub reads: PathBuf,

    /// Genomic k-mer counts; computed from the variant table when absent
    #[arg(long)]
    pub genome: Option<PathBuf>,

    /// Output prefix
    #[arg(long)]
    pub out: PathBuf,

    /// K-mer length
    #[arg(short = 'k', long, default_value_t = 31)]
    pub kmer_size: usize,

    /// Length of the context k-mer used for count correction
    #[arg(short = 'm', long, default_value_t = 5)]
    pub small_kmer_size: usize,

    /// Worker threads (default: all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Only compute genotype posteriors
    #[arg(long)]
    pub only_genotyping: bool,

    /// Only compute the phased path pair
    #[arg(long)]
    pub only_phasing: bool,

    /// Recombination rate in cM/Mb
    #[arg(long, default_value_t = DEFAULT_RECOMB_RATE)]
    pub recomb_rate: f64,

    /// Effective population size
    #[arg(long, default_value_t = DEFAULT_EFFECTIVE_POPULATION_SIZE)]
    pub effective_population_size: f64,

    /// Multiplier of the recombination intensity
    #[arg(long, default_value_t = DEFAULT_RECOMBINATION_SCALE)]
    pub recombination_scale: f64,

    /// Sequencing error rate used to discard erroneous read k-mers
    #[arg(long, default_value_t = 0.01)]
    pub error_rate: f64,

    /// Skip the read k-mer count correction
    #[arg(long)]
    pub no_correction: bool,

    /// Emit span timings
    #[arg(long)]
    pub profile: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn require_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(TyperError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

impl Config {
    /// Parse command line arguments and validate.
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kmer_size == 0 || self.kmer_size > MAX_KMER_SIZE {
            return Err(TyperError::config(format!(
                "k-mer size must be in 1..={}, got {}",
                MAX_KMER_SIZE, self.kmer_size
            )));
        }
        if self.small_kmer_size == 0 || self.small_kmer_size >= self.kmer_size {
            return Err(TyperError::config(format!(
                "small k-mer size must be in 1..{}, got {}",
                self.kmer_size, self.small_kmer_size
            )));
        }
        if !(self.error_rate > 0.0 && self.error_rate < 1.0) {
            return Err(TyperError::config(format!(
                "error rate must be in (0, 1), got {}",
                self.error_rate
            )));
        }
        if self.only_genotyping && self.only_phasing {
            return Err(TyperError::config(
                "--only-genotyping and --only-phasing are mutually exclusive",
            ));
        }
        if self.threads == Some(0) {
            return Err(TyperError::config("--threads must be at least 1"));
        }
        self.model_params()?;

        require_file(&self.variants)?;
        require_file(&self.reads)?;
        if let Some(genome) = &self.genome {
            require_file(genome)?;
        }
        Ok(())
    }

    pub fn model_params(&self) -> Result<ModelParams> {
        ModelParams::new(
            self.recomb_rate,
            self.effective_population_size,
            self.recombination_scale,
        )
    }

    pub fn run_genotyping(&self) -> bool {
        !self.only_phasing
    }

    pub fn run_phasing(&self) -> bool {
        !self.only_genotyping
    }

    /// Number of threads to use
    pub fn nthreads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// `<out>_<suffix>`
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        let mut name = self.out.as_os_str().to_owned();
        name.push(format!("_{suffix}"));
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path, extra: &[&str]) -> Config {
        let variants = dir.join("variants.tsv");
        let reads = dir.join("reads.kmers");
        std::fs::write(&variants, "").unwrap();
        std::fs::write(&reads, "").unwrap();
        let mut args = vec![
            "pggtyper".to_string(),
            "--variants".to_string(),
            variants.display().to_string(),
            "--reads".to_string(),
            reads.display().to_string(),
            "--out".to_string(),
            dir.join("sample").display().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &[]);
        cfg.validate().unwrap();
        assert_eq!(cfg.kmer_size, 31);
        assert_eq!(cfg.small_kmer_size, 5);
        assert!(cfg.run_genotyping() && cfg.run_phasing());
        assert!(cfg.nthreads() >= 1);
        assert_eq!(cfg.model_params().unwrap(), ModelParams::default());
        assert_eq!(
            cfg.output_path("genotyping.tsv"),
            dir.path().join("sample_genotyping.tsv")
        );
    }

    #[test]
    fn test_only_flags() {
        let dir = tempfile::tempdir().unwrap();
        let phasing = config(dir.path(), &["--only-phasing"]);
        assert!(!phasing.run_genotyping() && phasing.run_phasing());
        let both = config(dir.path(), &["--only-phasing", "--only-genotyping"]);
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_zero_recombination_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &["--recomb-rate", "0", "--recombination-scale", "0"]);
        cfg.validate().unwrap();
        let t = cfg.model_params().unwrap().haplotype_transition(0, 1_000_000, 4);
        assert_eq!(t.stay, 1.0);

        let no_population = config(dir.path(), &["--effective-population-size", "0"]);
        assert!(no_population.validate().is_err());
    }

    #[test]
    fn test_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        for extra in [
            &["-k", "33"][..],
            &["-k", "5", "-m", "5"][..],
            &["--error-rate", "0"][..],
            &["--recomb-rate=-1"][..],
            &["--threads", "0"][..],
        ] {
            assert!(config(dir.path(), extra).validate().is_err(), "{:?}", extra);
        }
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &[]);
        cfg.genome = Some(dir.path().join("missing.kmers"));
        assert!(matches!(
            cfg.validate(),
            Err(TyperError::FileNotFound { .. })
        ));
    }
}
