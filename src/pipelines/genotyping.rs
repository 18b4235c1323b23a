//! # Genotyping Pipeline
//!
//! Orchestrates the genotyping workflow:
//! 1. Load the variant table
//! 2. Write the path segments, count (or load) genomic k-mers and load read
//!    k-mers
//! 3. Compute the abundance histogram; optionally correct read counts and
//!    recompute it
//! 4. Run every chromosome in parallel: unique k-mers, then the HMM
//! 5. Write the completed chromosomes in chromosome order, then report failures
//!
//! Chromosomes are independent. Each task reads the shared count tables and
//! variant source, and sends exactly one message to the aggregator running on
//! the calling thread, so a failing chromosome never affects the others.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{info, info_span, instrument, warn};

use crate::config::Config;
use crate::error::{Result, TyperError};
use crate::io::kmer_counts::{KmerCountDump, KmerCounter, KmerCounts, DEFAULT_MAX_HISTOGRAM_COUNT};
use crate::io::results::{GenotypeWriter, TsvGenotypeWriter};
use crate::io::variants::{VariantSource, VariantTable};
use crate::model::{GenotypingResult, Hmm, HmmOptions, ModelParams, UniqueKmerComputer};
use crate::utils::threading::{build_thread_pool, pool_size};

/// Message from a chromosome task to the aggregator
struct ChromosomeOutcome {
    chrom: String,
    result: Result<Vec<GenotypingResult>>,
    elapsed: Duration,
}

/// Results of one parallel run, keyed by chromosome
#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: BTreeMap<String, Vec<GenotypingResult>>,
    pub timings: BTreeMap<String, Duration>,
    pub failures: BTreeMap<String, TyperError>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One `chrom<TAB>seconds<TAB>status` line per chromosome, in chromosome order
    pub fn timing_report(&self) -> Vec<String> {
        self.timings
            .iter()
            .map(|(chrom, elapsed)| {
                let status = if self.failures.contains_key(chrom) { "failed" } else { "ok" };
                format!("{}\t{:.3}s\t{}", chrom, elapsed.as_secs_f64(), status)
            })
            .collect()
    }

    /// All results, or the first failed chromosome as [`TyperError::Chromosome`].
    pub fn into_result(mut self) -> Result<BTreeMap<String, Vec<GenotypingResult>>> {
        match self.failures.pop_first() {
            Some((chrom, error)) => Err(error.in_chromosome(chrom)),
            None => Ok(self.results),
        }
    }
}

/// Runs one independent task per chromosome on a dedicated pool
pub struct ChromosomeDriver<'a> {
    genomic_kmers: &'a dyn KmerCounts,
    read_kmers: &'a dyn KmerCounts,
    variants: &'a dyn VariantSource,
    params: ModelParams,
    options: HmmOptions,
    kmer_abundance_peak: f64,
    n_threads: usize,
}

impl<'a> ChromosomeDriver<'a> {
    pub fn new(
        genomic_kmers: &'a dyn KmerCounts,
        read_kmers: &'a dyn KmerCounts,
        variants: &'a dyn VariantSource,
        params: ModelParams,
        options: HmmOptions,
        kmer_abundance_peak: f64,
        n_threads: usize,
    ) -> Self {
        Self {
            genomic_kmers,
            read_kmers,
            variants,
            params,
            options,
            kmer_abundance_peak,
            n_threads,
        }
    }

    /// Genotype the given chromosomes. Only pool construction fails the whole
    /// run; per-chromosome errors end up in [`RunSummary::failures`].
    #[instrument(name = "chromosome_driver", skip_all, fields(n_chrom = chromosomes.len()))]
    pub fn run(&self, chromosomes: &[String]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        if chromosomes.is_empty() {
            return Ok(summary);
        }
        let n_threads = pool_size(self.n_threads, chromosomes.len());
        let pool = build_thread_pool(n_threads)?;
        info!(n_threads, "starting chromosome tasks");

        let (tx, rx) = mpsc::channel::<ChromosomeOutcome>();
        pool.in_place_scope(|scope| {
            for chrom in chromosomes {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let start = Instant::now();
                    let result = self.genotype_chromosome(chrom);
                    // the receiver outlives the scope
                    let _ = tx.send(ChromosomeOutcome {
                        chrom: chrom.clone(),
                        result,
                        elapsed: start.elapsed(),
                    });
                });
            }
            drop(tx);

            for outcome in rx.iter() {
                summary.timings.insert(outcome.chrom.clone(), outcome.elapsed);
                match outcome.result {
                    Ok(results) => {
                        info!(
                            chrom = %outcome.chrom,
                            n_variants = results.len(),
                            secs = outcome.elapsed.as_secs_f64(),
                            "chromosome complete"
                        );
                        summary.results.insert(outcome.chrom, results);
                    }
                    Err(e) => {
                        warn!(chrom = %outcome.chrom, error = %e, "chromosome failed");
                        summary.failures.insert(outcome.chrom, e);
                    }
                }
            }
        });
        Ok(summary)
    }

    fn genotype_chromosome(&self, chrom: &str) -> Result<Vec<GenotypingResult>> {
        info_span!("chromosome", chrom).in_scope(|| {
            let computer = UniqueKmerComputer::new(
                self.genomic_kmers,
                self.read_kmers,
                self.variants,
                chrom,
                self.kmer_abundance_peak,
            )?;
            let unique_kmers = computer.compute_unique_kmers()?;
            let hmm = Hmm::new(&unique_kmers, &self.params, &self.options)?;
            Ok(hmm.into_results())
        })
    }
}

/// End-to-end run used by the binary
pub struct GenotypingPipeline {
    config: Config,
}

impl GenotypingPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    #[instrument(name = "genotyping_pipeline", skip(self))]
    pub fn run(&mut self) -> Result<RunSummary> {
        let k = self.config.kmer_size;

        eprintln!("Loading variants...");
        let variants = VariantTable::from_tsv(&self.config.variants)?;
        let chromosomes = variants.chromosomes();
        eprintln!(
            "  {} variants on {} chromosomes, {} paths",
            variants.n_variants(),
            chromosomes.len(),
            variants.nr_paths()
        );

        let genome_sequences = variants.genome_sequences(k);
        let segments_path = self.config.output_path("path_segments.fasta");
        let n_segments = variants.write_path_segments(k, &segments_path)?;
        info!(n_segments, path = ?segments_path, "wrote path segments");
        let genomic_kmers: Box<dyn KmerCounts> = match &self.config.genome {
            Some(path) => {
                eprintln!("Loading genomic k-mer counts...");
                Box::new(KmerCountDump::open(path, k)?)
            }
            None => {
                eprintln!("Counting genomic k-mers...");
                Box::new(info_span!("count_genomic_kmers").in_scope(|| {
                    KmerCounter::from_sequences(k, genome_sequences.iter().map(Vec::as_slice))
                }))
            }
        };

        eprintln!("Loading read k-mer counts...");
        let mut read_kmers = KmerCountDump::open(&self.config.reads, k)?;
        let mut peak = read_kmers.compute_histogram(
            DEFAULT_MAX_HISTOGRAM_COUNT,
            Some(&self.config.output_path("histogram.tsv")),
        )?;
        eprintln!("  k-mer abundance peak: {}", peak);

        if !self.config.no_correction {
            eprintln!("Correcting read k-mer counts...");
            let correction = read_kmers.correct_read_counts(
                genomic_kmers.as_ref(),
                &genome_sequences,
                &self.config.output_path("kmer_training.tsv"),
                self.config.small_kmer_size,
                self.config.error_rate,
            )?;
            eprintln!(
                "  removed {} error k-mers, trained {} contexts on {} k-mers",
                correction.removed_error_kmers, correction.trained_contexts, correction.training_kmers
            );
            peak = read_kmers.compute_histogram(
                DEFAULT_MAX_HISTOGRAM_COUNT,
                Some(&self.config.output_path("histogram_corrected.tsv")),
            )?;
            eprintln!("  corrected k-mer abundance peak: {}", peak);
        }

        let options = HmmOptions {
            genotyping: self.config.run_genotyping(),
            phasing: self.config.run_phasing(),
            only_paths: None,
        };
        let driver = ChromosomeDriver::new(
            genomic_kmers.as_ref(),
            &read_kmers,
            &variants,
            self.config.model_params()?,
            options,
            peak as f64,
            self.config.nthreads(),
        );
        eprintln!("Genotyping {} chromosomes...", chromosomes.len());
        let summary = driver.run(&chromosomes)?;

        self.write_results(&variants, &summary)?;

        eprintln!("Chromosome timings:");
        for line in summary.timing_report() {
            eprintln!("  {}", line);
        }
        for (chrom, error) in &summary.failures {
            eprintln!("  chromosome {} failed: {}", chrom, error);
        }
        eprintln!(
            "Genotyping complete: {} chromosomes written, {} failed",
            summary.results.len(),
            summary.failures.len()
        );
        Ok(summary)
    }

    fn write_results(&self, variants: &VariantTable, summary: &RunSummary) -> Result<()> {
        let _span = info_span!("write_results").entered();
        if self.config.run_genotyping() {
            let path = self.config.output_path("genotyping.tsv");
            eprintln!("Writing genotypes to {:?}", path);
            let mut writer = TsvGenotypeWriter::create(&path)?;
            for (chrom, results) in &summary.results {
                writer.write_genotypes_of(chrom, variants.variants_of(chrom)?, results)?;
            }
            writer.finish()?;
        }
        if self.config.run_phasing() {
            let path = self.config.output_path("phasing.tsv");
            eprintln!("Writing phasing to {:?}", path);
            let mut writer = TsvGenotypeWriter::create(&path)?;
            for (chrom, results) in &summary.results {
                writer.write_phasing_of(chrom, variants.variants_of(chrom)?, results)?;
            }
            writer.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Variant;

    const FLANKS: [(&[u8], &[u8]); 3] = [
        (b"TTGACCATGCAAGT", b"CAGGTTCAAGCTTA"),
        (b"GGCATTAGCCTAGA", b"ACCTGATCGGTTAC"),
        (b"CTTAGGACTTGCAA", b"TGCAGTCATACGGA"),
    ];

    fn variant(position: usize, flanks: (&[u8], &[u8]), paths: Vec<Option<u8>>) -> Variant {
        Variant::new(
            position,
            vec![b"A".to_vec(), b"C".to_vec()],
            flanks.0.to_vec(),
            flanks.1.to_vec(),
            paths,
        )
        .unwrap()
    }

    fn table() -> VariantTable {
        let mut table = VariantTable::new();
        table.push("chr1", variant(50, FLANKS[0], vec![Some(0), Some(1)])).unwrap();
        table.push("chr2", variant(50, FLANKS[1], vec![Some(0), Some(1)])).unwrap();
        // no path traverses this variant
        table.push("chr3", variant(70, FLANKS[2], vec![None, None])).unwrap();
        table
    }

    fn haplotype(flanks: (&[u8], &[u8]), allele: &[u8]) -> Vec<u8> {
        [flanks.0, allele, flanks.1].concat()
    }

    #[test]
    fn test_failure_is_isolated() {
        let k = 7;
        let table = table();
        let genome = KmerCounter::from_sequences(k, table.genome_sequences(k).iter().map(Vec::as_slice));
        let mut reads = KmerCounter::new(k);
        for _ in 0..8 {
            reads.add_sequence(&haplotype(FLANKS[0], b"A"));
            reads.add_sequence(&haplotype(FLANKS[0], b"C"));
            reads.add_sequence(&haplotype(FLANKS[1], b"C"));
            reads.add_sequence(&haplotype(FLANKS[1], b"C"));
        }
        let driver = ChromosomeDriver::new(
            &genome,
            &reads,
            &table,
            ModelParams::default(),
            HmmOptions::default(),
            8.0,
            4,
        );
        let summary = driver.run(&table.chromosomes()).unwrap();
        assert_eq!(summary.results.len(), 2);
        assert_eq!(summary.timings.len(), 3);
        let report = summary.timing_report();
        assert_eq!(report.len(), 3);
        assert!(report[0].starts_with("chr1\t") && report[0].ends_with("\tok"));
        assert!(report[2].starts_with("chr3\t") && report[2].ends_with("\tfailed"));
        assert!(matches!(
            summary.failures.get("chr3"),
            Some(TyperError::NoPaths { position: 70 })
        ));
        assert_eq!(summary.results["chr1"][0].likeliest_genotype(), Some((0, 1)));
        assert_eq!(summary.results["chr2"][0].likeliest_genotype(), Some((1, 1)));
        assert_eq!(summary.results["chr2"][0].get_haplotype(), Some((1, 1)));
        assert!(matches!(
            summary.into_result(),
            Err(TyperError::Chromosome { ref chrom, .. }) if chrom == "chr3"
        ));
    }

    #[test]
    fn test_thread_count_does_not_change_results() {
        let k = 7;
        let table = table();
        let genome = KmerCounter::from_sequences(k, table.genome_sequences(k).iter().map(Vec::as_slice));
        let mut reads = KmerCounter::new(k);
        for _ in 0..5 {
            reads.add_sequence(&haplotype(FLANKS[0], b"A"));
            reads.add_sequence(&haplotype(FLANKS[1], b"C"));
        }
        let chromosomes = vec!["chr1".to_string(), "chr2".to_string()];
        let run = |n_threads| {
            ChromosomeDriver::new(
                &genome,
                &reads,
                &table,
                ModelParams::default(),
                HmmOptions::default(),
                5.0,
                n_threads,
            )
            .run(&chromosomes)
            .unwrap()
            .into_result()
            .unwrap()
        };
        assert_eq!(run(1), run(3));
    }

    #[test]
    fn test_empty_run() {
        let table = VariantTable::new();
        let genome = KmerCounter::new(5);
        let driver = ChromosomeDriver::new(
            &genome,
            &genome,
            &table,
            ModelParams::default(),
            HmmOptions::default(),
            1.0,
            2,
        );
        let summary = driver.run(&[]).unwrap();
        assert!(summary.is_success());
        assert!(summary.into_result().unwrap().is_empty());
    }
}
