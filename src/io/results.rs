//! # Genotype Writers
//!
//! Sinks for the per-chromosome results of the HMM.
//!
//! ## TSV Format
//! Genotypes:
//! ```text
//! #chrom  pos   alleles  GT   GQ  posteriors                    unique_kmers  coverage
//! chr1    1000  A,C      0/1  43  0/0:0.0001,0/1:0.9999,1/1:0   12            14.50
//! ```
//! Phasing (`.` when a variant has no phased call):
//! ```text
//! #chrom  pos   alleles  GT   paths
//! chr1    1000  A,C      1|0  2|0
//! ```

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::Variant;
use crate::error::{Result, TyperError};
use crate::model::GenotypingResult;

/// Destination of genotyping and phasing records
pub trait GenotypeWriter {
    fn write_genotypes_of(
        &mut self,
        chrom: &str,
        variants: &[Variant],
        results: &[GenotypingResult],
    ) -> Result<()>;

    fn write_phasing_of(
        &mut self,
        chrom: &str,
        variants: &[Variant],
        results: &[GenotypingResult],
    ) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

pub struct TsvGenotypeWriter<W: Write> {
    out: W,
    header_written: bool,
}

impl TsvGenotypeWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> TsvGenotypeWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(&mut self, columns: &str) -> Result<()> {
        if !self.header_written {
            writeln!(self.out, "#chrom\tpos\talleles\t{columns}")?;
            self.header_written = true;
        }
        Ok(())
    }
}

fn check_lengths(chrom: &str, variants: &[Variant], results: &[GenotypingResult]) -> Result<()> {
    if variants.len() != results.len() {
        return Err(TyperError::invalid_data(format!(
            "{}: {} variants but {} results",
            chrom,
            variants.len(),
            results.len()
        )));
    }
    Ok(())
}

fn allele_list(variant: &Variant) -> String {
    variant
        .alleles
        .iter()
        .map(|a| {
            if a.is_empty() {
                "-".to_string()
            } else {
                String::from_utf8_lossy(a).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn posteriors(result: &GenotypingResult) -> String {
    let mut out = String::new();
    for (i, (&(a1, a2), &p)) in result.genotype_likelihoods().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{a1}/{a2}:{p:.4}");
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

impl<W: Write> GenotypeWriter for TsvGenotypeWriter<W> {
    fn write_genotypes_of(
        &mut self,
        chrom: &str,
        variants: &[Variant],
        results: &[GenotypingResult],
    ) -> Result<()> {
        check_lengths(chrom, variants, results)?;
        self.header("GT\tGQ\tposteriors\tunique_kmers\tcoverage")?;
        for (variant, result) in variants.iter().zip(results) {
            let (gt, gq) = match result.likeliest_genotype() {
                Some((a1, a2)) => (
                    format!("{a1}/{a2}"),
                    format!("{:.0}", result.genotype_quality(a1, a2)),
                ),
                None => (".".to_string(), ".".to_string()),
            };
            writeln!(
                self.out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}",
                chrom,
                result.position(),
                allele_list(variant),
                gt,
                gq,
                posteriors(result),
                result.nr_unique_kmers(),
                result.local_coverage()
            )?;
        }
        Ok(())
    }

    fn write_phasing_of(
        &mut self,
        chrom: &str,
        variants: &[Variant],
        results: &[GenotypingResult],
    ) -> Result<()> {
        check_lengths(chrom, variants, results)?;
        self.header("GT\tpaths")?;
        for (variant, result) in variants.iter().zip(results) {
            let gt = result
                .get_haplotype()
                .map_or_else(|| ".".to_string(), |(a1, a2)| format!("{a1}|{a2}"));
            let paths = result
                .get_haplotype_paths()
                .map_or_else(|| ".".to_string(), |(p1, p2)| format!("{p1}|{p2}"));
            writeln!(
                self.out,
                "{}\t{}\t{}\t{}\t{}",
                chrom,
                result.position(),
                allele_list(variant),
                gt,
                paths
            )?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
