//! # Variant Tables
//!
//! Per-chromosome variant lists with their haplotype path assignments.
//!
//! ## TSV Format
//! ```text
//! #chrom  pos   left_flank  right_flank  alleles   path_alleles
//! chr1    1000  ACGTACGT    TTGACCAT     A,C,-     0,1,1,.
//! ```
//! `-` is an empty allele (deletion), `.` a path that does not traverse the
//! variant. Variants of a chromosome must appear in increasing position order.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info_span;

use crate::data::Variant;
use crate::error::{Result, TyperError};

/// Read access to the variants of each chromosome
pub trait VariantSource: Send + Sync {
    /// Chromosome names in sorted order
    fn chromosomes(&self) -> Vec<String>;

    /// Variants of one chromosome, increasing by position
    fn variants_of(&self, chrom: &str) -> Result<&[Variant]>;

    /// Number of haplotype paths (the widest variant over all chromosomes)
    fn nr_paths(&self) -> usize;
}

/// In-memory variant table
#[derive(Clone, Debug, Default)]
pub struct VariantTable {
    chromosomes: BTreeMap<String, Vec<Variant>>,
}

impl VariantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a variant; positions must increase within a chromosome.
    pub fn push(&mut self, chrom: &str, variant: Variant) -> Result<()> {
        let variants = self.chromosomes.entry(chrom.to_string()).or_default();
        if let Some(last) = variants.last() {
            if variant.position <= last.position {
                return Err(TyperError::invalid_data(format!(
                    "variants on {} not in ascending order: {} after {}",
                    chrom, variant.position, last.position
                )));
            }
        }
        variants.push(variant);
        Ok(())
    }

    pub fn n_variants(&self) -> usize {
        self.chromosomes.values().map(Vec::len).sum()
    }

    /// Load a variant table from the TSV format described above.
    pub fn from_tsv(path: &Path) -> Result<Self> {
        info_span!("variant_table_from_tsv", path = ?path).in_scope(|| {
            if !path.exists() {
                return Err(TyperError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let reader = BufReader::new(File::open(path)?);
            let mut table = Self::new();

            for (line_num, line) in reader.lines().enumerate() {
                let line = line?;
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 6 {
                    return Err(TyperError::parse(
                        line_num + 1,
                        format!("Expected 6 columns, got {}", parts.len()),
                    ));
                }

                let position: usize = parts[1]
                    .parse()
                    .map_err(|_| TyperError::parse(line_num + 1, "Invalid position"))?;
                let alleles: Vec<Vec<u8>> = parts[4]
                    .split(',')
                    .map(|a| if a == "-" { Vec::new() } else { a.as_bytes().to_vec() })
                    .collect();
                let path_alleles = parts[5]
                    .split(',')
                    .map(|a| match a {
                        "." => Ok(None),
                        _ => a.parse::<u8>().map(Some).map_err(|_| {
                            TyperError::parse(line_num + 1, format!("Invalid path allele '{a}'"))
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;

                let variant = Variant::new(
                    position,
                    alleles,
                    parts[2].as_bytes().to_vec(),
                    parts[3].as_bytes().to_vec(),
                    path_alleles,
                )
                .map_err(|e| TyperError::parse(line_num + 1, e.to_string()))?;
                table
                    .push(parts[0], variant)
                    .map_err(|e| TyperError::parse(line_num + 1, e.to_string()))?;
            }
            Ok(table)
        })
    }

    /// Path segments of the genome: every flank once, every allele padded
    /// with `k - 1` flank bases. Counting k-mers over these gives the genomic
    /// counts the unique k-mer selection expects.
    pub fn genome_sequences(&self, k: usize) -> Vec<Vec<u8>> {
        self.named_segments(k).map(|(_, seq)| seq).collect()
    }

    /// Write the path segments as FASTA, one record per segment; returns the
    /// number of records.
    pub fn write_path_segments(&self, k: usize, out: &Path) -> Result<usize> {
        let mut writer = BufWriter::new(File::create(out)?);
        let mut n = 0;
        for (name, seq) in self.named_segments(k) {
            writeln!(writer, ">{}", name)?;
            writer.write_all(&seq)?;
            writeln!(writer)?;
            n += 1;
        }
        writer.flush()?;
        Ok(n)
    }

    fn named_segments(&self, k: usize) -> impl Iterator<Item = (String, Vec<u8>)> + '_ {
        self.chromosomes.iter().flat_map(move |(chrom, variants)| {
            variants.iter().flat_map(move |variant| {
                let pos = variant.position;
                let flanks = [
                    (format!("{chrom}_{pos}_left"), variant.left_flank.clone()),
                    (format!("{chrom}_{pos}_right"), variant.right_flank.clone()),
                ];
                let alleles = (0..variant.n_alleles()).map(move |allele| {
                    (
                        format!("{chrom}_{pos}_allele{allele}"),
                        variant.allele_window(allele as u8, k),
                    )
                });
                flanks.into_iter().chain(alleles)
            })
        })
    }
}

impl VariantSource for VariantTable {
    fn chromosomes(&self) -> Vec<String> {
        self.chromosomes.keys().cloned().collect()
    }

    fn variants_of(&self, chrom: &str) -> Result<&[Variant]> {
        self.chromosomes
            .get(chrom)
            .map(Vec::as_slice)
            .ok_or_else(|| TyperError::invalid_data(format!("unknown chromosome {chrom}")))
    }

    fn nr_paths(&self) -> usize {
        self.chromosomes
            .values()
            .flatten()
            .map(Variant::n_paths)
            .max()
            .unwrap_or(0)
    }
}
