//! # K-mer Count Backends
//!
//! ## Role
//! Read-only k-mer count lookups for the genome (path segments) and the
//! sequencing reads, plus the two count-level preprocessing steps the model
//! needs: the abundance histogram and the read count correction.
//!
//! ## Backends
//! - [`KmerCounter`]: counts canonical k-mers of in-memory sequences.
//! - [`KmerCountDump`]: loads a `kmer<TAB>count` dump produced by an external
//!   counter.
//!
//! Both share [`CountTable`] and are used through the [`KmerCounts`] trait.
//! Lookups take `&self` only, so a backend can be queried from every
//! chromosome task at once.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, info_span};

use crate::data::kmer::{canonical_kmers, CanonicalKmer};
use crate::error::{Result, TyperError};

/// Highest count tracked by the histogram used for peak detection
pub const DEFAULT_MAX_HISTOGRAM_COUNT: usize = 10_000;

/// Contexts with fewer training k-mers keep a correction factor of 1
const MIN_TRAINING_KMERS: usize = 10;

/// Canonical k-mer counts of fixed length
#[derive(Clone, Debug, Default)]
pub struct CountTable {
    kmer_size: usize,
    counts: HashMap<CanonicalKmer, u64>,
}

/// Outcome of [`KmerCounts::correct_read_counts`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrectionSummary {
    pub removed_error_kmers: usize,
    pub training_kmers: usize,
    pub trained_contexts: usize,
}

impl CountTable {
    pub fn new(kmer_size: usize) -> Self {
        Self {
            kmer_size,
            counts: HashMap::new(),
        }
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    #[inline]
    pub fn count(&self, kmer: CanonicalKmer) -> u64 {
        self.counts.get(&kmer).copied().unwrap_or(0)
    }

    /// Count of a k-mer given as bases, in either orientation
    pub fn count_of(&self, kmer: &[u8]) -> u64 {
        if kmer.len() != self.kmer_size {
            return 0;
        }
        CanonicalKmer::from_bases(kmer).map_or(0, |km| self.count(km))
    }

    fn add(&mut self, canonical_kmer: CanonicalKmer, count: u64) {
        *self.counts.entry(canonical_kmer).or_insert(0) += count;
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Frequencies of counts 1..=max_count (index 0 unused); larger counts are
    /// clipped into the last bucket.
    pub fn histogram(&self, max_count: usize) -> Vec<u64> {
        let mut histo = vec![0u64; max_count + 1];
        for &count in self.counts.values() {
            if count == 0 {
                continue;
            }
            let bucket = (count as usize).min(max_count);
            histo[bucket] += 1;
        }
        histo
    }

    /// Most frequent count after the error tail.
    pub fn abundance_peak(&self, max_count: usize) -> Result<u64> {
        if max_count < 2 {
            return Err(TyperError::config("histogram needs a max count of at least 2"));
        }
        let histo = self.histogram(max_count);
        peak_of(&histo).ok_or_else(|| TyperError::invalid_count("k-mer count histogram is empty"))
    }

    fn write_histogram(histo: &[u64], out: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(out)?);
        for (count, freq) in histo.iter().enumerate().skip(1) {
            writeln!(writer, "{}\t{}", count, freq)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn correct(
        &mut self,
        genomic: &dyn KmerCounts,
        reference: &[Vec<u8>],
        training_file: &Path,
        small_k: usize,
        error_rate: f64,
    ) -> Result<CorrectionSummary> {
        if small_k == 0 || small_k > self.kmer_size {
            return Err(TyperError::config(format!(
                "small k-mer size {} must be in 1..={}",
                small_k, self.kmer_size
            )));
        }
        if !(error_rate.is_finite() && error_rate >= 0.0) {
            return Err(TyperError::config(format!("invalid error rate {error_rate}")));
        }

        let peak = self.abundance_peak(DEFAULT_MAX_HISTOGRAM_COUNT)?;
        let threshold = error_rate * peak as f64;
        let mut summary = CorrectionSummary::default();

        // Sequencing errors: k-mers the genome never produces, seen rarely.
        let before = self.counts.len();
        self.counts
            .retain(|&kmer, count| genomic.count(kmer) > 0 || (*count as f64) > threshold);
        summary.removed_error_kmers = before - self.counts.len();

        // Repeats in the reference are excluded from training.
        let mut reference_counts: HashMap<CanonicalKmer, u32> = HashMap::new();
        for seq in reference {
            for kmer in canonical_kmers(seq, self.kmer_size) {
                *reference_counts.entry(kmer).or_insert(0) += 1;
            }
        }

        let k = self.kmer_size;
        let context_start = (k - small_k) / 2;
        let context_of = |kmer: CanonicalKmer| kmer.infix(k, context_start, small_k);

        let mut sums: BTreeMap<CanonicalKmer, (usize, f64)> = BTreeMap::new();
        let mut total = 0.0;
        for (&kmer, &count) in &self.counts {
            let genome_unique = genomic.count(kmer) == 1;
            let reference_unique = reference_counts.get(&kmer).copied().unwrap_or(0) <= 1;
            if genome_unique && reference_unique {
                let entry = sums.entry(context_of(kmer)).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += count as f64;
                total += count as f64;
                summary.training_kmers += 1;
            }
        }

        let mut factors: HashMap<CanonicalKmer, f64> = HashMap::new();
        let mut writer = BufWriter::new(File::create(training_file)?);
        if summary.training_kmers > 0 {
            let global_mean = total / summary.training_kmers as f64;
            for (context, (n, sum)) in &sums {
                let factor = if *n >= MIN_TRAINING_KMERS && global_mean > 0.0 {
                    (sum / *n as f64) / global_mean
                } else {
                    1.0
                };
                let factor = if factor > 0.0 { factor } else { 1.0 };
                if *n >= MIN_TRAINING_KMERS {
                    summary.trained_contexts += 1;
                }
                writeln!(
                    writer,
                    "{}\t{}\t{:.6}",
                    String::from_utf8_lossy(&context.to_bases(small_k)),
                    n,
                    factor
                )?;
                factors.insert(*context, factor);
            }
        }
        writer.flush()?;

        for (&kmer, count) in self.counts.iter_mut() {
            if let Some(&factor) = factors.get(&context_of(kmer)) {
                *count = (*count as f64 / factor).round() as u64;
            }
        }
        self.counts.retain(|_, count| *count > 0);

        debug!(?summary, "read count correction");
        Ok(summary)
    }
}

/// Peak of a histogram whose index is the count: skip the initial decreasing
/// run (error k-mers), then take the most frequent count. The clipped last
/// bucket never counts as the peak.
fn peak_of(histo: &[u64]) -> Option<u64> {
    let last = histo.len().checked_sub(1)?;
    if histo.iter().skip(1).all(|&f| f == 0) {
        return None;
    }
    let mut start = 1;
    while start < last && histo[start + 1] <= histo[start] {
        start += 1;
    }
    if start >= last {
        start = 1;
    }
    let upper = if last > start { last } else { last + 1 };
    let mut best = start;
    for count in start..upper {
        if histo[count] > histo[best] {
            best = count;
        }
    }
    Some(best as u64)
}

/// Capability interface of a k-mer counting backend
pub trait KmerCounts: Send + Sync {
    fn table(&self) -> &CountTable;

    fn table_mut(&mut self) -> &mut CountTable;

    fn kmer_size(&self) -> usize {
        self.table().kmer_size()
    }

    /// Count of a canonical k-mer; 0 when unseen
    fn count(&self, kmer: CanonicalKmer) -> u64 {
        self.table().count(kmer)
    }

    /// Count of a k-mer given as bases, in either orientation
    fn count_of(&self, kmer: &[u8]) -> u64 {
        self.table().count_of(kmer)
    }

    /// Compute the count histogram, optionally write it to `out_path`, and
    /// return the abundance peak.
    fn compute_histogram(&self, max_count: usize, out_path: Option<&Path>) -> Result<u64> {
        let peak = self.table().abundance_peak(max_count)?;
        if let Some(path) = out_path {
            CountTable::write_histogram(&self.table().histogram(max_count), path)?;
        }
        info!(peak, "computed k-mer abundance peak");
        Ok(peak)
    }

    /// Recalibrate counts against the genome: drop likely sequencing-error
    /// k-mers and correct sequence-context bias learned from genome-unique
    /// k-mers. The learned factors are written to `training_file`.
    fn correct_read_counts(
        &mut self,
        genomic: &dyn KmerCounts,
        reference: &[Vec<u8>],
        training_file: &Path,
        small_k: usize,
        error_rate: f64,
    ) -> Result<CorrectionSummary> {
        if genomic.kmer_size() != self.kmer_size() {
            return Err(TyperError::config(format!(
                "k-mer sizes differ: reads {} vs genome {}",
                self.kmer_size(),
                genomic.kmer_size()
            )));
        }
        info_span!("correct_read_counts").in_scope(|| {
            self.table_mut()
                .correct(genomic, reference, training_file, small_k, error_rate)
        })
    }
}

/// Live counter over in-memory sequences
#[derive(Clone, Debug)]
pub struct KmerCounter {
    table: CountTable,
}

impl KmerCounter {
    pub fn new(kmer_size: usize) -> Self {
        Self {
            table: CountTable::new(kmer_size),
        }
    }

    pub fn from_sequences<'a>(kmer_size: usize, seqs: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut counter = Self::new(kmer_size);
        for seq in seqs {
            counter.add_sequence(seq);
        }
        counter
    }

    /// Count every canonical k-mer of `seq`
    pub fn add_sequence(&mut self, seq: &[u8]) {
        let k = self.table.kmer_size;
        for kmer in canonical_kmers(seq, k) {
            self.table.add(kmer, 1);
        }
    }
}

impl KmerCounts for KmerCounter {
    fn table(&self) -> &CountTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut CountTable {
        &mut self.table
    }
}

/// Counts loaded from a `kmer<TAB>count` dump file
#[derive(Clone, Debug)]
pub struct KmerCountDump {
    table: CountTable,
}

impl KmerCountDump {
    /// Load a dump; both orientations of a k-mer are summed.
    pub fn open(path: &Path, kmer_size: usize) -> Result<Self> {
        if !path.exists() {
            return Err(TyperError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let reader = BufReader::new(File::open(path)?);
        let mut table = CountTable::new(kmer_size);

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(kmer), Some(count)) = (parts.next(), parts.next()) else {
                return Err(TyperError::parse(line_num + 1, "expected <kmer> <count>"));
            };
            if kmer.len() != kmer_size {
                return Err(TyperError::parse(
                    line_num + 1,
                    format!("k-mer of length {} but k = {}", kmer.len(), kmer_size),
                ));
            }
            let count: u64 = count
                .parse()
                .map_err(|_| TyperError::parse(line_num + 1, format!("invalid count '{count}'")))?;
            let Some(canonical) = CanonicalKmer::from_bases(kmer.as_bytes()) else {
                return Err(TyperError::parse(
                    line_num + 1,
                    format!("k-mer '{kmer}' contains a non-ACGT base"),
                ));
            };
            if count > 0 {
                table.add(canonical, count);
            }
        }

        debug!(path = ?path, n_kmers = table.len(), "loaded k-mer count dump");
        Ok(Self { table })
    }
}

impl KmerCounts for KmerCountDump {
    fn table(&self) -> &CountTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut CountTable {
        &mut self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_counter_is_canonical() {
        let counter = KmerCounter::from_sequences(3, [b"AAAT".as_slice(), b"TTT".as_slice()]);
        assert_eq!(counter.count_of(b"AAA"), 2);
        assert_eq!(counter.count_of(b"TTT"), 2);
        assert_eq!(counter.count_of(b"ATT"), 1);
        assert_eq!(counter.count_of(b"CCC"), 0);
        assert_eq!(counter.count_of(b"AAAA"), 0);
    }

    #[test]
    fn test_peak_skips_error_tail() {
        //           0  1   2  3  4  5   6  7  8
        let histo = [0, 50, 9, 2, 8, 20, 9, 3, 40];
        assert_eq!(peak_of(&histo), Some(5));
        assert_eq!(peak_of(&[0, 0, 0]), None);
        assert_eq!(peak_of(&[0, 5, 3, 1]), Some(1));
    }

    #[test]
    fn test_histogram_file() {
        let mut counter = KmerCounter::new(3);
        for _ in 0..4 {
            counter.add_sequence(b"ACG");
        }
        counter.add_sequence(b"CCA");
        let out = tempfile::NamedTempFile::new().unwrap();
        let peak = counter.compute_histogram(5, Some(out.path())).unwrap();
        assert_eq!(peak, 4);
        let text = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(text, "1\t1\n2\t0\n3\t0\n4\t1\n5\t0\n");
    }

    #[test]
    fn test_dump_loading_and_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "AAC\t7").unwrap();
        writeln!(file, "GTT\t3").unwrap();
        let dump = KmerCountDump::open(file.path(), 3).unwrap();
        assert_eq!(dump.count_of(b"AAC"), 10);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "AACG\t7").unwrap();
        assert!(matches!(
            KmerCountDump::open(bad.path(), 3),
            Err(TyperError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_correction_removes_error_kmers() {
        let genome = KmerCounter::from_sequences(3, [b"ACGTAC".as_slice()]);
        let mut reads = KmerCounter::new(3);
        for _ in 0..20 {
            reads.add_sequence(b"ACGTAC");
        }
        reads.add_sequence(b"GGG");
        let training = tempfile::NamedTempFile::new().unwrap();
        let summary = reads
            .correct_read_counts(&genome, &[], training.path(), 1, 0.5)
            .unwrap();
        assert_eq!(summary.removed_error_kmers, 1);
        assert_eq!(reads.count_of(b"GGG"), 0);
        assert!(reads.count_of(b"ACG") > 0);
        assert!(std::fs::read_to_string(training.path()).is_ok());
    }

    #[test]
    fn test_correction_rescales_context_bias() {
        // every canonical 3-mer once in the genome; reads over-represent
        // k-mers with a C/G middle base two to one
        let mut kmers: Vec<Vec<u8>> = Vec::new();
        for a in b"ACGT" {
            for b in b"ACGT" {
                for c in b"ACGT" {
                    let km = CanonicalKmer::from_bases(&[*a, *b, *c]).unwrap().to_bases(3);
                    if !kmers.contains(&km) {
                        kmers.push(km);
                    }
                }
            }
        }
        assert_eq!(kmers.len(), 32);
        let genome = KmerCounter::from_sequences(3, kmers.iter().map(Vec::as_slice));
        let mut reads = KmerCounter::new(3);
        for km in &kmers {
            let times = if matches!(km[1], b'A' | b'T') { 20 } else { 40 };
            for _ in 0..times {
                reads.add_sequence(km);
            }
        }

        let training = tempfile::NamedTempFile::new().unwrap();
        let summary = reads
            .correct_read_counts(&genome, &[], training.path(), 1, 0.01)
            .unwrap();
        assert_eq!(summary.removed_error_kmers, 0);
        assert_eq!(summary.training_kmers, 32);
        assert_eq!(summary.trained_contexts, 2);

        let text = std::fs::read_to_string(training.path()).unwrap();
        assert_eq!(text, "A\t16\t0.666667\nC\t16\t1.333333\n");
        for km in &kmers {
            assert_eq!(reads.count_of(km), 30, "{}", String::from_utf8_lossy(km));
        }
    }

    #[test]
    fn test_correction_rejects_bad_small_k() {
        let genome = KmerCounter::new(3);
        let mut reads = KmerCounter::from_sequences(3, [b"ACGT".as_slice()]);
        let training = tempfile::NamedTempFile::new().unwrap();
        assert!(reads
            .correct_read_counts(&genome, &[], training.path(), 4, 0.01)
            .is_err());
    }
}
