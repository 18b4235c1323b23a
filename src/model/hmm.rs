//! # Pangenome Genotyping HMM
//!
//! Hidden Markov model over pairs of haplotype paths, one column per variant.
//! The state space of a column is built from the paths present at that
//! variant, so transition matrices differ in shape from step to step.
//!
//! ## Key Concepts
//! - `States`: pairs of paths. Genotyping uses unordered pairs, phasing
//!   ordered pairs.
//! - `Transitions`: both haplotypes switch paths independently (see
//!   [`ModelParams`]); the pair transition is the product of both.
//! - `Emissions`: likelihood of the unique k-mer counts under the genotype of
//!   the two paths' alleles (see [`ColumnEmissions`]).
//!
//! ## Pair matrices
//! Both state spaces are stored as a full `n x n` matrix over path indices.
//! For unordered states `{a, b}` with `a != b` the mass is split evenly over
//! `(a, b)` and `(b, a)`; with that layout one step of either chain is
//! `E ∘ (Tᵀ · F · T)`, which costs O(n³) instead of O(n⁴). The two chains only
//! differ in their initial distribution.
//!
//! Forward and backward values are rescaled to sum 1 at every column.

use tracing::{debug, instrument};

use crate::data::UniqueKmers;
use crate::error::Result;
use crate::model::emissions::ColumnEmissions;
use crate::model::genotyping_result::GenotypingResult;
use crate::model::parameters::ModelParams;
use crate::model::transitions::TransitionMatrix;

/// Pair state layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateSpace {
    /// Unordered path pairs, used for genotyping
    Unordered,
    /// Ordered path pairs, used for phasing
    Ordered,
}

impl StateSpace {
    /// Uniform prior over the states of an `n`-path column, in pair-matrix form
    fn initial(self, n: usize) -> Vec<f64> {
        let mut init = vec![0.0; n * n];
        match self {
            StateSpace::Ordered => init.fill(1.0 / (n * n) as f64),
            StateSpace::Unordered => {
                let n_states = (n * (n + 1) / 2) as f64;
                for a in 0..n {
                    for b in 0..n {
                        init[a * n + b] = if a == b {
                            1.0 / n_states
                        } else {
                            0.5 / n_states
                        };
                    }
                }
            }
        }
        init
    }
}

/// Which algorithms to run, and on which paths
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HmmOptions {
    /// Run forward-backward for genotype posteriors
    pub genotyping: bool,
    /// Run Viterbi for the best phased path pair
    pub phasing: bool,
    /// Restrict states to these path ids
    pub only_paths: Option<Vec<usize>>,
}

impl Default for HmmOptions {
    fn default() -> Self {
        Self {
            genotyping: true,
            phasing: true,
            only_paths: None,
        }
    }
}

/// Genotyping/phasing HMM over the unique k-mers of one chromosome
pub struct Hmm<'a> {
    unique_kmers: &'a [UniqueKmers],
    columns: Vec<ColumnEmissions>,
    /// `transitions[i]` leads from column `i` to column `i + 1`
    transitions: Vec<TransitionMatrix>,
    results: Vec<GenotypingResult>,
    log_likelihood: Option<f64>,
}

fn normalize(values: &mut [f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
    sum
}

impl<'a> Hmm<'a> {
    /// Build the model and run the requested algorithms.
    #[instrument(skip_all, fields(n_variants = unique_kmers.len()))]
    pub fn new(
        unique_kmers: &'a [UniqueKmers],
        params: &ModelParams,
        options: &HmmOptions,
    ) -> Result<Self> {
        let only_paths = options.only_paths.as_deref();
        let columns = unique_kmers
            .iter()
            .map(|uk| ColumnEmissions::new(uk, only_paths))
            .collect::<Result<Vec<_>>>()?;

        let transitions = columns
            .windows(2)
            .map(|w| {
                TransitionMatrix::new(params, w[0].position(), w[0].paths(), w[1].position(), w[1].paths())
            })
            .collect();

        let results = unique_kmers
            .iter()
            .map(|uk| GenotypingResult::new(uk.get_variant_position(), uk.size(), uk.get_coverage()))
            .collect();

        let mut hmm = Self {
            unique_kmers,
            columns,
            transitions,
            results,
            log_likelihood: None,
        };

        if options.genotyping {
            hmm.compute_forward_backward();
        }
        if options.phasing {
            hmm.compute_viterbi();
        }
        debug!(
            n_columns = hmm.columns.len(),
            log_likelihood = ?hmm.log_likelihood,
            "hmm finished"
        );
        Ok(hmm)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Unique k-mers the model was built from
    pub fn unique_kmers(&self) -> &'a [UniqueKmers] {
        self.unique_kmers
    }

    /// One result per variant, in variant order
    pub fn get_genotyping_result(&self) -> &[GenotypingResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<GenotypingResult> {
        self.results
    }

    /// Log-likelihood of the evidence (relative to the rescaled emissions),
    /// available after forward-backward
    pub fn log_likelihood(&self) -> Option<f64> {
        self.log_likelihood
    }

    fn compute_forward(&self, space: StateSpace) -> (Vec<Vec<f64>>, f64) {
        let mut forward: Vec<Vec<f64>> = Vec::with_capacity(self.columns.len());
        let mut log_likelihood = 0.0;
        for (i, column) in self.columns.iter().enumerate() {
            let mut values = match i {
                0 => space.initial(column.n_paths()),
                _ => self.transitions[i - 1].propagate_forward(&forward[i - 1]),
            };
            for (v, e) in values.iter_mut().zip(column.probs()) {
                *v *= e;
            }
            log_likelihood += normalize(&mut values).ln();
            forward.push(values);
        }
        (forward, log_likelihood)
    }

    fn compute_backward(&self) -> Vec<Vec<f64>> {
        let n_columns = self.columns.len();
        let mut backward: Vec<Vec<f64>> = vec![Vec::new(); n_columns];
        for i in (0..n_columns).rev() {
            let mut values = if i + 1 == n_columns {
                let n = self.columns[i].n_paths();
                vec![1.0; n * n]
            } else {
                let next = &self.columns[i + 1];
                let weighted: Vec<f64> = backward[i + 1]
                    .iter()
                    .zip(next.probs())
                    .map(|(b, e)| b * e)
                    .collect();
                self.transitions[i].propagate_backward(&weighted)
            };
            normalize(&mut values);
            backward[i] = values;
        }
        backward
    }

    /// Forward-backward over unordered path pairs; posteriors are summed per
    /// allele pair.
    #[instrument(skip_all)]
    fn compute_forward_backward(&mut self) {
        let (forward, log_likelihood) = self.compute_forward(StateSpace::Unordered);
        let backward = self.compute_backward();

        for (i, column) in self.columns.iter().enumerate() {
            let n = column.n_paths();
            let result = &mut self.results[i];
            for a in 0..n {
                for b in 0..n {
                    let k = a * n + b;
                    let posterior = forward[i][k] * backward[i][k];
                    result.add_to_likelihood(column.allele(a), column.allele(b), posterior);
                }
            }
            result.normalize();
        }
        self.log_likelihood = Some(log_likelihood);
    }

    /// Viterbi over ordered path pairs with per-state back-pointers.
    ///
    /// The max over predecessors factorizes like the sum in the forward pass:
    /// `max_b T[b][d] · max_a δ[a][b] · T[a][c]`. Ties resolve to the lowest
    /// path index.
    #[instrument(skip_all)]
    fn compute_viterbi(&mut self) {
        let n_columns = self.columns.len();
        if n_columns == 0 {
            return;
        }

        let first = &self.columns[0];
        let n0 = first.n_paths();
        let log_init = -((n0 * n0) as f64).ln();
        let mut delta: Vec<f64> = first.probs().iter().map(|e| log_init + e.ln()).collect();
        // backtrack[i][c * n + d] = predecessor (a, b) in column i - 1
        let mut backtrack: Vec<Vec<(usize, usize)>> = Vec::with_capacity(n_columns);
        backtrack.push(Vec::new());

        for i in 1..n_columns {
            let transition = &self.transitions[i - 1];
            let column = &self.columns[i];
            let (p, q) = (transition.n_from(), transition.n_to());

            // best_a[c][b] = max_a delta[a][b] + log T[a][c]
            let mut best_a = vec![(f64::NEG_INFINITY, 0usize); q * p];
            for c in 0..q {
                for b in 0..p {
                    let slot = &mut best_a[c * p + b];
                    for a in 0..p {
                        let score = delta[a * p + b] + transition.log_prob(a, c);
                        if score > slot.0 {
                            *slot = (score, a);
                        }
                    }
                }
            }

            let mut next = vec![f64::NEG_INFINITY; q * q];
            let mut pointers = vec![(0usize, 0usize); q * q];
            for c in 0..q {
                for d in 0..q {
                    let mut best = (f64::NEG_INFINITY, 0usize);
                    for b in 0..p {
                        let score = best_a[c * p + b].0 + transition.log_prob(b, d);
                        if score > best.0 {
                            best = (score, b);
                        }
                    }
                    let b = best.1;
                    next[c * q + d] = best.0 + column.prob(c, d).ln();
                    pointers[c * q + d] = (best_a[c * p + b].1, b);
                }
            }

            let max = next.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if max.is_finite() {
                for v in next.iter_mut() {
                    *v -= max;
                }
            }
            delta = next;
            backtrack.push(pointers);
        }

        // Best final state, then follow the back-pointers.
        let n_last = self.columns[n_columns - 1].n_paths();
        let mut state = (0usize, 0usize);
        let mut best = f64::NEG_INFINITY;
        for c in 0..n_last {
            for d in 0..n_last {
                if delta[c * n_last + d] > best {
                    best = delta[c * n_last + d];
                    state = (c, d);
                }
            }
        }

        for i in (0..n_columns).rev() {
            let column = &self.columns[i];
            let (c, d) = state;
            self.results[i].set_haplotypes(
                (column.allele(c), column.allele(d)),
                (column.paths()[c], column.paths()[d]),
            );
            if i > 0 {
                state = backtrack[i][c * column.n_paths() + d];
            }
        }
    }
}
