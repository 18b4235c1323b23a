//! # Path Transition Matrices
//!
//! Per-haplotype transition matrix between the path sets of two neighbouring
//! variants. A pair state moves both haplotypes independently, so the pair
//! transition `(a, b) -> (c, d)` is `T[a][c] * T[b][d]` and never has to be
//! materialised.

use crate::model::parameters::ModelParams;

/// Row-major `n_from x n_to` matrix of haplotype transition probabilities
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionMatrix {
    n_from: usize,
    n_to: usize,
    probs: Vec<f64>,
    log_probs: Vec<f64>,
}

impl TransitionMatrix {
    /// Build transitions from the paths at `from_pos` onto the paths at `to_pos`.
    pub fn new(
        params: &ModelParams,
        from_pos: usize,
        from_paths: &[usize],
        to_pos: usize,
        to_paths: &[usize],
    ) -> Self {
        let n_from = from_paths.len();
        let n_to = to_paths.len();
        let hap = params.haplotype_transition(from_pos, to_pos, n_to);
        let uniform = 1.0 / n_to.max(1) as f64;

        let mut probs = Vec::with_capacity(n_from * n_to);
        for &from in from_paths {
            let continues = to_paths.contains(&from);
            for &to in to_paths {
                let p = if !continues {
                    uniform
                } else if from == to {
                    hap.stay
                } else {
                    hap.switch
                };
                probs.push(p);
            }
        }
        let log_probs = probs.iter().map(|p| p.ln()).collect();

        Self {
            n_from,
            n_to,
            probs,
            log_probs,
        }
    }

    pub fn n_from(&self) -> usize {
        self.n_from
    }

    pub fn n_to(&self) -> usize {
        self.n_to
    }

    #[inline]
    pub fn prob(&self, from: usize, to: usize) -> f64 {
        self.probs[from * self.n_to + to]
    }

    #[inline]
    pub fn log_prob(&self, from: usize, to: usize) -> f64 {
        self.log_probs[from * self.n_to + to]
    }

    /// Push a pair matrix forward: `Tᵀ · F · T` (`n_from²` -> `n_to²`).
    pub fn propagate_forward(&self, pairs: &[f64]) -> Vec<f64> {
        let (p, q) = (self.n_from, self.n_to);
        // tmp[c][b] = sum_a T[a][c] * F[a][b]
        let mut tmp = vec![0.0; q * p];
        for a in 0..p {
            for c in 0..q {
                let t = self.prob(a, c);
                if t == 0.0 {
                    continue;
                }
                let row = &pairs[a * p..(a + 1) * p];
                let out = &mut tmp[c * p..(c + 1) * p];
                for (o, f) in out.iter_mut().zip(row) {
                    *o += t * f;
                }
            }
        }
        // out[c][d] = sum_b tmp[c][b] * T[b][d]
        let mut out = vec![0.0; q * q];
        for c in 0..q {
            for b in 0..p {
                let v = tmp[c * p + b];
                if v == 0.0 {
                    continue;
                }
                for d in 0..q {
                    out[c * q + d] += v * self.prob(b, d);
                }
            }
        }
        out
    }

    /// Pull a pair matrix backward: `T · M · Tᵀ` (`n_to²` -> `n_from²`).
    pub fn propagate_backward(&self, pairs: &[f64]) -> Vec<f64> {
        let (p, q) = (self.n_from, self.n_to);
        // tmp[a][d] = sum_c T[a][c] * M[c][d]
        let mut tmp = vec![0.0; p * q];
        for a in 0..p {
            for c in 0..q {
                let t = self.prob(a, c);
                if t == 0.0 {
                    continue;
                }
                let row = &pairs[c * q..(c + 1) * q];
                let out = &mut tmp[a * q..(a + 1) * q];
                for (o, m) in out.iter_mut().zip(row) {
                    *o += t * m;
                }
            }
        }
        // out[a][b] = sum_d tmp[a][d] * T[b][d]
        let mut out = vec![0.0; p * p];
        for a in 0..p {
            for b in 0..p {
                let mut sum = 0.0;
                for d in 0..q {
                    sum += tmp[a * q + d] * self.prob(b, d);
                }
                out[a * p + b] = sum;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_pair(t: &TransitionMatrix, a: usize, b: usize, c: usize, d: usize) -> f64 {
        t.prob(a, c) * t.prob(b, d)
    }

    #[test]
    fn test_rows_are_distributions() {
        let params = ModelParams::default();
        let t = TransitionMatrix::new(&params, 100, &[0, 1, 2], 90_000, &[1, 2, 3, 4]);
        for a in 0..3 {
            let row: f64 = (0..4).map(|c| t.prob(a, c)).sum();
            assert!((row - 1.0).abs() < 1e-12);
        }
        // path 0 does not continue
        assert!((t.prob(0, 2) - 0.25).abs() < 1e-12);
        assert!(t.prob(1, 0) > t.prob(1, 1));
    }

    #[test]
    fn test_propagation_matches_naive_sums() {
        let params = ModelParams::new(50.0, 1.0, 1.0).unwrap();
        let t = TransitionMatrix::new(&params, 0, &[0, 1], 20_000, &[0, 1, 2]);
        let fwd = vec![0.1, 0.2, 0.3, 0.4];
        let out = t.propagate_forward(&fwd);
        for c in 0..3 {
            for d in 0..3 {
                let mut expected = 0.0;
                for a in 0..2 {
                    for b in 0..2 {
                        expected += fwd[a * 2 + b] * naive_pair(&t, a, b, c, d);
                    }
                }
                assert!((out[c * 3 + d] - expected).abs() < 1e-12);
            }
        }

        let bwd: Vec<f64> = (0..9).map(|i| i as f64 * 0.1).collect();
        let back = t.propagate_backward(&bwd);
        for a in 0..2 {
            for b in 0..2 {
                let mut expected = 0.0;
                for c in 0..3 {
                    for d in 0..3 {
                        expected += naive_pair(&t, a, b, c, d) * bwd[c * 3 + d];
                    }
                }
                assert!((back[a * 2 + b] - expected).abs() < 1e-12);
            }
        }
    }
}
