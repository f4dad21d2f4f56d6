use crate::similarity::cache::ProbCache;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel marking a table cell that has not been computed yet. Valid
/// entries are logs of probabilities in (0, 1] and therefore never positive.
const UNCOMPUTED: f64 = f64::MAX;

/// Lazily filled table of log-probabilities indexed by
/// (number of matches, number of mismatches) in a read overlap.
///
/// Cells are f64 bits behind relaxed atomics so the table can be consulted
/// from a parallel region: two threads may compute the same cell
/// concurrently, but they store the same deterministic value.
pub struct LogProbTable {
    size: usize,
    cells: Vec<AtomicU64>,
}

impl LogProbTable {
    pub fn filled(size: usize) -> LogProbTable {
        let cells = (0..size * size)
            .map(|_| AtomicU64::new(UNCOMPUTED.to_bits()))
            .collect();
        LogProbTable { size, cells }
    }

    pub fn get(&self, x_s: usize, x_d: usize) -> Option<f64> {
        let bits = self.cells[x_s * self.size + x_d].load(Ordering::Relaxed);
        let value = f64::from_bits(bits);
        (value != UNCOMPUTED).then_some(value)
    }

    fn set(&self, x_s: usize, x_d: usize, value: f64) {
        self.cells[x_s * self.size + x_d].store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Log-probability of observing `x_s` matches and `x_d` mismatches in the
/// overlap of two reads from cells with the same genotype.
pub fn log_prob_same_genotype(
    x_s: usize,
    x_d: usize,
    cache: &ProbCache,
    log_probs: &LogProbTable,
) -> f64 {
    if let Some(value) = log_probs.get(x_s, x_d) {
        return value;
    }
    let mut p = 0.0;
    for k in 0..=x_s {
        for l in 0..=x_d {
            p += cache.comb(x_s, k)
                * cache.comb(x_d, l)
                * cache.pow_1_h_epsilon2[k + l]
                * 0.5
                * (cache.pow_p_same_same[k] * cache.pow_p_same_diff[l]
                    + cache.pow_p_diff_same[k] * cache.pow_p_diff_diff[l])
                * cache.pow_h_epsilon2[x_s + x_d - k - l]
                * cache.pow_p_same_same[x_s - k]
                * cache.pow_p_same_diff[x_d - l];
        }
    }
    p *= cache.comb(x_s + x_d, x_s);
    let value = p.ln();
    log_probs.set(x_s, x_d, value);
    value
}

/// Log-probability of observing `x_s` matches and `x_d` mismatches in the
/// overlap of two reads from cells with different genotypes.
pub fn log_prob_diff_genotype(
    x_s: usize,
    x_d: usize,
    cache: &ProbCache,
    log_probs: &LogProbTable,
) -> f64 {
    if let Some(value) = log_probs.get(x_s, x_d) {
        return value;
    }
    let mut prob = 0.0;
    for k in 0..=x_s {
        for l in 0..=x_d {
            for p in 0..=x_s - k {
                for q in 0..=x_d - l {
                    prob += cache.comb(x_s, k)
                        * cache.comb(x_d, l)
                        * cache.comb(x_s - k, p)
                        * cache.comb(x_d - l, q)
                        * cache.pow_1_h_epsilon[k + l]
                        * 0.5
                        * (cache.pow_p_same_same[k] * cache.pow_p_same_diff[l]
                            + cache.pow_p_diff_same[k] * cache.pow_p_diff_diff[l])
                        * cache.pow_epsilon[x_s + x_d - k - l - p - q]
                        * cache.pow_0_5[x_s + x_d - k - l - p - q]
                        * cache.pow_pss_pds[x_s - k - p]
                        * cache.pow_psd_pdd[x_d - l - q]
                        * cache.pow_h[p + q]
                        * cache.pow_p_same_same[p]
                        * cache.pow_p_same_diff[q];
                }
            }
        }
    }
    prob *= cache.comb(x_s + x_d, x_s);
    let value = prob.ln();
    log_probs.set(x_s, x_d, value);
    value
}
