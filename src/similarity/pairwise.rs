use crate::mat::Mat;
use crate::similarity::cache::ProbCache;
use crate::similarity::likelihood::{
    log_prob_diff_genotype, log_prob_same_genotype, LogProbTable,
};
use crate::similarity::window::Read;
use crate::utils::Result;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

/// One pairwise contribution destined for both score matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairUpdate {
    pub row: u32,
    pub col: u32,
    pub log_same: f64,
    pub log_diff: f64,
}

/// Counts matching and mismatching bases over the shared positions of two
/// reads; positions present in only one read are skipped.
pub fn count_overlap(read1: &Read, read2: &Read) -> (u32, u32) {
    let mut x_s = 0;
    let mut x_d = 0;
    let (mut idx1, mut idx2) = (0, 0);
    while idx1 < read1.positions.len() && idx2 < read2.positions.len() {
        match read1.positions[idx1].cmp(&read2.positions[idx2]) {
            Ordering::Equal => {
                if read1.bases[idx1] == read2.bases[idx2] {
                    x_s += 1;
                } else {
                    x_d += 1;
                }
                idx1 += 1;
                idx2 += 1;
            }
            Ordering::Less => idx1 += 1,
            Ordering::Greater => idx2 += 1,
        }
    }
    (x_s, x_d)
}

/// Compares the read at `start_idx` with all subsequent reads in the window
/// and collects one update per informative pair. The score matrices are not
/// touched here so the caller can fan comparisons out across threads and
/// merge the buffered updates deterministically afterwards.
pub fn compare_with_reads(
    active_reads: &HashMap<u32, Read>,
    active_keys: &VecDeque<u32>,
    start_idx: usize,
    cell_id_to_pos: &[u32],
    cache: &ProbCache,
    log_probs_same: &LogProbTable,
    log_probs_diff: &LogProbTable,
) -> Result<Vec<PairUpdate>> {
    let mut updates = Vec::new();
    let read1 = &active_reads[&active_keys[start_idx]];
    if read1.positions.is_empty() {
        return Ok(updates);
    }
    for idx in start_idx + 1..active_keys.len() {
        let read2 = &active_reads[&active_keys[idx]];
        if read2.positions.is_empty() {
            continue;
        }
        let row = cell_id_to_pos[read1.cell_id as usize];
        let col = cell_id_to_pos[read2.cell_id as usize];
        // intra-cell pairs carry no between-cell information
        if row == col || read1.positions.last().unwrap() < read2.positions.first().unwrap() {
            continue;
        }

        let (x_s, x_d) = count_overlap(read1, read2);
        if x_s == 0 && x_d == 0 {
            continue;
        }

        let log_same = log_prob_same_genotype(x_s as usize, x_d as usize, cache, log_probs_same);
        let log_diff = log_prob_diff_genotype(x_s as usize, x_d as usize, cache, log_probs_diff);
        if !log_same.is_finite() || !log_diff.is_finite() {
            return Err(format!(
                "Non-finite log-likelihood for an overlap with {} matches and {} mismatches; \
                 model parameters are outside their domain",
                x_s, x_d
            ));
        }
        updates.push(PairUpdate {
            row,
            col,
            log_same,
            log_diff,
        });
    }
    Ok(updates)
}

/// Applies buffered updates to both matrices, keeping them symmetric.
/// Batches are applied in order, so the result does not depend on how the
/// comparisons were scheduled.
pub fn apply_updates(batches: &[Vec<PairUpdate>], mat_same: &mut Mat, mat_diff: &mut Mat) {
    for update in batches.iter().flatten() {
        mat_same.add_sym(update.row as usize, update.col as usize, update.log_same);
        mat_diff.add_sym(update.row as usize, update.col as usize, update.log_diff);
    }
}
