//! Pairwise genotype-similarity engine.
//!
//! Streams pileup records through a sliding window that reassembles reads,
//! compares every completed read against the rest of the window, and
//! accumulates per-cell-pair log-likelihoods of the two reads coming from
//! the same vs. a different genotype.

mod cache;
mod likelihood;
mod normalize;
mod pairwise;
mod window;

pub use cache::ProbCache;
pub use likelihood::{log_prob_diff_genotype, log_prob_same_genotype, LogProbTable};
pub use normalize::{normalize, Normalization};
pub use pairwise::{apply_updates, compare_with_reads, count_overlap, PairUpdate};
pub use window::{MateOverlap, Read, ReadWindow};

use crate::mat::Mat;
use crate::pileup::PosData;
use crate::utils::Result;
use rayon::prelude::*;

/// Completed reads batched per worker before a parallel flush is worthwhile.
const BATCH_SIZE: usize = 4;

/// Model and scheduling parameters for one similarity-matrix computation.
#[derive(Debug, Clone)]
pub struct SimilarityParams {
    /// Estimated frequency of mutated loci (epsilon).
    pub mutation_rate: f64,
    /// Estimated probability that a retained locus is homozygous germline (h).
    pub homozygous_rate: f64,
    /// Sequencing error rate (theta).
    pub seq_error_rate: f64,
    pub num_threads: usize,
    pub normalization: Normalization,
    pub mate_overlap: MateOverlap,
}

/// Accumulates log P(same genotype) and log P(different genotype) over every
/// pair of overlapping reads from different cells, then returns the
/// normalized `S_diff - S_same` similarity matrix over the `num_cells` cells
/// of the current sub-cluster.
pub fn compute_similarity_matrix(
    pos_data: &[Vec<PosData>],
    num_cells: usize,
    max_fragment_length: u32,
    cell_id_to_pos: &[u32],
    params: &SimilarityParams,
    pool: &rayon::ThreadPool,
) -> Result<Mat> {
    let mut mat_same = Mat::zeros(num_cells, num_cells);
    let mut mat_diff = Mat::zeros(num_cells, num_cells);

    // (x_s, x_d) arguments are bounded by the number of positions in a read,
    // which is at most max_fragment_length
    let table_size = max_fragment_length as usize + 1;
    let log_probs_same = LogProbTable::filled(table_size);
    let log_probs_diff = LogProbTable::filled(table_size);
    let cache = ProbCache::new(
        params.mutation_rate,
        params.homozygous_rate,
        params.seq_error_rate,
        max_fragment_length,
    );

    let total_positions: usize = pos_data.iter().map(|chromosome| chromosome.len()).sum();
    log::debug!(
        "Computing similarity matrix over {} cells from {} positions",
        num_cells,
        total_positions
    );

    let mut window = ReadWindow::new(max_fragment_length, params.mate_overlap);
    let flush_threshold = BATCH_SIZE * params.num_threads.max(1);

    for chromosome_data in pos_data {
        for pd in chromosome_data {
            window.advance(pd.position);
            if window.completed() >= flush_threshold {
                let completed = window.completed();
                flush(
                    &window,
                    completed,
                    cell_id_to_pos,
                    &cache,
                    &log_probs_same,
                    &log_probs_diff,
                    &mut mat_same,
                    &mut mat_diff,
                    pool,
                )?;
                window.evict(completed);
            }
            window.observe(pd);
        }
        // reads never span chromosomes: compare whatever is left, then reset
        flush(
            &window,
            window.len(),
            cell_id_to_pos,
            &cache,
            &log_probs_same,
            &log_probs_diff,
            &mut mat_same,
            &mut mat_diff,
            pool,
        )?;
        window.clear();
    }

    // log(P(diff) / P(same)) per cell pair
    mat_diff -= &mat_same;
    normalize(&mut mat_diff, params.normalization);
    Ok(mat_diff)
}

/// Compares the first `count` reads of the window against everything that
/// follows them. Comparisons run in parallel into per-read buffers; the
/// buffers are merged into the matrices in read order, single-threaded.
#[allow(clippy::too_many_arguments)]
fn flush(
    window: &ReadWindow,
    count: usize,
    cell_id_to_pos: &[u32],
    cache: &ProbCache,
    log_probs_same: &LogProbTable,
    log_probs_diff: &LogProbTable,
    mat_same: &mut Mat,
    mat_diff: &mut Mat,
    pool: &rayon::ThreadPool,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let batches: Vec<Vec<PairUpdate>> = pool.install(|| {
        (0..count)
            .into_par_iter()
            .with_min_len(BATCH_SIZE)
            .map(|start_idx| {
                compare_with_reads(
                    window.active_reads(),
                    window.active_keys(),
                    start_idx,
                    cell_id_to_pos,
                    cache,
                    log_probs_same,
                    log_probs_diff,
                )
            })
            .collect::<Result<_>>()
    })?;
    apply_updates(&batches, mat_same, mat_diff);
    Ok(())
}
