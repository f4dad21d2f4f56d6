use crate::cluster::{expectation_maximization, spectral_bipartition, Partition};
use crate::pileup::{is_significant, PosData};
use crate::similarity::{compute_similarity_matrix, SimilarityParams};
use crate::utils::Result;
use crate::writers::MatrixWriter;
use arrayvec::ArrayVec;
use itertools::Itertools;

/// Cells with a soft assignment below this bound form branch A.
const BRANCH_A_CUTOFF: f64 = 0.05;
/// Cells with a soft assignment above this bound form branch B; everything
/// in between is dropped from the recursion.
const BRANCH_B_CUTOFF: f64 = 0.95;

/// Everything that stays constant across the recursion.
pub struct DivideContext<'a> {
    pub params: SimilarityParams,
    pub max_fragment_length: u32,
    /// A branch is recursed into only while its average coverage per
    /// retained position stays above this value.
    pub coverage_threshold: f64,
    pub writer: &'a MatrixWriter,
    pub pool: &'a rayon::ThreadPool,
}

/// One half of a bipartition, rebuilt for the next recursion level.
struct Branch {
    suffix: char,
    cell_id_to_pos: Vec<u32>,
    pos_to_cell_id: Vec<u32>,
    pos_data: Vec<Vec<PosData>>,
    total_coverage: u64,
    total_positions: u64,
}

impl Branch {
    fn new(suffix: char, num_cells: usize) -> Branch {
        Branch {
            suffix,
            cell_id_to_pos: vec![0; num_cells],
            pos_to_cell_id: Vec::new(),
            pos_data: Vec::new(),
            total_coverage: 0,
            total_positions: 0,
        }
    }

    fn add_cell(&mut self, cell_id: u32) {
        self.cell_id_to_pos[cell_id as usize] = self.pos_to_cell_id.len() as u32;
        self.pos_to_cell_id.push(cell_id);
    }

    fn average_coverage(&self) -> f64 {
        if self.total_positions == 0 {
            0.0
        } else {
            self.total_coverage as f64 / self.total_positions as f64
        }
    }
}

/// Recursively bipartitions a sub-cluster: similarity matrix, spectral
/// split, EM refinement, then a fresh pileup per branch filtered down to the
/// branch's cells and still-significant positions.
pub fn divide(
    pos_data: &[Vec<PosData>],
    cell_id_to_pos: &[u32],
    pos_to_cell_id: &[u32],
    label: &str,
    ctx: &DivideContext,
) -> Result<()> {
    if pos_to_cell_id.is_empty() {
        return Ok(());
    }
    if !label.is_empty() {
        log::info!(
            "Clustering sub-cluster {} with {} cells",
            label,
            pos_to_cell_id.len()
        );
    }

    log::info!("Computing similarity matrix...");
    let sim_mat = compute_similarity_matrix(
        pos_data,
        pos_to_cell_id.len(),
        ctx.max_fragment_length,
        cell_id_to_pos,
        &ctx.params,
        ctx.pool,
    )?;
    ctx.writer.write_matrix(label, &sim_mat)?;

    log::info!("Performing spectral clustering...");
    let mut cluster = match spectral_bipartition(&sim_mat) {
        Partition::Done => {
            log::info!("Cluster {} cannot be split further", display_label(label));
            return Ok(());
        }
        Partition::Split(cluster) => cluster,
    };

    log::info!("Refining cluster assignment via expectation maximization...");
    expectation_maximization(
        pos_data,
        cell_id_to_pos,
        ctx.params.seq_error_rate,
        &mut cluster,
    );
    ctx.writer.write_assignment(label, &cluster)?;

    let mut branches: ArrayVec<Branch, 2> = ArrayVec::new();
    branches.push(Branch::new('A', cell_id_to_pos.len()));
    branches.push(Branch::new('B', cell_id_to_pos.len()));
    for (cell_idx, &value) in cluster.iter().enumerate() {
        let cell_id = pos_to_cell_id[cell_idx];
        if value < BRANCH_A_CUTOFF {
            branches[0].add_cell(cell_id);
        } else if value > BRANCH_B_CUTOFF {
            branches[1].add_cell(cell_id);
        }
    }
    log::debug!(
        "Cluster {}: {} cells in A, {} cells in B, {} dropped",
        display_label(label),
        branches[0].pos_to_cell_id.len(),
        branches[1].pos_to_cell_id.len(),
        cluster.len() - branches[0].pos_to_cell_id.len() - branches[1].pos_to_cell_id.len()
    );

    for chromosome_data in pos_data {
        let mut retained: ArrayVec<Vec<PosData>, 2> = ArrayVec::new();
        retained.push(Vec::new());
        retained.push(Vec::new());
        for pd in chromosome_data {
            for (branch, positions) in branches.iter_mut().zip(retained.iter_mut()) {
                let in_branch = |value: f64| {
                    if branch.suffix == 'A' {
                        value < BRANCH_A_CUTOFF
                    } else {
                        value > BRANCH_B_CUTOFF
                    }
                };
                let cells = pd
                    .cells
                    .iter()
                    .filter(|cell| in_branch(cluster[cell_id_to_pos[cell.cell_id as usize] as usize]))
                    .copied()
                    .collect_vec();
                let filtered = PosData {
                    position: pd.position,
                    cells,
                };
                if let Some(coverage) = is_significant(&filtered, ctx.params.seq_error_rate) {
                    branch.total_coverage += coverage as u64;
                    positions.push(filtered);
                }
            }
        }
        for (branch, positions) in branches.iter_mut().zip(retained) {
            branch.total_positions += positions.len() as u64;
            branch.pos_data.push(positions);
        }
    }

    for branch in &branches {
        let coverage = branch.average_coverage();
        let branch_label = format!("{}{}", label, branch.suffix);
        log::debug!(
            "Average coverage for cluster {}: {:.2} over {} positions",
            branch_label,
            coverage,
            branch.total_positions
        );
        if coverage > ctx.coverage_threshold {
            divide(
                &branch.pos_data,
                &branch.cell_id_to_pos,
                &branch.pos_to_cell_id,
                &branch_label,
                ctx,
            )?;
        }
    }
    Ok(())
}

fn display_label(label: &str) -> &str {
    if label.is_empty() {
        "root"
    } else {
        label
    }
}
