use crate::pileup::PosData;

const MAX_ITERATIONS: usize = 50;
const CONVERGENCE: f64 = 1e-6;

/// Refines a soft cluster assignment in place by expectation maximization.
///
/// Each iteration re-estimates, per position, the base distribution of the
/// two tentative branches (cells weighted by `1 - c` and `c` respectively)
/// and reassigns every cell from the log-likelihood of its observed bases
/// under the two distributions. Runs single-threaded so the whole pipeline
/// stays reproducible.
pub fn expectation_maximization(
    pos_data: &[Vec<PosData>],
    cell_id_to_pos: &[u32],
    seq_error_rate: f64,
    cluster: &mut [f64],
) {
    if cluster.is_empty() {
        return;
    }
    let num_cells = cluster.len();

    for _ in 0..MAX_ITERATIONS {
        let mut log_likelihood_a = vec![0.0; num_cells];
        let mut log_likelihood_b = vec![0.0; num_cells];

        for pd in pos_data.iter().flatten() {
            let mut counts_a = [0.0f64; 4];
            let mut counts_b = [0.0f64; 4];
            for cell in &pd.cells {
                let pos = cell_id_to_pos[cell.cell_id as usize] as usize;
                counts_a[cell.base as usize] += 1.0 - cluster[pos];
                counts_b[cell.base as usize] += cluster[pos];
            }
            let emissions_a = emission_probs(&counts_a, seq_error_rate);
            let emissions_b = emission_probs(&counts_b, seq_error_rate);
            for cell in &pd.cells {
                let pos = cell_id_to_pos[cell.cell_id as usize] as usize;
                log_likelihood_a[pos] += emissions_a[cell.base as usize].ln();
                log_likelihood_b[pos] += emissions_b[cell.base as usize].ln();
            }
        }

        let mut delta = 0.0f64;
        for (pos, value) in cluster.iter_mut().enumerate() {
            let updated = sigmoid(log_likelihood_b[pos] - log_likelihood_a[pos]);
            delta = delta.max((updated - *value).abs());
            *value = updated;
        }
        if delta < CONVERGENCE {
            break;
        }
    }
}

/// Probability of reading each base from a branch with the given weighted
/// base counts: the observed frequency blurred by the sequencing error rate.
/// A branch with no observations at the position is uninformative.
fn emission_probs(counts: &[f64; 4], seq_error_rate: f64) -> [f64; 4] {
    let total: f64 = counts.iter().sum();
    let mut probs = [0.25; 4];
    if total > 0.0 {
        for (prob, &count) in probs.iter_mut().zip(counts) {
            let freq = count / total;
            *prob = freq * (1.0 - seq_error_rate) + (1.0 - freq) * seq_error_rate / 3.0;
        }
    }
    probs
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pileup::CellData;

    /// Six cells at many positions: cells 0-2 always read base 0, cells 3-5
    /// always read base 1.
    fn two_genotypes(num_positions: u32) -> Vec<Vec<PosData>> {
        let chromosome = (1..=num_positions)
            .map(|position| PosData {
                position,
                cells: (0..6)
                    .map(|cell_id| CellData {
                        cell_id,
                        read_id: cell_id,
                        base: if cell_id < 3 { 0 } else { 1 },
                    })
                    .collect(),
            })
            .collect();
        vec![chromosome]
    }

    #[test]
    fn test_refines_toward_hard_assignment() {
        let pos_data = two_genotypes(30);
        let cell_id_to_pos: Vec<u32> = (0..6).collect();
        let mut cluster = vec![0.3, 0.35, 0.3, 0.7, 0.65, 0.7];
        expectation_maximization(&pos_data, &cell_id_to_pos, 0.001, &mut cluster);
        assert!(cluster[..3].iter().all(|&c| c < 0.05), "{:?}", cluster);
        assert!(cluster[3..].iter().all(|&c| c > 0.95), "{:?}", cluster);
    }

    #[test]
    fn test_preserves_confident_assignment() {
        let pos_data = two_genotypes(30);
        let cell_id_to_pos: Vec<u32> = (0..6).collect();
        let mut cluster = vec![0.01, 0.01, 0.01, 0.99, 0.99, 0.99];
        expectation_maximization(&pos_data, &cell_id_to_pos, 0.001, &mut cluster);
        assert!(cluster[..3].iter().all(|&c| c < 0.05));
        assert!(cluster[3..].iter().all(|&c| c > 0.95));
    }

    #[test]
    fn test_cell_without_observations_is_ambiguous() {
        // only cells 0 and 1 are ever observed
        let pos_data = vec![vec![PosData {
            position: 10,
            cells: vec![
                CellData {
                    cell_id: 0,
                    read_id: 0,
                    base: 0,
                },
                CellData {
                    cell_id: 1,
                    read_id: 1,
                    base: 1,
                },
            ],
        }]];
        let cell_id_to_pos: Vec<u32> = (0..3).collect();
        let mut cluster = vec![0.2, 0.8, 0.4];
        expectation_maximization(&pos_data, &cell_id_to_pos, 0.001, &mut cluster);
        assert_eq!(cluster[2], 0.5);
    }

    #[test]
    fn test_empty_inputs() {
        let mut cluster: Vec<f64> = Vec::new();
        expectation_maximization(&[], &[], 0.001, &mut cluster);
        assert!(cluster.is_empty());

        let mut cluster = vec![0.5, 0.5];
        expectation_maximization(&[], &[0, 1], 0.001, &mut cluster);
        assert_eq!(cluster, vec![0.5, 0.5]);
    }
}
