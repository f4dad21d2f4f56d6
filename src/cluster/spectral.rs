use crate::mat::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Outcome of one bipartition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Partition {
    /// The similarity structure does not support a further split.
    Done,
    /// Soft assignment in [0, 1] per cell; values near 0 and 1 mark the two
    /// halves, values in between are ambiguous.
    Split(Vec<f64>),
}

const POWER_ITERATIONS: usize = 1000;
const CONVERGENCE: f64 = 1e-12;
const TWO_MEANS_ITERATIONS: usize = 100;
/// Floor applied to variances in the model-selection fits.
const VARIANCE_FLOOR: f64 = 1e-12;

/// Bipartitions cells based on their similarity matrix.
///
/// The Fiedler direction of the symmetric-normalized affinity
/// `D^{-1/2} W D^{-1/2}` is found by shifted power iteration with the trivial
/// leading eigenvector deflated. The components are split by two means, the
/// soft assignment is derived from squared distances to the two centers, and
/// an AIC comparison of one- vs. two-component Gaussian fits on the
/// components decides whether the split is real.
pub fn spectral_bipartition(sim_mat: &Mat) -> Partition {
    let k = sim_mat.rows();
    if k < 2 {
        return Partition::Done;
    }

    let degrees: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| sim_mat[(i, j)]).sum())
        .collect();
    if degrees.iter().all(|&d| d <= 0.0) {
        return Partition::Done;
    }
    // isolated cells get a tiny degree so the normalization stays finite
    let scale: Vec<f64> = degrees.iter().map(|&d| d.max(1e-12).sqrt()).collect();

    // the leading eigenvector of D^{-1/2} W D^{-1/2} is D^{1/2} * 1
    let mut top = scale.clone();
    normalize_vector(&mut top);

    let mut rng = StdRng::seed_from_u64(0x5ec7);
    let mut v: Vec<f64> = (0..k).map(|_| rng.random::<f64>() - 0.5).collect();
    orthogonalize(&mut v, &top);
    if normalize_vector(&mut v) == 0.0 {
        return Partition::Done;
    }

    let mut next = vec![0.0; k];
    for _ in 0..POWER_ITERATIONS {
        // next = (B + I) v with B = D^{-1/2} W D^{-1/2}; the shift keeps the
        // spectrum non-negative so the iteration cannot oscillate in sign
        for i in 0..k {
            let mut acc = v[i];
            for j in 0..k {
                acc += sim_mat[(i, j)] * v[j] / (scale[i] * scale[j]);
            }
            next[i] = acc;
        }
        orthogonalize(&mut next, &top);
        if normalize_vector(&mut next) == 0.0 {
            return Partition::Done;
        }
        let delta = v
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        std::mem::swap(&mut v, &mut next);
        if delta < CONVERGENCE {
            break;
        }
    }

    // Rayleigh quotient of the converged direction: the second eigenvalue of
    // the normalized affinity. A non-positive value means there is no
    // assortative structure left to split.
    let mut rayleigh = 0.0;
    for i in 0..k {
        let mut row = 0.0;
        for j in 0..k {
            row += sim_mat[(i, j)] * v[j] / (scale[i] * scale[j]);
        }
        rayleigh += v[i] * row;
    }
    if rayleigh <= 0.0 {
        return Partition::Done;
    }

    // back to the random-walk eigenvector, whose sign pattern splits the graph
    let fiedler: Vec<f64> = v.iter().zip(&scale).map(|(x, s)| x / s).collect();

    let (centers, assignment) = two_means(&fiedler);
    if !split_is_supported(&fiedler, &assignment) {
        return Partition::Done;
    }

    let soft = fiedler
        .iter()
        .map(|&x| {
            let dist_a = (x - centers.0) * (x - centers.0);
            let dist_b = (x - centers.1) * (x - centers.1);
            if dist_a + dist_b == 0.0 {
                0.5
            } else {
                dist_a / (dist_a + dist_b)
            }
        })
        .collect();
    Partition::Split(soft)
}

/// One-dimensional two-means: returns the two centers and, per component,
/// whether it belongs to the second (larger-center) group.
fn two_means(values: &[f64]) -> ((f64, f64), Vec<bool>) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut centers = (min, max);
    let mut assignment = vec![false; values.len()];
    for _ in 0..TWO_MEANS_ITERATIONS {
        for (slot, &x) in assignment.iter_mut().zip(values) {
            *slot = (x - centers.1).abs() < (x - centers.0).abs();
        }
        let mut sums = (0.0, 0.0);
        let mut counts = (0usize, 0usize);
        for (&in_b, &x) in assignment.iter().zip(values) {
            if in_b {
                sums.1 += x;
                counts.1 += 1;
            } else {
                sums.0 += x;
                counts.0 += 1;
            }
        }
        let updated = (
            if counts.0 > 0 { sums.0 / counts.0 as f64 } else { centers.0 },
            if counts.1 > 0 { sums.1 / counts.1 as f64 } else { centers.1 },
        );
        if updated == centers {
            break;
        }
        centers = updated;
    }
    (centers, assignment)
}

/// Akaike information criterion: is a two-component Gaussian description of
/// the Fiedler components worth its extra parameters?
fn split_is_supported(values: &[f64], assignment: &[bool]) -> bool {
    let group_a: Vec<f64> = values
        .iter()
        .zip(assignment)
        .filter(|(_, &in_b)| !in_b)
        .map(|(&x, _)| x)
        .collect();
    let group_b: Vec<f64> = values
        .iter()
        .zip(assignment)
        .filter(|(_, &in_b)| in_b)
        .map(|(&x, _)| x)
        .collect();
    if group_a.is_empty() || group_b.is_empty() {
        return false;
    }

    let n = values.len() as f64;
    let (mean, var) = mean_and_variance(values);
    // one component: mean and variance
    let aic_one = 2.0 * 2.0 - 2.0 * gaussian_log_likelihood(values, mean, var);

    let (mean_a, var_a) = mean_and_variance(&group_a);
    let (mean_b, var_b) = mean_and_variance(&group_b);
    let weight_a = group_a.len() as f64 / n;
    let weight_b = group_b.len() as f64 / n;
    let log_likelihood_two = gaussian_log_likelihood(&group_a, mean_a, var_a)
        + group_a.len() as f64 * weight_a.ln()
        + gaussian_log_likelihood(&group_b, mean_b, var_b)
        + group_b.len() as f64 * weight_b.ln();
    // two components: two means, two variances and a mixing weight
    let aic_two = 2.0 * 5.0 - 2.0 * log_likelihood_two;

    aic_two < aic_one
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / n;
    (mean, var)
}

fn gaussian_log_likelihood(values: &[f64], mean: f64, var: f64) -> f64 {
    let var = var.max(VARIANCE_FLOOR);
    let ln_norm = 0.5 * (2.0 * std::f64::consts::PI * var).ln();
    values
        .iter()
        .map(|&x| -0.5 * (x - mean) * (x - mean) / var - ln_norm)
        .sum()
}

fn normalize_vector(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

fn orthogonalize(v: &mut [f64], against: &[f64]) {
    let dot: f64 = v.iter().zip(against).map(|(a, b)| a * b).sum();
    for (x, &base) in v.iter_mut().zip(against) {
        *x -= dot * base;
    }
}
