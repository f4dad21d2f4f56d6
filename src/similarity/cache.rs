/// Powers and binomial coefficients reused by every likelihood evaluation of
/// one run.
///
/// All arrays support exponents up to `max_fragment_length`, the largest
/// possible number of matching plus mismatching bases in a read overlap.
pub struct ProbCache {
    /// Sequencing error rate.
    pub theta: f64,
    /// Prior frequency of mutated loci.
    pub epsilon: f64,
    /// Probability that a locus is homozygous germline and was only retained
    /// because of sequencing or alignment errors.
    pub h: f64,

    // probability that two reads of the same underlying base disagree
    pub p_same_diff: f64,
    // probability that two reads of the same underlying base agree
    pub p_same_same: f64,
    // probability that two reads of different underlying bases agree
    pub p_diff_same: f64,
    // probability that two reads of different underlying bases disagree
    pub p_diff_diff: f64,

    pub pow_p_same_same: Vec<f64>,
    pub pow_p_same_diff: Vec<f64>,
    pub pow_p_diff_same: Vec<f64>,
    pub pow_p_diff_diff: Vec<f64>,
    pub pow_1_h_epsilon: Vec<f64>,
    pub pow_1_h_epsilon2: Vec<f64>,
    pub pow_h_epsilon2: Vec<f64>,
    pub pow_h: Vec<f64>,
    pub pow_epsilon: Vec<f64>,
    pub pow_0_5: Vec<f64>,
    pub pow_pss_pds: Vec<f64>,
    pub pow_psd_pdd: Vec<f64>,

    comb: Vec<Vec<f64>>,
}

impl ProbCache {
    pub fn new(
        mutation_rate: f64,
        homozygous_rate: f64,
        seq_error_rate: f64,
        max_fragment_length: u32,
    ) -> ProbCache {
        let theta = seq_error_rate;
        let theta2 = theta * theta;
        let p_same_diff = 2.0 * theta * (1.0 - theta) + 2.0 * theta2 / 3.0;
        let p_same_same = 1.0 - p_same_diff;
        let p_diff_same = 2.0 * (1.0 - theta) * theta / 3.0 + 2.0 * theta2 / 9.0;
        let p_diff_diff = 1.0 - p_diff_same;
        let epsilon = mutation_rate;
        let h = homozygous_rate;

        // exponents run up to x_s + x_d == max_fragment_length inclusive
        let len = max_fragment_length as usize + 1;
        let powers = |base: f64| {
            let mut pow = Vec::with_capacity(len.max(2));
            pow.push(1.0);
            for k in 1..len.max(2) {
                pow.push(pow[k - 1] * base);
            }
            pow
        };

        let mut comb: Vec<Vec<f64>> = vec![vec![1.0], vec![1.0, 1.0]];
        for n in 2..len {
            let prev = &comb[n - 1];
            let mut row = vec![1.0; n + 1];
            for k in 1..n {
                row[k] = prev[k - 1] + prev[k];
            }
            comb.push(row);
        }

        ProbCache {
            theta,
            epsilon,
            h,
            p_same_diff,
            p_same_same,
            p_diff_same,
            p_diff_diff,
            pow_p_same_same: powers(p_same_same),
            pow_p_same_diff: powers(p_same_diff),
            pow_p_diff_same: powers(p_diff_same),
            pow_p_diff_diff: powers(p_diff_diff),
            pow_1_h_epsilon: powers(1.0 - epsilon - h),
            pow_1_h_epsilon2: powers(1.0 - epsilon * 0.5 - h),
            pow_h_epsilon2: powers(h + epsilon * 0.5),
            pow_h: powers(h),
            pow_epsilon: powers(epsilon),
            pow_0_5: powers(0.5),
            pow_pss_pds: powers(p_same_same + p_diff_same),
            pow_psd_pdd: powers(p_same_diff + p_diff_diff),
            comb,
        }
    }

    /// Binomial coefficient C(n, k).
    pub fn comb(&self, n: usize, k: usize) -> f64 {
        self.comb[n][k]
    }
}
