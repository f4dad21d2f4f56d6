use crate::pileup::PosData;

/// Minimum minor-allele support for a position to be informative at all.
const MIN_MINOR_COUNT: u32 = 2;

/// Decides whether a position still separates genotypes within a sub-cluster
/// and reports its coverage if so.
///
/// A position is kept when the number of bases disagreeing with the majority
/// base exceeds what sequencing error alone would produce: the mean of
/// Binomial(coverage, theta) plus three standard deviations.
pub fn is_significant(pd: &PosData, seq_error_rate: f64) -> Option<u32> {
    let coverage = pd.coverage();
    if coverage == 0 {
        return None;
    }
    let mut counts = [0u32; 4];
    for cell in &pd.cells {
        counts[cell.base as usize] += 1;
    }
    let major = *counts.iter().max().unwrap();
    let minor = coverage - major;

    let mean = coverage as f64 * seq_error_rate;
    let sd = (coverage as f64 * seq_error_rate * (1.0 - seq_error_rate)).sqrt();
    (minor >= MIN_MINOR_COUNT && minor as f64 > mean + 3.0 * sd).then_some(coverage)
}
