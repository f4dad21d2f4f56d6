//! End-to-end scenarios for the similarity engine and the recursive
//! bipartitioning pipeline, built from small synthetic pileups.

use svclust::cli::ClusterArgs;
use svclust::cluster::{divide, expectation_maximization, spectral_bipartition, DivideContext, Partition};
use svclust::commands::cluster::cluster;
use svclust::mat::Mat;
use svclust::pileup::{CellData, PosData};
use svclust::similarity::{
    compute_similarity_matrix, log_prob_diff_genotype, log_prob_same_genotype, LogProbTable,
    MateOverlap, Normalization, ProbCache, SimilarityParams,
};
use svclust::writers::MatrixWriter;
use std::fs;
use std::io::Write;

const THETA: f64 = 0.05;
const EPSILON: f64 = 0.1;
const H: f64 = 0.01;

fn params(normalization: Normalization) -> SimilarityParams {
    SimilarityParams {
        mutation_rate: EPSILON,
        homozygous_rate: H,
        seq_error_rate: THETA,
        num_threads: 2,
        normalization,
        mate_overlap: MateOverlap::Drop,
    }
}

fn pool() -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(2)
        .build()
        .unwrap()
}

fn pos(position: u32, observations: &[(u32, u32, u8)]) -> PosData {
    PosData {
        position,
        cells: observations
            .iter()
            .map(|&(cell_id, read_id, base)| CellData {
                cell_id,
                read_id,
                base,
            })
            .collect(),
    }
}

/// Expected similarity under EXPONENTIATE for a single pair of reads with
/// the given overlap counts.
fn expected_similarity(x_s: usize, x_d: usize, max_fragment_length: u32) -> f64 {
    let cache = ProbCache::new(EPSILON, H, THETA, max_fragment_length);
    let size = max_fragment_length as usize + 1;
    let same = LogProbTable::filled(size);
    let diff = LogProbTable::filled(size);
    let ratio = log_prob_diff_genotype(x_s, x_d, &cache, &diff)
        - log_prob_same_genotype(x_s, x_d, &cache, &same);
    1.0 / (1.0 + ratio.exp())
}

#[test]
fn test_identical_reads_give_negative_log_ratio() {
    // two cells, one read each, identical bases at positions 1..=5
    let chromosome: Vec<PosData> = (1..=5).map(|p| pos(p, &[(0, 1, 0), (1, 2, 0)])).collect();
    let pool = pool();
    let mat = compute_similarity_matrix(
        &[chromosome],
        2,
        10,
        &[0, 1],
        &params(Normalization::Exponentiate),
        &pool,
    )
    .unwrap();

    let expected = expected_similarity(5, 0, 10);
    // log P(diff) - log P(same) is negative, so the similarity is above 1/2
    assert!(expected > 0.5);
    assert!((mat[(0, 1)] - expected).abs() < 1e-12);
    assert_eq!(mat[(0, 1)], mat[(1, 0)]);
}

#[test]
fn test_disjoint_reads_produce_no_updates() {
    let mut chromosome: Vec<PosData> = (1..=5).map(|p| pos(p, &[(0, 1, 0)])).collect();
    chromosome.extend((50..=54).map(|p| pos(p, &[(1, 2, 1)])));
    let pool = pool();
    let mat = compute_similarity_matrix(
        &[chromosome],
        2,
        10,
        &[0, 1],
        &params(Normalization::AddMin),
        &pool,
    )
    .unwrap();
    assert_eq!(mat, Mat::zeros(2, 2));
}

#[test]
fn test_partial_overlap_counts_matches_and_mismatches() {
    // cells share positions 3..=5 with two matches and one mismatch
    let mut chromosome = Vec::new();
    chromosome.push(pos(1, &[(0, 1, 0)]));
    chromosome.push(pos(2, &[(0, 1, 0)]));
    chromosome.push(pos(3, &[(0, 1, 0), (1, 2, 0)]));
    chromosome.push(pos(4, &[(0, 1, 1), (1, 2, 1)]));
    chromosome.push(pos(5, &[(0, 1, 2), (1, 2, 3)]));
    let pool = pool();
    let mat = compute_similarity_matrix(
        &[chromosome],
        2,
        10,
        &[0, 1],
        &params(Normalization::Exponentiate),
        &pool,
    )
    .unwrap();
    let expected = expected_similarity(2, 1, 10);
    assert!((mat[(0, 1)] - expected).abs() < 1e-12);
}

#[test]
fn test_disagreeing_mates_are_invisible_downstream() {
    // cell 0 carries a paired-end fragment whose mates disagree at position 3
    let chromosome = vec![
        pos(1, &[(0, 1, 0), (1, 2, 0)]),
        pos(2, &[(0, 1, 0), (1, 2, 0)]),
        pos(3, &[(0, 1, 0), (0, 1, 2), (1, 2, 0)]),
        pos(4, &[(0, 1, 0), (1, 2, 0)]),
        pos(5, &[(0, 1, 0), (1, 2, 0)]),
    ];
    let pool = pool();
    let mat = compute_similarity_matrix(
        &[chromosome],
        2,
        10,
        &[0, 1],
        &params(Normalization::Exponentiate),
        &pool,
    )
    .unwrap();
    // the overlap shrinks from (5, 0) to (4, 0): position 3 contributes nothing
    let expected = expected_similarity(4, 0, 10);
    assert!((mat[(0, 1)] - expected).abs() < 1e-12);
}

#[test]
fn test_similar_cells_score_higher_than_divergent_ones() {
    // cells 0 and 1 are identical, cell 2 disagrees everywhere
    let chromosome: Vec<PosData> = (1..=5)
        .map(|p| pos(p, &[(0, 1, 0), (1, 2, 0), (2, 3, 1)]))
        .collect();
    let pool = pool();
    let mat = compute_similarity_matrix(
        &[chromosome],
        3,
        10,
        &[0, 1, 2],
        &params(Normalization::Exponentiate),
        &pool,
    )
    .unwrap();
    assert!(mat[(0, 1)] > mat[(0, 2)]);
    assert!(mat[(0, 1)] > mat[(1, 2)]);
}

#[test]
fn test_matrix_is_symmetric_with_zero_diagonal() {
    let chromosome: Vec<PosData> = (1..=20)
        .map(|p| {
            pos(
                p,
                &[
                    (0, 1 + p / 10, 0),
                    (1, 100 + p / 10, (p % 2) as u8),
                    (2, 200 + p / 10, 1),
                ],
            )
        })
        .collect();
    let pool = pool();
    for normalization in [
        Normalization::AddMin,
        Normalization::Exponentiate,
        Normalization::ScaleMax1,
    ] {
        let mat = compute_similarity_matrix(
            &[chromosome.clone()],
            3,
            15,
            &[0, 1, 2],
            &params(normalization),
            &pool,
        )
        .unwrap();
        for i in 0..3 {
            assert_eq!(mat[(i, i)], 0.0);
            for j in 0..3 {
                assert_eq!(mat[(i, j)], mat[(j, i)]);
            }
        }
    }
}

/// Two groups of three cells with fully divergent genotypes, enough reads to
/// separate them cleanly.
fn two_population_pileup() -> Vec<Vec<PosData>> {
    let mut chromosome = Vec::new();
    for block in 0..12u32 {
        for offset in 0..5 {
            let position = block * 5 + offset + 1;
            let observations: Vec<(u32, u32, u8)> = (0..6)
                .map(|cell| (cell, block * 6 + cell, if cell < 3 { 0u8 } else { 1u8 }))
                .collect();
            chromosome.push(pos(position, &observations));
        }
    }
    vec![chromosome]
}

#[test]
fn test_two_populations_split_and_refine() {
    let pos_data = two_population_pileup();
    let pool = pool();
    let mat = compute_similarity_matrix(
        &pos_data,
        6,
        5,
        &[0, 1, 2, 3, 4, 5],
        &params(Normalization::Exponentiate),
        &pool,
    )
    .unwrap();

    let mut cluster = match spectral_bipartition(&mat) {
        Partition::Split(cluster) => cluster,
        Partition::Done => panic!("expected the two populations to split"),
    };
    expectation_maximization(&pos_data, &[0, 1, 2, 3, 4, 5], THETA, &mut cluster);

    let group_a: Vec<f64> = cluster[..3].to_vec();
    let group_b: Vec<f64> = cluster[3..].to_vec();
    let a_low = group_a.iter().all(|&c| c < 0.05) && group_b.iter().all(|&c| c > 0.95);
    let a_high = group_a.iter().all(|&c| c > 0.95) && group_b.iter().all(|&c| c < 0.05);
    assert!(a_low || a_high, "assignment does not separate: {:?}", cluster);
}

#[test]
fn test_recursion_stops_on_homogeneous_branches() {
    let pos_data = two_population_pileup();
    let dir = tempfile::tempdir().unwrap();
    let writer = MatrixWriter::new(dir.path()).unwrap();
    let pool = pool();
    let ctx = DivideContext {
        params: params(Normalization::Exponentiate),
        max_fragment_length: 5,
        coverage_threshold: 9.0,
        writer: &writer,
        pool: &pool,
    };
    divide(
        &pos_data,
        &[0, 1, 2, 3, 4, 5],
        &[0, 1, 2, 3, 4, 5],
        "",
        &ctx,
    )
    .unwrap();

    // the root node is written...
    assert!(dir.path().join("similarity.bin").exists());
    assert!(dir.path().join("assignment.txt").exists());
    // ...and both branches are genotype-homogeneous, so no position stays
    // significant and the recursion ends right away
    assert!(!dir.path().join("similarity_A.bin").exists());
    assert!(!dir.path().join("similarity_B.bin").exists());

    let assignment: Vec<f64> = fs::read_to_string(dir.path().join("assignment.txt"))
        .unwrap()
        .lines()
        .map(|line| line.parse().unwrap())
        .collect();
    assert_eq!(assignment.len(), 6);
    let split = assignment.iter().filter(|&&c| c < 0.05).count();
    assert_eq!(split, 3, "assignment: {:?}", assignment);
    assert_eq!(assignment.iter().filter(|&&c| c > 0.95).count(), 3);
}

#[test]
fn test_empty_pileup_terminates_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MatrixWriter::new(dir.path()).unwrap();
    let pool = pool();
    let ctx = DivideContext {
        params: params(Normalization::AddMin),
        max_fragment_length: 0,
        coverage_threshold: 9.0,
        writer: &writer,
        pool: &pool,
    };
    divide(&[], &[], &[], "", &ctx).unwrap();
    assert!(!dir.path().join("similarity.bin").exists());
    assert!(!dir.path().join("assignment.txt").exists());
}

#[test]
fn test_cluster_command_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("chr1.pileup");
    let mut file = fs::File::create(&input_path).unwrap();
    for block in 0..12u32 {
        for offset in 0..5 {
            let position = block * 5 + offset + 1;
            let read_ids: Vec<String> =
                (0..6).map(|cell| (block * 6 + cell).to_string()).collect();
            writeln!(
                file,
                "1\t{}\t6\tAAACCC\t0,1,2,3,4,5\t{}",
                position,
                read_ids.join(",")
            )
            .unwrap();
        }
    }
    drop(file);

    let out_dir = dir.path().join("out");
    let args = ClusterArgs {
        input: input_path,
        output_dir: out_dir.clone(),
        seq_error_rate: THETA,
        mutation_rate: EPSILON,
        hzygous_prob: H,
        num_threads: 2,
        normalization: Normalization::Exponentiate,
        chromosomes: String::new(),
        mate_overlap: MateOverlap::Drop,
        coverage_threshold: 9.0,
    };
    cluster(args).unwrap();

    let matrix_bytes = fs::read(out_dir.join("similarity.bin")).unwrap();
    assert_eq!(matrix_bytes.len(), 6 * 6 * 8);
    let assignment = fs::read_to_string(out_dir.join("assignment.txt")).unwrap();
    assert_eq!(assignment.lines().count(), 6);
}
