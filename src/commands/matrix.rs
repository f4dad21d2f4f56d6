use crate::cli::MatrixArgs;
use crate::commands::cluster::{initialize_thread_pool, parse_chromosomes};
use crate::pileup::read_pileup_files;
use crate::similarity::{compute_similarity_matrix, SimilarityParams};
use crate::utils::{find_pileup_files, Result};
use crate::writers::MatrixWriter;

pub fn matrix(args: MatrixArgs) -> Result<()> {
    let files = find_pileup_files(&args.input)?;
    log::info!(
        "Found {} pileup file(s) under '{}'",
        files.len(),
        args.input.display()
    );

    let chromosomes = parse_chromosomes(&args.chromosomes);
    let pool = initialize_thread_pool(args.num_threads)?;

    log::info!("Reading data...");
    let (pos_data, num_cells, max_fragment_length) =
        read_pileup_files(&files, &chromosomes, &pool)?;
    let total_positions: usize = pos_data.iter().map(|chromosome| chromosome.len()).sum();
    log::info!(
        "Read {} positions over {} cells (max fragment length: {})",
        total_positions,
        num_cells,
        max_fragment_length
    );

    let params = SimilarityParams {
        mutation_rate: args.mutation_rate,
        homozygous_rate: args.hzygous_prob,
        seq_error_rate: args.seq_error_rate,
        num_threads: args.num_threads,
        normalization: args.normalization,
        mate_overlap: args.mate_overlap,
    };
    let cell_id_to_pos: Vec<u32> = (0..num_cells as u32).collect();

    log::info!("Computing similarity matrix...");
    let sim_mat = compute_similarity_matrix(
        &pos_data,
        num_cells,
        max_fragment_length,
        &cell_id_to_pos,
        &params,
        &pool,
    )?;

    let writer = MatrixWriter::new(&args.output_dir)?;
    writer.write_matrix("", &sim_mat)
}
