use crate::cli::ClusterArgs;
use crate::cluster::{divide, DivideContext};
use crate::pileup::read_pileup_files;
use crate::similarity::SimilarityParams;
use crate::utils::{find_pileup_files, Result};
use crate::writers::MatrixWriter;
use rayon::ThreadPoolBuilder;

pub fn cluster(args: ClusterArgs) -> Result<()> {
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

    let writer = MatrixWriter::new(&args.output_dir)?;
    let cell_id_to_pos: Vec<u32> = (0..num_cells as u32).collect();
    let pos_to_cell_id = cell_id_to_pos.clone();

    let ctx = DivideContext {
        params: SimilarityParams {
            mutation_rate: args.mutation_rate,
            homozygous_rate: args.hzygous_prob,
            seq_error_rate: args.seq_error_rate,
            num_threads: args.num_threads,
            normalization: args.normalization,
            mate_overlap: args.mate_overlap,
        },
        max_fragment_length,
        coverage_threshold: args.coverage_threshold,
        writer: &writer,
        pool: &pool,
    };
    divide(&pos_data, &cell_id_to_pos, &pos_to_cell_id, "", &ctx)
}

pub(crate) fn initialize_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    log::debug!("Initializing thread pool with {} threads...", num_threads);
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("svclust-{}", i))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}

pub(crate) fn parse_chromosomes(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
