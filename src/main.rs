use clap::Parser;
use svclust::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{cluster, matrix},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Cluster(_) => "cluster",
        Command::Matrix(_) => "matrix",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Cluster(args) => cluster::cluster(args)?,
        Command::Matrix(args) => matrix::matrix(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
