use crate::similarity::{MateOverlap, Normalization};
use crate::utils::Result;
use clap::{ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| env!("CARGO_PKG_VERSION").to_string());

#[derive(Parser)]
#[command(name="svclust",
          version=&**FULL_VERSION,
          about="Genotype-based clustering of single cells from aligned single-cell DNA sequencing data",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(long = "log-level")]
    #[clap(value_name = "LOG_LEVEL")]
    #[clap(help = "Log verbosity (trace, debug, info, warn, error, critical, off)")]
    #[clap(default_value = "info")]
    #[arg(value_parser = log_level_from_string)]
    pub log_level: LevelFilter,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Cluster cells by genotype via recursive spectral bipartitioning")]
    Cluster(ClusterArgs),
    #[clap(about = "Compute and write a single similarity matrix without clustering")]
    Matrix(MatrixArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("cluster")))]
#[command(arg_required_else_help(true))]
pub struct ClusterArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "Pileup file or directory containing .pileup files")]
    #[clap(value_name = "INPUT")]
    #[arg(value_parser = check_path_exists)]
    pub input: PathBuf,

    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(help = "Directory where the output will be written")]
    #[clap(value_name = "OUTPUT_DIR")]
    #[clap(default_value = "./")]
    pub output_dir: PathBuf,

    #[clap(long = "seq-error-rate")]
    #[clap(value_name = "THETA")]
    #[clap(help = "Sequencing error rate")]
    #[clap(default_value = "0.001")]
    #[arg(value_parser = ensure_error_rate)]
    pub seq_error_rate: f64,

    #[clap(long = "mutation-rate")]
    #[clap(value_name = "EPSILON")]
    #[clap(help = "Estimated frequency of mutated loci in the pre-processed data set")]
    #[clap(default_value = "0")]
    #[arg(value_parser = ensure_unit_float)]
    pub mutation_rate: f64,

    #[clap(long = "hzygous-prob")]
    #[clap(value_name = "H")]
    #[clap(help = "Probability that a retained locus is homozygous germline")]
    #[clap(default_value = "0")]
    #[arg(value_parser = ensure_unit_float)]
    pub hzygous_prob: f64,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads to use")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "8")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "normalization")]
    #[clap(value_name = "NORMALIZATION")]
    #[clap(help = "How to normalize the similarity matrix (ADD_MIN, EXPONENTIATE, SCALE_MAX_1)")]
    #[clap(default_value = "ADD_MIN")]
    pub normalization: Normalization,

    #[clap(long = "chromosomes")]
    #[clap(value_name = "CHROMOSOMES")]
    #[clap(help = "Comma-separated chromosomes to process (empty means all)")]
    #[clap(default_value = "")]
    pub chromosomes: String,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "mate-overlap")]
    #[clap(value_name = "POLICY")]
    #[clap(help = "What to do when overlapping mates disagree (drop, keep-first)")]
    #[clap(default_value = "drop")]
    pub mate_overlap: MateOverlap,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "coverage-threshold")]
    #[clap(value_name = "COVERAGE")]
    #[clap(help = "Stop recursing into a branch once its average coverage drops to this value")]
    #[clap(default_value = "9")]
    pub coverage_threshold: f64,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("matrix")))]
#[command(arg_required_else_help(true))]
pub struct MatrixArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "Pileup file or directory containing .pileup files")]
    #[clap(value_name = "INPUT")]
    #[arg(value_parser = check_path_exists)]
    pub input: PathBuf,

    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(help = "Directory where the output will be written")]
    #[clap(value_name = "OUTPUT_DIR")]
    #[clap(default_value = "./")]
    pub output_dir: PathBuf,

    #[clap(long = "seq-error-rate")]
    #[clap(value_name = "THETA")]
    #[clap(help = "Sequencing error rate")]
    #[clap(default_value = "0.001")]
    #[arg(value_parser = ensure_error_rate)]
    pub seq_error_rate: f64,

    #[clap(long = "mutation-rate")]
    #[clap(value_name = "EPSILON")]
    #[clap(help = "Estimated frequency of mutated loci in the pre-processed data set")]
    #[clap(default_value = "0")]
    #[arg(value_parser = ensure_unit_float)]
    pub mutation_rate: f64,

    #[clap(long = "hzygous-prob")]
    #[clap(value_name = "H")]
    #[clap(help = "Probability that a retained locus is homozygous germline")]
    #[clap(default_value = "0")]
    #[arg(value_parser = ensure_unit_float)]
    pub hzygous_prob: f64,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads to use")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "8")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "normalization")]
    #[clap(value_name = "NORMALIZATION")]
    #[clap(help = "How to normalize the similarity matrix (ADD_MIN, EXPONENTIATE, SCALE_MAX_1)")]
    #[clap(default_value = "ADD_MIN")]
    pub normalization: Normalization,

    #[clap(long = "chromosomes")]
    #[clap(value_name = "CHROMOSOMES")]
    #[clap(help = "Comma-separated chromosomes to process (empty means all)")]
    #[clap(default_value = "")]
    pub chromosomes: String,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "mate-overlap")]
    #[clap(value_name = "POLICY")]
    #[clap(help = "What to do when overlapping mates disagree (drop, keep-first)")]
    #[clap(default_value = "drop")]
    pub mate_overlap: MateOverlap,
}

pub fn init_verbose(cli: &Cli) {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(cli.log_level)
        .init();
}

fn log_level_from_string(level: &str) -> Result<LevelFilter> {
    match level {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        // the log crate has no critical level; the closest is error
        "error" | "critical" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        _ => Err(format!("Invalid log level: {}", level)),
    }
}

fn check_path_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("Path does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn threads_in_range(s: &str) -> Result<usize> {
    let threads: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if threads >= 1 {
        Ok(threads)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn ensure_error_rate(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if value <= 0.0 || value >= 1.0 {
        Err(format!(
            "The sequencing error rate must be strictly between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..1.0).contains(&value) {
        Err(format!(
            "The value must be in [0.0, 1.0), got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_string() {
        assert_eq!(log_level_from_string("trace"), Ok(LevelFilter::Trace));
        assert_eq!(log_level_from_string("critical"), Ok(LevelFilter::Error));
        assert_eq!(log_level_from_string("off"), Ok(LevelFilter::Off));
        assert!(log_level_from_string("verbose").is_err());
    }

    #[test]
    fn test_ensure_error_rate_bounds() {
        assert_eq!(ensure_error_rate("0.001"), Ok(0.001));
        assert!(ensure_error_rate("0").is_err());
        assert!(ensure_error_rate("1").is_err());
        assert!(ensure_error_rate("nope").is_err());
    }

    #[test]
    fn test_ensure_unit_float_accepts_zero() {
        assert_eq!(ensure_unit_float("0"), Ok(0.0));
        assert_eq!(ensure_unit_float("0.5"), Ok(0.5));
        assert!(ensure_unit_float("1").is_err());
        assert!(ensure_unit_float("-0.1").is_err());
    }

    #[test]
    fn test_threads_in_range() {
        assert_eq!(threads_in_range("8"), Ok(8));
        assert!(threads_in_range("0").is_err());
        assert!(threads_in_range("x").is_err());
    }
}
