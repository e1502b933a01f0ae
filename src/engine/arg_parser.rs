use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::config::PipelineLimits;

fn parse_queue_capacity(s: &str) -> Result<usize, String> {
    parse_bounded(s, PipelineLimits::MAX_QUEUE_CAPACITY, 0)
}

fn parse_worker_count(s: &str) -> Result<usize, String> {
    parse_bounded(s, PipelineLimits::MAX_WORKER_COUNT, 1)
}

fn parse_read_buffer_size(s: &str) -> Result<usize, String> {
    parse_bounded(s, PipelineLimits::MAX_READ_BUFFER_SIZE, 0)
}

fn parse_bounded(s: &str, max: usize, min: usize) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n < min || n > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(n)
}

/// Bounded file-processing pipeline.
#[derive(Clone, Parser)]
#[command(name = "filepipe", version)]
#[command(about = "Walk a directory tree and process every file with a bounded worker pool.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Starts the pipeline's processing.
    Start(StartArgs),
}

#[derive(Clone, Args)]
pub struct StartArgs {
    /// Path to the directory containing files to process. Default: current directory.
    #[arg(long, short = 'p', value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// (scannerBufferSize) Read buffer size in bytes used when reading files.
    #[arg(long, value_parser = parse_read_buffer_size)]
    pub sbs: Option<usize>,

    /// (pathChanSize) Number of file paths buffered between the walker and the workers.
    #[arg(long, value_parser = parse_queue_capacity)]
    pub pcs: Option<usize>,

    /// (pathConsumerCount) Number of worker threads consuming paths.
    #[arg(long, value_parser = parse_worker_count)]
    pub pcc: Option<usize>,

    /// Compute a blake3 hash of every file.
    #[arg(long, short = 'c', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub hash: Option<bool>,

    /// Verbose output (debug log and a file counter).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Settings file. Default: `.filepipe.toml` in the working directory, if present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
