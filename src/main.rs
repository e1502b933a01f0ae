//! Filepipe CLI: `filepipe start --path DIR` processes every file under DIR.

use anyhow::Result;
use clap::Parser;
use filepipe::engine::arg_parser::Cli;
use filepipe::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
