//! Exifold CLI: process every file under a directory in parallel into one store.

use anyhow::Result;
use clap::Parser;
use exifold::engine::arg_parser::Cli;
use exifold::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
