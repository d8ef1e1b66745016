//! tiletune command-line entry point.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tiletune_driver::cli::{run_cli, Cli};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    run_cli(cli)
}
