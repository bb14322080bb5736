//! pdfkb CLI: turn PDF documents into embedding knowledge bases.
//!
//! Builds JSON knowledge bases of text fragments and vectors for
//! retrieval-augmented search, and merges or queries existing ones.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
