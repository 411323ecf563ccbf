#![deny(missing_docs)]
#![doc = "Command-line front end: argument parsing, logging setup and the `analyze` and `bounds` subcommands."]

use std::error::Error;
use std::io::Write;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod logging;

use commands::analyze::{self, AnalyzeArgs};
use commands::bounds::{self, BoundsArgs};

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "termwit", about = "Termination witnesses for single-guard loops")]
pub struct Cli {
    /// Log analysis steps at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify the guard of a problem file.
    Analyze(AnalyzeArgs),
    /// Synthesize bounds for a polynomial and optionally check them by simulation.
    Bounds(BoundsArgs),
}

/// Dispatches `cli` and writes its report to `out`.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    match &cli.command {
        Command::Analyze(args) => analyze::run(args, out),
        Command::Bounds(args) => bounds::run(args, out),
    }
}
