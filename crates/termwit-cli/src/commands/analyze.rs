//! `termwit analyze`: classify the guard of a problem file.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use termwit_witness::{Analyzer, Mode, Problem};
use tracing::info;

use super::load_config;

/// Arguments of `termwit analyze`.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// YAML problem file.
    pub problem: PathBuf,
    /// Analysis mode: closed-form, amber or smt.
    #[arg(long, default_value = "closed-form")]
    pub mode: Mode,
    /// Optional YAML engine configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Analyses the problem's guard and prints the report.
pub fn run(args: &AnalyzeArgs, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.config.as_deref())?;
    let problem = Problem::load(&args.problem)?;
    info!(problem = %args.problem.display(), mode = %args.mode, "analyze");
    let report = Analyzer::new(config).analyze(&problem, args.mode)?;
    if args.json {
        writeln!(out, "{}", report.to_json()?)?;
    } else {
        writeln!(out, "{report}")?;
    }
    Ok(())
}
