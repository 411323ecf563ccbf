//! `termwit bounds`: bound a polynomial and check the bounds on simulated runs.

use std::collections::BTreeMap;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use termwit_bounds::{BoundSynthesizer, Simulator};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::{parse_poly_with_domains, parse_rational, Poly, Rational, RngHandle};
use termwit_dominance::GrowthOracle;
use termwit_witness::{normalize, Problem};
use tracing::{debug, info};

use super::load_config;

/// Arguments of `termwit bounds`.
#[derive(Args, Debug)]
pub struct BoundsArgs {
    /// YAML problem file.
    pub problem: PathBuf,
    /// Polynomial to bound; defaults to the normalized guard polynomial.
    #[arg(long)]
    pub poly: Option<String>,
    /// Number of simulated runs checked against the bounds.
    #[arg(long, default_value_t = 0)]
    pub simulate: usize,
    /// Iterations per simulated run.
    #[arg(long, default_value_t = 50)]
    pub horizon: usize,
    /// Master seed; run `i` uses substream `i`.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Parameter value for simulation, as `name=value`.
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub params: Vec<(String, Rational)>,
    /// Optional YAML engine configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Parses `name=value` with a rational value.
pub fn parse_assignment(text: &str) -> Result<(String, Rational), TermwitError> {
    let Some((name, value)) = text.split_once('=') else {
        return Err(TermwitError::Input(
            ErrorInfo::new("bad-assignment", "expected NAME=VALUE")
                .with_context("argument", text),
        ));
    };
    Ok((name.trim().to_string(), parse_rational(value.trim())?))
}

fn target_poly(args: &BoundsArgs, problem: &Problem) -> Result<Poly, TermwitError> {
    match &args.poly {
        Some(text) => parse_poly_with_domains(text, &problem.parameters),
        None => {
            let guard = problem.guard();
            Ok(normalize(guard.single_atom()?)?.poly)
        }
    }
}

/// Bounds the target polynomial and reports simulated violations.
pub fn run(args: &BoundsArgs, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.config.as_deref())?;
    let problem = Problem::load(&args.problem)?;
    let poly = target_poly(args, &problem)?;
    let data = problem.loop_data()?;
    info!(%poly, "bounds");
    let bounds = BoundSynthesizer::new(data.model(), GrowthOracle::new(), &config).bound_poly(&poly)?;

    let parameters = args
        .params
        .iter()
        .map(|(name, value)| (problem.symbol(name), value.clone()))
        .collect::<BTreeMap<_, _>>();
    let simulator = Simulator::new(data.model(), parameters);
    let mut violations = Vec::new();
    for run in 0..args.simulate {
        let mut rng = RngHandle::substream(args.seed, run as u64);
        let trajectory = simulator.run(args.horizon, &mut rng)?;
        if let Some(n) = trajectory.first_violation(&bounds, &poly)? {
            debug!(run, n, "simulated run left the bounds");
            violations.push((run, n));
        }
    }

    if args.json {
        let value = json!({
            "poly": poly,
            "lower": bounds.lower,
            "upper": bounds.upper,
            "simulated_runs": args.simulate,
            "horizon": args.horizon,
            "violations": violations
                .iter()
                .map(|(run, n)| json!({ "run": run, "iteration": n }))
                .collect::<Vec<_>>(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }
    writeln!(out, "{} <= {poly} <= {}", bounds.lower, bounds.upper)?;
    if args.simulate > 0 {
        writeln!(
            out,
            "{} of {} simulated runs left the bounds within {} iterations",
            violations.len(),
            args.simulate,
            args.horizon
        )?;
        for (run, n) in &violations {
            writeln!(out, "  run {run}: iteration {n}")?;
        }
    }
    Ok(())
}
