use std::collections::BTreeMap;

use proptest::prelude::*;
use termwit_bounds::{
    Branch, BranchMap, BoundSynthesizer, ClosedForm, ClosedForms, DistAssignments, Distribution,
    InitialValues, LoopModel, Simulator,
};
use termwit_core::{
    parse_expr, parse_poly, rational, ratio, EngineConfig, Poly, RngHandle, Symbol, TermwitError,
};
use termwit_dominance::GrowthOracle;

struct Program {
    branches: BranchMap,
    distributions: DistAssignments,
    closed_forms: ClosedForms,
    initial_values: InitialValues,
}

impl Program {
    fn new(
        branches: &[(&str, &[(i64, &str)])],
        distributions: &[(&str, Distribution)],
        initial_values: &[(&str, i64)],
    ) -> Self {
        let entries = branches.iter().map(|(key, list)| {
            let list = list
                .iter()
                .map(|(coeff, inhom)| Branch::new(rational(*coeff), parse_poly(inhom).unwrap()))
                .collect();
            (parse_poly(key).unwrap(), list)
        });
        let distributions = distributions
            .iter()
            .map(|(name, dist)| (Symbol::real(*name), dist.clone()))
            .collect();
        let initial_values = initial_values
            .iter()
            .map(|(name, value)| (Symbol::real(*name), Poly::integer(*value)))
            .collect();
        Self {
            branches: BranchMap::from_polys(entries).unwrap(),
            distributions: DistAssignments::new(distributions).unwrap(),
            closed_forms: ClosedForms::default(),
            initial_values: InitialValues::new(initial_values),
        }
    }

    fn model(&self) -> LoopModel<'_> {
        LoopModel {
            branches: &self.branches,
            distributions: &self.distributions,
            closed_forms: &self.closed_forms,
            initial_values: &self.initial_values,
        }
    }

    /// Synthesizes bounds for `target` and returns the first iteration of a
    /// simulated run that escapes them.
    fn first_violation(&self, target: &str, seed: u64, horizon: usize) -> Option<usize> {
        let poly = parse_poly(target).unwrap();
        let bounds = BoundSynthesizer::new(self.model(), GrowthOracle::new(), &EngineConfig::default())
            .bound_poly(&poly)
            .unwrap();
        let trajectory = Simulator::new(self.model(), BTreeMap::new())
            .run(horizon, &mut RngHandle::from_seed(seed))
            .unwrap();
        assert_eq!(trajectory.len(), horizon + 1);
        trajectory.first_violation(&bounds, &poly).unwrap()
    }
}

fn bernoulli() -> Distribution {
    Distribution::Bernoulli { p: ratio(1, 2) }
}

fn sample_programs() -> Vec<(Program, &'static str)> {
    vec![
        (
            Program::new(&[("x", &[(1, "r")])], &[("r", bernoulli())], &[("x", 0)]),
            "x",
        ),
        (
            Program::new(
                &[("x", &[(1, "r"), (2, "1")])],
                &[("r", bernoulli())],
                &[("x", 1)],
            ),
            "x",
        ),
        (
            Program::new(
                &[("x", &[(1, "u")])],
                &[(
                    "u",
                    Distribution::Uniform {
                        low: rational(-1),
                        high: rational(2),
                    },
                )],
                &[("x", 0)],
            ),
            "x",
        ),
        (
            Program::new(&[("x", &[(1, "1"), (2, "1")])], &[], &[("x", 1)]),
            "-3*x + 2",
        ),
        (
            Program::new(
                &[("x", &[(1, "y")]), ("y", &[(1, "k")])],
                &[(
                    "k",
                    Distribution::Categorical {
                        values: vec![rational(0), rational(1), rational(2)],
                        weights: None,
                    },
                )],
                &[("x", 0), ("y", 0)],
            ),
            "x",
        ),
    ]
}

#[test]
fn runs_are_reproducible_per_seed() {
    let program = Program::new(&[("x", &[(1, "r")])], &[("r", bernoulli())], &[("x", 0)]);
    let simulator = Simulator::new(program.model(), BTreeMap::new());
    let first = simulator.run(20, &mut RngHandle::from_seed(7)).unwrap();
    let second = simulator.run(20, &mut RngHandle::from_seed(7)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.state(0).unwrap()[&Symbol::real("x")], rational(0));
}

#[test]
fn parameters_flow_into_updates_and_bounds() {
    let program = Program::new(&[("x", &[(1, "c")])], &[], &[("x", 0)]);
    let parameters = BTreeMap::from([(Symbol::real("c"), rational(3))]);
    let trajectory = Simulator::new(program.model(), parameters)
        .run(5, &mut RngHandle::from_seed(1))
        .unwrap();
    let x = parse_poly("x").unwrap();
    assert_eq!(trajectory.eval(&x, 5), Some(rational(15)));

    let bounds = BoundSynthesizer::new(program.model(), GrowthOracle::new(), &EngineConfig::default())
        .bound_poly(&x)
        .unwrap();
    assert!(bounds.is_exact());
    assert_eq!(trajectory.first_violation(&bounds, &x).unwrap(), None);
}

#[test]
fn closed_form_symbols_are_recorded() {
    let mut program = Program::new(&[("x", &[(1, "y")])], &[], &[("x", 0)]);
    program
        .closed_forms
        .insert(Symbol::real("y"), ClosedForm::exact(parse_expr("2^n").unwrap()));
    let trajectory = Simulator::new(program.model(), BTreeMap::new())
        .run(4, &mut RngHandle::from_seed(3))
        .unwrap();
    assert_eq!(trajectory.eval(&parse_poly("y").unwrap(), 4), Some(rational(16)));
    assert_eq!(trajectory.eval(&parse_poly("x").unwrap(), 4), Some(rational(15)));
}

#[test]
fn missing_initial_values_are_rejected() {
    let program = Program::new(&[("x", &[(1, "1")])], &[], &[]);
    match Simulator::new(program.model(), BTreeMap::new()).run(3, &mut RngHandle::from_seed(0)) {
        Err(TermwitError::Input(info)) => assert_eq!(info.code, "missing-initial-value"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unevaluable_bounds_are_reported() {
    let program = Program::new(&[("x", &[(1, "1"), (1, "2")])], &[], &[]);
    let bounds = BoundSynthesizer::new(program.model(), GrowthOracle::new(), &EngineConfig::default())
        .bound_poly(&parse_poly("x").unwrap())
        .unwrap();
    let seeded = Program::new(&[("x", &[(1, "1"), (1, "2")])], &[], &[("x", 0)]);
    let trajectory = Simulator::new(seeded.model(), BTreeMap::new())
        .run(3, &mut RngHandle::from_seed(0))
        .unwrap();
    match trajectory.first_violation(&bounds, &parse_poly("x").unwrap()) {
        Err(TermwitError::Input(info)) => assert_eq!(info.code, "unevaluable-bound"),
        other => panic!("unexpected result: {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn simulated_runs_stay_within_bounds(seed in any::<u64>(), pick in 0usize..5) {
        let programs = sample_programs();
        let (program, target) = &programs[pick];
        prop_assert_eq!(program.first_violation(target, seed, 50), None);
    }
}
