use std::collections::BTreeMap;

use num_traits::Signed;
use proptest::prelude::*;
use termwit_bounds::{
    Branch, BranchMap, BoundPair, BoundSynthesizer, ClosedForm, ClosedForms, DistAssignments,
    Distribution, InitialValues, LoopModel,
};
use termwit_core::{
    parse_expr, parse_poly, parse_poly_with_domains, rational, ratio, Domain, EngineConfig, Expr,
    Poly, Rational, Symbol, TermwitError,
};
use termwit_dominance::GrowthOracle;

struct Fixture {
    branches: BranchMap,
    distributions: DistAssignments,
    closed_forms: ClosedForms,
    initial_values: InitialValues,
}

impl Fixture {
    fn new(branches: &[(&str, &[(i64, &str)])]) -> Self {
        let entries = branches.iter().map(|(key, list)| {
            let list = list
                .iter()
                .map(|(coeff, inhom)| Branch::new(rational(*coeff), parse_poly(inhom).unwrap()))
                .collect();
            (parse_poly(key).unwrap(), list)
        });
        Self {
            branches: BranchMap::from_polys(entries).unwrap(),
            distributions: DistAssignments::default(),
            closed_forms: ClosedForms::default(),
            initial_values: InitialValues::default(),
        }
    }

    /// One loop variable `x` whose branches add constants.
    fn constant_branches(branches: &[(Rational, i64)], start: i64) -> Self {
        let list = branches
            .iter()
            .map(|(coeff, inhom)| Branch::new(coeff.clone(), Poly::integer(*inhom)))
            .collect();
        let mut fixture = Self::new(&[]);
        fixture.branches = BranchMap::from_polys([(parse_poly("x").unwrap(), list)]).unwrap();
        fixture.with_initial("x", start)
    }

    fn with_distribution(mut self, name: &str, dist: Distribution) -> Self {
        let mut entries: BTreeMap<Symbol, Distribution> =
            self.distributions.iter().map(|(s, d)| (s.clone(), d.clone())).collect();
        entries.insert(Symbol::real(name), dist);
        self.distributions = DistAssignments::new(entries).unwrap();
        self
    }

    fn with_initial(mut self, name: &str, value: i64) -> Self {
        let mut entries: BTreeMap<Symbol, Poly> =
            self.initial_values.iter().map(|(s, v)| (s.clone(), v.clone())).collect();
        entries.insert(Symbol::real(name), Poly::integer(value));
        self.initial_values = InitialValues::new(entries);
        self
    }

    fn with_closed_form(mut self, name: &str, expr: &str) -> Self {
        self.closed_forms
            .insert(Symbol::real(name), ClosedForm::exact(parse_expr(expr).unwrap()));
        self
    }

    fn model(&self) -> LoopModel<'_> {
        LoopModel {
            branches: &self.branches,
            distributions: &self.distributions,
            closed_forms: &self.closed_forms,
            initial_values: &self.initial_values,
        }
    }

    fn bound_with(&self, poly: &Poly, config: &EngineConfig) -> Result<BoundPair, TermwitError> {
        BoundSynthesizer::new(self.model(), GrowthOracle::new(), config).bound_poly(poly)
    }

    fn bound(&self, poly: &str) -> Result<BoundPair, TermwitError> {
        self.bound_with(&parse_poly(poly).unwrap(), &EngineConfig::default())
    }
}

fn bernoulli() -> Distribution {
    Distribution::Bernoulli { p: ratio(1, 2) }
}

/// Walks every branch sequence up to `depth` and checks each iterate
/// against `bounds`.
fn assert_encloses_every_path(branches: &[(Rational, i64)], start: i64, bounds: &BoundPair, depth: u64) {
    let values = BTreeMap::new();
    let mut frontier = vec![rational(start)];
    for n in 0..=depth {
        let lower = bounds.lower.eval(n, &values).unwrap();
        let upper = bounds.upper.eval(n, &values).unwrap();
        for x in &frontier {
            assert!(
                &lower <= x && x <= &upper,
                "n = {n}: {x} outside [{lower}, {upper}] for {bounds:?}"
            );
        }
        let mut next: Vec<Rational> = frontier
            .iter()
            .flat_map(|x| {
                branches
                    .iter()
                    .map(move |(coeff, inhom)| coeff * x + rational(*inhom))
            })
            .collect();
        next.sort();
        next.dedup();
        frontier = next;
    }
}

fn pair(lower: &str, upper: &str) -> BoundPair {
    BoundPair {
        lower: parse_expr(lower).unwrap(),
        upper: parse_expr(upper).unwrap(),
    }
}

#[test]
fn deterministic_monomials_use_closed_forms() {
    let fixture = Fixture::new(&[]).with_closed_form("y", "n + 3");
    assert_eq!(fixture.bound("2*y^2").unwrap(), BoundPair::exact(parse_expr("2*n^2 + 12*n + 18").unwrap()));
}

#[test]
fn random_walk_is_bracketed_by_zero_and_n() {
    let fixture = Fixture::new(&[("x", &[(1, "r")])])
        .with_distribution("r", bernoulli())
        .with_initial("x", 0);
    assert_eq!(fixture.bound("x").unwrap(), pair("0", "n"));
    assert_eq!(fixture.bound("-x").unwrap(), pair("-n", "0"));
}

#[test]
fn branch_coefficients_split_upper_and_lower() {
    let fixture = Fixture::new(&[("x", &[(1, "1"), (2, "1")])]).with_initial("x", 1);
    assert_eq!(fixture.bound("x").unwrap(), pair("n + 1", "2*2^n - 1"));
}

#[test]
fn interval_supports_widen_both_ways() {
    let uniform = Distribution::Uniform {
        low: rational(-1),
        high: rational(2),
    };
    let fixture = Fixture::new(&[("x", &[(1, "u")])])
        .with_distribution("u", uniform)
        .with_initial("x", 0);
    assert_eq!(fixture.bound("x").unwrap(), pair("-n", "2*n"));
}

#[test]
fn sign_changing_factors_widen_to_a_pointwise_envelope() {
    // |r * y| = |n - 5| peaks at 5 before the growth of n takes over.
    let signs = Distribution::Categorical {
        values: vec![rational(-1), rational(1)],
        weights: None,
    };
    let fixture = Fixture::new(&[])
        .with_closed_form("y", "n - 5")
        .with_distribution("r", signs);
    let bounds = fixture.bound("r*y").unwrap();
    assert_eq!(bounds, pair("-n - 5", "n + 5"));
    let values = BTreeMap::new();
    for n in 0..20 {
        let magnitude = (rational(n as i64) - rational(5)).abs();
        assert!(bounds.upper.eval(n, &values).unwrap() >= magnitude);
        assert!(bounds.lower.eval(n, &values).unwrap() <= -magnitude);
    }
}

#[test]
fn parameter_coefficients_route_by_sign() {
    let fixture = Fixture::new(&[("x", &[(1, "r")])])
        .with_distribution("r", bernoulli())
        .with_initial("x", 0);
    let domains = [("c".to_string(), Domain::Positive)].into_iter().collect();
    let scaled = parse_poly_with_domains("-c*x", &domains).unwrap();
    let bounds = fixture.bound_with(&scaled, &EngineConfig::default()).unwrap();
    let expected_lower = Expr::from(parse_poly_with_domains("-c*n", &domains).unwrap());
    assert_eq!(bounds.lower, expected_lower);
    assert_eq!(bounds.upper, Expr::zero());

    match fixture.bound("d*x") {
        Err(TermwitError::Unsupported(info)) => assert_eq!(info.code, "unsigned-coefficient"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unknown_initial_values_use_fresh_symbols_once() {
    let fixture = Fixture::new(&[("x", &[(1, "1"), (1, "2")])]);
    let mut synth = BoundSynthesizer::new(fixture.model(), GrowthOracle::new(), &EngineConfig::default());
    let first = synth.bound_poly(&parse_poly("x").unwrap()).unwrap();
    let second = synth.bound_poly(&parse_poly("3*x").unwrap()).unwrap();
    assert_eq!(second.upper, first.upper.scale(&rational(3)));
    assert!(first.upper.parameters().iter().all(|sym| sym.domain() == Domain::Positive));
    let cached: Vec<_> = synth.cached_monomials().map(ToString::to_string).collect();
    assert_eq!(cached, vec!["x".to_string()]);
}

#[test]
fn missing_branch_entries_are_internal_errors() {
    let fixture = Fixture::new(&[("x", &[(1, "1"), (2, "0")]), ("y", &[(1, "1"), (1, "2")])]);
    match fixture.bound("x*y") {
        Err(TermwitError::Internal(info)) => {
            assert_eq!(info.code, "missing-branch");
            assert_eq!(info.context.get("monomial").map(String::as_str), Some("x*y"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn halving_branch_cannot_outrun_a_doubling_bound_from_a_negative_start() {
    // From -8 the halving branch jumps to 16 while the doubling branch
    // drives the minimum to -8*2^n.
    let branches = [(ratio(1, 2), 20), (rational(2), 0)];
    let fixture = Fixture::constant_branches(&branches, -8);
    let bounds = fixture.bound("x").unwrap();
    assert_eq!(bounds, pair("-8*2^n", "20*2^n - 20"));
    assert_encloses_every_path(&branches, -8, &bounds, 12);
}

#[test]
fn resetting_branch_keeps_the_start_and_caps_the_lower_bound() {
    // The reset reaches 5 at n = 1 from a start of -100.
    let branches = [(rational(0), 5), (rational(1), 10)];
    let fixture = Fixture::constant_branches(&branches, -100);
    let bounds = fixture.bound("x").unwrap();
    assert_eq!(bounds, pair("-100", "10*n"));
    assert_encloses_every_path(&branches, -100, &bounds, 12);
}

#[test]
fn negative_coefficients_are_bounded_through_their_magnitude() {
    let alternating = [(rational(-1), 1)];
    let bounds = Fixture::constant_branches(&alternating, 1).bound("x").unwrap();
    assert_eq!(bounds, pair("0", "1"));
    assert_encloses_every_path(&alternating, 1, &bounds, 12);

    let mixed = [(rational(-1), 1), (rational(1), 1)];
    let bounds = Fixture::constant_branches(&mixed, 0).bound("x").unwrap();
    assert_eq!(bounds, pair("-n", "n"));
    assert_encloses_every_path(&mixed, 0, &bounds, 12);

    let growing = [(rational(-2), 0), (rational(1), 3)];
    let bounds = Fixture::constant_branches(&growing, 1).bound("x").unwrap();
    assert_encloses_every_path(&growing, 1, &bounds, 10);
}

#[test]
fn unsupported_shapes_are_reported() {
    let normal = Distribution::Normal { mean: 0.0, std: 1.0 };
    let unbounded = Fixture::new(&[("x", &[(1, "g")])])
        .with_distribution("g", normal)
        .with_initial("x", 0);
    match unbounded.bound("x") {
        Err(TermwitError::Unsupported(info)) => assert_eq!(info.code, "unbounded-support"),
        other => panic!("unexpected result: {other:?}"),
    }

    let cyclic = Fixture::new(&[("x", &[(1, "x")])]).with_initial("x", 1);
    match cyclic.bound("x") {
        Err(TermwitError::Unsupported(info)) => assert_eq!(info.code, "cyclic-recurrence"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn recursion_depth_is_budgeted() {
    let fixture = Fixture::new(&[("x", &[(1, "y")]), ("y", &[(1, "r")])])
        .with_distribution("r", bernoulli())
        .with_initial("x", 0)
        .with_initial("y", 0);
    let shallow = EngineConfig {
        max_bound_depth: 1,
        ..EngineConfig::default()
    };
    match fixture.bound_with(&parse_poly("x").unwrap(), &shallow) {
        Err(TermwitError::Budget(info)) => assert_eq!(info.code, "bound-depth"),
        other => panic!("unexpected result: {other:?}"),
    }
    let bounds = fixture.bound("x").unwrap();
    assert_eq!(bounds, pair("0", "1/2*n^2 - 1/2*n"));
}

#[test]
fn inexact_closed_forms_are_unsupported() {
    let mut fixture = Fixture::new(&[]);
    fixture.closed_forms.insert(
        Symbol::real("y"),
        ClosedForm {
            expr: parse_expr("n").unwrap(),
            exact: false,
        },
    );
    match fixture.bound("y") {
        Err(TermwitError::Unsupported(info)) => assert_eq!(info.code, "inexact-closed-form"),
        other => panic!("unexpected result: {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn synthesized_bounds_enclose_every_branch_sequence(
        first in 0usize..6,
        second in 0usize..6,
        f in -5i64..=5,
        g in -5i64..=5,
        start in -10i64..=10,
    ) {
        let coefficients = [ratio(-2, 1), rational(-1), rational(0), ratio(1, 2), rational(1), rational(2)];
        let branches = [(coefficients[first].clone(), f), (coefficients[second].clone(), g)];
        let fixture = Fixture::constant_branches(&branches, start);
        match fixture.bound("x") {
            Ok(bounds) => assert_encloses_every_path(&branches, start, &bounds, 8),
            Err(err) => prop_assert!(err.is_indeterminate(), "{err}"),
        }
    }
}
