use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use termwit_bounds::BoundPair;
use termwit_core::{parse_expr, parse_expr_with_domains, Domain, EngineConfig, Symbol};
use termwit_witness::{classify_bounds, PolynomialTerminationCondition, Verdict, Witness};

fn positive(names: &[&str]) -> BTreeMap<String, Domain> {
    names
        .iter()
        .map(|name| (name.to_string(), Domain::Positive))
        .collect()
}

fn classify(expr: &str, zero: bool, negative: bool) -> Witness {
    PolynomialTerminationCondition::new(parse_expr(expr).unwrap(), zero, negative)
        .witness(&EngineConfig::default())
        .unwrap()
}

fn first_exit(witness: &Witness) -> Option<u64> {
    match witness {
        Witness::Exact(exact) => exact.first_exit.as_ref().map(|k| k.to_u64().unwrap()),
        other => panic!("expected an exact witness, got {other:?}"),
    }
}

#[test]
fn counter_below_bound_exits_at_five() {
    // n < 5 normalizes to 5 - n, exiting on zero or negative.
    let witness = classify("5 - n", true, true);
    assert_eq!(first_exit(&witness), Some(5));
    assert!(witness.is_termination_witness());
    assert_eq!(witness.verdict(), Verdict::Terminates);
}

#[test]
fn non_strict_guard_skips_the_root() {
    // x >= 0 with x = -n + 3 only exits once x is negative.
    let witness = classify("-n + 3", false, true);
    assert_eq!(first_exit(&witness), Some(4));
    let text = witness.to_string();
    assert!(text.contains("negative at n = 4"), "{text}");
}

#[test]
fn root_free_positive_polynomial_never_exits() {
    let witness = classify("n^2 - n + 7", true, true);
    assert_eq!(first_exit(&witness), None);
    assert!(witness.is_nontermination_witness());
    assert_eq!(witness.to_string(), "The polynomial n^2 - n + 7 never becomes zero or negative.");
}

#[test]
fn exits_beyond_the_float_integer_range_are_exact() {
    for text in ["100000000000000005", "10000000000000000000", "123456789012345678901234567890"] {
        let witness = classify(&format!("{text} - n"), true, true);
        let Witness::Exact(exact) = &witness else {
            panic!("expected an exact witness, got {witness:?}");
        };
        let expected: BigInt = text.parse().unwrap();
        assert_eq!(exact.first_exit, Some(expected));
        assert!(witness.to_string().contains(&format!("at n = {text}")));
    }
    // Strict exits land one past the root.
    let witness = classify("100000000000000005 - n", false, true);
    let Witness::Exact(exact) = &witness else {
        panic!("expected an exact witness, got {witness:?}");
    };
    let expected: BigInt = "100000000000000006".parse().unwrap();
    assert_eq!(exact.first_exit, Some(expected));
}

#[test]
fn constant_sign_polynomials_exit_immediately_or_never() {
    assert_eq!(first_exit(&classify("-n^2 - 1", true, true)), Some(0));
    assert_eq!(first_exit(&classify("n^2 + 1", true, true)), None);
    assert_eq!(first_exit(&classify("0", true, false)), Some(0));
    assert_eq!(first_exit(&classify("0", false, true)), None);
}

#[test]
fn equality_guards_exit_only_on_roots() {
    // x == y with y - x = n^2 - 5n + 6 exits at the first integer root.
    assert_eq!(first_exit(&classify("n^2 - 5*n + 6", true, false)), Some(2));
    assert_eq!(first_exit(&classify("n^2 - 5*n + 7", true, false)), None);
}

#[test]
fn negative_leading_parameter_terminates_asymptotically() {
    let expr = parse_expr_with_domains("-c*n + d", &positive(&["c"])).unwrap();
    let witness = PolynomialTerminationCondition::new(expr, true, true)
        .witness(&EngineConfig::default())
        .unwrap();
    match &witness {
        Witness::AsymptoticTerminating {
            leading_coefficient,
            ..
        } => assert_eq!(leading_coefficient.to_string(), "-c"),
        other => panic!("unexpected witness: {other:?}"),
    }
    assert!(witness.is_termination_witness());
}

#[test]
fn free_constant_term_gives_nontermination() {
    let expr = parse_expr_with_domains("c*n^2 - 3*n + d", &positive(&["c"])).unwrap();
    let witness = PolynomialTerminationCondition::new(expr, true, true)
        .witness(&EngineConfig::default())
        .unwrap();
    match &witness {
        Witness::AsymptoticConstantGrowth { symbol, .. } => assert_eq!(symbol, &Symbol::real("d")),
        other => panic!("unexpected witness: {other:?}"),
    }
    assert_eq!(witness.verdict(), Verdict::DoesNotTerminate);
}

#[test]
fn constant_term_symbols_shared_with_growth_do_not_count() {
    let expr = parse_expr_with_domains("c*n + c^2", &positive(&["c"])).unwrap();
    let witness = PolynomialTerminationCondition::new(expr, true, true)
        .witness(&EngineConfig::default())
        .unwrap();
    assert_eq!(witness.verdict(), Verdict::Unknown);

    // A positive symbol entering with a negative sign cannot grow the term.
    let expr = parse_expr_with_domains("2*n - d", &positive(&["d"])).unwrap();
    let witness = PolynomialTerminationCondition::new(expr, true, true)
        .witness(&EngineConfig::default())
        .unwrap();
    assert_eq!(witness.verdict(), Verdict::Unknown);
}

#[test]
fn unknown_leading_sign_is_undetermined() {
    let witness = classify("a*n + 1", true, true);
    match &witness {
        Witness::Undetermined { reason } => assert!(reason.contains("dominant coefficient a")),
        other => panic!("unexpected witness: {other:?}"),
    }
    assert!(!witness.is_termination_witness());
    assert!(!witness.is_nontermination_witness());
    assert!(witness.to_string().starts_with("termination could not be determined"));
}

#[test]
fn zero_only_exits_are_not_decided_asymptotically() {
    let witness = classify("a*n + 1", true, false);
    assert_eq!(witness.verdict(), Verdict::Unknown);
}

#[test]
fn exponential_dominant_terms_decide() {
    assert!(classify("-2^n + n^3 + a", true, true).is_termination_witness());
    let witness = classify("3^n - n + b", true, true);
    assert!(matches!(witness, Witness::AsymptoticConstantGrowth { .. }));
}

#[test]
fn root_budget_is_reported_as_an_error() {
    let config = EngineConfig {
        max_root_degree: 2,
        ..EngineConfig::default()
    };
    let result = PolynomialTerminationCondition::new(parse_expr("n^3 - 2").unwrap(), true, true)
        .witness(&config);
    match result {
        Err(err) => {
            assert!(err.is_indeterminate());
            assert_eq!(err.info().code, "root-degree");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

fn bounds(lower: &str, upper: &str) -> BoundPair {
    BoundPair {
        lower: parse_expr(lower).unwrap(),
        upper: parse_expr(upper).unwrap(),
    }
}

#[test]
fn exiting_upper_bound_proves_termination() {
    let witness =
        classify_bounds(&bounds("-2*n", "10 - n"), true, true, &EngineConfig::default()).unwrap();
    assert_eq!(first_exit(&witness), Some(10));
}

#[test]
fn lower_bound_that_never_exits_proves_nontermination() {
    let witness =
        classify_bounds(&bounds("n + 1", "2*2^n - 1"), true, true, &EngineConfig::default())
            .unwrap();
    assert!(witness.is_nontermination_witness());
}

#[test]
fn straddling_bounds_are_undetermined() {
    let witness =
        classify_bounds(&bounds("-n - 1", "n + 1"), true, true, &EngineConfig::default()).unwrap();
    assert_eq!(witness.verdict(), Verdict::Unknown);
    let zero_only =
        classify_bounds(&bounds("1", "1"), true, false, &EngineConfig::default()).unwrap();
    assert_eq!(zero_only.verdict(), Verdict::Unknown);
}

#[test]
fn exponential_upper_bound_with_negative_growth_terminates() {
    let witness = classify_bounds(
        &BoundPair {
            lower: parse_expr("-3^n").unwrap(),
            upper: parse_expr("-2^n + n + a").unwrap(),
        },
        true,
        true,
        &EngineConfig::default(),
    )
    .unwrap();
    assert!(matches!(witness, Witness::AsymptoticTerminating { .. }));
}
