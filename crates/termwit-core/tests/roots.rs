use num_bigint::BigInt;
use termwit_core::roots::{
    count_real_roots, integer_sign_profile, isolate_roots, real_roots, sign_change_candidates,
    RootInterval,
};
use termwit_core::{rational, ratio, Rational, TermwitError};

fn coeffs(values: &[i64]) -> Vec<Rational> {
    values.iter().copied().map(rational).collect()
}

#[test]
fn counts_distinct_real_roots() {
    // (n - 1)^2 (n + 2)
    assert_eq!(count_real_roots(&coeffs(&[1, 0, -3, 2]), 64).unwrap(), 2);
    assert_eq!(count_real_roots(&coeffs(&[1, -1, 7]), 64).unwrap(), 0);
    assert_eq!(count_real_roots(&coeffs(&[5]), 64).unwrap(), 0);
}

#[test]
fn zero_polynomial_is_rejected() {
    match count_real_roots(&coeffs(&[0, 0]), 64) {
        Err(TermwitError::Input(info)) => assert_eq!(info.code, "zero-polynomial"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn degree_budget_is_enforced() {
    let mut high = vec![rational(1)];
    high.extend(std::iter::repeat(rational(0)).take(10));
    high.push(rational(-1));
    match real_roots(&high, 8, 1e-9) {
        Err(TermwitError::Budget(info)) => {
            assert_eq!(info.code, "root-degree");
            assert_eq!(info.context.get("degree").map(String::as_str), Some("11"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn isolates_rational_and_irrational_roots() {
    let roots = real_roots(&coeffs(&[1, 0, -2]), 64, 1e-12).unwrap();
    assert_eq!(roots.len(), 2);
    assert!((roots[0] + 2f64.sqrt()).abs() < 1e-9);
    assert!((roots[1] - 2f64.sqrt()).abs() < 1e-9);

    let exact = real_roots(&[rational(2), ratio(-1, 1)], 64, 1e-9).unwrap();
    assert_eq!(exact.len(), 1);
    assert!((exact[0] - 0.5).abs() < 1e-9);
}

fn interval(lo: Rational, hi: Rational) -> RootInterval {
    RootInterval { lo, hi }
}

fn integers(values: &[i64]) -> Vec<BigInt> {
    values.iter().copied().map(BigInt::from).collect()
}

#[test]
fn candidates_cover_floor_and_successor() {
    let roots = [
        interval(ratio(-7, 2), ratio(-7, 2)),
        interval(ratio(5, 2), ratio(5, 2)),
        interval(ratio(27, 10), ratio(28, 10)),
    ];
    assert_eq!(sign_change_candidates(&roots), integers(&[0, 2, 3]));
    assert_eq!(sign_change_candidates(&[]), integers(&[0]));
    assert_eq!(sign_change_candidates(&[interval(ratio(-1, 2), ratio(-1, 2))]), integers(&[0]));
    // An interval just below an integer root still yields its successor.
    let below_three = interval(ratio(2_999_999, 1_000_000), ratio(3_000_001, 1_000_000));
    assert_eq!(sign_change_candidates(&[below_three]), integers(&[0, 2, 3, 4]));
}

#[test]
fn huge_roots_keep_exact_integer_neighbours() {
    // -n + 100000000000000005 has its root beyond the f64 integer range.
    let root: BigInt = "100000000000000005".parse().unwrap();
    let coeffs = [rational(-1), Rational::from_integer(root.clone())];
    let roots = isolate_roots(&coeffs, 64, 1e-9).unwrap();
    assert_eq!(roots.len(), 1);
    assert!(roots[0].lo <= Rational::from_integer(root.clone()));
    assert!(roots[0].hi >= Rational::from_integer(root.clone()));
    let candidates = sign_change_candidates(&roots);
    assert!(candidates.contains(&root));
    assert!(candidates.contains(&(&root + 1)));

    // Roots past i64::MAX are handled without overflow.
    let beyond: BigInt = "10000000000000000000".parse().unwrap();
    let coeffs = [rational(-1), Rational::from_integer(beyond.clone())];
    let candidates = sign_change_candidates(&isolate_roots(&coeffs, 64, 1e-9).unwrap());
    assert!(candidates.contains(&beyond));
}

#[test]
fn sign_profile_over_naturals() {
    // -n + 3 is positive at 0 and negative from 4 on.
    assert_eq!(integer_sign_profile(&coeffs(&[-1, 3]), 64, 1e-9).unwrap(), (true, true));
    // n^2 - n + 7 never vanishes.
    assert_eq!(integer_sign_profile(&coeffs(&[1, -1, 7]), 64, 1e-9).unwrap(), (true, false));
    // (n - 1/2)^2 is positive on every integer.
    let shifted = [rational(1), rational(-1), ratio(1, 4)];
    assert_eq!(integer_sign_profile(&shifted, 64, 1e-9).unwrap(), (true, false));
}
