use proptest::prelude::*;
use termwit_core::{parse_poly, Poly, TermwitError};
use termwit_witness::{normalize, Atom, Guard, RelOp};

fn atom(text: &str) -> Atom {
    Atom::parse(text).unwrap()
}

#[test]
fn truth_table_orients_every_operator() {
    let cases = [
        ("x > y", "x - y", true, true),
        ("x < y", "y - x", true, true),
        ("x >= y", "x - y", false, true),
        ("x <= y", "y - x", false, true),
        ("x == y", "y - x", true, false),
    ];
    for (text, poly, zero, negative) in cases {
        let normalized = normalize(&atom(text)).unwrap();
        assert_eq!(normalized.poly, parse_poly(poly).unwrap(), "{text}");
        assert_eq!(normalized.terminates_on_zero, zero, "{text}");
        assert_eq!(normalized.terminates_on_negative, negative, "{text}");
    }
}

#[test]
fn inequality_guards_are_rejected() {
    match normalize(&atom("x != 3")) {
        Err(TermwitError::Input(info)) => {
            assert_eq!(info.code, "unsupported-operator");
            assert_eq!(info.context.get("atom").map(String::as_str), Some("x != 3"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn atoms_need_exactly_one_comparison() {
    for (text, code) in [("x + 1", "missing-operator"), ("0 < x < 3", "chained-comparison")] {
        match Atom::parse(text) {
            Err(TermwitError::Parse(info)) => assert_eq!(info.code, code),
            other => panic!("unexpected result for {text}: {other:?}"),
        }
    }
    assert_eq!("<=".parse::<RelOp>().unwrap(), RelOp::Le);
    assert!("=>".parse::<RelOp>().is_err());
}

#[test]
fn compound_guards_parse_but_are_not_single_atoms() {
    let guard = Guard::parse("(x > 0 && y < 3) || false").unwrap();
    assert_eq!(guard.to_string(), "(x > 0 && y < 3) || false");
    match guard.single_atom() {
        Err(TermwitError::Input(info)) => assert_eq!(info.code, "multi-atom-guard"),
        other => panic!("unexpected result: {other:?}"),
    }
    match Guard::parse("true").unwrap().single_atom() {
        Err(TermwitError::Input(info)) => assert_eq!(info.code, "constant-guard"),
        other => panic!("unexpected result: {other:?}"),
    }
    let single = Guard::parse("((n - 5 < 0))").unwrap();
    assert_eq!(single.single_atom().unwrap(), &atom("n - 5 < 0"));
}

#[test]
fn normal_form_restates_as_atom() {
    let normalized = normalize(&atom("x <= 2*y")).unwrap();
    let restated = normalized.as_atom().unwrap();
    assert_eq!(restated.op, RelOp::Ge);
    assert_eq!(restated.rhs, Poly::zero());
}

fn op_strategy() -> impl Strategy<Value = RelOp> {
    prop_oneof![
        Just(RelOp::Gt),
        Just(RelOp::Lt),
        Just(RelOp::Ge),
        Just(RelOp::Le),
        Just(RelOp::Eq),
    ]
}

proptest! {
    #[test]
    fn normalization_is_idempotent(
        op in op_strategy(),
        a in -5i64..=5,
        b in -5i64..=5,
        c in -5i64..=5,
    ) {
        let lhs = parse_poly(&format!("{a}*x^2 + {b}*y")).unwrap();
        let rhs = parse_poly(&format!("{c}*n")).unwrap();
        let first = normalize(&Atom::new(lhs, op, rhs)).unwrap();
        let second = normalize(&first.as_atom().unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}
