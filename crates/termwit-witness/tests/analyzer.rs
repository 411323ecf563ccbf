use std::io::Write;

use num_traits::ToPrimitive;
use termwit_core::{parse_expr, EngineConfig, TermwitError};
use termwit_witness::{Analyzer, Mode, Outcome, Problem, SmtOutcome, Verdict, Witness};

fn problem(yaml: &str) -> Problem {
    Problem::from_yaml_str(yaml).unwrap()
}

fn analyze(yaml: &str, mode: Mode) -> termwit_witness::AnalysisReport {
    Analyzer::default().analyze(&problem(yaml), mode).unwrap()
}

fn witness(report: &termwit_witness::AnalysisReport) -> &Witness {
    match &report.outcome {
        Outcome::Witness(witness) => witness,
        other => panic!("expected a witness, got {other:?}"),
    }
}

fn first_exit(report: &termwit_witness::AnalysisReport) -> Option<u64> {
    match witness(report) {
        Witness::Exact(exact) => exact.first_exit.as_ref().map(|k| k.to_u64().unwrap()),
        other => panic!("expected an exact witness, got {other:?}"),
    }
}

#[test]
fn iteration_counter_guard_terminates_at_five() {
    let report = analyze("guard: n < 5\n", Mode::ClosedForm);
    assert_eq!(first_exit(&report), Some(5));
    assert_eq!(report.verdict(), Verdict::Terminates);
    assert!(report.to_string().contains("Program terminates. Witness found:"));
}

#[test]
fn closed_forms_are_substituted_before_scanning() {
    let report = analyze(
        "guard: x >= 0\nclosed_forms:\n  x: \"-n + 3\"\n",
        Mode::ClosedForm,
    );
    assert_eq!(report.expression, Some(parse_expr("3 - n").unwrap()));
    assert_eq!(first_exit(&report), Some(4));

    let report = analyze(
        "guard: x > y\nclosed_forms:\n  x: \"n^2 + 7\"\n  y: n\n",
        Mode::ClosedForm,
    );
    assert_eq!(first_exit(&report), None);
    assert_eq!(report.verdict(), Verdict::DoesNotTerminate);
    assert!(report.to_string().contains("Program does not terminate."));
}

#[test]
fn parameter_domains_reach_the_asymptotic_classifier() {
    let report = analyze(
        "guard: x > 0\nparameters:\n  c: positive\nclosed_forms:\n  x: \"-c*n + d\"\n",
        Mode::ClosedForm,
    );
    assert!(matches!(witness(&report), Witness::AsymptoticTerminating { .. }));

    let report = analyze(
        "guard: x > 0\nclosed_forms:\n  x: \"-c*n + d\"\n",
        Mode::ClosedForm,
    );
    assert_eq!(report.verdict(), Verdict::Unknown);
}

#[test]
fn exponential_closed_forms_are_classified_asymptotically() {
    let report = analyze(
        "guard: x > 0\nclosed_forms:\n  x: \"2^n - n^3 + a\"\n",
        Mode::ClosedForm,
    );
    assert!(matches!(witness(&report), Witness::AsymptoticConstantGrowth { .. }));
}

#[test]
fn inexact_closed_forms_are_undetermined() {
    let report = analyze(
        "guard: x > 0\nclosed_forms:\n  x: { expr: \"n - 2\", exact: false }\n",
        Mode::ClosedForm,
    );
    match witness(&report) {
        Witness::Undetermined { reason } => assert!(reason.contains("exact closed forms")),
        other => panic!("unexpected witness: {other:?}"),
    }
    assert!(report
        .to_string()
        .starts_with("Guard: x > 0\nNormalized polynomial: x\nProgram termination could not"));
}

#[test]
fn root_budget_overruns_are_undetermined() {
    let config = EngineConfig {
        max_root_degree: 2,
        ..EngineConfig::default()
    };
    let report = Analyzer::new(config)
        .analyze(
            &problem("guard: x > 0\nclosed_forms:\n  x: \"n^3 - 2\"\n"),
            Mode::ClosedForm,
        )
        .unwrap();
    assert_eq!(report.verdict(), Verdict::Unknown);
}

#[test]
fn deterministic_modes_reject_branching_programs() {
    let yaml = "guard: x > 0\nbranches:\n  x:\n    - { coefficient: \"1\", inhomogeneous: \"1\" }\n    - { coefficient: \"1\", inhomogeneous: \"-1\" }\ninitial_values:\n  x: \"0\"\n";
    for mode in [Mode::ClosedForm, Mode::Smt] {
        match Analyzer::default().analyze(&problem(yaml), mode) {
            Err(TermwitError::Input(info)) => assert_eq!(info.code, "probabilistic-program"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

#[test]
fn compound_guards_are_rejected() {
    match Analyzer::default().analyze(&problem("guard: \"x > 0 && y > 0\"\n"), Mode::ClosedForm) {
        Err(TermwitError::Input(info)) => assert_eq!(info.code, "multi-atom-guard"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn decreasing_branches_terminate_under_bounds() {
    let yaml = "guard: x > 0\nbranches:\n  x:\n    - { coefficient: \"1\", inhomogeneous: \"-1\" }\n    - { coefficient: \"1\", inhomogeneous: \"-2\" }\ninitial_values:\n  x: \"10\"\n";
    let report = analyze(yaml, Mode::Amber);
    let bounds = report.bounds.clone().unwrap();
    assert_eq!(bounds.lower, parse_expr("10 - 2*n").unwrap());
    assert_eq!(bounds.upper, parse_expr("10 - n").unwrap());
    assert_eq!(first_exit(&report), Some(10));
    assert!(report.to_string().contains("Bounds: -2*n + 10 <= P <= -n + 10"));
}

#[test]
fn growing_random_walk_never_exits() {
    let yaml = "guard: x > 0\nbranches:\n  x:\n    - { coefficient: \"1\", inhomogeneous: r }\ndistributions:\n  r: { kind: bernoulli, p: \"1/2\" }\ninitial_values:\n  x: \"1\"\n";
    let report = analyze(yaml, Mode::Amber);
    assert_eq!(report.verdict(), Verdict::DoesNotTerminate);
}

#[test]
fn straddling_bounds_are_undetermined() {
    let yaml = "guard: x > 0\nbranches:\n  x:\n    - { coefficient: \"1\", inhomogeneous: u }\ndistributions:\n  u: { kind: uniform, low: \"-1\", high: \"2\" }\ninitial_values:\n  x: \"1\"\n";
    let report = analyze(yaml, Mode::Amber);
    assert_eq!(report.verdict(), Verdict::Unknown);
    assert!(report.bounds.is_some());
}

#[test]
fn smt_mode_emits_a_formula_for_parametric_guards() {
    let report = analyze(
        "guard: x > 0\nclosed_forms:\n  x: \"a*n + b\"\n",
        Mode::Smt,
    );
    match &report.outcome {
        Outcome::Smt(SmtOutcome::Formula(formula)) => {
            assert!(formula.text.contains("(declare-const a Real)"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.verdict(), Verdict::Unknown);

    let report = analyze(
        "guard: x > 0\nclosed_forms:\n  x: \"a*n + b\"\nprologue: true\n",
        Mode::Smt,
    );
    assert!(matches!(
        report.outcome,
        Outcome::Smt(SmtOutcome::Unsupported { .. })
    ));
}

#[test]
fn reports_serialize_to_json() {
    let report = analyze("guard: n < 5\n", Mode::ClosedForm);
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["mode"], "closed-form");
    assert_eq!(json["guard"], "n < 5");
    assert_eq!(json["outcome"]["kind"], "witness");
    assert_eq!(json["outcome"]["detail"]["kind"], "exact");
    assert_eq!(json["outcome"]["detail"]["first_exit"], 5);
    assert!(json.get("bounds").is_none());
}

#[test]
fn problems_load_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "guard: x < 3\nclosed_forms:\n  x: n").unwrap();
    let problem = Problem::load(file.path()).unwrap();
    let report = Analyzer::default().analyze(&problem, Mode::ClosedForm).unwrap();
    assert_eq!(first_exit(&report), Some(3));

    match Problem::load(&file.path().with_extension("missing")) {
        Err(TermwitError::Serde(info)) => assert_eq!(info.code, "problem_read"),
        other => panic!("unexpected result: {other:?}"),
    }
    match Problem::from_yaml_str("guard: [") {
        Err(TermwitError::Serde(info)) => assert_eq!(info.code, "yaml_deserialize"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn modes_parse_from_their_command_line_names() {
    assert_eq!("amber".parse::<Mode>().unwrap(), Mode::Amber);
    assert_eq!("closed-form".parse::<Mode>().unwrap(), Mode::ClosedForm);
    match "fast".parse::<Mode>() {
        Err(TermwitError::Input(info)) => assert_eq!(info.code, "unknown-mode"),
        other => panic!("unexpected result: {other:?}"),
    }
}
