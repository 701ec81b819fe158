//! End-to-end evaluation over small hand-built datasets.

use chrono::{DateTime, Duration, TimeZone, Utc};
use factoring_core::{
    config::FilterThresholds,
    dataset::{Datasets, PairProfile, PayeeProfile, PayerProfile, TransactionRecord},
    error::EvalError,
    evaluator::{evaluate, FilterImpactEvaluator},
    report::COMBINED,
    rules::{FilterRule, Metric, MissingValuePolicy, RuleSet},
};

const STANDARD_ORDER: [&str; 10] = [
    "request_amount",
    "payer_txns",
    "payer_tenure",
    "payer_txns_28d",
    "payer_unique_payee",
    "payee_txns",
    "payee_income",
    "payee_income_28d",
    "pair_txns",
    COMBINED,
];

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn healthy_payer(id: &str) -> PayerProfile {
    PayerProfile {
        from: id.into(),
        payer_txns: 50,
        payer_earliest_txn: Some(as_of() - Duration::days(365)),
        payer_txns_28d: 5,
        payer_unique_payee: 5,
    }
}

fn healthy_payee(id: &str) -> PayeeProfile {
    PayeeProfile {
        to: id.into(),
        payee_txns: 50,
        payee_total_amount: 100_000.0,
        payee_total_amount_28d: 5_000.0,
    }
}

/// Ten transactions over two payers and two payees. Every aggregate
/// clears the default thresholds; row 9 requests only $50.
fn ten_row_dataset() -> Datasets {
    let transactions: Vec<TransactionRecord> = (0..10)
        .map(|i| {
            let amount = if i == 9 { 50.0 } else { 500.0 };
            TransactionRecord::new(format!("p{}", i % 2), format!("q{}", i % 2), amount)
        })
        .collect();
    Datasets {
        transactions,
        payers: vec![healthy_payer("p0"), healthy_payer("p1")],
        payees: vec![healthy_payee("q0"), healthy_payee("q1")],
        pairs: vec![
            PairProfile {
                from: "p0".into(),
                to: "q0".into(),
                pair_txns: 10,
            },
            PairProfile {
                from: "p1".into(),
                to: "q1".into(),
                pair_txns: 10,
            },
        ],
    }
}

#[test]
fn small_request_is_the_only_row_removed() {
    let report = evaluate(&ten_row_dataset(), &FilterThresholds::default(), as_of()).unwrap();

    let amount = report.record("request_amount").unwrap();
    assert_eq!(amount.txns_left, 9);
    assert_eq!(amount.payers_left, 2);
    assert!((amount.txn_filtered - 0.1).abs() < 1e-12);

    let combined = report.combined().unwrap();
    assert_eq!(combined.txns_left, 9);
    assert_eq!(combined.payer_filtered, 0.0);

    for name in &STANDARD_ORDER[1..9] {
        assert_eq!(report.record(name).unwrap().txns_left, 10, "rule {name}");
    }
}

#[test]
fn report_has_ten_rows_in_rule_order() {
    let report = evaluate(&ten_row_dataset(), &FilterThresholds::default(), as_of()).unwrap();
    let names: Vec<&str> = report.records.iter().map(|r| r.filter_name.as_str()).collect();
    assert_eq!(names, STANDARD_ORDER);
}

#[test]
fn combined_never_exceeds_any_single_rule() {
    let _ = env_logger::builder().is_test(true).try_init();
    let data = factoring_core::synthetic::generate(7, &Default::default(), as_of());
    let report = evaluate(&data, &FilterThresholds::default(), as_of()).unwrap();

    let combined = report.combined().unwrap();
    let min_single = report.records[..report.records.len() - 1]
        .iter()
        .map(|r| r.txns_left)
        .min()
        .unwrap();
    assert!(combined.txns_left <= min_single);

    for r in &report.records {
        for f in [r.txn_filtered, r.payer_filtered, r.payee_filtered] {
            assert!((0.0..=1.0).contains(&f), "{} fraction {f} out of range", r.filter_name);
        }
    }
}

#[test]
fn kept_and_failing_rows_add_up_to_the_table() {
    let data = factoring_core::synthetic::generate(9, &Default::default(), as_of());
    let evaluator = FilterImpactEvaluator::new(&data).unwrap();
    let rules = RuleSet::from_thresholds(&FilterThresholds::default(), as_of());
    let report = evaluator.evaluate_rules(&rules).unwrap();

    let table = evaluator.table();
    let policy = rules.missing_values();
    let mut failing_any = 0;
    for row in table.rows() {
        failing_any += usize::from(rules.rules().iter().any(|rule| rule.fails(row, policy)));
    }

    for rule in rules.rules() {
        let failing = table
            .rows()
            .iter()
            .filter(|row| rule.fails(row, policy))
            .count();
        let kept = report.record(&rule.name).unwrap().txns_left;
        assert_eq!(kept + failing, table.len(), "rule {}", rule.name);
    }
    assert_eq!(report.combined().unwrap().txns_left + failing_any, table.len());
    assert_eq!(report.total_txns, table.len());
}

#[test]
fn evaluation_is_idempotent() {
    let data = factoring_core::synthetic::generate(11, &Default::default(), as_of());
    let evaluator = FilterImpactEvaluator::new(&data).unwrap();
    let thresholds = FilterThresholds::default();

    let first = evaluator.evaluate(&thresholds, as_of()).unwrap();
    let second = evaluator.evaluate(&thresholds, as_of()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, evaluate(&data, &thresholds, as_of()).unwrap());
}

#[test]
fn raising_min_payer_txns_never_removes_less() {
    let data = factoring_core::synthetic::generate(3, &Default::default(), as_of());
    let evaluator = FilterImpactEvaluator::new(&data).unwrap();

    let mut previous = -1.0;
    for min_payer_txns in [10, 12, 14, 16, 18, 20] {
        let thresholds = FilterThresholds {
            min_payer_txns,
            ..Default::default()
        };
        let report = evaluator.evaluate(&thresholds, as_of()).unwrap();
        let removed = report.record("payer_txns").unwrap().txn_filtered;
        assert!(removed >= previous, "{min_payer_txns}: {removed} < {previous}");
        previous = removed;
    }
}

#[test]
fn empty_transactions_are_insufficient_data() {
    let data = Datasets {
        payers: vec![healthy_payer("p0")],
        ..Default::default()
    };
    let err = evaluate(&data, &FilterThresholds::default(), as_of()).unwrap_err();
    assert!(err.is_insufficient_data(), "unexpected error: {err}");
}

#[test]
fn unmatched_rows_fail_dependent_rules_by_default() {
    let mut data = ten_row_dataset();
    data.payers.retain(|p| p.from == "p0");

    let report = evaluate(&data, &FilterThresholds::default(), as_of()).unwrap();
    for name in ["payer_txns", "payer_tenure", "payer_txns_28d", "payer_unique_payee"] {
        let r = report.record(name).unwrap();
        assert_eq!(r.txns_left, 5, "rule {name}");
        assert_eq!(r.payers_left, 1, "rule {name}");
        assert!((r.payer_filtered - 0.5).abs() < 1e-12);
    }
    assert_eq!(report.record("payee_txns").unwrap().txns_left, 10);
    // p1 rows are gone and the $50 request belonged to p1.
    assert_eq!(report.combined().unwrap().txns_left, 5);
}

#[test]
fn pass_policy_keeps_unmatched_rows() {
    let mut data = ten_row_dataset();
    data.payers.clear();
    data.pairs.clear();

    let thresholds = FilterThresholds {
        missing_values: MissingValuePolicy::Pass,
        ..Default::default()
    };
    let report = evaluate(&data, &thresholds, as_of()).unwrap();
    assert_eq!(report.record("payer_txns").unwrap().txns_left, 10);
    assert_eq!(report.record("pair_txns").unwrap().txns_left, 10);
    assert_eq!(report.combined().unwrap().txns_left, 9);
}

#[test]
fn tenure_rule_drops_recent_payers() {
    let mut data = ten_row_dataset();
    data.payers[1].payer_earliest_txn = Some(as_of() - Duration::days(30));

    let report = evaluate(&data, &FilterThresholds::default(), as_of()).unwrap();
    assert_eq!(report.record("payer_tenure").unwrap().txns_left, 5);

    let lenient = FilterThresholds {
        max_payer_txn_days: 20,
        ..Default::default()
    };
    let report = evaluate(&data, &lenient, as_of()).unwrap();
    assert_eq!(report.record("payer_tenure").unwrap().txns_left, 10);
}

#[test]
fn negative_thresholds_are_accepted() {
    let thresholds = FilterThresholds {
        min_amount_usd: -1.0,
        min_payer_txns: -5,
        min_pair_txns: -100,
        max_payer_txn_days: -30,
        ..Default::default()
    };
    let report = evaluate(&ten_row_dataset(), &thresholds, as_of()).unwrap();
    assert_eq!(report.record("request_amount").unwrap().txns_left, 10);
    assert_eq!(report.record("payer_txns").unwrap().txns_left, 10);
    // A cutoff in the future lets every known payer through.
    assert_eq!(report.record("payer_tenure").unwrap().txns_left, 10);
}

#[test]
fn custom_rule_set_extends_without_touching_aggregation() {
    let evaluator = FilterImpactEvaluator::new(&ten_row_dataset()).unwrap();
    let rules = RuleSet::from_thresholds(&FilterThresholds::default(), as_of())
        .with_rule(FilterRule::below("large_request", Metric::AmountUsd, 1_000.0))
        .unwrap();

    let report = evaluator.evaluate_rules(&rules).unwrap();
    assert_eq!(report.records.len(), 11);
    assert_eq!(report.records[9].filter_name, "large_request");
    assert_eq!(report.records[9].txns_left, 0);
    assert_eq!(report.combined().unwrap().txns_left, 0);
    assert_eq!(report.combined().unwrap().txn_filtered, 1.0);
}

#[test]
fn duplicate_rule_is_rejected() {
    let err = RuleSet::from_thresholds(&FilterThresholds::default(), as_of())
        .with_rule(FilterRule::below("pair_txns", Metric::PairTxns, 1.0))
        .unwrap_err();
    assert!(matches!(err, EvalError::DuplicateRule { name } if name == "pair_txns"));
}

#[test]
fn custom_rule_cannot_take_the_combined_name() {
    let err = RuleSet::from_thresholds(&FilterThresholds::default(), as_of())
        .with_rule(FilterRule::below(COMBINED, Metric::AmountUsd, 100.0))
        .unwrap_err();
    assert!(matches!(err, EvalError::DuplicateRule { ref name } if name == COMBINED));

    let report = evaluate(&ten_row_dataset(), &FilterThresholds::default(), as_of()).unwrap();
    let combined_rows = report
        .records
        .iter()
        .filter(|r| r.filter_name == COMBINED)
        .count();
    assert_eq!(combined_rows, 1);
}
