//! Filter rule descriptors.
//!
//! A rule is a name plus a predicate over a joined row. Rules never look
//! at each other's outcomes, so any rule can be added, removed or reordered
//! without touching the aggregation in `evaluator.rs`.
//!
//! STANDARD ORDER (report rows follow it, "combined" always last):
//!   request_amount, payer_txns, payer_tenure, payer_txns_28d,
//!   payer_unique_payee, payee_txns, payee_income, payee_income_28d,
//!   pair_txns

use crate::{
    config::FilterThresholds,
    error::{EvalError, EvalResult},
    join::JoinedRow,
    report::COMBINED,
    types::Timestamp,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// What happens when a rule needs an aggregate the join could not supply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// The row fails the rule.
    #[default]
    Fail,
    /// The row passes the rule (a comparison against a missing value is false).
    Pass,
}

/// A numeric column of the joined table a rule can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AmountUsd,
    PayerTxns,
    PayerTxns28d,
    PayerUniquePayee,
    PayeeTxns,
    PayeeTotalAmount,
    PayeeTotalAmount28d,
    PairTxns,
}

impl Metric {
    pub fn value(&self, row: &JoinedRow) -> Option<f64> {
        match self {
            Self::AmountUsd => Some(row.amount_usd),
            Self::PayerTxns => row.payer_txns.map(|v| v as f64),
            Self::PayerTxns28d => row.payer_txns_28d.map(|v| v as f64),
            Self::PayerUniquePayee => row.payer_unique_payee.map(|v| v as f64),
            Self::PayeeTxns => row.payee_txns.map(|v| v as f64),
            Self::PayeeTotalAmount => row.payee_total_amount,
            Self::PayeeTotalAmount28d => row.payee_total_amount_28d,
            Self::PairTxns => row.pair_txns.map(|v| v as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Fails when `metric < min`.
    Below { metric: Metric, min: f64 },
    /// Fails when the payer's earliest transaction is later than `cutoff`.
    StartedAfter { cutoff: Timestamp },
}

impl Predicate {
    /// `Some(true)` if the row fails, `None` if the input is missing.
    pub fn check(&self, row: &JoinedRow) -> Option<bool> {
        match self {
            Self::Below { metric, min } => {
                let value = metric.value(row)?;
                // NaN aggregates count as missing.
                if value.is_nan() {
                    return None;
                }
                Some(value < *min)
            }
            Self::StartedAfter { cutoff } => row.payer_earliest_txn.map(|t| t > *cutoff),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRule {
    pub name: String,
    pub predicate: Predicate,
}

impl FilterRule {
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    pub fn below(name: impl Into<String>, metric: Metric, min: f64) -> Self {
        Self::new(name, Predicate::Below { metric, min })
    }

    pub fn fails(&self, row: &JoinedRow, policy: MissingValuePolicy) -> bool {
        match self.predicate.check(row) {
            Some(fails) => fails,
            None => policy == MissingValuePolicy::Fail,
        }
    }
}

/// Ordered, name-unique collection of rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<FilterRule>,
    missing_values: MissingValuePolicy,
}

impl RuleSet {
    pub fn new(missing_values: MissingValuePolicy) -> Self {
        Self {
            rules: Vec::new(),
            missing_values,
        }
    }

    /// The nine standard underwriting rules for `thresholds`, with the
    /// tenure cutoff measured back from `as_of`.
    pub fn from_thresholds(t: &FilterThresholds, as_of: Timestamp) -> Self {
        let rules = vec![
            FilterRule::below("request_amount", Metric::AmountUsd, t.min_amount_usd),
            FilterRule::below("payer_txns", Metric::PayerTxns, t.min_payer_txns as f64),
            FilterRule::new(
                "payer_tenure",
                Predicate::StartedAfter {
                    cutoff: tenure_cutoff(as_of, t.max_payer_txn_days),
                },
            ),
            FilterRule::below(
                "payer_txns_28d",
                Metric::PayerTxns28d,
                t.min_payer_txns_28d as f64,
            ),
            FilterRule::below(
                "payer_unique_payee",
                Metric::PayerUniquePayee,
                t.min_payer_unique_payee as f64,
            ),
            FilterRule::below("payee_txns", Metric::PayeeTxns, t.min_payee_txns as f64),
            FilterRule::below("payee_income", Metric::PayeeTotalAmount, t.min_payee_income),
            FilterRule::below(
                "payee_income_28d",
                Metric::PayeeTotalAmount28d,
                t.min_payee_income_28d,
            ),
            FilterRule::below("pair_txns", Metric::PairTxns, t.min_pair_txns as f64),
        ];
        Self {
            rules,
            missing_values: t.missing_values,
        }
    }

    /// Append `rule`. The name must be new and must not be the reserved
    /// name of the combined row.
    pub fn push(&mut self, rule: FilterRule) -> EvalResult<()> {
        if rule.name == COMBINED || self.rules.iter().any(|r| r.name == rule.name) {
            return Err(EvalError::DuplicateRule { name: rule.name });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn with_rule(mut self, rule: FilterRule) -> EvalResult<Self> {
        self.push(rule)?;
        Ok(self)
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn missing_values(&self) -> MissingValuePolicy {
        self.missing_values
    }
}

/// `as_of - days`, saturating at the representable range instead of
/// panicking on absurd thresholds.
pub fn tenure_cutoff(as_of: Timestamp, days: i64) -> Timestamp {
    TimeDelta::try_days(days)
        .and_then(|d| as_of.checked_sub_signed(d))
        .unwrap_or(if days >= 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row() -> JoinedRow {
        JoinedRow {
            from: "a".into(),
            to: "b".into(),
            amount_usd: 50.0,
            token_name: None,
            timestamp: None,
            payer_txns: None,
            payer_earliest_txn: None,
            payer_txns_28d: Some(3),
            payer_unique_payee: None,
            payee_txns: None,
            payee_total_amount: Some(f64::NAN),
            payee_total_amount_28d: None,
            pair_txns: None,
        }
    }

    #[test]
    fn missing_value_follows_policy() {
        let rule = FilterRule::below("payer_txns", Metric::PayerTxns, 10.0);
        assert!(rule.fails(&row(), MissingValuePolicy::Fail));
        assert!(!rule.fails(&row(), MissingValuePolicy::Pass));
    }

    #[test]
    fn nan_aggregate_is_treated_as_missing() {
        let rule = FilterRule::below("payee_income", Metric::PayeeTotalAmount, 0.0);
        assert!(rule.fails(&row(), MissingValuePolicy::Fail));
        assert!(!rule.fails(&row(), MissingValuePolicy::Pass));
    }

    #[test]
    fn below_is_strict() {
        let rule = FilterRule::below("payer_txns_28d", Metric::PayerTxns28d, 3.0);
        assert!(!rule.fails(&row(), MissingValuePolicy::Fail));
        let rule = FilterRule::below("payer_txns_28d", Metric::PayerTxns28d, 4.0);
        assert!(rule.fails(&row(), MissingValuePolicy::Fail));
    }

    #[test]
    fn tenure_cutoff_saturates() {
        let as_of = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(tenure_cutoff(as_of, i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(tenure_cutoff(as_of, i64::MIN), DateTime::<Utc>::MAX_UTC);
        assert_eq!(
            tenure_cutoff(as_of, 1),
            Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn duplicate_rule_names_rejected() {
        let mut set = RuleSet::new(MissingValuePolicy::Fail);
        set.push(FilterRule::below("x", Metric::AmountUsd, 1.0)).unwrap();
        let err = set
            .push(FilterRule::below("x", Metric::PairTxns, 1.0))
            .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateRule { .. }));
    }

    #[test]
    fn combined_row_name_is_reserved() {
        let err = RuleSet::default()
            .with_rule(FilterRule::below(COMBINED, Metric::AmountUsd, 100.0))
            .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateRule { ref name } if name == COMBINED));
    }
}
