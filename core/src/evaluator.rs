//! Filter impact evaluator.
//!
//! PIPELINE:
//!   1. Join       (once per dataset, see join.rs)
//!   2. Predicates (one fail flag per rule per row)
//!   3. Aggregate  (rows, distinct payers and payees kept per rule)
//!   4. Combine    (fold of every rule's fail flag per row)
//!   5. Normalize  (removed fraction against the full joined table)
//!
//! RULES:
//!   - Evaluation is a pure function of (joined table, rule set).
//!   - An empty joined table is InsufficientData, never a NaN report.

use crate::{
    config::FilterThresholds,
    dataset::Datasets,
    error::{EvalError, EvalResult},
    join::{distinct_accounts, JoinedRow, JoinedTable},
    report::{ImpactRecord, ImpactReport, COMBINED},
    rules::RuleSet,
    types::Timestamp,
};

/// Holds the joined table so repeated evaluations only redo steps 2-5.
pub struct FilterImpactEvaluator {
    table: JoinedTable,
}

impl FilterImpactEvaluator {
    pub fn new(data: &Datasets) -> EvalResult<Self> {
        Ok(Self::from_table(JoinedTable::build(data)?))
    }

    pub fn from_table(table: JoinedTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &JoinedTable {
        &self.table
    }

    /// Evaluate the standard rules for `thresholds` as of `as_of`.
    pub fn evaluate(
        &self,
        thresholds: &FilterThresholds,
        as_of: Timestamp,
    ) -> EvalResult<ImpactReport> {
        self.evaluate_rules(&RuleSet::from_thresholds(thresholds, as_of))
    }

    pub fn evaluate_rules(&self, rules: &RuleSet) -> EvalResult<ImpactReport> {
        let rows = self.table.rows();
        if rows.is_empty() {
            return Err(EvalError::InsufficientData {
                reason: "joined transaction table is empty".into(),
            });
        }

        let totals = Totals {
            txns: rows.len(),
            payers: self.table.distinct_payers(),
            payees: self.table.distinct_payees(),
        };

        let policy = rules.missing_values();
        let fail_flags: Vec<Vec<bool>> = rules
            .rules()
            .iter()
            .map(|rule| rows.iter().map(|row| rule.fails(row, policy)).collect())
            .collect();

        let mut records = Vec::with_capacity(rules.len() + 1);
        for (rule, flags) in rules.rules().iter().zip(&fail_flags) {
            let record = totals.impact(&rule.name, retained(rows, flags));
            log::debug!(
                "rule {}: {} of {} rows kept",
                rule.name,
                record.txns_left,
                totals.txns
            );
            records.push(record);
        }

        let combined_fail: Vec<bool> = (0..rows.len())
            .map(|i| fail_flags.iter().fold(false, |failed, flags| failed || flags[i]))
            .collect();
        records.push(totals.impact(COMBINED, retained(rows, &combined_fail)));

        let report = ImpactReport {
            total_txns: totals.txns,
            total_payers: totals.payers,
            total_payees: totals.payees,
            records,
        };

        if let Some(combined) = report.combined() {
            log::info!(
                "{} rules evaluated over {} rows: combined keeps {} rows ({:.2}% removed)",
                rules.len(),
                totals.txns,
                combined.txns_left,
                combined.txn_filtered * 100.0
            );
        }

        Ok(report)
    }
}

/// One-shot join and evaluation.
pub fn evaluate(
    data: &Datasets,
    thresholds: &FilterThresholds,
    as_of: Timestamp,
) -> EvalResult<ImpactReport> {
    FilterImpactEvaluator::new(data)?.evaluate(thresholds, as_of)
}

struct Totals {
    txns: usize,
    payers: usize,
    payees: usize,
}

impl Totals {
    fn impact<'a>(
        &self,
        name: &str,
        kept: impl Iterator<Item = &'a JoinedRow> + Clone,
    ) -> ImpactRecord {
        let txns_left = kept.clone().count();
        let (payers_left, payees_left) = distinct_accounts(kept);
        ImpactRecord {
            filter_name: name.to_string(),
            txns_left,
            payers_left,
            payees_left,
            txn_filtered: removed_fraction(txns_left, self.txns),
            payer_filtered: removed_fraction(payers_left, self.payers),
            payee_filtered: removed_fraction(payees_left, self.payees),
        }
    }
}

fn retained<'a>(
    rows: &'a [JoinedRow],
    fail_flags: &'a [bool],
) -> impl Iterator<Item = &'a JoinedRow> + Clone {
    rows.iter()
        .zip(fail_flags)
        .filter(|(_, failed)| !**failed)
        .map(|(row, _)| row)
}

/// `1 - kept/total`. Callers guarantee `total > 0`.
fn removed_fraction(kept: usize, total: usize) -> f64 {
    debug_assert!(total > 0 && kept <= total);
    1.0 - kept as f64 / total as f64
}
