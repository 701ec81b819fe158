//! Left-outer enrichment join.
//!
//! The transaction table is the anchor: every transaction produces exactly
//! one joined row, enrichment rows without a matching transaction are
//! dropped, and unmatched transactions carry `None` aggregates.
//!
//! The joined table does not depend on any threshold, so callers that
//! re-evaluate under changing thresholds build it once and reuse it.

use crate::{
    dataset::{Datasets, PairProfile, PayeeProfile, PayerProfile, TransactionRecord},
    error::{EvalError, EvalResult},
    types::{AccountId, Timestamp},
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub from: AccountId,
    pub to: AccountId,
    pub amount_usd: f64,
    pub token_name: Option<String>,
    pub timestamp: Option<Timestamp>,
    // Payer profile
    pub payer_txns: Option<i64>,
    pub payer_earliest_txn: Option<Timestamp>,
    pub payer_txns_28d: Option<i64>,
    pub payer_unique_payee: Option<i64>,
    // Payee profile
    pub payee_txns: Option<i64>,
    pub payee_total_amount: Option<f64>,
    pub payee_total_amount_28d: Option<f64>,
    // Pair profile
    pub pair_txns: Option<i64>,
}

impl JoinedRow {
    fn enrich(
        txn: &TransactionRecord,
        payer: Option<&PayerProfile>,
        payee: Option<&PayeeProfile>,
        pair: Option<&PairProfile>,
    ) -> Self {
        Self {
            from: txn.from.clone(),
            to: txn.to.clone(),
            amount_usd: txn.amount_usd,
            token_name: txn.token_name.clone(),
            timestamp: txn.timestamp,
            payer_txns: payer.map(|p| p.payer_txns),
            payer_earliest_txn: payer.and_then(|p| p.payer_earliest_txn),
            payer_txns_28d: payer.map(|p| p.payer_txns_28d),
            payer_unique_payee: payer.map(|p| p.payer_unique_payee),
            payee_txns: payee.map(|p| p.payee_txns),
            payee_total_amount: payee.map(|p| p.payee_total_amount),
            payee_total_amount_28d: payee.map(|p| p.payee_total_amount_28d),
            pair_txns: pair.map(|p| p.pair_txns),
        }
    }
}

/// Transient working table: one row per transaction, enriched.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    rows: Vec<JoinedRow>,
    distinct_payers: usize,
    distinct_payees: usize,
}

impl JoinedTable {
    /// Join the three enrichment tables onto the transactions.
    ///
    /// Fails with `DuplicateKey` if an enrichment table holds more than
    /// one row for the same key, since a left join would then fan out
    /// and inflate every count downstream.
    pub fn build(data: &Datasets) -> EvalResult<Self> {
        let payers = index_unique("payer_profile", &data.payers, |p| p.from.clone())?;
        let payees = index_unique("payee_profile", &data.payees, |p| p.to.clone())?;
        let pairs = index_unique("pair_profile", &data.pairs, |p| {
            (p.from.clone(), p.to.clone())
        })?;

        let mut unmatched_payers = 0usize;
        let mut unmatched_payees = 0usize;
        let mut unmatched_pairs = 0usize;

        let rows: Vec<JoinedRow> = data
            .transactions
            .iter()
            .map(|txn| {
                let payer = payers.get(&txn.from).copied();
                let payee = payees.get(&txn.to).copied();
                let pair = pairs.get(&(txn.from.clone(), txn.to.clone())).copied();
                unmatched_payers += usize::from(payer.is_none());
                unmatched_payees += usize::from(payee.is_none());
                unmatched_pairs += usize::from(pair.is_none());
                JoinedRow::enrich(txn, payer, payee, pair)
            })
            .collect();

        if unmatched_payers + unmatched_payees + unmatched_pairs > 0 {
            log::warn!(
                "join: {} rows without payer profile, {} without payee profile, {} without pair profile",
                unmatched_payers,
                unmatched_payees,
                unmatched_pairs
            );
        }

        let (distinct_payers, distinct_payees) = distinct_accounts(rows.iter());
        log::debug!(
            "join: {} rows, {} payers, {} payees",
            rows.len(),
            distinct_payers,
            distinct_payees
        );

        Ok(Self {
            rows,
            distinct_payers,
            distinct_payees,
        })
    }

    pub fn rows(&self) -> &[JoinedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn distinct_payers(&self) -> usize {
        self.distinct_payers
    }

    pub fn distinct_payees(&self) -> usize {
        self.distinct_payees
    }
}

/// Number of distinct payers and payees among `rows`.
pub fn distinct_accounts<'a>(rows: impl Iterator<Item = &'a JoinedRow>) -> (usize, usize) {
    let mut payers: HashSet<&str> = HashSet::new();
    let mut payees: HashSet<&str> = HashSet::new();
    for row in rows {
        payers.insert(row.from.as_str());
        payees.insert(row.to.as_str());
    }
    (payers.len(), payees.len())
}

fn index_unique<'a, T, K, F>(table: &str, rows: &'a [T], key: F) -> EvalResult<HashMap<K, &'a T>>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
    F: Fn(&T) -> K,
{
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        let k = key(row);
        if index.contains_key(&k) {
            return Err(EvalError::DuplicateKey {
                table: table.into(),
                key: format!("{k:?}"),
            });
        }
        index.insert(k, row);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payer(id: &str, txns: i64) -> PayerProfile {
        PayerProfile {
            from: id.into(),
            payer_txns: txns,
            payer_earliest_txn: None,
            payer_txns_28d: 0,
            payer_unique_payee: 1,
        }
    }

    #[test]
    fn unmatched_transactions_carry_missing_aggregates() {
        let data = Datasets {
            transactions: vec![
                TransactionRecord::new("a", "x", 10.0),
                TransactionRecord::new("b", "x", 20.0),
            ],
            payers: vec![payer("a", 5), payer("zz", 1)],
            ..Default::default()
        };

        let table = JoinedTable::build(&data).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].payer_txns, Some(5));
        assert_eq!(table.rows()[1].payer_txns, None);
        assert_eq!(table.rows()[0].payee_txns, None);
        assert_eq!(table.distinct_payers(), 2);
        assert_eq!(table.distinct_payees(), 1);
    }

    #[test]
    fn duplicate_enrichment_key_is_rejected() {
        let data = Datasets {
            transactions: vec![TransactionRecord::new("a", "x", 10.0)],
            payers: vec![payer("a", 5), payer("a", 6)],
            ..Default::default()
        };

        let err = JoinedTable::build(&data).unwrap_err();
        assert!(matches!(err, EvalError::DuplicateKey { .. }));
    }
}
