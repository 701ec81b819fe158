//! Derive the payer, payee and pair enrichment tables from raw transactions.
//!
//! The trailing window is `(as_of - 28 days, as_of]`. A transaction
//! without a timestamp counts toward totals only: it never lands in a
//! trailing window and never sets the payer's earliest transaction.

use crate::{
    dataset::{Datasets, PairProfile, PayeeProfile, PayerProfile, TransactionRecord},
    rules::tenure_cutoff,
    types::{AccountId, Timestamp, TRAILING_WINDOW_DAYS},
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedProfiles {
    pub payers: Vec<PayerProfile>,
    pub payees: Vec<PayeeProfile>,
    pub pairs: Vec<PairProfile>,
}

impl DerivedProfiles {
    pub fn into_datasets(self, transactions: Vec<TransactionRecord>) -> Datasets {
        Datasets::new(transactions, self.payers, self.payees, self.pairs)
    }
}

#[derive(Default)]
struct PayerAcc<'a> {
    txns: i64,
    earliest: Option<Timestamp>,
    txns_28d: i64,
    payees: BTreeSet<&'a str>,
}

#[derive(Default)]
struct PayeeAcc {
    txns: i64,
    total: f64,
    total_28d: f64,
}

/// Aggregate `transactions` into one profile row per payer, payee and pair,
/// each table sorted by key.
pub fn derive_profiles(transactions: &[TransactionRecord], as_of: Timestamp) -> DerivedProfiles {
    let window_start = tenure_cutoff(as_of, TRAILING_WINDOW_DAYS);
    let in_window = |ts: Option<Timestamp>| ts.is_some_and(|t| t > window_start && t <= as_of);

    let mut payers: BTreeMap<&str, PayerAcc> = BTreeMap::new();
    let mut payees: BTreeMap<&str, PayeeAcc> = BTreeMap::new();
    let mut pairs: BTreeMap<(&str, &str), i64> = BTreeMap::new();

    for txn in transactions {
        let recent = in_window(txn.timestamp);

        let payer = payers.entry(txn.from.as_str()).or_default();
        payer.txns += 1;
        payer.txns_28d += i64::from(recent);
        payer.payees.insert(txn.to.as_str());
        if let Some(ts) = txn.timestamp {
            payer.earliest = Some(payer.earliest.map_or(ts, |e| e.min(ts)));
        }

        let payee = payees.entry(txn.to.as_str()).or_default();
        payee.txns += 1;
        payee.total += txn.amount_usd;
        if recent {
            payee.total_28d += txn.amount_usd;
        }

        *pairs.entry((txn.from.as_str(), txn.to.as_str())).or_insert(0) += 1;
    }

    let derived = DerivedProfiles {
        payers: payers
            .into_iter()
            .map(|(from, acc)| PayerProfile {
                from: AccountId::from(from),
                payer_txns: acc.txns,
                payer_earliest_txn: acc.earliest,
                payer_txns_28d: acc.txns_28d,
                payer_unique_payee: acc.payees.len() as i64,
            })
            .collect(),
        payees: payees
            .into_iter()
            .map(|(to, acc)| PayeeProfile {
                to: AccountId::from(to),
                payee_txns: acc.txns,
                payee_total_amount: acc.total,
                payee_total_amount_28d: acc.total_28d,
            })
            .collect(),
        pairs: pairs
            .into_iter()
            .map(|((from, to), txns)| PairProfile {
                from: from.into(),
                to: to.into(),
                pair_txns: txns,
            })
            .collect(),
    };

    log::debug!(
        "derived {} payer, {} payee, {} pair profiles from {} transactions",
        derived.payers.len(),
        derived.payees.len(),
        derived.pairs.len(),
        transactions.len()
    );
    derived
}
