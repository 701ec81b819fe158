//! Input datasets: raw transactions plus the three enrichment tables.
//!
//! Every entity here is a read-only snapshot. Nothing in the crate
//! mutates a dataset after it has been loaded or generated.

use crate::types::{AccountId, Timestamp};
use serde::{Deserialize, Serialize};

/// One payment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub from: AccountId,
    pub to: AccountId,
    pub amount_usd: f64,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl TransactionRecord {
    pub fn new(from: impl Into<AccountId>, to: impl Into<AccountId>, amount_usd: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount_usd,
            token_name: None,
            timestamp: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token_name = Some(token.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Per-payer aggregates. One row per payer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerProfile {
    pub from: AccountId,
    pub payer_txns: i64,
    /// None when none of the payer's transactions carried a timestamp.
    pub payer_earliest_txn: Option<Timestamp>,
    pub payer_txns_28d: i64,
    pub payer_unique_payee: i64,
}

/// Per-payee aggregates. One row per payee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayeeProfile {
    pub to: AccountId,
    pub payee_txns: i64,
    pub payee_total_amount: f64,
    pub payee_total_amount_28d: f64,
}

/// Per (payer, payee) aggregates. One row per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairProfile {
    pub from: AccountId,
    pub to: AccountId,
    pub pair_txns: i64,
}

/// The four tables handed to the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datasets {
    pub transactions: Vec<TransactionRecord>,
    pub payers: Vec<PayerProfile>,
    pub payees: Vec<PayeeProfile>,
    pub pairs: Vec<PairProfile>,
}

impl Datasets {
    pub fn new(
        transactions: Vec<TransactionRecord>,
        payers: Vec<PayerProfile>,
        payees: Vec<PayeeProfile>,
        pairs: Vec<PairProfile>,
    ) -> Self {
        Self {
            transactions,
            payers,
            payees,
            pairs,
        }
    }
}
