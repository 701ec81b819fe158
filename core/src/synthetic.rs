//! Synthetic demo datasets.
//!
//! Stands in for the sample snapshot a dashboard would ship with. Payer
//! activity and request amounts are Pareto-skewed so that every rule
//! removes something at the default thresholds. A share of profile rows
//! is withheld so the missing-value path is exercised too.

use crate::{
    config::DEFAULT_TOKENS,
    dataset::{Datasets, TransactionRecord},
    profiles::derive_profiles,
    rng::{DataStream, SeededRng},
    types::Timestamp,
};
use chrono::TimeDelta;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticParams {
    pub payers: usize,
    pub payees: usize,
    pub transactions: usize,
    /// Transactions fall in `(as_of - span_days, as_of]`.
    pub span_days: i64,
    pub amount_pareto_xmin: f64,
    pub amount_pareto_alpha: f64,
    /// Probability that a derived profile row is kept.
    pub profile_coverage: f64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            payers: 200,
            payees: 80,
            transactions: 2_000,
            span_days: 365,
            amount_pareto_xmin: 25.0,
            amount_pareto_alpha: 1.3,
            profile_coverage: 0.95,
        }
    }
}

pub fn generate_transactions(
    seed: u64,
    params: &SyntheticParams,
    as_of: Timestamp,
) -> Vec<TransactionRecord> {
    if params.payers == 0 || params.payees == 0 {
        return Vec::new();
    }

    let mut accounts = SeededRng::new(seed, DataStream::Accounts);
    let payers: Vec<String> = (0..params.payers).map(|_| accounts.address()).collect();
    let payees: Vec<String> = (0..params.payees).map(|_| accounts.address()).collect();

    let mut rng = SeededRng::new(seed, DataStream::Transactions);
    let span_secs = params.span_days.max(1) as u64 * 86_400;

    (0..params.transactions)
        .map(|_| {
            let payer = skewed_index(&mut rng, payers.len());
            let payee = skewed_index(&mut rng, payees.len());
            let amount = rng.pareto(params.amount_pareto_xmin, params.amount_pareto_alpha);
            let token = DEFAULT_TOKENS[rng.next_u64_below(DEFAULT_TOKENS.len() as u64) as usize];
            let age = rng.next_u64_below(span_secs) as i64;
            let timestamp = TimeDelta::try_seconds(age)
                .and_then(|d| as_of.checked_sub_signed(d))
                .unwrap_or(as_of);

            TransactionRecord::new(payers[payer].clone(), payees[payee].clone(), amount.round())
                .with_token(token)
                .with_timestamp(timestamp)
        })
        .collect()
}

/// Transactions plus profiles derived from them, with roughly
/// `1 - profile_coverage` of each profile table dropped.
pub fn generate(seed: u64, params: &SyntheticParams, as_of: Timestamp) -> Datasets {
    let transactions = generate_transactions(seed, params, as_of);
    let mut profiles = derive_profiles(&transactions, as_of);

    let mut coverage = SeededRng::new(seed, DataStream::Coverage);
    let keep = params.profile_coverage;
    profiles.payers.retain(|_| coverage.chance(keep));
    profiles.payees.retain(|_| coverage.chance(keep));
    profiles.pairs.retain(|_| coverage.chance(keep));

    log::info!(
        "synthetic dataset seed={}: {} transactions, {} payers, {} payees, {} pairs",
        seed,
        transactions.len(),
        profiles.payers.len(),
        profiles.payees.len(),
        profiles.pairs.len()
    );
    profiles.into_datasets(transactions)
}

/// Low indices are drawn far more often than high ones.
fn skewed_index(rng: &mut SeededRng, n: usize) -> usize {
    let draw = rng.pareto(1.0, 0.8).min(1e12) as u64;
    (draw.saturating_sub(1) % n as u64) as usize
}
