//! factoring-core: heuristic underwriting filters for invoice factoring.
//!
//! Joins raw payment requests with payer, payee and pair aggregates,
//! applies threshold rules, and reports how much each rule (and all of
//! them together) removes.

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod join;
pub mod profiles;
pub mod report;
pub mod rng;
pub mod rules;
pub mod store;
pub mod synthetic;
pub mod types;

pub use config::{FilterThresholds, ThresholdOverrides};
pub use dataset::Datasets;
pub use error::{EvalError, EvalResult};
pub use evaluator::{evaluate, FilterImpactEvaluator};
pub use report::{ImpactRecord, ImpactReport};
