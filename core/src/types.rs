//! Shared primitive types used across the evaluator.

use chrono::{DateTime, Utc};

/// An on-chain account identifier (payer or payee).
pub type AccountId = String;

/// All timestamps are UTC instants.
pub type Timestamp = DateTime<Utc>;

/// Length of the trailing activity window used by the 28-day aggregates.
pub const TRAILING_WINDOW_DAYS: i64 = 28;
