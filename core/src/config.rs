use crate::{error::EvalResult, rules::MissingValuePolicy};
use serde::{Deserialize, Serialize};

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_TOKENS: [&str; 3] = ["USDT", "DAI", "USDC"];
pub const DEFAULT_MIN_AMOUNT_USD: f64 = 100.0;
pub const DEFAULT_MIN_PAYER_TXNS: i64 = 10;
pub const DEFAULT_MAX_PAYER_TXN_DAYS: i64 = 90;
pub const DEFAULT_MIN_PAYER_TXNS_28D: i64 = 2;
pub const DEFAULT_MIN_PAYER_UNIQUE_PAYEE: i64 = 3;
pub const DEFAULT_MIN_PAYEE_TXNS: i64 = 2;
pub const DEFAULT_MIN_PAYEE_INCOME: f64 = 5000.0;
pub const DEFAULT_MIN_PAYEE_INCOME_28D: f64 = 1000.0;
pub const DEFAULT_MIN_PAIR_TXNS: i64 = 2;

/// Options offered for the request-amount selector.
pub const MIN_AMOUNT_OPTIONS: [f64; 7] = [10.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 100000.0];

/// Named thresholds for the underwriting rules.
///
/// No range is enforced here: negative or absurd values simply produce
/// filters that keep or drop everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterThresholds {
    /// Token allowlist. Carried for the presentation layer; no active rule reads it.
    pub tokens: Vec<String>,
    pub min_amount_usd: f64,
    pub min_payer_txns: i64,
    pub max_payer_txn_days: i64,
    pub min_payer_txns_28d: i64,
    pub min_payer_unique_payee: i64,
    pub min_payee_txns: i64,
    pub min_payee_income: f64,
    pub min_payee_income_28d: f64,
    pub min_pair_txns: i64,
    pub missing_values: MissingValuePolicy,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_TOKENS.iter().map(|t| t.to_string()).collect(),
            min_amount_usd: DEFAULT_MIN_AMOUNT_USD,
            min_payer_txns: DEFAULT_MIN_PAYER_TXNS,
            max_payer_txn_days: DEFAULT_MAX_PAYER_TXN_DAYS,
            min_payer_txns_28d: DEFAULT_MIN_PAYER_TXNS_28D,
            min_payer_unique_payee: DEFAULT_MIN_PAYER_UNIQUE_PAYEE,
            min_payee_txns: DEFAULT_MIN_PAYEE_TXNS,
            min_payee_income: DEFAULT_MIN_PAYEE_INCOME,
            min_payee_income_28d: DEFAULT_MIN_PAYEE_INCOME_28D,
            min_pair_txns: DEFAULT_MIN_PAIR_TXNS,
            missing_values: MissingValuePolicy::Fail,
        }
    }
}

impl FilterThresholds {
    /// Load from a JSON file. Omitted fields keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let thresholds = Self::from_json(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        log::info!("Loaded thresholds from {path}");
        Ok(thresholds)
    }

    pub fn from_json(content: &str) -> EvalResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// A copy of `self` with every `Some` field of `overrides` applied.
    pub fn with_overrides(&self, overrides: &ThresholdOverrides) -> Self {
        let mut t = self.clone();
        if let Some(v) = &overrides.tokens {
            t.tokens = v.clone();
        }
        if let Some(v) = overrides.min_amount_usd {
            t.min_amount_usd = v;
        }
        if let Some(v) = overrides.min_payer_txns {
            t.min_payer_txns = v;
        }
        if let Some(v) = overrides.max_payer_txn_days {
            t.max_payer_txn_days = v;
        }
        if let Some(v) = overrides.min_payer_txns_28d {
            t.min_payer_txns_28d = v;
        }
        if let Some(v) = overrides.min_payer_unique_payee {
            t.min_payer_unique_payee = v;
        }
        if let Some(v) = overrides.min_payee_txns {
            t.min_payee_txns = v;
        }
        if let Some(v) = overrides.min_payee_income {
            t.min_payee_income = v;
        }
        if let Some(v) = overrides.min_payee_income_28d {
            t.min_payee_income_28d = v;
        }
        if let Some(v) = overrides.min_pair_txns {
            t.min_pair_txns = v;
        }
        if let Some(v) = overrides.missing_values {
            t.missing_values = v;
        }
        t
    }

    /// Control metadata for every adjustable parameter, in display order.
    pub fn parameter_specs() -> Vec<ParameterSpec> {
        use ParameterControl::{Options, Slider, TokenSelect};
        vec![
            ParameterSpec {
                name: "min_payer_txns",
                label: "Min #transactions required",
                group: ParameterGroup::PayerQuality,
                control: Slider {
                    min: 2.0,
                    max: 20.0,
                    step: 2.0,
                    default: 10.0,
                },
            },
            ParameterSpec {
                name: "max_payer_txn_days",
                label: "Min wallet tenure (days)",
                group: ParameterGroup::PayerQuality,
                control: Slider {
                    min: 30.0,
                    max: 180.0,
                    step: 10.0,
                    default: 90.0,
                },
            },
            ParameterSpec {
                name: "min_payer_txns_28d",
                label: "Min #transactions required (last 28 days)",
                group: ParameterGroup::PayerQuality,
                control: Slider {
                    min: 0.0,
                    max: 5.0,
                    step: 1.0,
                    default: 2.0,
                },
            },
            ParameterSpec {
                name: "min_payer_unique_payee",
                label: "Minimum number of unique payees for Payers",
                group: ParameterGroup::PayerQuality,
                control: Slider {
                    min: 0.0,
                    max: 10.0,
                    step: 1.0,
                    default: 3.0,
                },
            },
            ParameterSpec {
                name: "min_payee_txns",
                label: "Minimum #transactions required",
                group: ParameterGroup::PayeeQuality,
                control: Slider {
                    min: 0.0,
                    max: 10.0,
                    step: 1.0,
                    default: 2.0,
                },
            },
            ParameterSpec {
                name: "min_payee_income",
                label: "Minimum total income (USD)",
                group: ParameterGroup::PayeeQuality,
                control: Slider {
                    min: 1000.0,
                    max: 10000.0,
                    step: 1000.0,
                    default: 5000.0,
                },
            },
            ParameterSpec {
                name: "min_payee_income_28d",
                label: "Minimum total income (last 28 days)",
                group: ParameterGroup::PayeeQuality,
                control: Slider {
                    min: 0.0,
                    max: 2000.0,
                    step: 100.0,
                    default: 1000.0,
                },
            },
            ParameterSpec {
                name: "tokens",
                label: "Token Allowed",
                group: ParameterGroup::Other,
                control: TokenSelect {
                    options: &DEFAULT_TOKENS,
                },
            },
            ParameterSpec {
                name: "min_amount_usd",
                label: "Min request amount allowed (USD)",
                group: ParameterGroup::Other,
                control: Options {
                    values: &MIN_AMOUNT_OPTIONS,
                    default: DEFAULT_MIN_AMOUNT_USD,
                },
            },
            ParameterSpec {
                name: "min_pair_txns",
                label: "Min #transactions between the Payer and Payee required",
                group: ParameterGroup::Other,
                control: Slider {
                    min: 0.0,
                    max: 10.0,
                    step: 1.0,
                    default: 2.0,
                },
            },
        ]
    }
}

/// Partial threshold update, e.g. one slider moved in the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdOverrides {
    pub tokens: Option<Vec<String>>,
    pub min_amount_usd: Option<f64>,
    pub min_payer_txns: Option<i64>,
    pub max_payer_txn_days: Option<i64>,
    pub min_payer_txns_28d: Option<i64>,
    pub min_payer_unique_payee: Option<i64>,
    pub min_payee_txns: Option<i64>,
    pub min_payee_income: Option<f64>,
    pub min_payee_income_28d: Option<f64>,
    pub min_pair_txns: Option<i64>,
    pub missing_values: Option<MissingValuePolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterGroup {
    PayerQuality,
    PayeeQuality,
    Other,
}

/// How the presentation layer should offer a parameter.
/// Purely advisory: the evaluator accepts any value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterControl {
    Slider {
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    },
    Options {
        values: &'static [f64],
        default: f64,
    },
    TokenSelect { options: &'static [&'static str] },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub group: ParameterGroup,
    pub control: ParameterControl,
}
