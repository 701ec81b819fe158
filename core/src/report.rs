//! Impact report: what each rule, and all rules together, leave behind.

use crate::error::EvalResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Name of the row that applies every rule at once. Always the last row.
pub const COMBINED: &str = "combined";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub filter_name: String,
    pub txns_left: usize,
    pub payers_left: usize,
    pub payees_left: usize,
    /// Removed fractions in [0, 1].
    pub txn_filtered: f64,
    pub payer_filtered: f64,
    pub payee_filtered: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub total_txns: usize,
    pub total_payers: usize,
    pub total_payees: usize,
    pub records: Vec<ImpactRecord>,
}

impl ImpactReport {
    pub fn record(&self, filter_name: &str) -> Option<&ImpactRecord> {
        self.records.iter().find(|r| r.filter_name == filter_name)
    }

    pub fn combined(&self) -> Option<&ImpactRecord> {
        self.records.last().filter(|r| r.filter_name == COMBINED)
    }

    pub fn to_json(&self) -> EvalResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Fixed-width text table with percentage columns.
    pub fn render_table(&self) -> String {
        let name_width = self
            .records
            .iter()
            .map(|r| r.filter_name.len())
            .chain(std::iter::once("filter_name".len()))
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>9}  {:>11}  {:>11}  {:>12}  {:>14}  {:>14}",
            "filter_name",
            "txns_left",
            "payers_left",
            "payees_left",
            "txn_filtered",
            "payer_filtered",
            "payee_filtered",
        );
        for r in &self.records {
            let _ = writeln!(
                out,
                "{:<name_width$}  {:>9}  {:>11}  {:>11}  {:>12}  {:>14}  {:>14}",
                r.filter_name,
                r.txns_left,
                r.payers_left,
                r.payees_left,
                format_percent(r.txn_filtered),
                format_percent(r.payer_filtered),
                format_percent(r.payee_filtered),
            );
        }
        let _ = writeln!(
            out,
            "(of {} transactions, {} payers, {} payees)",
            self.total_txns, self.total_payers, self.total_payees
        );
        out
    }
}

/// `0.1234` → `"12.34%"`.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(format_percent(0.1234), "12.34%");
        assert_eq!(format_percent(0.0), "0.00%");
        assert_eq!(format_percent(1.0), "100.00%");
    }

    #[test]
    fn table_has_header_and_one_line_per_record() {
        let report = ImpactReport {
            total_txns: 4,
            total_payers: 2,
            total_payees: 2,
            records: vec![
                ImpactRecord {
                    filter_name: "request_amount".into(),
                    txns_left: 3,
                    payers_left: 2,
                    payees_left: 1,
                    txn_filtered: 0.25,
                    payer_filtered: 0.0,
                    payee_filtered: 0.5,
                },
                ImpactRecord {
                    filter_name: COMBINED.into(),
                    txns_left: 3,
                    payers_left: 2,
                    payees_left: 1,
                    txn_filtered: 0.25,
                    payer_filtered: 0.0,
                    payee_filtered: 0.5,
                },
            ],
        };
        let table = report.render_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("filter_name"));
        assert!(lines[1].contains("25.00%"));
        assert!(lines[2].starts_with("combined"));
        assert_eq!(report.combined().unwrap().txns_left, 3);
    }
}
