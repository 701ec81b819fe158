//! SQLite dataset store.
//!
//! RULE: Only store.rs talks to the database.
//! The evaluator receives plain `Datasets`; it never executes SQL.

use crate::{
    dataset::{Datasets, PairProfile, PayeeProfile, PayerProfile, TransactionRecord},
    error::{EvalError, EvalResult},
    profiles::DerivedProfiles,
    types::Timestamp,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags};

pub const TRANSACTIONS_TABLE: &str = "transactions";
pub const PAYER_TABLE: &str = "payer_profile";
pub const PAYEE_TABLE: &str = "payee_profile";
pub const PAIR_TABLE: &str = "pair_profile";

// Columns every loader needs. Token and timestamp are optional on transactions.
const TRANSACTION_COLUMNS: &[&str] = &["from", "to", "amount_usd"];
const PAYER_COLUMNS: &[&str] = &[
    "from",
    "payer_txns",
    "payer_earliest_txn",
    "payer_txns_28d",
    "payer_unique_payee",
];
const PAYEE_COLUMNS: &[&str] = &[
    "to",
    "payee_txns",
    "payee_total_amount",
    "payee_total_amount_28d",
];
const PAIR_COLUMNS: &[&str] = &["from", "to", "pair_txns"];

pub struct DatasetStore {
    conn: Connection,
}

impl DatasetStore {
    /// Open (or create) the dataset database at `path`.
    pub fn open(path: &str) -> EvalResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open an existing dataset database without write access.
    pub fn open_read_only(path: &str) -> EvalResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests and synthetic runs).
    pub fn in_memory() -> EvalResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the four dataset tables if they do not exist.
    ///
    /// Loading never migrates: a dataset file lacking a table must surface
    /// as `SchemaMismatch`, not as an empty table.
    pub fn migrate(&self) -> EvalResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_datasets.sql"))?;
        Ok(())
    }

    // ── Schema ─────────────────────────────────────────────────

    pub fn columns(&self, table: &str) -> EvalResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Fails with `SchemaMismatch` on the first required column `table` lacks.
    /// A missing table reports its first required column.
    pub fn require_columns(&self, table: &str, required: &[&str]) -> EvalResult<()> {
        let present = self.columns(table)?;
        match required.iter().find(|c| !present.iter().any(|p| p == *c)) {
            Some(missing) => Err(EvalError::SchemaMismatch {
                table: table.into(),
                column: (*missing).into(),
            }),
            None => Ok(()),
        }
    }

    // ── Insert ─────────────────────────────────────────────────

    pub fn insert_transactions(&self, rows: &[TransactionRecord]) -> EvalResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_transaction_rows(&tx, rows)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_payer_profiles(&self, rows: &[PayerProfile]) -> EvalResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_payer_rows(&tx, rows)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_payee_profiles(&self, rows: &[PayeeProfile]) -> EvalResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_payee_rows(&tx, rows)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_pair_profiles(&self, rows: &[PairProfile]) -> EvalResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_pair_rows(&tx, rows)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_datasets(&self, data: &Datasets) -> EvalResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_transaction_rows(&tx, &data.transactions)?;
        insert_payer_rows(&tx, &data.payers)?;
        insert_payee_rows(&tx, &data.payees)?;
        insert_pair_rows(&tx, &data.pairs)?;
        tx.commit()?;
        Ok(())
    }

    /// Swap every profile row for `profiles`. All or nothing: if any insert
    /// fails the previous profiles are left untouched.
    pub fn replace_profiles(&self, profiles: &DerivedProfiles) -> EvalResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM payer_profile; DELETE FROM payee_profile; DELETE FROM pair_profile;",
        )?;
        insert_payer_rows(&tx, &profiles.payers)?;
        insert_payee_rows(&tx, &profiles.payees)?;
        insert_pair_rows(&tx, &profiles.pairs)?;
        tx.commit()?;
        log::info!(
            "replaced profiles: {} payers, {} payees, {} pairs",
            profiles.payers.len(),
            profiles.payees.len(),
            profiles.pairs.len()
        );
        Ok(())
    }

    // ── Load ───────────────────────────────────────────────────

    pub fn load_transactions(&self) -> EvalResult<Vec<TransactionRecord>> {
        self.require_columns(TRANSACTIONS_TABLE, TRANSACTION_COLUMNS)?;
        let present = self.columns(TRANSACTIONS_TABLE)?;
        let has = |c: &str| present.iter().any(|p| p == c);
        let token_col = if has("token_name") { "token_name" } else { "NULL" };
        let ts_col = if has("timestamp") { "timestamp" } else { "NULL" };

        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT "from", "to", amount_usd, {token_col}, {ts_col} FROM transactions ORDER BY rowid"#
        ))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(from, to, amount_usd, token_name, ts)| {
                Ok(TransactionRecord {
                    from,
                    to,
                    amount_usd,
                    token_name,
                    timestamp: ts.as_deref().map(parse_timestamp).transpose()?,
                })
            })
            .collect()
    }

    pub fn load_payer_profiles(&self) -> EvalResult<Vec<PayerProfile>> {
        self.require_columns(PAYER_TABLE, PAYER_COLUMNS)?;
        let mut stmt = self.conn.prepare(
            r#"SELECT "from", payer_txns, payer_earliest_txn, payer_txns_28d, payer_unique_payee
               FROM payer_profile ORDER BY "from""#,
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(from, payer_txns, earliest, payer_txns_28d, payer_unique_payee)| {
                Ok(PayerProfile {
                    from,
                    payer_txns,
                    payer_earliest_txn: earliest.as_deref().map(parse_timestamp).transpose()?,
                    payer_txns_28d,
                    payer_unique_payee,
                })
            })
            .collect()
    }

    pub fn load_payee_profiles(&self) -> EvalResult<Vec<PayeeProfile>> {
        self.require_columns(PAYEE_TABLE, PAYEE_COLUMNS)?;
        let mut stmt = self.conn.prepare(
            r#"SELECT "to", payee_txns, payee_total_amount, payee_total_amount_28d
               FROM payee_profile ORDER BY "to""#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PayeeProfile {
                to: row.get(0)?,
                payee_txns: row.get(1)?,
                payee_total_amount: row.get(2)?,
                payee_total_amount_28d: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn load_pair_profiles(&self) -> EvalResult<Vec<PairProfile>> {
        self.require_columns(PAIR_TABLE, PAIR_COLUMNS)?;
        let mut stmt = self.conn.prepare(
            r#"SELECT "from", "to", pair_txns FROM pair_profile ORDER BY "from", "to""#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PairProfile {
                from: row.get(0)?,
                to: row.get(1)?,
                pair_txns: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Load all four tables. Any schema mismatch aborts the whole load.
    pub fn load_datasets(&self) -> EvalResult<Datasets> {
        let data = Datasets::new(
            self.load_transactions()?,
            self.load_payer_profiles()?,
            self.load_payee_profiles()?,
            self.load_pair_profiles()?,
        );
        log::info!(
            "loaded {} transactions, {} payers, {} payees, {} pairs",
            data.transactions.len(),
            data.payers.len(),
            data.payees.len(),
            data.pairs.len()
        );
        Ok(data)
    }

    /// Raw SQL escape hatch for tests that need to build odd schemas.
    pub fn execute_batch(&self, sql: &str) -> EvalResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

fn insert_transaction_rows(conn: &Connection, rows: &[TransactionRecord]) -> EvalResult<()> {
    let mut stmt = conn.prepare(
        r#"INSERT INTO transactions ("from", "to", amount_usd, token_name, timestamp)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )?;
    for r in rows {
        stmt.execute(params![
            r.from,
            r.to,
            r.amount_usd,
            r.token_name,
            r.timestamp.map(format_timestamp),
        ])?;
    }
    Ok(())
}

fn insert_payer_rows(conn: &Connection, rows: &[PayerProfile]) -> EvalResult<()> {
    let mut stmt = conn.prepare(
        r#"INSERT INTO payer_profile
           ("from", payer_txns, payer_earliest_txn, payer_txns_28d, payer_unique_payee)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )?;
    for r in rows {
        stmt.execute(params![
            r.from,
            r.payer_txns,
            r.payer_earliest_txn.map(format_timestamp),
            r.payer_txns_28d,
            r.payer_unique_payee,
        ])?;
    }
    Ok(())
}

fn insert_payee_rows(conn: &Connection, rows: &[PayeeProfile]) -> EvalResult<()> {
    let mut stmt = conn.prepare(
        r#"INSERT INTO payee_profile
           ("to", payee_txns, payee_total_amount, payee_total_amount_28d)
           VALUES (?1, ?2, ?3, ?4)"#,
    )?;
    for r in rows {
        stmt.execute(params![
            r.to,
            r.payee_txns,
            r.payee_total_amount,
            r.payee_total_amount_28d,
        ])?;
    }
    Ok(())
}

fn insert_pair_rows(conn: &Connection, rows: &[PairProfile]) -> EvalResult<()> {
    let mut stmt =
        conn.prepare(r#"INSERT INTO pair_profile ("from", "to", pair_txns) VALUES (?1, ?2, ?3)"#)?;
    for r in rows {
        stmt.execute(params![r.from, r.to, r.pair_txns])?;
    }
    Ok(())
}

fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(value: &str) -> EvalResult<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| EvalError::InvalidTimestamp {
            value: value.to_string(),
        })
}
