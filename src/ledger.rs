//! Append-only transaction ledger backed by a CSV file
//!
//! The ledger is the single source of truth for the agent's position:
//! the last record decides whether we currently hold the commodity or
//! the main currency. It is re-read in full on every poll so edits made
//! outside the process are respected, and records are flushed to disk
//! before `append` returns.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::debug;

use crate::amount::{Amount, Currency};

/// Timestamp pattern used in ledger records
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// One completed conversion, immutable once recorded
///
/// Record layout: `date,from_currency,from_value,to_currency,to_value`
/// with no header row.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub from_amount: Amount,
    pub to_amount: Amount,
    pub date: NaiveDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction history is empty")]
    Empty,
    #[error("malformed ledger record at line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("ledger I/O failed")]
    Io(#[from] std::io::Error),
}

/// Ledger access boundary
///
/// File-backed in production ([`CsvLedger`]); tests substitute an
/// in-memory implementation.
pub trait LedgerStore {
    /// Read the full ordered history
    ///
    /// Errors with [`LedgerError::Empty`] when no records exist; the
    /// loop has no first-trade bootstrapping, so an empty ledger is a
    /// precondition failure.
    fn load(&self) -> Result<Vec<Transaction>, LedgerError>;

    /// Append one record, durable before returning
    fn append(&self, tx: &Transaction) -> Result<(), LedgerError>;

    /// The most recent transaction
    fn last(&self) -> Result<Transaction, LedgerError> {
        let mut all = self.load()?;
        all.pop().ok_or(LedgerError::Empty)
    }
}

/// CSV-file ledger
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for CsvLedger {
    fn load(&self) -> Result<Vec<Transaction>, LedgerError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut transactions = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let line = idx + 1;
            let record = record.map_err(|e| LedgerError::Parse {
                line,
                reason: e.to_string(),
            })?;
            transactions.push(parse_record(&record, line)?);
        }

        if transactions.is_empty() {
            return Err(LedgerError::Empty);
        }

        debug!(
            "Loaded {} transactions from {}",
            transactions.len(),
            self.path.display()
        );
        Ok(transactions)
    }

    fn append(&self, tx: &Transaction) -> Result<(), LedgerError> {
        // Field values are currency codes and plain decimals, so the
        // record needs no quoting or escaping.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{},{},{},{},{}",
            tx.date.format(DATE_FORMAT),
            tx.from_amount.currency,
            tx.from_amount.value,
            tx.to_amount.currency,
            tx.to_amount.value,
        )?;
        file.sync_all()?;

        debug!("Appended transaction to {}", self.path.display());
        Ok(())
    }
}

fn parse_record(record: &csv::StringRecord, line: usize) -> Result<Transaction, LedgerError> {
    let field = |idx: usize, name: &str| -> Result<&str, LedgerError> {
        record.get(idx).ok_or_else(|| LedgerError::Parse {
            line,
            reason: format!("missing {name} field"),
        })
    };

    let date = NaiveDateTime::parse_from_str(field(0, "date")?, DATE_FORMAT).map_err(|e| {
        LedgerError::Parse {
            line,
            reason: format!("bad date: {e}"),
        }
    })?;
    let from_amount = parse_amount(field(1, "from_currency")?, field(2, "from_value")?, line)?;
    let to_amount = parse_amount(field(3, "to_currency")?, field(4, "to_value")?, line)?;

    Ok(Transaction {
        from_amount,
        to_amount,
        date,
    })
}

fn parse_amount(code: &str, value: &str, line: usize) -> Result<Amount, LedgerError> {
    let currency = Currency::from_str(code).map_err(|e| LedgerError::Parse {
        line,
        reason: e.to_string(),
    })?;
    let value = Decimal::from_str_exact(value).map_err(|e| LedgerError::Parse {
        line,
        reason: format!("bad value {value:?}: {e}"),
    })?;
    Amount::new(value, currency).map_err(|e| LedgerError::Parse {
        line,
        reason: e.to_string(),
    })
}
