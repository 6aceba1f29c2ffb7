//! swingbot - margin-triggered single-pair trading agent
//!
//! Watches one currency/commodity pair through a brokerage quoting API
//! and converts back and forth whenever the live price crosses a
//! margin-adjusted threshold derived from the last recorded
//! transaction. The append-only CSV ledger is the only persisted state;
//! the current position is re-derived from its tail on every poll.

pub mod amount;
pub mod client;
pub mod config;
pub mod intent;
pub mod ledger;
pub mod runner;

// Re-export main types for convenience
pub use amount::{Amount, Currency};
pub use client::{BrokerApi, BrokerError, HttpBroker};
pub use config::Config;
pub use intent::{IntentError, TradeIntent};
pub use ledger::{CsvLedger, LedgerError, LedgerStore, Transaction};
pub use runner::{CycleError, CycleOutcome, TradeRunner, TradeSettings};
