//! Polling trade loop
//!
//! One steady state: load the ledger tail, infer direction, fetch a
//! quote, evaluate the condition, maybe trade, sleep, repeat. The loop
//! only ends on a fatal error or an external kill; transient brokerage
//! failures skip the iteration and the next tick starts from scratch.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::amount::Currency;
use crate::client::{BrokerApi, BrokerError};
use crate::config::Config;
use crate::intent::{IntentError, TradeIntent};
use crate::ledger::{LedgerError, LedgerStore, Transaction, DATE_FORMAT};

/// Per-iteration trading settings, extracted from [`Config`] once at
/// startup
#[derive(Debug, Clone)]
pub struct TradeSettings {
    pub main_currency: Currency,
    pub percent_margin: Decimal,
    pub simulate: bool,
    pub force_exchange: bool,
    pub repeat_every: Duration,
}

impl TradeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            main_currency: config.main_currency.clone(),
            percent_margin: config.percent_margin,
            simulate: config.simulation.enabled,
            force_exchange: config.force_exchange,
            repeat_every: config.repeat_every(),
        }
    }
}

/// What a single iteration did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Traded(Transaction),
    Held,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error("quote request failed: {0}")]
    Quote(BrokerError),
    #[error("exchange request failed: {0}")]
    Exchange(BrokerError),
}

impl CycleError {
    /// Fatal errors end the process; transient ones skip the iteration
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Ledger(_) | CycleError::Intent(_))
    }
}

/// Main trading loop over an injected brokerage and ledger
pub struct TradeRunner<B, L> {
    broker: B,
    ledger: L,
    settings: TradeSettings,
    trade_count: u64,
}

impl<B: BrokerApi, L: LedgerStore> TradeRunner<B, L> {
    pub fn new(broker: B, ledger: L, settings: TradeSettings) -> Self {
        Self {
            broker,
            ledger,
            settings,
            trade_count: 0,
        }
    }

    /// Run until killed or a fatal error surfaces
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("Trade runner starting main loop...");
        if self.settings.simulate {
            info!("Running in SIMULATION mode - no real exchanges will be issued");
        } else {
            warn!("Running in LIVE mode - real funds at risk");
        }

        let mut poll_interval = interval(self.settings.repeat_every);
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            poll_interval.tick().await;

            match self.run_cycle().await {
                Ok(CycleOutcome::Traded(tx)) => {
                    self.trade_count += 1;
                    info!(
                        "Trade #{} recorded: {} -> {}",
                        self.trade_count, tx.from_amount, tx.to_amount
                    );
                }
                Ok(CycleOutcome::Held) => {}
                Err(err) if err.is_fatal() => {
                    error!("Fatal error, stopping: {err}");
                    return Err(err.into());
                }
                Err(err @ CycleError::Exchange(_)) => {
                    // Funds may already have moved; never retry blindly
                    // and never record an unconfirmed trade. The next
                    // iteration re-evaluates from the ledger.
                    error!("{err} - skipping iteration");
                }
                Err(err) => {
                    warn!("{err} - skipping iteration");
                }
            }

            debug!("Sleeping for {:?}", self.settings.repeat_every);
        }
    }

    /// One iteration of the decision loop, no sleeping
    ///
    /// Public so tests can drive iterations synchronously.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        // Ledger problems are checked before any network call
        let last = self.ledger.last()?;
        let intent = TradeIntent::infer(
            &last,
            &self.settings.main_currency,
            self.settings.percent_margin,
        )?;

        debug!(
            "Last transaction ({}): {} -> {}",
            last.date.format(DATE_FORMAT),
            last.from_amount,
            last.to_amount
        );
        debug!("Looking to {} {}", intent.verb(), intent.commodity().currency);

        let quoted = self
            .broker
            .quote(intent.commodity(), self.settings.main_currency.clone())
            .await
            .map_err(CycleError::Quote)?;

        let target = intent.target();
        let condition_met = intent.condition_met(&quoted);

        debug!(
            "Currently the same amount of {} is worth {}",
            intent.commodity().currency,
            quoted
        );
        debug!(
            "Desired value to {} {}: {} with margin of {}% is {}",
            intent.verb(),
            intent.commodity().currency,
            intent.reference_price(),
            intent.margin_percent(),
            target
        );
        debug!("Condition met: {condition_met}");

        let simulate_tag = if self.settings.simulate {
            " | simulated"
        } else {
            ""
        };

        if !(condition_met || self.settings.force_exchange) {
            debug!(
                "Not {}ing {}: quoted {} vs target {}{}",
                intent.verb(),
                intent.commodity().currency,
                quoted,
                target,
                simulate_tag
            );
            return Ok(CycleOutcome::Held);
        }

        if self.settings.force_exchange {
            warn!("[ATTENTION] Force exchange option enabled");
        }

        let (give, receive) = intent.exchange_request();
        info!(
            "Executing {} of {}: quoted {} vs target {}{}",
            intent.verb(),
            intent.commodity().currency,
            quoted,
            target,
            simulate_tag
        );

        let tx = if self.settings.simulate {
            // Capture the quoted conversion instead of touching the
            // exchange endpoint
            let received = self
                .broker
                .quote(&give, receive)
                .await
                .map_err(CycleError::Quote)?;
            Transaction {
                from_amount: give,
                to_amount: received,
                date: Utc::now().naive_utc(),
            }
        } else {
            self.broker
                .exchange(&give, receive)
                .await
                .map_err(CycleError::Exchange)?
        };

        self.ledger.append(&tx)?;
        info!(
            "Just {}: gave {} for {}{}",
            match &intent {
                TradeIntent::Buy { .. } => "bought",
                TradeIntent::Sell { .. } => "sold",
            },
            tx.from_amount,
            tx.to_amount,
            simulate_tag
        );

        Ok(CycleOutcome::Traded(tx))
    }
}
