//! Direction inference and trade condition evaluation
//!
//! The agent's position is never stored: it is re-derived from the
//! ledger tail every cycle. The last transaction decides which way the
//! next trade points, and each [`TradeIntent`] variant carries its own
//! pre-resolved signed margin and comparison direction, so no sign
//! flipping happens after inference.

use rust_decimal::Decimal;

use crate::amount::{Amount, Currency};
use crate::ledger::Transaction;

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error(
        "cannot infer position from last transaction ({from} -> {to}): \
         exactly one side must be in the main currency {main}"
    )]
    AmbiguousPosition {
        from: Currency,
        to: Currency,
        main: Currency,
    },
}

/// What the agent wants to do next, derived from the last transaction
///
/// Ephemeral: recomputed on every poll, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeIntent {
    /// The last trade sold the commodity for the main currency. Buy it
    /// back when it is quoted below the margin-reduced sale proceeds.
    Buy {
        commodity: Amount,
        reference_price: Amount,
        /// Already negated relative to the configured percent margin
        margin_percent: Decimal,
    },
    /// The last trade bought the commodity. Sell it when it is quoted
    /// above the margin-raised purchase price.
    Sell {
        commodity: Amount,
        reference_price: Amount,
        margin_percent: Decimal,
    },
}

impl TradeIntent {
    /// Infer direction from the ledger tail
    ///
    /// `percent_margin` is the configured (unsigned) margin; the Buy
    /// variant stores it negated.
    pub fn infer(
        last: &Transaction,
        main_currency: &Currency,
        percent_margin: Decimal,
    ) -> Result<Self, IntentError> {
        let from = &last.from_amount;
        let to = &last.to_amount;

        match (from.currency == *main_currency, to.currency == *main_currency) {
            // Bought the commodity with the main currency: look to sell
            (true, false) => Ok(TradeIntent::Sell {
                commodity: to.clone(),
                reference_price: from.clone(),
                margin_percent: percent_margin,
            }),
            // Sold the commodity for the main currency: look to buy back
            (false, true) => Ok(TradeIntent::Buy {
                commodity: from.clone(),
                reference_price: to.clone(),
                margin_percent: -percent_margin,
            }),
            _ => Err(IntentError::AmbiguousPosition {
                from: from.currency.clone(),
                to: to.currency.clone(),
                main: main_currency.clone(),
            }),
        }
    }

    /// The commodity side of the pair (what is being accumulated or
    /// divested)
    pub fn commodity(&self) -> &Amount {
        match self {
            TradeIntent::Buy { commodity, .. } | TradeIntent::Sell { commodity, .. } => commodity,
        }
    }

    /// The last price paid/received for the commodity, in the main
    /// currency
    pub fn reference_price(&self) -> &Amount {
        match self {
            TradeIntent::Buy {
                reference_price, ..
            }
            | TradeIntent::Sell {
                reference_price, ..
            } => reference_price,
        }
    }

    /// Signed margin percent for this direction
    pub fn margin_percent(&self) -> Decimal {
        match self {
            TradeIntent::Buy { margin_percent, .. }
            | TradeIntent::Sell { margin_percent, .. } => *margin_percent,
        }
    }

    /// Threshold the live quote is compared against
    pub fn target(&self) -> Amount {
        self.reference_price().with_margin(self.margin_percent())
    }

    /// Whether the live quote satisfies this intent
    ///
    /// `quoted` is the current worth of the commodity in the main
    /// currency. Buy fires below the target, Sell fires above it.
    pub fn condition_met(&self, quoted: &Amount) -> bool {
        let target = self.target();
        debug_assert_eq!(quoted.currency, target.currency);
        match self {
            TradeIntent::Buy { .. } => quoted.value < target.value,
            TradeIntent::Sell { .. } => quoted.value > target.value,
        }
    }

    /// What to hand the brokerage when the trade fires: the amount to
    /// give up and the currency to receive
    ///
    /// Selling gives the held commodity for the main currency; buying
    /// spends the proceeds of the last sale on the commodity.
    pub fn exchange_request(&self) -> (Amount, Currency) {
        match self {
            TradeIntent::Sell {
                commodity,
                reference_price,
                ..
            } => (commodity.clone(), reference_price.currency.clone()),
            TradeIntent::Buy {
                commodity,
                reference_price,
                ..
            } => (reference_price.clone(), commodity.currency.clone()),
        }
    }

    /// Lowercase action name for log lines
    pub fn verb(&self) -> &'static str {
        match self {
            TradeIntent::Buy { .. } => "buy",
            TradeIntent::Sell { .. } => "sell",
        }
    }
}
